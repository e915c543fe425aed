//! Environment readiness check.

use crate::browser::chromium::find_chromium;
use crate::config::{self, PipelineConfig};
use crate::proxy::ProxyRotator;
use anyhow::Result;
use std::path::Path;

/// Check chromium availability, input files, and the output directory.
pub async fn run(urls: Option<&Path>, proxies: Option<&Path>, out: Option<&Path>) -> Result<()> {
    println!("Merchwatch Doctor");
    println!("=================");
    println!();

    // OS and architecture
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    // Check chromium
    let chromium_path = find_chromium();
    match &chromium_path {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!("[!!] Chromium NOT found. Install chromium or set MERCHWATCH_CHROMIUM."),
    }

    // Check URL list
    let mut inputs_ok = true;
    if let Some(path) = urls {
        match config::load_urls(path) {
            Ok(list) => println!("[OK] URL list parses: {} URL(s)", list.len()),
            Err(e) => {
                inputs_ok = false;
                println!("[!!] URL list problem: {e}");
            }
        }
    } else {
        println!("[??] No URL list given (pass --urls to check one)");
    }

    // Check proxy list
    if let Some(path) = proxies {
        match ProxyRotator::load(path) {
            Ok(rotator) => println!("[OK] Proxy list parses: {} prox(ies)", rotator.len()),
            Err(e) => {
                inputs_ok = false;
                println!("[!!] Proxy list problem: {e}");
            }
        }
    } else {
        println!("[??] No proxy list given (pass --proxies to check one)");
    }

    // Check output directory is writable
    let default_out = PipelineConfig::default().out_dir;
    let out_dir = out.unwrap_or(&default_out);
    let out_ok = match check_writable(out_dir) {
        Ok(()) => {
            println!("[OK] Output directory writable: {}", out_dir.display());
            true
        }
        Err(e) => {
            println!("[!!] Output directory not writable: {e}");
            false
        }
    };

    println!();
    let ready = chromium_path.is_some() && inputs_ok && out_ok;
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}

/// Create the directory if needed, then try a throwaway write.
fn check_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let probe = dir.join(".merchwatch_write_check");
    std::fs::write(&probe, b"ok")?;
    std::fs::remove_file(&probe)?;
    Ok(())
}
