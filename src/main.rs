// Copyright 2026 Merchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code, unused_imports)]

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

mod browser;
mod cli;
mod config;
mod extract;
mod parse;
mod pool;
mod progress;
mod proxy;
mod record;
mod snapshot;

use cli::scrape_cmd::ScrapeOpts;

#[derive(Parser)]
#[command(
    name = "merchwatch",
    about = "Merchwatch — resilient campaign-merch scrape pipeline",
    version,
    after_help = "Run 'merchwatch <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape all product URLs and write a reconciled snapshot
    Scrape {
        /// File of product URLs (bare or "N. <url>" lines)
        #[arg(long)]
        urls: PathBuf,
        /// File of proxies, one "ip:port" per line
        #[arg(long)]
        proxies: PathBuf,
        /// Prior snapshot files, oldest first (their sold-out URLs are
        /// re-scraped before anything else)
        #[arg(long = "snapshot")]
        snapshots: Vec<PathBuf>,
        /// Output directory for the new snapshot
        #[arg(long)]
        out: Option<PathBuf>,
        /// Maximum simultaneously in-flight page loads
        #[arg(long)]
        concurrency: Option<usize>,
        /// Page navigation budget in milliseconds
        #[arg(long)]
        nav_timeout: Option<u64>,
        /// Post-anchor settle delay in milliseconds
        #[arg(long)]
        settle: Option<u64>,
        /// Run chromium with a visible window
        #[arg(long)]
        headful: bool,
        /// Explicit chromium executable, bypassing discovery
        #[arg(long)]
        chromium: Option<PathBuf>,
    },
    /// Merge snapshot files offline (no browsing) and write the result
    Merge {
        /// Snapshot files, oldest first
        #[arg(long = "snapshot", required = true)]
        snapshots: Vec<PathBuf>,
        /// Output directory for the merged snapshot
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run one of the pure interpreters on a single input
    Parse {
        #[command(subcommand)]
        what: ParseWhat,
    },
    /// Check whether one URL is reachable via any egress candidate
    Probe {
        /// URL to probe
        url: String,
        /// File of proxies, one "ip:port" per line
        #[arg(long)]
        proxies: PathBuf,
        /// Attempt budget (default: direct + one per proxy)
        #[arg(long)]
        attempts: Option<usize>,
    },
    /// Check environment and diagnose issues
    Doctor {
        /// URL list to validate
        #[arg(long)]
        urls: Option<PathBuf>,
        /// Proxy list to validate
        #[arg(long)]
        proxies: Option<PathBuf>,
        /// Output directory to validate
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ParseWhat {
    /// Interpret a sales text (optionally with an explicit funded text)
    Sales {
        /// Raw sales text, e.g. "1,234 of 2,000 sold"
        text: String,
        /// Raw funded text, e.g. "61% Funded"
        #[arg(long)]
        funded: Option<String>,
    },
    /// Normalize a date phrasing to ISO
    Date {
        /// Raw date text, e.g. "Ships September 23, 2025"
        text: String,
    },
    /// Estimate revenue from units and category
    Revenue {
        /// Units sold: a count, "Sold Out", or "Unknown"
        units: String,
        /// Product category, e.g. "plushies"
        category: String,
        /// Scraped price text, e.g. "$29.99"
        #[arg(long)]
        price: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("MERCHWATCH_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("MERCHWATCH_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("MERCHWATCH_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("MERCHWATCH_NO_COLOR", "1");
    }

    init_tracing(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Scrape {
            urls,
            proxies,
            snapshots,
            out,
            concurrency,
            nav_timeout,
            settle,
            headful,
            chromium,
        } => {
            cli::scrape_cmd::run(ScrapeOpts {
                urls,
                proxies,
                snapshots,
                out,
                concurrency,
                nav_timeout,
                settle,
                headful,
                chromium,
            })
            .await
        }
        Commands::Merge { snapshots, out } => {
            cli::merge_cmd::run(&snapshots, out.as_deref()).await
        }
        Commands::Parse { what } => match what {
            ParseWhat::Sales { text, funded } => {
                cli::parse_cmd::run_sales(&text, funded.as_deref()).await
            }
            ParseWhat::Date { text } => cli::parse_cmd::run_date(&text).await,
            ParseWhat::Revenue {
                units,
                category,
                price,
            } => cli::parse_cmd::run_revenue(&units, &category, price.as_deref()).await,
        },
        Commands::Probe {
            url,
            proxies,
            attempts,
        } => cli::probe_cmd::run(&url, &proxies, attempts).await,
        Commands::Doctor { urls, proxies, out } => {
            cli::doctor::run(urls.as_deref(), proxies.as_deref(), out.as_deref()).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "merchwatch", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}

/// Tracing goes to stderr so JSON output on stdout stays parseable.
fn init_tracing(verbose: bool, quiet: bool) {
    let directive = if verbose {
        "merchwatch=debug"
    } else if quiet {
        "merchwatch=warn"
    } else {
        "merchwatch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();
}
