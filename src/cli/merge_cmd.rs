//! `merchwatch merge` — offline snapshot reconciliation, no browsing.

use crate::cli::output::{self, Styled};
use crate::config::PipelineConfig;
use crate::snapshot::{self, SnapshotReconciler};
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Merge snapshot files oldest-first, normalize, write a fresh snapshot.
pub async fn run(snapshots: &[PathBuf], out: Option<&Path>) -> Result<()> {
    if snapshots.is_empty() {
        bail!("no snapshot files given (pass them oldest first)");
    }

    let config = PipelineConfig::default();
    let mut reconciler = SnapshotReconciler::new();
    for path in snapshots {
        let records = snapshot::load_records(path)?;
        info!(path = %path.display(), records = records.len(), "snapshot merged");
        reconciler.merge(records);
    }
    reconciler.normalize(&config.prices);

    let snap = reconciler.into_snapshot();
    let out_dir = out.unwrap_or(&config.out_dir);
    let path = snap.write_to(out_dir)?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "snapshot": path.display().to_string(),
            "totalCount": snap.total_count,
            "merged": snapshots.len(),
        }));
        return Ok(());
    }

    if !output::is_quiet() {
        let s = Styled::new();
        eprintln!(
            "  {} Merged {} snapshot(s) into {} ({} records)",
            s.ok_sym(),
            snapshots.len(),
            path.display(),
            snap.total_count
        );
    }

    Ok(())
}
