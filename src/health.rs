use anyhow::Context;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Append a liveness breadcrumb for external monitoring. Called only
/// after a fully successful run.
pub fn update_health_record(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating health record directory {}", parent.display()))?;
        }
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening health record file {}", path.display()))?;
    writeln!(
        file,
        "{}\tProgram exits without an error.",
        Local::now().format("%c")
    )?;
    Ok(())
}
