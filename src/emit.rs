//! Metadata emission.
//!
//! The event stream is written exactly in emission order as a pretty JSON
//! array — no aggregation, no reordering; everything order-sensitive
//! already happened in the fusion engine. The reader exists so a metadata
//! file can be loaded back into the database.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::pipeline::DetectionEvent;

/// Serialize `events` to `path`, creating parent directories as needed.
pub fn write_metadata(path: &Path, events: &[DetectionEvent]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
    }
    let file =
        File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, events)?;
    writer.flush()?;
    info!("Wrote {} events to {}", events.len(), path.display());
    Ok(())
}

/// Parse a previously written metadata file.
pub fn read_metadata(path: &Path) -> Result<Vec<DetectionEvent>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let events = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid metadata in {}", path.display()))?;
    Ok(events)
}
