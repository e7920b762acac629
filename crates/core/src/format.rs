use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::fs;

use crate::{
    error::Result,
    types::{AnalysisResult, ContentKind},
};

pub const VIDEO_SUMMARY_FILE: &str = "video_summary.txt";
pub const WEBSITE_SUMMARY_FILE: &str = "summary.txt";

/// Format an elapsed duration as `4.2s` or `3m 12s`
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{}m {}s", d.as_secs() / 60, d.as_secs() % 60)
    }
}

/// Format a byte count with a binary unit suffix
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Fixed file name for a saved result
pub fn summary_file_name(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Video => VIDEO_SUMMARY_FILE,
        ContentKind::Website => WEBSITE_SUMMARY_FILE,
    }
}

pub fn format_result_readable(result: &AnalysisResult) -> String {
    let mut output = String::new();
    output.push_str("# Analysis Result\n\n");
    output.push_str(&result.content);
    if !result.content.ends_with('\n') {
        output.push('\n');
    }
    output
}

/// Write the result as plain text into `dir`, returning the file path
pub async fn save_result(result: &AnalysisResult, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).await?;
    let path = dir.join(summary_file_name(result.kind));
    fs::write(&path, &result.content).await?;
    Ok(path)
}
