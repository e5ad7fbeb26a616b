//! History export

use anyhow::{anyhow, Result};
use chrono::{SecondsFormat, Utc};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use super::ExportFormat;
use crate::sensors::Sample;

const CSV_HEADER: &str = "Timestamp,Heart Rate (BPM),Temperature (°C)";

/// Writes history snapshots to disk. Never touches store state.
pub struct HistoryExporter {
    path: PathBuf,
    format: ExportFormat,
}

impl HistoryExporter {
    pub fn new(path: impl AsRef<Path>, format: ExportFormat) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Create directory if it doesn't exist
        std::fs::create_dir_all(&path)?;

        Ok(Self { path, format })
    }

    /// Write `samples` to a new timestamped file and return its path.
    pub fn export(&self, samples: &[Sample]) -> Result<PathBuf> {
        let filename = self.filename();
        let file = self.open_export_file(&filename)?;
        let mut writer = BufWriter::new(file);

        write_samples(self.format, samples, &mut writer)?;
        writer.flush()?;

        info!("Exported {} samples to {:?}", samples.len(), filename);
        Ok(filename)
    }

    fn filename(&self) -> PathBuf {
        let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        self.path
            .join(format!("health_data_{}.{}", timestamp, self.format.extension()))
    }

    fn open_export_file(&self, path: &Path) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| anyhow!("Failed to open export file {:?}: {}", path, e))
    }
}

/// Serialize `samples` in `format` to any writer.
pub fn write_samples<W: Write>(format: ExportFormat, samples: &[Sample], writer: &mut W) -> Result<()> {
    match format {
        ExportFormat::Csv => {
            writeln!(writer, "{}", CSV_HEADER)?;
            for sample in samples {
                writeln!(
                    writer,
                    "{},{},{:.1}",
                    sample.timestamp().to_rfc3339_opts(SecondsFormat::Millis, true),
                    sample.heart_rate(),
                    sample.temperature()
                )?;
            }
        }
        ExportFormat::Json => {
            for sample in samples {
                let json = serde_json::to_string(sample)?;
                writeln!(writer, "{}", json)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::ThresholdConfig;
    use crate::sensors::RawSample;
    use chrono::TimeZone;

    fn samples() -> Vec<Sample> {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        vec![
            Sample::classify(RawSample::new(72.0, 26.0), t0, &ThresholdConfig::default()),
            Sample::classify(RawSample::new(131.0, 38.3), t0 + chrono::Duration::seconds(1), &ThresholdConfig::default()),
        ]
    }

    #[test]
    fn test_csv_layout() {
        let mut out = Vec::new();
        write_samples(ExportFormat::Csv, &samples(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Timestamp,Heart Rate (BPM),Temperature (°C)");
        assert_eq!(lines[1], "2024-03-01T12:00:00.000Z,72,26.0");
        assert_eq!(lines[2], "2024-03-01T12:00:01.000Z,131,38.3");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_json_lines_include_status() {
        let mut out = Vec::new();
        write_samples(ExportFormat::Json, &samples(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let second: serde_json::Value = serde_json::from_str(text.lines().nth(1).unwrap()).unwrap();
        assert_eq!(second["heartRate"], 131);
        assert_eq!(second["status"]["heartRate"], "high");
        assert_eq!(second["status"]["temperature"], "high");
    }

    #[test]
    fn test_empty_csv_has_header_only() {
        let mut out = Vec::new();
        write_samples(ExportFormat::Csv, &[], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", CSV_HEADER));
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = HistoryExporter::new(dir.path().join("exports"), ExportFormat::Csv).unwrap();

        let path = exporter.export(&samples()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("health_data_"));
        assert!(name.ends_with(".csv"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }
}
