//! Samplesheet-backed `SampleProvider`.
//!
//! Reads the tab-separated export that stands in for a live host-system
//! fetch: one measured sample per row, columns named after the host
//! fields. Numeric cells that fail to parse become NaN on purpose, so the
//! requirement calculator rejects that sample explicitly instead of the
//! whole sheet dying or the value silently turning into zero.

use crate::domain::model::{SampleMeasurement, Well};
use crate::domain::ports::SampleProvider;
use crate::utils::error::{PlanError, Result};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().parse().unwrap_or(f64::NAN))
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().unwrap_or(f64::NAN)))
}

#[derive(Debug, Deserialize)]
struct SheetRow {
    sample_name: String,
    source_fc: String,
    source_well: String,
    dest_fc: String,
    dest_well: String,
    #[serde(deserialize_with = "lenient_f64")]
    conc: f64,
    conc_units: String,
    #[serde(deserialize_with = "lenient_f64")]
    vol: f64,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    size_bp: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SampleSheetProvider {
    path: PathBuf,
    delimiter: u8,
}

impl SampleSheetProvider {
    pub fn tsv(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b'\t',
        }
    }

    pub fn with_delimiter(path: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self {
            path: path.into(),
            delimiter,
        }
    }
}

impl SampleProvider for SampleSheetProvider {
    fn fetch(&self) -> Result<Vec<SampleMeasurement>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let mut samples = Vec::new();
        for (i, row) in reader.deserialize::<SheetRow>().enumerate() {
            let row = row.map_err(|e| PlanError::Samplesheet {
                message: format!("row {}: {e}", i + 2),
            })?;
            if row.sample_name.is_empty() {
                return Err(PlanError::Samplesheet {
                    message: format!("row {}: sample_name is empty", i + 2),
                });
            }
            samples.push(SampleMeasurement {
                id: row.sample_name,
                conc: row.conc,
                conc_units: row.conc_units,
                volume_ul: row.vol,
                size_bp: row.size_bp,
                source_labware: row.source_fc,
                source_well: Well::parse(&row.source_well)?,
                dest_labware: row.dest_fc,
                dest_well: Well::parse(&row.dest_well)?,
            });
        }
        tracing::debug!("read {} samples from {}", samples.len(), self.path.display());
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "sample_name\tsource_fc\tsource_well\tdest_fc\tdest_well\tconc\tconc_units\tvol\tsize_bp";

    fn sheet(rows: &[&str]) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "{HEADER}").unwrap();
        for r in rows {
            writeln!(f, "{r}").unwrap();
        }
        f
    }

    #[test]
    fn reads_rows_into_measurements() {
        let f = sheet(&[
            "P1_101\tplate_a\tA:1\tdest\tA:1\t50.0\tng/ul\t40\t350",
            "P1_102\tplate_a\tB:1\tdest\tB:1\t120.5\tnM\t20\t",
        ]);
        let samples = SampleSheetProvider::tsv(f.path()).fetch().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].id, "P1_101");
        assert!((samples[0].conc - 50.0).abs() < 1e-9);
        assert_eq!(samples[0].size_bp, Some(350.0));
        assert_eq!(samples[1].size_bp, None);
        assert_eq!(samples[1].conc_units, "nM");
    }

    #[test]
    fn non_numeric_concentration_becomes_nan_not_zero() {
        let f = sheet(&["P1_101\tplate_a\tA:1\tdest\tA:1\tN/A\tng/ul\t40\t350"]);
        let samples = SampleSheetProvider::tsv(f.path()).fetch().unwrap();
        assert!(samples[0].conc.is_nan());
    }

    #[test]
    fn malformed_well_is_a_sheet_error() {
        let f = sheet(&["P1_101\tplate_a\twell9\tdest\tA:1\t50\tng/ul\t40\t350"]);
        assert!(SampleSheetProvider::tsv(f.path()).fetch().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(SampleSheetProvider::tsv("/nonexistent/sheet.tsv").fetch().is_err());
    }
}
