use crate::utils::error::{PlanError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Concentration units the planner understands. Anything else coming out
/// of the host system is rejected, never guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcUnit {
    NgPerUl,
    NanoMolar,
}

impl ConcUnit {
    pub fn parse(sample: &str, raw: &str) -> Result<Self> {
        match raw.trim() {
            "ng/ul" | "ng/uL" | "ng/µL" => Ok(ConcUnit::NgPerUl),
            "nM" => Ok(ConcUnit::NanoMolar),
            other => Err(PlanError::UnsupportedUnit {
                sample: sample.to_string(),
                unit: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ConcUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcUnit::NgPerUl => write!(f, "ng/ul"),
            ConcUnit::NanoMolar => write!(f, "nM"),
        }
    }
}

/// 96-well plate coordinate. Rows A-H map to 1-8, columns are 1-12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Well {
    pub row: u8,
    pub col: u8,
}

fn well_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Ha-h]):?([0-9]{1,2})$").unwrap())
}

impl Well {
    pub fn new(row: u8, col: u8) -> Result<Self> {
        if !(1..=8).contains(&row) || !(1..=12).contains(&col) {
            return Err(PlanError::BadWell {
                well: format!("row {row} col {col}"),
            });
        }
        Ok(Well { row, col })
    }

    /// Accepts both the colon-separated form used by the host system
    /// ("A:1") and the compact form ("A1", "H12").
    pub fn parse(raw: &str) -> Result<Self> {
        let caps = well_re()
            .captures(raw.trim())
            .ok_or_else(|| PlanError::BadWell {
                well: raw.to_string(),
            })?;
        let row_letter = caps[1]
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .ok_or_else(|| PlanError::BadWell {
                well: raw.to_string(),
            })?;
        let row = (row_letter as u8) - b'A' + 1;
        let col: u8 = caps[2].parse().map_err(|_| PlanError::BadWell {
            well: raw.to_string(),
        })?;
        Well::new(row, col)
    }

    pub fn row_letter(&self) -> char {
        (b'A' + self.row - 1) as char
    }

    /// Ordering key for worklists: down a column, then across.
    pub fn column_major(&self) -> (u8, u8) {
        (self.col, self.row)
    }
}

impl fmt::Display for Well {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row_letter(), self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabwareKind {
    #[serde(rename = "plate")]
    Plate96,
    Reservoir,
}

impl fmt::Display for LabwareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabwareKind::Plate96 => write!(f, "plate"),
            LabwareKind::Reservoir => write!(f, "reservoir"),
        }
    }
}

/// A logical piece of labware referenced by transfers. Transfers carry the
/// name only; the physical slot binding lives in the deck layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabwareRef {
    pub name: String,
    pub kind: LabwareKind,
}

impl LabwareRef {
    pub fn plate(name: impl Into<String>) -> Self {
        LabwareRef {
            name: name.into(),
            kind: LabwareKind::Plate96,
        }
    }

    pub fn reservoir(name: impl Into<String>) -> Self {
        LabwareRef {
            name: name.into(),
            kind: LabwareKind::Reservoir,
        }
    }
}

/// One sample as measured upstream. Immutable once read.
///
/// `conc` may be non-finite when the instrument export carried a sentinel
/// value; the requirement calculator rejects it explicitly, so providers
/// must pass it through rather than mask it.
#[derive(Debug, Clone)]
pub struct SampleMeasurement {
    pub id: String,
    pub conc: f64,
    pub conc_units: String,
    pub volume_ul: f64,
    pub size_bp: Option<f64>,
    pub source_labware: String,
    pub source_well: Well,
    pub dest_labware: String,
    pub dest_well: Well,
}

/// Instrument and protocol constants one run plans against, resolved from
/// the configuration tables. Volumes in ul.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraints {
    /// Smallest volume the instrument pipettes reliably (inclusive bound).
    pub min_pipette_vol_ul: f64,
    /// Largest single aspirate/dispense.
    pub max_transfer_vol_ul: f64,
    /// Ceiling on one logical request, limited by destination well capacity.
    pub max_request_vol_ul: f64,
    /// Pipetting resolution; all emitted volumes are multiples of this.
    pub precision_ul: f64,
    /// Volume at the well bottom the instrument cannot reach.
    pub dead_volume_ul: f64,
    /// Protocol floor on the sample aliquot, never below min_pipette_vol_ul.
    pub min_sample_aliquot_ul: f64,
    /// When set, an overconcentrated sample may have its final volume
    /// raised up to this cap while holding the target concentration.
    pub expand_final_vol_to_ul: Option<f64>,
}

impl Constraints {
    /// Round half away from zero to the pipetting resolution.
    pub fn round_vol(&self, vol_ul: f64) -> f64 {
        (vol_ul / self.precision_ul).round() * self.precision_ul
    }

    pub fn sample_floor(&self) -> f64 {
        self.min_sample_aliquot_ul.max(self.min_pipette_vol_ul)
    }
}

/// What the step is normalizing towards. Protocol variants differ only in
/// constraint values, never in which of these modes exist.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetSpec {
    /// Take a fixed amount of material, fill with buffer to the final volume.
    Amount { amount_ng: f64, final_vol_ul: f64 },
    /// Dilute to a fixed final concentration in a fixed final volume.
    Concentration {
        conc: f64,
        unit: ConcUnit,
        final_vol_ul: f64,
    },
    /// Move a fixed volume, no normalization.
    FixedVolume { vol_ul: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Sample,
    Buffer,
}

/// One logical transfer before splitting against instrument limits.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub sample_id: String,
    pub source_labware: String,
    pub source_well: Well,
    pub dest_labware: String,
    pub dest_well: Well,
    pub volume_ul: f64,
    pub kind: TransferKind,
}

/// One physically executable pipetting action. Volume always lies within
/// the instrument's [min, max] window once the splitter has run.
#[derive(Debug, Clone, Serialize)]
pub struct SubTransfer {
    pub sample_id: String,
    pub source_labware: String,
    pub source_well: Well,
    pub dest_labware: String,
    pub dest_well: Well,
    pub volume_ul: f64,
    pub seq: usize,
    pub kind: TransferKind,
}

/// Structured per-sample failure written back for the host UI.
#[derive(Debug, Clone, Serialize)]
pub struct SampleAnnotation {
    pub sample_id: String,
    pub kind: String,
    pub message: String,
}

impl SampleAnnotation {
    pub fn from_error(sample_id: &str, err: &PlanError) -> Self {
        SampleAnnotation {
            sample_id: sample_id.to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one planning run: what was planned, what was flagged.
#[derive(Debug, Default)]
pub struct RunReport {
    pub planned_samples: usize,
    pub failed_samples: Vec<SampleAnnotation>,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn has_flags(&self) -> bool {
        !self.failed_samples.is_empty() || !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_well_forms() {
        assert_eq!(Well::parse("A:1").unwrap(), Well { row: 1, col: 1 });
        assert_eq!(Well::parse("H12").unwrap(), Well { row: 8, col: 12 });
        assert_eq!(Well::parse("b:7").unwrap(), Well { row: 2, col: 7 });
    }

    #[test]
    fn rejects_out_of_range_wells() {
        assert!(Well::parse("I:1").is_err());
        assert!(Well::parse("A:13").is_err());
        assert!(Well::parse("A:0").is_err());
        assert!(Well::parse("well 5").is_err());
    }

    #[test]
    fn well_displays_host_form() {
        assert_eq!(Well::parse("C4").unwrap().to_string(), "C:4");
    }

    #[test]
    fn column_major_orders_down_columns_first() {
        let a1 = Well::parse("A:1").unwrap();
        let b1 = Well::parse("B:1").unwrap();
        let a2 = Well::parse("A:2").unwrap();
        assert!(a1.column_major() < b1.column_major());
        assert!(b1.column_major() < a2.column_major());
    }

    #[test]
    fn unit_parsing_is_closed() {
        assert_eq!(ConcUnit::parse("s", "ng/ul").unwrap(), ConcUnit::NgPerUl);
        assert_eq!(ConcUnit::parse("s", "nM").unwrap(), ConcUnit::NanoMolar);
        assert!(matches!(
            ConcUnit::parse("s", "mg/mL"),
            Err(PlanError::UnsupportedUnit { .. })
        ));
    }
}
