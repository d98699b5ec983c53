//! Mass <-> molar conversion for double-stranded nucleic acid.
//!
//! Formula per NEBioCalculator: one bp averages 617.96 g/mol with an extra
//! 36.04 g/mol for the ends, so nM = 10^6 * (ng/ul) / (bp * 617.96 + 36.04).
//! The same relation converts ng <-> fmol for amounts.

use crate::utils::error::{PlanError, Result};

const BP_MASS: f64 = 617.96;
const END_MASS: f64 = 36.04;

fn check_inputs(sample: &str, value: f64, size_bp: Option<f64>) -> Result<f64> {
    // Instrument exports sometimes carry NaN sentinels; reject them here
    // rather than let them poison every downstream volume.
    if !value.is_finite() {
        return Err(PlanError::Conversion {
            sample: sample.to_string(),
            reason: format!("concentration is not a number ({value})"),
        });
    }
    if value < 0.0 {
        return Err(PlanError::Conversion {
            sample: sample.to_string(),
            reason: format!("concentration is negative ({value})"),
        });
    }
    let size = size_bp.ok_or_else(|| PlanError::Conversion {
        sample: sample.to_string(),
        reason: "molecule size (bp) is missing".to_string(),
    })?;
    if !size.is_finite() || size <= 0.0 {
        return Err(PlanError::Conversion {
            sample: sample.to_string(),
            reason: format!("molecule size must be positive, got {size} bp"),
        });
    }
    Ok(size)
}

/// ng/ul -> nM (equivalently ng -> fmol).
pub fn ng_ul_to_nm(sample: &str, conc: f64, size_bp: Option<f64>) -> Result<f64> {
    let size = check_inputs(sample, conc, size_bp)?;
    Ok(1e6 * conc / (size * BP_MASS + END_MASS))
}

/// nM -> ng/ul (equivalently fmol -> ng).
pub fn nm_to_ng_ul(sample: &str, conc: f64, size_bp: Option<f64>) -> Result<f64> {
    let size = check_inputs(sample, conc, size_bp)?;
    Ok(conc * (size * BP_MASS + END_MASS) / 1e6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_value() {
        // 100 ng/ul of 1000 bp dsDNA.
        let nm = ng_ul_to_nm("s", 100.0, Some(1000.0)).unwrap();
        assert!((nm - 161.8087).abs() < 1e-3, "got {nm}");
    }

    #[test]
    fn round_trip() {
        for conc in [0.5, 10.0, 187.3, 4000.0] {
            for size in [50.0, 350.0, 10_000.0] {
                let back =
                    nm_to_ng_ul("s", ng_ul_to_nm("s", conc, Some(size)).unwrap(), Some(size))
                        .unwrap();
                assert!((back - conc).abs() < 1e-9 * conc.max(1.0));
            }
        }
    }

    #[test]
    fn missing_or_bad_size_fails() {
        assert!(matches!(
            ng_ul_to_nm("s", 10.0, None),
            Err(PlanError::Conversion { .. })
        ));
        assert!(ng_ul_to_nm("s", 10.0, Some(0.0)).is_err());
        assert!(ng_ul_to_nm("s", 10.0, Some(-200.0)).is_err());
    }

    #[test]
    fn nan_concentration_is_rejected_not_propagated() {
        let err = ng_ul_to_nm("P1_9", f64::NAN, Some(300.0)).unwrap_err();
        assert_eq!(err.sample(), Some("P1_9"));
        assert!(ng_ul_to_nm("s", f64::INFINITY, Some(300.0)).is_err());
        assert!(ng_ul_to_nm("s", -1.0, Some(300.0)).is_err());
    }
}
