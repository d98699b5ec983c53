//! Turns one sample measurement plus a target into concrete sample and
//! buffer transfer volumes, clamped to what the instrument can execute.
//!
//! All protocol variants flow through this one calculation; they differ
//! only in the `Constraints` values they supply.

use crate::core::units;
use crate::domain::model::{
    ConcUnit, Constraints, SampleMeasurement, TargetSpec, TransferKind, TransferRequest, Well,
};
use crate::utils::error::{PlanError, Result};

const VOL_EPS: f64 = 1e-9;

/// Where buffer top-ups are aspirated from. The reservoir is addressed by
/// its first column, one row per destination row, so multichannel runs
/// never contend for a single well.
#[derive(Debug, Clone)]
pub struct BufferSource {
    pub labware: String,
}

impl BufferSource {
    pub fn well_for(&self, dest: Well) -> Well {
        Well {
            row: dest.row,
            col: 1,
        }
    }
}

/// Result of the requirement calculation for one sample.
#[derive(Debug, Clone)]
pub struct Derived {
    pub requests: Vec<TransferRequest>,
    pub notes: Vec<String>,
    pub final_vol_ul: f64,
}

/// Sample concentration expressed in the unit system the target uses.
fn working_conc(sample: &SampleMeasurement, target: &TargetSpec) -> Result<f64> {
    let unit = ConcUnit::parse(&sample.id, &sample.conc_units)?;
    let wanted = match target {
        TargetSpec::Amount { .. } => ConcUnit::NgPerUl,
        TargetSpec::Concentration { unit, .. } => *unit,
        TargetSpec::FixedVolume { .. } => unit,
    };

    let conc = if unit == wanted {
        // No conversion call to catch it, so reject sentinels here.
        if !sample.conc.is_finite() {
            return Err(PlanError::Conversion {
                sample: sample.id.clone(),
                reason: format!("concentration is not a number ({})", sample.conc),
            });
        }
        if sample.conc < 0.0 {
            return Err(PlanError::Conversion {
                sample: sample.id.clone(),
                reason: format!("concentration is negative ({})", sample.conc),
            });
        }
        sample.conc
    } else {
        match wanted {
            ConcUnit::NgPerUl => units::nm_to_ng_ul(&sample.id, sample.conc, sample.size_bp)?,
            ConcUnit::NanoMolar => units::ng_ul_to_nm(&sample.id, sample.conc, sample.size_bp)?,
        }
    };

    if conc <= 0.0 {
        return Err(PlanError::Conversion {
            sample: sample.id.clone(),
            reason: "concentration must be positive to normalize against".to_string(),
        });
    }
    Ok(conc)
}

/// Derive the transfer requests for one sample.
///
/// Fails per sample; callers aggregate errors so one bad measurement does
/// not abort the plate.
pub fn derive(
    sample: &SampleMeasurement,
    target: &TargetSpec,
    constraints: &Constraints,
    buffer: &BufferSource,
) -> Result<Derived> {
    // NaN comparisons are all false, so a sentinel volume would otherwise
    // glide past every feasibility check below.
    if !sample.volume_ul.is_finite() {
        return Err(PlanError::Conversion {
            sample: sample.id.clone(),
            reason: format!("sample volume is not a number ({})", sample.volume_ul),
        });
    }

    let available = sample.volume_ul - constraints.dead_volume_ul;
    if available <= VOL_EPS {
        return Err(PlanError::InsufficientVolume {
            sample: sample.id.clone(),
            required_ul: constraints.sample_floor(),
            available_ul: available.max(0.0),
        });
    }

    let mut notes = Vec::new();
    let floor = constraints.sample_floor();

    // Ideal sample volume and, for dilution modes, the requested final
    // volume and the target concentration in working units.
    let (ideal, requested_final, target_conc) = match target {
        TargetSpec::Amount {
            amount_ng,
            final_vol_ul,
        } => {
            let conc = working_conc(sample, target)?;
            (amount_ng / conc, Some(*final_vol_ul), amount_ng / final_vol_ul)
        }
        TargetSpec::Concentration {
            conc: target_conc,
            final_vol_ul,
            ..
        } => {
            let conc = working_conc(sample, target)?;
            (
                target_conc * final_vol_ul / conc,
                Some(*final_vol_ul),
                *target_conc,
            )
        }
        TargetSpec::FixedVolume { vol_ul } => (*vol_ul, None, 0.0),
    };

    let mut sample_vol = ideal;
    let clamped = sample_vol < floor;
    if clamped {
        sample_vol = floor;
        if let TargetSpec::Amount { amount_ng, .. } = target {
            let conc = working_conc(sample, target)?;
            notes.push(format!(
                "{}: sample volume raised to the {floor} ul minimum; realized amount {:.2} ng exceeds the {amount_ng} ng target",
                sample.id,
                sample_vol * conc,
            ));
        } else {
            notes.push(format!(
                "{}: sample volume raised to the {floor} ul minimum; realized concentration will exceed the target",
                sample.id,
            ));
        }
    }

    if sample_vol > available + VOL_EPS {
        return Err(PlanError::InsufficientVolume {
            sample: sample.id.clone(),
            required_ul: constraints.round_vol(sample_vol),
            available_ul: constraints.round_vol(available),
        });
    }

    // Diluent fill, with optional volume expansion for overconcentrated
    // samples when the protocol allows holding the target concentration
    // in a larger final volume.
    let (sample_vol, buffer_vol, final_vol) = match requested_final {
        None => {
            let v = constraints.round_vol(sample_vol);
            (v, 0.0, v)
        }
        Some(final_vol_ul) => {
            let mut final_vol = final_vol_ul;

            // A clamped aliquot carries more material than asked for. When
            // the protocol allows it, grow the final volume so the result
            // still lands on the target concentration, up to the well cap;
            // past the cap the sample must be diluted manually.
            if clamped && target_conc > 0.0 {
                if let Some(cap) = constraints.expand_final_vol_to_ul {
                    let conc = working_conc(sample, target)?;
                    let expanded = sample_vol * conc / target_conc;
                    if expanded > final_vol + VOL_EPS {
                        if expanded > cap + VOL_EPS {
                            return Err(PlanError::Overconcentrated {
                                sample: sample.id.clone(),
                                sample_vol_ul: constraints.round_vol(sample_vol),
                                final_vol_ul,
                            });
                        }
                        final_vol = expanded;
                        notes.push(format!(
                            "{}: final volume raised to {:.1} ul to hold the target concentration",
                            sample.id,
                            constraints.round_vol(expanded),
                        ));
                    }
                }
            }

            // Negative diluent: the requested final volume cannot hold the
            // computed aliquot. Surfaced to the operator, never auto-fixed.
            if sample_vol > final_vol + VOL_EPS {
                return Err(PlanError::Overconcentrated {
                    sample: sample.id.clone(),
                    sample_vol_ul: constraints.round_vol(sample_vol),
                    final_vol_ul,
                });
            }
            let sample_vol = constraints.round_vol(sample_vol);
            let final_vol = constraints.round_vol(final_vol);
            let buffer_vol = constraints.round_vol(final_vol - sample_vol).max(0.0);
            (sample_vol, buffer_vol, final_vol)
        }
    };

    let mut requests = vec![TransferRequest {
        sample_id: sample.id.clone(),
        source_labware: sample.source_labware.clone(),
        source_well: sample.source_well,
        dest_labware: sample.dest_labware.clone(),
        dest_well: sample.dest_well,
        volume_ul: sample_vol,
        kind: TransferKind::Sample,
    }];

    if buffer_vol > VOL_EPS {
        requests.push(TransferRequest {
            sample_id: sample.id.clone(),
            source_labware: buffer.labware.clone(),
            source_well: buffer.well_for(sample.dest_well),
            dest_labware: sample.dest_labware.clone(),
            dest_well: sample.dest_well,
            volume_ul: buffer_vol,
            kind: TransferKind::Buffer,
        });
    }

    Ok(Derived {
        requests,
        notes,
        final_vol_ul: final_vol,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints() -> Constraints {
        Constraints {
            min_pipette_vol_ul: 0.1,
            max_transfer_vol_ul: 5.0,
            max_request_vol_ul: 180.0,
            precision_ul: 0.1,
            dead_volume_ul: 0.0,
            min_sample_aliquot_ul: 0.1,
            expand_final_vol_to_ul: None,
        }
    }

    fn sample(conc: f64, units: &str, vol: f64) -> SampleMeasurement {
        SampleMeasurement {
            id: "P1_101".into(),
            conc,
            conc_units: units.into(),
            volume_ul: vol,
            size_bp: Some(350.0),
            source_labware: "source_plate".into(),
            source_well: Well::parse("A:1").unwrap(),
            dest_labware: "dest_plate".into(),
            dest_well: Well::parse("B:3").unwrap(),
        }
    }

    fn buffer() -> BufferSource {
        BufferSource {
            labware: "buffer_trough".into(),
        }
    }

    #[test]
    fn amount_mode_splits_sample_and_buffer() {
        let target = TargetSpec::Amount {
            amount_ng: 500.0,
            final_vol_ul: 20.0,
        };
        let d = derive(&sample(50.0, "ng/ul", 40.0), &target, &constraints(), &buffer()).unwrap();
        assert_eq!(d.requests.len(), 2);
        assert!((d.requests[0].volume_ul - 10.0).abs() < 1e-9);
        assert!((d.requests[1].volume_ul - 10.0).abs() < 1e-9);
        assert_eq!(d.requests[1].kind, TransferKind::Buffer);
        assert_eq!(d.requests[1].source_labware, "buffer_trough");
        // First-column buffer strategy: destination row, column 1.
        assert_eq!(d.requests[1].source_well.to_string(), "B:1");
        assert!(d.notes.is_empty());
    }

    #[test]
    fn overconcentrated_sample_is_surfaced_not_corrected() {
        // 10 ul of sample needed but only 5 ul final volume requested.
        let target = TargetSpec::Amount {
            amount_ng: 500.0,
            final_vol_ul: 5.0,
        };
        let err = derive(&sample(50.0, "ng/ul", 40.0), &target, &constraints(), &buffer())
            .unwrap_err();
        assert!(matches!(err, PlanError::Overconcentrated { .. }));
    }

    #[test]
    fn volume_expansion_holds_target_concentration() {
        let mut c = constraints();
        c.expand_final_vol_to_ul = Some(15.0);
        let target = TargetSpec::Amount {
            amount_ng: 500.0,
            final_vol_ul: 5.0,
        };
        // Target conc 100 ng/ul; 10 ul sample at 50 ng/ul expands to 10 ul
        // sample + 0 buffer? No: 10 * 50 / 100 = 5 ul < 10 ul sample, so
        // this stays overconcentrated even with expansion.
        let err = derive(&sample(50.0, "ng/ul", 40.0), &target, &c, &buffer()).unwrap_err();
        assert!(matches!(err, PlanError::Overconcentrated { .. }));

        // A genuinely tiny aliquot below the floor expands cleanly:
        // 1000 ng/ul sample, 50 ng wanted in 5 ul (10 ng/ul target).
        // Floor of 0.1 ul carries 100 ng -> expand to 10 ul final.
        let target = TargetSpec::Amount {
            amount_ng: 50.0,
            final_vol_ul: 5.0,
        };
        let d = derive(&sample(1000.0, "ng/ul", 40.0), &target, &c, &buffer()).unwrap();
        assert!((d.final_vol_ul - 10.0).abs() < 1e-9, "got {}", d.final_vol_ul);
        assert!((d.requests[0].volume_ul - 0.1).abs() < 1e-9);
        assert!((d.requests[1].volume_ul - 9.9).abs() < 1e-9);
        assert_eq!(d.notes.len(), 2);
    }

    #[test]
    fn clamp_to_minimum_is_recorded() {
        // Ideal volume 0.05 ul gets raised to the 0.1 ul floor.
        let target = TargetSpec::Amount {
            amount_ng: 50.0,
            final_vol_ul: 20.0,
        };
        let d = derive(&sample(1000.0, "ng/ul", 40.0), &target, &constraints(), &buffer())
            .unwrap();
        assert!((d.requests[0].volume_ul - 0.1).abs() < 1e-9);
        assert_eq!(d.notes.len(), 1);
        assert!(d.notes[0].contains("exceeds the 50 ng target"));
    }

    #[test]
    fn insufficient_volume_fails_per_sample() {
        let target = TargetSpec::Amount {
            amount_ng: 500.0,
            final_vol_ul: 20.0,
        };
        let err = derive(&sample(50.0, "ng/ul", 8.0), &target, &constraints(), &buffer())
            .unwrap_err();
        match err {
            PlanError::InsufficientVolume {
                required_ul,
                available_ul,
                ..
            } => {
                assert!((required_ul - 10.0).abs() < 1e-9);
                assert!((available_ul - 8.0).abs() < 1e-9);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn dead_volume_is_subtracted_before_feasibility() {
        let mut c = constraints();
        c.dead_volume_ul = 5.0;
        let target = TargetSpec::Amount {
            amount_ng: 500.0,
            final_vol_ul: 20.0,
        };
        // 12 ul measured, 5 ul dead: only 7 ul usable for a 10 ul need.
        let err = derive(&sample(50.0, "ng/ul", 12.0), &target, &c, &buffer()).unwrap_err();
        assert!(matches!(err, PlanError::InsufficientVolume { .. }));
    }

    #[test]
    fn molar_sample_converts_for_mass_target() {
        // 100 nM of 350 bp: 100 * (350*617.96+36.04) / 1e6 = 21.632 ng/ul.
        let target = TargetSpec::Amount {
            amount_ng: 216.32,
            final_vol_ul: 20.0,
        };
        let d = derive(&sample(100.0, "nM", 40.0), &target, &constraints(), &buffer()).unwrap();
        assert!((d.requests[0].volume_ul - 10.0).abs() < 1e-9);
    }

    #[test]
    fn molar_sample_without_size_fails_conversion() {
        let mut s = sample(100.0, "nM", 40.0);
        s.size_bp = None;
        let target = TargetSpec::Amount {
            amount_ng: 100.0,
            final_vol_ul: 20.0,
        };
        let err = derive(&s, &target, &constraints(), &buffer()).unwrap_err();
        assert!(matches!(err, PlanError::Conversion { .. }));
    }

    #[test]
    fn nan_concentration_is_never_treated_as_zero() {
        let target = TargetSpec::Amount {
            amount_ng: 100.0,
            final_vol_ul: 20.0,
        };
        let err = derive(&sample(f64::NAN, "ng/ul", 40.0), &target, &constraints(), &buffer())
            .unwrap_err();
        assert!(matches!(err, PlanError::Conversion { .. }));
    }

    #[test]
    fn nan_volume_is_rejected() {
        let mut s = sample(50.0, "ng/ul", 40.0);
        s.volume_ul = f64::NAN;
        let target = TargetSpec::FixedVolume { vol_ul: 2.0 };
        let err = derive(&s, &target, &constraints(), &buffer()).unwrap_err();
        assert!(matches!(err, PlanError::Conversion { .. }));
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let target = TargetSpec::Amount {
            amount_ng: 100.0,
            final_vol_ul: 20.0,
        };
        let err = derive(&sample(10.0, "pg/ml", 40.0), &target, &constraints(), &buffer())
            .unwrap_err();
        assert!(matches!(err, PlanError::UnsupportedUnit { .. }));
    }

    #[test]
    fn concentration_mode_dilutes_proportionally() {
        // 80 ng/ul diluted to 20 ng/ul in 20 ul: 5 ul sample, 15 ul buffer.
        let target = TargetSpec::Concentration {
            conc: 20.0,
            unit: ConcUnit::NgPerUl,
            final_vol_ul: 20.0,
        };
        let d = derive(&sample(80.0, "ng/ul", 40.0), &target, &constraints(), &buffer()).unwrap();
        assert!((d.requests[0].volume_ul - 5.0).abs() < 1e-9);
        assert!((d.requests[1].volume_ul - 15.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_volume_mode_emits_no_buffer() {
        let target = TargetSpec::FixedVolume { vol_ul: 3.0 };
        let d = derive(&sample(50.0, "ng/ul", 40.0), &target, &constraints(), &buffer()).unwrap();
        assert_eq!(d.requests.len(), 1);
        assert!((d.requests[0].volume_ul - 3.0).abs() < 1e-9);
    }
}
