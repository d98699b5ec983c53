//! Instrument and protocol constraint tables.
//!
//! Protocol variants supply numbers, never code paths: every workflow runs
//! the same calculator against a different `Constraints` value. Tables are
//! read from TOML, with compiled-in defaults for the 5-position deck.

use crate::core::deck::SlotSpec;
use crate::domain::model::{Constraints, LabwareKind};
use crate::utils::error::{PlanError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_non_negative, validate_ordered, validate_positive,
    Validate,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub instrument: InstrumentConfig,
    pub protocols: BTreeMap<String, ProtocolVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub min_pipette_vol_ul: f64,
    pub max_transfer_vol_ul: f64,
    /// Ceiling on one logical request, bounded by destination well capacity.
    pub max_request_vol_ul: f64,
    pub precision_ul: f64,
    pub slots: Vec<SlotConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotConfig {
    pub id: u8,
    pub accepts: Vec<LabwareKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolVariant {
    pub dead_volume_ul: f64,
    pub min_sample_aliquot_ul: f64,
    /// When set, overconcentrated samples may grow their final volume up
    /// to this cap instead of failing.
    pub expand_final_vol_to_ul: Option<f64>,
    #[serde(default = "default_buffer_labware")]
    pub buffer_labware: String,
}

fn default_buffer_labware() -> String {
    "buffer_trough".to_string()
}

impl Default for PlannerConfig {
    fn default() -> Self {
        let slots = (1..=5)
            .map(|id| SlotConfig {
                id,
                accepts: if id <= 2 {
                    vec![LabwareKind::Reservoir, LabwareKind::Plate96]
                } else {
                    vec![LabwareKind::Plate96]
                },
            })
            .collect();

        let mut protocols = BTreeMap::new();
        protocols.insert(
            "qiaseq".to_string(),
            ProtocolVariant {
                dead_volume_ul: 5.0,
                min_sample_aliquot_ul: 0.1,
                expand_final_vol_to_ul: Some(15.0),
                buffer_labware: default_buffer_labware(),
            },
        );
        protocols.insert(
            "amplicon".to_string(),
            ProtocolVariant {
                dead_volume_ul: 5.0,
                min_sample_aliquot_ul: 0.1,
                expand_final_vol_to_ul: None,
                buffer_labware: default_buffer_labware(),
            },
        );

        PlannerConfig {
            instrument: InstrumentConfig {
                min_pipette_vol_ul: 0.1,
                max_transfer_vol_ul: 5.0,
                max_request_vol_ul: 180.0,
                precision_ul: 0.1,
                slots,
            },
            protocols,
        }
    }
}

impl PlannerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: PlannerConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Flatten instrument plus one protocol variant into the constraint
    /// set the planning core runs against.
    pub fn resolve(&self, protocol: &str) -> Result<(Constraints, Vec<SlotSpec>, String)> {
        let variant = self.protocols.get(protocol).ok_or_else(|| PlanError::Config {
            message: format!(
                "unknown protocol '{protocol}', configured: {}",
                self.protocols.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        })?;

        let constraints = Constraints {
            min_pipette_vol_ul: self.instrument.min_pipette_vol_ul,
            max_transfer_vol_ul: self.instrument.max_transfer_vol_ul,
            max_request_vol_ul: self.instrument.max_request_vol_ul,
            precision_ul: self.instrument.precision_ul,
            dead_volume_ul: variant.dead_volume_ul,
            min_sample_aliquot_ul: variant.min_sample_aliquot_ul,
            expand_final_vol_to_ul: variant.expand_final_vol_to_ul,
        };
        let slots = self
            .instrument
            .slots
            .iter()
            .map(|s| SlotSpec {
                id: s.id,
                accepts: s.accepts.clone(),
            })
            .collect();
        Ok((constraints, slots, variant.buffer_labware.clone()))
    }
}

impl Validate for PlannerConfig {
    fn validate(&self) -> Result<()> {
        let i = &self.instrument;
        validate_positive("instrument.min_pipette_vol_ul", i.min_pipette_vol_ul)?;
        validate_positive("instrument.max_transfer_vol_ul", i.max_transfer_vol_ul)?;
        validate_positive("instrument.max_request_vol_ul", i.max_request_vol_ul)?;
        validate_positive("instrument.precision_ul", i.precision_ul)?;
        validate_ordered(
            "instrument.min_pipette_vol_ul",
            i.min_pipette_vol_ul,
            "instrument.max_transfer_vol_ul",
            i.max_transfer_vol_ul,
        )?;
        validate_ordered(
            "instrument.max_transfer_vol_ul",
            i.max_transfer_vol_ul,
            "instrument.max_request_vol_ul",
            i.max_request_vol_ul,
        )?;

        if i.slots.is_empty() {
            return Err(PlanError::Config {
                message: "instrument.slots cannot be empty".to_string(),
            });
        }
        let mut ids: Vec<u8> = i.slots.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != i.slots.len() {
            return Err(PlanError::Config {
                message: "instrument.slots contains duplicate slot ids".to_string(),
            });
        }
        for slot in &i.slots {
            if slot.accepts.is_empty() {
                return Err(PlanError::Config {
                    message: format!("slot {} accepts no labware kind", slot.id),
                });
            }
        }

        if self.protocols.is_empty() {
            return Err(PlanError::Config {
                message: "no protocol variants configured".to_string(),
            });
        }
        for (name, p) in &self.protocols {
            validate_non_negative(&format!("protocols.{name}.dead_volume_ul"), p.dead_volume_ul)?;
            validate_non_negative(
                &format!("protocols.{name}.min_sample_aliquot_ul"),
                p.min_sample_aliquot_ul,
            )?;
            if let Some(cap) = p.expand_final_vol_to_ul {
                validate_positive(&format!("protocols.{name}.expand_final_vol_to_ul"), cap)?;
            }
            validate_non_empty_string(
                &format!("protocols.{name}.buffer_labware"),
                &p.buffer_labware,
            )?;
        }
        Ok(())
    }
}
