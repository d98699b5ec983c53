use crate::domain::model::{ConcUnit, TargetSpec};
use crate::utils::error::{PlanError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_positive, Validate};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "normpool")]
#[command(about = "Plan normalization/pooling worklists for a bounded-volume liquid handler")]
pub struct CliConfig {
    /// Tab-separated samplesheet with one measured sample per row
    #[arg(long)]
    pub samplesheet: String,

    /// TOML constraint tables; compiled-in defaults when omitted
    #[arg(long)]
    pub config: Option<String>,

    /// Protocol variant selecting the constraint set
    #[arg(long, default_value = "qiaseq")]
    pub protocol: String,

    /// Target amount (ng) per destination well; needs --final-vol-ul
    #[arg(long)]
    pub target_amount_ng: Option<f64>,

    /// Target final concentration; needs --final-vol-ul
    #[arg(long)]
    pub target_conc: Option<f64>,

    #[arg(long, default_value = "ng/ul")]
    pub target_conc_units: String,

    /// Final well volume (ul) for the amount and concentration modes
    #[arg(long)]
    pub final_vol_ul: Option<f64>,

    /// Fixed transfer volume (ul), no normalization
    #[arg(long)]
    pub transfer_vol_ul: Option<f64>,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    /// Host step identifier, used in output filenames
    #[arg(long, default_value = "local")]
    pub step_id: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    /// Exactly one target mode must be selected on the command line.
    pub fn target(&self) -> Result<TargetSpec> {
        let modes = [
            self.target_amount_ng.is_some(),
            self.target_conc.is_some(),
            self.transfer_vol_ul.is_some(),
        ];
        if modes.iter().filter(|m| **m).count() != 1 {
            return Err(PlanError::Config {
                message: "select exactly one of --target-amount-ng, --target-conc, \
                          --transfer-vol-ul"
                    .to_string(),
            });
        }

        if let Some(amount_ng) = self.target_amount_ng {
            let final_vol_ul = self.require_final_vol()?;
            validate_positive("--target-amount-ng", amount_ng)?;
            return Ok(TargetSpec::Amount {
                amount_ng,
                final_vol_ul,
            });
        }
        if let Some(conc) = self.target_conc {
            let final_vol_ul = self.require_final_vol()?;
            validate_positive("--target-conc", conc)?;
            let unit = ConcUnit::parse("<target>", &self.target_conc_units).map_err(|_| {
                PlanError::Config {
                    message: format!(
                        "--target-conc-units must be 'ng/ul' or 'nM', got '{}'",
                        self.target_conc_units
                    ),
                }
            })?;
            return Ok(TargetSpec::Concentration {
                conc,
                unit,
                final_vol_ul,
            });
        }
        let vol_ul = self.transfer_vol_ul.ok_or_else(|| PlanError::Config {
            message: "--transfer-vol-ul is required for the fixed-volume mode".to_string(),
        })?;
        validate_positive("--transfer-vol-ul", vol_ul)?;
        Ok(TargetSpec::FixedVolume { vol_ul })
    }

    fn require_final_vol(&self) -> Result<f64> {
        let v = self.final_vol_ul.ok_or_else(|| PlanError::Config {
            message: "--final-vol-ul is required for this target mode".to_string(),
        })?;
        validate_positive("--final-vol-ul", v)?;
        Ok(v)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("--samplesheet", &self.samplesheet)?;
        validate_non_empty_string("--protocol", &self.protocol)?;
        validate_non_empty_string("--output-path", &self.output_path)?;
        validate_non_empty_string("--step-id", &self.step_id)?;
        self.target().map(|_| ())
    }
}
