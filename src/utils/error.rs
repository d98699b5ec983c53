use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("unsupported concentration unit '{unit}' for sample {sample}")]
    UnsupportedUnit { sample: String, unit: String },

    #[error("unit conversion failed for sample {sample}: {reason}")]
    Conversion { sample: String, reason: String },

    #[error(
        "insufficient volume for sample {sample}: need {required_ul} ul, {available_ul} ul available"
    )]
    InsufficientVolume {
        sample: String,
        required_ul: f64,
        available_ul: f64,
    },

    #[error(
        "sample {sample} too concentrated: {sample_vol_ul} ul of sample does not fit a final volume of {final_vol_ul} ul, dilute manually or raise the final volume"
    )]
    Overconcentrated {
        sample: String,
        sample_vol_ul: f64,
        final_vol_ul: f64,
    },

    #[error("cannot split {volume_ul} ul for sample {sample}: {reason}")]
    UnsplittableVolume {
        sample: String,
        volume_ul: f64,
        reason: String,
    },

    #[error("no free deck slot accepts {kind} '{labware}'")]
    DeckCapacity { labware: String, kind: String },

    #[error("malformed well name '{well}'")]
    BadWell { well: String },

    #[error("samplesheet error: {message}")]
    Samplesheet { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("planning produced no output: {message}")]
    EmptyRun { message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlanError>;

impl PlanError {
    /// Per-sample errors are recorded and the run continues; everything
    /// else aborts before any file is written.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PlanError::UnsupportedUnit { .. }
                | PlanError::Conversion { .. }
                | PlanError::InsufficientVolume { .. }
                | PlanError::Overconcentrated { .. }
                | PlanError::UnsplittableVolume { .. }
        )
    }

    /// Stable machine-readable tag used in the annotations artifact.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanError::UnsupportedUnit { .. } => "unsupported_unit",
            PlanError::Conversion { .. } => "conversion",
            PlanError::InsufficientVolume { .. } => "insufficient_volume",
            PlanError::Overconcentrated { .. } => "overconcentrated",
            PlanError::UnsplittableVolume { .. } => "unsplittable_volume",
            PlanError::DeckCapacity { .. } => "deck_capacity",
            PlanError::BadWell { .. } => "bad_well",
            PlanError::Samplesheet { .. } => "samplesheet",
            PlanError::Config { .. } => "config",
            PlanError::EmptyRun { .. } => "empty_run",
            PlanError::Csv(_) => "csv",
            PlanError::TomlParse(_) => "toml",
            PlanError::Io(_) => "io",
        }
    }

    /// Sample the error is attributable to, if any.
    pub fn sample(&self) -> Option<&str> {
        match self {
            PlanError::UnsupportedUnit { sample, .. }
            | PlanError::Conversion { sample, .. }
            | PlanError::InsufficientVolume { sample, .. }
            | PlanError::Overconcentrated { sample, .. }
            | PlanError::UnsplittableVolume { sample, .. } => Some(sample),
            _ => None,
        }
    }
}
