use crate::utils::error::{PlanError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_positive(field_name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(PlanError::Config {
            message: format!("{field_name} must be a positive number, got {value}"),
        });
    }
    Ok(())
}

pub fn validate_non_negative(field_name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(PlanError::Config {
            message: format!("{field_name} must be zero or greater, got {value}"),
        });
    }
    Ok(())
}

pub fn validate_ordered(
    low_name: &str,
    low: f64,
    high_name: &str,
    high: f64,
) -> Result<()> {
    if low > high {
        return Err(PlanError::Config {
            message: format!("{low_name} ({low}) must not exceed {high_name} ({high})"),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PlanError::Config {
            message: format!("{field_name} cannot be empty"),
        });
    }
    Ok(())
}
