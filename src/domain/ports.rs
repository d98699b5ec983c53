use crate::domain::model::SampleMeasurement;
use crate::utils::error::Result;

/// Source of sample measurement records. In production this fronts the
/// host LIMS; in tests and local runs it reads a samplesheet file.
pub trait SampleProvider {
    fn fetch(&self) -> Result<Vec<SampleMeasurement>>;
}

/// Where run artifacts end up. Planning never writes through this until
/// the whole plan has been computed.
pub trait Storage {
    fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
}
