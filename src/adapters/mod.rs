// Adapters layer: concrete implementations of the domain ports for local
// files (samplesheet input, artifact output).

pub mod samplesheet;
pub mod storage;
