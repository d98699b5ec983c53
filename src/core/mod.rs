pub mod deck;
pub mod planner;
pub mod requirements;
pub mod splitter;
pub mod units;
pub mod worklist;

pub use crate::domain::model::{
    ConcUnit, Constraints, SampleMeasurement, SubTransfer, TargetSpec, TransferRequest, Well,
};
pub use crate::domain::ports::{SampleProvider, Storage};
pub use crate::utils::error::Result;
