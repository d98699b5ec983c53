// Domain layer: planning data model and the ports that isolate the
// planner from the host record system and the filesystem.

pub mod model;
pub mod ports;
