// Checklist engine: per-design items, approval flags and template instantiation

pub mod gate;
pub mod templates;

pub use gate::{write_flag, FlagWrite, GateReport, ValidationRole};
pub use templates::{carry_into_stage, instantiate};
