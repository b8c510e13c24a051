// Pipeline processing: column functions, layer transforms and data quality

pub mod functions;
pub mod quality_gate;
pub mod transform;
