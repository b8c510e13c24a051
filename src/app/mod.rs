pub mod ports;
pub mod quality_gate_use_case;
