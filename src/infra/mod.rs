// Adapters behind the app ports

pub mod catalog;
pub mod json_sink;
pub mod quality_results_adapter;
pub mod run_store;
