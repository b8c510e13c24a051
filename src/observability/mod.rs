// Observability: metrics recording and Pushgateway export

pub mod metrics;
