pub mod bills;
pub mod configs;
pub mod health;

pub use health::{health_check, metrics_endpoint, readiness_check};
