//! Effective-date selection of billing configs.

use super::error::EngineError;
use crate::models::{BillingConfig, Period};

/// Pick the config in force on the first day of `period`: the latest
/// `effective_from` not after that day. On equal dates the config appended
/// last wins.
pub fn resolve(configs: &[BillingConfig], period: Period) -> Result<&BillingConfig, EngineError> {
    let first_day = period.first_day();
    configs
        .iter()
        .filter(|config| config.effective_from <= first_day)
        .max_by_key(|config| config.effective_from)
        .ok_or(EngineError::ConfigNotFound { period })
}
