use crate::models::{ApprovalStatus, Period};
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("no billing config effective for period {period}")]
    ConfigNotFound { period: Period },

    #[error("category '{category}' has no rate for flat type '{flat_type}' (flat {flat_number})")]
    MissingRate {
        category: String,
        flat_type: String,
        flat_number: String,
    },

    #[error("cannot move bill from {from} to {to}")]
    InvalidTransition {
        from: ApprovalStatus,
        to: ApprovalStatus,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("bill {bill_id} was modified concurrently (expected version {expected})")]
    Conflict { bill_id: String, expected: u64 },

    #[error("interest over {periods} overdue periods exceeds the representable amount; set a max_amount")]
    InterestOverflow { periods: u32 },

    #[error("failed to snapshot entity: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(_)
            | EngineError::ConfigNotFound { .. }
            | EngineError::MissingRate { .. }
            | EngineError::InvalidTransition { .. }
            | EngineError::InterestOverflow { .. } => AppError::BadRequest(err.into()),
            EngineError::Forbidden(_) => AppError::Forbidden(err.into()),
            EngineError::Conflict { .. } => AppError::Conflict(err.into()),
            EngineError::Snapshot(_) => AppError::InternalError(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn maps_to_http_statuses() {
        let period: Period = "2024-05".parse().unwrap();
        let cases = [
            (EngineError::validation("due_date is required"), StatusCode::BAD_REQUEST),
            (EngineError::ConfigNotFound { period }, StatusCode::BAD_REQUEST),
            (
                EngineError::InvalidTransition {
                    from: ApprovalStatus::Draft,
                    to: ApprovalStatus::Published,
                },
                StatusCode::BAD_REQUEST,
            ),
            (EngineError::Forbidden("nope".into()), StatusCode::FORBIDDEN),
            (
                EngineError::Conflict {
                    bill_id: "b-1".into(),
                    expected: 2,
                },
                StatusCode::CONFLICT,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn transition_message_names_both_states() {
        let err = EngineError::InvalidTransition {
            from: ApprovalStatus::Draft,
            to: ApprovalStatus::Published,
        };
        assert_eq!(err.to_string(), "cannot move bill from draft to published");
    }
}
