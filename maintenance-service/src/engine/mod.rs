//! Bill calculation and lifecycle engine. Everything in here is pure: no
//! I/O, no clock reads. Callers pass `now` explicitly.

pub mod charges;
pub mod error;
pub mod factory;
pub mod interest;
pub mod resolver;
pub mod update;
pub mod workflow;

pub use charges::{compute_charges, ChargeBreakdown};
pub use error::EngineError;
pub use factory::{
    build_bill, build_manual_bill, generate, generate_batch, BatchOutcome, FailurePolicy,
    GenerationContext, PeriodFailure,
};
pub use interest::{accrue, InterestAccrual};
pub use resolver::resolve;
pub use update::apply_update;
pub use workflow::{authorize, transition, Permission};

use rust_decimal::{Decimal, RoundingStrategy};

/// Round a computed money amount to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `rate` percent of `base`.
pub(crate) fn percent_of(base: Decimal, rate: Decimal) -> Decimal {
    base * rate / Decimal::ONE_HUNDRED
}
