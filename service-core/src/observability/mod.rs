pub mod logging;
pub mod trace_context;

pub use logging::init_tracing;
pub use trace_context::{trace_headers, TracedClientExt, TracedRequest};
