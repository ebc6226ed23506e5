pub mod billing;
pub mod database;
pub mod metrics;
pub mod notifier;
pub mod repository;

pub use billing::{BillingService, GenerateBills, GenerationReport, RecalculationReport, SingleBill};
pub use database::MongoDb;
pub use metrics::{get_metrics, init_metrics};
pub use notifier::{HttpNotifier, LogNotifier, Notification, NotificationKind, Notifier, NotifyError};
pub use repository::{BillRepository, ConfigRepository, InMemoryStore, MongoStore, ReplaceOutcome};
