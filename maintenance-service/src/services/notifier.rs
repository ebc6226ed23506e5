//! Outbound notifications about bills. Delivery itself belongs to the
//! notification service; failures here never fail a bill operation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use service_core::observability::TracedClientExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Notification rejected with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BillGenerated,
    BillsGeneratedSummary,
    BillPublished,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notify a single resident.
    async fn notify(&self, user_id: &str, notification: &Notification) -> Result<(), NotifyError>;

    /// Notify every admin of a society.
    async fn notify_admins(&self, society_id: &str, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Recipient<'a> {
    User { user_id: &'a str },
    SocietyAdmins { society_id: &'a str },
}

#[derive(Serialize)]
struct NotificationRequest<'a> {
    recipient: Recipient<'a>,
    #[serde(flatten)]
    notification: &'a Notification,
}

/// Posts notifications to the notification service with trace headers.
pub struct HttpNotifier {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpNotifier {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/notifications", base_url.trim_end_matches('/')),
            timeout,
        }
    }

    async fn post(&self, request: NotificationRequest<'_>) -> Result<(), NotifyError> {
        let response = self
            .client
            .traced_post(&self.endpoint)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| NotifyError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, user_id: &str, notification: &Notification) -> Result<(), NotifyError> {
        self.post(NotificationRequest {
            recipient: Recipient::User { user_id },
            notification,
        })
        .await
    }

    async fn notify_admins(&self, society_id: &str, notification: &Notification) -> Result<(), NotifyError> {
        self.post(NotificationRequest {
            recipient: Recipient::SocietyAdmins { society_id },
            notification,
        })
        .await
    }
}

/// Logs notifications instead of sending them. Used when no notification
/// service is configured.
#[derive(Default)]
pub struct LogNotifier {
    send_count: AtomicU64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: &str, notification: &Notification) -> Result<(), NotifyError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            user_id = %user_id,
            kind = ?notification.kind,
            title = %notification.title,
            "[LOG] Notification would be sent"
        );
        Ok(())
    }

    async fn notify_admins(&self, society_id: &str, notification: &Notification) -> Result<(), NotifyError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            society_id = %society_id,
            kind = ?notification.kind,
            title = %notification.title,
            "[LOG] Admin notification would be sent"
        );
        Ok(())
    }
}
