//! Test helper module for maintenance-service integration tests.
//!
//! Spawns the application on a random port with the in-memory store.

#![allow(dead_code)]

use maintenance_service::config::MaintenanceConfig;
use maintenance_service::startup::Application;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};

pub const SOCIETY_ID: &str = "society-greenwood";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: Client,
    pub interest_job_running: bool,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let mut config = MaintenanceConfig::default();
        config.common.port = 0;
        config.common.log_level = "warn".to_string();

        Self::spawn_with(config).await
    }

    pub async fn spawn_with(config: MaintenanceConfig) -> Self {
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        let port = app.port();
        let interest_job_running = app.interest_job_running();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
            interest_job_running,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/societies/{}{}", self.address, SOCIETY_ID, path)
    }

    /// Attach identity headers for `user_id` acting as `role`.
    pub fn as_user(&self, builder: RequestBuilder, user_id: &str, role: &str) -> RequestBuilder {
        builder
            .header("X-User-ID", user_id)
            .header("X-User-Name", format!("{} ({})", user_id, role))
            .header("X-User-Role", role)
    }

    pub async fn post_as(&self, path: &str, role: &str, body: &Value) -> Response {
        self.as_user(self.client.post(self.url(path)), &format!("{}-1", role), role)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn patch_as(&self, path: &str, role: &str, body: &Value) -> Response {
        self.as_user(self.client.patch(self.url(path)), &format!("{}-1", role), role)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_as(&self, path: &str, user_id: &str, role: &str) -> Response {
        self.as_user(self.client.get(self.url(path)), user_id, role)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete_as(&self, path: &str, role: &str) -> Response {
        self.as_user(self.client.delete(self.url(path)), &format!("{}-1", role), role)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Register the standard two-flat-type config.
    pub async fn seed_config(&self) {
        let response = self.post_as("/billing-configs", "admin", &billing_config("2024-01-01", "1000")).await;
        assert_eq!(response.status().as_u16(), 201, "config seed failed");
    }

    /// Generate bills for the standard flats and return the response body.
    pub async fn generate(&self, body: &Value) -> Value {
        let response = self.post_as("/bills/generate", "staff", body).await;
        assert_eq!(response.status().as_u16(), 201, "generation failed");
        response.json().await.expect("Failed to parse JSON")
    }

    pub async fn transition(&self, bill_id: &str, role: &str, status: &str, expected_version: u64) -> Response {
        self.post_as(
            &format!("/bills/{}/transitions", bill_id),
            role,
            &json!({ "status": status, "expected_version": expected_version }),
        )
        .await
    }
}

pub fn billing_config(effective_from: &str, maintenance_2bhk: &str) -> Value {
    json!({
        "effective_from": effective_from,
        "flat_types": ["1BHK", "2BHK"],
        "categories": [
            { "key": "maintenance", "label": "Maintenance", "per_flat_type": { "1BHK": "800", "2BHK": maintenance_2bhk } },
            { "key": "water", "label": "Water", "per_flat_type": { "1BHK": "100", "2BHK": "150" } }
        ],
        "discount_rules": [
            { "type": "early_payment", "label": "Early payment", "before_days": 10, "rate_type": "percent", "amount": "5" }
        ],
        "interest_rules": {
            "enabled": true,
            "days_after_due": 0,
            "rate_type": "percent",
            "amount": "2",
            "compounding": "monthly"
        }
    })
}

pub fn flats() -> Value {
    json!([
        { "flat_number": "A-101", "flat_type": "1BHK", "user_id": "resident-a" },
        { "flat_number": "A-102", "flat_type": "2BHK", "user_id": "resident-b" }
    ])
}
