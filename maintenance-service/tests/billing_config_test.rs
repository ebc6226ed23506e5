//! Billing config integration tests.

mod common;

use common::{billing_config, TestApp};
use serde_json::Value;

#[tokio::test]
async fn configs_are_listed_in_insertion_order() {
    let app = TestApp::spawn().await;
    app.seed_config().await;
    let response = app
        .post_as("/billing-configs", "admin", &billing_config("2024-06-01", "1200"))
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["audit_trail"][0]["change_type"], "created");
    assert_eq!(created["audit_trail"][0]["changed_by"], "admin-1");

    let body: Value = app
        .get_as("/billing-configs", "staff-1", "staff")
        .await
        .json()
        .await
        .unwrap();
    let configs = body["billing_configs"].as_array().unwrap();
    assert_eq!(configs.len(), 2);
    assert_eq!(configs[0]["effective_from"], "2024-01-01");
    assert_eq!(configs[1]["effective_from"], "2024-06-01");
}

#[tokio::test]
async fn config_missing_a_rate_is_rejected() {
    let app = TestApp::spawn().await;
    let mut config = billing_config("2024-01-01", "1000");
    config["flat_types"] = serde_json::json!(["1BHK", "2BHK", "3BHK"]);

    let response = app.post_as("/billing-configs", "admin", &config).await;
    assert_eq!(response.status().as_u16(), 400);
    let error: Value = response.json().await.unwrap();
    assert!(error["error"].as_str().unwrap().contains("3BHK"));
}

#[tokio::test]
async fn only_admins_change_configs() {
    let app = TestApp::spawn().await;
    let response = app
        .post_as("/billing-configs", "staff", &billing_config("2024-01-01", "1000"))
        .await;
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn identity_headers_are_required() {
    let app = TestApp::spawn().await;
    let response = app
        .client
        .get(app.url("/billing-configs"))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 401);
}
