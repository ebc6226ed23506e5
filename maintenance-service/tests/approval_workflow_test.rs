//! Approval workflow integration tests.

mod common;

use common::{flats, TestApp};
use serde_json::{json, Value};

async fn draft_bill(app: &TestApp) -> String {
    app.seed_config().await;
    let body = app
        .generate(&json!({ "due_date": "2099-12-31", "flats": flats(), "period": "2024-05" }))
        .await;
    body["bills"][0]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn full_approval_path_records_history() {
    let app = TestApp::spawn().await;
    let bill_id = draft_bill(&app).await;

    let response = app.transition(&bill_id, "staff", "pending_approval", 1).await;
    assert_eq!(response.status().as_u16(), 200);
    let response = app.transition(&bill_id, "approver", "approved", 2).await;
    assert_eq!(response.status().as_u16(), 200);
    let response = app.transition(&bill_id, "admin", "published", 3).await;
    assert_eq!(response.status().as_u16(), 200);

    let bill: Value = response.json().await.unwrap();
    assert_eq!(bill["approval_status"], "published");
    assert_eq!(bill["version"], 4);

    let history: Vec<&str> = bill["approval_history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["status"].as_str().unwrap())
        .collect();
    assert_eq!(history, vec!["draft", "pending_approval", "approved", "published"]);
    assert_eq!(bill["approval_history"][2]["changed_by"], "approver-1");

    let audit = bill["audit_trail"].as_array().unwrap();
    assert_eq!(audit.len(), 4);
    assert_eq!(audit[3]["field"], "approval_status");
    assert_eq!(audit[3]["before"]["approval_status"], "approved");
    assert_eq!(audit[3]["after"]["approval_status"], "published");
}

#[tokio::test]
async fn draft_cannot_be_published_directly() {
    let app = TestApp::spawn().await;
    let bill_id = draft_bill(&app).await;

    let response = app.transition(&bill_id, "admin", "published", 1).await;
    assert_eq!(response.status().as_u16(), 400);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["error"], "cannot move bill from draft to published");
    assert_eq!(error["code"], "bad_request");

    let bill: Value = app
        .get_as(&format!("/bills/{}", bill_id), "staff-1", "staff")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(bill["approval_status"], "draft");
    assert_eq!(bill["version"], 1);
}

#[tokio::test]
async fn only_approvers_approve() {
    let app = TestApp::spawn().await;
    let bill_id = draft_bill(&app).await;
    app.transition(&bill_id, "staff", "pending_approval", 1).await;

    let response = app.transition(&bill_id, "admin", "approved", 2).await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app.transition(&bill_id, "approver", "rejected", 2).await;
    assert_eq!(response.status().as_u16(), 200);
    let bill: Value = response.json().await.unwrap();
    assert_eq!(bill["approval_status"], "rejected");

    let response = app.transition(&bill_id, "staff", "pending_approval", 3).await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn stale_version_is_a_conflict() {
    let app = TestApp::spawn().await;
    let bill_id = draft_bill(&app).await;

    let first = app.transition(&bill_id, "staff", "pending_approval", 1).await;
    assert_eq!(first.status().as_u16(), 200);

    let second = app.transition(&bill_id, "approver", "approved", 1).await;
    assert_eq!(second.status().as_u16(), 409);
    let error: Value = second.json().await.unwrap();
    assert_eq!(error["code"], "conflict");
}
