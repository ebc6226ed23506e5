//! Bill generation integration tests.

mod common;

use common::{billing_config, flats, TestApp};
use rust_decimal::Decimal;
use serde_json::{json, Value};

fn decimal(value: &Value) -> Decimal {
    value.as_str().expect("amount is a string").parse().expect("valid decimal")
}

#[tokio::test]
async fn generates_one_draft_bill_per_flat() {
    let app = TestApp::spawn().await;
    app.seed_config().await;

    let body = app
        .generate(&json!({
            "due_date": "2099-12-31",
            "notes": "May maintenance",
            "flats": flats(),
            "period": "2024-05"
        }))
        .await;

    assert_eq!(body["count"], 2);
    let bills = body["bills"].as_array().unwrap();
    for bill in bills {
        assert_eq!(bill["approval_status"], "draft");
        assert_eq!(bill["status"], "unpaid");
        assert_eq!(bill["version"], 1);
        assert_eq!(bill["approval_history"].as_array().unwrap().len(), 1);
        assert_eq!(bill["audit_trail"].as_array().unwrap().len(), 1);
        assert_eq!(bill["audit_trail"][0]["change_type"], "created");
        assert_eq!(bill["audit_trail"][0]["changed_by"], "staff-1");
        assert_eq!(bill["period"], "2024-05");

        let base: Decimal = bill["breakdown"]
            .as_object()
            .unwrap()
            .values()
            .map(decimal)
            .sum();
        let discount = bill.get("discount_amount").map(decimal).unwrap_or_default();
        assert_eq!(decimal(&bill["amount"]), base - discount);
    }

    let two_bhk = bills.iter().find(|b| b["flat_number"] == "A-102").unwrap();
    assert_eq!(decimal(&two_bhk["breakdown"]["maintenance"]), Decimal::from(1000));
    assert_eq!(decimal(&two_bhk["breakdown"]["water"]), Decimal::from(150));
    // 5% early payment on 1150
    assert_eq!(decimal(&two_bhk["discount_amount"]), "57.5".parse::<Decimal>().unwrap());
    assert_eq!(two_bhk["discount_reason"], "Early payment");
}

#[tokio::test]
async fn quarterly_request_resolves_config_per_period() {
    let app = TestApp::spawn().await;
    app.seed_config().await;
    let response = app
        .post_as("/billing-configs", "admin", &billing_config("2024-06-01", "1200"))
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let body = app
        .generate(&json!({
            "due_date": "2099-12-31",
            "flats": [{ "flat_number": "A-102", "flat_type": "2BHK", "user_id": "resident-b" }],
            "recurring": { "frequency": "quarterly", "count": 3, "start_period": "2024-01" }
        }))
        .await;

    let mut seen: Vec<(String, Decimal)> = body["bills"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| (b["period"].as_str().unwrap().to_string(), decimal(&b["breakdown"]["maintenance"])))
        .collect();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("2024-01".to_string(), Decimal::from(1000)),
            ("2024-04".to_string(), Decimal::from(1000)),
            ("2024-07".to_string(), Decimal::from(1200)),
        ]
    );
}

#[tokio::test]
async fn missing_rate_rejects_whole_request() {
    let app = TestApp::spawn().await;
    app.seed_config().await;

    let response = app
        .post_as(
            "/bills/generate",
            "staff",
            &json!({
                "due_date": "2099-12-31",
                "flats": [
                    { "flat_number": "A-101", "flat_type": "1BHK", "user_id": "resident-a" },
                    { "flat_number": "P-1", "flat_type": "penthouse", "user_id": "resident-p" }
                ],
                "period": "2024-05"
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["code"], "bad_request");
    assert!(error["error"].as_str().unwrap().contains("penthouse"));

    let list: Value = app.get_as("/bills", "staff-1", "staff").await.json().await.unwrap();
    assert_eq!(list["total"], 0);
}

#[tokio::test]
async fn period_without_config_is_rejected() {
    let app = TestApp::spawn().await;
    app.seed_config().await;

    let response = app
        .post_as(
            "/bills/generate",
            "staff",
            &json!({ "due_date": "2099-12-31", "flats": flats(), "periods": ["2024-02", "2023-11"] }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let error: Value = response.json().await.unwrap();
    assert!(error["error"].as_str().unwrap().contains("2023-11"));
}

#[tokio::test]
async fn missing_due_date_is_rejected() {
    let app = TestApp::spawn().await;
    app.seed_config().await;

    let response = app
        .post_as("/bills/generate", "staff", &json!({ "flats": flats(), "period": "2024-05" }))
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn residents_cannot_generate() {
    let app = TestApp::spawn().await;
    app.seed_config().await;

    let response = app
        .post_as(
            "/bills/generate",
            "resident",
            &json!({ "due_date": "2099-12-31", "flats": flats(), "period": "2024-05" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn residents_list_only_their_bills() {
    let app = TestApp::spawn().await;
    app.seed_config().await;
    app.generate(&json!({ "due_date": "2099-12-31", "flats": flats(), "period": "2024-05" }))
        .await;

    let staff_view: Value = app.get_as("/bills", "staff-1", "staff").await.json().await.unwrap();
    assert_eq!(staff_view["total"], 2);

    let resident_view: Value = app
        .get_as("/bills", "resident-a", "resident")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(resident_view["total"], 1);
    assert_eq!(resident_view["bills"][0]["user_id"], "resident-a");

    let filtered: Value = app
        .get_as("/bills?flat_number=A-102&period=2024-05", "staff-1", "staff")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(filtered["total"], 1);
    assert_eq!(filtered["bills"][0]["flat_number"], "A-102");
}

#[tokio::test]
async fn manual_bill_bypasses_rules() {
    let app = TestApp::spawn().await;

    let response = app
        .post_as(
            "/bills",
            "admin",
            &json!({
                "flat_number": "B-201",
                "user_id": "resident-c",
                "period": "2024-05",
                "amount": "2500",
                "due_date": "2099-12-31",
                "notes": "Lift repair contribution"
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let bill: Value = response.json().await.unwrap();
    assert_eq!(decimal(&bill["amount"]), Decimal::from(2500));
    assert_eq!(decimal(&bill["breakdown"]["manual"]), Decimal::from(2500));
    assert_eq!(bill["approval_status"], "draft");
    assert_eq!(bill["notes"], "Lift repair contribution");
}
