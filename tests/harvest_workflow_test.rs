//! Harvest assistance from request to completion, including an agronomist
//! declining and the request returning to the pool.

mod common;

use axum::http::StatusCode;
use common::{error_code, TestApp, TestUser};
use serde_json::{json, Value};

async fn assign_expert(app: &TestApp, id: &str, expert: &TestUser) -> (StatusCode, Value) {
    app.post(
        &format!("/api/v1/harvest/{id}/admin/schedule"),
        &app.users.admin,
        json!({
            "expertId": expert.id(),
            "adminAdvice": "Check moisture before cutting",
            "scheduledDate": "2025-05-18"
        }),
    )
    .await
}

fn statuses(history: &Value) -> Vec<String> {
    history["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["toStatus"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn rejected_request_returns_to_pool_and_completes_with_second_agronomist() {
    let app = TestApp::new().await;
    let request = app.request_harvest().await;
    let id = request["id"].as_str().unwrap().to_string();
    assert_eq!(request["status"], "REQUEST_PENDING");
    assert!(request["expertId"].is_null());

    let (status, body) = assign_expert(&app, &id, &app.users.agronomist).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "ASSIGNED");
    assert_eq!(body["data"]["expertName"], "Amaka Agro");

    let (status, body) = app
        .post(
            &format!("/api/v1/harvest/{id}/accept"),
            &app.users.agronomist,
            json!({ "action": "reject", "notes": "fully booked this month" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "REQUEST_PENDING");
    assert!(body["data"]["expertId"].is_null());

    let (status, _) = assign_expert(&app, &id, &app.users.other_agronomist).await;
    assert_eq!(status, StatusCode::OK);

    // The first agronomist is no longer involved.
    let (status, _) = app
        .post(
            &format!("/api/v1/harvest/{id}/accept"),
            &app.users.agronomist,
            json!({ "action": "accept" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            &format!("/api/v1/harvest/{id}/accept"),
            &app.users.other_agronomist,
            json!({ "action": "accept" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "ACCEPTED");
    let timeline = body["data"]["harvestSchedule"]["timeline"].as_array().unwrap();
    assert_eq!(timeline.len(), 4);
    assert!(timeline.iter().all(|p| p["status"] == "PENDING"));

    let (status, body) = app
        .post(
            &format!("/api/v1/harvest/{id}/schedule"),
            &app.users.other_agronomist,
            json!({ "notes": "crew booked" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "SCHEDULED");
    assert_eq!(body["data"]["scheduledDate"], "2025-05-18");

    let (status, body) = app
        .post(
            &format!("/api/v1/harvest/{id}/update"),
            &app.users.farmer,
            json!({ "progress": 10, "notes": "first rows cut" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "IN_PROGRESS");
    assert_eq!(body["data"]["tracking"][0]["progress"], 10);

    let (status, body) = app
        .post(
            &format!("/api/v1/harvest/{id}/status"),
            &app.users.farmer,
            json!({ "status": "COMPLETED", "note": "all in storage" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "COMPLETED");

    let (_, history) = app
        .get(&format!("/api/v1/harvest/{id}/history"), &app.users.farmer)
        .await;
    assert_eq!(
        statuses(&history),
        vec![
            "REQUEST_PENDING",
            "ASSIGNED",
            "REQUEST_PENDING",
            "ASSIGNED",
            "ACCEPTED",
            "SCHEDULED",
            "IN_PROGRESS",
            "COMPLETED"
        ]
    );

    // Terminal: every further move is refused.
    for target in ["CANCELLED", "IN_PROGRESS", "REQUEST_PENDING", "ACCEPTED"] {
        let (status, body) = app
            .post(
                &format!("/api/v1/harvest/{id}/status"),
                &app.users.admin,
                json!({ "status": target }),
            )
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{target}");
        assert_eq!(error_code(&body), "invalid_transition");
    }
    let (status, _) = app
        .post(
            &format!("/api/v1/harvest/{id}/update"),
            &app.users.farmer,
            json!({ "progress": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn accept_uses_supplied_phases_and_phase_updates_stamp_completion() {
    let app = TestApp::new().await;
    let request = app.request_harvest().await;
    let id = request["id"].as_str().unwrap().to_string();
    assign_expert(&app, &id, &app.users.agronomist).await;

    let (status, body) = app
        .post(
            &format!("/api/v1/harvest/{id}/accept"),
            &app.users.agronomist,
            json!({
                "action": "accept",
                "phases": [
                    { "phase": "Soil test", "activities": ["Sample three plots"] },
                    { "phase": "Harvest" }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let timeline = body["data"]["harvestSchedule"]["timeline"].as_array().unwrap();
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline[0]["phase"], "Soil test");
    assert_eq!(timeline[1]["position"], 2);

    let (status, body) = app
        .post(
            &format!("/api/v1/harvest/{id}/phases/1"),
            &app.users.agronomist,
            json!({ "status": "COMPLETED", "notes": "pH 6.2" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "COMPLETED");
    assert!(!body["data"]["completedAt"].is_null());

    // The farmer does not edit the plan.
    let (status, _) = app
        .post(
            &format!("/api/v1/harvest/{id}/phases/2"),
            &app.users.farmer,
            json!({ "status": "IN_PROGRESS" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            &format!("/api/v1/harvest/{id}/phases/9"),
            &app.users.agronomist,
            json!({ "status": "IN_PROGRESS" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn progress_never_goes_backwards() {
    let app = TestApp::new().await;
    let request = app.request_harvest().await;
    let id = request["id"].as_str().unwrap().to_string();
    assign_expert(&app, &id, &app.users.agronomist).await;
    app.post(
        &format!("/api/v1/harvest/{id}/accept"),
        &app.users.agronomist,
        json!({ "action": "accept" }),
    )
    .await;

    // Not started yet.
    let (status, _) = app
        .post(
            &format!("/api/v1/harvest/{id}/update"),
            &app.users.agronomist,
            json!({ "progress": 5 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    app.post(
        &format!("/api/v1/harvest/{id}/schedule"),
        &app.users.agronomist,
        json!({ "scheduledDate": "2025-05-19" }),
    )
    .await;

    let (status, _) = app
        .post(
            &format!("/api/v1/harvest/{id}/update"),
            &app.users.agronomist,
            json!({ "progress": 40 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(
            &format!("/api/v1/harvest/{id}/update"),
            &app.users.agronomist,
            json!({ "progress": 30 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "validation_error");

    let (status, _) = app
        .post(
            &format!("/api/v1/harvest/{id}/update"),
            &app.users.agronomist,
            json!({ "progress": 101 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, detail) = app
        .get(&format!("/api/v1/harvest/{id}"), &app.users.farmer)
        .await;
    let tracking = detail["data"]["tracking"].as_array().unwrap();
    assert_eq!(tracking.len(), 1);
    assert_eq!(detail["data"]["status"], "IN_PROGRESS");
}

#[tokio::test]
async fn only_the_farmer_cancels_and_unassign_clears_the_plan() {
    let app = TestApp::new().await;
    let request = app.request_harvest().await;
    let id = request["id"].as_str().unwrap().to_string();
    assign_expert(&app, &id, &app.users.agronomist).await;
    app.post(
        &format!("/api/v1/harvest/{id}/accept"),
        &app.users.agronomist,
        json!({ "action": "accept" }),
    )
    .await;

    let (status, body) = app
        .post(
            &format!("/api/v1/harvest/{id}/unassign"),
            &app.users.admin,
            json!({ "reason": "agronomist relocated" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "REQUEST_PENDING");
    assert!(body["data"]["expertId"].is_null());
    assert!(body["data"]["harvestSchedule"].is_null());

    assign_expert(&app, &id, &app.users.other_agronomist).await;
    let (status, _) = app
        .post(
            &format!("/api/v1/harvest/{id}/status"),
            &app.users.other_agronomist,
            json!({ "status": "CANCELLED" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            &format!("/api/v1/harvest/{id}/status"),
            &app.users.farmer,
            json!({ "status": "CANCELLED", "note": "sold standing crop" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "CANCELLED");
}

#[tokio::test]
async fn only_farmers_request_assistance() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post(
            "/api/v1/harvest/request",
            &app.users.buyer,
            json!({
                "crop": "Cassava",
                "expectedYield": "2",
                "harvestDate": "2025-06-01"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "forbidden");

    let (status, _) = app
        .post(
            "/api/v1/harvest/request",
            &app.users.farmer,
            json!({
                "crop": "Cassava",
                "expectedYield": "0",
                "harvestDate": "2025-06-01"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
