//! End-to-end order lifecycle: placement, forward transitions, the buyer
//! cancellation window and the order → delivery cancellation cascade.

mod common;

use axum::http::StatusCode;
use chrono::Duration;
use common::{error_code, TestApp};
use serde_json::json;

#[tokio::test]
async fn delivery_order_total_includes_fee_and_creates_pending_delivery() {
    let app = TestApp::new().await;
    let order = app.place_order(&app.users.buyer, true).await;

    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["deliveryType"], "DELIVERY");
    // 3 × 120.00 + 45.50 + 50.00 delivery fee
    assert_eq!(order["subtotal"].as_str().map(|s| s.parse::<f64>().unwrap()), Some(405.5));
    assert_eq!(order["total"].as_str().map(|s| s.parse::<f64>().unwrap()), Some(455.5));
    assert!(order["orderNumber"]
        .as_str()
        .unwrap()
        .starts_with("ORD-20250407-"));

    let delivery = app
        .delivery_for(order["id"].as_str().unwrap(), &app.users.buyer)
        .await;
    assert_eq!(delivery["status"], "PENDING");
    assert!(delivery["driverId"].is_null());
    assert_eq!(delivery["statusHistory"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn pickup_order_has_no_fee_and_no_delivery() {
    let app = TestApp::new().await;
    let order = app.place_order(&app.users.buyer, false).await;
    let order_id = order["id"].as_str().unwrap();

    assert_eq!(order["deliveryFee"].as_str().map(|s| s.parse::<f64>().unwrap()), Some(0.0));

    let (status, body) = app
        .get(&format!("/api/v1/deliveries/order/{order_id}"), &app.users.buyer)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "not_found");

    // Cancelling never creates one either.
    let (status, _) = app
        .patch(
            &format!("/api/v1/orders/{order_id}/cancel"),
            &app.users.buyer,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .get(&format!("/api/v1/deliveries/order/{order_id}"), &app.users.admin)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, deliveries) = app.get("/api/v1/deliveries", &app.users.admin).await;
    assert_eq!(deliveries["data"]["total"], 0);
}

#[tokio::test]
async fn order_must_advance_one_step_at_a_time() {
    let app = TestApp::new().await;
    let order = app.place_order(&app.users.buyer, false).await;
    let id = order["id"].as_str().unwrap();

    let (status, body) = app.set_order_status(id, "PAID").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "PAID");

    let (status, body) = app.set_order_status(id, "DELIVERED").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "invalid_transition");
    let (_, current) = app.get(&format!("/api/v1/orders/{id}"), &app.users.buyer).await;
    assert_eq!(current["data"]["status"], "PAID");

    for next in ["PROCESSING", "SHIPPED", "DELIVERED"] {
        let (status, body) = app.set_order_status(id, next).await;
        assert_eq!(status, StatusCode::OK, "{next}: {body}");
        assert_eq!(body["data"]["status"], next);
    }

    let (_, history) = app
        .get(&format!("/api/v1/orders/{id}/history"), &app.users.buyer)
        .await;
    let trail: Vec<&str> = history["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["toStatus"].as_str().unwrap())
        .collect();
    assert_eq!(
        trail,
        vec!["PENDING", "PAID", "PROCESSING", "SHIPPED", "DELIVERED"]
    );

    // Terminal.
    let (status, body) = app
        .patch(
            &format!("/api/v1/orders/{id}/cancel"),
            &app.users.admin,
            json!({ "reason": "too late" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "invalid_transition");
}

#[tokio::test]
async fn buyer_may_pay_but_not_ship() {
    let app = TestApp::new().await;
    let order = app.place_order(&app.users.buyer, false).await;
    let id = order["id"].as_str().unwrap();

    let (status, _) = app
        .patch(
            &format!("/api/v1/orders/{id}/status"),
            &app.users.buyer,
            json!({ "status": "PAID" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .patch(
            &format!("/api/v1/orders/{id}/status"),
            &app.users.buyer,
            json!({ "status": "PROCESSING" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "forbidden");

    let (status, _) = app
        .patch(
            &format!("/api/v1/orders/{id}/status"),
            &app.users.other_buyer,
            json!({ "status": "CANCELLED" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn buyer_can_cancel_at_23_hours() {
    let app = TestApp::new().await;
    let order = app.place_order(&app.users.buyer, false).await;
    let id = order["id"].as_str().unwrap();
    app.set_order_status(id, "PAID").await;

    app.clock.advance(Duration::hours(23));
    let (status, body) = app
        .patch(
            &format!("/api/v1/orders/{id}/cancel"),
            &app.users.buyer,
            json!({ "reason": "changed my mind" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "CANCELLED");
}

#[tokio::test]
async fn buyer_cannot_cancel_at_25_hours_but_admin_can() {
    let app = TestApp::new().await;
    let order = app.place_order(&app.users.buyer, false).await;
    let id = order["id"].as_str().unwrap();
    app.set_order_status(id, "PAID").await;

    app.clock.advance(Duration::hours(25));
    let (status, body) = app
        .patch(
            &format!("/api/v1/orders/{id}/cancel"),
            &app.users.buyer,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "forbidden");
    let (_, current) = app.get(&format!("/api/v1/orders/{id}"), &app.users.buyer).await;
    assert_eq!(current["data"]["status"], "PAID");

    let (status, _) = app
        .patch(
            &format!("/api/v1/orders/{id}/cancel"),
            &app.users.admin,
            json!({ "reason": "stock lost" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn cancelling_order_cancels_live_delivery() {
    let app = TestApp::new().await;
    let order = app.place_order(&app.users.buyer, true).await;
    let order_id = order["id"].as_str().unwrap();
    let delivery = app.delivery_for(order_id, &app.users.buyer).await;
    let delivery_id = delivery["id"].as_str().unwrap();

    let (status, _) = app
        .post(
            &format!("/api/v1/deliveries/{delivery_id}/assign"),
            &app.users.admin,
            json!({ "driverId": app.users.driver.id() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .patch(
            &format!("/api/v1/orders/{order_id}/cancel"),
            &app.users.buyer,
            json!({ "reason": "no longer needed" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let delivery = app.delivery_for(order_id, &app.users.admin).await;
    assert_eq!(delivery["status"], "CANCELLED");

    let (_, history) = app
        .get(
            &format!("/api/v1/deliveries/{delivery_id}/history"),
            &app.users.admin,
        )
        .await;
    let last = history["data"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["fromStatus"], "ASSIGNED");
    assert_eq!(last["toStatus"], "CANCELLED");
    assert_eq!(last["note"], "cascade: order cancelled");
    assert_eq!(last["actorId"], app.users.buyer.id().to_string());
}

#[tokio::test]
async fn cancelling_order_leaves_completed_delivery_alone() {
    let app = TestApp::new().await;
    let order = app.place_order(&app.users.buyer, true).await;
    let order_id = order["id"].as_str().unwrap();
    let delivery = app.delivery_for(order_id, &app.users.buyer).await;
    let delivery_id = delivery["id"].as_str().unwrap();

    app.post(
        &format!("/api/v1/deliveries/{delivery_id}/assign"),
        &app.users.admin,
        json!({ "driverId": app.users.driver.id() }),
    )
    .await;
    for next in ["PREPARING", "COLLECTED", "IN_TRANSIT", "COMPLETED"] {
        let (status, body) = app
            .post(
                &format!("/api/v1/deliveries/{delivery_id}/status"),
                &app.users.driver,
                json!({ "status": next }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{next}: {body}");
    }

    let (status, _) = app
        .patch(
            &format!("/api/v1/orders/{order_id}/cancel"),
            &app.users.admin,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let delivery = app.delivery_for(order_id, &app.users.admin).await;
    assert_eq!(delivery["status"], "COMPLETED");
}

#[tokio::test]
async fn cancelling_delivery_never_cancels_order() {
    let app = TestApp::new().await;
    let order = app.place_order(&app.users.buyer, true).await;
    let order_id = order["id"].as_str().unwrap();
    let delivery = app.delivery_for(order_id, &app.users.buyer).await;

    let (status, body) = app
        .post(
            &format!("/api/v1/deliveries/{}/status", delivery["id"].as_str().unwrap()),
            &app.users.buyer,
            json!({ "status": "CANCELLED", "note": "will collect myself" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, current) = app
        .get(&format!("/api/v1/orders/{order_id}"), &app.users.buyer)
        .await;
    assert_eq!(current["data"]["status"], "PENDING");
}

#[tokio::test]
async fn unknown_status_is_a_validation_error() {
    let app = TestApp::new().await;
    let order = app.place_order(&app.users.buyer, false).await;
    let (status, body) = app
        .set_order_status(order["id"].as_str().unwrap(), "TELEPORTED")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "validation_error");
}

#[tokio::test]
async fn overflowing_order_total_is_rejected() {
    let app = TestApp::new().await;
    let (status, body) = app
        .post(
            "/api/v1/orders",
            &app.users.buyer,
            json!({
                "items": [{
                    "listingId": uuid::Uuid::new_v4(),
                    "quantity": 2,
                    "unitPrice": "79228162514264337593543950335"
                }],
                "deliveryType": "PICKUP"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(error_code(&body), "validation_error");

    let (_, page) = app.get("/api/v1/orders/me", &app.users.buyer).await;
    assert_eq!(page["data"]["total"], 0);
}
