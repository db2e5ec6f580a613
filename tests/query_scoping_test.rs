//! List endpoints scope results by the caller's role before applying any
//! client filter.

mod common;

use axum::http::StatusCode;
use common::{error_code, TestApp};
use serde_json::{json, Value};

fn ids(page: &Value) -> Vec<String> {
    page["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn buyers_see_only_their_own_orders() {
    let app = TestApp::new().await;
    let mine = app.place_order(&app.users.buyer, false).await;
    let theirs = app.place_order(&app.users.other_buyer, false).await;

    let (status, page) = app.get("/api/v1/orders/me", &app.users.buyer).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&page), vec![mine["id"].as_str().unwrap().to_string()]);

    let (status, body) = app
        .get(
            &format!("/api/v1/orders/{}", theirs["id"].as_str().unwrap()),
            &app.users.buyer,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "forbidden");

    let (_, all) = app.get("/api/v1/orders", &app.users.admin).await;
    assert_eq!(all["data"]["total"], 2);
}

#[tokio::test]
async fn admin_only_lists_are_forbidden_to_others() {
    let app = TestApp::new().await;
    for (uri, user) in [
        ("/api/v1/orders", &app.users.buyer),
        ("/api/v1/deliveries", &app.users.driver),
        ("/api/v1/users", &app.users.farmer),
        ("/api/v1/harvest/admin/requests", &app.users.agronomist),
    ] {
        let (status, body) = app.get(uri, user).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(error_code(&body), "forbidden");
    }
}

#[tokio::test]
async fn drivers_see_only_assigned_deliveries() {
    let app = TestApp::new().await;
    let first = app.place_order(&app.users.buyer, true).await;
    let second = app.place_order(&app.users.other_buyer, true).await;
    let first_delivery = app
        .delivery_for(first["id"].as_str().unwrap(), &app.users.buyer)
        .await;
    let second_delivery = app
        .delivery_for(second["id"].as_str().unwrap(), &app.users.other_buyer)
        .await;

    app.post(
        &format!(
            "/api/v1/deliveries/{}/assign",
            first_delivery["id"].as_str().unwrap()
        ),
        &app.users.admin,
        json!({ "driverId": app.users.driver.id() }),
    )
    .await;

    let (_, page) = app.get("/api/v1/deliveries/driver/me", &app.users.driver).await;
    assert_eq!(
        ids(&page),
        vec![first_delivery["id"].as_str().unwrap().to_string()]
    );

    let (_, page) = app
        .get("/api/v1/deliveries/driver/me", &app.users.other_driver)
        .await;
    assert_eq!(page["data"]["total"], 0);

    let (status, _) = app
        .get(
            &format!("/api/v1/deliveries/{}", second_delivery["id"].as_str().unwrap()),
            &app.users.driver,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, page) = app.get("/api/v1/deliveries/me", &app.users.other_buyer).await;
    assert_eq!(
        ids(&page),
        vec![second_delivery["id"].as_str().unwrap().to_string()]
    );
}

#[tokio::test]
async fn agronomists_see_the_open_pool_and_their_own_assignments() {
    let app = TestApp::new().await;
    let pooled = app.request_harvest().await;
    let assigned_to_other = app.request_harvest().await;
    let assigned_to_me = app.request_harvest().await;

    for (request, expert) in [
        (&assigned_to_other, &app.users.other_agronomist),
        (&assigned_to_me, &app.users.agronomist),
    ] {
        let (status, body) = app
            .post(
                &format!(
                    "/api/v1/harvest/{}/admin/schedule",
                    request["id"].as_str().unwrap()
                ),
                &app.users.admin,
                json!({ "expertId": expert.id() }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (_, page) = app.get("/api/v1/harvest/requests", &app.users.agronomist).await;
    let mut visible = ids(&page);
    visible.sort();
    let mut expected = vec![
        pooled["id"].as_str().unwrap().to_string(),
        assigned_to_me["id"].as_str().unwrap().to_string(),
    ];
    expected.sort();
    assert_eq!(visible, expected);

    let (_, page) = app
        .get("/api/v1/harvest/agronomist/assigned", &app.users.agronomist)
        .await;
    assert_eq!(
        ids(&page),
        vec![assigned_to_me["id"].as_str().unwrap().to_string()]
    );

    let (status, _) = app
        .get(
            &format!("/api/v1/harvest/{}", assigned_to_other["id"].as_str().unwrap()),
            &app.users.agronomist,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The farmer sees all three; another role sees none.
    let (_, page) = app.get("/api/v1/harvest/requests", &app.users.farmer).await;
    assert_eq!(page["data"]["total"], 3);
    let (_, page) = app.get("/api/v1/harvest/requests", &app.users.buyer).await;
    assert_eq!(page["data"]["total"], 0);
}

#[tokio::test]
async fn status_filter_accepts_comma_separated_values() {
    let app = TestApp::new().await;
    let paid = app.place_order(&app.users.buyer, false).await;
    let cancelled = app.place_order(&app.users.buyer, false).await;
    app.place_order(&app.users.buyer, false).await;

    app.set_order_status(paid["id"].as_str().unwrap(), "PAID").await;
    app.set_order_status(cancelled["id"].as_str().unwrap(), "CANCELLED")
        .await;

    let (status, page) = app
        .get("/api/v1/orders/me?status=paid,CANCELLED", &app.users.buyer)
        .await;
    assert_eq!(status, StatusCode::OK);
    let mut found = ids(&page);
    found.sort();
    let mut expected = vec![
        paid["id"].as_str().unwrap().to_string(),
        cancelled["id"].as_str().unwrap().to_string(),
    ];
    expected.sort();
    assert_eq!(found, expected);

    let (status, body) = app
        .get("/api/v1/orders/me?status=PAID,LOST", &app.users.buyer)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "validation_error");
}

#[tokio::test]
async fn search_and_pagination_narrow_the_scoped_set() {
    let app = TestApp::new().await;
    for _ in 0..5 {
        app.place_order(&app.users.buyer, false).await;
    }
    app.place_order(&app.users.other_buyer, false).await;

    let (_, page) = app
        .get("/api/v1/orders/me?page=2&limit=2", &app.users.buyer)
        .await;
    assert_eq!(page["data"]["total"], 5);
    assert_eq!(page["data"]["page"], 2);
    assert_eq!(page["data"]["limit"], 2);
    assert_eq!(page["data"]["totalPages"], 3);
    assert_eq!(page["data"]["items"].as_array().unwrap().len(), 2);

    let (_, page) = app
        .get("/api/v1/orders/me?page=3&limit=2", &app.users.buyer)
        .await;
    assert_eq!(page["data"]["items"].as_array().unwrap().len(), 1);

    // Order numbers share the date prefix; search matches case-insensitively
    // but never widens past the caller's own orders.
    let (_, page) = app
        .get("/api/v1/orders/me?search=ord-20250407", &app.users.buyer)
        .await;
    assert_eq!(page["data"]["total"], 5);

    let (_, page) = app
        .get("/api/v1/orders/me?search=no-such-order", &app.users.buyer)
        .await;
    assert_eq!(page["data"]["total"], 0);
}

#[tokio::test]
async fn page_beyond_addressable_range_is_a_validation_error() {
    let app = TestApp::new().await;
    app.place_order(&app.users.buyer, false).await;

    let (status, body) = app
        .get("/api/v1/orders/me?page=18446744073709551615", &app.users.buyer)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(error_code(&body), "validation_error");

    // A far but addressable page is simply empty.
    let (status, page) = app
        .get("/api/v1/orders/me?page=1000000", &app.users.buyer)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["data"]["total"], 1);
    assert_eq!(page["data"]["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn admin_filters_users_by_role_and_availability() {
    let app = TestApp::new().await;
    app.patch(
        "/api/v1/users/me/availability",
        &app.users.other_driver,
        json!({ "availability": "UNAVAILABLE" }),
    )
    .await;

    let (status, page) = app
        .get(
            "/api/v1/users?role=DRIVER&availability=AVAILABLE",
            &app.users.admin,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        ids(&page),
        vec![app.users.driver.id().to_string()]
    );

    let (_, page) = app
        .get("/api/v1/users?role=agronomist", &app.users.admin)
        .await;
    assert_eq!(page["data"]["total"], 2);
}
