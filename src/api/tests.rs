use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::app_state::AppState;
use crate::config::Config;
use crate::db::models::location::NewLocation;
use crate::db::models::resource::NewResource;
use crate::db::users::NewUser;
use crate::middleware::auth::create_permission_cache;

// Seeded ids: users admin=1, alice=2, bob=3; locations 1 (available) and
// 2 (no network); resources 1 and 2, 10 units each.
fn test_app() -> Router {
    std::env::set_var("JWT_SECRET", "test-secret");
    Config::init().unwrap();

    let state = AppState::new(Duration::from_millis(250));
    for (username, password, role) in [
        ("admin", "admin-pass", "admin"),
        ("alice", "alice-pass", "user"),
        ("bob", "bob-pass", "user"),
    ] {
        state
            .users
            .create(NewUser {
                username: username.to_string(),
                password: password.to_string(),
                full_name: None,
                email: None,
                role: role.to_string(),
            })
            .unwrap();
    }
    state
        .locations
        .create(NewLocation {
            area_name: "North Campus".to_string(),
            is_network_available: true,
        })
        .unwrap();
    state
        .locations
        .create(NewLocation {
            area_name: "Old Depot".to_string(),
            is_network_available: false,
        })
        .unwrap();
    for name in ["Core Router", "Edge Switch"] {
        state
            .inventory
            .create(NewResource {
                resource_name: name.to_string(),
                quantity_total: 10,
            })
            .unwrap();
    }

    crate::build_app(state, create_permission_cache())
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": username, "password": password })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

fn new_request_body(resources: Value) -> Value {
    json!({
        "location_id": 1,
        "connection_type": "Fiber",
        "resources": resources,
    })
}

async fn create_request(app: &Router, token: &str, resources: Value) -> i64 {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/requests",
            Some(token),
            Some(new_request_body(resources)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body["data"]["request_id"].as_i64().unwrap()
}

async fn available(app: &Router, resource_id: i32) -> i64 {
    let (status, body) = send(
        app,
        request("GET", &format!("/resources/{resource_id}"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["quantity_available"].as_i64().unwrap()
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = test_app();

    let (status, _) = send(&app, request("GET", "/requests", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, request("GET", "/requests", Some("not-a-jwt"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Public reads stay open.
    let (status, _) = send(&app, request("GET", "/resources", None, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn register_login_profile_round_trip() {
    let app = test_app();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": "carol", "password": "carol-pass", "full_name": "Carol Reyes" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    assert_eq!(body["data"]["role"], "user");

    // Duplicate usernames are refused.
    let (status, _) = send(
        &app,
        request(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": "carol", "password": "other" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let token = login(&app, "carol", "carol-pass").await;
    let (status, body) = send(&app, request("GET", "/auth/profile", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "carol");
    assert_eq!(body["data"]["full_name"], "Carol Reyes");
}

#[tokio::test]
async fn create_request_reserves_until_exhaustion() {
    let app = test_app();
    let token = login(&app, "alice", "alice-pass").await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/requests",
            Some(&token),
            Some(new_request_body(json!([{ "resource_id": 1, "quantity": 6 }]))),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "Pending");
    assert_eq!(body["data"]["area_name"], "North Campus");
    assert_eq!(available(&app, 1).await, 4);

    // Second identical request cannot be satisfied any more.
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/requests",
            Some(&token),
            Some(new_request_body(json!([{ "resource_id": 1, "quantity": 6 }]))),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errors"]["resource_id"], 1);
    assert_eq!(available(&app, 1).await, 4);
}

#[tokio::test]
async fn multi_line_shortfall_reserves_nothing() {
    let app = test_app();
    let token = login(&app, "alice", "alice-pass").await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/requests",
            Some(&token),
            Some(new_request_body(json!([
                { "resource_id": 1, "quantity": 5 },
                { "resource_id": 2, "quantity": 100 }
            ]))),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errors"]["resource_id"], 2);
    assert_eq!(available(&app, 1).await, 10);
    assert_eq!(available(&app, 2).await, 10);
}

#[tokio::test]
async fn only_admins_decide_and_decisions_are_final() {
    let app = test_app();
    let alice = login(&app, "alice", "alice-pass").await;
    let admin = login(&app, "admin", "admin-pass").await;
    let id = create_request(&app, &alice, json!([{ "resource_id": 1, "quantity": 3 }])).await;

    let approve = json!({ "status": "Approved" });
    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/requests/{id}/status"),
            Some(&alice),
            Some(approve.clone()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        request(
            "PUT",
            &format!("/requests/{id}/status"),
            Some(&admin),
            Some(approve.clone()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Approved");
    // Approval keeps the reservation.
    assert_eq!(available(&app, 1).await, 7);

    // Re-approving an approved request is a conflict, not a second effect.
    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/requests/{id}/status"),
            Some(&admin),
            Some(approve),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(available(&app, 1).await, 7);

    let (status, _) = send(
        &app,
        request("PUT", &format!("/requests/{id}/cancel"), Some(&alice), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(available(&app, 1).await, 7);
}

#[tokio::test]
async fn reject_and_cancel_release_the_reservation() {
    let app = test_app();
    let alice = login(&app, "alice", "alice-pass").await;
    let bob = login(&app, "bob", "bob-pass").await;
    let admin = login(&app, "admin", "admin-pass").await;

    let first = create_request(&app, &alice, json!([{ "resource_id": 1, "quantity": 3 }])).await;
    let second = create_request(&app, &alice, json!([{ "resource_id": 1, "quantity": 4 }])).await;
    assert_eq!(available(&app, 1).await, 3);

    let (status, body) = send(
        &app,
        request(
            "PUT",
            &format!("/requests/{first}/status"),
            Some(&admin),
            Some(json!({ "status": "Rejected" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Rejected");
    assert_eq!(available(&app, 1).await, 6);

    // Only the owner (or an admin) can cancel.
    let (status, _) = send(
        &app,
        request("PUT", &format!("/requests/{second}/cancel"), Some(&bob), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        request("PUT", &format!("/requests/{second}/cancel"), Some(&alice), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Cancelled");
    assert_eq!(available(&app, 1).await, 10);
}

#[tokio::test]
async fn listing_scopes_non_admins_to_their_own_requests() {
    let app = test_app();
    let alice = login(&app, "alice", "alice-pass").await;
    let bob = login(&app, "bob", "bob-pass").await;
    let admin = login(&app, "admin", "admin-pass").await;

    create_request(&app, &alice, json!([{ "resource_id": 1, "quantity": 1 }])).await;
    create_request(&app, &bob, json!([{ "resource_id": 1, "quantity": 1 }])).await;

    let (_, body) = send(&app, request("GET", "/requests", Some(&alice), None)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["user_id"], 2);

    // Even asking for someone else's user_id explicitly.
    let (_, body) = send(
        &app,
        request("GET", "/requests?user_id=3", Some(&alice), None),
    )
    .await;
    assert_eq!(body["data"][0]["user_id"], 2);

    let (_, body) = send(&app, request("GET", "/requests", Some(&admin), None)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = send(
        &app,
        request("GET", "/requests?status=Pending&user_id=3", Some(&admin), None),
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["user_id"], 3);
}

#[tokio::test]
async fn report_is_admin_only_and_aggregates_counts() {
    let app = test_app();
    let alice = login(&app, "alice", "alice-pass").await;
    let admin = login(&app, "admin", "admin-pass").await;

    let id = create_request(&app, &alice, json!([{ "resource_id": 1, "quantity": 2 }])).await;
    create_request(&app, &alice, json!([{ "resource_id": 2, "quantity": 1 }])).await;
    send(
        &app,
        request(
            "PUT",
            &format!("/requests/{id}/status"),
            Some(&admin),
            Some(json!({ "status": "Approved" })),
        ),
    )
    .await;

    let (status, _) = send(
        &app,
        request("GET", "/requests/reports/generate?period=monthly", Some(&alice), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        request("GET", "/requests/reports/generate?period=monthly", Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let report = &body["data"];
    assert_eq!(report["totalRequests"], 2);
    assert_eq!(report["statusCounts"]["Approved"], 1);
    assert_eq!(report["statusCounts"]["Pending"], 1);
    assert_eq!(report["locationCounts"]["North Campus"], 2);
    assert_eq!(report["connectionTypeCounts"]["Fiber"], 2);
    assert_eq!(report["resources"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn malformed_requests_are_rejected_up_front() {
    let app = test_app();
    let token = login(&app, "alice", "alice-pass").await;

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/requests",
            Some(&token),
            Some(new_request_body(json!([]))),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/requests",
            Some(&token),
            Some(json!({
                "location_id": 2,
                "connection_type": "Copper",
                "resources": [{ "resource_id": 1, "quantity": 1 }],
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(available(&app, 1).await, 10);

    let id = create_request(&app, &token, json!([{ "resource_id": 1, "quantity": 1 }])).await;
    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/requests/{id}/status"),
            Some(&login(&app, "admin", "admin-pass").await),
            Some(json!({ "status": "Cancelled" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn resource_management_is_admin_only_and_guarded() {
    let app = test_app();
    let alice = login(&app, "alice", "alice-pass").await;
    let admin = login(&app, "admin", "admin-pass").await;

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/resources",
            Some(&alice),
            Some(json!({ "resource_name": "Patch Panel", "quantity_total": 5 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/resources",
            Some(&admin),
            Some(json!({ "resource_name": "Patch Panel", "quantity_total": 5 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let new_id = body["data"]["resource_id"].as_i64().unwrap();
    assert_eq!(body["data"]["quantity_available"], 5);

    // A pending reference blocks deletion.
    create_request(&app, &alice, json!([{ "resource_id": 1, "quantity": 1 }])).await;
    let (status, _) = send(&app, request("DELETE", "/resources/1", Some(&admin), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        request("DELETE", &format!("/resources/{new_id}"), Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        request("GET", &format!("/resources/{new_id}"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
