use std::sync::Arc;

use actix_web::{
    cookie::Cookie,
    http::{header, StatusCode},
    middleware, test, web, App,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use detections_server::error::json_config;
use detections_server::model::{DetectionModel, NumberPlateType, VehicleType};
use detections_server::session::{session_gate, TOKEN_COOKIE};
use detections_server::store::{MemoryRepository, Repository};
use detections_server::AppState;

const SECRET: &[u8] = b"integration-secret";

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .app_data(json_config())
                .configure(detections_server::configure)
                .wrap(middleware::from_fn(session_gate))
                .default_service(web::route().to(detections_server::routes::pages::not_found)),
        )
        .await
    };
}

fn fresh_state() -> (Arc<MemoryRepository>, AppState) {
    let store = Arc::new(MemoryRepository::new());
    let state = AppState::new(store.clone(), SECRET);
    (store, state)
}

fn session(token: &str) -> Cookie<'static> {
    Cookie::new(TOKEN_COOKIE, token.to_string())
}

fn record(id: &str, user_id: &str) -> DetectionModel {
    DetectionModel {
        id: id.into(),
        user_id: user_id.into(),
        vehicle_number: "KA01MJ2022".into(),
        vehicle_type: VehicleType::Bike,
        number_plate_type: NumberPlateType::White,
        helmet_detected: false,
        helmet_detected_image_path: "/img/h.png".into(),
        non_helmet_rider: true,
        non_helmet_rider_image_path: "/img/n.png".into(),
        passenger_with_helmet: false,
        passenger_with_helmet_image_path: "/img/p.png".into(),
        vehicle_speed: 45.0,
        location: "MG Road".into(),
        image_path: "/img/full.png".into(),
        timestamp: Utc::now(),
    }
}

/// Registers and logs in over HTTP, returning (user id, token).
macro_rules! signed_in {
    ($app:expr, $email:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/register")
            .set_json(json!({ "name": "Officer", "email": $email, "password": "hunter22" }))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::post()
            .uri("/api/login")
            .set_json(json!({ "email": $email, "password": "hunter22" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&$app, req).await;
        (
            body["id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }};
}

#[actix_web::test]
async fn register_then_duplicate_is_rejected() {
    let (store, state) = fresh_state();
    let app = app!(state);

    let payload = json!({ "name": "Asha", "email": "asha@example.com", "password": "secret1" });
    let req = test::TestRequest::post()
        .uri("/api/register")
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "User created successfully");
    assert_eq!(body["user"]["email"], "asha@example.com");
    assert_eq!(body["user"]["isAdmin"], false);
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["user"].get("passwordHash").is_none());

    let req = test::TestRequest::post()
        .uri("/api/register")
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "User already exists");
    assert_eq!(store.user_count().await, 1);
}

#[actix_web::test]
async fn short_passwords_are_refused_everywhere() {
    let (store, state) = fresh_state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/register")
        .set_json(json!({ "name": "A", "email": "a@example.com", "password": "123" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Password should be at least 6 characters long");
    assert_eq!(store.user_count().await, 0);

    let _ = signed_in!(app, "b@example.com");
    let req = test::TestRequest::post()
        .uri("/api/login")
        .set_json(json!({ "email": "b@example.com", "password": "123" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.response().cookies().next().is_none());
}

#[actix_web::test]
async fn wrong_password_and_unknown_user() {
    let (_, state) = fresh_state();
    let app = app!(state);
    let _ = signed_in!(app, "c@example.com");

    let req = test::TestRequest::post()
        .uri("/api/login")
        .set_json(json!({ "email": "c@example.com", "password": "not-it-at-all" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Invalid credentials");

    let req = test::TestRequest::post()
        .uri("/api/login")
        .set_json(json!({ "email": "ghost@example.com", "password": "whatever1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "User does not exist");
}

#[actix_web::test]
async fn login_sets_a_cookie_the_gate_accepts() {
    let (_, state) = fresh_state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/register")
        .set_json(json!({ "name": "D", "email": "d@example.com", "password": "hunter22" }))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/login")
        .set_json(json!({ "email": "d@example.com", "password": "hunter22" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == TOKEN_COOKIE)
        .map(|c| c.into_owned())
        .unwrap();
    assert_eq!(cookie.http_only(), Some(true));

    let req = test::TestRequest::post()
        .uri("/api/fetch-Authenticated-user")
        .cookie(cookie)
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["currentUser"]["email"], "d@example.com");
}

#[actix_web::test]
async fn tls_deployments_get_secure_cookies() {
    let (_, state) = fresh_state();
    let state = state.with_secure_cookies(true);
    let app = app!(state);
    let (_, token) = signed_in!(app, "tls@example.com");

    let req = test::TestRequest::post()
        .uri("/api/login")
        .set_json(json!({ "email": "tls@example.com", "password": "hunter22" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == TOKEN_COOKIE)
        .map(|c| c.into_owned())
        .unwrap();
    assert_eq!(cookie.secure(), Some(true));

    let req = test::TestRequest::post()
        .uri("/api/logout")
        .cookie(session(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let removal = resp
        .response()
        .cookies()
        .find(|c| c.name() == TOKEN_COOKIE)
        .map(|c| c.into_owned())
        .unwrap();
    assert_eq!(removal.secure(), Some(true));
}

#[actix_web::test]
async fn gate_redirects_without_a_valid_token() {
    let (_, state) = fresh_state();
    let app = app!(state);

    let req = test::TestRequest::get().uri("/dashboard").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");

    let expired = state
        .keys
        .issue_with_ttl("u", "u@example.com", Duration::seconds(-10))
        .unwrap();
    let req = test::TestRequest::post()
        .uri("/api/fetch-scans")
        .cookie(session(&expired))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);

    let req = test::TestRequest::get()
        .uri("/dashboard")
        .cookie(session("not.a.jwt"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[actix_web::test]
async fn public_pages_need_no_token() {
    let (_, state) = fresh_state();
    let app = app!(state);

    for path in ["/", "/login", "/register"] {
        let req = test::TestRequest::get().uri(path).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{path}");
    }
}

#[actix_web::test]
async fn logout_revokes_the_token() {
    let (_, state) = fresh_state();
    let app = app!(state);
    let (_, token) = signed_in!(app, "e@example.com");

    let req = test::TestRequest::post()
        .uri("/api/logout")
        .cookie(session(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/dashboard")
        .cookie(session(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[actix_web::test]
async fn scans_start_empty_and_single_scan_carries_compliance() {
    let (store, state) = fresh_state();
    let app = app!(state);
    let (user_id, token) = signed_in!(app, "f@example.com");

    let req = test::TestRequest::post()
        .uri("/api/fetch-scans")
        .cookie(session(&token))
        .set_json(json!({ "userId": user_id }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"], json!([]));

    let req = test::TestRequest::post()
        .uri("/api/fetch-single-scans")
        .cookie(session(&token))
        .set_json(json!({ "scanId": "missing" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/fetch-single-scans")
        .cookie(session(&token))
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    store.insert_detection(&record("s1", &user_id)).await.unwrap();
    let req = test::TestRequest::post()
        .uri("/api/fetch-single-scans")
        .cookie(session(&token))
        .set_json(json!({ "scanId": "s1" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["scanData"]["vehicle_number"], "KA01MJ2022");
    assert_eq!(body["compliance"]["score"], 30);
    assert_eq!(body["compliance"]["grade"], "Poor");
}

#[actix_web::test]
async fn data_form_validates_then_stores() {
    let (store, state) = fresh_state();
    let app = app!(state);
    let (user_id, token) = signed_in!(app, "g@example.com");

    let req = test::TestRequest::post()
        .uri("/api/data-form")
        .cookie(session(&token))
        .set_json(json!({ "userId": user_id, "vehicle_number": "X" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Missing required fields");

    let mut form = json!({
        "userId": user_id,
        "vehicle_number": "DL3CAB0001",
        "vehicle_type": "Scooter",
        "number_plate_type": "White",
        "helmet_detected": true,
        "helmet_detected_image_path": "/h.png",
        "non_helmet_rider": true,
        "non_helmet_rider_image_path": "/n.png",
        "passenger_with_helmet": true,
        "passenger_with_helmet_image_path": "/p.png",
        "vehicle_speed": 25.5,
        "location": "Ring Road",
        "image_path": "/full.png"
    });
    let req = test::TestRequest::post()
        .uri("/api/data-form")
        .cookie(session(&token))
        .set_json(&form)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Invalid vehicle_type: Scooter");

    form["vehicle_type"] = json!("Bike");
    let req = test::TestRequest::post()
        .uri("/api/data-form")
        .cookie(session(&token))
        .set_json(&form)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let id = body["data"]["id"].as_str().unwrap();

    let stored = store.find_detection(id).await.unwrap().unwrap();
    assert_eq!(stored.user_id, user_id);
    assert_eq!(stored.vehicle_speed, 25.5);
    assert_eq!(store.list_user_detections(&user_id).await.unwrap().len(), 1);
}

#[actix_web::test]
async fn data_form_refuses_script_image_links() {
    let (store, state) = fresh_state();
    let app = app!(state);
    let (user_id, token) = signed_in!(app, "xss@example.com");

    let req = test::TestRequest::post()
        .uri("/api/data-form")
        .cookie(session(&token))
        .set_json(json!({
            "userId": user_id,
            "vehicle_number": "DL3CAB0002",
            "vehicle_type": "Car",
            "number_plate_type": "Yellow",
            "helmet_detected": false,
            "helmet_detected_image_path":
                "javascript:fetch('/api/admin/update-detections',{method:'PATCH'})",
            "non_helmet_rider": false,
            "non_helmet_rider_image_path": "/n.png",
            "passenger_with_helmet": false,
            "passenger_with_helmet_image_path": "/p.png",
            "location": "Ring Road",
            "image_path": "javascript:alert(document.cookie)"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Invalid image_path");
    assert!(store.list_user_detections(&user_id).await.unwrap().is_empty());
}

#[actix_web::test]
async fn admin_endpoints_refuse_officers() {
    let (store, state) = fresh_state();
    let app = app!(state);
    let (_, token) = signed_in!(app, "h@example.com");
    store.insert_detection(&record("d1", "someone")).await.unwrap();

    let req = test::TestRequest::get()
        .uri("/api/admin/fetch-detections")
        .cookie(session(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::patch()
        .uri("/api/admin/update-detections")
        .cookie(session(&token))
        .set_json(json!({ "id": "d1", "fields": { "helmet_detected": true } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(!store.find_detection("d1").await.unwrap().unwrap().helmet_detected);

    let req = test::TestRequest::get()
        .uri("/admin-dashboard")
        .cookie(session(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
}

#[actix_web::test]
async fn admin_reviews_detections() {
    let (store, state) = fresh_state();
    let app = app!(state);
    let (_, token) = signed_in!(app, "admin@example.com");
    assert!(store.set_admin("admin@example.com", true).await.unwrap());
    store.insert_detection(&record("d1", "someone")).await.unwrap();

    let req = test::TestRequest::get()
        .uri("/api/admin/fetch-detections")
        .cookie(session(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["id"], "d1");
    assert!(body["data"][0].get("location").is_none());

    let req = test::TestRequest::patch()
        .uri("/api/admin/update-detections")
        .cookie(session(&token))
        .set_json(json!({ "id": "missing", "fields": { "helmet_detected": true } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::patch()
        .uri("/api/admin/update-detections")
        .cookie(session(&token))
        .set_json(json!({ "id": "d1", "fields": { "vehicle_speed": 0 } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.find_detection("d1").await.unwrap().unwrap().vehicle_speed, 45.0);

    let req = test::TestRequest::patch()
        .uri("/api/admin/update-detections")
        .cookie(session(&token))
        .set_json(json!({ "id": "d1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::patch()
        .uri("/api/admin/update-detections")
        .cookie(session(&token))
        .set_json(json!({ "id": "d1", "fields": { "helmet_detected": true } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["helmet_detected"], true);
    assert_eq!(body["data"]["non_helmet_rider"], true);
}

#[actix_web::test]
async fn concurrent_toggles_on_different_flags_both_land() {
    let (store, state) = fresh_state();
    let app = app!(state);
    let (_, token) = signed_in!(app, "root@example.com");
    store.set_admin("root@example.com", true).await.unwrap();
    store.insert_detection(&record("d1", "someone")).await.unwrap();

    let helmet = test::TestRequest::patch()
        .uri("/api/admin/update-detections")
        .cookie(session(&token))
        .set_json(json!({ "id": "d1", "fields": { "helmet_detected": true } }))
        .to_request();
    let passenger = test::TestRequest::patch()
        .uri("/api/admin/update-detections")
        .cookie(session(&token))
        .set_json(json!({ "id": "d1", "fields": { "passenger_with_helmet": true } }))
        .to_request();

    let (a, b) = tokio::join!(
        test::call_service(&app, helmet),
        test::call_service(&app, passenger)
    );
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);

    let stored = store.find_detection("d1").await.unwrap().unwrap();
    assert!(stored.helmet_detected);
    assert!(stored.passenger_with_helmet);
    assert!(stored.non_helmet_rider);
}

#[actix_web::test]
async fn scan_page_renders_and_unknown_routes_404() {
    let (store, state) = fresh_state();
    let app = app!(state);
    let (user_id, token) = signed_in!(app, "i@example.com");
    store.insert_detection(&record("p1", &user_id)).await.unwrap();

    let req = test::TestRequest::get()
        .uri("/scans-information/p1")
        .cookie(session(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    let html = std::str::from_utf8(&body).unwrap();
    assert!(html.contains("KA01MJ2022"));
    assert!(html.contains("Poor Compliance"));

    let req = test::TestRequest::get()
        .uri("/scans-information/nope")
        .cookie(session(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri("/no-such-page")
        .cookie(session(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
