use actix_web::{post, web, HttpResponse};
use chrono::Utc;
use log::info;
use serde_json::json;
use uuid::Uuid;

use crate::auth;
use crate::compliance;
use crate::error::AppError;
use crate::handler::filter_db_record;
use crate::model::{
    DetectionForm, DetectionModel, LoginModel, LoginResponse, NumberPlateType, RegisterModel,
    ScanIdModel, UserIdModel, VehicleType,
};
use crate::session::{removal_cookie, session_cookie, Claims};
use crate::store::Repository;
use crate::AppState;

#[post("/api/register")]
pub async fn register(
    data: web::Data<AppState>,
    form: web::Json<RegisterModel>,
) -> Result<HttpResponse, AppError> {
    let user = auth::register(data.store.as_ref(), &form).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "User created successfully",
        "user": filter_db_record(&user),
    })))
}

#[post("/api/login")]
pub async fn login(
    data: web::Data<AppState>,
    form: web::Json<LoginModel>,
) -> Result<HttpResponse, AppError> {
    let session = auth::login(data.store.as_ref(), &data.keys, &form).await?;

    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&session.token, data.secure_cookies))
        .json(LoginResponse {
            id: session.user.id,
            email: session.user.email,
            token: session.token,
        }))
}

#[post("/api/logout")]
pub async fn logout(data: web::Data<AppState>, claims: web::ReqData<Claims>) -> HttpResponse {
    data.revoked.revoke(&claims);
    info!("user {} logged out", claims.id);

    HttpResponse::Ok()
        .cookie(removal_cookie(data.secure_cookies))
        .json(json!({ "message": "Logged out" }))
}

/// The id in the body wins; without one the session's own user is used.
fn requested_user(body: Option<web::Json<UserIdModel>>, claims: &Claims) -> String {
    body.and_then(|body| body.into_inner().user_id)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| claims.id.clone())
}

#[post("/api/fetch-Authenticated-user")]
pub async fn fetch_authenticated_user(
    data: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    body: Option<web::Json<UserIdModel>>,
) -> Result<HttpResponse, AppError> {
    let user_id = requested_user(body, &claims);

    let user = data
        .store
        .find_user_by_id(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "User found",
        "currentUser": filter_db_record(&user),
    })))
}

fn present(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}

/// Image links are rendered into `href` and `src` attributes, so only
/// site-relative paths and http(s) URLs are stored.
fn image_link(field: &str, link: String) -> Result<String, AppError> {
    let lower = link.to_ascii_lowercase();
    let relative = link.starts_with('/') && !link.starts_with("//") && !link.starts_with("/\\");
    if relative || lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(link)
    } else {
        Err(AppError::Validation(format!("Invalid {field}")))
    }
}

/// Checks a submitted form and turns it into a record ready to store.
pub fn build_detection(form: DetectionForm) -> Result<DetectionModel, AppError> {
    let missing = || AppError::Validation("Missing required fields".to_string());

    let user_id = present(form.user_id).ok_or_else(missing)?;
    let vehicle_number = present(form.vehicle_number).ok_or_else(missing)?;
    let vehicle_type = present(form.vehicle_type).ok_or_else(missing)?;
    let number_plate_type = present(form.number_plate_type).ok_or_else(missing)?;
    let helmet_detected = form.helmet_detected.ok_or_else(missing)?;
    let non_helmet_rider = form.non_helmet_rider.ok_or_else(missing)?;
    let passenger_with_helmet = form.passenger_with_helmet.ok_or_else(missing)?;
    let image_path = present(form.image_path).ok_or_else(missing)?;
    let location = present(form.location).ok_or_else(missing)?;
    let helmet_detected_image_path =
        present(form.helmet_detected_image_path).ok_or_else(missing)?;
    let non_helmet_rider_image_path =
        present(form.non_helmet_rider_image_path).ok_or_else(missing)?;
    let passenger_with_helmet_image_path =
        present(form.passenger_with_helmet_image_path).ok_or_else(missing)?;

    let image_path = image_link("image_path", image_path)?;
    let helmet_detected_image_path =
        image_link("helmet_detected_image_path", helmet_detected_image_path)?;
    let non_helmet_rider_image_path =
        image_link("non_helmet_rider_image_path", non_helmet_rider_image_path)?;
    let passenger_with_helmet_image_path = image_link(
        "passenger_with_helmet_image_path",
        passenger_with_helmet_image_path,
    )?;

    let vehicle_type = vehicle_type
        .parse::<VehicleType>()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let number_plate_type = number_plate_type
        .parse::<NumberPlateType>()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let vehicle_speed = form.vehicle_speed.unwrap_or(0.0);
    if !vehicle_speed.is_finite() || vehicle_speed < 0.0 {
        return Err(AppError::Validation(format!(
            "Invalid vehicle_speed: {vehicle_speed}"
        )));
    }

    Ok(DetectionModel {
        id: Uuid::new_v4().to_string(),
        user_id,
        vehicle_number,
        vehicle_type,
        number_plate_type,
        helmet_detected,
        helmet_detected_image_path,
        non_helmet_rider,
        non_helmet_rider_image_path,
        passenger_with_helmet,
        passenger_with_helmet_image_path,
        vehicle_speed,
        location,
        image_path,
        timestamp: Utc::now(),
    })
}

pub async fn submit_detection(
    store: &dyn Repository,
    form: DetectionForm,
) -> Result<DetectionModel, AppError> {
    let detection = build_detection(form)?;

    if store.find_user_by_id(&detection.user_id).await?.is_none() {
        return Err(AppError::Validation(format!(
            "Unknown userId: {}",
            detection.user_id
        )));
    }

    store.insert_detection(&detection).await?;
    info!(
        "stored detection {} for user {}",
        detection.id, detection.user_id
    );
    Ok(detection)
}

#[post("/api/data-form")]
pub async fn data_form(
    data: web::Data<AppState>,
    form: web::Json<DetectionForm>,
) -> Result<HttpResponse, AppError> {
    let detection = submit_detection(data.store.as_ref(), form.into_inner()).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Detection stored successfully",
        "data": detection,
    })))
}

#[post("/api/fetch-scans")]
pub async fn fetch_scans(
    data: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    body: Option<web::Json<UserIdModel>>,
) -> Result<HttpResponse, AppError> {
    let user_id = requested_user(body, &claims);
    let scans = data.store.list_user_detections(&user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Scans fetched successfully",
        "data": scans,
    })))
}

#[post("/api/fetch-single-scans")]
pub async fn fetch_single_scans(
    data: web::Data<AppState>,
    body: web::Json<ScanIdModel>,
) -> Result<HttpResponse, AppError> {
    let scan_id = present(body.into_inner().scan_id)
        .ok_or_else(|| AppError::Validation("Scan Id is not found".to_string()))?;

    let scan = data
        .store
        .find_detection(&scan_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No scans found".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully fetched Scan Data",
        "compliance": compliance::assess(&scan),
        "scanData": scan,
    })))
}
