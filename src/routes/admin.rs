//! Approval workflow: admins list every detection and flip its review flags.

use actix_web::{get, patch, web, HttpResponse};
use log::info;
use serde_json::json;

use crate::error::AppError;
use crate::handler::filter_detection_record;
use crate::model::{
    DetectionFlag, DetectionModel, DetectionSummary, FlagUpdate, UpdateDetectionModel, UserModel,
};
use crate::session::Claims;
use crate::store::Repository;
use crate::AppState;

/// Loads the session's user and insists on the admin flag.
pub async fn require_admin(store: &dyn Repository, claims: &Claims) -> Result<UserModel, AppError> {
    match store.find_user_by_id(&claims.id).await? {
        Some(user) if user.is_admin => Ok(user),
        _ => Err(AppError::Forbidden("Admin access required".to_string())),
    }
}

pub async fn list_detections(store: &dyn Repository) -> Result<Vec<DetectionSummary>, AppError> {
    let detections = store.list_detections().await?;
    Ok(detections.iter().map(filter_detection_record).collect())
}

pub async fn update_detection_flags(
    store: &dyn Repository,
    id: &str,
    updates: &[FlagUpdate],
) -> Result<DetectionModel, AppError> {
    if updates.is_empty() {
        return Err(AppError::Validation(
            "Missing id or fields to update".to_string(),
        ));
    }
    store
        .update_detection_flags(id, updates)
        .await?
        .ok_or_else(|| AppError::NotFound("Detection not found".to_string()))
}

pub async fn update_detection_field(
    store: &dyn Repository,
    id: &str,
    flag: DetectionFlag,
    value: bool,
) -> Result<DetectionModel, AppError> {
    update_detection_flags(store, id, &[FlagUpdate { flag, value }]).await
}

#[get("/api/admin/fetch-detections")]
pub async fn fetch_detections(
    data: web::Data<AppState>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    require_admin(data.store.as_ref(), &claims).await?;
    let detections = list_detections(data.store.as_ref()).await?;

    Ok(HttpResponse::Ok().json(json!({ "data": detections })))
}

#[patch("/api/admin/update-detections")]
pub async fn update_detections(
    data: web::Data<AppState>,
    claims: web::ReqData<Claims>,
    body: web::Json<UpdateDetectionModel>,
) -> Result<HttpResponse, AppError> {
    let admin = require_admin(data.store.as_ref(), &claims).await?;

    let UpdateDetectionModel { id, fields } = body.into_inner();
    let (Some(id), Some(fields)) = (id.filter(|id| !id.is_empty()), fields) else {
        return Err(AppError::Validation(
            "Missing id or fields to update".to_string(),
        ));
    };

    let updates = fields.updates();
    let updated = update_detection_flags(data.store.as_ref(), &id, &updates).await?;
    for update in &updates {
        info!(
            "admin {} set {}={} on detection {id}",
            admin.id,
            update.flag.column(),
            update.value
        );
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Detection updated successfully",
        "data": updated,
    })))
}
