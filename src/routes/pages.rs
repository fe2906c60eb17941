use actix_web::{get, http::header, web, HttpResponse, Responder};

use crate::compliance::{self, ComplianceReport};
use crate::error::AppError;
use crate::handler::escape_html;
use crate::model::DetectionModel;
use crate::routes::admin::require_admin;
use crate::session::Claims;
use crate::AppState;

fn html(body: impl Into<String>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body.into())
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset='utf-8'><title>{title}</title>\
         <link rel='stylesheet' href='/static/css/style.css'></head>\
         <body><nav><a href='/dashboard'>Dashboard</a> <a href='/data-form'>New scan</a> \
         <a href='/admin-dashboard'>Approvals</a></nav><main>{body}</main></body></html>"
    )
}

#[get("/")]
pub async fn index() -> impl Responder {
    html(include_str!("../../public/html/index.html"))
}

#[get("/login")]
pub async fn login() -> impl Responder {
    html(include_str!("../../public/html/login.html"))
}

#[get("/register")]
pub async fn register() -> impl Responder {
    html(include_str!("../../public/html/register.html"))
}

#[get("/data-form")]
pub async fn data_form() -> impl Responder {
    html(include_str!("../../public/html/data-form.html"))
}

#[get("/admin-dashboard")]
pub async fn admin_dashboard(
    data: web::Data<AppState>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    match require_admin(data.store.as_ref(), &claims).await {
        Ok(_) => Ok(html(include_str!("../../public/html/admin-dashboard.html"))),
        Err(AppError::Forbidden(_)) => Ok(HttpResponse::SeeOther()
            .insert_header((header::LOCATION, "/"))
            .finish()),
        Err(e) => Err(e),
    }
}

fn scan_row(scan: &DetectionModel) -> String {
    let report = compliance::assess(scan);
    format!(
        "<tr><td><a href='/scans-information/{id}'>{number}</a></td><td>{kind}</td>\
         <td>{location}</td><td>{when}</td><td>{score}%</td></tr>",
        id = escape_html(&scan.id),
        number = escape_html(&scan.vehicle_number),
        kind = scan.vehicle_type,
        location = escape_html(&scan.location),
        when = scan.timestamp.format("%B %-d, %Y %H:%M"),
        score = report.score,
    )
}

#[get("/dashboard")]
pub async fn dashboard(
    data: web::Data<AppState>,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, AppError> {
    let scans = data.store.list_user_detections(&claims.id).await?;
    let display_name = claims.email.split('@').next().unwrap_or("User");

    let rows = if scans.is_empty() {
        "<tr><td colspan='5'>No scans yet.</td></tr>".to_string()
    } else {
        scans.iter().map(scan_row).collect::<String>()
    };
    let body = format!(
        "<h1>Welcome back, {name}</h1><p>{count} scans recorded.</p>\
         <table><thead><tr><th>Vehicle</th><th>Type</th><th>Location</th><th>Time</th>\
         <th>Score</th></tr></thead><tbody>{rows}</tbody></table>\
         <button id='logout'>Log out</button>\
         <script>document.getElementById('logout').onclick = async () => {{\
         await fetch('/api/logout', {{method: 'POST'}}); localStorage.removeItem('auth-storage');\
         window.location = '/login'; }};</script>",
        name = escape_html(display_name),
        count = scans.len(),
    );
    Ok(html(layout("Dashboard", &body)))
}

fn flag_cell(label: &str, value: bool, image_path: &str) -> String {
    format!(
        "<li>{label}: <strong>{}</strong> <a href='{}'>image</a></li>",
        if value { "yes" } else { "no" },
        escape_html(image_path)
    )
}

pub fn scan_page(scan: &DetectionModel, report: &ComplianceReport) -> String {
    let violations = if report.is_compliant() {
        "<li>Fully Compliant</li>".to_string()
    } else {
        report
            .violations
            .iter()
            .map(|v| format!("<li>{}</li>", v.describe()))
            .collect::<String>()
    };
    let body = format!(
        "<h1>Scan {number}</h1>\
         <p>{kind}, {plate} plate, {speed} km/h at {location} on {when}</p>\
         <img src='{image}' alt='vehicle'>\
         <ul>{helmet}{rider}{passenger}</ul>\
         <h2>Compliance Score: {score}%</h2><p>{grade}</p><ul>{violations}</ul>",
        number = escape_html(&scan.vehicle_number),
        kind = scan.vehicle_type,
        plate = scan.number_plate_type,
        speed = scan.vehicle_speed,
        location = escape_html(&scan.location),
        when = scan.timestamp.format("%B %-d, %Y %H:%M"),
        image = escape_html(&scan.image_path),
        helmet = flag_cell(
            "Helmet detected",
            scan.helmet_detected,
            &scan.helmet_detected_image_path
        ),
        rider = flag_cell(
            "Non-helmet rider",
            scan.non_helmet_rider,
            &scan.non_helmet_rider_image_path
        ),
        passenger = flag_cell(
            "Passenger with helmet",
            scan.passenger_with_helmet,
            &scan.passenger_with_helmet_image_path
        ),
        score = report.score,
        grade = report.grade.label(),
    );
    layout("Scan information", &body)
}

#[get("/scans-information/{scan_id}")]
pub async fn scan_information(
    data: web::Data<AppState>,
    scan_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    match data.store.find_detection(&scan_id).await? {
        Some(scan) => Ok(html(scan_page(&scan, &compliance::assess(&scan)))),
        None => Ok(HttpResponse::NotFound()
            .content_type("text/html; charset=utf-8")
            .body(layout("Not found", "<h1>No scans found</h1><a href='/dashboard'>Back</a>"))),
    }
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound()
        .content_type("text/html; charset=utf-8")
        .body(layout("Not found", "<h1>Page not found</h1>"))
}
