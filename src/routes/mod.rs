use actix_web::web;

pub mod admin;
pub mod api;
pub mod pages;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(pages::index)
        .service(pages::login)
        .service(pages::register)
        .service(pages::dashboard)
        .service(pages::data_form)
        .service(pages::scan_information)
        .service(pages::admin_dashboard)
        .service(api::register)
        .service(api::login)
        .service(api::logout)
        .service(api::fetch_authenticated_user)
        .service(api::data_form)
        .service(api::fetch_scans)
        .service(api::fetch_single_scans)
        .service(admin::fetch_detections)
        .service(admin::update_detections);
}
