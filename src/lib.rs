//! Traffic-violation detection desk.
//!
//! Officers submit detection records (vehicle, number plate, helmet and
//! speed observations) and review their own scans; admins list every record
//! and flip its review flags. Everything except the home, login and
//! register pages sits behind a signed `token` cookie checked by
//! [`session::session_gate`].

use std::sync::Arc;

use actix_files as fs;
use actix_web::{middleware, web, App, HttpServer};
use log::info;
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};

pub mod auth;
pub mod client;
pub mod compliance;
pub mod config;
pub mod error;
pub mod handler;
pub mod model;
pub mod routes;
pub mod session;
pub mod store;

use config::{Config, TlsFiles};
use session::{RevocationList, SessionKeys};
use store::Repository;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Repository>,
    pub keys: SessionKeys,
    pub revoked: Arc<RevocationList>,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn Repository>, secret: &[u8]) -> Self {
        Self {
            store,
            keys: SessionKeys::new(secret),
            revoked: Arc::new(RevocationList::new()),
            secure_cookies: false,
        }
    }

    /// Marks session cookies `Secure`.
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }
}

/// Every route plus the static asset directory.
pub fn configure(cfg: &mut web::ServiceConfig) {
    routes::configure(cfg);
    cfg.service(fs::Files::new("/static", "./public"));
}

pub async fn run_server(config: &Config, state: AppState) -> std::io::Result<()> {
    let data = web::Data::new(state.with_secure_cookies(config.tls.is_some()));

    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .app_data(error::json_config())
            .configure(configure)
            .wrap(middleware::from_fn(session::session_gate))
            .wrap(middleware::Logger::new("%a %r %s %T"))
            .default_service(web::route().to(routes::pages::not_found))
    });

    let address = (config.host.as_str(), config.port);
    let server = match &config.tls {
        Some(tls) => {
            info!("Binding to https://{}:{}", config.host, config.port);
            server.bind_openssl(address, ssl_acceptor(tls)?)?
        }
        None => {
            info!("Binding to http://{}:{}", config.host, config.port);
            server.bind(address)?
        }
    };

    server.run().await
}

fn ssl_acceptor(tls: &TlsFiles) -> std::io::Result<openssl::ssl::SslAcceptorBuilder> {
    let mut builder =
        SslAcceptor::mozilla_intermediate(SslMethod::tls()).map_err(std::io::Error::other)?;
    builder
        .set_private_key_file(&tls.private_key, SslFiletype::PEM)
        .map_err(std::io::Error::other)?;
    builder
        .set_certificate_chain_file(&tls.certificate)
        .map_err(std::io::Error::other)?;
    Ok(builder)
}
