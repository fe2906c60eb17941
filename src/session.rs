//! Signed session tokens and the request gate that enforces them.
//!
//! A token is an HS256 JWT carrying the user's id and email. It travels in
//! the `token` cookie and is checked on every request that is not on the
//! public allow-list. Logging out puts the token's `jti` on a deny list
//! until the token would have expired anyway.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use actix_web::{
    body::{EitherBody, MessageBody},
    cookie::{time, Cookie, SameSite},
    dev::{ServiceRequest, ServiceResponse},
    http::header,
    middleware::Next,
    web, Error, HttpMessage, HttpResponse,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;

pub const TOKEN_COOKIE: &str = "token";
pub const TOKEN_TTL_HOURS: i64 = 24;
pub const LOGIN_PATH: &str = "/login";

/// Paths reachable without a session. Matched on whole path segments.
const PUBLIC_PREFIXES: [&str; 8] = [
    "/login",
    "/register",
    "/api/login",
    "/api/register",
    "/static",
    "/favicon.ico",
    "/robots.txt",
    "/sitemap.xml",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionKeys {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // a token is dead the second it expires
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, id: &str, email: &str) -> Result<String, errors::Error> {
        self.issue_with_ttl(id, email, Duration::hours(TOKEN_TTL_HOURS))
    }

    pub fn issue_with_ttl(
        &self,
        id: &str,
        email: &str,
        ttl: Duration,
    ) -> Result<String, errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            id: id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Checks signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, errors::Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }
}

/// Revoked token ids, each kept until its token's own expiry.
#[derive(Default)]
pub struct RevocationList {
    revoked: Mutex<HashMap<String, i64>>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, claims: &Claims) {
        let now = Utc::now().timestamp();
        let mut revoked = self.revoked.lock().unwrap_or_else(PoisonError::into_inner);
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(claims.jti.clone(), claims.exp);
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.revoked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(jti)
    }
}

/// `secure` is set when the server is bound with TLS.
pub fn session_cookie(token: &str, secure: bool) -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::hours(TOKEN_TTL_HOURS))
        .finish()
}

pub fn removal_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build(TOKEN_COOKIE, "")
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .finish()
}

pub fn is_public(path: &str) -> bool {
    path == "/"
        || PUBLIC_PREFIXES.iter().any(|prefix| {
            path.strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
}

/// Verifies the `token` cookie. Revoked tokens count as invalid.
pub fn authenticate(state: &AppState, token: Option<&str>) -> Option<Claims> {
    let token = token?;
    match state.keys.verify(token) {
        Ok(claims) if !state.revoked.is_revoked(&claims.jti) => Some(claims),
        Ok(claims) => {
            debug!("token {} has been revoked", claims.jti);
            None
        }
        Err(e) => {
            debug!("token rejected: {e}");
            None
        }
    }
}

/// Middleware: passes public paths, attaches [`Claims`] to authenticated
/// requests and redirects everything else to the login page.
pub async fn session_gate<B: MessageBody + 'static>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    if is_public(req.path()) {
        return next.call(req).await.map(ServiceResponse::map_into_left_body);
    }

    let claims = match req.app_data::<web::Data<AppState>>() {
        Some(state) => {
            let cookie = req.cookie(TOKEN_COOKIE);
            authenticate(state, cookie.as_ref().map(|c| c.value()))
        }
        None => {
            return Err(actix_web::error::ErrorInternalServerError(
                "application state missing",
            ))
        }
    };

    match claims {
        Some(claims) => {
            req.extensions_mut().insert(claims);
            next.call(req).await.map(ServiceResponse::map_into_left_body)
        }
        None => {
            debug!("redirecting {} to {LOGIN_PATH}", req.path());
            let response = HttpResponse::TemporaryRedirect()
                .insert_header((header::LOCATION, LOGIN_PATH))
                .finish();
            Ok(req.into_response(response).map_into_right_body())
        }
    }
}
