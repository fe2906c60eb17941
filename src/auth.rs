//! Credential checks: registration, login and password hashing.

use std::sync::LazyLock;

use chrono::Utc;
use log::{info, warn};
use password_auth::{generate_hash, verify_password};
use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{LoginModel, RegisterModel, UserModel};
use crate::session::SessionKeys;
use crate::store::{Repository, StoreError};

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,4}$")
        .expect("email pattern is a valid regex")
});

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("{0}")]
    Validation(String),

    #[error("Password should be at least 6 characters long")]
    WeakPassword,

    #[error("User does not exist")]
    UnknownUser,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("password task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A successful login: the stored user and a freshly signed token.
#[derive(Debug)]
pub struct LoginSession {
    pub user: UserModel,
    pub token: String,
}

pub fn valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

pub fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

fn required(field: &Option<String>) -> Result<&str, CredentialError> {
    match field.as_deref() {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(CredentialError::Validation(
            "Please fill all fields".to_string(),
        )),
    }
}

async fn hash_password(password: &str) -> Result<String, CredentialError> {
    let password = password.to_string();
    Ok(tokio::task::spawn_blocking(move || generate_hash(password)).await?)
}

async fn password_matches(password: &str, hash: &str) -> Result<bool, CredentialError> {
    let password = password.to_string();
    let hash = hash.to_string();
    let outcome = tokio::task::spawn_blocking(move || verify_password(password, &hash)).await?;
    Ok(outcome.is_ok())
}

pub async fn register(
    store: &dyn Repository,
    form: &RegisterModel,
) -> Result<UserModel, CredentialError> {
    let name = required(&form.name)?;
    let email = required(&form.email)?;
    let password = required(&form.password)?;

    if store.find_user_by_email(email).await?.is_some() {
        return Err(CredentialError::Validation(
            "User already exists".to_string(),
        ));
    }
    if !valid_email(email) {
        return Err(CredentialError::Validation(
            "Please provide a valid email address".to_string(),
        ));
    }
    if !valid_password(password) {
        return Err(CredentialError::WeakPassword);
    }

    let user = UserModel {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: email.to_string(),
        password_hash: hash_password(password).await?,
        is_admin: false,
        created_at: Utc::now(),
    };
    match store.insert_user(&user).await {
        Ok(()) => {}
        // lost a race with a concurrent registration
        Err(StoreError::DuplicateEmail) => {
            return Err(CredentialError::Validation(
                "User already exists".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    }

    info!("registered user {}", user.id);
    Ok(user)
}

pub async fn login(
    store: &dyn Repository,
    keys: &SessionKeys,
    form: &LoginModel,
) -> Result<LoginSession, CredentialError> {
    let email = required(&form.email)?;
    let password = required(&form.password)?;

    let user = store
        .find_user_by_email(email)
        .await?
        .ok_or(CredentialError::UnknownUser)?;

    if !valid_password(password) {
        return Err(CredentialError::WeakPassword);
    }
    if !password_matches(password, &user.password_hash).await? {
        warn!("failed login for user {}", user.id);
        return Err(CredentialError::InvalidCredentials);
    }

    let token = keys.issue(&user.id, &user.email)?;
    info!("user {} logged in", user.id);
    Ok(LoginSession { user, token })
}
