//! Persistence for users and detection records.
//!
//! Handlers only ever see [`Repository`]. [`MySqlRepository`] is the
//! production backend; [`MemoryRepository`] backs the tests and the
//! `--memory` development mode.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{DetectionModel, FlagUpdate, UserModel};

mod memory;
mod mysql;

pub use memory::MemoryRepository;
pub use mysql::MySqlRepository;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("email is already registered")]
    DuplicateEmail,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// Fails with [`StoreError::DuplicateEmail`] when the email is taken.
    async fn insert_user(&self, user: &UserModel) -> Result<(), StoreError>;

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserModel>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserModel>, StoreError>;

    /// Returns false when no user has that email.
    async fn set_admin(&self, email: &str, is_admin: bool) -> Result<bool, StoreError>;

    async fn insert_detection(&self, detection: &DetectionModel) -> Result<(), StoreError>;

    /// All records in storage order.
    async fn list_detections(&self) -> Result<Vec<DetectionModel>, StoreError>;

    async fn list_user_detections(&self, user_id: &str)
        -> Result<Vec<DetectionModel>, StoreError>;

    async fn find_detection(&self, id: &str) -> Result<Option<DetectionModel>, StoreError>;

    /// Writes each flag as its own assignment and returns the updated record,
    /// or `None` (and no write) when the id is unknown.
    async fn update_detection_flags(
        &self,
        id: &str,
        updates: &[FlagUpdate],
    ) -> Result<Option<DetectionModel>, StoreError>;
}
