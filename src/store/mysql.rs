use std::time::Duration;

use async_trait::async_trait;
use log::info;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use tokio::sync::OnceCell;

use super::{Repository, StoreError};
use crate::model::{DetectionModel, FlagUpdate, UserModel};

const USER_COLUMNS: &str = "id, name, email, password_hash, is_admin, created_at";

const DETECTION_COLUMNS: &str = "id, user_id, vehicle_number, vehicle_type, number_plate_type, \
     helmet_detected, helmet_detected_image_path, non_helmet_rider, non_helmet_rider_image_path, \
     passenger_with_helmet, passenger_with_helmet_image_path, vehicle_speed, location, image_path, \
     timestamp";

/// MySQL backend. The pool is opened on first use and shared by every
/// request after that; a failed connect leaves the cell empty so the next
/// call tries again.
pub struct MySqlRepository {
    url: String,
    max_connections: u32,
    acquire_timeout: Duration,
    pool: OnceCell<MySqlPool>,
}

impl MySqlRepository {
    pub fn new(url: impl Into<String>, max_connections: u32, acquire_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            max_connections,
            acquire_timeout,
            pool: OnceCell::new(),
        }
    }

    async fn pool(&self) -> Result<&MySqlPool, StoreError> {
        self.pool
            .get_or_try_init(|| async {
                let pool = MySqlPoolOptions::new()
                    .max_connections(self.max_connections)
                    .acquire_timeout(self.acquire_timeout)
                    .connect(&self.url)
                    .await?;
                sqlx::migrate!("./migrations").run(&pool).await?;
                info!("Database connected successfully");
                Ok::<_, StoreError>(pool)
            })
            .await
    }
}

#[async_trait]
impl Repository for MySqlRepository {
    async fn insert_user(&self, user: &UserModel) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users
            (id, name, email, password_hash, is_admin, created_at)
            VALUES
            (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.created_at)
        .execute(self.pool().await?)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateEmail)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserModel>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let user = sqlx::query_as::<_, UserModel>(&sql)
            .bind(id)
            .fetch_optional(self.pool().await?)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserModel>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let user = sqlx::query_as::<_, UserModel>(&sql)
            .bind(email)
            .fetch_optional(self.pool().await?)
            .await?;
        Ok(user)
    }

    async fn set_admin(&self, email: &str, is_admin: bool) -> Result<bool, StoreError> {
        // MySQL reports changed rows, so an existing admin would look missing.
        if self.find_user_by_email(email).await?.is_none() {
            return Ok(false);
        }
        sqlx::query("UPDATE users SET is_admin = ? WHERE email = ?")
            .bind(is_admin)
            .bind(email)
            .execute(self.pool().await?)
            .await?;
        Ok(true)
    }

    async fn insert_detection(&self, detection: &DetectionModel) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO detections ({DETECTION_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        sqlx::query(&sql)
            .bind(&detection.id)
            .bind(&detection.user_id)
            .bind(&detection.vehicle_number)
            .bind(detection.vehicle_type)
            .bind(detection.number_plate_type)
            .bind(detection.helmet_detected)
            .bind(&detection.helmet_detected_image_path)
            .bind(detection.non_helmet_rider)
            .bind(&detection.non_helmet_rider_image_path)
            .bind(detection.passenger_with_helmet)
            .bind(&detection.passenger_with_helmet_image_path)
            .bind(detection.vehicle_speed)
            .bind(&detection.location)
            .bind(&detection.image_path)
            .bind(detection.timestamp)
            .execute(self.pool().await?)
            .await?;
        Ok(())
    }

    async fn list_detections(&self) -> Result<Vec<DetectionModel>, StoreError> {
        let sql = format!("SELECT {DETECTION_COLUMNS} FROM detections");
        let rows = sqlx::query_as::<_, DetectionModel>(&sql)
            .fetch_all(self.pool().await?)
            .await?;
        Ok(rows)
    }

    async fn list_user_detections(
        &self,
        user_id: &str,
    ) -> Result<Vec<DetectionModel>, StoreError> {
        let sql = format!("SELECT {DETECTION_COLUMNS} FROM detections WHERE user_id = ?");
        let rows = sqlx::query_as::<_, DetectionModel>(&sql)
            .bind(user_id)
            .fetch_all(self.pool().await?)
            .await?;
        Ok(rows)
    }

    async fn find_detection(&self, id: &str) -> Result<Option<DetectionModel>, StoreError> {
        let sql = format!("SELECT {DETECTION_COLUMNS} FROM detections WHERE id = ?");
        let row = sqlx::query_as::<_, DetectionModel>(&sql)
            .bind(id)
            .fetch_optional(self.pool().await?)
            .await?;
        Ok(row)
    }

    async fn update_detection_flags(
        &self,
        id: &str,
        updates: &[FlagUpdate],
    ) -> Result<Option<DetectionModel>, StoreError> {
        if updates.is_empty() {
            return self.find_detection(id).await;
        }

        // column names come from the closed DetectionFlag set, values are bound
        let assignments = updates
            .iter()
            .map(|update| format!("{} = ?", update.flag.column()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE detections SET {assignments} WHERE id = ?");

        let mut query = sqlx::query(&sql);
        for update in updates {
            query = query.bind(update.value);
        }
        query.bind(id).execute(self.pool().await?).await?;

        self.find_detection(id).await
    }
}
