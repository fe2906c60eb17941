use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Repository, StoreError};
use crate::model::{DetectionModel, FlagUpdate, UserModel};

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserModel>,
    // insertion order stands in for storage order
    detections: Vec<DetectionModel>,
}

#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn insert_user(&self, user: &UserModel) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserModel>, StoreError> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserModel>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn set_admin(&self, email: &str, is_admin: bool) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.users.values_mut().find(|u| u.email == email) {
            Some(user) => {
                user.is_admin = is_admin;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_detection(&self, detection: &DetectionModel) -> Result<(), StoreError> {
        self.tables.write().await.detections.push(detection.clone());
        Ok(())
    }

    async fn list_detections(&self) -> Result<Vec<DetectionModel>, StoreError> {
        Ok(self.tables.read().await.detections.clone())
    }

    async fn list_user_detections(
        &self,
        user_id: &str,
    ) -> Result<Vec<DetectionModel>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .detections
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_detection(&self, id: &str) -> Result<Option<DetectionModel>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.detections.iter().find(|d| d.id == id).cloned())
    }

    async fn update_detection_flags(
        &self,
        id: &str,
        updates: &[FlagUpdate],
    ) -> Result<Option<DetectionModel>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.detections.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        for update in updates {
            update.flag.apply(record, update.value);
        }
        Ok(Some(record.clone()))
    }
}
