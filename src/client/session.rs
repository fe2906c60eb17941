//! Who is logged in on this machine.
//!
//! [`SessionContext`] is the single owner of the session: it is read from
//! storage once in [`SessionContext::load`] and every change is written
//! straight back, so there is never a second copy to fall out of step.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ApiClient, ClientError, FileStorage};
use crate::model::UserModelResponse;

pub const STORAGE_KEY: &str = "auth-storage";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<UserModelResponse> for SessionUser {
    fn from(user: UserModelResponse) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_admin: user.is_admin,
            name: Some(user.name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthState {
    user: Option<SessionUser>,
    auth_token: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct Persisted {
    state: AuthState,
}

pub struct SessionContext {
    storage: FileStorage,
    state: AuthState,
}

impl SessionContext {
    /// Rehydrates from storage. A corrupt entry is dropped, not fatal.
    pub fn load(storage: FileStorage) -> Result<Self, ClientError> {
        let state = match storage.get_item(STORAGE_KEY)? {
            Some(value) => match serde_json::from_value::<Persisted>(value) {
                Ok(persisted) => persisted.state,
                Err(e) => {
                    warn!("discarding unreadable {STORAGE_KEY}: {e}");
                    AuthState::default()
                }
            },
            None => AuthState::default(),
        };
        Ok(Self { storage, state })
    }

    fn persist(&self) -> Result<(), ClientError> {
        self.storage
            .set_item(STORAGE_KEY, json!({ "state": &self.state }))
    }

    pub fn current_user(&self) -> Option<&SessionUser> {
        self.state.user.as_ref()
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.state.auth_token.as_deref()
    }

    pub fn require_token(&self) -> Result<&str, ClientError> {
        self.auth_token().ok_or(ClientError::Unauthenticated)
    }

    pub fn set_user_details(&mut self, user: SessionUser) -> Result<(), ClientError> {
        self.state.user = Some(user);
        self.persist()
    }

    pub fn set_auth_token(&mut self, token: impl Into<String>) -> Result<(), ClientError> {
        self.state.auth_token = Some(token.into());
        self.persist()
    }

    /// Forgets the session locally. The token itself stays valid on the
    /// server unless it was revoked through `/api/logout` first.
    pub fn logout(&mut self) -> Result<(), ClientError> {
        self.state = AuthState::default();
        self.storage.remove_item(STORAGE_KEY)
    }

    /// Asks the server who the stored token belongs to. Any failure clears
    /// both the user and the token.
    pub async fn fetch_authenticated_user(
        &mut self,
        api: &ApiClient,
    ) -> Result<SessionUser, ClientError> {
        let outcome = match self.auth_token() {
            Some(token) => {
                let user_id = self.current_user().map(|user| user.id.as_str());
                api.fetch_authenticated_user(token, user_id).await
            }
            None => Err(ClientError::Unauthenticated),
        };

        match outcome {
            Ok(user) => {
                let user = SessionUser::from(user);
                self.set_user_details(user.clone())?;
                Ok(user)
            }
            Err(e) => {
                warn!("User not authenticated: {e}");
                self.state = AuthState::default();
                self.persist()?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> SessionUser {
        SessionUser {
            id: "u-1".into(),
            email: "officer@example.com".into(),
            is_admin: false,
            name: None,
        }
    }

    #[test]
    fn session_is_rehydrated_from_storage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let mut session = SessionContext::load(FileStorage::new(&path)).unwrap();
        assert!(session.current_user().is_none());
        session.set_auth_token("abc.def.ghi").unwrap();
        session.set_user_details(user()).unwrap();

        let reloaded = SessionContext::load(FileStorage::new(&path)).unwrap();
        assert_eq!(reloaded.current_user(), Some(&user()));
        assert_eq!(reloaded.auth_token(), Some("abc.def.ghi"));
    }

    #[test]
    fn logout_clears_memory_and_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("storage.json"));

        let mut session = SessionContext::load(storage.clone()).unwrap();
        session.set_auth_token("t").unwrap();
        session.set_user_details(user()).unwrap();
        session.logout().unwrap();

        assert!(session.current_user().is_none());
        assert!(session.auth_token().is_none());
        assert_eq!(storage.get_item(STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn storage_layout_matches_the_browser_pages() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("storage.json"));
        let mut session = SessionContext::load(storage.clone()).unwrap();
        session.set_user_details(user()).unwrap();

        let stored = storage.get_item(STORAGE_KEY).unwrap().unwrap();
        assert_eq!(stored["state"]["user"]["email"], "officer@example.com");
        assert_eq!(stored["state"]["user"]["isAdmin"], false);
        assert!(stored["state"]["authToken"].is_null());
    }

    #[test]
    fn corrupt_entry_starts_a_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("storage.json"));
        storage
            .set_item(STORAGE_KEY, json!({ "state": "garbage" }))
            .unwrap();

        let session = SessionContext::load(storage).unwrap();
        assert!(session.current_user().is_none());
    }

    #[tokio::test]
    async fn failed_lookup_clears_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("storage.json"));
        let mut session = SessionContext::load(storage.clone()).unwrap();
        session.set_auth_token("stale").unwrap();
        session.set_user_details(user()).unwrap();

        // nothing listens on a port we just released
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let api = ApiClient::new(format!("http://127.0.0.1:{port}")).unwrap();

        assert!(session.fetch_authenticated_user(&api).await.is_err());
        assert!(session.current_user().is_none());
        assert!(session.auth_token().is_none());

        let reloaded = SessionContext::load(storage).unwrap();
        assert!(reloaded.current_user().is_none());
    }
}
