use reqwest::{header, redirect, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::ClientError;
use crate::compliance::ComplianceReport;
use crate::model::{
    DetectionForm, DetectionModel, DetectionSummary, FlagFields, FlagUpdate, LoginResponse,
    UserModelResponse,
};
use crate::session::TOKEN_COOKIE;

#[derive(Deserialize)]
struct ErrorReply {
    message: Option<String>,
}

#[derive(Deserialize)]
struct UserReply {
    user: UserModelResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentUserReply {
    current_user: UserModelResponse,
}

#[derive(Deserialize)]
struct DataReply<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReply {
    pub scan_data: DetectionModel,
    pub compliance: ComplianceReport,
}

/// Thin wrapper over the REST endpoints. The session token is passed per
/// call and sent as the `token` cookie.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        // the gate answers with a redirect, which must not be followed
        let http = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match token {
            Some(token) => builder.header(header::COOKIE, format!("{TOKEN_COOKIE}={token}")),
            None => builder,
        }
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_redirection() {
            return Err(ClientError::Unauthenticated);
        }
        if !status.is_success() {
            let message = response
                .json::<ErrorReply>()
                .await
                .ok()
                .and_then(|reply| reply.message)
                .unwrap_or_else(|| status.to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<T>().await?)
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserModelResponse, ClientError> {
        let response = self
            .request(Method::POST, "/api/register", None)
            .json(&json!({ "name": name, "email": email, "password": password }))
            .send()
            .await?;
        Ok(Self::read::<UserReply>(response).await?.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let response = self
            .request(Method::POST, "/api/login", None)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        Self::read(response).await
    }

    pub async fn logout(&self, token: &str) -> Result<(), ClientError> {
        let response = self
            .request(Method::POST, "/api/logout", Some(token))
            .send()
            .await?;
        Self::read::<Value>(response).await.map(|_| ())
    }

    pub async fn fetch_authenticated_user(
        &self,
        token: &str,
        user_id: Option<&str>,
    ) -> Result<UserModelResponse, ClientError> {
        let body = match user_id {
            Some(id) => json!({ "userId": id }),
            None => json!({}),
        };
        let response = self
            .request(Method::POST, "/api/fetch-Authenticated-user", Some(token))
            .json(&body)
            .send()
            .await?;
        Ok(Self::read::<CurrentUserReply>(response).await?.current_user)
    }

    pub async fn submit_detection(
        &self,
        token: &str,
        form: &DetectionForm,
    ) -> Result<DetectionModel, ClientError> {
        let response = self
            .request(Method::POST, "/api/data-form", Some(token))
            .json(form)
            .send()
            .await?;
        Ok(Self::read::<DataReply<DetectionModel>>(response).await?.data)
    }

    pub async fn fetch_scans(
        &self,
        token: &str,
        user_id: &str,
    ) -> Result<Vec<DetectionModel>, ClientError> {
        let response = self
            .request(Method::POST, "/api/fetch-scans", Some(token))
            .json(&json!({ "userId": user_id }))
            .send()
            .await?;
        Ok(Self::read::<DataReply<Vec<DetectionModel>>>(response).await?.data)
    }

    pub async fn fetch_single_scan(
        &self,
        token: &str,
        scan_id: &str,
    ) -> Result<ScanReply, ClientError> {
        let response = self
            .request(Method::POST, "/api/fetch-single-scans", Some(token))
            .json(&json!({ "scanId": scan_id }))
            .send()
            .await?;
        Self::read(response).await
    }

    pub async fn fetch_detections(&self, token: &str) -> Result<Vec<DetectionSummary>, ClientError> {
        let response = self
            .request(Method::GET, "/api/admin/fetch-detections", Some(token))
            .send()
            .await?;
        Ok(Self::read::<DataReply<Vec<DetectionSummary>>>(response).await?.data)
    }

    pub async fn update_detection(
        &self,
        token: &str,
        id: &str,
        update: FlagUpdate,
    ) -> Result<DetectionModel, ClientError> {
        let response = self
            .request(Method::PATCH, "/api/admin/update-detections", Some(token))
            .json(&json!({ "id": id, "fields": FlagFields::single(update) }))
            .send()
            .await?;
        Ok(Self::read::<DataReply<DetectionModel>>(response).await?.data)
    }
}
