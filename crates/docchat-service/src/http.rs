use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use docchat_core::project::{string_or_number, CreateProject, UpdateProject};
use docchat_core::{ProjectState, Role};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ServiceError;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Where the remote API lives and which bearer token to present.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl ClientConfig {
    /// Build from `DOCCHAT_API_URL` and `DOCCHAT_API_TOKEN`.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("DOCCHAT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into()),
            token: std::env::var("DOCCHAT_API_TOKEN").ok(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsResponse {
    pub groups: Vec<String>,
    #[serde(default)]
    pub total_groups: u32,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMessage {
    pub id: String,
    pub content: String,
    pub role: Role,
    #[serde(deserialize_with = "remote_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub project_id: String,
    pub user_id: String,
}

/// A project as the remote API returns it. Ids may come back as numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteProject {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "createdAt", deserialize_with = "remote_timestamp_opt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedAt", deserialize_with = "remote_timestamp_opt")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "accessType")]
    pub access_type: Option<String>,
    #[serde(default)]
    pub state: Option<ProjectState>,
}

#[derive(Debug, Clone, Deserialize)]
struct DeleteResponse {
    message: String,
}

/// A file sent with a multipart project request.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime: Option<String>,
    pub data: Bytes,
}

/// Parse a remote timestamp. RFC 3339 text is taken as is; naive ISO-8601
/// text without an offset is read as UTC.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    text.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc())
}

fn remote_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_timestamp(&text)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {text}")))
}

fn remote_timestamp_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(text) => parse_timestamp(&text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {text}"))),
        None => Ok(None),
    }
}

/// Async client for the remote project, chat and auth API.
///
/// Every call is one request; failures come back to the caller as
/// `ServiceError` and nothing is retried.
pub struct HttpClient {
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl HttpClient {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::new(),
            token: None,
        }
    }

    pub fn with_token(base_url: &str, token: String) -> Self {
        let mut client = Self::new(base_url);
        client.token = Some(token);
        client
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        match &config.token {
            Some(token) => Self::with_token(&config.base_url, token.clone()),
            None => Self::new(&config.base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ServiceError> {
        let resp = self
            .with_auth(builder)
            .send()
            .await
            .map_err(|e| ServiceError::Remote(format!("request failed: {e}")))?;
        handle_response(resp).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        self.send(self.client.get(format!("{}{path}", self.base_url)))
            .await
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        self.send(
            self.client
                .post(format!("{}{path}", self.base_url))
                .json(body),
        )
        .await
    }

    async fn put_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        self.send(
            self.client
                .put(format!("{}{path}", self.base_url))
                .json(body),
        )
        .await
    }

    // -- Auth --

    pub async fn login(&self, email: &str, user_type: &str) -> Result<TokenResponse, ServiceError> {
        self.post_json(
            "/auth/login",
            &serde_json::json!({ "email": email, "userType": user_type }),
        )
        .await
    }

    pub async fn groups(&self) -> Result<GroupsResponse, ServiceError> {
        self.get_json("/auth/groups").await
    }

    // -- Projects --

    pub async fn list_projects(&self) -> Result<Vec<RemoteProject>, ServiceError> {
        self.get_json("/projects").await
    }

    pub async fn list_projects_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<RemoteProject>, ServiceError> {
        self.get_json(&format!("/projects/user/{user_id}")).await
    }

    pub async fn get_project(&self, id: &str) -> Result<RemoteProject, ServiceError> {
        self.get_json(&format!("/projects/{id}")).await
    }

    /// Create a project with its uploads in one multipart request.
    pub async fn create_project(
        &self,
        data: &CreateProject,
        files: Vec<UploadFile>,
    ) -> Result<RemoteProject, ServiceError> {
        let form = project_form(data, files)?;
        self.send(
            self.client
                .post(format!("{}/projectsv2", self.base_url))
                .multipart(form),
        )
        .await
    }

    pub async fn update_project(
        &self,
        id: &str,
        data: &UpdateProject,
        files: Vec<UploadFile>,
    ) -> Result<RemoteProject, ServiceError> {
        let form = project_form(data, files)?;
        self.send(
            self.client
                .put(format!("{}/projects/{id}", self.base_url))
                .multipart(form),
        )
        .await
    }

    /// Returns the server's confirmation message.
    pub async fn delete_project(&self, id: &str) -> Result<String, ServiceError> {
        let resp: DeleteResponse = self
            .send(self.client.delete(format!("{}/projects/{id}", self.base_url)))
            .await?;
        Ok(resp.message)
    }

    pub async fn publish_project(&self, id: &str) -> Result<RemoteProject, ServiceError> {
        self.put_json(&format!("/projects/{id}/publish"), &serde_json::json!({}))
            .await
    }

    // -- Chat --

    /// Post a user message and return the generated reply.
    pub async fn send_chat(
        &self,
        project_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<String, ServiceError> {
        let reply: ChatReply = self
            .post_json(
                &format!("/chat/{project_id}/{user_id}"),
                &serde_json::json!({
                    "content": content,
                    "project_id": project_id,
                    "user_id": user_id,
                }),
            )
            .await?;
        Ok(reply.response)
    }

    /// Stored conversation for a project/user pair. The server answers 404
    /// when there is none, which is reported as an empty list.
    pub async fn list_messages(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Vec<RemoteMessage>, ServiceError> {
        match self
            .get_json(&format!("/messages/{project_id}/{user_id}"))
            .await
        {
            Err(ServiceError::NotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }
}

fn project_form<B: Serialize>(data: &B, files: Vec<UploadFile>) -> Result<Form, ServiceError> {
    let mut form = Form::new().text("project_data", serde_json::to_string(data)?);
    for file in files {
        let mut part = Part::bytes(file.data.to_vec()).file_name(file.name);
        if let Some(mime) = &file.mime {
            part = part
                .mime_str(mime)
                .map_err(|e| ServiceError::InvalidInput(format!("mime type {mime}: {e}")))?;
        }
        form = form.part("files", part);
    }
    Ok(form)
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        resp.json::<T>()
            .await
            .map_err(|e| ServiceError::Remote(format!("json decode: {e}")))
    } else {
        Err(parse_error_with_status(status, resp).await)
    }
}

async fn parse_error_with_status(status: StatusCode, resp: reqwest::Response) -> ServiceError {
    let body = resp.text().await.unwrap_or_default();
    let msg = error_message(&body);
    tracing::warn!(%status, error = %msg, "remote call failed");

    match status {
        StatusCode::NOT_FOUND => ServiceError::NotFound(msg),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ServiceError::InvalidInput(msg),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Unauthorized(msg),
        _ => ServiceError::Remote(format!("{status}: {msg}")),
    }
}

/// Pull a readable message out of an error body: `detail` or `error` when
/// the body is JSON, else the raw text.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };
    for field in ["detail", "error"] {
        match &value[field] {
            serde_json::Value::String(s) => return s.clone(),
            serde_json::Value::Null => {}
            other => return other.to_string(),
        }
    }
    body.to_string()
}
