use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::COOKIE;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{Folder, HistoryItem};

pub const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server responded with status {0}")]
    Status(u16),
    /// The server refused the request with a structured `{"error": ...}` body.
    #[error("{0}")]
    Rejected(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// The REST surface the sidebar talks to.
pub trait HistoryApi: Send {
    fn list_history(&self) -> Result<Vec<HistoryItem>, GatewayError>;
    fn list_folders(&self) -> Result<Vec<Folder>, GatewayError>;
    fn move_item(&self, item_id: i64, folder_id: Option<i64>) -> Result<(), GatewayError>;
    fn delete_item(&self, item_id: i64) -> Result<(), GatewayError>;
    fn clear_history(&self) -> Result<(), GatewayError>;
    fn create_folder(&self, name: &str, color: &str) -> Result<(), GatewayError>;
    fn delete_folder(&self, folder_id: i64) -> Result<(), GatewayError>;
}

pub struct HttpGateway {
    client: Client,
    base_url: String,
    csrf_token: Option<String>,
}

impl HttpGateway {
    pub fn new(
        base_url: &str,
        csrf_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            csrf_token: csrf_token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_csrf(&self, request: RequestBuilder) -> RequestBuilder {
        match self.csrf_token.as_deref() {
            Some(token) => request
                .header(CSRF_HEADER, token)
                .header(COOKIE, format!("csrftoken={token}")),
            None => request,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = check(self.client.get(&url).send()?)?;
        Ok(response.json()?)
    }

    fn mutate(&self, method: &str, request: RequestBuilder, path: &str) -> Result<(), GatewayError> {
        debug!(method, path, "mutation");
        let result = self
            .with_csrf(request)
            .send()
            .map_err(GatewayError::from)
            .and_then(check);
        if let Err(err) = &result {
            warn!(method, path, %err, "mutation failed");
        }
        result.map(|_| ())
    }
}

impl HistoryApi for HttpGateway {
    fn list_history(&self) -> Result<Vec<HistoryItem>, GatewayError> {
        self.get_json("/history/")
    }

    fn list_folders(&self) -> Result<Vec<Folder>, GatewayError> {
        self.get_json("/api/folders/")
    }

    fn move_item(&self, item_id: i64, folder_id: Option<i64>) -> Result<(), GatewayError> {
        let path = format!("/api/history/{item_id}/move/");
        let request = self
            .client
            .put(self.url(&path))
            .json(&json!({ "folder_id": folder_id }));
        self.mutate("PUT", request, &path)
    }

    fn delete_item(&self, item_id: i64) -> Result<(), GatewayError> {
        let path = format!("/delete-history/{item_id}");
        let request = self.client.delete(self.url(&path));
        self.mutate("DELETE", request, &path)
    }

    fn clear_history(&self) -> Result<(), GatewayError> {
        let path = "/history/clear/";
        let request = self.client.delete(self.url(path));
        self.mutate("DELETE", request, path)
    }

    fn create_folder(&self, name: &str, color: &str) -> Result<(), GatewayError> {
        let path = "/api/folders/create/";
        let request = self
            .client
            .post(self.url(path))
            .json(&json!({ "name": name, "color": color }));
        self.mutate("POST", request, path)
    }

    fn delete_folder(&self, folder_id: i64) -> Result<(), GatewayError> {
        let path = format!("/api/folders/{folder_id}/delete/");
        let request = self.client.delete(self.url(&path));
        self.mutate("DELETE", request, &path)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub fn server_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error)
        .filter(|msg| !msg.trim().is_empty())
}

fn check(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(match server_error_message(&body) {
        Some(message) => GatewayError::Rejected(message),
        None => GatewayError::Status(status.as_u16()),
    })
}
