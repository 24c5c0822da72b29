use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{
    DeleteResponse, FetchQuery, FetchResponse, FieldSelector, MutationResponse, RecordClient,
    RecordResponse,
};
use crate::config::CrmConfig;
use crate::core::Loose;
use crate::error::ServiceError;

/// Overrides the keyring when set.
pub const API_KEY_ENV: &str = "CRM_API_KEY";

/// Record client speaking JSON over HTTPS to the hosted record store.
pub struct HttpRecordClient {
    base_url: String,
    project_id: String,
    api_key: String,
    http: Client,
}

impl HttpRecordClient {
    pub fn new(base_url: &str, project_id: &str, api_key: &str) -> Result<Self, ServiceError> {
        if base_url.trim().is_empty() {
            return Err(ServiceError::NotInitialized(
                "no record store URL configured".to_string(),
            ));
        }
        if api_key.trim().is_empty() {
            return Err(ServiceError::NotInitialized(
                "no API key; run `crm login --key <KEY>`".to_string(),
            ));
        }
        let http = Client::builder()
            .user_agent(concat!("crm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::NotInitialized(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            project_id: project_id.trim().to_string(),
            api_key: api_key.trim().to_string(),
            http,
        })
    }

    /// Build a client from config, taking the API key from the environment
    /// or the system keyring.
    pub async fn from_config(config: &CrmConfig) -> Result<Self, ServiceError> {
        let api_key = match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => super::keyring::load_api_key(&config.base_url)
                .await
                .map_err(ServiceError::NotInitialized)?
                .unwrap_or_default(),
        };
        Self::new(&config.base_url, &config.project_id, &api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header("X-Project-Id", &self.project_id)
    }

    /// Send and decode an envelope. Non-2xx answers that still carry an
    /// envelope are returned as-is so the store's message reaches the caller.
    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T, ServiceError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("{} failed: {}", what, e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ServiceError::Transport(format!("Failed to read {} response: {}", what, e)))?;

        log::debug!("{} returned {}: {}", what, status, text);

        match serde_json::from_str::<T>(&text) {
            Ok(envelope) => Ok(envelope),
            Err(e) if status.is_success() => Err(ServiceError::Decode(format!(
                "{} response: {}",
                what, e
            ))),
            Err(_) => Err(ServiceError::Transport(format!(
                "{} returned {}: {}",
                what, status, text
            ))),
        }
    }
}

#[async_trait]
impl RecordClient for HttpRecordClient {
    async fn fetch_records(
        &self,
        table: &str,
        query: &FetchQuery,
    ) -> Result<FetchResponse, ServiceError> {
        let url = format!("{}/fetch", self.table_url(table));
        let req = self.request(Method::POST, &url).json(query);
        self.send(req, &format!("fetch {}", table)).await
    }

    async fn get_record_by_id(
        &self,
        table: &str,
        id: i64,
        fields: &[FieldSelector],
    ) -> Result<RecordResponse, ServiceError> {
        let url = format!("{}/{}", self.table_url(table), id);
        let names: Vec<&str> = fields.iter().map(FieldSelector::name).collect();
        let req = self
            .request(Method::GET, &url)
            .query(&[("fields", names.join(","))]);
        self.send(req, &format!("get {} {}", table, id)).await
    }

    async fn create_record(
        &self,
        table: &str,
        records: Vec<Loose>,
    ) -> Result<MutationResponse, ServiceError> {
        let req = self
            .request(Method::POST, &self.table_url(table))
            .json(&json!({ "records": records }));
        self.send(req, &format!("create {}", table)).await
    }

    async fn update_record(
        &self,
        table: &str,
        records: Vec<Loose>,
    ) -> Result<MutationResponse, ServiceError> {
        let req = self
            .request(Method::PUT, &self.table_url(table))
            .json(&json!({ "records": records }));
        self.send(req, &format!("update {}", table)).await
    }

    async fn delete_record(
        &self,
        table: &str,
        ids: Vec<i64>,
    ) -> Result<DeleteResponse, ServiceError> {
        let req = self
            .request(Method::DELETE, &self.table_url(table))
            .json(&json!({ "RecordIds": ids }));
        self.send(req, &format!("delete {}", table)).await
    }
}
