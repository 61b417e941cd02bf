//! Record service access

use crate::config::ServiceConfig;
use crate::diff::RecordId;
use crate::error::{MirrorError, Result};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::Value;

/// Header carrying the session token on authenticated requests
pub const SESSION_HEADER: &str = "X-ArchivesSpace-Session";

/// Source of catalog records, one call per identifier
pub trait RecordService {
    /// Every identifier known at an endpoint
    fn list_ids(&self, endpoint: &str) -> Result<Vec<RecordId>>;
    fn fetch(&self, endpoint: &str, id: RecordId) -> Result<Value>;
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session: String,
}

/// Authenticated HTTP client for the record service
pub struct HttpRecordService {
    client: Client,
    base_url: String,
    session: String,
}

impl HttpRecordService {
    /// Log in and keep the session for the rest of the run
    pub fn login(config: &ServiceConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let url = format!("{}/users/{}/login", base_url, config.username);

        let response = client
            .post(&url)
            .query(&[("password", config.password.as_str())])
            .send()?;
        let login: LoginResponse = check_status(&url, response)?.json()?;
        log::info!("Logged in to {} as {}", base_url, config.username);

        Ok(Self {
            client,
            base_url,
            session: login.session,
        })
    }

    fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header(SESSION_HEADER, &self.session)
            .send()?;
        check_status(&url, response)
    }
}

fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(MirrorError::service(format!("{} returned {}", url, status)));
    }
    Ok(response)
}

impl RecordService for HttpRecordService {
    fn list_ids(&self, endpoint: &str) -> Result<Vec<RecordId>> {
        Ok(self.get(&format!("{}?all_ids=true", endpoint))?.json()?)
    }

    fn fetch(&self, endpoint: &str, id: RecordId) -> Result<Value> {
        Ok(self.get(&format!("{}/{}", endpoint, id))?.json()?)
    }
}
