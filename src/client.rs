//! Blocking HTTP transport for the two provider calls (registry listing and
//! table scan).
//!
//! - Blocking client using `ureq` (no async), one agent shared by both
//!   endpoints.
//! - JSON decoding via `serde`; decode failures name the offending path
//!   through `serde_path_to_error`.
//! - Authentication to the providers is managed outside this process; at
//!   most a static bearer token is attached here.

use crate::models::telemetry::{ListingPage, ScanPage, ScanRequest};
use crate::registry::{RegistryApi, RegistryError, LISTING_PAGE_SIZE};
use crate::store::{ScanApi, StoreError};
use core::fmt;
use serde::de::DeserializeOwned;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

#[derive(Debug)]
pub enum ProviderClientError {
    Transport(String),
    Http { status: u16, message: String },
    Json(String),
}

impl Display for ProviderClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProviderClientError::Transport(s) => write!(f, "transport error: {}", s),
            ProviderClientError::Http { status, message } => write!(f, "http {}: {}", status, message),
            ProviderClientError::Json(s) => write!(f, "json error: {}", s),
        }
    }
}

impl Error for ProviderClientError {}

/// HTTP implementation of both provider seams. Cloning shares the underlying
/// agent and its connection pool.
#[derive(Clone)]
pub struct ProviderClient {
    agent: ureq::Agent,
    registry_url: String,
    store_url: String,
    api_token: Option<String>,
}

impl ProviderClient {
    pub fn new(
        registry_url: impl Into<String>,
        store_url: impl Into<String>,
        api_token: Option<String>,
        request_timeout: Duration,
    ) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(request_timeout).build();
        ProviderClient {
            agent,
            registry_url: trim_base(registry_url.into()),
            store_url: trim_base(store_url.into()),
            api_token,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, ProviderClientError> {
        let mut req = self.agent.get(url).set("Accept", "application/json");
        for (k, v) in query {
            req = req.query(k, v);
        }
        if let Some(token) = &self.api_token {
            req = req.set("Authorization", &format!("Bearer {}", token));
        }
        Self::read_json(req.call())
    }

    fn post_json<T: DeserializeOwned>(&self, url: &str, body: &impl serde::Serialize) -> Result<T, ProviderClientError> {
        let mut req = self.agent.post(url).set("Accept", "application/json");
        if let Some(token) = &self.api_token {
            req = req.set("Authorization", &format!("Bearer {}", token));
        }
        Self::read_json(req.send_json(body))
    }

    fn read_json<T: DeserializeOwned>(resp: Result<ureq::Response, ureq::Error>) -> Result<T, ProviderClientError> {
        match resp {
            Ok(res) => {
                let de = &mut serde_json::Deserializer::from_reader(res.into_reader());
                serde_path_to_error::deserialize(de).map_err(|e| ProviderClientError::Json(e.to_string()))
            }
            Err(ureq::Error::Transport(t)) => Err(ProviderClientError::Transport(t.to_string())),
            Err(ureq::Error::Status(status, res)) => {
                let message = res.into_string().unwrap_or_else(|_| String::from("<no body>"));
                Err(ProviderClientError::Http { status, message })
            }
        }
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn error_code(err: &ProviderClientError) -> String {
    match err {
        ProviderClientError::Transport(_) => "transport".to_string(),
        ProviderClientError::Http { status, .. } => status.to_string(),
        ProviderClientError::Json(_) => "decode".to_string(),
    }
}

impl RegistryApi for ProviderClient {
    fn list_page(&self, group: &str, next_token: Option<&str>) -> Result<ListingPage, RegistryError> {
        let url = format!("{}/thing-groups/{}/things", self.registry_url, group);
        let mut query = vec![
            ("maxResults", LISTING_PAGE_SIZE.to_string()),
            ("recursive", "false".to_string()),
        ];
        if let Some(token) = next_token {
            query.push(("nextToken", token.to_string()));
        }
        self.get_json(&url, &query)
            .map_err(|e| RegistryError::Unavailable(e.to_string()))
    }
}

impl ScanApi for ProviderClient {
    fn describe_table(&self, table: &str) -> Result<(), StoreError> {
        let url = format!("{}/tables/{}", self.store_url, table);
        match self.get_json::<serde_json::Value>(&url, &[]) {
            Ok(_) => Ok(()),
            Err(ProviderClientError::Http { status: 404, .. }) => Err(StoreError::TableNotFound(table.to_string())),
            Err(e) => Err(StoreError::TableAccess {
                code: error_code(&e),
                message: e.to_string(),
            }),
        }
    }

    fn scan_page(&self, table: &str, request: &ScanRequest) -> Result<ScanPage, StoreError> {
        let url = format!("{}/tables/{}/scan", self.store_url, table);
        self.post_json(&url, request).map_err(|e| StoreError::ScanFailed {
            code: error_code(&e),
            message: e.to_string(),
        })
    }
}
