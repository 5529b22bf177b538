//! Ambient managed-identity credential for Azure resources.
//!
//! Resolution order:
//! 1. App Service / Functions identity endpoint (`IDENTITY_ENDPOINT` +
//!    `IDENTITY_HEADER`).
//! 2. The VM instance metadata service.
//!
//! `AZURE_CLIENT_ID` selects a user-assigned identity in both cases. Tokens
//! are fetched per call and not cached.

use reqwest::Client;
use serde::Deserialize;
use std::env;
use thiserror::Error;

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// Token audience for Azure Storage.
pub const STORAGE_RESOURCE: &str = "https://storage.azure.com/";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("identity endpoint request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("identity endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    AppService { endpoint: String, header: String },
    InstanceMetadata,
}

#[derive(Clone)]
pub struct ManagedIdentityCredential {
    client: Client,
    source: IdentitySource,
    client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ManagedIdentityCredential {
    pub fn new(client: Client, source: IdentitySource, client_id: Option<String>) -> Self {
        Self {
            client,
            source,
            client_id,
        }
    }

    /// Pick the identity source from the process environment.
    pub fn from_env(client: Client) -> Self {
        let source = source_from(
            env::var("IDENTITY_ENDPOINT").ok(),
            env::var("IDENTITY_HEADER").ok(),
        );
        let client_id = env::var("AZURE_CLIENT_ID").ok().filter(|v| !v.is_empty());
        Self::new(client, source, client_id)
    }

    /// Acquire a bearer token for `resource`.
    pub async fn token(&self, resource: &str) -> Result<String, CredentialError> {
        let mut query = vec![("resource", resource.to_string())];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.clone()));
        }

        let request = match &self.source {
            IdentitySource::AppService { endpoint, header } => {
                query.push(("api-version", APP_SERVICE_API_VERSION.to_string()));
                self.client
                    .get(endpoint)
                    .header("X-IDENTITY-HEADER", header)
            }
            IdentitySource::InstanceMetadata => {
                query.push(("api-version", IMDS_API_VERSION.to_string()));
                self.client.get(IMDS_ENDPOINT).header("Metadata", "true")
            }
        };

        let response = request.query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!("acquired managed identity token");
        Ok(token.access_token)
    }
}

fn source_from(endpoint: Option<String>, header: Option<String>) -> IdentitySource {
    match (endpoint, header) {
        (Some(endpoint), Some(header)) if !endpoint.is_empty() && !header.is_empty() => {
            IdentitySource::AppService { endpoint, header }
        }
        _ => IdentitySource::InstanceMetadata,
    }
}
