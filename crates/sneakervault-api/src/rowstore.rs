use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Postgres unique_violation, as surfaced through the REST layer
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum RowStoreError {
    #[error("Row already exists: {0}")]
    Conflict(String),

    #[error("Not authorized to access the row store")]
    Unauthorized,

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RowStoreError>;

/// The signed-in user, as reported by the auth endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sneaker_id: String,
    pub name: String,
    pub brand: String,
    pub thumbnail: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewVaultItem {
    pub user_id: Uuid,
    pub sneaker_id: String,
    pub name: String,
    pub brand: String,
    pub thumbnail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCollection {
    pub user_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub sneaker_id: String,
    pub name: String,
    pub brand: String,
    pub thumbnail: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewCollectionItem {
    pub collection_id: Uuid,
    pub sneaker_id: String,
    pub name: String,
    pub brand: String,
    pub thumbnail: String,
}

/// Error body the REST layer sends back on failures
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[allow(dead_code)]
    id: Uuid,
}

/// Client for the hosted row store and its auth endpoint.
///
/// Speaks PostgREST: tables live under `/rest/v1/<table>`, filters are
/// query params like `user_id=eq.<uuid>`. Every request carries the anon
/// key; the access token (if we have one) identifies the user.
pub struct RowStoreClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl RowStoreClient {
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        access_token: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("SneakerVault/0.1.0")
            .timeout(DEFAULT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            access_token,
        })
    }

    pub fn has_session(&self) -> bool {
        self.access_token.is_some()
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    /// Send a request and hand back the body, mapping status codes to errors
    async fn execute(&self, request: RequestBuilder) -> Result<String> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            return Ok(body);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RowStoreError::Unauthorized);
        }

        let parsed: Option<ErrorBody> = serde_json::from_str(&body).ok();
        let is_duplicate = status == StatusCode::CONFLICT
            || parsed
                .as_ref()
                .and_then(|b| b.code.as_deref())
                .is_some_and(|code| code == UNIQUE_VIOLATION);

        let message = parsed
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("Status {}: {}", status, body));

        if is_duplicate {
            return Err(RowStoreError::Conflict(message));
        }

        Err(RowStoreError::RequestFailed(message))
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Vec<T>> {
        let body = self.execute(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn insert_row<N: Serialize, T: DeserializeOwned>(&self, table: &str, row: &N) -> Result<T> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(row);

        let mut rows: Vec<T> = self.fetch_rows(request).await?;
        if rows.is_empty() {
            return Err(RowStoreError::RequestFailed(format!(
                "insert into {} returned no rows",
                table
            )));
        }
        Ok(rows.swap_remove(0))
    }

    /// Who's signed in, if anyone.
    ///
    /// No access token means no user, and we don't bother asking. A token
    /// the server rejects also means no user.
    pub async fn current_user(&self) -> Result<Option<AuthUser>> {
        if self.access_token.is_none() {
            return Ok(None);
        }

        let request = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url));

        match self.execute(request).await {
            Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
            Err(RowStoreError::Unauthorized) => {
                debug!("Session token rejected, treating as signed out");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn vault_item_exists(&self, user_id: Uuid, sneaker_id: &str) -> Result<bool> {
        let request = self.client.get(self.table_url("vault_items")).query(&[
            ("select", "id".to_string()),
            ("user_id", format!("eq.{}", user_id)),
            ("sneaker_id", format!("eq.{}", sneaker_id)),
            ("limit", "1".to_string()),
        ]);

        let rows: Vec<IdRow> = self.fetch_rows(request).await?;
        Ok(!rows.is_empty())
    }

    pub async fn list_vault(&self, user_id: Uuid) -> Result<Vec<VaultItem>> {
        let request = self.client.get(self.table_url("vault_items")).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", user_id)),
            ("order", "created_at.desc".to_string()),
        ]);
        self.fetch_rows(request).await
    }

    pub async fn insert_vault_item(&self, item: &NewVaultItem) -> Result<VaultItem> {
        self.insert_row("vault_items", item).await
    }

    pub async fn delete_vault_item(&self, user_id: Uuid, sneaker_id: &str) -> Result<()> {
        let request = self.client.delete(self.table_url("vault_items")).query(&[
            ("user_id", format!("eq.{}", user_id)),
            ("sneaker_id", format!("eq.{}", sneaker_id)),
        ]);
        self.execute(request).await?;
        Ok(())
    }

    pub async fn list_collections(&self, user_id: Uuid) -> Result<Vec<Collection>> {
        let request = self.client.get(self.table_url("collections")).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{}", user_id)),
            ("order", "created_at.desc".to_string()),
        ]);
        self.fetch_rows(request).await
    }

    pub async fn insert_collection(&self, collection: &NewCollection) -> Result<Collection> {
        self.insert_row("collections", collection).await
    }

    pub async fn delete_collection(&self, user_id: Uuid, collection_id: Uuid) -> Result<()> {
        let request = self.client.delete(self.table_url("collections")).query(&[
            ("id", format!("eq.{}", collection_id)),
            ("user_id", format!("eq.{}", user_id)),
        ]);
        self.execute(request).await?;
        Ok(())
    }

    pub async fn list_collection_items(&self, collection_id: Uuid) -> Result<Vec<CollectionItem>> {
        let request = self.client.get(self.table_url("collection_items")).query(&[
            ("select", "*".to_string()),
            ("collection_id", format!("eq.{}", collection_id)),
            ("order", "created_at.desc".to_string()),
        ]);
        self.fetch_rows(request).await
    }

    pub async fn insert_collection_item(&self, item: &NewCollectionItem) -> Result<CollectionItem> {
        self.insert_row("collection_items", item).await
    }

    pub async fn delete_collection_item(&self, collection_id: Uuid, sneaker_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.table_url("collection_items"))
            .query(&[
                ("collection_id", format!("eq.{}", collection_id)),
                ("sneaker_id", format!("eq.{}", sneaker_id)),
            ]);
        self.execute(request).await?;
        Ok(())
    }
}
