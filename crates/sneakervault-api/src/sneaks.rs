use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Error, Debug)]
pub enum SneaksError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Sneaker not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SneaksError>;

/// One search hit from the sneaker-data provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sneaker {
    #[serde(rename = "styleID")]
    pub style_id: String,
    pub name: String,
    pub brand: String,
    pub thumbnail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retail_price: Option<f64>,
}

/// Full item payload from `/items/<id>`.
///
/// Resell maps are keyed by platform name (stockX, goat, flightClub...).
/// A platform with no listing comes back as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SneakerDetail {
    #[serde(flatten)]
    pub sneaker: Sneaker,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_links: Vec<String>,
    #[serde(default)]
    pub resell_prices: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub resell_links: BTreeMap<String, Option<String>>,
}

impl SneakerDetail {
    /// Cheapest resell listing across platforms, if any platform has one
    pub fn lowest_resell_price(&self) -> Option<(&str, f64)> {
        self.resell_prices
            .iter()
            .filter_map(|(platform, price)| price.map(|p| (platform.as_str(), p)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Client for the sneaker-data provider.
///
/// Two endpoints, both plain GETs. Callers own caching and cancellation;
/// this just turns HTTP into typed results.
pub struct SneaksClient {
    client: reqwest::Client,
    base_url: String,
}

impl SneaksClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("SneakerVault/0.1.0"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// `GET /search?q=<query>`
    pub async fn search(&self, query: &str) -> Result<Vec<Sneaker>> {
        let url = format!("{}/search", self.base_url);
        debug!("Searching sneakers: {}", query);

        let response = self.client.get(&url).query(&[("q", query)]).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SneaksError::RequestFailed(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let body = response.text().await?;
        let sneakers: Vec<Sneaker> = serde_json::from_str(&body)?;
        Ok(sneakers)
    }

    /// `GET /items/<id>` - a 404 comes back as `NotFound`, not a generic failure
    pub async fn get_sneaker(&self, style_id: &str) -> Result<SneakerDetail> {
        let url = format!("{}/items/{}", self.base_url, urlencoding::encode(style_id));
        debug!("Fetching sneaker detail: {}", style_id);

        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SneaksError::NotFound(style_id.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SneaksError::RequestFailed(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let body = response.text().await?;
        let detail: SneakerDetail = serde_json::from_str(&body)?;
        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn air_max_json() -> serde_json::Value {
        json!({
            "styleID": "DZ4549-001",
            "name": "Nike Air Max 1 '86",
            "brand": "Nike",
            "thumbnail": "https://images.stockx.com/images/air-max.jpg",
            "colorway": "Black/White",
            "releaseDate": "2023-03-26",
            "retailPrice": 150
        })
    }

    #[tokio::test]
    async fn test_search_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "air max"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                air_max_json(),
                {
                    "styleID": "555088-134",
                    "name": "Jordan 1 Retro High",
                    "brand": "Jordan",
                    "thumbnail": "https://images.stockx.com/images/j1.jpg"
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = SneaksClient::new(server.uri()).unwrap();
        let results = client.search("air max").await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].style_id, "DZ4549-001");
        assert_eq!(results[0].retail_price, Some(150.0));
        assert_eq!(results[1].colorway, None);
    }

    #[tokio::test]
    async fn test_search_server_error_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = SneaksClient::new(server.uri()).unwrap();
        let err = client.search("jordan").await.unwrap_err();

        assert!(matches!(err, SneaksError::RequestFailed(ref msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn test_get_sneaker_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/NOPE-000"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = SneaksClient::new(server.uri()).unwrap();
        let err = client.get_sneaker("NOPE-000").await.unwrap_err();

        assert!(matches!(err, SneaksError::NotFound(id) if id == "NOPE-000"));
    }

    #[tokio::test]
    async fn test_get_sneaker_parses_detail() {
        let mut body = air_max_json();
        body["description"] = json!("The one that started it all.");
        body["imageLinks"] = json!(["https://images.stockx.com/images/1.jpg"]);
        body["resellPrices"] = json!({ "stockX": 210, "goat": 189.5, "flightClub": null });
        body["resellLinks"] = json!({ "stockX": "https://stockx.com/x", "goat": null });

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/DZ4549-001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = SneaksClient::new(format!("{}/", server.uri())).unwrap();
        let detail = client.get_sneaker("DZ4549-001").await.unwrap();

        assert_eq!(detail.sneaker.name, "Nike Air Max 1 '86");
        assert_eq!(detail.image_links.len(), 1);
        assert_eq!(detail.resell_prices.get("flightClub"), Some(&None));
        assert_eq!(detail.resell_links.get("goat"), Some(&None));
        assert_eq!(detail.lowest_resell_price(), Some(("goat", 189.5)));
    }

    #[tokio::test]
    async fn test_get_sneaker_bad_gateway_is_not_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items/DZ4549-001"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = SneaksClient::new(server.uri()).unwrap();
        let err = client.get_sneaker("DZ4549-001").await.unwrap_err();

        assert!(matches!(err, SneaksError::RequestFailed(_)));
    }

    #[test]
    fn test_detail_round_trips_through_cache_json() {
        let detail = SneakerDetail {
            sneaker: serde_json::from_value(air_max_json()).unwrap(),
            description: None,
            image_links: vec![],
            resell_prices: BTreeMap::new(),
            resell_links: BTreeMap::new(),
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["styleID"], "DZ4549-001");

        let back: SneakerDetail = serde_json::from_value(json).unwrap();
        assert_eq!(back, detail);
    }
}
