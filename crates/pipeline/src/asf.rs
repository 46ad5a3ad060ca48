//! ASF search API client.
//!
//! Issues one `GET` per query against the parameter search endpoint with
//! `output=geojson` and maps each returned feature's properties to a
//! [`Product`]. ureq is synchronous, so requests run on the blocking pool.

use std::time::Duration;

use async_trait::async_trait;
use skreddata_core::{format_timestamp, Product, ProductSearch, SearchError, SearchQuery};
use tracing::debug;

/// Public ASF parameter search endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.daac.asf.alaska.edu/services/search/param";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct AsfSearch {
    endpoint: String,
    timeout: Duration,
}

impl Default for AsfSearch {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl AsfSearch {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Full request URL for `query`.
    pub fn query_url(&self, query: &SearchQuery) -> String {
        let params = [
            ("processingLevel", query.processing_level.clone()),
            ("intersectsWith", query.intersects_with.clone()),
            ("start", format_timestamp(query.start)),
            ("end", format_timestamp(query.end)),
            ("output", "geojson".to_string()),
        ];
        let encoded: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoded(v)))
            .collect();
        format!("{}?{}", self.endpoint, encoded.join("&"))
    }
}

#[async_trait]
impl ProductSearch for AsfSearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Product>, SearchError> {
        let url = self.query_url(query);
        let timeout = self.timeout;
        debug!(url = %url, "querying ASF");

        let collection = tokio::task::spawn_blocking(move || fetch_collection(&url, timeout))
            .await
            .map_err(|e| SearchError::Backend(format!("task join error: {e}")))??;

        let products = products_from_collection(collection)?;
        debug!(count = products.len(), "ASF search returned");
        Ok(products)
    }
}

fn fetch_collection(
    url: &str,
    timeout: Duration,
) -> Result<geojson::FeatureCollection, SearchError> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into();
    let mut response = agent
        .get(url)
        .call()
        .map_err(|e| SearchError::Backend(classify_http_error(e)))?;
    response
        .body_mut()
        .read_json::<geojson::FeatureCollection>()
        .map_err(|e| SearchError::MalformedRecord(format!("invalid GeoJSON response: {e}")))
}

/// Map every feature of a search result to a product.
pub fn products_from_collection(
    collection: geojson::FeatureCollection,
) -> Result<Vec<Product>, SearchError> {
    collection
        .features
        .into_iter()
        .map(|feature| {
            let properties = feature
                .properties
                .ok_or_else(|| SearchError::MalformedRecord("feature without properties".into()))?;
            Product::from_properties(properties)
        })
        .collect()
}

/// Percent-encode a query parameter value.
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(byte))
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn classify_http_error(err: ureq::Error) -> String {
    match err {
        ureq::Error::StatusCode(status @ 400..=499) => {
            format!("ASF rejected the query ({status})")
        }
        ureq::Error::StatusCode(status) => format!("ASF server error ({status})"),
        ureq::Error::Timeout(_) => "ASF request timed out".to_string(),
        ureq::Error::Io(e) => format!("could not reach ASF: {e}"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn query_url_encodes_parameters() {
        let search = AsfSearch::new("https://example.test/search/");
        let query = SearchQuery {
            processing_level: "GRD_HD".into(),
            intersects_with: "POLYGON ((10 60, 11 60, 10 60))".into(),
            start: datetime!(2020-01-01 0:00 UTC),
            end: datetime!(2020-01-02 12:30 UTC),
        };
        let url = search.query_url(&query);
        assert_eq!(
            url,
            "https://example.test/search?processingLevel=GRD_HD\
             &intersectsWith=POLYGON%20%28%2810%2060%2C%2011%2060%2C%2010%2060%29%29\
             &start=2020-01-01T00%3A00%3A00Z&end=2020-01-02T12%3A30%3A00Z&output=geojson"
        );
    }

    #[test]
    fn features_map_to_products() {
        let collection: geojson::FeatureCollection = serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": null,
                "properties": {
                    "pathNumber": "66",
                    "startTime": "2020-01-05T05:00:00Z",
                    "stopTime": "2020-01-05T05:00:25Z",
                    "sceneName": "S1A_IW_GRDH_X"
                }
            }]
        }))
        .unwrap();
        let products = products_from_collection(collection).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].path_number(), 66);
        assert_eq!(products[0].scene_key(), "S1A_IW_GRDH_X");
    }

    #[test]
    fn feature_without_properties_is_malformed() {
        let collection: geojson::FeatureCollection = serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [{"type": "Feature", "geometry": null, "properties": null}]
        }))
        .unwrap();
        assert!(matches!(
            products_from_collection(collection),
            Err(SearchError::MalformedRecord(_))
        ));
    }
}
