//! rutor.info listing source.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;
use url::Url;

use crate::config::ListingConfig;
use crate::metrics::LISTING_FETCH_DURATION;

use super::parser::parse_listing_page;
use super::{ListingError, ListingRow, ListingSource};

/// Fetches the HTML result page of a rutor-style tracker and parses it.
pub struct RutorSource {
    client: Client,
    base_url: Url,
}

impl RutorSource {
    /// Create a new source with the given configuration.
    pub fn new(config: &ListingConfig) -> Result<Self, ListingError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ListingError::SourceUnavailable(format!("Invalid base URL {}: {}", config.base_url, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                ListingError::SourceUnavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, base_url })
    }

    /// Build the search URL (all categories) for a query.
    fn build_search_url(&self, query: &str) -> String {
        format!(
            "{}/search/0/0/000/0/{}",
            self.base_url.as_str().trim_end_matches('/'),
            urlencoding::encode(query)
        )
    }

    async fn fetch_page(&self, query: &str) -> Result<String, ListingError> {
        let url = self.build_search_url(query);
        debug!(url = %url, "Fetching listing page");

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "text/html")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ListingError::SourceUnavailable("Request timeout".to_string())
                } else {
                    ListingError::SourceUnavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ListingError::SourceUnavailable(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| ListingError::SourceUnavailable(format!("Failed to read body: {}", e)))
    }
}

#[async_trait]
impl ListingSource for RutorSource {
    fn name(&self) -> &str {
        "rutor"
    }

    async fn fetch(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ListingRow>, ListingError> {
        let start = Instant::now();

        let result = match self.fetch_page(query).await {
            Ok(html) => parse_listing_page(&html, &self.base_url, max_results),
            Err(e) => Err(e),
        };

        let outcome = if result.is_ok() { "success" } else { "error" };
        LISTING_FETCH_DURATION
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        if let Ok(rows) = &result {
            debug!(query = %query, rows = rows.len(), "Listing page parsed");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(base_url: &str) -> RutorSource {
        RutorSource::new(&ListingConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_build_search_url_encodes_query() {
        let s = source("https://rutor.info");
        assert_eq!(
            s.build_search_url("matrix 1999"),
            "https://rutor.info/search/0/0/000/0/matrix%201999"
        );
    }

    #[test]
    fn test_build_search_url_trailing_slash() {
        let s = source("http://mirror.example/");
        assert_eq!(
            s.build_search_url("дюна"),
            "http://mirror.example/search/0/0/000/0/%D0%B4%D1%8E%D0%BD%D0%B0"
        );
    }

    #[test]
    fn test_new_rejects_invalid_base_url() {
        let result = RutorSource::new(&ListingConfig {
            base_url: "::not a url::".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ListingError::SourceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_source_fails() {
        let s = RutorSource::new(&ListingConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();

        let result = s.fetch("anything", 10).await;
        assert!(matches!(result, Err(ListingError::SourceUnavailable(_))));
    }
}
