//! Network retrieval of catalogs and CDMs.
//!
//! A thin collaborator around the screening core: the core itself never
//! requires it and consumes only the in-memory collections it returns.

use crate::cdm::{parse_cdm_kvn, parse_cdm_xml, Cdm};
use crate::elements::{parse_omm_json, parse_tle_catalog, ElementSet};
use crate::error::{Result, ScreenError};

pub struct CatalogFetcher {
    client: reqwest::Client,
}

impl CatalogFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Fetches one Celestrak GP group as TLE text and parses it.
    pub async fn fetch_group(&self, group: &str) -> Result<Vec<ElementSet>> {
        let url = format!(
            "https://celestrak.org/NORAD/elements/gp.php?GROUP={group}&FORMAT=tle"
        );
        self.fetch_catalog(&url).await
    }

    /// Fetches element sets from an arbitrary URL. TLE text and OMM JSON
    /// payloads are both accepted.
    pub async fn fetch_catalog(&self, url: &str) -> Result<Vec<ElementSet>> {
        let body = self
            .fetch_text(url, |reason| ScreenError::ElementsParse {
                location: url.to_string(),
                reason,
            })
            .await?;
        if body.trim_start().starts_with('[') {
            parse_omm_json(&body)
        } else {
            Ok(parse_tle_catalog(&body))
        }
    }

    /// Fetches and parses a CDM; the encoding is sniffed from the payload.
    pub async fn fetch_cdm(&self, url: &str) -> Result<Cdm> {
        let body = self
            .fetch_text(url, |reason| ScreenError::CdmParse {
                field: url.to_string(),
                reason,
            })
            .await?;
        if body.trim_start().starts_with('<') {
            parse_cdm_xml(&body)
        } else {
            parse_cdm_kvn(&body)
        }
    }

    /// Shared GET helper. A non-success status maps through `status_error`
    /// so each caller reports its own error kind.
    async fn fetch_text<F>(&self, url: &str, status_error: F) -> Result<String>
    where
        F: FnOnce(String) -> ScreenError,
    {
        tracing::info!("Fetching {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!("HTTP request to {} failed with status {}", url, status);
            return Err(status_error(format!("HTTP {status}")));
        }
        let body = response.text().await?;
        tracing::debug!("Received {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

impl Default for CatalogFetcher {
    fn default() -> Self {
        Self::new()
    }
}
