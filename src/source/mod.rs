//! Remote sheet endpoints: where a table comes from and how its CSV
//! export is fetched.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::error::LoadError;
use crate::logging::{log_fetch, v_str, ProfileScope};

pub const DEFAULT_SHEETS_BASE: &str = "https://docs.google.com";

/// Identifies one tab of one spreadsheet behind a CSV-rendering endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SheetLocator {
    /// Short name used in logs and the render payload ("body", "training").
    pub label: String,
    pub base: String,
    pub spreadsheet_id: String,
    /// Tab name; `None` exports the first tab.
    pub sheet: Option<String>,
}

impl SheetLocator {
    pub fn new(label: &str, base: &str, spreadsheet_id: &str, sheet: Option<&str>) -> Self {
        Self {
            label: label.to_string(),
            base: base.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet: sheet
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }

    /// `<base>/spreadsheets/d/<id>/gviz/tq?tqx=out:csv[&sheet=<name>]`
    pub fn url(&self) -> Result<Url, LoadError> {
        let id = self.spreadsheet_id.trim();
        if id.is_empty() {
            return Err(LoadError::InvalidLocator("empty spreadsheet id".to_string()));
        }
        let raw = format!(
            "{}/spreadsheets/d/{}/gviz/tq",
            self.base.trim_end_matches('/'),
            id
        );
        let mut url = Url::parse(&raw).map_err(|e| LoadError::InvalidLocator(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("tqx", "out:csv");
            if let Some(sheet) = &self.sheet {
                query.append_pair("sheet", sheet);
            }
        }
        Ok(url)
    }

    /// Cache key: the export URL, or the raw parts when the URL is invalid.
    pub fn cache_key(&self) -> String {
        match self.url() {
            Ok(url) => url.to_string(),
            Err(_) => format!(
                "{}|{}|{}",
                self.base,
                self.spreadsheet_id,
                self.sheet.as_deref().unwrap_or("")
            ),
        }
    }
}

/// Anything that can return the CSV text behind a locator.
#[async_trait]
pub trait SheetSource: Send + Sync {
    async fn fetch_csv(&self, locator: &SheetLocator) -> Result<String, LoadError>;
}

/// reqwest-backed source for the public CSV export endpoint.
pub struct HttpSheetSource {
    client: Client,
}

impl HttpSheetSource {
    pub fn new() -> Self {
        Self::with_timeout(10)
    }

    pub fn with_timeout(timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

impl Default for HttpSheetSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SheetSource for HttpSheetSource {
    async fn fetch_csv(&self, locator: &SheetLocator) -> Result<String, LoadError> {
        let url = locator.url()?;
        let _scope = ProfileScope::with_context("sheet_fetch", &[("source", v_str(&locator.label))]);

        let resp = match self.client.get(url.clone()).send().await {
            Ok(resp) => resp,
            Err(err) => {
                log_fetch(&locator.label, url.as_str(), None, 0, "network_error");
                return Err(err.into());
            }
        };

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            log_fetch(&locator.label, url.as_str(), Some(status.as_u16()), 0, "permission_denied");
            return Err(LoadError::PermissionDenied { status: status.as_u16() });
        }
        if !status.is_success() {
            log_fetch(&locator.label, url.as_str(), Some(status.as_u16()), 0, "http_status");
            return Err(LoadError::HttpStatus { status: status.as_u16() });
        }

        // Private sheets answer 200 with a sign-in page.
        let is_html = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false);
        if is_html {
            log_fetch(&locator.label, url.as_str(), Some(status.as_u16()), 0, "not_tabular");
            return Err(LoadError::NotTabular("text/html response".to_string()));
        }

        let body = resp.text().await?;
        log_fetch(&locator.label, url.as_str(), Some(status.as_u16()), body.len(), "ok");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_with_sheet() {
        let loc = SheetLocator::new("body", DEFAULT_SHEETS_BASE, "abc123", Some("allDatas"));
        let url = loc.url().unwrap();
        assert_eq!(url.path(), "/spreadsheets/d/abc123/gviz/tq");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("tqx".to_string(), "out:csv".to_string()),
                ("sheet".to_string(), "allDatas".to_string()),
            ]
        );
    }

    #[test]
    fn test_url_without_sheet() {
        let loc = SheetLocator::new("body", "https://docs.google.com/", "abc123", Some("  "));
        assert!(loc.sheet.is_none());
        let url = loc.url().unwrap();
        assert_eq!(url.query_pairs().count(), 1);
    }

    #[test]
    fn test_sheet_name_is_encoded() {
        let loc = SheetLocator::new("training", DEFAULT_SHEETS_BASE, "abc", Some("訓練 log"));
        let url = loc.url().unwrap();
        let sheet = url
            .query_pairs()
            .find(|(k, _)| k == "sheet")
            .map(|(_, v)| v.into_owned());
        assert_eq!(sheet.as_deref(), Some("訓練 log"));
    }

    #[test]
    fn test_invalid_locator() {
        let loc = SheetLocator::new("body", DEFAULT_SHEETS_BASE, "", None);
        assert!(matches!(loc.url(), Err(LoadError::InvalidLocator(_))));
        let loc = SheetLocator::new("body", "not a url", "abc", None);
        assert!(matches!(loc.url(), Err(LoadError::InvalidLocator(_))));
    }

    #[test]
    fn test_cache_key_distinguishes_tabs() {
        let a = SheetLocator::new("a", DEFAULT_SHEETS_BASE, "abc", Some("one"));
        let b = SheetLocator::new("b", DEFAULT_SHEETS_BASE, "abc", Some("two"));
        assert_ne!(a.cache_key(), b.cache_key());
    }
}
