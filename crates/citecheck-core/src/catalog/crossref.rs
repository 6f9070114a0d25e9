use std::time::Duration;

use super::{Catalog, CatalogEntry, CatalogError, CatalogFuture};
use crate::Config;

/// Crossref REST API backend (`/works` endpoints).
pub struct CrossRef {
    base_url: String,
    mailto: Option<String>,
    client: reqwest::Client,
    lookup_timeout: Duration,
    search_timeout: Duration,
}

impl CrossRef {
    pub fn new(
        base_url: impl Into<String>,
        mailto: Option<String>,
        client: reqwest::Client,
        lookup_timeout: Duration,
        search_timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            mailto,
            client,
            lookup_timeout,
            search_timeout,
        }
    }

    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        Self::new(
            config.crossref_url.clone(),
            config.crossref_mailto.clone(),
            client,
            config.lookup_timeout(),
            config.search_timeout(),
        )
    }

    fn user_agent(&self) -> String {
        let version = env!("CARGO_PKG_VERSION");
        match self.mailto {
            Some(ref email) => format!("citecheck/{} (mailto:{})", version, email),
            None => format!("citecheck/{}", version),
        }
    }

    fn mailto_param(&self) -> String {
        self.mailto
            .as_ref()
            .map(|email| format!("mailto={}", urlencoding::encode(email)))
            .unwrap_or_default()
    }

    fn lookup_url(&self, doi: &str) -> String {
        // Keep the DOI's slashes as path separators; escape everything else.
        let path = urlencoding::encode(doi).replace("%2F", "/");
        let mut url = format!("{}/works/{}", self.base_url, path);
        let mailto = self.mailto_param();
        if !mailto.is_empty() {
            url.push('?');
            url.push_str(&mailto);
        }
        url
    }

    fn search_url(&self, title: &str, rows: usize) -> String {
        let mut url = format!(
            "{}/works?query.title={}&rows={}",
            self.base_url,
            urlencoding::encode(title),
            rows
        );
        let mailto = self.mailto_param();
        if !mailto.is_empty() {
            url.push('&');
            url.push_str(&mailto);
        }
        url
    }
}

impl Catalog for CrossRef {
    fn name(&self) -> &str {
        "CrossRef"
    }

    fn lookup<'a>(&'a self, identifier: &'a str) -> CatalogFuture<'a, Option<CatalogEntry>> {
        Box::pin(async move {
            let url = self.lookup_url(identifier);
            tracing::debug!(%url, "crossref lookup");
            let resp = self
                .client
                .get(&url)
                .header("User-Agent", self.user_agent())
                .timeout(self.lookup_timeout)
                .send()
                .await?;
            parse_lookup_response(resp).await
        })
    }

    fn search<'a>(&'a self, title: &'a str, rows: usize) -> CatalogFuture<'a, Vec<CatalogEntry>> {
        Box::pin(async move {
            let url = self.search_url(title, rows);
            tracing::debug!(%url, "crossref title search");
            let resp = self
                .client
                .get(&url)
                .header("User-Agent", self.user_agent())
                .timeout(self.search_timeout)
                .send()
                .await?;
            parse_search_response(resp, rows).await
        })
    }
}

/// Interpret a `/works/{doi}` response. Any non-success status means the
/// identifier is unknown to Crossref.
pub async fn parse_lookup_response(
    resp: reqwest::Response,
) -> Result<Option<CatalogEntry>, CatalogError> {
    let status = resp.status();
    if !status.is_success() {
        tracing::debug!(status = status.as_u16(), "identifier not found");
        return Ok(None);
    }

    let data: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| CatalogError::Malformed(e.to_string()))?;

    match data.get("message") {
        Some(message) if message.is_object() => Ok(Some(entry_from_item(message))),
        _ => Ok(None),
    }
}

/// Interpret a `/works?query.title=` response, keeping at most `rows` items.
pub async fn parse_search_response(
    resp: reqwest::Response,
    rows: usize,
) -> Result<Vec<CatalogEntry>, CatalogError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(CatalogError::Status(status.as_u16()));
    }

    let data: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| CatalogError::Malformed(e.to_string()))?;

    let items = data["message"]["items"]
        .as_array()
        .map(|items| items.iter().take(rows).map(entry_from_item).collect())
        .unwrap_or_default();

    Ok(items)
}

fn entry_from_item(item: &serde_json::Value) -> CatalogEntry {
    let title = match &item["title"] {
        serde_json::Value::Array(arr) => arr.first().and_then(|v| v.as_str()).map(String::from),
        serde_json::Value::String(s) => Some(s.clone()),
        _ => None,
    };
    CatalogEntry {
        title,
        identifier: item["DOI"].as_str().map(String::from),
    }
}
