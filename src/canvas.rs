use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::Config;

const LIST_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const PER_PAGE: u32 = 100;

#[derive(Debug, Clone)]
pub struct Course {
    pub id: String,
    pub name: String,
}

/// One file as listed by the course files endpoint. Fetched fresh each run;
/// only the id ever outlives the run, inside the seen-files ledger.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: String,
    pub display_name: String,
    pub created_at: Option<String>,
    pub url: String,
}

/// Failure modes the coordinator branches on when listing course files.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The course hides its files tab from the API token (HTTP 403).
    #[error("file access forbidden")]
    Forbidden,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait::async_trait]
pub trait FileSource: Send + Sync {
    async fn active_courses(&self) -> Result<Vec<Course>>;
    async fn course_files(&self, course_id: &str) -> Result<Vec<FileRecord>, FetchError>;
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

// --- Wire types ---

#[derive(Deserialize)]
struct ApiCourse {
    id: u64,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct ApiFile {
    id: u64,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

pub struct CanvasClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl CanvasClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(LIST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.canvas_base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    /// Fetch every page of a listing endpoint, following RFC 5988
    /// `Link: rel="next"` headers the way Canvas emits them.
    async fn fetch_paginated<T: DeserializeOwned>(
        &self,
        first_url: String,
    ) -> Result<Vec<T>, FetchError> {
        let mut next_url = Some(first_url);
        let mut items = Vec::new();

        while let Some(url) = next_url {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.api_token)
                .send()
                .await
                .with_context(|| format!("Request failed: {url}"))?;

            let status = response.status();
            if status == StatusCode::FORBIDDEN {
                return Err(FetchError::Forbidden);
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(anyhow::anyhow!("Canvas API error ({status}): {body}").into());
            }

            next_url = next_link(response.headers());
            let page: Vec<T> = response
                .json()
                .await
                .with_context(|| format!("Failed to parse response from {url}"))?;
            items.extend(page);
        }

        Ok(items)
    }
}

#[async_trait::async_trait]
impl FileSource for CanvasClient {
    async fn active_courses(&self) -> Result<Vec<Course>> {
        let url = format!(
            "{}/api/v1/courses?enrollment_state=active&per_page={PER_PAGE}",
            self.base_url
        );
        let courses: Vec<ApiCourse> = self
            .fetch_paginated(url)
            .await
            .map_err(anyhow::Error::from)?;

        // The API sometimes returns incomplete course shells without a name.
        Ok(courses
            .into_iter()
            .filter_map(|c| {
                c.name.map(|name| Course {
                    id: c.id.to_string(),
                    name,
                })
            })
            .collect())
    }

    async fn course_files(&self, course_id: &str) -> Result<Vec<FileRecord>, FetchError> {
        let url = format!(
            "{}/api/v1/courses/{course_id}/files?per_page={PER_PAGE}",
            self.base_url
        );
        let files: Vec<ApiFile> = self.fetch_paginated(url).await?;

        Ok(files
            .into_iter()
            .map(|f| FileRecord {
                id: f.id.to_string(),
                display_name: f
                    .display_name
                    .unwrap_or_else(|| format!("file_{}", f.id)),
                created_at: f.created_at,
                url: f.url.unwrap_or_default(),
            })
            .collect())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("Download request failed: {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Download failed ({status}): {url}");
        }

        Ok(response
            .bytes()
            .await
            .with_context(|| format!("Failed to read download body: {url}"))?
            .to_vec())
    }
}

fn next_link(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(reqwest::header::LINK)?.to_str().ok()?;
    for link in value.split(',') {
        let mut parts = link.trim().split(';');
        let Some(target) = parts.next() else { continue };
        if parts.any(|p| p.trim() == r#"rel="next""#) {
            return Some(
                target
                    .trim()
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string(),
            );
        }
    }
    None
}
