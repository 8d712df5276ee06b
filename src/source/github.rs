//! GitHub REST API record source.

use log::{debug, info};
use regex::Regex;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;

use crate::error::{RepodexError, Result};
use crate::source::{Record, RecordSource};

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;
const USER_AGENT: &str = concat!("repodex/", env!("CARGO_PKG_VERSION"));

const ORGANIZATION_PATTERN: &str = r"^[a-z0-9](?:[a-z0-9]|-[a-z0-9]){0,38}$";

#[derive(Debug, Deserialize)]
struct ApiOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiRepository {
    id: u64,
    name: String,
    html_url: String,
    description: Option<String>,
    owner: Option<ApiOwner>,
}

/// Fetches an organization's repositories and their rendered READMEs.
pub struct GitHubSource {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for GitHubSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSource")
            .field("api_url", &self.api_url)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl GitHubSource {
    /// Create a source talking to the public API. `token`, if given, is
    /// sent as a bearer token.
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_api_url(DEFAULT_API_URL, token)
    }

    /// Create a source talking to another API root (GitHub Enterprise).
    pub fn with_api_url<S: Into<String>>(api_url: S, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RepodexError::source(format!("failed to build HTTP client: {e}")))?;
        Ok(GitHubSource {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn get(&self, url: &str, accept: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url).header(header::ACCEPT, accept);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_page(&self, organization: &str, page: usize) -> Result<Vec<ApiRepository>> {
        let url = format!(
            "{}/orgs/{organization}/repos?per_page={PER_PAGE}&page={page}",
            self.api_url
        );
        let response = self
            .get(&url, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| RepodexError::source(format!("failed to reach GitHub: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RepodexError::source(format!(
                "organization '{organization}' not found"
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RepodexError::source(format!(
                "listing repositories of '{organization}' failed ({status}): {text}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| RepodexError::source(format!("malformed repository list: {e}")))
    }

    /// README rendered as HTML, or `None` if the repository has none.
    async fn fetch_readme(&self, organization: &str, repository: &str) -> Result<Option<String>> {
        let url = format!("{}/repos/{organization}/{repository}/readme", self.api_url);
        let response = self
            .get(&url, "application/vnd.github.html")
            .send()
            .await
            .map_err(|e| RepodexError::source(format!("failed to reach GitHub: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .text()
                .await
                .map(Some)
                .map_err(|e| RepodexError::source(format!("failed to read README: {e}"))),
            status => Err(RepodexError::source(format!(
                "fetching README of {organization}/{repository} failed ({status})"
            ))),
        }
    }

    async fn fetch_all(&self, organization: &str) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for page in 1.. {
            let repositories = self.fetch_page(organization, page).await?;
            let last_page = repositories.len() < PER_PAGE;
            debug!(
                "page {page} of '{organization}': {} repositories",
                repositories.len()
            );

            for repository in repositories {
                let readme_html = self.fetch_readme(organization, &repository.name).await?;
                records.push(Record {
                    id: repository.id,
                    url: repository.html_url,
                    name: repository.name,
                    description: repository.description,
                    owner_name: repository.owner.map(|o| o.login),
                    readme_html,
                });
            }

            if last_page {
                break;
            }
        }
        Ok(records)
    }
}

/// Normalize and check an organization name.
pub fn normalize_organization(organization: &str) -> Result<String> {
    let organization = organization.trim().to_lowercase();
    let pattern = Regex::new(ORGANIZATION_PATTERN).map_err(|e| RepodexError::other(e.to_string()))?;
    if pattern.is_match(&organization) {
        Ok(organization)
    } else {
        Err(RepodexError::source(format!(
            "'{organization}' is not a valid organization name"
        )))
    }
}

impl RecordSource for GitHubSource {
    fn fetch_records(&self, organization: &str) -> Result<Vec<Record>> {
        let organization = normalize_organization(organization)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let records = runtime.block_on(self.fetch_all(&organization))?;
        info!(
            "fetched {} repositories of '{organization}' from GitHub",
            records.len()
        );
        Ok(records)
    }
}
