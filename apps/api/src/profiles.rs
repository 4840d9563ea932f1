//! Social profile facts. GitHub profiles are read from the public REST API;
//! LinkedIn offers no public API, so only the profile handle is recorded.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const GITHUB_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("careerfit-api/", env!("CARGO_PKG_VERSION"));
const MAX_REPOSITORIES: usize = 10;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("invalid profile URL '{0}'")]
    InvalidUrl(String),

    #[error("unsupported profile host '{0}'")]
    UnsupportedHost(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("profile API returned status {0}")]
    Api(u16),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryFact {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, rename = "stargazers_count")]
    pub stars: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum ProfileFacts {
    Github {
        username: String,
        name: Option<String>,
        bio: Option<String>,
        public_repos: u64,
        followers: u64,
        repositories: Vec<RepositoryFact>,
    },
    Linkedin {
        handle: String,
    },
}

#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ProfileFacts, ProfileError>;
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
    name: Option<String>,
    bio: Option<String>,
    #[serde(default)]
    public_repos: u64,
    #[serde(default)]
    followers: u64,
}

#[derive(Clone)]
pub struct HttpProfileSource {
    client: Client,
    github_api: String,
}

impl HttpProfileSource {
    pub fn new() -> Result<Self, ProfileError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            github_api: GITHUB_API_URL.to_string(),
        })
    }

    async fn github(&self, username: &str) -> Result<ProfileFacts, ProfileError> {
        let user: GithubUser = self
            .get_json(&format!("{}/users/{username}", self.github_api))
            .await?;

        let mut repositories: Vec<RepositoryFact> = self
            .get_json(&format!(
                "{}/users/{username}/repos?sort=updated&per_page=100",
                self.github_api
            ))
            .await?;
        repositories.sort_by(|a, b| b.stars.cmp(&a.stars));
        repositories.truncate(MAX_REPOSITORIES);

        debug!(
            "Fetched GitHub profile {} ({} repositories kept)",
            user.login,
            repositories.len()
        );

        Ok(ProfileFacts::Github {
            username: user.login,
            name: user.name,
            bio: user.bio,
            public_repos: user.public_repos,
            followers: user.followers,
            repositories,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ProfileError> {
        let response = self
            .client
            .get(url)
            .header("accept", "application/vnd.github+json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProfileError::Api(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    async fn fetch(&self, url: &str) -> Result<ProfileFacts, ProfileError> {
        match classify(url)? {
            ProfileLink::Github(username) => self.github(&username).await,
            ProfileLink::Linkedin(handle) => Ok(ProfileFacts::Linkedin { handle }),
        }
    }
}

#[derive(Debug, PartialEq)]
enum ProfileLink {
    Github(String),
    Linkedin(String),
}

/// Resolves a profile URL (scheme optional) to its platform and handle.
fn classify(raw: &str) -> Result<ProfileLink, ProfileError> {
    let trimmed = raw.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&with_scheme).map_err(|_| ProfileError::InvalidUrl(raw.to_string()))?;

    let host = url
        .host_str()
        .map(|h| h.trim_start_matches("www.").to_ascii_lowercase())
        .ok_or_else(|| ProfileError::InvalidUrl(raw.to_string()))?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match host.as_str() {
        "github.com" => segments
            .first()
            .map(|user| ProfileLink::Github(user.to_string()))
            .ok_or_else(|| ProfileError::InvalidUrl(raw.to_string())),
        "linkedin.com" => match segments.as_slice() {
            ["in", handle, ..] => Ok(ProfileLink::Linkedin(handle.to_string())),
            _ => Err(ProfileError::InvalidUrl(raw.to_string())),
        },
        _ => Err(ProfileError::UnsupportedHost(host)),
    }
}
