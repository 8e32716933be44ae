//! GitHub integration: open a pull request carrying a healed selector.
//!
//! Straight REST v3 calls; best-effort from the caller's point of view -
//! a failed PR never fails the run.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as Base64;
use base64::Engine as _;
use chrono::Utc;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "selector-healer";

#[derive(Clone, Debug)]
pub struct GithubConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub base_branch: String,
}

impl GithubConfig {
    /// Build from the conventional CI environment: `GITHUB_TOKEN` and
    /// `GITHUB_REPOSITORY` (`owner/repo`).
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty())?;
        let repository = std::env::var("GITHUB_REPOSITORY").ok()?;
        let (owner, repo) = repository.split_once('/')?;
        Some(Self {
            token,
            owner: owner.to_string(),
            repo: repo.to_string(),
            base_branch: std::env::var("GITHUB_BASE_BRANCH")
                .unwrap_or_else(|_| "main".to_string()),
        })
    }
}

pub struct GithubClient {
    client: Client,
    config: GithubConfig,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    /// Create a branch off the base ref, rewrite the selector in the test
    /// file, and open a pull request. Returns the PR URL.
    pub async fn create_healing_pr(
        &self,
        original_selector: &str,
        new_selector: &str,
        file_path: &str,
    ) -> Result<String> {
        let branch_name = format!("auto-heal-{}", Utc::now().timestamp_millis());
        let commit_message = format!("Update selector {original_selector}");

        let base_sha = self.base_ref_sha().await?;
        self.create_branch(&branch_name, &base_sha).await?;

        let file = self.get_file(file_path, &branch_name).await?;
        let decoded = Base64
            .decode(file.content.replace(['\n', '\r'], ""))
            .context("file content is not valid base64")?;
        let content =
            String::from_utf8(decoded).context("file content is not valid UTF-8")?;
        let updated = replace_selector(&content, original_selector, new_selector);

        self.put_file(file_path, &branch_name, &commit_message, &updated, &file.sha)
            .await?;

        let pr_url = self
            .open_pull_request(&branch_name, original_selector, new_selector, file_path)
            .await?;
        info!(%pr_url, "healing PR created");
        Ok(pr_url)
    }

    async fn base_ref_sha(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct RefResponse {
            object: RefObject,
        }
        #[derive(Deserialize)]
        struct RefObject {
            sha: String,
        }

        let url = format!(
            "{API_BASE}/repos/{}/{}/git/ref/heads/{}",
            self.config.owner, self.config.repo, self.config.base_branch
        );
        let response: RefResponse = self.get_json(&url).await?;
        Ok(response.object.sha)
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> Result<()> {
        let url = format!(
            "{API_BASE}/repos/{}/{}/git/refs",
            self.config.owner, self.config.repo
        );
        let body = json!({
            "ref": format!("refs/heads/{branch}"),
            "sha": sha,
        });
        self.send_checked(self.client.post(&url).json(&body)).await?;
        Ok(())
    }

    async fn get_file(&self, path: &str, branch: &str) -> Result<FileResponse> {
        let url = format!(
            "{API_BASE}/repos/{}/{}/contents/{}?ref={}",
            self.config.owner, self.config.repo, path, branch
        );
        self.get_json(&url).await
    }

    async fn put_file(
        &self,
        path: &str,
        branch: &str,
        message: &str,
        content: &str,
        sha: &str,
    ) -> Result<()> {
        let url = format!(
            "{API_BASE}/repos/{}/{}/contents/{}",
            self.config.owner, self.config.repo, path
        );
        let body = json!({
            "message": message,
            "content": Base64.encode(content),
            "sha": sha,
            "branch": branch,
        });
        self.send_checked(self.client.put(&url).json(&body)).await?;
        Ok(())
    }

    async fn open_pull_request(
        &self,
        branch: &str,
        original_selector: &str,
        new_selector: &str,
        file_path: &str,
    ) -> Result<String> {
        #[derive(Deserialize)]
        struct PullResponse {
            html_url: String,
        }

        let file_name = Path::new(file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.to_string());

        let url = format!(
            "{API_BASE}/repos/{}/{}/pulls",
            self.config.owner, self.config.repo
        );
        let body = json!({
            "title": format!("Auto-heal selector in {file_name}"),
            "head": branch,
            "base": self.config.base_branch,
            "body": pr_body(original_selector, new_selector, &file_name),
        });
        let response = self.send_checked(self.client.post(&url).json(&body)).await?;
        let pull: PullResponse = response.json().await.context("invalid PR response")?;
        Ok(pull.html_url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.send_checked(self.client.get(url)).await?;
        response.json().await.context("invalid GitHub response")
    }

    async fn send_checked(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .context("GitHub request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("GitHub returned {status}: {text}"));
        }
        Ok(response)
    }
}

#[derive(Deserialize)]
struct FileResponse {
    sha: String,
    content: String,
}

/// Replace every quoted occurrence of the old selector with the new one.
fn replace_selector(content: &str, old_selector: &str, new_selector: &str) -> String {
    let pattern = format!("['\"`]{}['\"`]", regex::escape(old_selector));
    let re = Regex::new(&pattern).expect("selector replacement pattern is valid");
    let replacement = format!("'{new_selector}'");
    re.replace_all(content, regex::NoExpand(&replacement))
        .into_owned()
}

fn pr_body(old_selector: &str, new_selector: &str, file_name: &str) -> String {
    format!(
        "## Auto-Healing Selector Update\n\n\
         This PR was automatically created by the selector healer.\n\n\
         ### Changes\n\
         - **File**: `{file_name}`\n\
         - **Old selector**: `{old_selector}`\n\
         - **New selector**: `{new_selector}`\n\n\
         ### Why this change?\n\
         The original selector failed during test execution. The AI suggested this \
         new selector based on DOM analysis.\n\n\
         **Please review this change carefully before merging!**"
    )
}
