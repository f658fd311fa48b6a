//! Hosted release objects (GitHub releases)

use crate::error::{MonorelError, Result};
use crate::git::{Hosting, Upstream};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::debug;

/// Release object created on the hosting provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostedRelease {
    pub tag_name: String,
    pub name: String,
    pub body: String,
    pub prerelease: bool,
}

/// Hosted release API
pub trait HostedReleaseApi: Send + Sync {
    /// Whether releases can be created on this upstream
    fn supports(&self, upstream: &Upstream) -> bool;

    /// Create the release
    ///
    /// # Returns
    /// * `Ok(String)` - Web URL of the created release
    fn create_release(&self, upstream: &Upstream, release: &HostedRelease) -> Result<String>;
}

#[derive(Deserialize)]
struct CreatedRelease {
    html_url: String,
}

/// GitHub REST client creating releases with a token
pub struct GitHubReleases {
    http: Client,
    api_url: String,
    token: String,
}

impl GitHubReleases {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        GitHubReleases {
            http: Client::new(),
            api_url: api_url.into(),
            token: token.into(),
        }
    }

    fn releases_url(&self, upstream: &Upstream) -> String {
        format!(
            "{}/repos/{}/{}/releases",
            self.api_url.trim_end_matches('/'),
            upstream.owner,
            upstream.repo
        )
    }
}

impl HostedReleaseApi for GitHubReleases {
    fn supports(&self, upstream: &Upstream) -> bool {
        upstream.hosting == Hosting::GitHub
    }

    fn create_release(&self, upstream: &Upstream, release: &HostedRelease) -> Result<String> {
        let url = self.releases_url(upstream);
        debug!(%url, tag = %release.tag_name, "Creating hosted release");

        let resp = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, concat!("monorel/", env!("CARGO_PKG_VERSION")))
            .json(release)
            .send()
            .map_err(|e| MonorelError::hosting(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::CREATED {
            let text = resp.text().unwrap_or_default();
            return Err(MonorelError::hosting(format!("{} {}", status, text.trim())));
        }

        let created: CreatedRelease = resp
            .json()
            .map_err(|e| MonorelError::hosting(e.to_string()))?;
        Ok(created.html_url)
    }
}

/// Records created releases in memory
#[derive(Debug, Default)]
pub struct RecordingReleases {
    created: Mutex<Vec<HostedRelease>>,
    failures: Mutex<usize>,
}

impl RecordingReleases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` create calls
    pub fn fail_next(&self, count: usize) {
        if let Ok(mut failures) = self.failures.lock() {
            *failures = count;
        }
    }

    pub fn created(&self) -> Vec<HostedRelease> {
        self.created
            .lock()
            .map(|created| created.clone())
            .unwrap_or_default()
    }
}

impl HostedReleaseApi for RecordingReleases {
    fn supports(&self, upstream: &Upstream) -> bool {
        upstream.hosting == Hosting::GitHub
    }

    fn create_release(&self, upstream: &Upstream, release: &HostedRelease) -> Result<String> {
        let mut failures = self
            .failures
            .lock()
            .map_err(|_| MonorelError::hosting("Recorder poisoned"))?;
        if *failures > 0 {
            *failures -= 1;
            return Err(MonorelError::hosting("502 Bad Gateway"));
        }

        self.created
            .lock()
            .map_err(|_| MonorelError::hosting("Recorder poisoned"))?
            .push(release.clone());
        Ok(format!("{}/releases/tag/{}", upstream.home_url(), release.tag_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(url: &str) -> Upstream {
        Upstream::from_remote_url(url).unwrap().unwrap()
    }

    #[test]
    fn test_releases_url() {
        let api = GitHubReleases::new("https://api.github.com/", "token");
        assert_eq!(
            api.releases_url(&upstream("git@github.com:acme/widgets.git")),
            "https://api.github.com/repos/acme/widgets/releases"
        );
    }

    #[test]
    fn test_only_github_is_supported() {
        let api = GitHubReleases::new("https://api.github.com", "token");
        assert!(api.supports(&upstream("https://github.com/acme/widgets")));
        assert!(!api.supports(&upstream("https://gitlab.com/acme/widgets")));
    }

    #[test]
    fn test_release_payload() {
        let release = HostedRelease {
            tag_name: "v1.0.0".to_string(),
            name: "Release v1.0.0".to_string(),
            body: "Changes".to_string(),
            prerelease: false,
        };
        let json = serde_json::to_value(&release).unwrap();
        assert_eq!(json["tag_name"], "v1.0.0");
        assert_eq!(json["prerelease"], false);
    }

    #[test]
    fn test_recording_releases_failures() {
        let api = RecordingReleases::new();
        api.fail_next(1);
        let upstream = upstream("https://github.com/acme/widgets");
        let release = HostedRelease {
            tag_name: "v1.0.0".to_string(),
            name: "Release v1.0.0".to_string(),
            body: String::new(),
            prerelease: false,
        };

        assert!(api.create_release(&upstream, &release).is_err());
        let url = api.create_release(&upstream, &release).unwrap();
        assert_eq!(url, "https://github.com/acme/widgets/releases/tag/v1.0.0");
        assert_eq!(api.created().len(), 1);
    }
}
