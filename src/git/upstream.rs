//! Upstream repository host detection from a remote URL

use crate::error::{MonorelError, Result};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use url::Url;

fn issue_reference() -> Option<&'static Regex> {
    static ISSUE: OnceLock<Option<Regex>> = OnceLock::new();
    ISSUE
        .get_or_init(|| Regex::new(r"(^|[\s(])#(\d+)\b").ok())
        .as_ref()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hosting {
    GitHub,
    GitLab,
    Bitbucket,
    Gitea,
}

impl fmt::Display for Hosting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hosting::GitHub => f.write_str("GitHub"),
            Hosting::GitLab => f.write_str("GitLab"),
            Hosting::Bitbucket => f.write_str("Bitbucket"),
            Hosting::Gitea => f.write_str("Gitea"),
        }
    }
}

/// Recognized upstream repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub hosting: Hosting,
    pub owner: String,
    pub repo: String,
    pub base_url: Url,
}

impl Upstream {
    /// Parse a remote URL (`https://`, `ssh://` or scp-like `git@host:owner/repo.git`)
    ///
    /// Returns `Ok(None)` when the host is not a known hosting provider.
    pub fn from_remote_url(remote: &str) -> Result<Option<Self>> {
        let normalized = normalize_remote(remote);
        let url = Url::parse(&normalized)
            .map_err(|e| MonorelError::remote(format!("Invalid remote URL '{}': {}", remote, e)))?;

        let host = url
            .host_str()
            .ok_or_else(|| MonorelError::remote(format!("Remote URL has no host: '{}'", remote)))?;

        let hosting = match detect_hosting(host) {
            Some(hosting) => hosting,
            None => return Ok(None),
        };

        let path = url.path().trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return Err(MonorelError::remote(format!(
                "Remote URL has no owner/repository path: '{}'",
                remote
            )));
        }

        let base_url = Url::parse(&format!("https://{}/", host))
            .map_err(|e| MonorelError::remote(format!("Invalid remote host '{}': {}", host, e)))?;

        Ok(Some(Upstream {
            hosting,
            owner: segments[0].to_string(),
            repo: segments[1].to_string(),
            base_url,
        }))
    }

    /// `owner/repo`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn home_url(&self) -> String {
        format!("{}{}/{}", self.base_url, self.owner, self.repo)
    }

    pub fn compare_url(&self, from: &str, to: &str) -> String {
        match self.hosting {
            Hosting::GitHub | Hosting::Gitea => {
                format!("{}/compare/{}...{}", self.home_url(), from, to)
            }
            Hosting::GitLab => format!("{}/-/compare/{}...{}", self.home_url(), from, to),
            Hosting::Bitbucket => {
                format!("{}/branches/compare/{}..{}", self.home_url(), to, from)
            }
        }
    }

    pub fn issue_url(&self, number: u64) -> String {
        match self.hosting {
            Hosting::GitLab => format!("{}/-/issues/{}", self.home_url(), number),
            _ => format!("{}/issues/{}", self.home_url(), number),
        }
    }

    /// Replace bare `#123` issue references with markdown links
    pub fn linkify_markdown(&self, text: &str) -> String {
        match issue_reference() {
            Some(re) => re
                .replace_all(text, |caps: &regex::Captures| {
                    let number = caps[2].parse::<u64>().unwrap_or_default();
                    format!("{}[#{}]({})", &caps[1], &caps[2], self.issue_url(number))
                })
                .into_owned(),
            None => text.to_string(),
        }
    }
}

fn normalize_remote(remote: &str) -> String {
    if remote.contains("://") {
        return remote.to_string();
    }

    // scp-like syntax: [user@]host:path
    match remote.split_once(':') {
        Some((host, path)) if !host.contains('/') => {
            let host = host.rsplit('@').next().unwrap_or(host);
            format!("ssh://{}/{}", host, path.trim_start_matches('/'))
        }
        _ => remote.to_string(),
    }
}

fn detect_hosting(host: &str) -> Option<Hosting> {
    let host = host.to_lowercase();

    if host == "github.com" || host.ends_with(".github.com") {
        Some(Hosting::GitHub)
    } else if host == "gitlab.com" || host.starts_with("gitlab.") {
        Some(Hosting::GitLab)
    } else if host == "bitbucket.org" {
        Some(Hosting::Bitbucket)
    } else if host == "codeberg.org" || host.starts_with("gitea.") {
        Some(Hosting::Gitea)
    } else {
        None
    }
}
