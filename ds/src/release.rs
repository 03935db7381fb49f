use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

/// One published release of a project.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Release {
    #[serde(rename = "tag_name")]
    pub tag: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Release {
    /// Returns true if either the release's name or its tag is exactly `version`.
    #[must_use]
    pub fn matches_version(&self, version: &str) -> bool {
        self.tag == version || self.name.as_deref() == Some(version)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: Url,
}

/// A source of release listings for `owner/repo` style projects.
#[async_trait]
pub trait ReleaseClient: std::fmt::Debug + Send + Sync {
    /// Lists the project's releases, newest first. Implementations must not retry.
    async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_github_listing() -> Result<()> {
        let json = r#"[
            {
                "url": "https://api.github.com/repos/cli/cli/releases/1",
                "tag_name": "v2.40.1",
                "name": "GitHub CLI 2.40.1",
                "draft": false,
                "assets": [
                    {
                        "id": 1,
                        "name": "gh_2.40.1_linux_amd64.tar.gz",
                        "size": 12345,
                        "browser_download_url": "https://github.com/cli/cli/releases/download/v2.40.1/gh_2.40.1_linux_amd64.tar.gz"
                    }
                ]
            },
            { "tag_name": "v2.40.0", "name": null, "assets": [] }
        ]"#;

        let releases: Vec<Release> = serde_json::from_str(json)?;
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].tag, "v2.40.1");
        assert_eq!(releases[0].assets[0].name, "gh_2.40.1_linux_amd64.tar.gz");
        assert!(releases[0].matches_version("GitHub CLI 2.40.1"));
        assert!(releases[0].matches_version("v2.40.1"));
        assert!(!releases[1].matches_version("v2.40.1"));
        assert_eq!(releases[1].name, None);

        Ok(())
    }
}
