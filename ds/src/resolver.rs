use crate::{
    error::GetError,
    platform::PlatformInfo,
    release::{Release, ReleaseClient},
    tool::{ToolCatalog, ToolDescriptor},
};
use anyhow::Result;
use log::debug;
use url::Url;

pub(crate) const LATEST: &str = "latest";

/// The release asset chosen for a tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub tool: ToolDescriptor,
    /// The release tag or name that matched. For "latest" this is the first release's tag.
    pub version: String,
    pub asset_name: String,
    pub url: Url,
}

/// Turns a tool name and version into the download URL of the matching release asset.
#[derive(Debug)]
pub struct AssetResolver<'a> {
    catalog: &'a ToolCatalog,
    platform: &'a PlatformInfo,
    client: &'a dyn ReleaseClient,
}

impl<'a> AssetResolver<'a> {
    #[must_use]
    pub fn new(
        catalog: &'a ToolCatalog,
        platform: &'a PlatformInfo,
        client: &'a dyn ReleaseClient,
    ) -> Self {
        Self {
            catalog,
            platform,
            client,
        }
    }

    /// Resolves `tool_name` to a release asset. The version used is `requested_version` if it
    /// is not empty, then the tool's pinned version, then "latest". Releases are expected in
    /// newest-first order, so "latest" picks the first one.
    ///
    /// # Errors
    ///
    /// Returns [`GetError::ToolNotFound`] without touching the network if the catalog has no
    /// such tool, and [`GetError::AssetNotFound`] if no release has an asset with the rendered
    /// name. Errors from the release client and the asset name template are passed through.
    pub async fn resolve(
        &self,
        tool_name: &str,
        requested_version: Option<&str>,
    ) -> Result<ResolvedAsset> {
        let tool = self
            .catalog
            .get(tool_name)
            .ok_or_else(|| GetError::ToolNotFound {
                name: tool_name.to_string(),
            })?;

        let requested = [requested_version.unwrap_or_default(), tool.version.as_str()]
            .into_iter()
            .find(|v| !v.is_empty())
            .unwrap_or(LATEST);
        debug!("resolving {} version {requested} for {}", tool.name, self.platform);

        let releases = self.client.list_releases(&tool.owner, &tool.repo).await?;
        let version = if requested == LATEST {
            match releases.first() {
                Some(r) => {
                    debug!("the latest release of {}/{} is {}", tool.owner, tool.repo, r.tag);
                    r.tag.clone()
                }
                None => {
                    return Err(GetError::AssetNotFound {
                        tool: tool.name.clone(),
                        version: requested.to_string(),
                        asset: tool.asset_name(self.platform, requested)?,
                    }
                    .into());
                }
            }
        } else {
            requested.to_string()
        };

        let asset_name = tool.asset_name(self.platform, &version)?;
        debug!("looking for an asset named {asset_name:?} in release {version}");

        match find_asset(&releases, &version, &asset_name) {
            Some(url) => Ok(ResolvedAsset {
                tool: tool.clone(),
                version,
                asset_name,
                url: url.clone(),
            }),
            None => Err(GetError::AssetNotFound {
                tool: tool.name.clone(),
                version,
                asset: asset_name,
            }
            .into()),
        }
    }
}

fn find_asset<'r>(releases: &'r [Release], version: &str, asset_name: &str) -> Option<&'r Url> {
    releases
        .iter()
        .filter(|r| r.matches_version(version))
        .flat_map(|r| r.assets.iter())
        .find(|a| a.name == asset_name)
        .map(|a| &a.download_url)
}
