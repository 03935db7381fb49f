/// The `builder` module contains the `GetterBuilder` struct which is used to create a `Getter`
/// instance.
use crate::{
    getter::Getter, github::GitHub, installer::default_tool_dir, platform::PlatformInfo,
    tool::ToolCatalog,
};
use anyhow::{anyhow, Context, Result};
use log::debug;
use reqwest::{
    header::{HeaderMap, HeaderValue, USER_AGENT},
    Client,
};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use url::Url;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// `GetterBuilder` is used to create a [`Getter`] instance.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct GetterBuilder<'a> {
    tool: Option<&'a str>,
    version: Option<&'a str>,
    tool_dir: Option<PathBuf>,
    catalog: Option<ToolCatalog>,
    platform: Option<&'a PlatformInfo>,
    api_base_url: Option<&'a str>,
    token: Option<&'a str>,
    show_progress: bool,
    request_timeout: Duration,
    download_timeout: Duration,
}

impl Default for GetterBuilder<'_> {
    fn default() -> Self {
        GetterBuilder {
            tool: None,
            version: None,
            tool_dir: None,
            catalog: None,
            platform: None,
            api_base_url: None,
            token: None,
            show_progress: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }
}

impl<'a> GetterBuilder<'a> {
    /// Returns a new empty `GetterBuilder`.
    #[must_use]
    pub fn new() -> Self {
        GetterBuilder::default()
    }

    /// Set the name of the tool to install. Names are matched against the catalog
    /// case-insensitively.
    ///
    /// You must set this.
    #[must_use]
    pub fn tool(mut self, tool: &'a str) -> Self {
        self.tool = Some(tool);
        self
    }

    /// Set the release tag or name to install. This overrides any version pinned in the tool's
    /// catalog entry. Pass "latest" to get the most recent release even for pinned tools. By
    /// default, the pinned version is used, or the most recent release if there is none.
    #[must_use]
    pub fn version(mut self, version: &'a str) -> Self {
        self.version = Some(version);
        self
    }

    /// Set the directory to install tools into. If not set, it will default to `$HOME/.ds/bin`.
    #[must_use]
    pub fn tool_dir<P: AsRef<Path>>(mut self, tool_dir: P) -> Self {
        self.tool_dir = Some(tool_dir.as_ref().to_path_buf());
        self
    }

    /// Set the catalog of tools to choose from. Defaults to [`ToolCatalog::builtin`].
    #[must_use]
    pub fn catalog(mut self, catalog: ToolCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Set the platform to pick assets for. Defaults to the platform this crate was compiled for.
    #[must_use]
    pub fn platform(mut self, platform: &'a PlatformInfo) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Set the base URL for the GitHub API. This is useful for GitHub Enterprise installs, which
    /// serve the API from something like `https://github.example.com/api/v3`.
    #[must_use]
    pub fn api_base_url(mut self, api_base_url: &'a str) -> Self {
        self.api_base_url = Some(api_base_url);
        self
    }

    /// Set a GitHub token to use for API requests. If this is not set then this will be taken
    /// from the `GITHUB_TOKEN` env var if it is set.
    #[must_use]
    pub fn token(mut self, token: &'a str) -> Self {
        self.token = Some(token);
        self
    }

    /// Show a progress bar on stderr while downloading. This is on by default.
    #[must_use]
    pub fn show_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Set the timeout for each release listing request. Defaults to 10 seconds.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the timeout for downloading a release asset. Defaults to 10 minutes.
    #[must_use]
    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Builds a new [`Getter`] instance and returns it.
    ///
    /// # Errors
    ///
    /// This returns an error if no tool was set, if the API base URL cannot be parsed, or if no
    /// tool directory was set and the home directory cannot be determined.
    pub fn build(self) -> Result<Getter> {
        let Some(tool) = self.tool else {
            return Err(anyhow!("You must set a tool"));
        };

        let platform = self.platform.cloned().unwrap_or_else(PlatformInfo::current);
        debug!("installing for {platform}");

        let api_base_url = self
            .api_base_url
            .map(Url::parse)
            .transpose()
            .context("the API base URL is not a valid URL")?;
        let tool_dir = match self.tool_dir {
            Some(d) => d,
            None => default_tool_dir()?,
        };

        let client = reqwest_client()?;
        let releases = GitHub::new(
            client.clone(),
            api_base_url,
            self.token.map(String::from),
            self.request_timeout,
        );

        Ok(Getter {
            tool: tool.to_string(),
            version: self.version.map(String::from),
            catalog: self.catalog.unwrap_or_else(ToolCatalog::builtin),
            platform,
            tool_dir,
            releases: Box::new(releases),
            reqwest_client: client,
            download_timeout: self.download_timeout,
            show_progress: self.show_progress,
        })
    }
}

fn reqwest_client() -> Result<Client> {
    let builder = Client::builder().gzip(true);

    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("ds version {}", super::VERSION))?,
    );
    Ok(builder.default_headers(headers).build()?)
}
