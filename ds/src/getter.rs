use crate::{
    archive::maybe_extract,
    download::Downloader,
    installer::Installer,
    message::{post_install_message, ToolLocal},
    platform::PlatformInfo,
    release::ReleaseClient,
    resolver::AssetResolver,
    tool::{ToolCatalog, ToolDescriptor},
};
use anyhow::Result;
use log::debug;
use reqwest::Client;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use url::Url;

/// `Getter` is the core of this library, and is used to install a tool from its GitHub
/// releases. Use a [`GetterBuilder`](crate::GetterBuilder) to create one.
#[derive(Debug)]
pub struct Getter {
    pub(crate) tool: String,
    pub(crate) version: Option<String>,
    pub(crate) catalog: ToolCatalog,
    pub(crate) platform: PlatformInfo,
    pub(crate) tool_dir: PathBuf,
    pub(crate) releases: Box<dyn ReleaseClient>,
    pub(crate) reqwest_client: Client,
    pub(crate) download_timeout: Duration,
    pub(crate) show_progress: bool,
}

/// What [`Getter::install`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Installation {
    pub tool: String,
    /// The release tag or name that was installed.
    pub version: String,
    pub url: Url,
    pub path: PathBuf,
    /// Instructions for using the installed tool.
    pub message: String,
}

impl Getter {
    /// Installs the tool. This finds the release asset for the tool and platform, downloads it,
    /// extracts it if it is an archive and copies the executable into the tool directory.
    /// Temporary files are removed before this returns, whether or not it succeeds.
    ///
    /// # Errors
    ///
    /// Failures are returned as soon as they happen. These are usually a
    /// [`GetError`](crate::GetError), for example:
    ///
    /// * The tool is not in the catalog.
    /// * Network errors or unexpected responses from the GitHub API or the download URL.
    /// * No release has an asset with the name the tool's template produced.
    /// * The downloaded archive cannot be unpacked.
    /// * The executable cannot be written to the tool directory.
    pub async fn install(&self) -> Result<Installation> {
        let resolver = AssetResolver::new(&self.catalog, &self.platform, self.releases.as_ref());
        let asset = resolver.resolve(&self.tool, self.version.as_deref()).await?;
        debug!("picked asset named {}", asset.asset_name);

        let download =
            Downloader::new(&self.reqwest_client, self.download_timeout, self.show_progress)
                .fetch(&asset.url)
                .await?;
        let binary = maybe_extract(
            &asset.tool,
            &asset.url,
            download.archive_path(),
            download.extract_dir(),
        )?;
        let binary = self.windows_exe(binary);

        let path = Installer::new(self.tool_dir.clone())
            .install(&binary, &self.exe_name(&asset.tool))?;
        let message = post_install_message(&ToolLocal {
            name: asset.tool.name.clone(),
            path: path.clone(),
            bin_path: bin_path(&self.tool_dir, dirs::home_dir().as_deref()),
        })?;

        Ok(Installation {
            tool: asset.tool.name,
            version: asset.version,
            url: asset.url,
            path,
            message,
        })
    }

    #[must_use]
    pub fn platform(&self) -> &PlatformInfo {
        &self.platform
    }

    #[must_use]
    pub fn tool_dir(&self) -> &Path {
        &self.tool_dir
    }

    fn exe_name(&self, tool: &ToolDescriptor) -> String {
        if self.platform.is_windows() && !tool.name.ends_with(".exe") {
            format!("{}.exe", tool.name)
        } else {
            tool.name.clone()
        }
    }

    // Windows archives hold `<name>.exe` rather than `<name>`.
    fn windows_exe(&self, binary: PathBuf) -> PathBuf {
        if !self.platform.is_windows() || binary.exists() {
            return binary;
        }
        let mut exe = binary.clone().into_os_string();
        exe.push(".exe");
        let exe = PathBuf::from(exe);
        if exe.exists() {
            exe
        } else {
            binary
        }
    }
}

/// The tool directory as it should be written in a shell profile. Directories under the home
/// directory are written relative to `$HOME`.
fn bin_path(tool_dir: &Path, home: Option<&Path>) -> String {
    home.and_then(|h| tool_dir.strip_prefix(h).ok())
        .filter(|rel| !rel.as_os_str().is_empty())
        .map_or_else(
            || tool_dir.display().to_string(),
            |rel| format!("$HOME/{}", rel.display()),
        )
}
