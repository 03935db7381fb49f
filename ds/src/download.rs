use crate::error::GetError;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use reqwest::{Client, StatusCode};
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};
use tempfile::{tempdir, TempDir};
use url::Url;

const DEFAULT_FILE_NAME: &str = "download";

/// A downloaded asset. The temporary directory holding it, and anything extracted next to it, is
/// deleted when this is dropped.
#[derive(Debug)]
pub(crate) struct Download {
    // Keeps the directory alive until we're done with the files in it.
    _temp_dir: TempDir,
    archive_path: PathBuf,
    extract_dir: PathBuf,
}

impl Download {
    /// The downloaded file, named after the last path segment of its URL.
    #[must_use]
    pub(crate) fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// A directory next to the download for extracted files. It is not created until something
    /// is extracted into it.
    #[must_use]
    pub(crate) fn extract_dir(&self) -> &Path {
        &self.extract_dir
    }
}

#[derive(Debug)]
pub(crate) struct Downloader<'a> {
    client: &'a Client,
    timeout: Duration,
    show_progress: bool,
}

impl<'a> Downloader<'a> {
    pub(crate) fn new(client: &'a Client, timeout: Duration, show_progress: bool) -> Self {
        Self {
            client,
            timeout,
            show_progress,
        }
    }

    pub(crate) async fn fetch(&self, url: &Url) -> Result<Download> {
        info!("Downloading {url}");

        let mut resp = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| GetError::Network {
                url: url.clone(),
                source,
            })?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(GetError::UnexpectedStatus {
                url: url.clone(),
                status,
            }
            .into());
        }

        let td = tempdir().map_err(|e| GetError::io(std::env::temp_dir(), e))?;
        let archive_path = td.path().join(file_name(url));
        let extract_dir = td.path().join("extracted");
        debug!("archive path is {}", archive_path.display());

        let pb = self.progress_bar(resp.content_length())?;
        {
            let file = File::create(&archive_path).map_err(|e| GetError::io(&archive_path, e))?;
            let mut writer = pb.wrap_write(file);
            while let Some(c) = resp.chunk().await.map_err(|source| GetError::Network {
                url: url.clone(),
                source,
            })? {
                writer
                    .write_all(c.as_ref())
                    .map_err(|e| GetError::io(&archive_path, e))?;
            }
            writer.flush().map_err(|e| GetError::io(&archive_path, e))?;
        }
        pb.finish_and_clear();
        debug!("downloaded {} bytes", pb.position());

        Ok(Download {
            _temp_dir: td,
            archive_path,
            extract_dir,
        })
    }

    fn progress_bar(&self, len: Option<u64>) -> Result<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }

        let pb = match len {
            Some(len) => ProgressBar::new(len).with_style(
                ProgressStyle::with_template(
                    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                )
                .context("invalid progress bar template")?
                .progress_chars("=> "),
            ),
            None => ProgressBar::new_spinner().with_style(
                ProgressStyle::with_template("{msg} {spinner} {bytes} ({bytes_per_sec})")
                    .context("invalid progress bar template")?,
            ),
        };
        Ok(pb.with_message("downloading"))
    }
}

fn file_name(url: &Url) -> &str {
    url.path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use rstest::rstest;
    use std::fs;
    use test_log::test;

    const TIMEOUT: Duration = Duration::from_secs(60);

    #[test(tokio::test)]
    async fn fetch() -> Result<()> {
        let mut server = Server::new_async().await;
        let body = b"not really a binary".repeat(1024);
        let m = server
            .mock("GET", "/acme/demo/releases/download/v1.0.0/demo_linux_x86_64")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let client = Client::new();
        let url = Url::parse(&format!(
            "{}/acme/demo/releases/download/v1.0.0/demo_linux_x86_64",
            server.url()
        ))?;
        let download = Downloader::new(&client, TIMEOUT, false).fetch(&url).await?;
        m.assert_async().await;

        assert_eq!(
            download.archive_path().file_name().and_then(|n| n.to_str()),
            Some("demo_linux_x86_64"),
        );
        assert_eq!(fs::read(download.archive_path())?, body);
        assert!(!download.extract_dir().exists());

        let dir = download
            .archive_path()
            .parent()
            .map(Path::to_path_buf)
            .context("download has no parent directory")?;
        assert!(dir.exists());
        drop(download);
        assert!(!dir.exists(), "temp dir is removed on drop");

        Ok(())
    }

    #[test(tokio::test)]
    async fn fetch_with_progress_bar() -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/demo.tar.gz")
            .with_status(200)
            .with_body("abc")
            .create_async()
            .await;

        let client = Client::new();
        let url = Url::parse(&format!("{}/demo.tar.gz", server.url()))?;
        let download = Downloader::new(&client, TIMEOUT, true).fetch(&url).await?;
        assert_eq!(fs::read_to_string(download.archive_path())?, "abc");

        Ok(())
    }

    #[test(tokio::test)]
    async fn fetch_without_content_length_uses_spinner() -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/demo")
            .with_status(200)
            .with_chunked_body(|w| w.write_all(b"chunky"))
            .create_async()
            .await;

        let client = Client::new();
        let url = Url::parse(&format!("{}/demo", server.url()))?;
        let download = Downloader::new(&client, TIMEOUT, true).fetch(&url).await?;
        assert_eq!(fs::read_to_string(download.archive_path())?, "chunky");

        Ok(())
    }

    #[test]
    fn progress_bar_kinds() -> Result<()> {
        let client = Client::new();

        let spinner = Downloader::new(&client, TIMEOUT, true).progress_bar(None)?;
        assert_eq!(spinner.length(), None);

        let bar = Downloader::new(&client, TIMEOUT, true).progress_bar(Some(3))?;
        assert_eq!(bar.length(), Some(3));

        let hidden = Downloader::new(&client, TIMEOUT, false).progress_bar(Some(3))?;
        assert!(hidden.is_hidden());

        Ok(())
    }

    #[test(tokio::test)]
    async fn fetch_network_error() -> Result<()> {
        let client = Client::new();
        let url = Url::parse("http://127.0.0.1:1/demo.tar.gz")?;
        let err = Downloader::new(&client, TIMEOUT, false)
            .fetch(&url)
            .await
            .unwrap_err();
        match err.downcast_ref::<GetError>() {
            Some(GetError::Network { url: failed, .. }) => assert_eq!(failed, &url),
            _ => panic!("expected a Network error, got {err:?}"),
        }

        Ok(())
    }

    #[rstest]
    #[case(404)]
    #[case(500)]
    #[case(204)]
    #[tokio::test]
    async fn non_200_status(#[case] code: usize) -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/demo.tar.gz")
            .with_status(code)
            .create_async()
            .await;

        let client = Client::new();
        let url = Url::parse(&format!("{}/demo.tar.gz", server.url()))?;
        let err = Downloader::new(&client, TIMEOUT, false)
            .fetch(&url)
            .await
            .unwrap_err();
        let status = err
            .downcast_ref::<GetError>()
            .and_then(GetError::status)
            .context("expected an UnexpectedStatus error")?;
        assert_eq!(status.as_u16() as usize, code);

        Ok(())
    }

    #[rstest]
    #[case("https://example.com/a/b/tool.tar.gz", "tool.tar.gz")]
    #[case("https://example.com/tool", "tool")]
    #[case("https://example.com/", "download")]
    #[case("https://example.com/dir/", "download")]
    #[test_log::test]
    fn file_name_from_url(#[case] url: &str, #[case] expect: &str) -> Result<()> {
        assert_eq!(file_name(&Url::parse(url)?), expect);
        Ok(())
    }
}
