use crate::{
    error::GetError,
    release::{Release, ReleaseClient},
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{
    header::{HeaderValue, ACCEPT, AUTHORIZATION},
    Client, RequestBuilder, StatusCode,
};
use std::{env, sync::LazyLock, time::Duration};
use url::Url;

pub(crate) static DEFAULT_API_BASE_URL: LazyLock<Url> =
    LazyLock::new(|| Url::parse("https://api.github.com").unwrap());

pub(crate) const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Lists releases with the GitHub REST API.
#[derive(Debug)]
pub(crate) struct GitHub {
    client: Client,
    api_base: Url,
    token: Option<String>,
    timeout: Duration,
}

#[async_trait]
impl ReleaseClient for GitHub {
    async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>> {
        let url = self.releases_url(owner, repo)?;
        debug!("Getting release info from `{url}`");

        let mut req_builder = self
            .client
            .get(url.clone())
            .header(
                ACCEPT,
                HeaderValue::from_static("application/vnd.github+json"),
            )
            .timeout(self.timeout);
        req_builder = self.maybe_add_token_header(req_builder)?;

        let resp = req_builder
            .send()
            .await
            .map_err(|source| GetError::Network {
                url: url.clone(),
                source,
            })?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(GetError::UnexpectedStatus { url, status }.into());
        }

        let body = resp.bytes().await.map_err(|source| GetError::Network {
            url: url.clone(),
            source,
        })?;
        let releases = serde_json::from_slice::<Vec<Release>>(&body)
            .map_err(|source| GetError::Decode { url, source })?;
        debug!("found {} releases for {owner}/{repo}", releases.len());

        Ok(releases)
    }
}

impl GitHub {
    pub(crate) fn new(
        client: Client,
        api_base: Option<Url>,
        token: Option<String>,
        timeout: Duration,
    ) -> Self {
        let token = token.or_else(|| {
            let token = env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.is_empty());
            if token.is_some() {
                debug!("Using GitHub token from the {TOKEN_ENV_VAR} environment variable.");
            }
            token
        });

        Self {
            client,
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE_URL.clone()),
            token,
            timeout,
        }
    }

    fn releases_url(&self, owner: &str, repo: &str) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("the API base URL {} cannot be a base", self.api_base))?
            .pop_if_empty()
            .extend(["repos", owner, repo, "releases"]);
        Ok(url)
    }

    fn maybe_add_token_header(&self, mut req_builder: RequestBuilder) -> Result<RequestBuilder> {
        if let Some(token) = self.token.as_deref() {
            debug!("Adding token to GitHub request.");
            let bearer = format!("Bearer {token}");
            let mut auth_val = HeaderValue::from_str(&bearer)?;
            auth_val.set_sensitive(true);
            req_builder = req_builder.header(AUTHORIZATION, auth_val);
        } else {
            debug!("No token given.");
        }
        Ok(req_builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::Asset;
    use mockito::{Matcher, Server};
    use serial_test::serial;
    use test_log::test;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn releases() -> Result<Vec<Release>> {
        Ok(vec![Release {
            tag: "v1.0.0".to_string(),
            name: Some("v1.0.0".to_string()),
            assets: vec![Asset {
                name: "asset1".to_string(),
                download_url: Url::parse(
                    "https://github.com/acme/demo/releases/download/v1.0.0/asset1",
                )?,
            }],
        }])
    }

    #[test(tokio::test)]
    #[serial]
    async fn list_releases_without_token() -> Result<()> {
        list_releases(None).await
    }

    #[test(tokio::test)]
    #[serial]
    async fn list_releases_with_token() -> Result<()> {
        list_releases(Some("ghp_fakeToken")).await
    }

    async fn list_releases(token: Option<&str>) -> Result<()> {
        let saved = env::var(TOKEN_ENV_VAR).ok();
        env::remove_var(TOKEN_ENV_VAR);

        let authorization_header_matcher = match token {
            Some(token) => Matcher::Exact(format!("Bearer {token}")),
            None => Matcher::Missing,
        };
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/repos/acme/demo/releases")
            .match_header("Authorization", authorization_header_matcher)
            .with_status(200)
            .with_body(serde_json::to_string(&releases()?)?)
            .create_async()
            .await;

        let github = GitHub::new(
            Client::new(),
            Some(Url::parse(&server.url())?),
            token.map(String::from),
            TIMEOUT,
        );
        let got = github.list_releases("acme", "demo").await?;
        assert_eq!(got, releases()?);

        m.assert_async().await;

        if let Some(saved) = saved {
            env::set_var(TOKEN_ENV_VAR, saved);
        }

        Ok(())
    }

    #[test(tokio::test)]
    #[serial]
    async fn token_from_env() -> Result<()> {
        let saved = env::var(TOKEN_ENV_VAR).ok();
        env::set_var(TOKEN_ENV_VAR, "from-env");

        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/repos/acme/demo/releases")
            .match_header("Authorization", "Bearer from-env")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let github = GitHub::new(Client::new(), Some(Url::parse(&server.url())?), None, TIMEOUT);
        assert!(github.list_releases("acme", "demo").await?.is_empty());
        m.assert_async().await;

        match saved {
            Some(saved) => env::set_var(TOKEN_ENV_VAR, saved),
            None => env::remove_var(TOKEN_ENV_VAR),
        }

        Ok(())
    }

    #[test(tokio::test)]
    async fn unexpected_status() -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/repos/acme/missing/releases")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let github = GitHub::new(
            Client::new(),
            Some(Url::parse(&server.url())?),
            Some("t".to_string()),
            TIMEOUT,
        );
        let err = github.list_releases("acme", "missing").await.unwrap_err();
        match err.downcast_ref::<GetError>() {
            Some(e @ GetError::UnexpectedStatus { .. }) => {
                assert_eq!(e.status(), Some(StatusCode::NOT_FOUND));
                assert!(e.to_string().contains("404"), "{e}");
            }
            _ => panic!("expected an UnexpectedStatus error, got {err:?}"),
        }

        Ok(())
    }

    #[test(tokio::test)]
    async fn decode_error() -> Result<()> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/repos/acme/demo/releases")
            .with_status(200)
            .with_body(r#"{"not": "a list"}"#)
            .create_async()
            .await;

        let github = GitHub::new(
            Client::new(),
            Some(Url::parse(&server.url())?),
            Some("t".to_string()),
            TIMEOUT,
        );
        let err = github.list_releases("acme", "demo").await.unwrap_err();
        assert!(
            matches!(err.downcast_ref::<GetError>(), Some(GetError::Decode { .. })),
            "{err:?}",
        );

        Ok(())
    }

    #[test(tokio::test)]
    async fn network_error() -> Result<()> {
        // Nothing listens on port 1.
        let github = GitHub::new(
            Client::new(),
            Some(Url::parse("http://127.0.0.1:1")?),
            Some("t".to_string()),
            TIMEOUT,
        );
        let err = github.list_releases("acme", "demo").await.unwrap_err();
        assert!(
            matches!(err.downcast_ref::<GetError>(), Some(GetError::Network { .. })),
            "{err:?}",
        );

        Ok(())
    }

    #[test]
    fn releases_url() -> Result<()> {
        let github = GitHub::new(
            Client::new(),
            Some(Url::parse("https://github.example.com/api/v3")?),
            Some("t".to_string()),
            TIMEOUT,
        );
        assert_eq!(
            github.releases_url("cli", "cli")?.as_str(),
            "https://github.example.com/api/v3/repos/cli/cli/releases",
        );

        let github = GitHub::new(Client::new(), None, Some("t".to_string()), TIMEOUT);
        assert_eq!(
            github.releases_url("cli", "cli")?.as_str(),
            "https://api.github.com/repos/cli/cli/releases",
        );
        Ok(())
    }
}
