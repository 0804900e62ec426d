//! Common HTTP code

use std::{
    io::{self, BufWriter, Write},
    path::Path,
    time::Duration,
};

use anyhow::Context as _;
use const_format::formatcp;
use futures_util::StreamExt as _;
use reqwest::{IntoUrl, Url};

/// User agent for all requests
pub(crate) const USER_AGENT: &str = formatcp!(
    "{}/{} (image dataset downloader)",
    env!("CARGO_PKG_NAME"),
    env!("CARGO_PKG_VERSION")
);

/// Username and API key
#[derive(Clone)]
struct BasicAuth {
    username: String,
    api_key: String,
}

/// HTTP interface shared by the post listing and the image downloads
pub struct BooruClient {
    /// Client
    client: reqwest::Client,
    /// Credentials sent with API requests
    auth: Option<BasicAuth>,
    /// Total timeout for a single image download
    download_timeout: Duration,
}

impl BooruClient {
    /// Create a new HTTP client.
    /// `timeout` applies to API requests, `download_timeout` to each image download.
    pub fn new(
        timeout: Duration,
        download_timeout: Duration,
        auth: Option<(&str, &str)>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            auth: auth.map(|(username, api_key)| BasicAuth {
                username: username.to_owned(),
                api_key: api_key.to_owned(),
            }),
            download_timeout,
        })
    }

    /// Send an authenticated GET request to URL, parse response as JSON
    pub(crate) async fn get_json<R>(&self, url: Url) -> anyhow::Result<R>
    where
        R: serde::de::DeserializeOwned,
    {
        log::debug!("GET {url}");
        let mut request = self.client.get(url.clone());
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, Some(&auth.api_key));
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Internal HTTP error for URL {:?}", url.as_str()))?
            .error_for_status()
            .with_context(|| format!("HTTP error for URL {:?}", url.as_str()))?;
        let data = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response for URL {:?}", url.as_str()))?;
        log::trace!("{}", String::from_utf8_lossy(&data));
        let r: R = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse response for URL {:?}", url.as_str()))?;
        Ok(r)
    }

    /// Download a file to a writer, return the number of bytes written
    pub(crate) async fn download<U, W>(&self, url: U, mut writer: W) -> anyhow::Result<u64>
    where
        U: IntoUrl,
        W: Write,
    {
        log::debug!("Downloading {}...", url.as_str());
        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await?;

        anyhow::ensure!(
            response.status().is_success(),
            "Request failed with status: {}",
            response.status()
        );

        let mut stream = response.bytes_stream();
        let mut size = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed to download chunk")?;
            writer
                .write_all(&chunk)
                .context("Failed to write chunk to file")?;
            size += chunk.len() as u64;
        }
        writer.flush().context("Failed to flush file")?;

        Ok(size)
    }
}

/// File transfer
#[async_trait::async_trait]
pub trait Transfer: Sync + Send {
    /// Fetch `url` into file `dest`, return the number of bytes written.
    /// On error, `dest` must not be left looking like a complete download.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> anyhow::Result<u64>;
}

#[async_trait::async_trait]
impl Transfer for BooruClient {
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> anyhow::Result<u64> {
        // Download to temporary file in the same dir, so it can be renamed in place
        let dir = dest
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let tmp_file = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temporary file in {dir:?}"))?;
        let mut writer = BufWriter::new(tmp_file);
        let size = self.download(url, &mut writer).await?;
        let tmp_file = writer
            .into_inner()
            .map_err(io::IntoInnerError::into_error)
            .context("Failed to flush temporary file")?;
        tmp_file
            .persist(dest)
            .with_context(|| format!("Failed to move download to {dest:?}"))?;
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;

    fn client() -> BooruClient {
        BooruClient::new(Duration::from_secs(5), Duration::from_secs(5), None).unwrap()
    }

    #[tokio::test]
    async fn fetch_to_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/original/ab/cd/abcd.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG data".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("00000001_abcd.png");
        let size = client()
            .fetch_to_file(&format!("{}/original/ab/cd/abcd.png", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(size, 9);
        assert_eq!(fs::read(&dest).unwrap(), b"\x89PNG data");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn fetch_to_file_overwrites() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.jpg");
        fs::write(&dest, b"partial old content").unwrap();
        client()
            .fetch_to_file(&format!("{}/a.jpg", server.uri()), &dest)
            .await
            .unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[tokio::test]
    async fn fetch_to_file_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.jpg");
        let err = client()
            .fetch_to_file(&format!("{}/missing.jpg", server.uri()), &dest)
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("404"));
        assert!(!dest.exists());
        // Temporary file is cleaned up too
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn fetch_to_file_invalid_url() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.jpg");
        assert!(client().fetch_to_file("not a url", &dest).await.is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn user_agent() {
        assert!(USER_AGENT.starts_with("booru-dl/"));
    }
}
