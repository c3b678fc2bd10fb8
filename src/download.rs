//! HTTP access: page/API fetches, streamed downloads and redirect lookups.

use crate::error::FetchError;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{ACCEPT, AUTHORIZATION, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{StatusCode, Url};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
pub const MAX_REDIRECTS: usize = 10;

const GITHUB_API_HOST: &str = "api.github.com";

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub verify_tls: bool,
    pub timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            verify_tls: false,
            timeout: Duration::from_secs(300),
        }
    }
}

/// A fully read response, reported with the URL it finally came from.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: String,
    pub status: StatusCode,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    no_redirect: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(options: &HttpOptions) -> Result<Self, FetchError> {
        if !options.verify_tls {
            tracing::debug!("TLS certificate verification is disabled");
        }
        let builder = || {
            reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .danger_accept_invalid_certs(!options.verify_tls)
                .timeout(options.timeout)
        };

        let client = builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(FetchError::Client)?;
        let no_redirect = builder()
            .redirect(Policy::none())
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            no_redirect,
        })
    }

    fn request(
        &self,
        client: &reqwest::Client,
        method: reqwest::Method,
        url: &str,
    ) -> reqwest::RequestBuilder {
        let mut request = client.request(method, url);
        let is_github_api = Url::parse(url)
            .ok()
            .and_then(|u| {
                u.host_str()
                    .map(|h| h.eq_ignore_ascii_case(GITHUB_API_HOST))
            })
            .unwrap_or(false);
        if is_github_api {
            request = request.header(ACCEPT, "application/vnd.github.v3+json");
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                if !token.is_empty() {
                    request = request.header(AUTHORIZATION, format!("token {}", token));
                }
            }
        }
        request
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .request(&self.client, reqwest::Method::GET, url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Status {
                url: response.url().to_string(),
                status,
            });
        }
        Ok(response)
    }

    /// GET following redirects. Any status of 400 or above is an error.
    pub async fn get(&self, url: &str) -> Result<Fetched, FetchError> {
        tracing::debug!("GET {}", url);
        let response = self.send(url).await?;
        let final_url = response.url().to_string();
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                url: final_url.clone(),
                source,
            })?;
        tracing::debug!("GET {} -> {} ({} bytes)", final_url, status, body.len());

        Ok(Fetched {
            url: final_url,
            status,
            body,
        })
    }

    /// Streams `url` into `dest`. A partially written file is removed on failure.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let result = self.download_inner(url, dest).await;
        if result.is_err() && dest.exists() {
            let _ = fs::remove_file(dest);
        }
        result
    }

    async fn download_inner(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let filename = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!("Downloading {}...", filename);

        let response = self.send(url).await?;
        let total_size = response.content_length().unwrap_or(0);

        let pb = ProgressBar::new(total_size);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(format!("Downloading {}", filename));

        let io_err = |source| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        };
        let mut file = fs::File::create(dest).map_err(io_err)?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
            file.write_all(&chunk).map_err(io_err)?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush().map_err(io_err)?;

        pb.finish_and_clear();
        tracing::debug!("Downloaded {} bytes to {}", downloaded, dest.display());
        Ok(())
    }

    /// HEAD without following redirects; returns the absolute `Location` target.
    pub async fn get_redirect_target(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!("HEAD {} (no redirects)", url);
        let response = self
            .request(&self.no_redirect, reqwest::Method::HEAD, url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| FetchError::NoRedirect {
                url: url.to_string(),
                status,
            })?;

        let target = match response.url().join(location) {
            Ok(joined) => joined.to_string(),
            Err(_) => location.to_string(),
        };
        tracing::debug!("{} redirects to {}", url, target);
        Ok(target)
    }
}
