//! Turning a download step's source into a concrete URL and version
//!
//! Three strategies share one entry point:
//! - GitHub release API documents (`url` + `filter`)
//! - HTML pages scraped for links (`pageUrl` + `findLink`)
//! - Redirecting "latest" URLs (`redirectUrl`)

pub mod github;
pub mod html;
pub mod redirect;
pub mod version;

use crate::download::HttpFetcher;
use crate::error::ResolveError;
use crate::filter::Filter;
use crate::types::DownloadSource;
use reqwest::Url;
use std::path::Path;

/// What to download and which version it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub url: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct AssetResolver {
    fetcher: HttpFetcher,
}

impl AssetResolver {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &HttpFetcher {
        &self.fetcher
    }

    /// Network lookups only; nothing is downloaded here.
    pub async fn resolve(&self, source: &DownloadSource) -> Result<ResolvedAsset, ResolveError> {
        let asset = match source {
            DownloadSource::GitHubApi { url, filter } => {
                tracing::info!("Querying release API {}", url);
                let fetched = self.fetcher.get(url).await?;
                github::select_asset(&fetched.body, url, &Filter::merged(filter.as_ref()))?
            }
            DownloadSource::HtmlPage {
                page_url,
                find_link,
                version_from,
                version_pattern,
            } => {
                tracing::info!("Fetching HTML page {}", page_url);
                let fetched = self.fetcher.get(page_url).await?;
                html::select_link(
                    &fetched.body,
                    &fetched.url,
                    &Filter::merged(find_link.as_ref()),
                    version_from.as_deref(),
                    version_pattern.as_deref(),
                )?
            }
            DownloadSource::Redirect {
                redirect_url,
                version_pattern,
            } => {
                tracing::info!("Following redirect {}", redirect_url);
                let target = self.fetcher.get_redirect_target(redirect_url).await?;
                redirect::resolve_target(&target, version_pattern.as_deref())?
            }
        };

        tracing::info!("Resolved {} (version {})", asset.url, asset.version);
        Ok(asset)
    }
}

/// Last path segment of `url` without query or fragment; `download` if empty.
pub fn file_name_from_url(url: &str) -> String {
    let from_parsed = Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
    });
    let name = from_parsed.unwrap_or_else(|| {
        let end = url.find(['?', '#']).unwrap_or(url.len());
        url[..end].rsplit('/').next().unwrap_or_default().to_string()
    });

    let name = sanitize(&name);
    if name.is_empty() {
        "download".to_string()
    } else {
        name
    }
}

/// `{version}` substituted into `pattern`; the original file's extension is
/// appended when the pattern does not carry one.
///
/// The extension check runs on the pattern itself, so a dotted version such
/// as `4.2` is never mistaken for one.
pub fn apply_filename_pattern(pattern: &str, version: &str, original: &str) -> String {
    let mut name = sanitize(&pattern.replace("{version}", version));
    let bare_pattern = pattern.replace("{version}", "");
    if Path::new(&bare_pattern).extension().is_none() {
        if let Some(ext) = Path::new(original).extension() {
            name.push('.');
            name.push_str(&ext.to_string_lossy());
        }
    }
    name
}

/// Replaces characters that are not valid in Windows file names.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches(|c: char| c == ' ' || c == '.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::HttpOptions;
    use crate::filter::FilterOverride;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://x.com/a/b/App-1.0.zip?token=1#f"),
            "App-1.0.zip"
        );
        assert_eq!(file_name_from_url("https://x.com/"), "download");
        assert_eq!(file_name_from_url("https://x.com"), "download");
        assert_eq!(file_name_from_url("not a url/tool.7z?x"), "tool.7z");
    }

    #[test]
    fn test_apply_filename_pattern() {
        assert_eq!(
            apply_filename_pattern("tool-{version}", "1.2", "x.zip"),
            "tool-1.2.zip"
        );
        assert_eq!(
            apply_filename_pattern("tool-{version}.7z", "1.2", "x.zip"),
            "tool-1.2.7z"
        );
        assert_eq!(apply_filename_pattern("tool", "1.2", "noext"), "tool");
    }

    #[test]
    fn test_filename_pattern_with_dotted_version_keeps_extension() {
        assert_eq!(
            apply_filename_pattern("Tool-{version}", "4.2", "tool-portable-x64.zip"),
            "Tool-4.2.zip"
        );
        assert_eq!(
            apply_filename_pattern("tool-{version}", "1.2.3", "a.7z"),
            "tool-1.2.3.7z"
        );
        assert_eq!(
            apply_filename_pattern("tool-{version}.zip", "4.2", "x.7z"),
            "tool-4.2.zip"
        );
        assert_eq!(apply_filename_pattern("Tool-{version}", "11", "x.zip"), "Tool-11.zip");
    }

    #[tokio::test]
    async fn test_resolve_each_strategy() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        Mock::given(method("GET"))
            .and(path("/repos/o/r/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"{{"assets": [{{"browser_download_url": "{}/dl/app-portable-x64.zip"}}]}}"#,
                uri
            )))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page/index.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<a href="files/app-3.1-portable-x64.7z">get</a>"#),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/latest"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/dl/App-4.0.2.zip"))
            .mount(&mock_server)
            .await;

        let resolver = AssetResolver::new(HttpFetcher::new(&HttpOptions::default()).unwrap());

        let github = resolver
            .resolve(&DownloadSource::GitHubApi {
                url: format!("{}/repos/o/r/releases/latest", uri),
                filter: None,
            })
            .await
            .unwrap();
        assert_eq!(github.url, format!("{}/dl/app-portable-x64.zip", uri));
        assert_eq!(github.version, "app-portable-x64");

        let html = resolver
            .resolve(&DownloadSource::HtmlPage {
                page_url: format!("{}/page/index.html", uri),
                find_link: Some(FilterOverride::default()),
                version_from: None,
                version_pattern: Some(r"app-(\d+\.\d+)".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(html.url, format!("{}/page/files/app-3.1-portable-x64.7z", uri));
        // The pattern runs over visible text, which has no version here.
        assert_eq!(html.version, "app-3.1-portable-x64");

        let redirect = resolver
            .resolve(&DownloadSource::Redirect {
                redirect_url: format!("{}/latest", uri),
                version_pattern: None,
            })
            .await
            .unwrap();
        assert_eq!(redirect.url, format!("{}/dl/App-4.0.2.zip", uri));
        assert_eq!(redirect.version, "4.0.2");
    }
}
