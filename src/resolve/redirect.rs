//! "Latest" URLs that answer with a redirect to the real artifact.

use super::version::{capture_version, compile_version_pattern};
use super::{file_name_from_url, ResolvedAsset};
use crate::error::ResolveError;
use regex::Regex;
use std::sync::OnceLock;

fn fallback_regexes() -> &'static [Regex; 2] {
    static FALLBACKS: OnceLock<[Regex; 2]> = OnceLock::new();
    FALLBACKS.get_or_init(|| {
        [
            Regex::new(r"(\d+\.\d+\.\d+)\.[A-Za-z0-9]+$").expect("semver regex is valid"),
            Regex::new(r"(\d+\.\d+)\.[A-Za-z0-9]+$").expect("major.minor regex is valid"),
        ]
    })
}

/// Version for a redirect target: custom pattern against the final URL,
/// then `x.y.z` and `x.y` before the extension, then the bare file stem.
pub fn resolve_target(
    final_url: &str,
    version_pattern: Option<&str>,
) -> Result<ResolvedAsset, ResolveError> {
    let file_name = file_name_from_url(final_url);

    if let Some(pattern) = version_pattern {
        let regex = compile_version_pattern(pattern)?;
        if let Some(version) = capture_version(&regex, final_url) {
            return Ok(ResolvedAsset {
                url: final_url.to_string(),
                version,
            });
        }
        tracing::debug!("Version pattern did not match {}", final_url);
    }

    let version = fallback_regexes()
        .iter()
        .find_map(|regex| capture_version(regex, &file_name))
        .unwrap_or_else(|| strip_extension(&file_name).to_string());

    Ok(ResolvedAsset {
        url: final_url.to_string(),
        version,
    })
}

fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version_of(url: &str) -> String {
        resolve_target(url, None).unwrap().version
    }

    #[test]
    fn test_fallback_order() {
        assert_eq!(version_of("https://dl.example.com/App-2.3.1.zip"), "2.3.1");
        assert_eq!(version_of("https://dl.example.com/App-2.3.zip"), "2.3");
        assert_eq!(version_of("https://dl.example.com/App.zip"), "App");
        assert_eq!(version_of("https://dl.example.com/App-10.4.2.7z?sig=1"), "10.4.2");
    }

    #[test]
    fn test_custom_pattern_wins_and_falls_back() {
        let asset = resolve_target(
            "https://dl.example.com/builds/R812/App-2.3.1.zip",
            Some(r"builds/r(\d+)"),
        );
        assert_eq!(asset.unwrap().version, "812");

        let asset = resolve_target(
            "https://dl.example.com/builds/R812/App-2.3.1.zip",
            Some(r"#builds/r(\d+)#"),
        );
        assert_eq!(asset.unwrap().version, "2.3.1");

        let asset = resolve_target("https://dl.example.com/App-2.3.1.zip", Some(r"build(\d+)"))
            .unwrap();
        assert_eq!(asset.version, "2.3.1");
        assert_eq!(asset.url, "https://dl.example.com/App-2.3.1.zip");
    }
}
