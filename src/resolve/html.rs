//! Download links scraped from an HTML page.

use super::version::{capture_version, compile_version_pattern};
use super::{file_name_from_url, ResolvedAsset};
use crate::error::ResolveError;
use crate::filter::Filter;
use regex::Regex;
use reqwest::Url;
use std::sync::OnceLock;

fn anchor_regex() -> &'static Regex {
    static ANCHOR: OnceLock<Regex> = OnceLock::new();
    ANCHOR.get_or_init(|| {
        Regex::new(r#"(?i)<a\s+[^>]*href\s*=\s*["']([^"']+)["'][^>]*>"#)
            .expect("anchor regex is valid")
    })
}

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag regex is valid"))
}

fn exe_version_regex() -> &'static Regex {
    static EXE: OnceLock<Regex> = OnceLock::new();
    EXE.get_or_init(|| Regex::new(r"(?i)tcmd(\d{2})(\d{2})x64").expect("exe regex is valid"))
}

fn known_ext_regex() -> &'static Regex {
    static EXT: OnceLock<Regex> = OnceLock::new();
    EXT.get_or_init(|| Regex::new(r"(?i)\.(exe|zip|7z)$").expect("extension regex is valid"))
}

/// Resolves a page already fetched from `page_url` to a download link and version.
pub fn select_link(
    html: &str,
    page_url: &str,
    filter: &Filter,
    version_from: Option<&str>,
    version_pattern: Option<&str>,
) -> Result<ResolvedAsset, ResolveError> {
    let links = extract_links(html, page_url);
    tracing::debug!("Found {} links on page", links.len());

    let url = filter
        .find_match(&links)
        .ok_or_else(|| ResolveError::NoMatch {
            url: page_url.to_string(),
        })?
        .to_string();

    let from_page = match version_pattern {
        Some(pattern) => {
            let regex = compile_version_pattern(pattern)?;
            let found = capture_version(&regex, &strip_tags(html));
            if found.is_none() {
                tracing::debug!("Version pattern matched nothing on the page, falling back");
            }
            found
        }
        None => None,
    };

    let version = match from_page {
        Some(version) => version,
        None => version_from_file_name(&file_name_from_url(&url), version_from),
    };
    tracing::debug!("Extracted version: {}", version);

    Ok(ResolvedAsset { url, version })
}

/// Every anchor `href` on the page, decoded and made absolute.
pub fn extract_links(html: &str, page_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        tracing::warn!("Page URL is not absolute: {}", page_url);
        return Vec::new();
    };

    anchor_regex()
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .filter_map(|href| {
            let href = decode_entities(href.as_str()).replace("\\/", "/");
            resolve_href(&base, href.trim())
        })
        .collect()
}

fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(href.to_string());
    }
    base.join(href).ok().map(|url| url.to_string())
}

fn version_from_file_name(file_name: &str, version_from: Option<&str>) -> String {
    if version_from.is_some_and(|from| from.eq_ignore_ascii_case("exe")) {
        if let Some(caps) = exe_version_regex().captures(file_name) {
            return format!("{}.{}", &caps[1], &caps[2]);
        }
    }
    known_ext_regex().replace(file_name, "").into_owned()
}

/// Visible page text: tags removed, entities decoded.
pub fn strip_tags(html: &str) -> String {
    decode_entities(&tag_regex().replace_all(html, " "))
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match candidate.find(';').filter(|&end| end <= 10) {
            Some(end) => match decode_entity(&candidate[1..end]) {
                Some(decoded) => {
                    out.push(decoded);
                    rest = &candidate[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = &candidate[1..];
                }
            },
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOverride;

    const PAGE: &str = r#"<html><body>
        <h1>Total Commander 11.56</h1>
        <a href="https://cdn.example.com/tcmd1156x32.exe">32 bit</a>
        <a class="dl" href="/files/tcmd1156x64.exe">64 bit</a>
        <a href='docs/readme.html'>readme</a>
        <a href="download.php?file=a&amp;b=1">query</a>
    </body></html>"#;

    fn exe_filter() -> Filter {
        Filter::merged(Some(&FilterOverride {
            must_contain: Some(vec!["x64".to_string(), ".exe".to_string()]),
            must_not_contain: Some(vec![]),
            allowed_ext: Some(vec!["exe".to_string()]),
        }))
    }

    #[test]
    fn test_links_are_resolved_against_page() {
        let links = extract_links(PAGE, "https://www.example.com:8443/dl/download.htm?x=1");
        assert_eq!(
            links,
            vec![
                "https://cdn.example.com/tcmd1156x32.exe",
                "https://www.example.com:8443/files/tcmd1156x64.exe",
                "https://www.example.com:8443/dl/docs/readme.html",
                "https://www.example.com:8443/dl/download.php?file=a&b=1",
            ]
        );
    }

    #[test]
    fn test_exe_version_from_file_name() {
        let asset = select_link(
            PAGE,
            "https://www.example.com/download.htm",
            &exe_filter(),
            Some("exe"),
            None,
        )
        .unwrap();
        assert_eq!(asset.url, "https://www.example.com/files/tcmd1156x64.exe");
        assert_eq!(asset.version, "11.56");
    }

    #[test]
    fn test_version_pattern_reads_page_text() {
        let asset = select_link(
            PAGE,
            "https://www.example.com/download.htm",
            &exe_filter(),
            Some("exe"),
            Some(r"Total Commander (\d+\.\d+)"),
        )
        .unwrap();
        assert_eq!(asset.version, "11.56");

        // A pattern that finds nothing falls through to the file name.
        let asset = select_link(
            PAGE,
            "https://www.example.com/download.htm",
            &exe_filter(),
            None,
            Some(r"release (\d+)"),
        )
        .unwrap();
        assert_eq!(asset.version, "tcmd1156x64");
    }

    #[test]
    fn test_no_matching_link() {
        let err = select_link(
            PAGE,
            "https://www.example.com/download.htm",
            &Filter::default(),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::NoMatch { .. }));
    }

    #[test]
    fn test_entities_and_tags() {
        assert_eq!(decode_entities("a &amp; b &#65;&#x42; &bogus; &"), "a & b AB &bogus; &");
        assert_eq!(strip_tags("<p>v<b>1.0</b></p>").split_whitespace().collect::<Vec<_>>(), vec!["v", "1.0"]);
    }
}
