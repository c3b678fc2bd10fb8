//! User-supplied version patterns.
//!
//! A pattern may be written bare (`v(\d+\.\d+)`) or delimited with trailing
//! flags (`/v(\d+\.\d+)/i`, `#build-(\d+)#`). Bare patterns match
//! case-insensitively.

use crate::error::ResolveError;
use regex::{Regex, RegexBuilder};

const DELIMITERS: &[char] = &['/', '#', '~', '!', '@', '%', '|', '`'];

pub fn compile_version_pattern(pattern: &str) -> Result<Regex, ResolveError> {
    let pattern_err = |source| ResolveError::Pattern {
        pattern: pattern.to_string(),
        source,
    };

    match split_delimited(pattern) {
        Some((body, flags)) => {
            let mut builder = RegexBuilder::new(body);
            for flag in flags.chars() {
                match flag {
                    'i' => builder.case_insensitive(true),
                    'm' => builder.multi_line(true),
                    's' => builder.dot_matches_new_line(true),
                    'x' => builder.ignore_whitespace(true),
                    'U' => builder.swap_greed(true),
                    other => {
                        tracing::debug!("Ignoring unsupported pattern flag '{}'", other);
                        &mut builder
                    }
                };
            }
            builder.build().map_err(pattern_err)
        }
        None => RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(pattern_err),
    }
}

/// `(body, flags)` when `pattern` is wrapped in a recognised delimiter.
fn split_delimited(pattern: &str) -> Option<(&str, &str)> {
    let delimiter = pattern.chars().next().filter(|c| DELIMITERS.contains(c))?;
    let rest = &pattern[delimiter.len_utf8()..];
    let end = rest.rfind(delimiter)?;
    let flags = &rest[end + delimiter.len_utf8()..];
    if !flags.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((&rest[..end], flags))
}

/// First capture group, or the whole match when the pattern has none.
pub fn capture_version(regex: &Regex, text: &str) -> Option<String> {
    let caps = regex.captures(text)?;
    let matched = caps.get(1).or_else(|| caps.get(0))?;
    let version = matched.as_str().trim();
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}
