//! Allow/deny matching of asset and link URLs.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MUST_CONTAIN: &[&str] = &["portable", "x64"];
pub const DEFAULT_MUST_NOT_CONTAIN: &[&str] = &["arm"];
pub const DEFAULT_ALLOWED_EXT: &[&str] = &["zip", "7z"];

/// Filter as written in a config file. A key that is present (even as an
/// empty list) replaces the default for that key; an absent key inherits it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_contain: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_not_contain: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_ext: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub must_contain: Vec<String>,
    pub must_not_contain: Vec<String>,
    pub allowed_ext: Vec<String>,
}

impl Default for Filter {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            must_contain: owned(DEFAULT_MUST_CONTAIN),
            must_not_contain: owned(DEFAULT_MUST_NOT_CONTAIN),
            allowed_ext: owned(DEFAULT_ALLOWED_EXT),
        }
    }
}

impl Filter {
    /// Default filter with each key the override defines replaced wholesale.
    pub fn merged(overrides: Option<&FilterOverride>) -> Self {
        let mut filter = Self::default();
        if let Some(overrides) = overrides {
            if let Some(must_contain) = &overrides.must_contain {
                filter.must_contain = must_contain.clone();
            }
            if let Some(must_not_contain) = &overrides.must_not_contain {
                filter.must_not_contain = must_not_contain.clone();
            }
            if let Some(allowed_ext) = &overrides.allowed_ext {
                filter.allowed_ext = allowed_ext.clone();
            }
        }
        filter
    }

    /// An empty `allowed_ext` rejects every URL, unlike the two substring
    /// clauses where an empty list imposes nothing.
    pub fn matches(&self, url: &str) -> bool {
        let haystack = url.to_lowercase();

        if let Some(word) = self
            .must_contain
            .iter()
            .find(|word| !haystack.contains(&word.to_lowercase()))
        {
            tracing::trace!("   mustContain failed: {}", word);
            return false;
        }

        if let Some(word) = self
            .must_not_contain
            .iter()
            .find(|word| haystack.contains(&word.to_lowercase()))
        {
            tracing::trace!("   mustNotContain failed: {}", word);
            return false;
        }

        let path = strip_query_and_fragment(&haystack);
        let ext_ok = self
            .allowed_ext
            .iter()
            .any(|ext| path.ends_with(&format!(".{}", ext.to_lowercase())));
        if !ext_ok {
            tracing::trace!("   allowedExt failed");
        }
        ext_ok
    }

    /// First URL in input order that satisfies [`Filter::matches`].
    pub fn find_match<'a, I, S>(&self, urls: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a S>,
        S: AsRef<str> + ?Sized + 'a,
    {
        for url in urls {
            let url = url.as_ref();
            tracing::debug!("  URL: {}", url);
            if self.matches(url) {
                tracing::debug!("  URL matches");
                return Some(url);
            }
        }
        tracing::debug!("No suitable URL found");
        None
    }
}

fn strip_query_and_fragment(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}
