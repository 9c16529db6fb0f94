//! Instagram link parsing.
//!
//! Turns free-text chat input into a validated shortcode. Only the host and
//! the path are inspected; query strings and fragments are dropped before
//! parsing.

// lazy_regex! uses once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Host every accepted link must belong to
pub const INSTAGRAM_HOST: &str = "instagram.com";

/// Path keywords that are followed by a shortcode (`/reel/ID`, `/p/ID`)
const SHORTCODE_KEYWORDS: &[&str] = &["reel", "p"];

/// Shortcodes end up in file names, so only this alphabet is accepted
static RE_SHORTCODE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"^[A-Za-z0-9_-]{1,64}$");

/// Errors produced while extracting a shortcode from user input
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    /// Input could not be parsed as a URL
    #[error("Malformed link: {0}")]
    Malformed(String),
    /// Host is not Instagram
    #[error("Invalid Instagram URL: unsupported host '{0}'")]
    UnsupportedHost(String),
    /// Path matched none of the known shapes
    #[error("Couldn't extract reel shortcode")]
    NoShortcode,
    /// Candidate contains characters outside the shortcode alphabet
    #[error("Invalid shortcode '{0}'")]
    InvalidShortcode(String),
}

/// Validated Instagram shortcode together with the link it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReelLink {
    /// Link as sent by the user, with query string and fragment removed
    pub url: String,
    /// Content identifier
    pub shortcode: String,
}

impl fmt::Display for ReelLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.shortcode, self.url)
    }
}

/// Strips surrounding whitespace, the query string and the fragment.
#[must_use]
pub fn clean_link(text: &str) -> &str {
    let trimmed = text.trim();
    let end = trimmed.find(['?', '#']).unwrap_or(trimmed.len());
    trimmed[..end].trim()
}

/// Quick pre-check used by the dispatcher to tell links from other chatter.
#[must_use]
pub fn looks_like_link(text: &str) -> bool {
    text.to_ascii_lowercase().contains(INSTAGRAM_HOST)
}

fn is_instagram_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host == INSTAGRAM_HOST || host.ends_with(".instagram.com")
}

/// Extracts the shortcode from an Instagram link.
///
/// Accepted shapes, on `instagram.com` or any of its subdomains:
/// `/reel/ID`, `/p/ID` (also nested, e.g. `/user/reel/ID`) and a bare `/ID`.
///
/// # Examples
///
/// ```
/// use reelgrab::media::link::extract_shortcode;
///
/// let link = extract_shortcode("https://instagram.com/reel/ABC123?utm=x").unwrap();
/// assert_eq!(link.shortcode, "ABC123");
/// assert_eq!(link.url, "https://instagram.com/reel/ABC123");
/// ```
///
/// # Errors
///
/// Returns a [`LinkError`] when the input is not an Instagram link or no
/// known path shape matches.
pub fn extract_shortcode(text: &str) -> Result<ReelLink, LinkError> {
    let cleaned = clean_link(text);
    if cleaned.is_empty() {
        return Err(LinkError::Malformed("empty message".to_string()));
    }

    let parsed = if cleaned.contains("://") {
        Url::parse(cleaned)
    } else {
        Url::parse(&format!("https://{cleaned}"))
    }
    .map_err(|e| LinkError::Malformed(e.to_string()))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| LinkError::Malformed("missing host".to_string()))?;
    if !is_instagram_host(host) {
        return Err(LinkError::UnsupportedHost(host.to_string()));
    }

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let candidate = segments
        .windows(2)
        .find(|pair| SHORTCODE_KEYWORDS.contains(&pair[0]))
        .map(|pair| pair[1])
        .or_else(|| match segments.as_slice() {
            [single] if !SHORTCODE_KEYWORDS.contains(single) => Some(*single),
            _ => None,
        })
        .ok_or(LinkError::NoShortcode)?;

    if !RE_SHORTCODE.is_match(candidate) {
        return Err(LinkError::InvalidShortcode(candidate.to_string()));
    }

    Ok(ReelLink {
        url: cleaned.to_string(),
        shortcode: candidate.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn shortcode(text: &str) -> Result<String, LinkError> {
        extract_shortcode(text).map(|l| l.shortcode)
    }

    #[test]
    fn test_reel_link_with_query() -> Result<(), LinkError> {
        let link = extract_shortcode("https://instagram.com/reel/ABC123?utm=x")?;
        assert_eq!(link.shortcode, "ABC123");
        assert_eq!(link.url, "https://instagram.com/reel/ABC123");
        assert_eq!(link.to_string(), "ABC123 (https://instagram.com/reel/ABC123)");
        Ok(())
    }

    #[test]
    fn test_known_shapes() {
        assert_eq!(
            shortcode("https://www.instagram.com/p/Cx_9-aB/"),
            Ok("Cx_9-aB".to_string())
        );
        assert_eq!(
            shortcode("https://instagram.com/ABC123"),
            Ok("ABC123".to_string())
        );
        assert_eq!(
            shortcode("https://www.instagram.com/someuser/reel/XYZ789/"),
            Ok("XYZ789".to_string())
        );
        assert_eq!(
            shortcode("https://m.instagram.com/reel/Q1/"),
            Ok("Q1".to_string())
        );
    }

    #[test]
    fn test_whitespace_fragment_and_missing_scheme() {
        assert_eq!(
            shortcode("  https://instagram.com/reel/ABC#top \n"),
            Ok("ABC".to_string())
        );
        assert_eq!(
            shortcode("instagram.com/reel/NoScheme"),
            Ok("NoScheme".to_string())
        );
    }

    #[test]
    fn test_rejects_other_hosts() {
        assert!(matches!(
            extract_shortcode("https://youtube.com/watch?v=abc"),
            Err(LinkError::UnsupportedHost(_))
        ));
        // Suffix match must stop at a label boundary
        assert!(matches!(
            extract_shortcode("https://notinstagram.com/reel/ABC"),
            Err(LinkError::UnsupportedHost(_))
        ));
    }

    #[test]
    fn test_rejects_unmatched_paths() {
        assert_eq!(
            extract_shortcode("https://instagram.com/"),
            Err(LinkError::NoShortcode)
        );
        assert_eq!(
            extract_shortcode("https://instagram.com/reel/"),
            Err(LinkError::NoShortcode)
        );
        assert_eq!(
            extract_shortcode("https://instagram.com/user/stories/123"),
            Err(LinkError::NoShortcode)
        );
        assert!(matches!(
            extract_shortcode("https://instagram.com/reel/ab.c"),
            Err(LinkError::InvalidShortcode(_))
        ));
        assert!(matches!(extract_shortcode("   "), Err(LinkError::Malformed(_))));
    }

    #[test]
    fn test_looks_like_link() {
        assert!(looks_like_link("look: https://www.Instagram.com/reel/abc"));
        assert!(!looks_like_link("hello there"));
    }

    proptest! {
        #[test]
        fn prop_supported_shapes_extract_identifier(
            id in "[A-Za-z0-9_-]{1,20}",
            host in prop::sample::select(vec!["instagram.com", "www.instagram.com"]),
            prefix in prop::sample::select(vec!["reel/", "p/", ""]),
            query in "[a-z=&]{0,10}",
        ) {
            prop_assume!(!SHORTCODE_KEYWORDS.contains(&id.as_str()));
            let text = format!("https://{host}/{prefix}{id}/?{query}");
            prop_assert_eq!(shortcode(&text), Ok(id));
        }

        #[test]
        fn prop_foreign_hosts_rejected(
            id in "[A-Za-z0-9_-]{1,20}",
            host in "[a-z]{1,12}\\.(com|net|org)",
        ) {
            prop_assume!(host != "instagram.com");
            let text = format!("https://{host}/reel/{id}");
            prop_assert!(shortcode(&text).is_err());
        }
    }
}
