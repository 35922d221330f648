//! Container image references
//!
//! Parses references the way the distribution reference grammar does when
//! normalizing user input: `ubuntu` becomes `docker.io/library/ubuntu`,
//! `index.docker.io` collapses to `docker.io`, and any explicit registry is
//! kept as written. No default tag is added.

use crate::{Error, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Registry assumed when a reference names none
pub const DEFAULT_DOMAIN: &str = "docker.io";
const LEGACY_DEFAULT_DOMAIN: &str = "index.docker.io";
const OFFICIAL_REPO_PREFIX: &str = "library/";
const NAME_TOTAL_LENGTH_MAX: usize = 255;

#[allow(clippy::expect_used)]
fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex is valid")
}

static DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    regex(
        r"^(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])(?:\.(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]))*(?::[0-9]+)?$",
    )
});
static PATH_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| regex(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$"));
static TAG: LazyLock<Regex> = LazyLock::new(|| regex(r"^[\w][\w.-]{0,127}$"));
static DIGEST: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"^[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*:[0-9a-fA-F]{32,}$")
});
static SHA256_HEX: LazyLock<Regex> = LazyLock::new(|| regex(r"^[a-f0-9]{64}$"));

/// A normalized image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    domain: String,
    path: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageReference {
    /// Parse and normalize a reference such as `golang:1.22` or
    /// `ghcr.io/org/tool@sha256:...`.
    pub fn parse_normalized(input: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::invalid_reference(input, reason);

        if input.is_empty() {
            return Err(invalid("repository name must have at least one component"));
        }
        if SHA256_HEX.is_match(input) {
            return Err(invalid(
                "64-byte hexadecimal strings are reserved for image IDs",
            ));
        }

        let (domain, remainder) = split_domain(input);

        let (remainder, digest) = match remainder.split_once('@') {
            Some((rest, digest)) => (rest, Some(digest)),
            None => (remainder.as_str(), None),
        };
        let (path, tag) = match remainder.rsplit_once(':') {
            Some((path, tag)) if !tag.contains('/') => (path, Some(tag)),
            _ => (remainder, None),
        };

        if path.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(invalid("repository name must be lowercase"));
        }
        if !DOMAIN.is_match(&domain) {
            return Err(invalid("invalid registry domain"));
        }
        if path.is_empty() || !path.split('/').all(|c| PATH_COMPONENT.is_match(c)) {
            return Err(invalid("invalid repository path"));
        }
        if domain.len() + 1 + path.len() > NAME_TOTAL_LENGTH_MAX {
            return Err(invalid("repository name must not be more than 255 characters"));
        }
        if let Some(tag) = tag
            && !TAG.is_match(tag)
        {
            return Err(invalid("invalid tag format"));
        }
        if let Some(digest) = digest {
            validate_digest(digest).map_err(invalid)?;
        }

        Ok(Self {
            domain,
            path: path.to_string(),
            tag: tag.map(String::from),
            digest: digest.map(String::from),
        })
    }

    /// Registry host, e.g. `docker.io`
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Repository path, e.g. `library/ubuntu`
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Tag, if the reference has one
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Digest, if the reference is pinned
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Fully qualified repository name without tag or digest
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}/{}", self.domain, self.path)
    }
}

fn split_domain(input: &str) -> (String, String) {
    let (mut domain, mut remainder) = match input.split_once('/') {
        Some((first, rest))
            if first.contains(['.', ':'])
                || first == "localhost"
                || first.to_lowercase() != first =>
        {
            (first.to_string(), rest.to_string())
        }
        _ => (DEFAULT_DOMAIN.to_string(), input.to_string()),
    };

    if domain == LEGACY_DEFAULT_DOMAIN {
        domain = DEFAULT_DOMAIN.to_string();
    }
    if domain == DEFAULT_DOMAIN && !remainder.split('@').next().unwrap_or_default().contains('/')
    {
        remainder = format!("{OFFICIAL_REPO_PREFIX}{remainder}");
    }
    (domain, remainder)
}

fn validate_digest(digest: &str) -> std::result::Result<(), &'static str> {
    if !DIGEST.is_match(digest) {
        return Err("invalid digest format");
    }
    if let Some(hex) = digest.strip_prefix("sha256:")
        && !SHA256_HEX.is_match(hex)
    {
        return Err("sha256 digests must be 64 lowercase hex characters");
    }
    Ok(())
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.path)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

impl FromStr for ImageReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_normalized(s)
    }
}
