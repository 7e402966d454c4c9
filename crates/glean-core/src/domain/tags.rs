//! Validated upload tags
//!
//! The debug view tag becomes the `X-Debug-ID` header and source tags the
//! `X-Source-Tags` header of every ping assembled after they are set.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Maximum length of a debug tag or of a single source tag
pub const MAX_TAG_LENGTH: usize = 20;
/// Maximum number of source tags
pub const MAX_SOURCE_TAGS: usize = 5;
/// Prefix reserved for tags set by the SDK itself
const RESERVED_TAG_PREFIX: &str = "glean";

fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= MAX_TAG_LENGTH
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ============================================================================
// DebugTag
// ============================================================================

/// Debug view tag: 1 to 20 characters of `[A-Za-z0-9_-]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DebugTag(String);

impl DebugTag {
    /// Create a new DebugTag
    ///
    /// # Errors
    /// Returns `DomainError::InvalidDebugTag` if the tag does not match the pattern
    pub fn new(tag: String) -> Result<Self, DomainError> {
        if !is_valid_tag(&tag) {
            return Err(DomainError::InvalidDebugTag(tag));
        }
        Ok(Self(tag))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DebugTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DebugTag {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for DebugTag {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DebugTag> for String {
    fn from(tag: DebugTag) -> Self {
        tag.0
    }
}

// ============================================================================
// SourceTags
// ============================================================================

/// One to five source tags, in the order given, without duplicates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceTags(Vec<String>);

impl SourceTags {
    /// Validates a tag list
    ///
    /// # Errors
    /// Returns `DomainError::InvalidSourceTags` if the list is empty, has more
    /// than five tags, or contains a tag that is malformed or reserved.
    pub fn new(tags: Vec<String>) -> Result<Self, DomainError> {
        if tags.is_empty() {
            return Err(DomainError::InvalidSourceTags("no tags given".into()));
        }
        if tags.len() > MAX_SOURCE_TAGS {
            return Err(DomainError::InvalidSourceTags(format!(
                "{} tags given, at most {MAX_SOURCE_TAGS} allowed",
                tags.len()
            )));
        }

        let mut unique: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            if !is_valid_tag(&tag) {
                return Err(DomainError::InvalidSourceTags(format!(
                    "malformed tag: {tag}"
                )));
            }
            if tag.starts_with(RESERVED_TAG_PREFIX) {
                return Err(DomainError::InvalidSourceTags(format!(
                    "reserved tag: {tag}"
                )));
            }
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }
        Ok(Self(unique))
    }

    pub fn tags(&self) -> &[String] {
        &self.0
    }

    /// Value of the `X-Source-Tags` header
    pub fn header_value(&self) -> String {
        self.0.join(",")
    }
}
