//! Application identifier types and parsing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A reverse-DNS application identifier (`com.example.app`).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    /// Parse an app id, validating format.
    ///
    /// Requires two or more dot-separated segments; each segment starts
    /// with an ASCII letter or digit and may contain `-` and `_`.
    pub fn parse(id: &str) -> crate::Result<Self> {
        if id.is_empty() {
            return Err(crate::Error::InvalidAppId("app id is empty".to_string()));
        }

        if !id.is_ascii() {
            return Err(crate::Error::InvalidAppId(
                "app id contains non-ASCII characters".to_string(),
            ));
        }

        let segments: Vec<&str> = id.split('.').collect();
        if segments.len() < 2 {
            return Err(crate::Error::InvalidAppId(format!(
                "expected reverse-DNS form like com.example.app, got '{id}'"
            )));
        }

        for segment in segments {
            let mut chars = segment.chars();
            match chars.next() {
                Some(c) if c.is_ascii_alphanumeric() => {}
                Some(c) => {
                    return Err(crate::Error::InvalidAppId(format!(
                        "segment must start with a letter or digit, got '{c}'"
                    )));
                }
                None => {
                    return Err(crate::Error::InvalidAppId(format!(
                        "empty segment in '{id}'"
                    )));
                }
            }
            for c in chars {
                if !matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_') {
                    return Err(crate::Error::InvalidAppId(format!(
                        "invalid character in app id: {c}"
                    )));
                }
            }
        }

        Ok(Self(id.to_string()))
    }

    /// Get the id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppId({self})")
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
