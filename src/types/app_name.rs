// ABOUTME: Application name validation following RFC 1123 label rules.
// ABOUTME: The name keys the image tag, container names, and discovery labels.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppNameError {
    #[error("application name cannot be empty")]
    Empty,

    #[error("application name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("application name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("application name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("application name must be lowercase")]
    NotLowercase,

    #[error("invalid character in application name: '{0}'")]
    InvalidChar(char),
}

/// The identity of a deployed application.
///
/// Every image and container this controller creates is tagged or labeled
/// with this name, and discovery queries filter on an exact match of it,
/// so the character set is restricted to what image tags, container names,
/// and label values all accept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppName(String);

impl AppName {
    pub fn new(value: &str) -> Result<Self, AppNameError> {
        if value.is_empty() {
            return Err(AppNameError::Empty);
        }

        if value.len() > 63 {
            return Err(AppNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(AppNameError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(AppNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(AppNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(AppNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The image tag this application builds into. One tag per application,
    /// overwritten by every build.
    pub fn image_tag(&self) -> String {
        format!("slipway/{}", self.0)
    }

    /// The image reference containers are created from.
    pub fn image_ref(&self) -> String {
        format!("slipway/{}:latest", self.0)
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
