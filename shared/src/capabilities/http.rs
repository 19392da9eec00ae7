use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::event::ValidationError;

pub const MAX_URL_LENGTH: usize = 2048;
pub const SUCCESS_STATUS: u16 = 200;

/// A bare form body is what the platform HTTP stack sends when no header is
/// given; we state it explicitly so every shell behaves the same.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A report endpoint that is safe to hand to the HTTP capability.
///
/// `crux_http` parses request URLs eagerly and panics on garbage, so every
/// user-supplied server address goes through here first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    url: String,
    host: String,
}

impl Endpoint {
    pub fn new(url: impl AsRef<str>) -> Result<Self, ValidationError> {
        let raw = url.as_ref();
        let parsed = Self::validate(raw)?;

        let host = parsed
            .host_str()
            .map(str::to_lowercase)
            .ok_or_else(|| ValidationError::InvalidUrl {
                url: Self::truncate_url(raw),
                reason: "URL must have a host".to_string(),
            })?;

        Ok(Self {
            url: parsed.to_string(),
            host,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn validate(url: &str) -> Result<Url, ValidationError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidUrl {
                url: url.to_string(),
                reason: "URL cannot be empty".to_string(),
            });
        }

        if url.len() > MAX_URL_LENGTH {
            return Err(ValidationError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: format!("URL exceeds maximum length of {MAX_URL_LENGTH} bytes"),
            });
        }

        let parsed = Url::parse(trimmed).map_err(|e| ValidationError::InvalidUrl {
            url: Self::truncate_url(url),
            reason: e.to_string(),
        })?;

        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ValidationError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: format!("invalid scheme '{scheme}', only 'http' and 'https' are allowed"),
            });
        }

        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(ValidationError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: "URL must have a host".to_string(),
            });
        }

        Ok(parsed)
    }

    fn truncate_url(url: &str) -> String {
        if url.len() <= 100 {
            url.to_string()
        } else {
            let cut = (0..=100).rev().find(|i| url.is_char_boundary(*i)).unwrap_or(0);
            format!("{}...", &url[..cut])
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("transport error: {reason}")]
    Transport { reason: String },

    #[error("server answered with status {status}")]
    UnexpectedStatus { status: u16 },
}

impl HttpError {
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status } => Some(*status),
            Self::Transport { .. } => None,
        }
    }
}

/// Only a plain 200 counts as delivered; anything else is worth a log line.
pub fn check_status(status: u16) -> Result<(), HttpError> {
    if status == SUCCESS_STATUS {
        Ok(())
    } else {
        Err(HttpError::UnexpectedStatus { status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation_empty() {
        assert!(Endpoint::new("").is_err());
    }

    #[test]
    fn test_url_validation_whitespace() {
        assert!(Endpoint::new("   ").is_err());
    }

    #[test]
    fn test_url_validation_invalid_scheme() {
        let result = Endpoint::new("ftp://example.com/report");
        assert!(matches!(result, Err(ValidationError::InvalidUrl { .. })));
    }

    #[test]
    fn test_url_validation_javascript() {
        assert!(Endpoint::new("javascript:alert(1)").is_err());
    }

    #[test]
    fn test_url_validation_no_scheme() {
        assert!(Endpoint::new("the.link.here").is_err());
    }

    #[test]
    fn test_url_validation_garbage() {
        assert!(Endpoint::new("http://").is_err());
        assert!(Endpoint::new("not a url").is_err());
    }

    #[test]
    fn test_url_validation_valid() {
        let endpoint = Endpoint::new("http://the.link.here").unwrap();
        assert_eq!(endpoint.host(), "the.link.here");
        assert_eq!(endpoint.as_str(), "http://the.link.here/");

        let endpoint = Endpoint::new("https://Example.COM:8443/track?x=1").unwrap();
        assert_eq!(endpoint.host(), "example.com");
    }

    #[test]
    fn test_url_validation_private_hosts_allowed() {
        // Self-hosted collectors usually live on the LAN.
        assert!(Endpoint::new("http://192.168.1.20:8080/report").is_ok());
        assert!(Endpoint::new("http://localhost:3000").is_ok());
    }

    #[test]
    fn test_url_validation_trims_surrounding_whitespace() {
        let endpoint = Endpoint::new("  https://example.com/r  ").unwrap();
        assert_eq!(endpoint.as_str(), "https://example.com/r");
    }

    #[test]
    fn test_url_validation_too_long() {
        let long_url = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH));
        let err = Endpoint::new(long_url).unwrap_err();
        match err {
            ValidationError::InvalidUrl { url, .. } => assert!(url.ends_with("...")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(200).is_ok());
        assert_eq!(
            check_status(201),
            Err(HttpError::UnexpectedStatus { status: 201 })
        );
        assert_eq!(check_status(500).unwrap_err().status(), Some(500));
        assert_eq!(HttpError::transport("dns").status(), None);
    }
}
