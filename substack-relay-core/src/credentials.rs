use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

static HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*(?::\d{1,5})?$")
        .expect("host pattern is valid")
});

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("api key is missing")]
    MissingApiKey,
    #[error("publication address is missing")]
    MissingPublicationAddress,
    #[error("invalid publication address `{0}`, expected a host such as `example.substack.com`")]
    InvalidPublicationAddress(String),
}

/// Session credentials for one publication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Publication host, e.g. `example.substack.com`; a scheme and trailing slash are tolerated.
    pub publication_address: String,
    /// Value of the `substack.sid` session cookie.
    pub api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("publication_address", &self.publication_address)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(publication_address: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            publication_address: publication_address.into(),
            api_key: api_key.into(),
        }
    }

    pub fn validate(&self) -> Result<(), CredentialError> {
        if self.api_key.trim().is_empty() {
            return Err(CredentialError::MissingApiKey);
        }
        self.publication_url().map(|_| ())
    }

    /// Normalised publication URL: `https://<host>` unless an explicit scheme was given.
    pub fn publication_url(&self) -> Result<String, CredentialError> {
        let address = self.publication_address.trim();
        if address.is_empty() {
            return Err(CredentialError::MissingPublicationAddress);
        }
        let (scheme, rest) = match address.split_once("://") {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("http") => ("http", rest),
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("https") => ("https", rest),
            Some(_) => {
                return Err(CredentialError::InvalidPublicationAddress(
                    address.to_string(),
                ))
            }
            None => ("https", address),
        };
        let host = rest.trim_end_matches('/');
        if !HOST.is_match(host) {
            return Err(CredentialError::InvalidPublicationAddress(
                address.to_string(),
            ));
        }
        Ok(format!("{scheme}://{}", host.to_ascii_lowercase()))
    }
}
