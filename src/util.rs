use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error(transparent)]
    Parse(#[from] url::ParseError),

    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),
}

/// Normalize an absolute url into the form the frontier keys on.
///
/// Only http(s) urls are accepted, the fragment is dropped.
pub fn normalize_url(url: &str) -> Result<String, UrlError> {
    let mut url_ = Url::parse(url)?;
    if url_.scheme() != "http" && url_.scheme() != "https" {
        return Err(UrlError::UnsupportedScheme(url_.scheme().to_owned()));
    }
    url_.set_fragment(None);
    Ok(url_.to_string())
}

pub fn get_host(url: &str) -> Option<String> {
    let url_ = Url::parse(url).ok()?;
    url_.host_str().map(|x| x.to_owned())
}

/// Stable 64-bit key for a normalized url (leading bytes of its SHA-256).
pub fn url_key(url: &str) -> u64 {
    let digest = Sha256::digest(url.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}
