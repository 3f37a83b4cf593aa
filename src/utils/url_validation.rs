//! URL validation for configured endpoints.
//!
//! Endpoint URLs must:
//! - Be properly formatted `http` or `https` URLs with a host
//! - Use HTTPS when they carry credentials, unless the host is loopback
//!   (a token server on the same machine)

use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be http or https, got: {0}")]
    UnsupportedScheme(String),

    #[error("URL scheme must be HTTPS for non-loopback host {host}, got: {scheme}")]
    HttpsRequired { scheme: String, host: String },

    #[error("URL must have a host")]
    MissingHost,
}

/// Checks if a URL host is the local machine (`localhost`, 127.0.0.0/8, ::1).
pub fn is_loopback_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Host::Ipv4(ip) => IpAddr::V4(*ip).is_loopback(),
        Host::Ipv6(ip) => IpAddr::V6(*ip).is_loopback(),
    }
}

/// Validates an endpoint URL.
///
/// # Arguments
/// * `url` - The URL string to validate
/// * `require_https` - Reject plain HTTP unless the host is loopback
///
/// # Returns
/// * `Ok(Url)` with the parsed URL
/// * `Err(UrlValidationError)` describing the first failed check
pub fn validate_endpoint_url(url: &str, require_https: bool) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;

    let scheme = parsed.scheme().to_string();
    if scheme != "http" && scheme != "https" {
        return Err(UrlValidationError::UnsupportedScheme(scheme));
    }

    let host = parsed.host().ok_or(UrlValidationError::MissingHost)?;

    if require_https && scheme != "https" && !is_loopback_host(&host) {
        return Err(UrlValidationError::HttpsRequired {
            scheme,
            host: host.to_string(),
        });
    }

    Ok(parsed)
}
