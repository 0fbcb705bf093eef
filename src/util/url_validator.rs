use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during feed URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a configured feed URL.
///
/// Only `http` and `https` are accepted. Unless `allow_private` is set, hosts
/// on localhost, RFC 1918, link-local or unique-local ranges are rejected so a
/// shared config cannot point the bot at internal services.
///
/// # Examples
///
/// ```
/// use feedwatch::util::validate_feed_url;
///
/// assert!(validate_feed_url("https://example.com/items.json", false).is_ok());
/// assert!(validate_feed_url("http://192.168.1.1/items.json", false).is_err());
/// assert!(validate_feed_url("http://192.168.1.1/items.json", true).is_ok());
/// assert!(validate_feed_url("file:///etc/passwd", true).is_err());
/// ```
pub fn validate_feed_url(url_str: &str, allow_private: bool) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;
    if allow_private {
        return Ok(url);
    }

    if host.eq_ignore_ascii_case("localhost") {
        return Err(UrlValidationError::Localhost);
    }

    // IPv6 hosts come back bracketed
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(ip) = bare.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // fc00::/7
                || (first & 0xffc0) == 0xfe80 // fe80::/10
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_urls_accepted() {
        assert!(validate_feed_url("https://example.com/items.json", false).is_ok());
        assert!(validate_feed_url("http://data.example.org:8443/a.csv", false).is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_feed_url("ftp://example.com", false),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_feed_url("file:///tmp/items.json", true).is_err());
    }

    #[test]
    fn test_unparseable() {
        assert!(matches!(
            validate_feed_url("not a url", false),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_localhost_rejected() {
        assert!(matches!(
            validate_feed_url("http://localhost/feed", false),
            Err(UrlValidationError::Localhost)
        ));
        assert!(validate_feed_url("http://127.0.0.1/feed", false).is_err());
        assert!(validate_feed_url("http://[::1]/feed", false).is_err());
    }

    #[test]
    fn test_private_ranges_rejected() {
        for url in [
            "http://10.0.0.1/feed",
            "http://172.16.0.1/feed",
            "http://192.168.1.1:8080/feed",
            "http://169.254.1.1/feed",
            "http://0.0.0.0/feed",
            "http://[fe80::1]/feed",
            "http://[fd00::1]/feed",
        ] {
            assert!(
                matches!(
                    validate_feed_url(url, false),
                    Err(UrlValidationError::PrivateIp(_) | UrlValidationError::Localhost)
                ),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_allow_private_opt_in() {
        assert!(validate_feed_url("http://127.0.0.1:9000/feed", true).is_ok());
        assert!(validate_feed_url("http://localhost/feed", true).is_ok());
    }
}
