//! Extraction of HTTP Basic credentials.

use http::{header, HeaderMap};
use secrecy::SecretString;

/// Credentials recovered from the `Authorization` header.
#[derive(Debug, Clone)]
pub(crate) struct BasicCredentials {
    pub(crate) username: String,
    pub(crate) password: SecretString,
}

impl BasicCredentials {
    /// Parses `Authorization: Basic <base64(user:password)>`.
    ///
    /// A missing or malformed header, an empty username and an empty
    /// password all come back as `None`, which the caller treats as "no
    /// credentials supplied" and answers with a challenge before any
    /// directory work happens.
    pub(crate) fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let (scheme, payload) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("Basic") {
            return None;
        }
        let decoded = base64::decode(payload.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self {
            username: username.to_string(),
            password: SecretString::new(password.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use http::header::AUTHORIZATION;
    use secrecy::ExposeSecret;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn parses_credentials() {
        // alice:secret
        let creds = BasicCredentials::from_headers(&headers("Basic YWxpY2U6c2VjcmV0")).unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password.expose_secret(), "secret");
    }

    #[test]
    fn scheme_is_case_insensitive() {
        assert!(BasicCredentials::from_headers(&headers("basic YWxpY2U6c2VjcmV0")).is_some());
    }

    #[test]
    fn password_may_contain_colons() {
        // alice:se:cr:et
        let creds = BasicCredentials::from_headers(&headers("Basic YWxpY2U6c2U6Y3I6ZXQ=")).unwrap();
        assert_eq!(creds.password.expose_secret(), "se:cr:et");
    }

    #[test]
    fn rejects_missing_header() {
        assert!(BasicCredentials::from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(BasicCredentials::from_headers(&headers("Bearer abcdef")).is_none());
    }

    #[test]
    fn rejects_undecodable_payload() {
        assert!(BasicCredentials::from_headers(&headers("Basic @@@@")).is_none());
        // no colon inside: "alice"
        assert!(BasicCredentials::from_headers(&headers("Basic YWxpY2U=")).is_none());
    }

    #[test]
    fn rejects_empty_password() {
        // alice:
        assert!(BasicCredentials::from_headers(&headers("Basic YWxpY2U6")).is_none());
        // :secret
        assert!(BasicCredentials::from_headers(&headers("Basic OnNlY3JldA==")).is_none());
    }
}
