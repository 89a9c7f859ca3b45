use crate::session::Decision;

/// Errors produced while driving an authentication session.
///
/// Only the coarse [`Decision`](crate::Decision) derived from a variant
/// crosses the middleware boundary; the variant itself is logged so operators
/// can see the directory error text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The directory URL could not be parsed.
    #[error("invalid LDAP URL: {0}")]
    Url(String),

    /// The search filter in the directory URL is malformed or unsupported.
    #[error("invalid search filter: {0}")]
    Filter(String),

    /// The directory host did not resolve to any address.
    #[error("could not resolve LDAP host \"{0}\"")]
    Resolve(String),

    /// Connecting to or talking over the transport failed.
    #[error("LDAP transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The directory did not answer within the configured bound.
    #[error("LDAP operation timed out")]
    Timeout,

    /// The directory answered with a rejection or with something other than
    /// what the current operation expects.
    #[error("LDAP protocol error: {0}")]
    Protocol(String),

    /// An outbound header could not be materialized from a directory
    /// attribute.
    #[error("invalid header derived from directory attribute: {0}")]
    Header(#[from] http::Error),
}

impl Error {
    /// The decision a terminal error maps to.
    ///
    /// Protocol rejections are plausible outcomes of wrong credentials, so
    /// they earn a challenge. Transport and header failures say nothing about
    /// the credentials and never do.
    pub(crate) fn decision(&self) -> Decision {
        match self {
            Error::Url(_) | Error::Filter(_) | Error::Resolve(_) => Decision::ConfigError,
            Error::Transport(_) | Error::Timeout | Error::Header(_) => Decision::InternalError,
            Error::Protocol(_) => Decision::Unauthorized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_never_challenge() {
        assert_eq!(
            Error::Url("nonsense".into()).decision(),
            Decision::ConfigError
        );
        assert_eq!(
            Error::Resolve("nowhere.invalid".into()).decision(),
            Decision::ConfigError
        );
    }

    #[test]
    fn transport_errors_are_internal() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(Error::Transport(io).decision(), Decision::InternalError);
        assert_eq!(Error::Timeout.decision(), Decision::InternalError);
    }

    #[test]
    fn protocol_errors_challenge() {
        assert_eq!(
            Error::Protocol("bind failed".into()).decision(),
            Decision::Unauthorized
        );
    }
}
