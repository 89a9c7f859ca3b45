//! The per-request authentication session.

use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use ldap3_proto::proto::{
    LdapBindResponse, LdapMsg, LdapOp, LdapResult as LdapOperationResult, LdapResultCode,
    LdapSearchResultEntry,
};

use crate::{
    config::LdapAuthConfig, connection::LdapConnection, creds::BasicCredentials, error::Error,
    target::LdapUrl, Result,
};

/// The decision a finished session reports to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The credentials check out; the request may proceed.
    Continue,
    /// The directory rejected the credentials or found no matching entry;
    /// the client should be challenged.
    Unauthorized,
    /// Something failed that says nothing about the credentials.
    InternalError,
    /// The directory URL or its filter is unusable.
    ConfigError,
}

/// Progress of a session through the protocol exchange.
///
/// Transitions are monotonic; `Finalized` is terminal and the only phase in
/// which a decision is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Created,
    Connecting,
    Binding,
    Searching,
    Finalized,
}

/// One authentication exchange against the directory.
///
/// The session exclusively owns everything it acquires: the resolved target
/// descriptor, the transport and the protocol handle. All of it is released
/// by [`teardown`](Session::teardown), which every terminal path runs
/// exactly once and which later calls find already empty.
pub(crate) struct Session {
    phase: Phase,
    config: Arc<LdapAuthConfig>,
    credentials: BasicCredentials,
    target: Option<LdapUrl>,
    connection: Option<LdapConnection>,
    last_response: Option<LdapMsg>,
    entries_seen: usize,
}

impl Session {
    pub(crate) fn new(config: Arc<LdapAuthConfig>, credentials: BasicCredentials) -> Self {
        Self {
            phase: Phase::Created,
            config,
            credentials,
            target: None,
            connection: None,
            last_response: None,
            entries_seen: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    /// Drives the session to its terminal decision, injecting any discovered
    /// directory attributes into `headers` as they arrive.
    ///
    /// Teardown runs before this returns, on success and failure alike.
    pub(crate) async fn authenticate(&mut self, headers: &mut HeaderMap) -> Decision {
        let decision = match self.run(headers).await {
            Ok(decision) => decision,
            Err(err) => {
                let decision = err.decision();
                match decision {
                    Decision::Unauthorized => {
                        tracing::warn!(user = %self.credentials.username, %err, "LDAP authentication rejected")
                    }
                    _ => tracing::error!(%err, "LDAP authentication failed"),
                }
                decision
            }
        };
        self.phase = Phase::Finalized;
        self.teardown().await;
        decision
    }

    async fn run(&mut self, headers: &mut HeaderMap) -> Result<Decision> {
        let rendered = self.config.url.render(&self.credentials.username);
        let target = LdapUrl::parse(&rendered)?;
        let candidates = target.resolve().await?;
        self.target = Some(target);

        self.phase = Phase::Connecting;
        let mut connection = LdapConnection::connect(&candidates, self.config.timeout).await?;

        self.phase = Phase::Binding;
        let bind_dn = self.config.bind_dn.render(&self.credentials.username);
        tracing::debug!(dn = %bind_dn, "submitting simple bind");
        connection
            .simple_bind(&bind_dn, &self.credentials.password)
            .await?;
        self.connection = Some(connection);

        loop {
            let msg = match self.connection.as_mut() {
                Some(connection) => connection.next_message().await?,
                None => return Err(Error::Protocol("connection torn down mid-session".into())),
            };
            // Retained until replaced by the next exchange or by teardown.
            self.last_response = Some(msg.clone());

            let expected = self.connection.as_ref().and_then(LdapConnection::pending);
            if expected != Some(msg.msgid) {
                return Err(Error::Protocol(format!(
                    "response for unexpected message id {}",
                    msg.msgid
                )));
            }

            match (self.phase, msg.op) {
                (Phase::Binding, LdapOp::BindResponse(response)) => {
                    if let Some(decision) = self.on_bind_response(response).await? {
                        return Ok(decision);
                    }
                }
                (Phase::Searching, LdapOp::SearchResultEntry(entry)) => {
                    self.on_search_entry(entry, headers)?;
                }
                (Phase::Searching, LdapOp::SearchResultReference(_)) => {
                    return Err(Error::Protocol("unexpected search reference".into()));
                }
                (Phase::Searching, LdapOp::SearchResultDone(done)) => {
                    return self.on_search_done(done);
                }
                (phase, _) => {
                    return Err(Error::Protocol(format!(
                        "unexpected LDAP message in phase {phase:?}"
                    )));
                }
            }
        }
    }

    /// Handles the bind outcome: finalize in bind-only mode, otherwise move
    /// on to the search.
    async fn on_bind_response(&mut self, response: LdapBindResponse) -> Result<Option<Decision>> {
        if let Some(connection) = self.connection.as_mut() {
            connection.complete();
        }
        if response.res.code != LdapResultCode::Success {
            return Err(Error::Protocol(format!(
                "bind failed: {:?} [{}]",
                response.res.code, response.res.message
            )));
        }
        let target = match self.target.as_ref() {
            Some(target) if target.base_dn.is_some() => target.clone(),
            // Bind-only mode: a successful bind is the whole decision.
            _ => return Ok(Some(Decision::Continue)),
        };

        self.phase = Phase::Searching;
        tracing::debug!(
            base = target.base_dn.as_deref().unwrap_or_default(),
            "submitting search"
        );
        match self.connection.as_mut() {
            Some(connection) => connection.search(&target).await?,
            None => return Err(Error::Protocol("connection torn down mid-session".into())),
        };
        Ok(None)
    }

    /// Materializes one directory entry as request headers, one header per
    /// attribute value, named `<prefix><attribute>`.
    fn on_search_entry(
        &mut self,
        entry: LdapSearchResultEntry,
        headers: &mut HeaderMap,
    ) -> Result<()> {
        self.entries_seen += 1;
        let prefix = self.config.header.render(&self.credentials.username);
        for attribute in entry.attributes {
            let name = HeaderName::from_bytes(format!("{prefix}{}", attribute.atype).as_bytes())
                .map_err(http::Error::from)?;
            for value in attribute.vals {
                let value = HeaderValue::from_bytes(&value).map_err(http::Error::from)?;
                headers.append(name.clone(), value);
            }
        }
        Ok(())
    }

    fn on_search_done(&mut self, done: LdapOperationResult) -> Result<Decision> {
        if let Some(connection) = self.connection.as_mut() {
            connection.complete();
        }
        if done.code != LdapResultCode::Success {
            return Err(Error::Protocol(format!(
                "search failed: {:?} [{}]",
                done.code, done.message
            )));
        }
        if self.entries_seen == 0 {
            return Err(Error::Protocol("search returned no entries".into()));
        }
        Ok(Decision::Continue)
    }

    /// Releases everything the session acquired: the last response, the
    /// target descriptor, then transport and protocol handle together.
    ///
    /// Safe to call more than once; later calls find nothing left to
    /// release. Dropping an un-torn-down session still closes the socket,
    /// so an aborted request cannot leak the connection either.
    pub(crate) async fn teardown(&mut self) {
        self.last_response = None;
        self.target = None;
        if let Some(connection) = self.connection.take() {
            connection.unbind().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn credentials() -> BasicCredentials {
        BasicCredentials {
            username: "alice".to_string(),
            password: SecretString::new("secret".to_string()),
        }
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let config = LdapAuthConfig::new(
            "ldap://127.0.0.1:3890/dc=example,dc=org",
            "uid={username},dc=example,dc=org",
            "Restricted",
        );
        let mut session = Session::new(Arc::new(config), credentials());
        session.phase = Phase::Finalized;
        session.teardown().await;
        assert!(session.target.is_none());
        assert!(session.connection.is_none());
        assert!(session.last_response.is_none());

        // A second teardown has nothing left to release and must not fault.
        session.teardown().await;
        assert_eq!(session.phase(), Phase::Finalized);
    }

    #[tokio::test]
    async fn unresolvable_host_is_config_error() {
        let config = LdapAuthConfig::new(
            "ldap://this-host-does-not-exist.invalid/dc=example",
            "uid={username}",
            "Restricted",
        );
        let mut session = Session::new(Arc::new(config), credentials());
        let mut headers = HeaderMap::new();
        assert_eq!(
            session.authenticate(&mut headers).await,
            Decision::ConfigError
        );
        assert_eq!(session.phase(), Phase::Finalized);
        assert!(headers.is_empty());
    }

    #[tokio::test]
    async fn unsupported_scheme_is_config_error() {
        let config = LdapAuthConfig::new("ldaps://secure.example", "uid={username}", "Restricted");
        let mut session = Session::new(Arc::new(config), credentials());
        let mut headers = HeaderMap::new();
        assert_eq!(
            session.authenticate(&mut headers).await,
            Decision::ConfigError
        );
    }
}
