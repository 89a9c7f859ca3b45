//! The directory transport and protocol handle.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use ldap3_proto::proto::{
    LdapBindCred, LdapBindRequest, LdapDerefAliases, LdapMsg, LdapOp, LdapSearchRequest,
};
use ldap3_proto::LdapCodec;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

use crate::{error::Error, target::LdapUrl, Result};

/// Uniform pick over the resolved candidate addresses.
pub(crate) fn pick_index(candidates: usize) -> usize {
    rand::thread_rng().gen_range(0..candidates)
}

/// An open directory connection plus the identity of the one operation that
/// may be outstanding on it.
///
/// Message ids are allocated here, and `pending` is only replaced once the
/// previous operation has received its terminal response. That keeps the
/// one-operation-at-a-time rule structural rather than advisory.
pub(crate) struct LdapConnection {
    framed: Framed<TcpStream, LdapCodec>,
    next_msgid: i32,
    pending: Option<i32>,
    timeout: Duration,
}

impl LdapConnection {
    /// Connects to one of the candidate addresses, chosen uniformly at
    /// random, within the configured bound.
    pub(crate) async fn connect(candidates: &[SocketAddr], bound: Duration) -> Result<Self> {
        let addr = candidates[pick_index(candidates.len())];
        tracing::debug!(%addr, "connecting to LDAP server");
        let stream = timeout(bound, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout)??;
        Ok(Self {
            framed: Framed::new(stream, LdapCodec::default()),
            next_msgid: 1,
            pending: None,
            timeout: bound,
        })
    }

    /// The in-flight operation, if any.
    pub(crate) fn pending(&self) -> Option<i32> {
        self.pending
    }

    /// Marks the in-flight operation as answered, allowing a new submission.
    pub(crate) fn complete(&mut self) {
        self.pending = None;
    }

    async fn submit(&mut self, op: LdapOp) -> Result<i32> {
        debug_assert!(self.pending.is_none(), "operation already in flight");
        let msgid = self.next_msgid;
        self.next_msgid += 1;
        self.pending = Some(msgid);
        self.framed
            .send(LdapMsg {
                msgid,
                op,
                ctrl: vec![],
            })
            .await?;
        Ok(msgid)
    }

    /// Submits a simple bind for the rendered DN and the Basic password.
    pub(crate) async fn simple_bind(&mut self, dn: &str, password: &SecretString) -> Result<i32> {
        self.submit(LdapOp::BindRequest(LdapBindRequest {
            dn: dn.to_string(),
            cred: LdapBindCred::Simple(password.expose_secret().clone()),
        }))
        .await
    }

    /// Submits the search described by the target descriptor.
    pub(crate) async fn search(&mut self, target: &LdapUrl) -> Result<i32> {
        self.submit(LdapOp::SearchRequest(LdapSearchRequest {
            base: target.base_dn.clone().unwrap_or_default(),
            scope: target.scope.clone(),
            aliases: LdapDerefAliases::Never,
            sizelimit: 0,
            timelimit: 0,
            typesonly: false,
            filter: target.filter.clone(),
            attrs: target.attrs.clone(),
        }))
        .await
    }

    /// Waits for the next protocol message, within the configured bound.
    ///
    /// A closed or failed transport surfaces here; short of the bound
    /// expiring there is no other way to discover an unresponsive server
    /// mid-operation.
    pub(crate) async fn next_message(&mut self) -> Result<LdapMsg> {
        match timeout(self.timeout, self.framed.next()).await {
            Err(_) => Err(Error::Timeout),
            Ok(None) => Err(Error::Transport(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by LDAP server",
            ))),
            Ok(Some(msg)) => Ok(msg?),
        }
    }

    /// Sends a best-effort unbind and drops the transport.
    ///
    /// An operation still in flight is abandoned locally, not cancelled on
    /// the wire.
    pub(crate) async fn unbind(mut self) {
        let unbind = LdapMsg {
            msgid: self.next_msgid,
            op: LdapOp::UnbindRequest,
            ctrl: vec![],
        };
        if let Err(err) = self.framed.send(unbind).await {
            tracing::debug!(%err, "failed to send unbind during teardown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_index_stays_in_bounds() {
        for candidates in 1..=5 {
            for _ in 0..200 {
                assert!(pick_index(candidates) < candidates);
            }
        }
    }
}
