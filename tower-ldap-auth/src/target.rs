//! Directory URL parsing and host resolution.

use std::net::SocketAddr;

use ldap3_proto::proto::{LdapFilter, LdapSearchScope};
use percent_encoding::percent_decode_str;

use crate::{error::Error, filter, Result};

const DEFAULT_PORT: u16 = 389;

/// A parsed directory URL: the target descriptor for one session.
///
/// Follows the RFC 4516 shape
/// `ldap://host[:port]/[baseDN][?attrs[?scope[?filter]]]`, which is also
/// what OpenLDAP's URL parser accepts.
#[derive(Debug, Clone)]
pub(crate) struct LdapUrl {
    pub(crate) host: String,
    pub(crate) port: u16,
    /// Search base. `None` selects bind-only mode.
    pub(crate) base_dn: Option<String>,
    pub(crate) scope: LdapSearchScope,
    pub(crate) filter: LdapFilter,
    /// Attributes to request; empty means all user attributes.
    pub(crate) attrs: Vec<String>,
}

impl LdapUrl {
    pub(crate) fn parse(raw: &str) -> Result<Self> {
        let url = url::Url::parse(raw).map_err(|err| Error::Url(format!("{raw:?}: {err}")))?;
        if url.scheme() != "ldap" {
            return Err(Error::Url(format!(
                "unsupported scheme \"{}\" in {raw:?}",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| Error::Url(format!("{raw:?}: missing host")))?
            .trim_matches(|c| c == '[' || c == ']')
            .to_string();
        let port = url.port().unwrap_or(DEFAULT_PORT);

        let base_dn = match url.path().trim_start_matches('/') {
            "" => None,
            dn => Some(decode(dn)?),
        };

        // RFC 4516 fields after the base DN: attributes ? scope ? filter.
        let mut fields = url.query().unwrap_or("").splitn(3, '?');

        let attrs = fields
            .next()
            .unwrap_or("")
            .split(',')
            .filter(|attr| !attr.is_empty())
            .map(decode)
            .collect::<Result<Vec<_>>>()?;

        let scope = match fields.next().unwrap_or("") {
            "" | "base" => LdapSearchScope::Base,
            "one" | "onelevel" => LdapSearchScope::OneLevel,
            "sub" | "subtree" => LdapSearchScope::Subtree,
            other => {
                return Err(Error::Url(format!("unknown search scope \"{other}\"")));
            }
        };

        let filter = match fields.next().unwrap_or("") {
            "" => LdapFilter::Present("objectClass".to_string()),
            raw_filter => filter::parse(&decode(raw_filter)?)?,
        };

        Ok(Self {
            host,
            port,
            base_dn,
            scope,
            filter,
            attrs,
        })
    }

    /// Resolves the host to its candidate addresses.
    ///
    /// An empty resolution is a configuration error: there is nothing to
    /// connect to and retrying will not change that.
    pub(crate) async fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let candidates: Vec<_> = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|_| Error::Resolve(self.host.clone()))?
            .collect();
        if candidates.is_empty() {
            return Err(Error::Resolve(self.host.clone()));
        }
        Ok(candidates)
    }
}

fn decode(raw: &str) -> Result<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|err| Error::Url(format!("invalid percent-encoding: {err}")))
}
