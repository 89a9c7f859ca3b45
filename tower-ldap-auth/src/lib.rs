//! LDAP-backed HTTP Basic authentication for Tower services.
//!
//! This crate provides a Tower middleware which authenticates the Basic
//! credentials of each inbound request against an LDAP directory. For every
//! request it:
//!
//! 1. Extracts the username and password from the `Authorization` header,
//! 2. Resolves the configured directory URL and opens a connection,
//! 3. Performs a simple bind as a DN rendered from the username,
//! 4. Optionally searches under a base DN and injects the attributes of the
//!    matching entry as request headers for downstream services,
//! 5. Answers rejected requests with a `WWW-Authenticate` challenge.
//!
//! The whole exchange is asynchronous and owned by the request: nothing is
//! pooled, nothing is shared between sessions, and every acquired resource
//! (socket, protocol handle, parsed descriptor) is released when the session
//! finishes, however it finishes.
//!
//! # Directory URLs
//!
//! The directory is addressed with an RFC 4516 style URL,
//! `ldap://host[:port]/[baseDN][?attrs[?scope[?filter]]]`. When the URL
//! carries no base DN the middleware runs in bind-only mode: a successful
//! bind authorizes the request and no search is performed. With a base DN,
//! the bind must succeed *and* the search must return at least one entry.
//!
//! URL, bind DN, header prefix and realm are templates rendered per request,
//! with `{username}` replaced by the authenticating user. A realm rendering
//! to the literal `off` disables the middleware for that request.
//!
//! # Example
//!
//! ```rust,no_run
//! use http::{Request, Response};
//! use tower::{Service, ServiceBuilder, ServiceExt};
//! use tower_ldap_auth::{LdapAuthConfig, LdapAuthLayer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LdapAuthConfig::new(
//!         "ldap://ldap.example.org/ou=people,dc=example,dc=org?cn,mail?sub?(uid={username})",
//!         "uid={username},ou=people,dc=example,dc=org",
//!         "Restricted",
//!     )
//!     .with_header("X-Ldap-");
//!
//!     let mut service = ServiceBuilder::new()
//!         .layer(LdapAuthLayer::new::<hyper::Body>(config))
//!         .service_fn(|req: Request<hyper::Body>| async move {
//!             // `X-Ldap-cn`, `X-Ldap-mail`, ... are visible here.
//!             Ok::<_, std::convert::Infallible>(Response::new(req.into_body()))
//!         });
//!
//!     let request = Request::get("/protected")
//!         .header("Authorization", "Basic YWxpY2U6c2VjcmV0")
//!         .body(hyper::Body::empty())
//!         .unwrap();
//!     let response = service.ready().await.unwrap().call(request).await.unwrap();
//!     println!("{}", response.status());
//! }
//! ```

#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod config;
mod connection;
mod creds;
mod error;
mod filter;
mod layer;
mod session;
mod target;

pub use config::{LdapAuthConfig, Template};
pub use error::Error;
pub use layer::{LdapAuthLayer, LdapBasicAuth};
pub use secrecy;
pub use session::Decision;

pub(crate) type Result<T = ()> = std::result::Result<T, Error>;
