//! The Tower layer wiring sessions into a request pipeline.

use std::{marker::PhantomData, sync::Arc};

use futures::future::BoxFuture;
use http::{header, Request, Response, StatusCode};
use tower_http::auth::{AsyncAuthorizeRequest, AsyncRequireAuthorizationLayer};
use tracing::Instrument;

use crate::{
    config::{LdapAuthConfig, REALM_OFF},
    creds::BasicCredentials,
    session::{Decision, Session},
};

/// Authorizes requests by binding their Basic credentials against the
/// configured LDAP directory.
///
/// Usually constructed through [`LdapAuthLayer::new`].
pub struct LdapBasicAuth<ResBody> {
    config: Arc<LdapAuthConfig>,
    _body_type: PhantomData<fn() -> ResBody>,
}

impl<ResBody> Clone for LdapBasicAuth<ResBody> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            _body_type: PhantomData,
        }
    }
}

impl<ReqBody, ResBody> AsyncAuthorizeRequest<ReqBody> for LdapBasicAuth<ResBody>
where
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type RequestBody = ReqBody;
    type ResponseBody = ResBody;
    type Future = BoxFuture<'static, Result<Request<ReqBody>, Response<ResBody>>>;

    fn authorize(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let config = self.config.clone();
        let span = tracing::info_span!("ldap_auth", user = tracing::field::Empty);

        Box::pin(
            async move {
                // The realm is resolved before anything else; `off` disables
                // the middleware so another mechanism can take the request.
                let realm = config.realm.render("");
                if realm.eq_ignore_ascii_case(REALM_OFF) {
                    return Ok(request);
                }

                let Some(credentials) = BasicCredentials::from_headers(request.headers()) else {
                    tracing::debug!("no usable Basic credentials supplied");
                    return Err(challenge(&realm));
                };
                tracing::Span::current().record("user", credentials.username.as_str());

                let mut session = Session::new(config, credentials);
                match session.authenticate(request.headers_mut()).await {
                    Decision::Continue => Ok(request),
                    Decision::Unauthorized => Err(challenge(&realm)),
                    Decision::InternalError | Decision::ConfigError => Err(internal_error()),
                }
            }
            .instrument(span),
        )
    }
}

/// A wrapper around [`tower_http::auth::AsyncRequireAuthorizationLayer`]
/// which provides LDAP-backed Basic authentication.
pub struct LdapAuthLayer;

impl LdapAuthLayer {
    /// Creates the layer from a configuration value object.
    ///
    /// Requests whose credentials the directory accepts pass through to the
    /// inner service, carrying any attribute headers the search produced.
    /// Rejected requests receive [`StatusCode::UNAUTHORIZED`] with a
    /// `WWW-Authenticate` challenge; failures unrelated to the credentials
    /// receive [`StatusCode::INTERNAL_SERVER_ERROR`] without one.
    pub fn new<ResBody>(
        config: LdapAuthConfig,
    ) -> AsyncRequireAuthorizationLayer<LdapBasicAuth<ResBody>>
    where
        ResBody: Default + Send + 'static,
    {
        AsyncRequireAuthorizationLayer::new(LdapBasicAuth {
            config: Arc::new(config),
            _body_type: PhantomData,
        })
    }
}

fn challenge<ResBody: Default>(realm: &str) -> Response<ResBody> {
    match header::HeaderValue::from_str(&format!("Basic realm=\"{realm}\"")) {
        Ok(value) => {
            let mut response = Response::default();
            *response.status_mut() = StatusCode::UNAUTHORIZED;
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
            response
        }
        Err(err) => {
            tracing::error!(%err, "could not materialize challenge header");
            internal_error()
        }
    }
}

fn internal_error<ResBody: Default>() -> Response<ResBody> {
    let mut response = Response::default();
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_carries_the_realm() {
        let response: Response<()> = challenge("Restricted");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"Restricted\""
        );
    }

    #[test]
    fn unprintable_realm_degrades_to_internal_error() {
        let response: Response<()> = challenge("bad\nrealm");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }
}
