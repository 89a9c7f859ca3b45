//! Configuration consumed by the authentication layer.

use std::time::Duration;

/// Realm value which disables the middleware for a request.
pub(crate) const REALM_OFF: &str = "off";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A request-rendered string with optional `{username}` placeholders.
///
/// The directory URL, bind DN, header prefix and realm are all templates so
/// that route configuration can reference the authenticating user, e.g.
/// `ldap://ldap.example.org/dc=example,dc=org?cn?sub?(uid={username})`.
///
/// The username is substituted verbatim. Deployments whose bind DN or filter
/// embeds it should constrain the characters accepted upstream, as the
/// original Basic scheme offers no escaping of its own.
#[derive(Debug, Clone)]
pub struct Template {
    parts: Vec<Part>,
}

#[derive(Debug, Clone)]
enum Part {
    Literal(String),
    Username,
}

impl Template {
    const PLACEHOLDER: &'static str = "{username}";

    /// Parses a template, splitting out `{username}` placeholders.
    pub fn new(source: impl AsRef<str>) -> Self {
        let mut parts = Vec::new();
        let mut rest = source.as_ref();
        while let Some(at) = rest.find(Self::PLACEHOLDER) {
            if at > 0 {
                parts.push(Part::Literal(rest[..at].to_string()));
            }
            parts.push(Part::Username);
            rest = &rest[at + Self::PLACEHOLDER.len()..];
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_string()));
        }
        Self { parts }
    }

    /// Renders the template against the authenticating username.
    pub(crate) fn render(&self, username: &str) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(literal) => out.push_str(literal),
                Part::Username => out.push_str(username),
            }
        }
        out
    }
}

impl From<&str> for Template {
    fn from(source: &str) -> Self {
        Template::new(source)
    }
}

impl From<String> for Template {
    fn from(source: String) -> Self {
        Template::new(source)
    }
}

/// Per-route configuration for [`LdapAuthLayer`](crate::LdapAuthLayer).
///
/// This is a plain value object: merging values across nested configuration
/// scopes is the caller's concern, the middleware only consumes the final
/// result.
#[derive(Debug, Clone)]
pub struct LdapAuthConfig {
    /// Directory URL template,
    /// `ldap://host[:port]/[baseDN][?attrs[?scope[?filter]]]`. A URL without
    /// a base DN selects bind-only mode.
    pub url: Template,

    /// Bind DN template, rendered to the principal of the simple bind.
    pub bind_dn: Template,

    /// Prefix template prepended to attribute names when injecting headers.
    /// May render to the empty string.
    pub header: Template,

    /// Challenge realm template. Rendering to the literal `off` disables the
    /// middleware for the request. The realm is resolved before credentials
    /// are extracted, so `{username}` expands to the empty string here.
    pub realm: Template,

    /// Bound wait applied to the connect attempt and to each protocol
    /// response.
    pub timeout: Duration,
}

impl LdapAuthConfig {
    /// Creates a configuration with an empty header prefix and the default
    /// ten second operation timeout.
    pub fn new(
        url: impl Into<Template>,
        bind_dn: impl Into<Template>,
        realm: impl Into<Template>,
    ) -> Self {
        Self {
            url: url.into(),
            bind_dn: bind_dn.into(),
            header: Template::new(""),
            realm: realm.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the header-name prefix used when injecting directory attributes.
    pub fn with_header(mut self, header: impl Into<Template>) -> Self {
        self.header = header.into();
        self
    }

    /// Sets the bound wait for connect and per-response delays.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_placeholders() {
        let template = Template::new("uid={username},ou=people,dc=example,dc=org");
        assert_eq!(
            template.render("alice"),
            "uid=alice,ou=people,dc=example,dc=org"
        );
    }

    #[test]
    fn renders_repeated_placeholders() {
        let template = Template::new("{username}-{username}");
        assert_eq!(template.render("bob"), "bob-bob");
    }

    #[test]
    fn renders_literal_only() {
        let template = Template::new("Restricted");
        assert_eq!(template.render("alice"), "Restricted");
    }

    #[test]
    fn empty_template_renders_empty() {
        assert_eq!(Template::new("").render("alice"), "");
    }
}
