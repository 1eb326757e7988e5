//! Path-based access rules, evaluated before dispatch.
//!
//! A policy is an ordered list of `(method?, path pattern) → access` rules.
//! The first matching rule wins; a request no rule matches needs a credential.

/// What a request needs before it may reach a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No credential required.
    Public,
    /// A valid bearer token for an existing user is required.
    Authenticated,
}

/// Ant-style path pattern.
///
/// - a literal segment matches itself
/// - `*` matches exactly one segment
/// - a trailing `**` matches zero or more remaining segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<String>,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            segments: split(pattern).map(str::to_string).collect(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        let mut path_segments = split(path);
        for (i, seg) in self.segments.iter().enumerate() {
            if seg == "**" && i == self.segments.len() - 1 {
                return true;
            }
            match path_segments.next() {
                Some(actual) if seg == "*" || seg == actual => {}
                _ => return false,
            }
        }
        path_segments.next().is_none()
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    /// Upper-case HTTP method, or `None` for any method.
    method: Option<String>,
    pattern: PathPattern,
    access: Access,
}

impl AccessRule {
    pub fn any_method(pattern: &str, access: Access) -> Self {
        Self {
            method: None,
            pattern: PathPattern::new(pattern),
            access,
        }
    }

    pub fn method(method: &str, pattern: &str, access: Access) -> Self {
        Self {
            method: Some(method.to_ascii_uppercase()),
            pattern: PathPattern::new(pattern),
            access,
        }
    }

    fn applies_to(&self, method: &str, path: &str) -> bool {
        let method_ok = match &self.method {
            Some(m) => m.eq_ignore_ascii_case(method),
            None => true,
        };
        method_ok && self.pattern.matches(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
}

impl AccessPolicy {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    /// Rules for the storefront API: catalog reads, auth endpoints and API
    /// docs are public, everything else needs a token.
    pub fn storefront() -> Self {
        use Access::Public;

        Self::new(vec![
            AccessRule::method("OPTIONS", "/**", Public),
            AccessRule::any_method("/health", Public),
            AccessRule::any_method("/swagger-ui/**", Public),
            AccessRule::any_method("/swagger-ui.html", Public),
            AccessRule::any_method("/v3/api-docs/**", Public),
            AccessRule::any_method("/api/auth/**", Public),
            AccessRule::method("GET", "/api/cakes/**", Public),
            AccessRule::method("GET", "/api/categories", Public),
        ])
    }

    pub fn required_access(&self, method: &str, path: &str) -> Access {
        self.rules
            .iter()
            .find(|rule| rule.applies_to(method, path))
            .map(|rule| rule.access)
            .unwrap_or(Access::Authenticated)
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::storefront()
    }
}
