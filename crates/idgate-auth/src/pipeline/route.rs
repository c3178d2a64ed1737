//! Route access metadata.
//!
//! A [`RouteTable`] maps `(method, path)` to the [`RouteAccess`] a request
//! needs. Rules are checked in insertion order and the first match wins;
//! paths no rule matches require authentication.

use std::collections::BTreeSet;

use axum::http::Method;

/// Access requirement of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    /// No token needed.
    Public,
    /// Any authenticated principal.
    Authenticated,
    /// A principal holding at least one of the listed roles.
    AnyRole(BTreeSet<String>),
}

impl RouteAccess {
    /// Requires any of the given roles.
    #[must_use]
    pub fn any_role<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyRole(roles.into_iter().map(Into::into).collect())
    }

    /// Returns `true` for [`RouteAccess::Public`].
    #[must_use]
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Public)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

/// Path pattern with literal segments, `{param}` segments and an optional
/// trailing `*` that matches any remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
    wildcard: bool,
}

impl PathPattern {
    /// Parses a pattern such as `/users/{id}/status` or `/static/*`.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        let mut segments: Vec<&str> = split_path(pattern).collect();
        let wildcard = segments.last() == Some(&"*");
        if wildcard {
            segments.pop();
        }

        let segments = segments
            .into_iter()
            .map(|segment| {
                if segment.starts_with('{') && segment.ends_with('}') {
                    Segment::Param
                } else {
                    Segment::Literal(segment.to_string())
                }
            })
            .collect();

        Self { segments, wildcard }
    }

    /// Returns `true` if `path` matches this pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = split_path(path).collect();

        if self.wildcard {
            if parts.len() < self.segments.len() {
                return false;
            }
        } else if parts.len() != self.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(&parts)
            .all(|(segment, part)| match segment {
                Segment::Literal(literal) => literal == part,
                Segment::Param => true,
            })
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// A single route rule.
#[derive(Debug, Clone)]
pub struct RouteRule {
    method: Option<Method>,
    pattern: PathPattern,
    access: RouteAccess,
}

impl RouteRule {
    /// Rule for one method.
    #[must_use]
    pub fn new(method: Method, pattern: &str, access: RouteAccess) -> Self {
        Self {
            method: Some(method),
            pattern: PathPattern::parse(pattern),
            access,
        }
    }

    /// Rule for every method.
    #[must_use]
    pub fn any_method(pattern: &str, access: RouteAccess) -> Self {
        Self {
            method: None,
            pattern: PathPattern::parse(pattern),
            access,
        }
    }

    /// Returns `true` if the rule applies to the request.
    #[must_use]
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.as_ref().is_none_or(|m| m == method) && self.pattern.matches(path)
    }

    /// The access requirement of this rule.
    #[must_use]
    pub fn access(&self) -> &RouteAccess {
        &self.access
    }
}

/// Ordered route rules with an `Authenticated` fallback.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
    fallback: RouteAccess,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: RouteAccess::Authenticated,
        }
    }

    /// Appends a rule.
    #[must_use]
    pub fn rule(mut self, rule: RouteRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Appends a public rule.
    #[must_use]
    pub fn public(self, method: Method, pattern: &str) -> Self {
        self.rule(RouteRule::new(method, pattern, RouteAccess::Public))
    }

    /// Appends a rule requiring authentication.
    #[must_use]
    pub fn authenticated(self, method: Method, pattern: &str) -> Self {
        self.rule(RouteRule::new(method, pattern, RouteAccess::Authenticated))
    }

    /// Appends a rule requiring any of `roles`.
    #[must_use]
    pub fn any_role<I, S>(self, method: Method, pattern: &str, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule(RouteRule::new(method, pattern, RouteAccess::any_role(roles)))
    }

    /// Returns the access requirement for a request.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> &RouteAccess {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .map_or(&self.fallback, RouteRule::access)
    }
}
