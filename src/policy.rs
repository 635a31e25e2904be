use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::request::AuthenticatedUser;

/// A caller-supplied access check evaluated against the decoded identity.
///
/// Cheap to clone; the closure is shared.
#[derive(Clone)]
pub struct AccessPredicate(Arc<dyn Fn(Option<&AuthenticatedUser>) -> bool + Send + Sync>);

impl AccessPredicate {
    /// Wraps a closure as a predicate.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&AuthenticatedUser>) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Evaluates the predicate.
    pub fn check(&self, user: Option<&AuthenticatedUser>) -> bool {
        (self.0)(user)
    }
}

impl fmt::Debug for AccessPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessPredicate(..)")
    }
}

/// Declares who may invoke a function.
///
/// The minimal form is `{ "authenticated": true }`. Roles and predicates
/// narrow it further. Every populated part must pass for the rule to permit.
///
/// # Examples
///
/// ```
/// use serverless_kit::{AuthenticatedUser, AuthorizationOptions};
///
/// let rule = AuthorizationOptions::authenticated();
/// assert!(!rule.permits(None));
/// assert!(rule.permits(Some(&AuthenticatedUser::new("u-1"))));
///
/// let admins = AuthorizationOptions::roles(["admin"]);
/// assert!(!admins.permits(Some(&AuthenticatedUser::new("u-1"))));
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationOptions {
    /// Requires a decoded identity
    #[serde(default)]
    pub authenticated: bool,
    /// Requires the identity to hold at least one of these roles
    #[serde(default)]
    pub roles: Vec<String>,
    /// Custom check, not expressible in configuration
    #[serde(skip)]
    pub predicate: Option<AccessPredicate>,
}

impl AuthorizationOptions {
    /// Rule permitting any authenticated user.
    pub fn authenticated() -> Self {
        Self {
            authenticated: true,
            ..Self::default()
        }
    }

    /// Rule permitting users holding any of `roles`.
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            authenticated: true,
            roles: roles.into_iter().map(Into::into).collect(),
            predicate: None,
        }
    }

    /// Rule delegating to a custom predicate.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(Option<&AuthenticatedUser>) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Some(AccessPredicate::new(f)),
            ..Self::default()
        }
    }

    /// Returns true if `user` satisfies this rule.
    ///
    /// A user without an id is still considered authenticated here; checking
    /// the credential itself is the decoder's job.
    pub fn permits(&self, user: Option<&AuthenticatedUser>) -> bool {
        if (self.authenticated || !self.roles.is_empty()) && user.is_none() {
            return false;
        }

        if !self.roles.is_empty() {
            let holds_any = user.is_some_and(|u| self.roles.iter().any(|r| u.has_role(r)));
            if !holds_any {
                return false;
            }
        }

        match &self.predicate {
            Some(predicate) => predicate.check(user),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rule_is_public() {
        let rule = AuthorizationOptions::default();
        assert!(rule.permits(None));
        assert!(rule.permits(Some(&AuthenticatedUser::new("u"))));
    }

    #[test]
    fn authenticated_requires_user() {
        let rule = AuthorizationOptions::authenticated();
        assert!(!rule.permits(None));
        assert!(rule.permits(Some(&AuthenticatedUser::new("u"))));
    }

    #[test]
    fn user_without_id_counts_as_authenticated() {
        let rule = AuthorizationOptions::authenticated();
        let anonymous_shape = AuthenticatedUser::default();
        assert!(rule.permits(Some(&anonymous_shape)));
    }

    #[test]
    fn roles_require_any_listed_role() {
        let rule = AuthorizationOptions::roles(["admin", "editor"]);

        assert!(!rule.permits(None));
        assert!(!rule.permits(Some(&AuthenticatedUser::new("u"))));
        assert!(rule.permits(Some(&AuthenticatedUser::new("u").with_role("editor"))));
    }

    #[test]
    fn predicate_is_consulted() {
        let rule = AuthorizationOptions::predicate(|user| {
            user.and_then(|u| u.user_id.as_deref()) == Some("owner")
        });

        assert!(rule.permits(Some(&AuthenticatedUser::new("owner"))));
        assert!(!rule.permits(Some(&AuthenticatedUser::new("other"))));
        assert!(!rule.permits(None));
    }

    #[test]
    fn deserializes_minimal_shape() {
        let rule: AuthorizationOptions =
            serde_json::from_str(r#"{"authenticated": true}"#).unwrap();
        assert!(rule.authenticated);
        assert!(rule.roles.is_empty());
        assert!(rule.predicate.is_none());
    }
}
