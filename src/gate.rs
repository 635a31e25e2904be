use std::sync::Arc;

use crate::{
    error::{Denial, DenialKind},
    policy::AuthorizationOptions,
    request::AuthenticatedUser,
};

/// The authorization gate evaluated before every handler runs.
///
/// Holds the rules accumulated by a builder. Rules are conjunctive: the gate
/// opens only if every rule permits the decoded identity. A gate without rules
/// is public.
///
/// # Examples
///
/// ```
/// use serverless_kit::{AuthenticatedUser, AuthorizationGate, AuthorizationOptions};
/// use http::StatusCode;
///
/// let gate = AuthorizationGate::new(vec![AuthorizationOptions::authenticated()]);
///
/// let denial = gate.check(None).unwrap_err();
/// assert_eq!(denial.status(), StatusCode::UNAUTHORIZED);
///
/// assert!(gate.check(Some(&AuthenticatedUser::new("u-1"))).is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    rules: Arc<[AuthorizationOptions]>,
}

impl Default for AuthorizationGate {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl AuthorizationGate {
    /// Creates a gate over the given rules.
    pub fn new(rules: Vec<AuthorizationOptions>) -> Self {
        Self {
            rules: rules.into(),
        }
    }

    /// Returns the rules evaluated by this gate.
    pub fn rules(&self) -> &[AuthorizationOptions] {
        &self.rules
    }

    /// Returns true if the gate declares no rules.
    pub fn is_public(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check that every rule permits `user`.
    ///
    /// Returns the first failing rule as a `Denial`: `Unauthenticated` when no
    /// user was decoded, `Forbidden` otherwise.
    pub fn check(&self, user: Option<&AuthenticatedUser>) -> Result<(), Denial> {
        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.permits(user) {
                return Err(Self::deny(index, user));
            }
        }
        Ok(())
    }

    fn deny(index: usize, user: Option<&AuthenticatedUser>) -> Denial {
        match user {
            None => Denial::new(
                DenialKind::Unauthenticated,
                format!("rule #{index} requires an authenticated caller"),
            ),
            Some(_) => Denial::new(
                DenialKind::Forbidden,
                format!("rule #{index} rejected the caller"),
            ),
        }
    }
}
