use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity decoded from an incoming request.
///
/// Built fresh for every invocation by an [`IdentityDecoder`](crate::web::IdentityDecoder)
/// and never cached. A user without an identifier still counts as
/// authenticated for authorization purposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    /// Unique identifier for this user, if the credential carried one
    #[serde(default)]
    pub user_id: Option<String>,
    /// Opaque user details (display name, email, ...)
    #[serde(default)]
    pub user_details: Option<Value>,
    /// Provider that issued the credential
    #[serde(default)]
    pub identity_provider: Option<String>,
    /// Roles granted to this user
    #[serde(default, rename = "userRoles")]
    pub roles: Vec<String>,
}

impl AuthenticatedUser {
    /// Creates a user with the given identifier and no details or roles.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Sets the opaque user details payload.
    pub fn with_details(mut self, details: impl Into<Value>) -> Self {
        self.user_details = Some(details.into());
        self
    }

    /// Adds a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Returns true if the user holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_client_principal_shape() {
        let user: AuthenticatedUser = serde_json::from_str(
            r#"{"userId":"u-1","userDetails":"alice@example.com","identityProvider":"github","userRoles":["anonymous","authenticated"]}"#,
        )
        .unwrap();

        assert_eq!(user.user_id.as_deref(), Some("u-1"));
        assert_eq!(user.user_details, Some(Value::from("alice@example.com")));
        assert!(user.has_role("authenticated"));
    }

    #[test]
    fn roles_serialize_under_client_principal_name() {
        let user = AuthenticatedUser::new("u-2").with_role("admin");

        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["userRoles"], serde_json::json!(["admin"]));
        assert!(value.get("roles").is_none());

        let back: AuthenticatedUser = serde_json::from_value(value).unwrap();
        assert!(back.has_role("admin"));
    }

    #[test]
    fn missing_fields_default() {
        let user: AuthenticatedUser = serde_json::from_str("{}").unwrap();
        assert!(user.user_id.is_none());
        assert!(user.roles.is_empty());
    }
}
