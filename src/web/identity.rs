//! Identity decoding from host request headers.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http::HeaderName;

use crate::error::IdentityError;
use crate::host::HostRequest;
use crate::request::AuthenticatedUser;

/// Header carrying the host's base64-encoded client principal.
pub const CLIENT_PRINCIPAL_HEADER: &str = "x-ms-client-principal";

/// Decodes the caller's identity from a host request.
///
/// Runs once per invocation, before authorization. `Ok(None)` means the
/// request carried no credential. Errors are treated as "no credential" by
/// the builders and only logged.
#[async_trait]
pub trait IdentityDecoder: Send + Sync {
    /// Decodes the identity carried by `req`.
    async fn decode(&self, req: &HostRequest) -> Result<Option<AuthenticatedUser>, IdentityError>;
}

/// Decodes a base64 JSON client principal from a request header.
///
/// The payload has the shape
/// `{"userId": .., "userDetails": .., "identityProvider": .., "userRoles": [..]}`.
///
/// # Examples
///
/// ```
/// use base64::{engine::general_purpose::STANDARD, Engine as _};
/// use http::HeaderValue;
/// use serverless_kit::host::HostRequest;
/// use serverless_kit::web::{ClientPrincipalDecoder, IdentityDecoder, CLIENT_PRINCIPAL_HEADER};
///
/// # tokio_test_block_on(async {
/// let encoded = STANDARD.encode(r#"{"userId":"u-1","userRoles":["authenticated"]}"#);
/// let req = HostRequest::default().with_header(
///     CLIENT_PRINCIPAL_HEADER.parse().unwrap(),
///     HeaderValue::from_str(&encoded).unwrap(),
/// );
///
/// let user = ClientPrincipalDecoder::default().decode(&req).await.unwrap().unwrap();
/// assert_eq!(user.user_id.as_deref(), Some("u-1"));
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientPrincipalDecoder {
    header: HeaderName,
}

impl ClientPrincipalDecoder {
    /// Creates a decoder reading the given header.
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    /// Returns the header this decoder reads.
    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    fn decode_value(value: &str) -> Result<Option<AuthenticatedUser>, IdentityError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }
        let raw = STANDARD.decode(value)?;
        let user = serde_json::from_slice(&raw)?;
        Ok(Some(user))
    }
}

impl Default for ClientPrincipalDecoder {
    fn default() -> Self {
        Self::new(HeaderName::from_static(CLIENT_PRINCIPAL_HEADER))
    }
}

#[async_trait]
impl IdentityDecoder for ClientPrincipalDecoder {
    async fn decode(&self, req: &HostRequest) -> Result<Option<AuthenticatedUser>, IdentityError> {
        match req.headers.get(&self.header) {
            None => Ok(None),
            Some(value) => {
                let value = value.to_str().map_err(|_| IdentityError::InvalidHeader)?;
                Self::decode_value(value)
            }
        }
    }
}
