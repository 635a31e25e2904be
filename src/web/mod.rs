//! Request-side boundary between the host and the builders.
//!
//! This module maps raw host requests to the values a handler sees:
//! - the caller's identity (`IdentityDecoder`)
//! - the decoded body (`parse_body` into `HttpInput`)
//!
//! Nothing here authorizes. The decoded identity is handed to
//! `AuthorizationGate` by the builders.
//!
//! # Integration Flow
//!
//! ```text
//! HostRequest
//!   ↓
//! IdentityDecoder::decode()      → Option<AuthenticatedUser>
//!   ↓
//! AuthorizationGate::check()     → 401 / 403, or continue
//!   ↓
//! parse_body() / envelope data   → HttpInput / Option<Value>
//!   ↓
//! HttpContext / RpcContext handed to the handler
//! ```

mod body;
mod identity;

pub use body::{parse_body, parse_body_with, FilePart, FormData, FormField, HttpInput};
pub use identity::{ClientPrincipalDecoder, IdentityDecoder, CLIENT_PRINCIPAL_HEADER};
