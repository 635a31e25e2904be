//! Authorization-gated function builders for serverless hosts.
//!
//! A function is declared once with a builder and handed to the host as a
//! [`ServerlessFunction`](host::ServerlessFunction). Every invocation then
//! runs the same pipeline:
//! - decode the caller's identity from the request
//! - check it against every declared [`AuthorizationOptions`] rule, answering
//!   `401`/`403` without running the handler on failure
//! - decode the input (HTTP body or RPC `{"data": ...}` envelope)
//! - run the handler with a typed context
//!
//! # Core Types
//!
//! - [`HttpFunctionBuilder`] / [`RpcFunctionBuilder`]: builders for the two
//!   trigger kinds, both specializations of [`FunctionBuilder`]
//! - [`AuthorizationOptions`]: one access rule; rules compose conjunctively
//! - [`HttpContext`] / [`RpcContext`]: what a handler receives
//! - [`db::Database`]: audit-stamping document persistence
//! - [`realtime::Realtime`]: event broadcast side channel
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use serverless_kit::host::{HostContext, HostRequest, ServerlessFunction};
//! use serverless_kit::{RpcContext, RpcFunctionBuilder};
//!
//! let function = RpcFunctionBuilder::new()
//!     .allow_authenticated()
//!     .on_invoke(|ctx: RpcContext| async move { Ok(ctx.user_id().map(str::to_owned)) });
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! // No credential: the handler never runs
//! let host = HostContext::new("whoami", HostRequest::default().with_json(&json!({"data": null})));
//! function.invoke(&host).await.unwrap();
//! assert_eq!(host.take_response().unwrap().status, 401);
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod config;
mod context;
pub mod db;
mod error;
mod gate;
pub mod host;
mod logging;
mod policy;
pub mod realtime;
mod request;
pub mod web;

pub use builder::{FunctionBuilder, FunctionBuilderContext, HttpFunctionBuilder, RpcFunctionBuilder};
pub use context::{Context, HttpContext, HttpPayload, InvocationContext, RpcContext, RpcPayload};
pub use error::{
    DatabaseError, Denial, DenialKind, FunctionError, IdentityError, RealtimeError,
};
pub use gate::AuthorizationGate;
pub use logging::InvocationLog;
pub use policy::{AccessPredicate, AuthorizationOptions};
pub use request::AuthenticatedUser;
