use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::host::{HostRequest, ResponseWriter};
use crate::logging::InvocationLog;
use crate::request::AuthenticatedUser;
use crate::web::HttpInput;

/// Per-invocation context handed to a handler.
///
/// `Context<P>` carries the fields every trigger shares (the decoded `user`
/// and the `log` sink) plus a trigger-specific payload `P`:
/// - `Context<HttpPayload>` ([`HttpContext`]): parsed body, request, response writer
/// - `Context<RpcPayload>` ([`RpcContext`]): the envelope's `data` value
///
/// # Construction
///
/// Contexts are built by the function builders after the authorization gate
/// has passed. The `user` recorded at that point cannot be changed by the
/// handler.
///
/// # Examples
///
/// ```
/// use serverless_kit::{RpcContext, RpcFunctionBuilder};
///
/// let function = RpcFunctionBuilder::new()
///     .allow_authenticated()
///     .on_invoke(|ctx: RpcContext| async move {
///         let caller = ctx.user().and_then(|u| u.user_id.clone());
///         Ok(serde_json::json!({ "caller": caller, "echo": ctx.input() }))
///     });
/// # let _ = function;
/// ```
#[derive(Debug, Clone)]
pub struct Context<P> {
    user: Option<AuthenticatedUser>,
    log: InvocationLog,
    payload: P,
}

/// Context for HTTP triggers.
pub type HttpContext = Context<HttpPayload>;

/// Context for RPC-style triggers.
pub type RpcContext = Context<RpcPayload>;

/// Trigger payload of an [`HttpContext`].
#[derive(Debug, Clone)]
pub struct HttpPayload {
    input: HttpInput,
    request: HostRequest,
    response: ResponseWriter,
}

/// Trigger payload of an [`RpcContext`].
#[derive(Debug, Clone)]
pub struct RpcPayload {
    input: Option<Value>,
}

// ============================================================================
// Shared methods (available on all triggers)
// ============================================================================

impl<P> Context<P> {
    /// Returns the caller's identity, if one was decoded.
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.user.as_ref()
    }

    /// Returns the caller's id, if the identity carried one.
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.user_id.as_deref())
    }

    /// Returns the logging sink.
    pub fn log(&self) -> &InvocationLog {
        &self.log
    }
}

// ============================================================================
// HttpContext
// ============================================================================

impl Context<HttpPayload> {
    pub(crate) fn http(
        user: Option<AuthenticatedUser>,
        log: InvocationLog,
        input: HttpInput,
        request: HostRequest,
        response: ResponseWriter,
    ) -> Self {
        Self {
            user,
            log,
            payload: HttpPayload {
                input,
                request,
                response,
            },
        }
    }

    /// Returns the decoded request body.
    pub fn input(&self) -> &HttpInput {
        &self.payload.input
    }

    /// Returns the raw request (headers, method, uri).
    pub fn request(&self) -> &HostRequest {
        &self.payload.request
    }

    /// Returns the host's response writer.
    pub fn response(&self) -> &ResponseWriter {
        &self.payload.response
    }
}

// ============================================================================
// RpcContext
// ============================================================================

impl Context<RpcPayload> {
    pub(crate) fn rpc(user: Option<AuthenticatedUser>, log: InvocationLog, input: Option<Value>) -> Self {
        Self {
            user,
            log,
            payload: RpcPayload { input },
        }
    }

    /// Returns the `data` field of the request envelope, if any.
    pub fn input(&self) -> Option<&Value> {
        self.payload.input.as_ref()
    }

    /// Deserializes the envelope data into `T`.
    ///
    /// Absent data is deserialized from `null`, so `Option<T>` targets accept
    /// a missing field.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the data does not match `T`.
    pub fn parse_input<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.input.clone().unwrap_or(Value::Null))
    }
}

// ============================================================================
// InvocationContext - either trigger
// ============================================================================

/// A context of either trigger kind.
///
/// Useful for code that only needs the shared fields, such as cross-cutting
/// logging or auditing helpers.
#[derive(Debug, Clone)]
pub enum InvocationContext {
    /// HTTP trigger
    Http(HttpContext),
    /// RPC-style trigger
    Rpc(RpcContext),
}

impl InvocationContext {
    /// Returns the caller's identity, if one was decoded.
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        match self {
            InvocationContext::Http(ctx) => ctx.user(),
            InvocationContext::Rpc(ctx) => ctx.user(),
        }
    }

    /// Returns the logging sink.
    pub fn log(&self) -> &InvocationLog {
        match self {
            InvocationContext::Http(ctx) => ctx.log(),
            InvocationContext::Rpc(ctx) => ctx.log(),
        }
    }

    /// Returns the trigger name (`"http"` or `"rpc"`).
    pub fn trigger(&self) -> &'static str {
        match self {
            InvocationContext::Http(_) => "http",
            InvocationContext::Rpc(_) => "rpc",
        }
    }
}

impl From<HttpContext> for InvocationContext {
    fn from(ctx: HttpContext) -> Self {
        InvocationContext::Http(ctx)
    }
}

impl From<RpcContext> for InvocationContext {
    fn from(ctx: RpcContext) -> Self {
        InvocationContext::Rpc(ctx)
    }
}
