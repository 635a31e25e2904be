use std::future::Future;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{Authorizer, FunctionBuilder, Trigger};
use crate::context::RpcContext;
use crate::error::FunctionError;
use crate::host::{HostContext, HostRequest, ServerlessFunction};

/// Envelope field carrying RPC input and output.
pub const DEFAULT_ENVELOPE_FIELD: &str = "data";

/// Marker for RPC-style triggers.
#[derive(Debug, Clone, Copy)]
pub struct Rpc;

impl Trigger for Rpc {
    type Settings = RpcSettings;
    const NAME: &'static str = "rpc";
}

/// RPC-specific builder settings.
#[derive(Debug, Clone)]
pub struct RpcSettings {
    /// Envelope field read for input and written for output
    pub envelope_field: String,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            envelope_field: DEFAULT_ENVELOPE_FIELD.to_string(),
        }
    }
}

impl FunctionBuilder<Rpc> {
    /// Uses `field` instead of `data` as the envelope field.
    pub fn envelope_field(self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.map_settings(|settings| settings.envelope_field = field)
    }

    /// Finishes the builder with an invocation handler.
    ///
    /// The handler returns only the payload; the function answers with
    /// `200 OK` and `{"data": <payload>}`. Handler errors are returned to the
    /// host untouched.
    pub fn on_invoke<H, Fut, R>(self, handler: H) -> RpcFunction<H>
    where
        H: Fn(RpcContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let (authorizer, settings) = self.into_parts();
        RpcFunction {
            authorizer,
            settings,
            handler,
        }
    }
}

/// An RPC-style function produced by [`FunctionBuilder::on_invoke`].
#[derive(Debug)]
pub struct RpcFunction<H> {
    authorizer: Authorizer,
    settings: RpcSettings,
    handler: H,
}

impl<H> RpcFunction<H> {
    fn wrap(&self, result: Value) -> Value {
        let mut envelope = Map::with_capacity(1);
        envelope.insert(self.settings.envelope_field.clone(), result);
        Value::Object(envelope)
    }
}

/// Reads the envelope field from a JSON request body.
///
/// A missing body, a body that is not a JSON object, or a missing field all
/// yield `None`.
fn envelope_input(req: &HostRequest, field: &str) -> Option<Value> {
    if req.body.is_empty() {
        return None;
    }
    match serde_json::from_slice::<Value>(&req.body) {
        Ok(Value::Object(mut body)) => body.remove(field),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "rpc body is not JSON, input left empty");
            None
        }
    }
}

#[async_trait]
impl<H, Fut, R> ServerlessFunction for RpcFunction<H>
where
    H: Fn(RpcContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
    R: Serialize + Send + 'static,
{
    async fn invoke(&self, host: &HostContext) -> Result<(), FunctionError> {
        let Ok(user) = self.authorizer.authorize(host).await else {
            return Ok(());
        };

        let input = envelope_input(&host.req, &self.settings.envelope_field);
        let ctx = RpcContext::rpc(user, host.log.clone(), input);

        let result = (self.handler)(ctx).await?;
        let envelope = self.wrap(serde_json::to_value(&result)?);
        host.res.json(&envelope)?;

        Ok(())
    }
}
