//! Function builders.
//!
//! A [`FunctionBuilder<T>`] accumulates authorization rules for one trigger
//! kind `T` and ends in a single terminal method that produces a
//! [`ServerlessFunction`](crate::host::ServerlessFunction):
//!
//! - [`HttpFunctionBuilder`] (`FunctionBuilder<Http>`) ends in `on_request`
//! - [`RpcFunctionBuilder`] (`FunctionBuilder<Rpc>`) ends in `on_invoke`
//!
//! Chaining methods are written once for every `T` and always return the
//! builder they were called on, so `HttpFunctionBuilder::new().allow_authenticated()`
//! is still an `HttpFunctionBuilder`.

mod http;
mod rpc;

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::Denial;
use crate::gate::AuthorizationGate;
use crate::host::HostContext;
use crate::policy::AuthorizationOptions;
use crate::request::AuthenticatedUser;
use crate::web::{ClientPrincipalDecoder, IdentityDecoder};

pub use self::http::{Http, HttpFunction, HttpSettings};
pub use self::rpc::{Rpc, RpcFunction, RpcSettings, DEFAULT_ENVELOPE_FIELD};

/// Builder for HTTP-triggered functions.
pub type HttpFunctionBuilder = FunctionBuilder<Http>;

/// Builder for RPC-style functions.
pub type RpcFunctionBuilder = FunctionBuilder<Rpc>;

/// A trigger kind a builder can target.
///
/// The associated `Settings` type is the trigger-specific part of the
/// builder's configuration.
pub trait Trigger: Send + Sync + 'static {
    /// Trigger-specific settings carried by the builder
    type Settings: Clone + Default + fmt::Debug + Send + Sync + 'static;

    /// Name used in log events
    const NAME: &'static str;
}

/// Configuration accumulated by a builder.
///
/// Rules are evaluated in declaration order and must all pass.
pub struct FunctionBuilderContext<S> {
    rules: Vec<AuthorizationOptions>,
    decoder: Arc<dyn IdentityDecoder>,
    settings: S,
}

impl<S> FunctionBuilderContext<S> {
    /// Creates an empty context with the default identity decoder.
    pub fn new(settings: S) -> Self {
        Self {
            rules: Vec::new(),
            decoder: Arc::new(ClientPrincipalDecoder::default()),
            settings,
        }
    }

    /// Returns the declared authorization rules.
    pub fn rules(&self) -> &[AuthorizationOptions] {
        &self.rules
    }

    /// Returns the trigger-specific settings.
    pub fn settings(&self) -> &S {
        &self.settings
    }

    /// Returns the trigger-specific settings for modification.
    pub fn settings_mut(&mut self) -> &mut S {
        &mut self.settings
    }

    /// Appends a rule.
    pub fn push_rule(&mut self, options: AuthorizationOptions) {
        self.rules.push(options);
    }

    /// Replaces the identity decoder.
    pub fn set_decoder(&mut self, decoder: Arc<dyn IdentityDecoder>) {
        self.decoder = decoder;
    }
}

impl<S: Default> Default for FunctionBuilderContext<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: Clone> Clone for FunctionBuilderContext<S> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
            decoder: Arc::clone(&self.decoder),
            settings: self.settings.clone(),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for FunctionBuilderContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionBuilderContext")
            .field("rules", &self.rules)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Builder for a host-callable function of trigger kind `T`.
///
/// # Examples
///
/// ```
/// use serverless_kit::{AuthorizationOptions, HttpContext, HttpFunctionBuilder};
///
/// let function = HttpFunctionBuilder::new()
///     .allow_authenticated()
///     .allow(AuthorizationOptions::roles(["admin"]))
///     .on_request(|ctx: HttpContext| async move {
///         ctx.response().json(&serde_json::json!({ "ok": true }))?;
///         Ok(())
///     });
/// # let _ = function;
/// ```
pub struct FunctionBuilder<T: Trigger> {
    context: FunctionBuilderContext<T::Settings>,
    _trigger: PhantomData<T>,
}

impl<T: Trigger> FunctionBuilder<T> {
    /// Creates a builder with no rules (a public function).
    pub fn new() -> Self {
        Self::from_context(FunctionBuilderContext::default())
    }

    /// Creates a builder from an existing configuration.
    pub fn from_context(context: FunctionBuilderContext<T::Settings>) -> Self {
        Self {
            context,
            _trigger: PhantomData,
        }
    }

    /// Returns the accumulated configuration.
    pub fn context(&self) -> &FunctionBuilderContext<T::Settings> {
        &self.context
    }

    /// Adds an authorization rule.
    ///
    /// Rules accumulate; an invocation is permitted only if every rule
    /// permits it.
    pub fn allow(self, options: AuthorizationOptions) -> Self {
        let mut context = self.context;
        context.push_rule(options);
        Self::from_context(context)
    }

    /// Requires an authenticated caller.
    pub fn allow_authenticated(self) -> Self {
        self.allow(AuthorizationOptions::authenticated())
    }

    /// Requires a caller holding any of `roles`.
    pub fn allow_roles<I, S>(self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow(AuthorizationOptions::roles(roles))
    }

    /// Requires `predicate` to accept the caller.
    pub fn allow_if<F>(self, predicate: F) -> Self
    where
        F: Fn(Option<&AuthenticatedUser>) -> bool + Send + Sync + 'static,
    {
        self.allow(AuthorizationOptions::predicate(predicate))
    }

    /// Replaces the identity decoder.
    pub fn with_decoder<D>(self, decoder: D) -> Self
    where
        D: IdentityDecoder + 'static,
    {
        let mut context = self.context;
        context.set_decoder(Arc::new(decoder));
        Self::from_context(context)
    }

    pub(crate) fn map_settings(self, f: impl FnOnce(&mut T::Settings)) -> Self {
        let mut context = self.context;
        f(context.settings_mut());
        Self::from_context(context)
    }

    pub(crate) fn into_parts(self) -> (Authorizer, T::Settings) {
        let FunctionBuilderContext {
            rules,
            decoder,
            settings,
        } = self.context;
        let authorizer = Authorizer {
            trigger: T::NAME,
            gate: AuthorizationGate::new(rules),
            decoder,
        };
        (authorizer, settings)
    }
}

impl<T: Trigger> Default for FunctionBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Trigger> Clone for FunctionBuilder<T> {
    fn clone(&self) -> Self {
        Self::from_context(self.context.clone())
    }
}

impl<T: Trigger> fmt::Debug for FunctionBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionBuilder")
            .field("trigger", &T::NAME)
            .field("context", &self.context)
            .finish()
    }
}

/// Identity decoding plus the authorization gate, shared by every trigger.
pub(crate) struct Authorizer {
    trigger: &'static str,
    gate: AuthorizationGate,
    decoder: Arc<dyn IdentityDecoder>,
}

impl Authorizer {
    /// Decodes the caller and checks the gate.
    ///
    /// On denial the `401`/`403` response has already been written when this
    /// returns `Err`.
    pub(crate) async fn authorize(
        &self,
        host: &HostContext,
    ) -> Result<Option<AuthenticatedUser>, Denial> {
        let user = match self.decoder.decode(&host.req).await {
            Ok(user) => user,
            Err(e) => {
                tracing::debug!(
                    invocation_id = %host.log.invocation_id(),
                    error = %e,
                    "identity could not be decoded, treating caller as anonymous"
                );
                None
            }
        };

        if let Err(denial) = self.gate.check(user.as_ref()) {
            tracing::info!(
                invocation_id = %host.log.invocation_id(),
                function = %host.log.function_name(),
                trigger = self.trigger,
                status = denial.status().as_u16(),
                reason = %denial,
                "invocation denied"
            );
            host.res.status(denial.status());
            return Err(denial);
        }

        Ok(user)
    }
}

impl fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("trigger", &self.trigger)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_builder_has_no_rules() {
        let builder = RpcFunctionBuilder::new();
        assert!(builder.context().rules().is_empty());
    }

    #[test]
    fn chaining_accumulates_rules_in_order() {
        let builder: HttpFunctionBuilder = HttpFunctionBuilder::new()
            .allow_authenticated()
            .allow_roles(["admin"])
            .allow_if(|_| true);

        let rules = builder.context().rules();
        assert_eq!(rules.len(), 3);
        assert!(rules[0].authenticated);
        assert_eq!(rules[1].roles, vec!["admin".to_string()]);
        assert!(rules[2].predicate.is_some());
    }

    #[test]
    fn clones_are_independent() {
        let base = RpcFunctionBuilder::new().allow_authenticated();
        let stricter = base.clone().allow_roles(["admin"]);

        assert_eq!(base.context().rules().len(), 1);
        assert_eq!(stricter.context().rules().len(), 2);
    }

    #[test]
    fn from_context_keeps_settings() {
        let mut context = FunctionBuilderContext::<RpcSettings>::default();
        context.settings_mut().envelope_field = "payload".into();

        let builder = RpcFunctionBuilder::from_context(context).allow_authenticated();
        assert_eq!(builder.context().settings().envelope_field, "payload");
    }
}
