use std::fmt;
use std::sync::Arc;

/// Structured logging sink for one invocation.
///
/// The host creates one per invocation and the builder hands a clone to the
/// handler's context. Every event carries the invocation id and function
/// name as `tracing` fields.
#[derive(Debug, Clone)]
pub struct InvocationLog {
    invocation_id: Arc<str>,
    function_name: Arc<str>,
}

impl InvocationLog {
    /// Creates a log sink for the given invocation.
    pub fn new(invocation_id: impl Into<Arc<str>>, function_name: impl Into<Arc<str>>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            function_name: function_name.into(),
        }
    }

    /// Returns the invocation id associated with this logger.
    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    /// Returns the name of the function being invoked.
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Logs an info-level message.
    ///
    /// Use with `format_args!`:
    /// ```no_run
    /// # use serverless_kit::InvocationLog;
    /// # fn example(log: &InvocationLog) {
    /// log.info(format_args!("created order {}", 42));
    /// # }
    /// ```
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(
            invocation_id = %self.invocation_id,
            function = %self.function_name,
            "{}",
            args
        );
    }

    /// Logs a warning-level message.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(
            invocation_id = %self.invocation_id,
            function = %self.function_name,
            "{}",
            args
        );
    }

    /// Logs an error-level message.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(
            invocation_id = %self.invocation_id,
            function = %self.function_name,
            "{}",
            args
        );
    }

    /// Logs a debug-level message.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(
            invocation_id = %self.invocation_id,
            function = %self.function_name,
            "{}",
            args
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let log = InvocationLog::new("inv-1", "createOrder");
        let copy = log.clone();

        assert_eq!(copy.invocation_id(), "inv-1");
        assert_eq!(copy.function_name(), "createOrder");
    }

    #[test]
    fn logging_without_subscriber_does_not_panic() {
        let log = InvocationLog::new("inv-2", "ping");
        log.info(format_args!("hello {}", "world"));
        log.warn(format_args!("careful"));
        log.error(format_args!("broken"));
        log.debug(format_args!("details"));
    }
}
