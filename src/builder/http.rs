use std::future::Future;

use async_trait::async_trait;

use super::{Authorizer, FunctionBuilder, Trigger};
use crate::context::HttpContext;
use crate::error::FunctionError;
use crate::host::{HostContext, ServerlessFunction};
use crate::web::parse_body_with;

/// Marker for HTTP triggers.
#[derive(Debug, Clone, Copy)]
pub struct Http;

impl Trigger for Http {
    type Settings = HttpSettings;
    const NAME: &'static str = "http";
}

/// HTTP-specific builder settings.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Decode `multipart/form-data` bodies into form fields
    pub multipart: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { multipart: true }
    }
}

impl FunctionBuilder<Http> {
    /// Keeps `multipart/form-data` bodies as raw bytes instead of decoding them.
    pub fn without_multipart(self) -> Self {
        self.map_settings(|settings| settings.multipart = false)
    }

    /// Finishes the builder with a request handler.
    ///
    /// The handler writes its response through
    /// [`HttpContext::response`]; its `Ok(())` is not post-processed. It only
    /// runs once the caller passed every declared rule.
    pub fn on_request<H, Fut>(self, handler: H) -> HttpFunction<H>
    where
        H: Fn(HttpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let (authorizer, settings) = self.into_parts();
        HttpFunction {
            authorizer,
            settings,
            handler,
        }
    }
}

/// An HTTP-triggered function produced by [`FunctionBuilder::on_request`].
#[derive(Debug)]
pub struct HttpFunction<H> {
    authorizer: Authorizer,
    settings: HttpSettings,
    handler: H,
}

#[async_trait]
impl<H, Fut> ServerlessFunction for HttpFunction<H>
where
    H: Fn(HttpContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn invoke(&self, host: &HostContext) -> Result<(), FunctionError> {
        // 1-2. Identity and authorization; a denial is already answered
        let Ok(user) = self.authorizer.authorize(host).await else {
            return Ok(());
        };

        // 3. Body
        let input = parse_body_with(&host.req, self.settings.multipart).await;

        // 4-5. Context and handler
        let ctx = HttpContext::http(
            user,
            host.log.clone(),
            input,
            host.req.clone(),
            host.res.clone(),
        );
        (self.handler)(ctx).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostRequest;
    use http::StatusCode;

    #[tokio::test]
    async fn public_function_runs_handler() {
        let function = FunctionBuilder::<Http>::new().on_request(|ctx: HttpContext| async move {
            ctx.response().text(StatusCode::OK, "pong");
            Ok(())
        });

        let host = HostContext::new("ping", HostRequest::default());
        function.invoke(&host).await.unwrap();

        let response = host.take_response().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], b"pong");
    }

    #[tokio::test]
    async fn handler_error_propagates() {
        let function = FunctionBuilder::<Http>::new()
            .on_request(|_ctx: HttpContext| async move { Err(anyhow::anyhow!("boom")) });

        let host = HostContext::new("fails", HostRequest::default());
        let err = function.invoke(&host).await.unwrap_err();

        assert!(matches!(err, FunctionError::Handler(_)));
        assert_eq!(err.to_string(), "boom");
        assert!(host.take_response().is_none());
    }

    #[test]
    fn without_multipart_updates_settings() {
        let builder = FunctionBuilder::<Http>::new().without_multipart();
        assert!(!builder.context().settings().multipart);
    }
}
