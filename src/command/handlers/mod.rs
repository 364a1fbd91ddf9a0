//! Directive handlers, one per supported behavior

mod authorization;
mod discovery;
mod power;
mod state_report;

pub use authorization::handle_accept_grant;
pub use discovery::handle_discover;
pub use power::handle_power;
pub use state_report::handle_report_state;

use crate::config::AdapterConfig;
use anyhow::anyhow;
use skillbridge_shared::{Directive, DirectiveError, ResponseEnvelope, ResponseOptions};
use std::future::Future;

/// What a handler produces: a response, or an error for the executor to wrap
pub type HandlerResult = Result<ResponseEnvelope, DirectiveError>;

/// Context passed to directive handlers
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    pub directive: &'a Directive,
    pub config: &'a AdapterConfig,
}

impl<'a> HandlerContext<'a> {
    /// Target endpoint id; directives that act on a device must carry one
    pub fn endpoint_id(&self) -> Result<&'a str, DirectiveError> {
        let directive: &'a Directive = self.directive;
        directive
            .endpoint
            .as_ref()
            .map(|e| e.endpoint_id.as_str())
            .ok_or_else(|| {
                DirectiveError::invalid_directive(format!(
                    "{}.{} requires an endpoint",
                    directive.header.namespace, directive.header.name
                ))
            })
    }

    /// Scope token to echo, falling back to the configured one
    pub fn token(&self) -> &'a str {
        let directive: &'a Directive = self.directive;
        let config: &'a AdapterConfig = self.config;
        directive
            .scope_token()
            .unwrap_or(config.default_token.as_str())
    }

    /// Options for a response addressed back at the directive's endpoint
    pub fn response_options(
        &self,
        namespace: &str,
        name: &str,
        endpoint_id: &str,
    ) -> ResponseOptions {
        let mut options = ResponseOptions::named(namespace, name)
            .with_endpoint(endpoint_id, self.token())
            .with_correlation_token(self.directive.header.correlation_token.clone());
        options.cookie = self.directive.endpoint.as_ref().and_then(|e| e.cookie.clone());
        options
    }

    /// Run a collaborator call under the configured timeout
    pub async fn bounded<T>(
        &self,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let limit = self.config.collaborator_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("timed out after {}ms", limit.as_millis())),
        }
    }
}
