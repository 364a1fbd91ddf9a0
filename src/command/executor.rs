//! Directive executor - validates and dispatches incoming directives

use super::handlers::{self, HandlerContext, HandlerResult};
use crate::config::AdapterConfig;
use crate::device::{AuthorizationProvider, CommandChannel, StateStore};
use bytes::Bytes;
use serde_json::Value;
use skillbridge_shared::codec::{self, CodecError};
use skillbridge_shared::{
    Directive, DirectiveError, DirectiveKind, ResponseBuilder, ResponseEnvelope, ResponseOptions,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Invocation metadata supplied by the hosting environment
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    pub request_id: String,
    pub function_name: Option<String>,
    pub remaining_time_ms: Option<u64>,
}

/// Executes directives against the device cloud collaborators
pub struct DirectiveExecutor {
    config: AdapterConfig,
    store: Arc<dyn StateStore>,
    channel: Arc<dyn CommandChannel>,
    authorization: Arc<dyn AuthorizationProvider>,
}

impl DirectiveExecutor {
    /// Create a new directive executor
    pub fn new(
        config: AdapterConfig,
        store: Arc<dyn StateStore>,
        channel: Arc<dyn CommandChannel>,
        authorization: Arc<dyn AuthorizationProvider>,
    ) -> Self {
        Self {
            config,
            store,
            channel,
            authorization,
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Handle one request document and return its response envelope
    ///
    /// Never fails: every problem is reported as an `ErrorResponse`.
    pub async fn handle(
        &self,
        request: &Value,
        context: Option<&InvocationContext>,
    ) -> ResponseEnvelope {
        let start = Instant::now();
        info!("Request: {}", request);
        if let Some(context) = context {
            debug!("Context: {:?}", context);
        }

        let response = match parse_directive(request) {
            Ok(directive) => self.execute(&directive).await,
            Err(error) => {
                warn!("  Directive rejected: {}", error);
                error_envelope(&error, None)
            }
        };

        match serde_json::to_string(&response) {
            Ok(doc) => info!("Response ({}ms): {}", start.elapsed().as_millis(), doc),
            Err(e) => warn!("Response could not be serialized for logging: {}", e),
        }
        response
    }

    /// Dispatch an already parsed directive
    pub async fn execute(&self, directive: &Directive) -> ResponseEnvelope {
        if let Err(version) = directive.check_version() {
            warn!("  Unsupported payload version: {:?}", version);
            let error =
                DirectiveError::internal("This skill only supports Smart Home API version 3");
            return error_envelope(&error, Some(directive));
        }

        let kind = directive.kind();
        info!(
            "Executing directive: {}.{} ({:?})",
            directive.header.namespace, directive.header.name, kind
        );

        let ctx = HandlerContext {
            directive,
            config: &self.config,
        };

        // Dispatch to appropriate handler
        let result: HandlerResult = match kind {
            DirectiveKind::AcceptGrant => {
                handlers::handle_accept_grant(&ctx, self.authorization.as_ref()).await
            }
            DirectiveKind::Discover => handlers::handle_discover(&ctx).await,
            DirectiveKind::TurnOn => handlers::handle_power(&ctx, self.channel.as_ref(), true).await,
            DirectiveKind::TurnOff => {
                handlers::handle_power(&ctx, self.channel.as_ref(), false).await
            }
            DirectiveKind::ReportState => {
                handlers::handle_report_state(&ctx, self.store.as_ref()).await
            }
            DirectiveKind::Unsupported { namespace, name } => Err(
                DirectiveError::invalid_directive(format!("{}.{} is not supported", namespace, name)),
            ),
        };

        match result {
            Ok(response) => {
                info!("  Directive completed: {}", response.name());
                response
            }
            Err(error) => {
                warn!("  Directive failed: {}", error);
                error_envelope(&error, Some(directive))
            }
        }
    }
}

/// Extract the directive from a request document
fn parse_directive(request: &Value) -> Result<Directive, DirectiveError> {
    let raw = request.get("directive").ok_or_else(|| {
        DirectiveError::invalid_directive(
            "Missing key: directive, Is the request a valid Alexa Directive?",
        )
    })?;

    serde_json::from_value(raw.clone())
        .map_err(|e| DirectiveError::invalid_directive(format!("Malformed directive: {}", e)))
}

/// `INVALID_DIRECTIVE` response for a document that could not be decoded
pub fn undecodable_request(reason: impl std::fmt::Display) -> ResponseEnvelope {
    let error = DirectiveError::invalid_directive(format!("Unreadable request: {}", reason));
    error_envelope(&error, None)
}

/// Encode a response for the caller
///
/// A response that cannot be encoded (for example one pushed past the size
/// limit by an echoed cookie) is replaced by an `INTERNAL_ERROR` envelope
/// that keeps the correlation token and endpoint but drops the cookie.
pub fn encode_response(response: &ResponseEnvelope) -> Result<Bytes, CodecError> {
    let reason = match codec::encode_envelope(response) {
        Ok(encoded) => return Ok(encoded),
        Err(e) => e,
    };
    error!("{} could not be encoded: {}", response.name(), reason);

    let error = DirectiveError::internal(format!("Response could not be encoded: {}", reason));
    let mut options = ResponseOptions::error(&error)
        .with_correlation_token(response.event.header.correlation_token.clone());
    if let Some(endpoint) = &response.event.endpoint {
        options = options.with_endpoint(endpoint.endpoint_id.clone(), endpoint.scope.token.clone());
    }

    codec::encode_envelope(&ResponseBuilder::new(options).finalize()).or_else(|_| {
        codec::encode_envelope(&ResponseBuilder::new(ResponseOptions::error(&error)).finalize())
    })
}

/// Build an `ErrorResponse`, echoing what is known of the directive
fn error_envelope(error: &DirectiveError, directive: Option<&Directive>) -> ResponseEnvelope {
    let mut options = ResponseOptions::error(error);

    if let Some(directive) = directive {
        options.correlation_token = directive.header.correlation_token.clone();
        if let Some(endpoint) = &directive.endpoint {
            options.endpoint_id = endpoint.endpoint_id.clone();
            if let Some(scope) = &endpoint.scope {
                options.token = scope.token.clone();
            }
        }
    }

    ResponseBuilder::new(options).finalize()
}
