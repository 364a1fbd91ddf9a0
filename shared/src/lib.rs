//! Skillbridge Shared Protocol Types
//!
//! This crate provides the smart-home directive types, the response
//! envelope builder and the JSON codec shared by the adapter binary.

pub mod codec;
pub mod response;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use response::{
    AdditionalAttributes, CapabilityDescriptor, CapabilityOptions, ContextProperty,
    ContextPropertyOptions, EndpointDescriptor, EndpointOptions, FixedSource, ResponseBuilder,
    ResponseEnvelope, ResponseOptions, ResponseSource, SystemSource,
};

/// The only payload version this adapter speaks
pub const PAYLOAD_VERSION: &str = "3";

/// Interface namespaces used by the adapter
pub mod namespace {
    pub const ALEXA: &str = "Alexa";
    pub const AUTHORIZATION: &str = "Alexa.Authorization";
    pub const DISCOVERY: &str = "Alexa.Discovery";
    pub const POWER_CONTROLLER: &str = "Alexa.PowerController";
    pub const BRIGHTNESS_CONTROLLER: &str = "Alexa.BrightnessController";
    pub const ENDPOINT_HEALTH: &str = "Alexa.EndpointHealth";
}

/// ISO-8601 UTC timestamp, e.g. `2024-04-29T10:15:00.123Z`
pub fn utc_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Inbound request document wrapping a single directive
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub directive: Option<Directive>,
}

/// A smart-home directive
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Directive {
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub namespace: String,
    pub name: String,
    /// Raw JSON; anything but the string "3" fails `check_version`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_version: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Target endpoint of a directive
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub endpoint_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<Map<String, Value>>,
}

/// Credential reference attached to an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Scope {
    #[serde(rename = "type")]
    pub kind: String,
    pub token: String,
}

impl Scope {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            kind: "BearerToken".into(),
            token: token.into(),
        }
    }
}

/// Behavior selected by a directive's (namespace, name) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveKind {
    AcceptGrant,
    Discover,
    TurnOn,
    TurnOff,
    ReportState,
    Unsupported { namespace: String, name: String },
}

impl DirectiveKind {
    pub fn classify(namespace: &str, name: &str) -> Self {
        match (namespace, name) {
            (namespace::AUTHORIZATION, "AcceptGrant") => Self::AcceptGrant,
            (namespace::DISCOVERY, "Discover") => Self::Discover,
            (namespace::POWER_CONTROLLER, "TurnOn") => Self::TurnOn,
            (namespace::POWER_CONTROLLER, "TurnOff") => Self::TurnOff,
            (namespace::ALEXA, "ReportState") => Self::ReportState,
            _ => Self::Unsupported {
                namespace: namespace.into(),
                name: name.into(),
            },
        }
    }
}

impl Directive {
    /// Classify this directive for dispatch
    pub fn kind(&self) -> DirectiveKind {
        DirectiveKind::classify(&self.header.namespace, &self.header.name)
    }

    /// Check the payload version, returning the offending value on mismatch
    pub fn check_version(&self) -> Result<(), Option<&Value>> {
        match &self.header.payload_version {
            Some(Value::String(v)) if v == PAYLOAD_VERSION => Ok(()),
            other => Err(other.as_ref()),
        }
    }

    /// Bearer token from the endpoint scope, if any
    pub fn scope_token(&self) -> Option<&str> {
        self.endpoint
            .as_ref()
            .and_then(|e| e.scope.as_ref())
            .map(|s| s.token.as_str())
    }

    /// Extract the grant and grantee from an AcceptGrant payload
    pub fn grant(&self) -> Option<GrantRequest> {
        serde_json::from_value(Value::Object(self.payload.clone())).ok()
    }
}

/// Payload of an `Alexa.Authorization.AcceptGrant` directive
#[derive(Debug, Clone, Deserialize)]
pub struct GrantRequest {
    pub grant: Grant,
    pub grantee: Grantee,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Grant {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Grantee {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub token: String,
}

/// Error types reported in `ErrorResponse` payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidDirective,
    InternalError,
    EndpointUnreachable,
    NoSuchEndpoint,
    AcceptGrantFailed,
}

impl ErrorKind {
    /// Wire name written to `payload.type`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidDirective => "INVALID_DIRECTIVE",
            Self::InternalError => "INTERNAL_ERROR",
            Self::EndpointUnreachable => "ENDPOINT_UNREACHABLE",
            Self::NoSuchEndpoint => "NO_SUCH_ENDPOINT",
            Self::AcceptGrantFailed => "ACCEPT_GRANT_FAILED",
        }
    }

    /// Namespace the error envelope is reported under
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::AcceptGrantFailed => namespace::AUTHORIZATION,
            _ => namespace::ALEXA,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directive that could not be served, carried to the error envelope
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct DirectiveError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DirectiveError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_directive(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidDirective, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EndpointUnreachable, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn parse(doc: Value) -> Directive {
        let request: Request = serde_json::from_value(doc).expect("valid request");
        request.directive.expect("directive present")
    }

    #[test]
    fn test_classify_routing_table() {
        assert_eq!(
            DirectiveKind::classify("Alexa.Authorization", "AcceptGrant"),
            DirectiveKind::AcceptGrant
        );
        assert_eq!(
            DirectiveKind::classify("Alexa.Discovery", "Discover"),
            DirectiveKind::Discover
        );
        assert_eq!(
            DirectiveKind::classify("Alexa.PowerController", "TurnOff"),
            DirectiveKind::TurnOff
        );
        assert_eq!(
            DirectiveKind::classify("Alexa", "ReportState"),
            DirectiveKind::ReportState
        );
        assert!(matches!(
            DirectiveKind::classify("Alexa.ColorController", "SetColor"),
            DirectiveKind::Unsupported { .. }
        ));
        // Names are only meaningful within their namespace
        assert!(matches!(
            DirectiveKind::classify("Alexa", "TurnOn"),
            DirectiveKind::Unsupported { .. }
        ));
    }

    #[test]
    fn test_directive_parsing() {
        let directive = parse(json!({
            "directive": {
                "header": {
                    "namespace": "Alexa.PowerController",
                    "name": "TurnOn",
                    "payloadVersion": "3",
                    "correlationToken": "tok1",
                    "messageId": "m-1"
                },
                "endpoint": {
                    "endpointId": "sample-bulb-01",
                    "scope": { "type": "BearerToken", "token": "abc" }
                },
                "payload": {}
            }
        }));

        assert_eq!(directive.kind(), DirectiveKind::TurnOn);
        assert!(directive.check_version().is_ok());
        assert_eq!(directive.header.correlation_token.as_deref(), Some("tok1"));
        assert_eq!(directive.scope_token(), Some("abc"));
    }

    #[test]
    fn test_version_mismatch() {
        let directive = parse(json!({
            "directive": { "header": { "namespace": "Alexa", "name": "ReportState", "payloadVersion": "2" } }
        }));
        assert_eq!(directive.check_version(), Err(Some(&json!("2"))));

        let directive = parse(json!({
            "directive": { "header": { "namespace": "Alexa", "name": "ReportState" } }
        }));
        assert_eq!(directive.check_version(), Err(None));

        // A numeric version parses but is not the string "3"
        let directive = parse(json!({
            "directive": { "header": { "namespace": "Alexa.Discovery", "name": "Discover", "payloadVersion": 3 } }
        }));
        assert_eq!(directive.check_version(), Err(Some(&json!(3))));
    }

    #[test]
    fn test_grant_extraction() {
        let directive = parse(json!({
            "directive": {
                "header": { "namespace": "Alexa.Authorization", "name": "AcceptGrant", "payloadVersion": "3" },
                "payload": {
                    "grant": { "type": "OAuth2.AuthorizationCode", "code": "code-1" },
                    "grantee": { "type": "BearerToken", "token": "grantee-1" }
                }
            }
        }));
        let grant = directive.grant().expect("grant present");
        assert_eq!(grant.grant.code, "code-1");
        assert_eq!(grant.grant.kind.as_deref(), Some("OAuth2.AuthorizationCode"));
        assert_eq!(grant.grantee.kind.as_deref(), Some("BearerToken"));
        assert_eq!(grant.grantee.token, "grantee-1");

        let directive = parse(json!({
            "directive": { "header": { "namespace": "Alexa.Authorization", "name": "AcceptGrant", "payloadVersion": "3" } }
        }));
        assert!(directive.grant().is_none());
    }

    #[test]
    fn test_error_kind_wire_names() {
        assert_eq!(ErrorKind::EndpointUnreachable.as_str(), "ENDPOINT_UNREACHABLE");
        assert_eq!(ErrorKind::InvalidDirective.to_string(), "INVALID_DIRECTIVE");
        assert_eq!(ErrorKind::AcceptGrantFailed.namespace(), "Alexa.Authorization");
    }

    #[test]
    fn test_utc_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2024, 4, 29, 10, 15, 0).unwrap();
        assert_eq!(utc_timestamp(at), "2024-04-29T10:15:00.000Z");
    }
}
