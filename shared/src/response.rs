//! Response envelope builder
//!
//! Every response follows the same three-part layout:
//! ```text
//! { context: { properties: [...] },
//!   event: { header: {...}, endpoint: {...}, payload: {...} } }
//! ```
//!
//! A [`ResponseBuilder`] accumulates context properties and discovery
//! endpoints for one response and merges them on [`ResponseBuilder::finalize`].
//! Message ids and sample times are drawn from a [`ResponseSource`] exactly
//! once, when the builder is created or the entry is appended.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::{namespace, utc_timestamp, DirectiveError, Scope, PAYLOAD_VERSION};

/// Response names that never carry an event endpoint
const ENDPOINTLESS_RESPONSES: [&str; 2] = ["AcceptGrant.Response", "Discover.Response"];

/// Source of message ids, sample times and generated endpoint numbers
pub trait ResponseSource {
    /// A fresh unique message id
    fn message_id(&mut self) -> String;

    /// Current time used for `timeOfSample`
    fn now(&mut self) -> DateTime<Utc>;

    /// Number in `0..=999_999` used for generated endpoint ids
    fn endpoint_number(&mut self) -> u32;
}

/// Wall clock and random UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSource;

impl ResponseSource for SystemSource {
    fn message_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }

    fn now(&mut self) -> DateTime<Utc> {
        Utc::now()
    }

    fn endpoint_number(&mut self) -> u32 {
        // Random bits of a v4 UUID, reduced to six digits
        (Uuid::new_v4().as_u128() % 1_000_000) as u32
    }
}

/// Frozen source for reproducible builds
#[derive(Debug, Clone)]
pub struct FixedSource {
    pub message_id: String,
    pub at: DateTime<Utc>,
    pub endpoint_number: u32,
}

impl ResponseSource for FixedSource {
    fn message_id(&mut self) -> String {
        self.message_id.clone()
    }

    fn now(&mut self) -> DateTime<Utc> {
        self.at
    }

    fn endpoint_number(&mut self) -> u32 {
        self.endpoint_number % 1_000_000
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Complete response document returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    pub event: Event,
}

impl ResponseEnvelope {
    pub fn name(&self) -> &str {
        &self.event.header.name
    }

    pub fn namespace(&self) -> &str {
        &self.event.header.namespace
    }

    /// Context properties, empty when the context was omitted
    pub fn properties(&self) -> &[ContextProperty] {
        self.context
            .as_ref()
            .map(|c| c.properties.as_slice())
            .unwrap_or_default()
    }

    /// The `type` field of an error payload
    pub fn error_type(&self) -> Option<&str> {
        if self.name() != "ErrorResponse" {
            return None;
        }
        self.event.payload.fields.get("type").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Context {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<ContextProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub header: EventHeader,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EventEndpoint>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHeader {
    pub namespace: String,
    pub name: String,
    pub message_id: String,
    pub payload_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEndpoint {
    pub scope: Scope,
    pub endpoint_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<Map<String, Value>>,
}

/// Event payload: free-form fields plus the discovery endpoint list
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventPayload {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<EndpointDescriptor>,
}

/// A timestamped observed value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextProperty {
    pub namespace: String,
    pub name: String,
    pub value: Value,
    pub time_of_sample: String,
    pub uncertainty_in_milliseconds: u64,
}

/// An endpoint advertised in a discovery response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    pub endpoint_id: String,
    pub friendly_name: String,
    pub description: String,
    pub manufacturer_name: String,
    pub display_categories: Vec<String>,
    pub capabilities: Vec<CapabilityDescriptor>,
    pub additional_attributes: AdditionalAttributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalAttributes {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_version: String,
    pub software_version: String,
    pub custom_identifier: String,
}

impl Default for AdditionalAttributes {
    fn default() -> Self {
        Self {
            manufacturer: "Oliver e Maria".into(),
            model: "Sample Model".into(),
            serial_number: "U11112233456".into(),
            firmware_version: "1.24.2546".into(),
            software_version: "1.036".into(),
            custom_identifier: "Sample custom ID".into(),
        }
    }
}

/// A declared interface of an endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub interface: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<CapabilityProperties>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityProperties {
    pub supported: Vec<SupportedProperty>,
    pub proactively_reported: bool,
    pub retrievable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupportedProperty {
    pub name: String,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Header and endpoint settings for a new response
#[derive(Debug, Clone)]
pub struct ResponseOptions {
    pub namespace: String,
    pub name: String,
    pub payload_version: String,
    pub endpoint_id: String,
    pub token: String,
    pub correlation_token: Option<String>,
    pub cookie: Option<Map<String, Value>>,
    pub payload: Map<String, Value>,
}

impl Default for ResponseOptions {
    fn default() -> Self {
        Self {
            namespace: namespace::ALEXA.into(),
            name: "Response".into(),
            payload_version: PAYLOAD_VERSION.into(),
            endpoint_id: "INVALID".into(),
            token: "INVALID".into(),
            correlation_token: None,
            cookie: None,
            payload: Map::new(),
        }
    }
}

impl ResponseOptions {
    pub fn named(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Options for an `ErrorResponse` with a `{type, message}` payload
    pub fn error(error: &DirectiveError) -> Self {
        let mut payload = Map::new();
        payload.insert("type".into(), Value::from(error.kind.as_str()));
        payload.insert("message".into(), Value::from(error.message.clone()));
        Self {
            namespace: error.kind.namespace().into(),
            name: "ErrorResponse".into(),
            payload,
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint_id: impl Into<String>, token: impl Into<String>) -> Self {
        self.endpoint_id = endpoint_id.into();
        self.token = token.into();
        self
    }

    pub fn with_correlation_token(mut self, correlation_token: Option<String>) -> Self {
        self.correlation_token = correlation_token;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ContextPropertyOptions {
    pub namespace: String,
    pub name: String,
    pub value: Value,
    pub uncertainty_in_milliseconds: u64,
}

impl Default for ContextPropertyOptions {
    fn default() -> Self {
        Self {
            namespace: namespace::ENDPOINT_HEALTH.into(),
            name: "connectivity".into(),
            value: json!({ "value": "OK" }),
            uncertainty_in_milliseconds: 0,
        }
    }
}

impl ContextPropertyOptions {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct EndpointOptions {
    /// Generated as `endpoint_NNNNNN` when absent
    pub endpoint_id: Option<String>,
    pub friendly_name: String,
    pub description: String,
    pub manufacturer_name: String,
    pub display_categories: Vec<String>,
    pub capabilities: Vec<CapabilityDescriptor>,
    pub additional_attributes: AdditionalAttributes,
    pub cookie: Option<Map<String, Value>>,
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            endpoint_id: None,
            friendly_name: "Smart Light".into(),
            description: "Smart Light for PSI3541".into(),
            manufacturer_name: "Oliver e Maria".into(),
            display_categories: vec!["LIGHT".into()],
            capabilities: Vec::new(),
            additional_attributes: AdditionalAttributes::default(),
            cookie: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapabilityOptions {
    pub interface: String,
    pub version: String,
    /// Property names; `None` or empty omits the properties block
    pub supported: Option<Vec<String>>,
    pub proactively_reported: bool,
    pub retrievable: bool,
}

impl Default for CapabilityOptions {
    fn default() -> Self {
        Self {
            interface: namespace::ALEXA.into(),
            version: PAYLOAD_VERSION.into(),
            supported: None,
            proactively_reported: true,
            retrievable: true,
        }
    }
}

impl CapabilityOptions {
    pub fn interface(interface: impl Into<String>, supported: &[&str]) -> Self {
        Self {
            interface: interface.into(),
            supported: Some(supported.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Accumulates one response under construction
#[derive(Debug)]
pub struct ResponseBuilder<S = SystemSource> {
    source: S,
    event: Event,
    context_properties: Vec<ContextProperty>,
    payload_endpoints: Vec<EndpointDescriptor>,
}

impl ResponseBuilder<SystemSource> {
    pub fn new(options: ResponseOptions) -> Self {
        Self::with_source(options, SystemSource)
    }

    /// Describe one capability; does not touch the builder
    pub fn build_capability(options: CapabilityOptions) -> CapabilityDescriptor {
        let properties = options
            .supported
            .filter(|names| !names.is_empty())
            .map(|names| CapabilityProperties {
                supported: names
                    .into_iter()
                    .map(|name| SupportedProperty { name })
                    .collect(),
                proactively_reported: options.proactively_reported,
                retrievable: options.retrievable,
            });

        CapabilityDescriptor {
            kind: "AlexaInterface".into(),
            interface: options.interface,
            version: options.version,
            properties,
        }
    }
}

impl<S: ResponseSource> ResponseBuilder<S> {
    /// Start a response, drawing its message id from `source`
    pub fn with_source(options: ResponseOptions, mut source: S) -> Self {
        let endpoint = if ENDPOINTLESS_RESPONSES.contains(&options.name.as_str()) {
            None
        } else {
            Some(EventEndpoint {
                scope: Scope::bearer(options.token),
                endpoint_id: options.endpoint_id,
                cookie: options.cookie,
            })
        };

        let header = EventHeader {
            namespace: options.namespace,
            name: options.name,
            message_id: source.message_id(),
            payload_version: options.payload_version,
            correlation_token: options.correlation_token,
        };

        Self {
            source,
            event: Event {
                header,
                endpoint,
                payload: EventPayload {
                    fields: options.payload,
                    endpoints: Vec::new(),
                },
            },
            context_properties: Vec::new(),
            payload_endpoints: Vec::new(),
        }
    }

    /// Append one context property sampled now
    pub fn add_context_property(&mut self, options: ContextPropertyOptions) -> &mut Self {
        let time_of_sample = utc_timestamp(self.source.now());
        self.context_properties.push(ContextProperty {
            namespace: options.namespace,
            name: options.name,
            value: options.value,
            time_of_sample,
            uncertainty_in_milliseconds: options.uncertainty_in_milliseconds,
        });
        self
    }

    /// Append one discovery endpoint
    pub fn add_payload_endpoint(&mut self, options: EndpointOptions) -> &mut Self {
        let endpoint_id = match options.endpoint_id {
            Some(id) => id,
            None => format!("endpoint_{:06}", self.source.endpoint_number()),
        };
        self.payload_endpoints.push(EndpointDescriptor {
            endpoint_id,
            friendly_name: options.friendly_name,
            description: options.description,
            manufacturer_name: options.manufacturer_name,
            display_categories: options.display_categories,
            capabilities: options.capabilities,
            additional_attributes: options.additional_attributes,
            cookie: options.cookie,
        });
        self
    }

    pub fn set_payload(&mut self, payload: Map<String, Value>) -> &mut Self {
        self.event.payload.fields = payload;
        self
    }

    /// Replace the accumulated discovery endpoints
    pub fn set_payload_endpoints(&mut self, endpoints: Vec<EndpointDescriptor>) -> &mut Self {
        self.payload_endpoints = endpoints;
        self
    }

    /// Finish the envelope, omitting an empty context
    pub fn finalize(self) -> ResponseEnvelope {
        self.finalize_with(true)
    }

    pub fn finalize_with(self, omit_empty_context: bool) -> ResponseEnvelope {
        let mut event = self.event;

        if !self.payload_endpoints.is_empty() {
            event.payload.fields.remove("endpoints");
            event.payload.endpoints = self.payload_endpoints;
        }

        let context = if self.context_properties.is_empty() && omit_empty_context {
            None
        } else {
            Some(Context {
                properties: self.context_properties,
            })
        };

        ResponseEnvelope { context, event }
    }
}
