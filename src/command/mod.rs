//! Directive execution for the adapter
//!
//! This module handles:
//! - Validating inbound request documents
//! - Dispatching directives to the handler for their (namespace, name)
//! - Turning handler failures into `ErrorResponse` envelopes

mod executor;
pub mod handlers;

pub use executor::{encode_response, undecodable_request, DirectiveExecutor, InvocationContext};
