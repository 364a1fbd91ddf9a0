//! State report handler

use super::{HandlerContext, HandlerResult};
use crate::device::StateStore;
use skillbridge_shared::{
    namespace, ContextPropertyOptions, DirectiveError, ErrorKind, ResponseBuilder,
};
use tracing::{info, warn};

/// Handle Alexa ReportState
///
/// Reports the brightness of the bound device from its newest luminosity
/// reading in the state store.
pub async fn handle_report_state(ctx: &HandlerContext<'_>, store: &dyn StateStore) -> HandlerResult {
    let endpoint_id = ctx.endpoint_id()?;
    let binding = ctx.config.binding(endpoint_id).ok_or_else(|| {
        DirectiveError::new(
            ErrorKind::NoSuchEndpoint,
            format!("No device is bound to endpoint {}", endpoint_id),
        )
    })?;

    let record = ctx
        .bounded(store.latest(&binding.serial_number))
        .await
        .map_err(|e| {
            warn!("  [REPORT_STATE] {} store query failed: {:#}", store.name(), e);
            DirectiveError::unreachable(format!("Unable to read state of {}: {}", endpoint_id, e))
        })?
        .ok_or_else(|| {
            DirectiveError::unreachable(format!(
                "No state recorded for {} ({})",
                endpoint_id, binding.serial_number
            ))
        })?;

    let luminosity = record.luminosity().ok_or_else(|| {
        DirectiveError::internal(format!(
            "Record {} of {} has no luminosity",
            record.timestamp, binding.serial_number
        ))
    })?;

    info!(
        "  [REPORT_STATE] {} ({}) luminosity={}",
        endpoint_id, binding.serial_number, luminosity
    );

    let mut response = ResponseBuilder::new(ctx.response_options(
        namespace::ALEXA,
        "StateReport",
        endpoint_id,
    ));
    response.add_context_property(ContextPropertyOptions {
        uncertainty_in_milliseconds: ctx.config.report_uncertainty_ms,
        ..ContextPropertyOptions::new(namespace::BRIGHTNESS_CONTROLLER, "brightness", luminosity)
    });
    Ok(response.finalize())
}
