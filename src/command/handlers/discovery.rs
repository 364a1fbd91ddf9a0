//! Discovery handler

use super::{HandlerContext, HandlerResult};
use skillbridge_shared::{
    namespace, AdditionalAttributes, CapabilityOptions, EndpointOptions, ResponseBuilder,
    ResponseOptions,
};
use tracing::info;

/// Handle Alexa.Discovery Discover
///
/// Advertises the single configured light with the base interface plus
/// endpoint health, power and brightness control.
pub async fn handle_discover(ctx: &HandlerContext<'_>) -> HandlerResult {
    let profile = &ctx.config.discovery;

    let capabilities = vec![
        ResponseBuilder::build_capability(CapabilityOptions::default()),
        ResponseBuilder::build_capability(CapabilityOptions::interface(
            namespace::ENDPOINT_HEALTH,
            &["connectivity"],
        )),
        ResponseBuilder::build_capability(CapabilityOptions::interface(
            namespace::POWER_CONTROLLER,
            &["powerState"],
        )),
        ResponseBuilder::build_capability(CapabilityOptions::interface(
            namespace::BRIGHTNESS_CONTROLLER,
            &["brightness"],
        )),
    ];

    let mut additional_attributes = AdditionalAttributes::default();
    if let Some(binding) = ctx.config.binding(&profile.endpoint_id) {
        additional_attributes.serial_number = binding.serial_number.clone();
    }

    let mut response =
        ResponseBuilder::new(ResponseOptions::named(namespace::DISCOVERY, "Discover.Response"));
    response.add_payload_endpoint(EndpointOptions {
        endpoint_id: Some(profile.endpoint_id.clone()),
        friendly_name: profile.friendly_name.clone(),
        capabilities,
        additional_attributes,
        ..Default::default()
    });

    info!(
        "  [DISCOVER] Advertising {} ({})",
        profile.endpoint_id, profile.friendly_name
    );
    Ok(response.finalize())
}
