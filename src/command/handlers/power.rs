//! Power controller handler

use super::{HandlerContext, HandlerResult};
use crate::device::CommandChannel;
use skillbridge_shared::codec::ShadowUpdate;
use skillbridge_shared::{namespace, ContextPropertyOptions, DirectiveError, ResponseBuilder};
use tracing::{info, warn};

/// Handle Alexa.PowerController TurnOn / TurnOff
pub async fn handle_power(
    ctx: &HandlerContext<'_>,
    channel: &dyn CommandChannel,
    turn_on: bool,
) -> HandlerResult {
    let endpoint_id = ctx.endpoint_id()?;
    let update = ShadowUpdate::power(turn_on);
    let power = update.desired_power();

    info!("  [POWER] {} -> power={} via {}", endpoint_id, power, channel.name());

    if let Err(e) = ctx.bounded(channel.publish_desired(endpoint_id, &update)).await {
        warn!("  [POWER] Publish failed: {:#}", e);
        return Err(DirectiveError::unreachable(format!(
            "Unable to reach endpoint {}: {}",
            endpoint_id, e
        )));
    }

    let mut response =
        ResponseBuilder::new(ctx.response_options(namespace::ALEXA, "Response", endpoint_id));
    response.add_context_property(ContextPropertyOptions::new(
        namespace::POWER_CONTROLLER,
        "powerState",
        power,
    ));
    Ok(response.finalize())
}
