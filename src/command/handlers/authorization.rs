//! Authorization grant handler

use super::{HandlerContext, HandlerResult};
use crate::device::{AuthorizationProvider, GrantOutcome};
use skillbridge_shared::{
    namespace, DirectiveError, ErrorKind, ResponseBuilder, ResponseOptions,
};
use tracing::{info, warn};

/// Handle Alexa.Authorization AcceptGrant
pub async fn handle_accept_grant(
    ctx: &HandlerContext<'_>,
    provider: &dyn AuthorizationProvider,
) -> HandlerResult {
    let grant = ctx.directive.grant().ok_or_else(|| {
        DirectiveError::invalid_directive("AcceptGrant requires payload.grant.code and payload.grantee.token")
    })?;
    info!(
        "  [ACCEPT_GRANT] {} grant for {} grantee",
        grant.grant.kind.as_deref().unwrap_or("untyped"),
        grant.grantee.kind.as_deref().unwrap_or("untyped")
    );

    let outcome = ctx
        .bounded(provider.accept_grant(&grant.grant.code, &grant.grantee.token))
        .await
        .map_err(|e| {
            warn!("  [ACCEPT_GRANT] Provider failed: {:#}", e);
            DirectiveError::new(ErrorKind::AcceptGrantFailed, format!("Grant exchange failed: {}", e))
        })?;

    match outcome {
        GrantOutcome::Accepted => {
            info!("  [ACCEPT_GRANT] Grant accepted");
            let options = ResponseOptions::named(namespace::AUTHORIZATION, "AcceptGrant.Response");
            Ok(ResponseBuilder::new(options).finalize())
        }
        GrantOutcome::Refused { reason } => {
            warn!("  [ACCEPT_GRANT] Grant refused: {}", reason);
            Err(DirectiveError::new(ErrorKind::AcceptGrantFailed, reason))
        }
    }
}
