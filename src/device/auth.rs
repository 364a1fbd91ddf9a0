//! Authorization providers

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::traits::{AuthorizationProvider, GrantOutcome};

/// Accepts every grant without a token exchange
///
/// Substitute a provider that exchanges the code with the identity service
/// to obtain access and refresh tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllGrants;

#[async_trait]
impl AuthorizationProvider for AcceptAllGrants {
    async fn accept_grant(&self, code: &str, _grantee_token: &str) -> Result<GrantOutcome> {
        info!("[AUTH] Accepting grant ({} byte code) without exchange", code.len());
        Ok(GrantOutcome::Accepted)
    }
}
