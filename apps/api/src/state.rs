use std::sync::Arc;

use crate::auth::IdentityVerifier;
use crate::orchestrator::Orchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Resolves bearer tokens to caller ids. See `auth::verifier_from_config`.
    pub verifier: Arc<dyn IdentityVerifier>,
}
