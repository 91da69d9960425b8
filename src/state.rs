//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the one `SessionService` built at startup; there is no global
//! controller instance.

use std::sync::Arc;

use crate::services::session::SessionService;

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionService>,
}

impl AppState {
    #[must_use]
    pub fn new(session: SessionService) -> Self {
        Self { session: Arc::new(session) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
