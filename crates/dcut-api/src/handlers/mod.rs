//! HTTP handlers.

pub mod callback;
pub mod generate;
pub mod health;
pub mod status;

use crate::finalize::FinalizeDeps;
use crate::state::AppState;

/// Assemble finalization collaborators from shared state.
pub(crate) fn finalize_deps(
    state: &AppState,
    extend_callback_url: Option<String>,
) -> FinalizeDeps<'_> {
    FinalizeDeps {
        provider: state.kie.as_ref(),
        blobs: state.storage.as_ref(),
        store: state.generations.as_ref(),
        http: &state.http,
        signed_url_ttl: state.config.signed_url_ttl,
        extend_threshold_secs: state.config.extend_threshold_secs,
        extend_callback_url,
    }
}
