//! Deterministic key construction for archived renders.

use uuid::Uuid;

/// Build the archival key for a generated video.
///
/// Keys are namespaced by owner and suffixed with a random id so duplicate
/// finalization attempts never overwrite each other:
/// `renders/ugc-ads/<owner_id>/generated/<uuid>.mp4`
pub fn generated_video_key(owner_id: &str, extension: &str) -> String {
    let owner = if owner_id.is_empty() { "unknown" } else { owner_id };
    format!(
        "renders/ugc-ads/{}/generated/{}.{}",
        owner,
        Uuid::new_v4(),
        extension
    )
}
