//! Depth sharing between render targets.

use super::backend::RenderBackend;
use super::target::{RenderTargetSet, TargetSlot};
use crate::errors::{PostFxError, Result};
use crate::scene::RenderRequest;

/// Makes `target` render against `source`'s depth attachment.
///
/// Both targets first receive an empty draw so that lazily allocating
/// backends have created their attachments, then both are checked for a
/// depth attachment. Fails with
/// [`CapabilityMissing`](PostFxError::CapabilityMissing) when the backend
/// cannot share depth at all.
pub fn share_depth<B: RenderBackend>(
    backend: &mut B,
    targets: &mut RenderTargetSet<B::Target>,
    source: TargetSlot,
    target: TargetSlot,
) -> Result<()> {
    assert_ne!(source, target, "cannot share a depth attachment with itself");

    if !backend.supports_depth_sharing() {
        return Err(PostFxError::CapabilityMissing {
            backend: backend.name(),
            capability: "depth sharing",
        });
    }

    let empty = RenderRequest::empty();
    backend.draw_scene(&empty, targets.get_mut(source)?)?;
    backend.draw_scene(&empty, targets.get_mut(target)?)?;

    if !backend.has_depth(targets.get(source)?) {
        return Err(PostFxError::MissingDepthAttachment(source.label()));
    }
    if !backend.has_depth(targets.get(target)?) {
        return Err(PostFxError::MissingDepthAttachment(target.label()));
    }

    let mut dst = targets.take(target)?;
    let shared = targets
        .get(source)
        .and_then(|src| backend.share_depth(src, &mut dst));
    targets.restore(target, dst);
    shared?;

    log::debug!(
        "Render target '{}' now shares depth with '{}'",
        target.label(),
        source.label()
    );
    Ok(())
}
