use std::collections::HashMap;

use crate::camera::CameraView;
use crate::error::Result;
use crate::scene::{transform, NodeKind, Scene, SortKey};

use super::{InstanceUniforms, ProgramId};

/// Sprites sharing one program, in draw order.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub program: ProgramId,
    pub instances: Vec<InstanceUniforms>,
}

/// Sprite accounting for one frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct CullStats {
    /// Visible-flagged sprites examined.
    pub considered: usize,
    /// Outside the camera's visible bounds.
    pub culled: usize,
    /// On screen but without a texture yet.
    pub pending: usize,
    pub drawn: usize,
}

/// Culls the scene's sprites against `view` and groups the survivors by
/// program.
///
/// Inside a batch, sprites are ordered by z then traversal order. Batches are
/// ordered by their first sprite.
pub fn collect_batches(scene: &Scene, view: &CameraView) -> Result<(Vec<Batch>, CullStats)> {
    let mut stats = CullStats::default();
    let mut items: Vec<(SortKey, ProgramId, InstanceUniforms)> = Vec::new();

    for (order, id) in scene.traverse().into_iter().enumerate() {
        let node = scene.get(id)?;
        let NodeKind::Sprite(sprite) = &node.kind else { continue };
        if !scene.is_visible(id) {
            continue;
        }
        stats.considered += 1;

        let world = transform::world_transform(scene, id)?;
        if !view.is_rect_visible(world.bounds()) {
            stats.culled += 1;
            continue;
        }

        let Some(instance) = sprite.instance(&world) else {
            stats.pending += 1;
            continue;
        };

        let order = u32::try_from(order).unwrap_or(u32::MAX);
        items.push((SortKey::new(sprite.z, order), sprite.program_id(), instance));
    }

    items.sort_by(|a, b| a.0.cmp(&b.0));
    stats.drawn = items.len();

    let mut batches: Vec<Batch> = Vec::new();
    let mut slot: HashMap<ProgramId, usize> = HashMap::new();
    for (_, program, instance) in items {
        let i = *slot.entry(program).or_insert_with(|| {
            batches.push(Batch {
                program,
                instances: Vec::new(),
            });
            batches.len() - 1
        });
        batches[i].instances.push(instance);
    }

    Ok((batches, stats))
}
