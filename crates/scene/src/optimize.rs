use crate::components::TextureFilter;
use crate::node::{NodeKind, SceneNode};

/// Shadow flags applied to every mesh of an optimized model.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShadowPolicy {
    pub cast: bool,
    pub receive: bool,
}

impl Default for ShadowPolicy {
    fn default() -> Self {
        Self {
            cast: true,
            receive: true,
        }
    }
}

/// Prepare a freshly decoded scene for display.
///
/// For each mesh: mipmap generation is turned off and both filters become
/// `Linear` on every texture map, bounds are computed, and the shadow flags
/// come from `policy`. Groups keep their transforms. `raw` is left untouched.
pub fn optimize(raw: &SceneNode, policy: ShadowPolicy) -> SceneNode {
    let kind = match &raw.kind {
        NodeKind::Group => NodeKind::Group,
        NodeKind::Mesh(mesh) => {
            let mut mesh = mesh.clone();
            for map in &mut mesh.material.maps {
                map.texture.generate_mipmaps = false;
                map.texture.min_filter = TextureFilter::Linear;
                map.texture.mag_filter = TextureFilter::Linear;
            }
            mesh.geometry.compute_bounds();
            mesh.cast_shadow = policy.cast;
            mesh.receive_shadow = policy.receive;
            NodeKind::Mesh(mesh)
        }
    };

    SceneNode {
        name: raw.name.clone(),
        transform: raw.transform,
        kind,
        children: raw
            .children
            .iter()
            .map(|child| optimize(child, policy))
            .collect(),
    }
}
