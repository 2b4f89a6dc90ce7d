use foundation::math::{MAT4_IDENTITY, Mat4, mat4_mul};
use scene::components::Transform;
use scene::instance::ModelInstance;
use scene::node::{Mesh, SceneNode};

/// One mesh to draw with its accumulated model matrix.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawMesh<'a> {
    pub node: &'a str,
    pub model: Mat4,
    pub mesh: &'a Mesh,
}

#[derive(Debug, Default)]
pub struct RenderFrame<'a> {
    pub draws: Vec<DrawMesh<'a>>,
}

pub struct Renderer;

impl Renderer {
    /// Flatten a model instance into draws in scene-graph pre-order.
    pub fn collect(instance: &ModelInstance) -> RenderFrame<'_> {
        let mut frame = RenderFrame::default();
        let root = transform_matrix(&instance.transform);
        collect_node(&instance.root, root, &mut frame);
        frame
    }
}

fn collect_node<'a>(node: &'a SceneNode, parent: Mat4, frame: &mut RenderFrame<'a>) {
    let model = mat4_mul(parent, transform_matrix(&node.transform));
    if let Some(mesh) = node.as_mesh() {
        frame.draws.push(DrawMesh {
            node: &node.name,
            model,
            mesh,
        });
    }
    for child in &node.children {
        collect_node(child, model, frame);
    }
}

/// `T * Rx * Ry * Rz * S`, matching Euler XYZ order.
pub fn transform_matrix(t: &Transform) -> Mat4 {
    let (sx, cx) = t.rotation.x.sin_cos();
    let (sy, cy) = t.rotation.y.sin_cos();
    let (sz, cz) = t.rotation.z.sin_cos();

    let rx: Mat4 = [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, cx as f32, sx as f32, 0.0],
        [0.0, -sx as f32, cx as f32, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];
    let ry: Mat4 = [
        [cy as f32, 0.0, -sy as f32, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [sy as f32, 0.0, cy as f32, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];
    let rz: Mat4 = [
        [cz as f32, sz as f32, 0.0, 0.0],
        [-sz as f32, cz as f32, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ];

    let mut scale = MAT4_IDENTITY;
    scale[0][0] = t.scale.x as f32;
    scale[1][1] = t.scale.y as f32;
    scale[2][2] = t.scale.z as f32;

    let mut translate = MAT4_IDENTITY;
    translate[3] = [
        t.position.x as f32,
        t.position.y as f32,
        t.position.z as f32,
        1.0,
    ];

    let rot = mat4_mul(mat4_mul(rx, ry), rz);
    mat4_mul(mat4_mul(translate, rot), scale)
}
