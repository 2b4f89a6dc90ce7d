use crate::components::Transform;
use crate::node::SceneNode;

pub const MODEL_INSTANCE_ID: &str = "model";

/// An independent copy of a cached template, owned by one viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInstance {
    pub id: String,
    pub transform: Transform,
    pub root: SceneNode,
}

impl ModelInstance {
    /// Deep-copies `template`; edits to the instance never reach the template.
    pub fn from_template(template: &SceneNode) -> Self {
        Self {
            id: MODEL_INSTANCE_ID.to_string(),
            transform: Transform::identity(),
            root: template.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MODEL_INSTANCE_ID, ModelInstance};
    use crate::components::{Geometry, Material, Transform};
    use crate::node::{Mesh, SceneNode};

    #[test]
    fn instance_has_baseline_transform() {
        let template = SceneNode::group("root");
        let inst = ModelInstance::from_template(&template);
        assert_eq!(inst.id, MODEL_INSTANCE_ID);
        assert_eq!(inst.transform, Transform::identity());
        assert_eq!(inst.root, template);
    }

    #[test]
    fn editing_instance_leaves_template_alone() {
        let template = SceneNode::group("root").with_child(SceneNode::mesh(
            "m",
            Mesh::new(Geometry::new(vec![[0.0; 3]], vec![]), Material::default()),
        ));
        let mut inst = ModelInstance::from_template(&template);
        inst.root.children[0].name = "changed".into();
        assert_eq!(template.children[0].name, "m");
    }
}
