use crate::components::{Geometry, Material, Transform};

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Mesh {
    pub fn new(geometry: Geometry, material: Material) -> Self {
        Self {
            geometry,
            material,
            cast_shadow: false,
            receive_shadow: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
}

/// A node of the decoded scene graph. Children are owned, so cloning a node
/// deep-copies the whole subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            kind: NodeKind::Group,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            kind: NodeKind::Mesh(mesh),
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }

    /// Pre-order traversal, the same order the binary format stores nodes in.
    pub fn iter(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    pub fn meshes(&self) -> impl Iterator<Item = &Mesh> {
        self.iter().filter_map(SceneNode::as_mesh)
    }

    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes().count()
    }
}

pub struct PreOrder<'a> {
    stack: Vec<&'a SceneNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a SceneNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::{Mesh, SceneNode};
    use crate::components::{Geometry, Material};

    fn leaf(name: &str) -> SceneNode {
        SceneNode::mesh(name, Mesh::new(Geometry::default(), Material::default()))
    }

    #[test]
    fn pre_order_visits_parent_before_children() {
        let root = SceneNode::group("root")
            .with_child(SceneNode::group("a").with_child(leaf("a1")))
            .with_child(leaf("b"));
        let names: Vec<&str> = root.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["root", "a", "a1", "b"]);
        assert_eq!(root.node_count(), 4);
        assert_eq!(root.mesh_count(), 2);
    }

    #[test]
    fn clone_is_deep() {
        let root = SceneNode::group("root").with_child(leaf("m"));
        let copy = root.clone();
        assert_eq!(root, copy);
        let a = &root.meshes().next().expect("mesh").geometry.positions;
        let b = &copy.meshes().next().expect("mesh").geometry.positions;
        assert!(!std::ptr::eq(a, b));
    }
}
