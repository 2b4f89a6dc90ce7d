use foundation::bounds::Aabb3;
use foundation::math::Vec3;

use super::bounds::BoundingSphere;

/// Indexed triangle geometry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u32>,
    /// Filled by `compute_bounds`; `None` until then.
    pub bounding_box: Option<Aabb3>,
    pub bounding_sphere: Option<BoundingSphere>,
}

impl Geometry {
    pub fn new(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            ..Self::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn compute_bounds(&mut self) {
        let points = || self.positions.iter().map(|p| Vec3::from_f32(*p));
        let aabb = Aabb3::from_points(points());
        self.bounding_sphere = aabb.map(|b| BoundingSphere::enclosing(&b, points()));
        self.bounding_box = aabb;
    }
}

#[cfg(test)]
mod tests {
    use super::Geometry;
    use foundation::math::Vec3;

    #[test]
    fn compute_bounds_fills_box_and_sphere() {
        let mut g = Geometry::new(
            vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]],
            vec![0, 1, 2],
        );
        assert!(g.bounding_box.is_none());
        g.compute_bounds();
        let b = g.bounding_box.expect("box");
        assert_eq!(b.max, Vec3::new(2.0, 2.0, 0.0));
        let s = g.bounding_sphere.expect("sphere");
        assert_eq!(s.center, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(g.triangle_count(), 1);
    }

    #[test]
    fn empty_geometry_has_no_bounds() {
        let mut g = Geometry::default();
        g.compute_bounds();
        assert!(g.bounding_box.is_none());
        assert!(g.bounding_sphere.is_none());
    }
}
