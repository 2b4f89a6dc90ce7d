use foundation::bounds::Aabb3;
use foundation::math::Vec3;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f64,
}

impl BoundingSphere {
    /// Sphere centered on the box center that encloses every point.
    pub fn enclosing(aabb: &Aabb3, points: impl IntoIterator<Item = Vec3>) -> Self {
        let center = aabb.center();
        let radius = points
            .into_iter()
            .map(|p| (p - center).length())
            .fold(0.0, f64::max);
        Self { center, radius }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        (point - self.center).length() <= self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::BoundingSphere;
    use foundation::bounds::Aabb3;
    use foundation::math::Vec3;

    #[test]
    fn encloses_all_points() {
        let pts = [
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ];
        let aabb = Aabb3::from_points(pts).expect("points");
        let s = BoundingSphere::enclosing(&aabb, pts);
        assert_eq!(s.center, Vec3::new(0.0, 1.0, 0.0));
        for p in pts {
            assert!(s.contains(p));
        }
    }

    #[test]
    fn rejects_point_outside() {
        let s = BoundingSphere {
            center: Vec3::ZERO,
            radius: 1.0,
        };
        assert!(!s.contains(Vec3::new(2.0, 0.0, 0.0)));
    }
}
