use glam::Vec3;

/// Axis-aligned box described by its center and half-extents.
///
/// Used as the query shape for every collision test: block extents,
/// player and sheep colliders, block placement checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cuboid {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl Cuboid {
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    /// The unit cube occupied by a block at an integer coordinate.
    pub fn unit_at(center: Vec3) -> Self {
        Self::new(center, Vec3::splat(0.5))
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.half_extents
    }

    /// Strict overlap test: boxes that only share a face do not intersect.
    pub fn intersects(&self, other: &Cuboid) -> bool {
        let (a_min, a_max) = (self.min(), self.max());
        let (b_min, b_max) = (other.min(), other.max());

        a_min.x < b_max.x
            && b_min.x < a_max.x
            && a_min.y < b_max.y
            && b_min.y < a_max.y
            && a_min.z < b_max.z
            && b_min.z < a_max.z
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        let (min, max) = (self.min(), self.max());
        point.cmpgt(min).all() && point.cmplt(max).all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuboid_bounds() {
        let cuboid = Cuboid::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.5, 1.0, 0.25));
        assert_eq!(cuboid.min(), Vec3::new(0.5, 1.0, 2.75));
        assert_eq!(cuboid.max(), Vec3::new(1.5, 3.0, 3.25));
    }

    #[test]
    fn test_overlapping_cuboids_intersect() {
        let a = Cuboid::unit_at(Vec3::ZERO);
        let b = Cuboid::new(Vec3::new(0.7, 0.0, 0.0), Vec3::splat(0.25));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    #[test]
    fn test_touching_cuboids_do_not_intersect() {
        let a = Cuboid::unit_at(Vec3::ZERO);
        let b = Cuboid::unit_at(Vec3::new(1.0, 0.0, 0.0));
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_separated_on_one_axis() {
        let a = Cuboid::unit_at(Vec3::ZERO);
        let b = Cuboid::unit_at(Vec3::new(0.0, 0.0, 3.0));
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_contains_point() {
        let cuboid = Cuboid::unit_at(Vec3::new(2.0, 0.0, 0.0));
        assert!(cuboid.contains_point(Vec3::new(2.2, 0.1, -0.4)));
        assert!(!cuboid.contains_point(Vec3::new(2.5, 0.0, 0.0)));
    }
}
