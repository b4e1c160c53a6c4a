//! Block-world collision for moving bodies
//!
//! Players and sheep are both a [`Body`]: a position, a per-tick speed and six
//! thin collider cuboids, one against each face. Collision is resolved one collider
//! at a time by snapping the body flush against the nearest block the collider
//! touches and cancelling the speed component that points into it.

use crate::blocks::BlockContainer;
use crate::cuboid::Cuboid;
use crate::{
    BODY_HALF_SIZE, COLLIDER_DIMENSION, COLLIDER_OFFSET, COLLIDER_THICKNESS, MAX_FALL_SPEED,
    SNAP_DISTANCE, VOID_DEPTH,
};
use glam::Vec3;

const X: usize = 0;
const Y: usize = 1;
const Z: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Body {
    pub position: Vec3,
    pub speed: Vec3,
}

impl Body {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            speed: Vec3::ZERO,
        }
    }

    /// Full extent of the body, used for placement checks
    pub fn cuboid(&self) -> Cuboid {
        Cuboid::new(self.position, Vec3::splat(BODY_HALF_SIZE))
    }

    pub fn bottom_collider(&self) -> Cuboid {
        self.collider(Y, -1.0)
    }

    pub fn top_collider(&self) -> Cuboid {
        self.collider(Y, 1.0)
    }

    pub fn left_collider(&self) -> Cuboid {
        self.collider(Z, -1.0)
    }

    pub fn right_collider(&self) -> Cuboid {
        self.collider(Z, 1.0)
    }

    pub fn back_collider(&self) -> Cuboid {
        self.collider(X, -1.0)
    }

    pub fn front_collider(&self) -> Cuboid {
        self.collider(X, 1.0)
    }

    fn collider(&self, axis: usize, direction: f32) -> Cuboid {
        let mut center = self.position;
        center[axis] += COLLIDER_OFFSET * direction;

        let mut half_extents = Vec3::splat(COLLIDER_DIMENSION);
        half_extents[axis] = COLLIDER_THICKNESS;

        Cuboid::new(center, half_extents)
    }

    pub fn on_ground(&self, blocks: &BlockContainer) -> bool {
        !blocks
            .get_colliding_blocks(&self.bottom_collider())
            .is_empty()
    }

    /// Adds gravity to the vertical speed, capped so a falling body cannot
    /// skip over a whole block in one tick.
    pub fn apply_gravity(&mut self, gravity: f32) {
        self.speed.y = (self.speed.y - gravity).max(-MAX_FALL_SPEED);
    }

    pub fn integrate(&mut self) {
        self.position += self.speed;
    }

    /// Runs all six colliders. Returns true if any of them touched a block.
    pub fn resolve_collisions(&mut self, blocks: &BlockContainer) -> bool {
        let mut touched = false;
        touched |= self.check_collider(blocks, self.left_collider(), -1.0, Z);
        touched |= self.check_collider(blocks, self.right_collider(), 1.0, Z);
        touched |= self.check_collider(blocks, self.back_collider(), -1.0, X);
        touched |= self.check_collider(blocks, self.front_collider(), 1.0, X);
        touched |= self.check_collider(blocks, self.bottom_collider(), -1.0, Y);
        touched |= self.check_collider(blocks, self.top_collider(), 1.0, Y);
        touched
    }

    // direction is -1 when the collider faces the negative end of the axis
    fn check_collider(
        &mut self,
        blocks: &BlockContainer,
        collider: Cuboid,
        direction: f32,
        axis: usize,
    ) -> bool {
        let colliding = blocks.get_colliding_blocks(&collider);
        if colliding.is_empty() {
            return false;
        }

        if self.speed[axis] * direction > 0.0 {
            self.speed[axis] = 0.0;
        }

        let nearest = colliding
            .iter()
            .map(|b| b.position[axis] as f32 * direction)
            .fold(f32::INFINITY, f32::min);
        self.position[axis] = (nearest - SNAP_DISTANCE) * direction;
        true
    }

    pub fn is_in_void(&self, blocks: &BlockContainer) -> bool {
        self.position.y < blocks.get_min_y() - VOID_DEPTH
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockType;
    use assert_approx_eq::assert_approx_eq;
    use glam::IVec3;

    fn floor() -> BlockContainer {
        let mut cells = Vec::new();
        for x in -3..=3 {
            for z in -3..=3 {
                cells.push((IVec3::new(x, 0, z), BlockType::Ground));
            }
        }
        cells.push((IVec3::new(2, 1, 0), BlockType::Ground));
        BlockContainer::from_blocks(cells, Vec3::new(0.0, 2.0, 0.0))
    }

    #[test]
    fn test_collider_layout() {
        let body = Body::new(Vec3::new(1.0, 2.0, 3.0));
        let bottom = body.bottom_collider();
        assert_approx_eq!(bottom.center.y, 1.6, 1e-5);
        assert_approx_eq!(bottom.half_extents.y, COLLIDER_THICKNESS, 1e-5);
        assert_approx_eq!(bottom.half_extents.x, COLLIDER_DIMENSION, 1e-5);

        let front = body.front_collider();
        assert_approx_eq!(front.center.x, 1.4, 1e-5);
        assert_approx_eq!(front.half_extents.x, COLLIDER_THICKNESS, 1e-5);

        let left = body.left_collider();
        assert_approx_eq!(left.center.z, 2.6, 1e-5);
    }

    #[test]
    fn test_landing_snaps_to_surface() {
        let blocks = floor();
        let mut body = Body::new(Vec3::new(0.0, 0.8, 0.0));
        body.speed = Vec3::new(0.0, -0.3, 0.0);

        assert!(body.resolve_collisions(&blocks));
        assert_approx_eq!(body.position.y, SNAP_DISTANCE, 1e-5);
        assert_eq!(body.speed.y, 0.0);
        assert!(body.on_ground(&blocks));
    }

    #[test]
    fn test_wall_stops_forward_motion() {
        let blocks = floor();
        let mut body = Body::new(Vec3::new(1.1, SNAP_DISTANCE + 0.6, 0.0));
        body.speed = Vec3::new(0.2, 0.0, 0.0);

        body.resolve_collisions(&blocks);
        assert_approx_eq!(body.position.x, 2.0 - SNAP_DISTANCE, 1e-5);
        assert_eq!(body.speed.x, 0.0);
    }

    #[test]
    fn test_speed_away_from_surface_is_kept() {
        let blocks = floor();
        let mut body = Body::new(Vec3::new(0.0, 0.8, 0.0));
        body.speed = Vec3::new(0.0, 0.28, 0.0);

        body.resolve_collisions(&blocks);
        assert_approx_eq!(body.speed.y, 0.28, 1e-5);
    }

    #[test]
    fn test_no_collision_in_open_air() {
        let blocks = floor();
        let mut body = Body::new(Vec3::new(0.0, 5.0, 0.0));
        body.speed = Vec3::new(0.1, -0.1, 0.1);
        assert!(!body.resolve_collisions(&blocks));
        assert_eq!(body.position, Vec3::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn test_gravity_is_capped() {
        let mut body = Body::new(Vec3::ZERO);
        for _ in 0..100 {
            body.apply_gravity(0.04);
        }
        assert_approx_eq!(body.speed.y, -MAX_FALL_SPEED, 1e-5);
    }

    #[test]
    fn test_long_fall_lands_on_thin_floor() {
        let blocks = floor();
        let mut body = Body::new(Vec3::new(0.0, 80.0, 0.0));
        for _ in 0..200 {
            body.apply_gravity(0.04);
            body.integrate();
            body.resolve_collisions(&blocks);
        }
        assert!(body.on_ground(&blocks));
        assert!(body.position.y > 0.5 && body.position.y < 1.5);
    }

    #[test]
    fn test_void_detection() {
        let blocks = floor();
        assert!(!Body::new(Vec3::new(0.0, -99.0, 0.0)).is_in_void(&blocks));
        assert!(Body::new(Vec3::new(0.0, -100.5, 0.0)).is_in_void(&blocks));
    }
}
