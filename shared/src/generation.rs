//! Procedural course generation
//!
//! A course is a ground platform around the origin followed by a chain of
//! small hop platforms that wander away from it, ending in a winning
//! platform. Some gaps get a floating anchor block above them to hook onto.
//! The same seed always produces the same course.

use crate::blocks::{BlockContainer, BlockType};
use glam::{IVec3, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const START_RADIUS: i32 = 3;
const HOP_COUNT: usize = 24;
const HOP_RADIUS: i32 = 1;
const ANCHOR_EVERY: usize = 4;
const RESPAWN_POSITION: Vec3 = Vec3::new(0.0, 2.0, 0.0);

impl BlockContainer {
    pub fn create_field(seed: u32) -> BlockContainer {
        let mut rng = StdRng::seed_from_u64(seed as u64);
        let mut cells = Vec::new();

        square(&mut cells, IVec3::ZERO, START_RADIUS, BlockType::Ground);

        // Hops keep heading roughly along +x, drifting sideways and vertically.
        let mut center = IVec3::new(START_RADIUS, 0, 0);
        for hop in 0..HOP_COUNT {
            let gap = rng.gen_range(2..=4);
            let drift = rng.gen_range(-2..=2);
            let rise = rng.gen_range(-1..=1);
            let previous = center;
            center += IVec3::new(gap + 2 * HOP_RADIUS, rise, drift);

            if hop % ANCHOR_EVERY == ANCHOR_EVERY - 1 {
                let height = rng.gen_range(4..=6);
                let mid = (previous + center) / 2;
                cells.push((IVec3::new(mid.x, mid.y + height, mid.z), BlockType::Anchor));
            }

            square(&mut cells, center, HOP_RADIUS, BlockType::Platform);
        }

        let goal = center + IVec3::new(2 + 2 * HOP_RADIUS + 1, 0, 0);
        square(&mut cells, goal, HOP_RADIUS, BlockType::Winning);

        BlockContainer::from_blocks(cells, RESPAWN_POSITION)
    }
}

fn square(cells: &mut Vec<(IVec3, BlockType)>, center: IVec3, radius: i32, block_type: BlockType) {
    for x in -radius..=radius {
        for z in -radius..=radius {
            cells.push((center + IVec3::new(x, 0, z), block_type));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cuboid::Cuboid;

    #[test]
    fn test_same_seed_same_field() {
        let a = BlockContainer::create_field(1234);
        let b = BlockContainer::create_field(1234);
        assert_eq!(a.iter_sorted(), b.iter_sorted());
        assert_eq!(a.get_min_y(), b.get_min_y());
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = BlockContainer::create_field(1);
        let b = BlockContainer::create_field(2);
        assert_ne!(a.iter_sorted(), b.iter_sorted());
    }

    #[test]
    fn test_field_has_start_and_goal() {
        let field = BlockContainer::create_field(42);
        assert_eq!(field.get(IVec3::ZERO), Some(BlockType::Ground));
        assert!(field
            .iter_sorted()
            .iter()
            .any(|b| b.block_type == BlockType::Winning));
        assert!(field
            .iter_sorted()
            .iter()
            .any(|b| b.block_type == BlockType::Anchor));
    }

    #[test]
    fn test_respawn_position_is_free_and_above_ground() {
        let field = BlockContainer::create_field(7);
        let respawn = field.get_respawn_position();
        let body = Cuboid::new(respawn, Vec3::splat(0.5));
        assert!(field.get_colliding_blocks(&body).is_empty());
        assert!(field
            .ray_cast(respawn, Vec3::NEG_Y, 5.0)
            .is_some_and(|hit| hit.block.block_type == BlockType::Ground));
    }

    #[test]
    fn test_generation_starts_without_diff() {
        let field = BlockContainer::create_field(99);
        assert!(field.block_additions().is_empty());
        assert!(field.block_removes().is_empty());
    }
}
