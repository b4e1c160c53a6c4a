use crate::blocks::BlockContainer;
use crate::{HOOK_RANGE, HOOK_SPEED};
use glam::Vec3;

/// Grappling hook owned by a single player.
///
/// A launched hook travels [`HOOK_SPEED`] per tick along a fixed ray. The
/// first block it meets becomes the target; if it covers [`HOOK_RANGE`]
/// without a hit it is retracted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum HookState {
    #[default]
    Retracted,
    Extending {
        origin: Vec3,
        direction: Vec3,
        range: f32,
    },
    Hooked {
        target: Vec3,
    },
}

impl HookState {
    pub fn launch(origin: Vec3, direction: Vec3) -> Self {
        HookState::Extending {
            origin,
            direction: direction.normalize_or_zero(),
            range: 0.0,
        }
    }

    pub fn is_retracted(&self) -> bool {
        matches!(self, HookState::Retracted)
    }

    pub fn is_hooked(&self) -> bool {
        matches!(self, HookState::Hooked { .. })
    }

    pub fn target(&self) -> Option<Vec3> {
        match self {
            HookState::Hooked { target } => Some(*target),
            _ => None,
        }
    }

    /// Current end point of the rope, if there is one
    pub fn tip(&self) -> Option<Vec3> {
        match *self {
            HookState::Retracted => None,
            HookState::Extending {
                origin,
                direction,
                range,
            } => Some(origin + direction * range),
            HookState::Hooked { target } => Some(target),
        }
    }

    /// Moves an extending hook forward by one tick and ray-casts the segment it
    /// just covered. Other states are returned unchanged.
    pub fn extend(self, blocks: &BlockContainer) -> HookState {
        let HookState::Extending {
            origin,
            direction,
            range,
        } = self
        else {
            return self;
        };

        if direction == Vec3::ZERO {
            return HookState::Retracted;
        }

        let step = HOOK_SPEED.min(HOOK_RANGE - range);
        let segment_start = origin + direction * range;
        if let Some(hit) = blocks.ray_cast(segment_start, direction, step) {
            return HookState::Hooked { target: hit.point };
        }

        let range = range + HOOK_SPEED;
        if range >= HOOK_RANGE {
            HookState::Retracted
        } else {
            HookState::Extending {
                origin,
                direction,
                range,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockType;
    use glam::IVec3;

    fn wall_at(x: i32) -> BlockContainer {
        BlockContainer::from_blocks(
            vec![(IVec3::new(x, 0, 0), BlockType::Anchor)],
            Vec3::new(0.0, 2.0, 0.0),
        )
    }

    #[test]
    fn test_default_is_retracted() {
        let hook = HookState::default();
        assert!(hook.is_retracted());
        assert_eq!(hook.tip(), None);
        assert_eq!(hook.target(), None);
    }

    #[test]
    fn test_hook_hits_block_within_range() {
        let blocks = wall_at(6);
        let mut hook = HookState::launch(Vec3::ZERO, Vec3::X);

        let mut ticks = 0;
        while !hook.is_hooked() {
            hook = hook.extend(&blocks);
            ticks += 1;
            assert!(!hook.is_retracted(), "hook retracted before hitting");
        }

        assert_eq!(ticks, 3);
        let target = hook.target().unwrap();
        assert!(target.x >= 5.5 && target.x < 5.7);
    }

    #[test]
    fn test_hook_retracts_after_full_range() {
        let blocks = wall_at(40);
        let mut hook = HookState::launch(Vec3::ZERO, Vec3::X);

        let mut ticks = 0;
        while !hook.is_retracted() {
            hook = hook.extend(&blocks);
            ticks += 1;
        }

        assert_eq!(ticks, (HOOK_RANGE / HOOK_SPEED).ceil() as usize);
    }

    #[test]
    fn test_block_just_beyond_range_is_missed() {
        let blocks = wall_at(16);
        let mut hook = HookState::launch(Vec3::ZERO, Vec3::X);
        for _ in 0..10 {
            hook = hook.extend(&blocks);
        }
        assert!(hook.is_retracted());
    }

    #[test]
    fn test_hooked_state_is_stable() {
        let blocks = wall_at(2);
        let hooked = HookState::Hooked {
            target: Vec3::new(1.5, 0.0, 0.0),
        };
        assert_eq!(hooked.extend(&blocks), hooked);
    }
}
