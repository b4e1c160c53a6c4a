//! Sparse voxel world with per-tick change tracking
//!
//! Blocks are unit cubes centred on integer coordinates, so the block at
//! `c` spans `[c - 0.5, c + 0.5]` on every axis. Only occupied cells are
//! stored; everything else is air.
//!
//! Every edit made through [`BlockContainer::add_block`] and
//! [`BlockContainer::remove_block`] is recorded in the diff buffers that the
//! server broadcasts once per tick and then clears with
//! [`BlockContainer::clear_diff`].

use crate::cuboid::Cuboid;
use glam::{IVec3, Vec3};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

/// Distance between samples when marching a ray through the grid
const RAY_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockType {
    Ground = 0,
    Platform = 1,
    Anchor = 2,
    Winning = 3,
}

impl BlockType {
    pub fn is_winning(self) -> bool {
        self == BlockType::Winning
    }
}

impl TryFrom<u8> for BlockType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(BlockType::Ground),
            1 => Ok(BlockType::Platform),
            2 => Ok(BlockType::Anchor),
            3 => Ok(BlockType::Winning),
            other => Err(other),
        }
    }
}

// One byte on the wire instead of serde's default u32 variant index.
impl Serialize for BlockType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for BlockType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = u8::deserialize(deserializer)?;
        BlockType::try_from(tag)
            .map_err(|tag| de::Error::custom(format!("unknown block type {}", tag)))
    }
}

/// An occupied cell returned from collision queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldBlock {
    pub position: IVec3,
    pub block_type: BlockType,
}

impl WorldBlock {
    pub fn is_winning_block(&self) -> bool {
        self.block_type.is_winning()
    }

    pub fn cuboid(&self) -> Cuboid {
        Cuboid::unit_at(self.position.as_vec3())
    }
}

/// A block placement as carried by game-update and chunk packets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAddition {
    pub position: IVec3,
    pub block_type: BlockType,
}

/// First occupied cell found along a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub block: WorldBlock,
    /// Sample point that entered the block
    pub point: Vec3,
    /// Last empty cell visited before the hit, if the ray left its starting cell
    pub previous_cell: Option<IVec3>,
    pub distance: f32,
}

#[derive(Debug, Clone, Default)]
pub struct BlockContainer {
    blocks: HashMap<IVec3, BlockType>,
    respawn_position: Vec3,
    min_y: i32,
    block_additions: Vec<BlockAddition>,
    block_removes: Vec<IVec3>,
}

impl BlockContainer {
    /// Builds a container from pre-generated cells without recording a diff.
    pub fn from_blocks(
        blocks: impl IntoIterator<Item = (IVec3, BlockType)>,
        respawn_position: Vec3,
    ) -> Self {
        let blocks: HashMap<IVec3, BlockType> = blocks.into_iter().collect();
        let min_y = blocks.keys().map(|p| p.y).min().unwrap_or(0);

        Self {
            blocks,
            respawn_position,
            min_y,
            block_additions: Vec::new(),
            block_removes: Vec::new(),
        }
    }

    /// Returns every block whose unit cube strictly intersects `cuboid`.
    ///
    /// Cells are visited x-major, then y, then z, all ascending, so the
    /// result order only depends on the container contents.
    pub fn get_colliding_blocks(&self, cuboid: &Cuboid) -> Vec<WorldBlock> {
        let min = cuboid.min();
        let max = cuboid.max();
        let lo = (min - Vec3::splat(0.5)).floor().as_ivec3() + IVec3::ONE;
        let hi = (max + Vec3::splat(0.5)).ceil().as_ivec3() - IVec3::ONE;

        let mut colliding = Vec::new();
        for x in lo.x..=hi.x {
            for y in lo.y..=hi.y {
                for z in lo.z..=hi.z {
                    let position = IVec3::new(x, y, z);
                    if let Some(&block_type) = self.blocks.get(&position) {
                        let block = WorldBlock {
                            position,
                            block_type,
                        };
                        if block.cuboid().intersects(cuboid) {
                            colliding.push(block);
                        }
                    }
                }
            }
        }
        colliding
    }

    pub fn get_respawn_position(&self) -> Vec3 {
        self.respawn_position
    }

    pub fn get_min_y(&self) -> f32 {
        self.min_y as f32
    }

    pub fn get(&self, position: IVec3) -> Option<BlockType> {
        self.blocks.get(&position).copied()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Places a block into an empty cell and records the addition.
    /// Returns false if the cell is already occupied.
    pub fn add_block(&mut self, position: IVec3, block_type: BlockType) -> bool {
        if self.blocks.contains_key(&position) {
            return false;
        }

        self.blocks.insert(position, block_type);
        self.min_y = self.min_y.min(position.y);
        self.block_additions.push(BlockAddition {
            position,
            block_type,
        });
        true
    }

    /// Removes a block and records the removal.
    ///
    /// A removal cancels any addition of the same cell made since the last
    /// broadcast, so receivers never see an add and a remove of one cell in
    /// the wrong order.
    pub fn remove_block(&mut self, position: IVec3) -> Option<WorldBlock> {
        let block_type = self.blocks.remove(&position)?;

        self.block_additions.retain(|a| a.position != position);
        if !self.block_removes.contains(&position) {
            self.block_removes.push(position);
        }

        Some(WorldBlock {
            position,
            block_type,
        })
    }

    pub fn block_additions(&self) -> &[BlockAddition] {
        &self.block_additions
    }

    pub fn block_removes(&self) -> &[IVec3] {
        &self.block_removes
    }

    pub fn clear_diff(&mut self) {
        self.block_additions.clear();
        self.block_removes.clear();
    }

    /// Applies a diff received from the server: removals first, then additions.
    /// Nothing is recorded, the mirror never re-broadcasts.
    pub fn apply_remote_diff(&mut self, removes: &[IVec3], additions: &[BlockAddition]) {
        for position in removes {
            self.blocks.remove(position);
        }
        for addition in additions {
            self.blocks.insert(addition.position, addition.block_type);
            self.min_y = self.min_y.min(addition.position.y);
        }
    }

    /// Marches a ray through the grid and returns the first occupied cell.
    pub fn ray_cast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO || max_distance <= 0.0 {
            return None;
        }

        let start_cell = origin.round().as_ivec3();
        let mut previous_cell = None;
        let mut distance = 0.0;

        while distance <= max_distance {
            let point = origin + direction * distance;
            let cell = point.round().as_ivec3();

            if let Some(&block_type) = self.blocks.get(&cell) {
                return Some(RayHit {
                    block: WorldBlock {
                        position: cell,
                        block_type,
                    },
                    point,
                    previous_cell,
                    distance,
                });
            }

            if cell != start_cell || previous_cell.is_some() {
                previous_cell = Some(cell);
            }
            distance += RAY_STEP;
        }

        None
    }

    /// Every block in no particular order
    pub fn iter(&self) -> impl Iterator<Item = WorldBlock> + '_ {
        self.blocks
            .iter()
            .map(|(&position, &block_type)| WorldBlock {
                position,
                block_type,
            })
    }

    /// Every block, sorted by coordinate.
    pub fn iter_sorted(&self) -> Vec<WorldBlock> {
        let mut blocks: Vec<WorldBlock> = self.iter().collect();
        blocks.sort_by_key(|b| (b.position.x, b.position.y, b.position.z));
        blocks
    }

    /// Splits the whole world into ordered batches of at most `max_blocks`
    /// for the initial push to a joining client.
    pub fn chunks(&self, max_blocks: usize) -> Vec<Vec<BlockAddition>> {
        let max_blocks = max_blocks.max(1);
        self.iter_sorted()
            .chunks(max_blocks)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|b| BlockAddition {
                        position: b.position,
                        block_type: b.block_type,
                    })
                    .collect()
            })
            .collect()
    }
}
