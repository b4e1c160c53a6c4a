//! One tick's worth of world state
//!
//! On the server the [`Frame`] is the single source of truth and only changes
//! inside [`Frame::tick`] and the message handlers that run in the same tick.
//! On the client it is a mirror that only changes when a game update arrives.

use crate::blocks::{BlockContainer, BlockType};
use crate::cuboid::Cuboid;
use crate::player::Player;
use crate::sheep::Sheep;
use crate::EDIT_REACH;
use glam::{IVec3, Vec3};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Notable events from a single tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Players that touched a winning block and were sent back to the start
    pub winners: Vec<u8>,
    /// Players that fell out of the world
    pub fallen: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct BlockEdit {
    origin: Vec3,
    direction: Vec3,
    remove: bool,
    place: bool,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub players: BTreeMap<u8, Player>,
    pub sheep: Vec<Sheep>,
    pub blocks: BlockContainer,
    rng: StdRng,
}

impl Default for Frame {
    fn default() -> Self {
        Self::new(BlockContainer::default(), 0)
    }
}

impl Frame {
    pub fn new(blocks: BlockContainer, seed: u32) -> Self {
        Self {
            players: BTreeMap::new(),
            sheep: Vec::new(),
            blocks,
            rng: StdRng::seed_from_u64(seed as u64),
        }
    }

    /// Generates the course for `seed` and populates it with sheep.
    pub fn generate(seed: u32, sheep_count: usize) -> Self {
        let mut frame = Self::new(BlockContainer::create_field(seed), seed);
        frame.spawn_sheep(sheep_count);
        frame
    }

    pub fn spawn_sheep(&mut self, count: usize) {
        let respawn = self.blocks.get_respawn_position();
        for i in 0..count {
            let yaw = 360.0 * i as f32 / count as f32;
            self.sheep.push(Sheep::new(respawn, yaw));
        }
    }

    /// Adds a player at the respawn point, replacing any player with the same id.
    pub fn add_player(&mut self, id: u8, name: &str) -> &mut Player {
        let player = Player::new(id, name, self.blocks.get_respawn_position());
        match self.players.entry(id) {
            Entry::Occupied(mut slot) => {
                slot.insert(player);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(player),
        }
    }

    pub fn remove_player(&mut self, id: u8) -> Option<Player> {
        self.players.remove(&id)
    }

    pub fn get_player(&self, id: u8) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_player_mut(&mut self, id: u8) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Advances the simulation: players in id order, then their block edits,
    /// then sheep.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        for player in self.players.values_mut() {
            let outcome = player.tick(&self.blocks);
            if outcome.reached_goal {
                info!("Player \"{}\" reached the goal", player.name());
                report.winners.push(player.id());
            }
            if outcome.fell_out {
                debug!("Player \"{}\" fell out of the world", player.name());
                report.fallen.push(player.id());
            }
        }

        self.apply_block_edits();

        for sheep in &mut self.sheep {
            sheep.tick(&self.blocks, &mut self.rng);
        }

        report
    }

    fn apply_block_edits(&mut self) {
        let mut edits = Vec::new();
        for player in self.players.values_mut() {
            let remove = player.poll_left_mouse_pressed();
            let place = player.poll_right_mouse_pressed();
            if remove || place {
                edits.push(BlockEdit {
                    origin: player.eye_position(),
                    direction: player.direction(),
                    remove,
                    place,
                });
            }
        }

        for edit in edits {
            if edit.remove {
                self.remove_looked_at_block(edit.origin, edit.direction);
            }
            if edit.place {
                self.place_block_before(edit.origin, edit.direction);
            }
        }
    }

    fn remove_looked_at_block(&mut self, origin: Vec3, direction: Vec3) {
        if let Some(hit) = self.blocks.ray_cast(origin, direction, EDIT_REACH) {
            if !hit.block.is_winning_block() {
                self.blocks.remove_block(hit.block.position);
            }
        }
    }

    fn place_block_before(&mut self, origin: Vec3, direction: Vec3) {
        let cell = self
            .blocks
            .ray_cast(origin, direction, EDIT_REACH)
            .and_then(|hit| hit.previous_cell);

        if let Some(cell) = cell {
            if !self.is_occupied_by_body(cell) {
                self.blocks.add_block(cell, BlockType::Platform);
            }
        }
    }

    fn is_occupied_by_body(&self, cell: IVec3) -> bool {
        let block = Cuboid::unit_at(cell.as_vec3());
        self.players
            .values()
            .map(|p| p.body().cuboid())
            .chain(self.sheep.iter().map(|s| s.body().cuboid()))
            .any(|body| body.intersects(&block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Actions;
    use crate::{PLAYER_ROTATE_SPEED, SNAP_DISTANCE};
    use glam::Vec2;

    fn flat_frame() -> Frame {
        let mut cells = Vec::new();
        for x in -5..=5 {
            for z in -5..=5 {
                cells.push((IVec3::new(x, 0, z), BlockType::Ground));
            }
        }
        cells.push((IVec3::new(3, 1, 3), BlockType::Winning));
        Frame::new(
            BlockContainer::from_blocks(cells, Vec3::new(0.0, SNAP_DISTANCE, 0.0)),
            11,
        )
    }

    fn look_down(player: &mut Player) {
        player.update_direction(Vec2::new(0.0, 89.0 / PLAYER_ROTATE_SPEED));
    }

    #[test]
    fn test_generate_populates_world() {
        let frame = Frame::generate(77, 40);
        assert_eq!(frame.sheep.len(), 40);
        assert!(frame.players.is_empty());
        assert!(!frame.blocks.is_empty());
    }

    #[test]
    fn test_add_and_remove_player() {
        let mut frame = flat_frame();
        frame.add_player(3, "peter");
        assert_eq!(frame.get_player(3).map(|p| p.name()), Some("peter"));
        assert_eq!(
            frame.get_player(3).map(|p| p.position()),
            Some(frame.blocks.get_respawn_position())
        );

        assert!(frame.remove_player(3).is_some());
        assert!(frame.remove_player(3).is_none());
        assert!(frame.get_player(3).is_none());
    }

    #[test]
    fn test_tick_reports_winner() {
        let mut frame = flat_frame();
        frame
            .add_player(1, "runner")
            .set_position(Vec3::new(3.0, 1.0 + SNAP_DISTANCE, 3.0));
        frame.add_player(2, "idle");

        let report = frame.tick();
        assert_eq!(report.winners, vec![1]);
        assert!(report.fallen.is_empty());
    }

    #[test]
    fn test_left_click_removes_block_below() {
        let mut frame = flat_frame();
        let player = frame.add_player(1, "digger");
        look_down(player);
        frame.tick();

        frame
            .get_player_mut(1)
            .unwrap()
            .set_actions(Actions::LEFT_MOUSE);
        frame.tick();

        assert_eq!(frame.blocks.block_removes(), &[IVec3::new(0, 0, 0)]);
        assert_eq!(frame.blocks.get(IVec3::new(0, 0, 0)), None);
    }

    #[test]
    fn test_right_click_never_places_inside_a_body() {
        let mut frame = flat_frame();
        let player = frame.add_player(1, "builder");
        look_down(player);
        frame.tick();

        frame
            .get_player_mut(1)
            .unwrap()
            .set_actions(Actions::RIGHT_MOUSE);
        frame.tick();

        // The ray never leaves the player's own cell before meeting the floor
        assert!(frame.blocks.block_additions().is_empty());
    }

    #[test]
    fn test_right_click_places_block_in_front() {
        let mut frame = flat_frame();
        frame.add_player(1, "builder");
        frame.tick();

        // Look forward and slightly down so the ray meets the floor ahead
        let player = frame.get_player_mut(1).unwrap();
        player.update_direction(Vec2::new(0.0, 30.0 / PLAYER_ROTATE_SPEED));
        player.set_actions(Actions::RIGHT_MOUSE);
        frame.tick();

        let additions = frame.blocks.block_additions();
        assert_eq!(additions.len(), 1);
        assert_eq!(additions[0].block_type, BlockType::Platform);
        assert_eq!(additions[0].position.y, 1);
    }

    #[test]
    fn test_winning_block_cannot_be_removed() {
        let mut frame = flat_frame();
        let player = frame.add_player(1, "cheater");
        player.set_position(Vec3::new(1.0, SNAP_DISTANCE, 3.0));
        frame.tick();

        let player = frame.get_player_mut(1).unwrap();
        player.set_actions(Actions::LEFT_MOUSE);
        frame.tick();

        assert_eq!(frame.blocks.get(IVec3::new(3, 1, 3)), Some(BlockType::Winning));
    }

    #[test]
    fn test_sheep_tick_with_frame() {
        let mut frame = flat_frame();
        frame.spawn_sheep(4);
        let before: Vec<Vec3> = frame.sheep.iter().map(|s| s.position()).collect();
        for _ in 0..5 {
            frame.tick();
        }
        let after: Vec<Vec3> = frame.sheep.iter().map(|s| s.position()).collect();
        assert_ne!(before, after);
    }
}
