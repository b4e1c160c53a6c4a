use crate::blocks::BlockContainer;
use crate::body::Body;
use crate::hook::HookState;
use crate::{
    CAMERA_OFFSET, GRAVITY, HOOK_ACCELERATION, HOOK_DRAG, MAX_PITCH, MAX_PLAYER_SPEED,
    PLAYER_ACCELERATION, PLAYER_DRAG, PLAYER_JUMP_SPEED, PLAYER_ROTATE_SPEED,
};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

/// Bitfield of the inputs a player is currently holding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Actions(u8);

impl Actions {
    pub const NONE: Actions = Actions(0);
    pub const FORWARD: Actions = Actions(1 << 0);
    pub const BACKWARD: Actions = Actions(1 << 1);
    pub const LEFT: Actions = Actions(1 << 2);
    pub const RIGHT: Actions = Actions(1 << 3);
    pub const JUMP: Actions = Actions(1 << 4);
    pub const HOOK: Actions = Actions(1 << 5);
    pub const LEFT_MOUSE: Actions = Actions(1 << 6);
    pub const RIGHT_MOUSE: Actions = Actions(1 << 7);

    pub fn from_bits(bits: u8) -> Self {
        Actions(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Actions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Actions) {
        self.0 |= other.0;
    }

    /// Bits set in `self` that were not set in `previous`
    pub fn newly_set(self, previous: Actions) -> Actions {
        Actions(self.0 & !previous.0)
    }
}

impl BitOr for Actions {
    type Output = Actions;

    fn bitor(self, rhs: Actions) -> Actions {
        Actions(self.0 | rhs.0)
    }
}

impl BitOrAssign for Actions {
    fn bitor_assign(&mut self, rhs: Actions) {
        self.0 |= rhs.0;
    }
}

/// What happened to a player during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerTick {
    pub reached_goal: bool,
    pub fell_out: bool,
}

#[derive(Debug, Clone)]
pub struct Player {
    id: u8,
    name: String,
    body: Body,
    /// x = pitch, y = yaw, both in degrees
    view_angles: Vec2,
    actions: Actions,
    hook: HookState,
    hook_requested: bool,
    on_left_mouse_pressed: bool,
    on_right_mouse_pressed: bool,
}

impl Player {
    pub fn new(id: u8, name: impl Into<String>, position: Vec3) -> Self {
        Self {
            id,
            name: name.into(),
            body: Body::new(position),
            view_angles: Vec2::ZERO,
            actions: Actions::NONE,
            hook: HookState::Retracted,
            hook_requested: false,
            on_left_mouse_pressed: false,
            on_right_mouse_pressed: false,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Vec3 {
        self.body.position
    }

    pub fn speed(&self) -> Vec3 {
        self.body.speed
    }

    pub fn view_angles(&self) -> Vec2 {
        self.view_angles
    }

    pub fn actions(&self) -> Actions {
        self.actions
    }

    pub fn hook(&self) -> &HookState {
        &self.hook
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.body.position = position;
    }

    pub fn set_speed(&mut self, speed: Vec3) {
        self.body.speed = speed;
    }

    pub fn set_view_angles(&mut self, view_angles: Vec2) {
        self.view_angles = view_angles;
    }

    /// Replaces the held inputs, latching the edge-triggered flags for
    /// buttons that went down since the previous call.
    pub fn set_actions(&mut self, actions: Actions) {
        let pressed = actions.newly_set(self.actions);
        if pressed.contains(Actions::LEFT_MOUSE) {
            self.on_left_mouse_pressed = true;
        }
        if pressed.contains(Actions::RIGHT_MOUSE) {
            self.on_right_mouse_pressed = true;
        }
        if pressed.contains(Actions::HOOK) {
            self.hook_requested = true;
        }
        self.actions = actions;
    }

    pub fn poll_left_mouse_pressed(&mut self) -> bool {
        std::mem::take(&mut self.on_left_mouse_pressed)
    }

    pub fn poll_right_mouse_pressed(&mut self) -> bool {
        std::mem::take(&mut self.on_right_mouse_pressed)
    }

    /// Applies a mouse movement to the view angles. Pitch is clamped so the
    /// camera never flips over.
    pub fn update_direction(&mut self, mouse_changes: Vec2) {
        if !mouse_changes.is_finite() {
            return;
        }
        self.view_angles.y += mouse_changes.x * PLAYER_ROTATE_SPEED;
        self.view_angles.x -= mouse_changes.y * PLAYER_ROTATE_SPEED;
        self.view_angles.x = self.view_angles.x.clamp(-MAX_PITCH, MAX_PITCH);
    }

    pub fn up() -> Vec3 {
        Vec3::Y
    }

    pub fn direction(&self) -> Vec3 {
        let pitch = self.view_angles.x.to_radians();
        let yaw = self.view_angles.y.to_radians();
        Vec3::new(pitch.cos() * yaw.cos(), pitch.sin(), pitch.cos() * yaw.sin()).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.direction().cross(Self::up()).normalize()
    }

    pub fn eye_position(&self) -> Vec3 {
        self.body.position + CAMERA_OFFSET
    }

    pub fn respawn(&mut self, position: Vec3) {
        self.body = Body::new(position);
        self.view_angles = Vec2::ZERO;
        self.hook = HookState::Retracted;
    }

    /// Advances the player by one tick against the given world.
    pub fn tick(&mut self, blocks: &BlockContainer) -> PlayerTick {
        self.update_hook(blocks);

        if !self.hook.is_hooked() {
            self.body.apply_gravity(GRAVITY);
        }
        self.apply_player_movements(blocks);
        self.body.integrate();

        self.physics(blocks)
    }

    fn update_hook(&mut self, blocks: &BlockContainer) {
        let requested = std::mem::take(&mut self.hook_requested);

        if !self.actions.contains(Actions::HOOK) {
            self.hook = HookState::Retracted;
            return;
        }

        if requested && self.hook.is_retracted() {
            self.hook = HookState::launch(self.eye_position(), self.direction());
        }
        self.hook = self.hook.extend(blocks);
    }

    fn apply_player_movements(&mut self, blocks: &BlockContainer) {
        let mut forward = 0.0;
        if self.actions.contains(Actions::FORWARD) {
            forward += 1.0;
        }
        if self.actions.contains(Actions::BACKWARD) {
            forward -= 1.0;
        }

        let mut right = 0.0;
        if self.actions.contains(Actions::LEFT) {
            right -= 1.0;
        }
        if self.actions.contains(Actions::RIGHT) {
            right += 1.0;
        }

        // A jump replaces the whole speed, so momentum does not carry into it
        if self.actions.contains(Actions::JUMP) && self.body.on_ground(blocks) {
            self.body.speed = Self::up() * PLAYER_JUMP_SPEED;
        }

        let mut flat_direction = self.direction();
        flat_direction.y = 0.0;
        let flat_direction = flat_direction.normalize_or_zero();

        self.body.speed += (self.right() * right + flat_direction * forward) * PLAYER_ACCELERATION;

        if let Some(target) = self.hook.target() {
            let pull = (target - self.body.position).normalize_or_zero();
            self.body.speed += pull * HOOK_ACCELERATION;
            self.body.speed *= 1.0 - HOOK_DRAG;
            return;
        }

        let mut horizontal = Vec2::new(self.body.speed.x, self.body.speed.z);
        if horizontal.length() <= PLAYER_DRAG {
            horizontal = Vec2::ZERO;
        } else {
            horizontal -= horizontal.normalize() * PLAYER_DRAG;
            if horizontal.length() > MAX_PLAYER_SPEED {
                horizontal *= MAX_PLAYER_SPEED / horizontal.length();
            }
        }
        self.body.speed.x = horizontal.x;
        self.body.speed.z = horizontal.y;
    }

    fn physics(&mut self, blocks: &BlockContainer) -> PlayerTick {
        self.body.resolve_collisions(blocks);

        let mut outcome = PlayerTick::default();

        let reached_goal = blocks
            .get_colliding_blocks(&self.body.bottom_collider())
            .iter()
            .any(|b| b.is_winning_block());
        if reached_goal {
            self.respawn(blocks.get_respawn_position());
            outcome.reached_goal = true;
        }

        if self.body.is_in_void(blocks) || !self.body.position.is_finite() {
            self.respawn(blocks.get_respawn_position());
            outcome.fell_out = true;
        }

        outcome
    }
}
