use crate::blocks::BlockContainer;
use crate::body::Body;
use crate::{GRAVITY, SHEEP_SPEED, SHEEP_TURN_DEGREES};
use glam::Vec3;
use rand::Rng;

/// Wandering non-player entity. Sheep take no input; their state is only
/// ever broadcast.
#[derive(Debug, Clone)]
pub struct Sheep {
    body: Body,
    /// Heading in degrees, same convention as player yaw
    yaw: f32,
}

impl Sheep {
    pub fn new(position: Vec3, yaw: f32) -> Self {
        Self {
            body: Body::new(position),
            yaw,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.body.position
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.body.position = position;
    }

    pub fn set_yaw(&mut self, yaw: f32) {
        self.yaw = yaw;
    }

    pub fn heading(&self) -> Vec3 {
        let yaw = self.yaw.to_radians();
        Vec3::new(yaw.cos(), 0.0, yaw.sin())
    }

    pub fn tick<R: Rng>(&mut self, blocks: &BlockContainer, rng: &mut R) {
        self.yaw = (self.yaw + rng.gen_range(-SHEEP_TURN_DEGREES..=SHEEP_TURN_DEGREES)) % 360.0;

        self.body.apply_gravity(GRAVITY);
        let walk = self.heading() * SHEEP_SPEED;
        self.body.speed.x = walk.x;
        self.body.speed.z = walk.z;
        self.body.integrate();
        self.body.resolve_collisions(blocks);

        if self.body.is_in_void(blocks) {
            self.body = Body::new(blocks.get_respawn_position());
        }
    }
}
