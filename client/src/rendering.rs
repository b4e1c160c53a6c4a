use macroquad::prelude::{
    clear_background, draw_cube, draw_cube_wires, draw_line_3d, draw_rectangle, draw_text,
    get_fps, screen_height, screen_width, set_camera, set_default_camera, vec3, Camera3D, Color,
    BLACK, WHITE,
};
use shared::{BlockType, Frame, Player, CAMERA_OFFSET};

const SKY: Color = Color::new(0.53, 0.75, 0.95, 1.0);
const SHEEP_COLOR: Color = Color::new(0.95, 0.95, 0.92, 1.0);
const HUD_BACKGROUND: Color = Color::new(0.0, 0.0, 0.0, 0.5);

fn to_mq(v: glam::Vec3) -> macroquad::math::Vec3 {
    vec3(v.x, v.y, v.z)
}

pub fn block_color(block_type: BlockType) -> Color {
    match block_type {
        BlockType::Ground => Color::from_rgba(96, 160, 72, 255),
        BlockType::Platform => Color::from_rgba(150, 150, 160, 255),
        BlockType::Anchor => Color::from_rgba(220, 120, 40, 255),
        BlockType::Winning => Color::from_rgba(240, 210, 40, 255),
    }
}

pub fn player_color(id: u8) -> Color {
    const PALETTE: [(u8, u8, u8); 8] = [
        (230, 60, 60),
        (60, 120, 230),
        (60, 200, 90),
        (200, 80, 220),
        (240, 150, 30),
        (40, 200, 200),
        (140, 90, 50),
        (250, 120, 170),
    ];
    let (r, g, b) = PALETTE[id as usize % PALETTE.len()];
    Color::from_rgba(r, g, b, 255)
}

/// Draws a frame from the local player's eyes
pub struct Renderer {
    draw_distance: f32,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            draw_distance: 80.0,
        }
    }

    pub fn render(&self, frame: &Frame, local_player_id: Option<u8>) {
        clear_background(SKY);

        let local = local_player_id.and_then(|id| frame.get_player(id));
        let eye = self.set_camera_for(frame, local);

        for block in frame.blocks.iter() {
            let center = block.position.as_vec3();
            if center.distance(eye) > self.draw_distance {
                continue;
            }
            let size = vec3(1.0, 1.0, 1.0);
            draw_cube(to_mq(center), size, None, block_color(block.block_type));
            draw_cube_wires(to_mq(center), size, BLACK);
        }

        for player in frame.players.values() {
            if Some(player.id()) == local_player_id {
                continue;
            }
            self.draw_player(player);
        }

        for sheep in frame.sheep.iter() {
            let position = sheep.position();
            draw_cube(to_mq(position), vec3(0.9, 0.7, 0.9), None, SHEEP_COLOR);
            let nose = position + sheep.heading() * 0.6;
            draw_line_3d(to_mq(position), to_mq(nose), BLACK);
        }

        set_default_camera();
        self.draw_hud(frame, local);
    }

    fn set_camera_for(&self, frame: &Frame, local: Option<&Player>) -> glam::Vec3 {
        let (eye, target) = match local {
            Some(player) => (
                player.eye_position(),
                player.eye_position() + player.direction(),
            ),
            // Overview of the start area until the server assigns us a player
            None => {
                let respawn = frame.blocks.get_respawn_position();
                (
                    respawn + glam::Vec3::new(-12.0, 10.0, 0.0),
                    respawn,
                )
            }
        };

        set_camera(&Camera3D {
            position: to_mq(eye),
            target: to_mq(target),
            up: vec3(0.0, 1.0, 0.0),
            ..Default::default()
        });
        eye
    }

    fn draw_player(&self, player: &Player) {
        let position = player.position();
        draw_cube(
            to_mq(position),
            vec3(1.0, 1.0, 1.0),
            None,
            player_color(player.id()),
        );

        let eye = position + CAMERA_OFFSET;
        draw_line_3d(to_mq(eye), to_mq(eye + player.direction()), WHITE);
    }

    fn draw_hud(&self, frame: &Frame, local: Option<&Player>) {
        let cx = screen_width() / 2.0;
        let cy = screen_height() / 2.0;
        draw_rectangle(cx - 1.0, cy - 6.0, 2.0, 12.0, WHITE);
        draw_rectangle(cx - 6.0, cy - 1.0, 12.0, 2.0, WHITE);

        let lines = 2 + frame.players.len();
        draw_rectangle(5.0, 5.0, 220.0, 20.0 * lines as f32 + 10.0, HUD_BACKGROUND);

        let status = match local {
            Some(player) => format!("Playing as {} ({})", player.name(), player.id()),
            None => "Connecting...".to_owned(),
        };
        draw_text(&status, 12.0, 24.0, 20.0, WHITE);
        draw_text(&format!("{} FPS", get_fps()), 12.0, 44.0, 20.0, WHITE);

        for (i, player) in frame.players.values().enumerate() {
            let y = 64.0 + 20.0 * i as f32;
            draw_rectangle(12.0, y - 12.0, 12.0, 12.0, player_color(player.id()));
            draw_text(player.name(), 30.0, y, 20.0, WHITE);
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
