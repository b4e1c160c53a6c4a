use clap::Parser;
use client::game::ClientSession;
use client::input::InputManager;
use client::network::NetworkClient;
use client::rendering::Renderer;
use log::{error, info, warn};
use macroquad::prelude::{next_frame, prevent_quit, Conf};
use shared::packets::{truncate_name, ActionsPacket, LoginPacket, LogoutPacket, Packet};
use shared::DEFAULT_PORT;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Player name shown to other players
    #[arg(default_value = "player")]
    name: String,

    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Cube Racing".to_owned(),
        window_width: 1280,
        window_height: 720,
        high_dpi: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("Client stopped: {}", e);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let name = truncate_name(&args.name);
    info!("Connecting to {} as \"{}\"", args.server, name);
    info!("Controls: WASD to move, Space to jump, E to hook, mouse to edit blocks, Tab to free the cursor");

    let mut network = NetworkClient::connect(&args.server)?;
    let login = LoginPacket { name }.encode()?;

    let mut session = ClientSession::new();
    let mut input = InputManager::new();
    let renderer = Renderer::new();
    prevent_quit();

    loop {
        let sample = input.update();
        if sample.quit {
            break;
        }

        let now = Instant::now();
        if session.login_due(now) {
            network.async_send(login.clone());
            session.mark_login_sent(now);
        }

        session.look(sample.mouse_changes);
        if session.is_joined() {
            let packet = ActionsPacket {
                actions: sample.actions,
                mouse_changes: sample.mouse_changes,
            };
            network.async_send(packet.encode()?);
        }

        for message in network.messages() {
            if let Err(e) = session.handle_message(&message) {
                warn!("Dropping server message: {}", e);
            }
        }

        renderer.render(session.frame(), session.local_player_id());
        next_frame().await;
    }

    info!("Leaving after {} updates", session.updates_received());
    network.send(&LogoutPacket.encode()?)?;
    Ok(())
}
