//! Headless smoke-test client.
//!
//! Joins the server, then for a few seconds sends heartbeats, random moves and
//! attacks on the nearest living monster while printing what comes back.

use bincode::{deserialize, serialize};
use clap::Parser;
use rand::Rng;
use shared::{Direction, EntityId, MonsterState, Packet};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout};

#[derive(Parser, Debug)]
#[command(about = "Smoke-test bot for the tile world server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,
    /// Player name
    #[arg(short, long, default_value = "SmokeBot")]
    name: String,
    /// Number of actions to send
    #[arg(short, long, default_value_t = 20)]
    actions: u32,
}

struct View {
    player_id: EntityId,
    position: (i32, i32),
    monsters: Vec<MonsterState>,
}

impl View {
    fn apply(&mut self, packet: &Packet) {
        match packet {
            Packet::GameState {
                players, monsters, ..
            } => {
                if let Some(me) = players.iter().find(|p| p.id == self.player_id) {
                    self.position = (me.x, me.y);
                }
                self.monsters = monsters.clone();
            }
            Packet::MonstersState { monsters } => self.monsters = monsters.clone(),
            Packet::PlayerMoved { id, x, y, .. } if *id == self.player_id => {
                self.position = (*x, *y);
            }
            _ => {}
        }
    }

    fn nearest_monster(&self) -> Option<EntityId> {
        self.monsters
            .iter()
            .filter(|m| m.is_alive)
            .min_by_key(|m| {
                let dx = (m.x - self.position.0) as i64;
                let dy = (m.y - self.position.1) as i64;
                dx * dx + dy * dy
            })
            .map(|m| m.id)
    }
}

async fn send(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    socket.send_to(&serialize(packet)?, addr).await?;
    Ok(())
}

fn describe(packet: &Packet) -> String {
    match packet {
        Packet::GameState {
            players,
            monsters,
            timestamp,
        } => format!(
            "state @{}: {} players, {} monsters",
            timestamp,
            players.len(),
            monsters.len()
        ),
        Packet::MonstersState { monsters } => format!("monsters moved ({})", monsters.len()),
        other => format!("{:?}", other),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    println!("Joining {} as '{}'", args.server, args.name);
    send(&socket, &Packet::Join { name: args.name.clone() }, args.server).await?;

    let mut buf = vec![0u8; 64 * 1024];

    let (len, _) = timeout(Duration::from_secs(3), socket.recv_from(&mut buf)).await??;
    let mut view = match deserialize::<Packet>(&buf[..len])? {
        Packet::Init {
            player_id,
            map,
            players,
            monsters,
        } => {
            println!(
                "Joined as {} on '{}' ({}x{}), {} players, {} monsters",
                player_id,
                map.name,
                map.width,
                map.height,
                players.len(),
                monsters.len()
            );
            let position = players
                .iter()
                .find(|p| p.id == player_id)
                .map(|p| (p.x, p.y))
                .unwrap_or_default();
            View {
                player_id,
                position,
                monsters,
            }
        }
        Packet::Error { message } => {
            println!("Join rejected: {}", message);
            return Ok(());
        }
        other => {
            println!("Expected Init but got: {:?}", other);
            return Ok(());
        }
    };

    let mut rng = rand::thread_rng();
    let mut ticker = interval(Duration::from_millis(250));
    let mut sent = 0;

    while sent < args.actions {
        tokio::select! {
            _ = ticker.tick() => {
                let packet = if sent % 4 == 3 {
                    Packet::Heartbeat
                } else if rng.gen_bool(0.5) {
                    match view.nearest_monster() {
                        Some(target_id) => Packet::Attack { target_id },
                        None => Packet::Heartbeat,
                    }
                } else {
                    Packet::Move {
                        direction: Direction::ALL[rng.gen_range(0..4)],
                        timestamp: 0,
                    }
                };
                println!("-> {:?}", packet);
                send(&socket, &packet, args.server).await?;
                sent += 1;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, _) = received?;
                match deserialize::<Packet>(&buf[..len]) {
                    Ok(packet) => {
                        if !matches!(packet, Packet::GameState { .. }) {
                            println!("<- {}", describe(&packet));
                        }
                        view.apply(&packet);
                    }
                    Err(e) => println!("Failed to deserialize packet: {}", e),
                }
            }
        }
    }

    send(&socket, &Packet::Leave, args.server).await?;
    println!("Test client finished at {:?}", view.position);

    Ok(())
}
