//! # Tile World Game Server Library
//!
//! This library is the authoritative server for a tile-based multiplayer
//! world. It owns the one true copy of every player and monster, validates
//! every client intent against it and periodically broadcasts the result so
//! all clients converge on the same picture.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Movement is validated against a static collision map, combat is resolved
//! with a per-entity cooldown and a randomized damage roll, and monsters run a
//! simple aggro/chase/attack behavior. Clients only ever send intents.
//!
//! ### Client Management
//! Tracks UDP endpoints as connections: join, heartbeat, explicit leave and
//! idle timeout.
//!
//! ### State Broadcasting
//! A full snapshot of players and monsters goes out every sync tick (100 ms
//! by default). Discrete events such as damage, deaths and respawns are sent
//! as they happen.
//!
//! ## Architecture Design
//!
//! ### Single-Task Event Loop
//! Every mutation happens inside one `tokio::select!` loop. Network receive,
//! network send and timeout checking run as separate tasks that talk to the
//! loop over unbounded channels. The sync tick, the monster behavior tick and
//! respawn timers are all serviced from that same loop, so no two operations
//! ever interleave on the same entity.
//!
//! ### Injected Collaborators
//! The engine (`game::GameState`) takes a clock, an id generator, a
//! broadcaster and a random number generator at construction. Tests swap in
//! `ManualClock`, `SequentialIds`, `RecordingBroadcaster` and a seeded
//! `StdRng` to make every scenario reproducible.
//!
//! ## Module Organization
//!
//! - `world`: immutable tile grid, map loading and walkability
//! - `player`, `monster`: entity records and the monster catalog
//! - `combat`: cooldown ledger, range checks and damage rolls
//! - `movement`, `behavior`: greedy stepping and monster decisions
//! - `scheduler`: respawn queue
//! - `game`: the engine tying it all together
//! - `client_manager`, `network`: UDP sessions and the server loop
//! - `config`: command-line options
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use clap::Parser;
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::parse();
//!     let world = config.load_world()?;
//!     let catalog = config.load_catalog()?;
//!
//!     let mut server = Server::new(&config, world, catalog).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod behavior;
pub mod broadcast;
pub mod client_manager;
pub mod clock;
pub mod combat;
pub mod config;
pub mod error;
pub mod game;
pub mod ids;
pub mod monster;
pub mod movement;
pub mod network;
pub mod player;
pub mod scheduler;
pub mod world;
