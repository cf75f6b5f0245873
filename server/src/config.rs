//! Command-line configuration for the game server.

use crate::error::MapError;
use crate::monster::MonsterCatalog;
use crate::world::World;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use shared::{AI_TICK_INTERVAL_MS, STATE_SYNC_INTERVAL_MS};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Authoritative tile world game server")]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Full-state broadcast period in milliseconds
    #[arg(long, default_value_t = STATE_SYNC_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub sync_interval_ms: u64,

    /// Monster behavior tick period in milliseconds
    #[arg(long, default_value_t = AI_TICK_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub ai_interval_ms: u64,

    /// Maximum number of concurrent clients
    #[arg(short, long, default_value_t = 64)]
    pub max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub client_timeout_secs: u64,

    /// Map JSON file; the built-in starter town is used when omitted
    #[arg(long)]
    pub map: Option<PathBuf>,

    /// Monster catalog JSON file; the built-in catalog is used when omitted
    #[arg(long)]
    pub monsters: Option<PathBuf>,

    /// Seed for damage rolls, for reproducible sessions
    #[arg(long)]
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::parse_from(["server"])
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn ai_interval(&self) -> Duration {
        Duration::from_millis(self.ai_interval_ms)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    pub fn load_world(&self) -> Result<World, MapError> {
        match &self.map {
            Some(path) => World::load(path),
            None => Ok(World::starter_town()),
        }
    }

    pub fn load_catalog(&self) -> Result<MonsterCatalog, MapError> {
        match &self.monsters {
            Some(path) => MonsterCatalog::load(path),
            None => Ok(MonsterCatalog::default()),
        }
    }

    pub fn rng(&self) -> Box<dyn RngCore + Send> {
        match self.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_entropy()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.sync_interval(), Duration::from_millis(100));
        assert_eq!(config.ai_interval(), Duration::from_millis(500));
        assert_eq!(config.max_clients, 64);
        assert_eq!(config.client_timeout(), Duration::from_secs(5));
        assert!(config.map.is_none());
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::parse_from([
            "server",
            "-H",
            "0.0.0.0",
            "--port",
            "9000",
            "--sync-interval-ms",
            "50",
            "--max-clients",
            "8",
            "--seed",
            "3",
        ]);
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(config.sync_interval_ms, 50);
        assert_eq!(config.max_clients, 8);
        assert_eq!(config.seed, Some(3));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = ServerConfig::try_parse_from(["server", "--ai-interval-ms", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_builtin_data_when_no_files_given() {
        let config = ServerConfig::default();
        assert_eq!(config.load_world().unwrap().map().name, "Starter Town");
        assert_eq!(config.load_catalog().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_map_file() {
        let config = ServerConfig::parse_from(["server", "--map", "/nonexistent/map.json"]);
        assert!(matches!(config.load_world(), Err(MapError::Io(_))));
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let config = ServerConfig::parse_from(["server", "--seed", "11"]);
        let mut a = config.rng();
        let mut b = config.rng();
        let rolls_a: Vec<u32> = (0..5).map(|_| a.gen()).collect();
        let rolls_b: Vec<u32> = (0..5).map(|_| b.gen()).collect();
        assert_eq!(rolls_a, rolls_b);
    }
}
