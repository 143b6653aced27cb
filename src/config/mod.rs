//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
    /// Allowed client origins for CORS ("*" allows any)
    pub client_origin: String,

    /// Arena and physics constants shared with the client renderer
    pub game: GameConfig,
    /// Room lifecycle settings
    pub rooms: RoomConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        };

        let game = GameConfig::from_env()?;
        game.validate()?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            game,
            rooms: RoomConfig::from_env()?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            log_level: "info".to_string(),
            log_json: false,
            client_origin: "*".to_string(),
            game: GameConfig::default(),
            rooms: RoomConfig::default(),
        }
    }
}

/// Highest accepted simulation rate; keeps the tick period above zero
pub const MAX_TICK_RATE: u32 = 1000;

/// Arena constants. The client renders with the same numbers, so
/// any override here has to be mirrored in the client build.
#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    pub arena_width: f64,
    pub arena_height: f64,
    pub player_size: f64,
    pub object_size: f64,
    /// Player movement speed in units per second
    pub player_speed: f64,
    /// Downward acceleration of falling objects in units per second squared
    pub gravity: f64,
    /// Seconds of game time between spawns
    pub spawn_interval: f64,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Distance below the arena an object travels before it is dropped
    pub despawn_margin: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            arena_width: 800.0,
            arena_height: 600.0,
            player_size: 32.0,
            object_size: 32.0,
            player_speed: 300.0,
            gravity: 1500.0,
            spawn_interval: 0.3,
            tick_rate: 20,
            despawn_margin: 100.0,
        }
    }
}

impl GameConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            arena_width: env_or("ARENA_WIDTH", defaults.arena_width)?,
            arena_height: env_or("ARENA_HEIGHT", defaults.arena_height)?,
            player_size: env_or("PLAYER_SIZE", defaults.player_size)?,
            object_size: env_or("OBJECT_SIZE", defaults.object_size)?,
            player_speed: env_or("PLAYER_SPEED", defaults.player_speed)?,
            gravity: env_or("GRAVITY", defaults.gravity)?,
            spawn_interval: env_or("SPAWN_INTERVAL", defaults.spawn_interval)?,
            tick_rate: env_or("TICK_RATE", defaults.tick_rate)?,
            despawn_margin: env_or("DESPAWN_MARGIN", defaults.despawn_margin)?,
        })
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 || self.tick_rate > MAX_TICK_RATE {
            return Err(ConfigError::OutOfRange("TICK_RATE"));
        }
        if !(self.player_size > 0.0) {
            return Err(ConfigError::OutOfRange("PLAYER_SIZE"));
        }
        if !(self.object_size > 0.0) {
            return Err(ConfigError::OutOfRange("OBJECT_SIZE"));
        }
        if !(self.arena_width > self.player_size.max(self.object_size)) {
            return Err(ConfigError::OutOfRange("ARENA_WIDTH"));
        }
        if !(self.arena_height > self.player_size) {
            return Err(ConfigError::OutOfRange("ARENA_HEIGHT"));
        }
        if !(self.spawn_interval >= 0.0) {
            return Err(ConfigError::OutOfRange("SPAWN_INTERVAL"));
        }
        if !(self.gravity >= 0.0) {
            return Err(ConfigError::OutOfRange("GRAVITY"));
        }
        if !(self.player_speed >= 0.0) {
            return Err(ConfigError::OutOfRange("PLAYER_SPEED"));
        }
        Ok(())
    }

    /// Fixed timestep in seconds
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate as f64
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate as u64)
    }

    /// Largest legal player x coordinate
    pub fn max_player_x(&self) -> f64 {
        self.arena_width - self.player_size
    }

    /// Largest legal player y coordinate
    pub fn max_player_y(&self) -> f64 {
        self.arena_height - self.player_size
    }
}

/// Room lifecycle configuration
#[derive(Clone, Debug, PartialEq)]
pub struct RoomConfig {
    /// Grace period before an empty room is deleted
    pub cleanup_delay: Duration,
    /// Rooms without any activity for this long are swept
    pub idle_timeout: Duration,
    /// How often the idle sweep runs
    pub sweep_interval: Duration,
    /// Create rooms for unknown codes on join instead of failing
    pub auto_create: bool,
    /// How long a fresh connection may stay outside any room
    pub join_grace: Duration,
    /// Max inbound messages per second per connection
    pub input_rate_limit: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            cleanup_delay: Duration::from_millis(30_000),
            idle_timeout: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
            auto_create: true,
            join_grace: Duration::from_secs(30),
            input_rate_limit: 60,
        }
    }
}

impl RoomConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            cleanup_delay: Duration::from_millis(env_or(
                "ROOM_CLEANUP_DELAY_MS",
                defaults.cleanup_delay.as_millis() as u64,
            )?),
            idle_timeout: Duration::from_secs(env_or(
                "ROOM_IDLE_TIMEOUT_SECS",
                defaults.idle_timeout.as_secs(),
            )?),
            sweep_interval: Duration::from_secs(env_or(
                "ROOM_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )?),
            auto_create: env_or("ROOM_AUTO_CREATE", defaults.auto_create)?,
            join_grace: Duration::from_secs(env_or(
                "JOIN_GRACE_SECS",
                defaults.join_grace.as_secs(),
            )?),
            input_rate_limit: env_or("INPUT_RATE_LIMIT", defaults.input_rate_limit)?,
        })
    }
}

/// Read and parse an optional environment variable
fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Value out of range for environment variable: {0}")]
    OutOfRange(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
