use serde::Deserialize;
use std::path::PathBuf;

/// Complete server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AtlasConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub gc: GcConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    5991
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// World-file persistence. When `file` is set the server loads it on
/// startup and flushes the head snapshot back on an interval.
#[derive(Debug, Clone, Deserialize)]
pub struct WorldConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default = "default_flush_interval")]
    pub flush_interval_seconds: u64,
}

fn default_flush_interval() -> u64 {
    10
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            file: None,
            flush_interval_seconds: default_flush_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GcConfig {
    #[serde(default = "default_gc_interval")]
    pub interval_seconds: u64,
}

fn default_gc_interval() -> u64 {
    1
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_gc_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineConfig {
    /// How many accepted changes the in-memory timeline retains.
    #[serde(default = "default_retention")]
    pub retention: usize,
}

fn default_retention() -> usize {
    65_536
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
        }
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &str) -> Result<AtlasConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: AtlasConfig = toml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AtlasConfig::default();
        assert_eq!(config.server.port, 5991);
        assert_eq!(config.world.file, None);
        assert_eq!(config.world.flush_interval_seconds, 10);
        assert_eq!(config.gc.interval_seconds, 1);
        assert_eq!(config.timeline.retention, 65_536);
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            port = 6001

            [world]
            file = "/var/lib/atlas/world.json"
            flush_interval_seconds = 30

            [gc]
            interval_seconds = 2

            [timeline]
            retention = 1024
        "#;

        let config: AtlasConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 6001);
        assert_eq!(
            config.world.file,
            Some(PathBuf::from("/var/lib/atlas/world.json"))
        );
        assert_eq!(config.world.flush_interval_seconds, 30);
        assert_eq!(config.gc.interval_seconds, 2);
        assert_eq!(config.timeline.retention, 1024);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
            [gc]
            interval_seconds = 5
        "#;

        let config: AtlasConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.gc.interval_seconds, 5);
        assert_eq!(config.server.port, 5991);
        assert_eq!(config.world.flush_interval_seconds, 10);
    }
}
