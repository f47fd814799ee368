use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, path::PathBuf, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_task_count")]
    pub task_count: u64,

    #[serde(default = "default_task_queue_capacity")]
    pub task_queue_capacity: usize,

    #[serde(default = "default_result_channel_capacity")]
    pub result_channel_capacity: usize,

    #[serde(default = "default_connection_channel_capacity")]
    pub connection_channel_capacity: usize,

    /// Simulated processing time of one task.
    #[serde(default = "default_work_delay", with = "duration_ms")]
    pub work_delay: Duration,

    #[serde(default = "default_tick_interval", with = "duration_ms")]
    pub tick_interval: Duration,

    #[serde(default)]
    pub keyboard: KeyboardConfig,

    #[serde(default)]
    pub file: FileConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_input_path")]
    pub path: PathBuf,

    #[serde(default = "default_line_delay", with = "duration_ms")]
    pub line_delay: Duration,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_input_path(),
            line_delay: default_line_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// One listener per port. Empty disables networking.
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            ports: default_ports(),
        }
    }
}

fn default_workers() -> usize {
    2
}
fn default_task_count() -> u64 {
    4
}
fn default_task_queue_capacity() -> usize {
    5
}
fn default_result_channel_capacity() -> usize {
    20
}
fn default_connection_channel_capacity() -> usize {
    1
}
fn default_work_delay() -> Duration {
    Duration::from_millis(5000)
}
fn default_tick_interval() -> Duration {
    Duration::from_secs(10)
}
fn default_line_delay() -> Duration {
    Duration::from_millis(3000)
}
fn default_true() -> bool {
    true
}
fn default_input_path() -> PathBuf {
    PathBuf::from("input.txt")
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_ports() -> Vec<u16> {
    vec![8080]
}

// Durations travel as integer milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            task_count: default_task_count(),
            task_queue_capacity: default_task_queue_capacity(),
            result_channel_capacity: default_result_channel_capacity(),
            connection_channel_capacity: default_connection_channel_capacity(),
            work_delay: default_work_delay(),
            tick_interval: default_tick_interval(),
            keyboard: KeyboardConfig::default(),
            file: FileConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl SystemConfig {
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.task_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "task_queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.result_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "result_channel_capacity must be greater than 0".to_string(),
            ));
        }
        if self.connection_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "connection_channel_capacity must be greater than 0".to_string(),
            ));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "tick_interval must be greater than 0".to_string(),
            ));
        }
        let mut ports = self.network.ports.clone();
        ports.sort_unstable();
        if ports.windows(2).any(|w| w[0] == w[1] && w[0] != 0) {
            return Err(ConfigError::Invalid(format!(
                "duplicate listener port in {:?}",
                self.network.ports
            )));
        }
        Ok(())
    }

    /// Number of producers the completion tracker waits for.
    pub fn tracked_producers(&self) -> usize {
        self.workers + usize::from(self.keyboard.enabled) + usize::from(self.file.enabled)
    }
}
