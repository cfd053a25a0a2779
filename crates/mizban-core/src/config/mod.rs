//! Configuration management for Mizban.
//!
//! Settings live in a single JSON object at `<home>/.config/Mizban/config.json`,
//! pretty-printed with 4-space indentation. The store is deliberately schemaless:
//! recognized keys get typed, clamped accessors, and everything else is carried
//! through load/save untouched so older or third-party tooling can stash its own
//! keys next to ours. A malformed file never crashes startup - defaults win.
//!
//! | Key | Range | Default |
//! |-----|-------|---------|
//! | `mizban_shared_dir` | absolute path | `<home>/Desktop/MizbanShared` |
//! | `port` | 1..=65535 | 8000 |
//! | `parallel_chunks` | 1..=64 | 8 |
//! | `chunk_size_bytes` | 256 KiB..=64 MiB | 4 MiB |
//! | `max_file_size_bytes` | 1..=100 GiB | 100 GiB |

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::{
    DEFAULT_CHUNK_SIZE_BYTES, DEFAULT_PARALLEL_CHUNKS, DEFAULT_PORT, MAX_CHUNK_SIZE_BYTES,
    MAX_FILE_SIZE_LIMIT, MIN_CHUNK_SIZE_BYTES,
};

/// Persistent Mizban configuration, keyed the same way the historical
/// releases keyed it so existing config files keep working.
#[derive(Debug)]
pub struct Settings {
    home_dir: PathBuf,
    config_dir: PathBuf,
    config_file: PathBuf,
    cache_dir: PathBuf,

    data: RwLock<Map<String, Value>>,
}

impl Settings {
    /// Load settings for the current user, creating the config file with
    /// defaults when it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or the
    /// config/cache directories cannot be created.
    pub fn new() -> Result<Self> {
        let home = directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))?;
        Self::for_home(&home)
    }

    /// Load settings rooted at an explicit home directory. Mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if `home` is unusable or the config/cache directories
    /// cannot be created.
    pub fn for_home(home: &Path) -> Result<Self> {
        if home.as_os_str().is_empty() || home == Path::new("/") || home == Path::new(".") {
            return Err(Error::Config("invalid home directory".to_string()));
        }

        let config_dir = home.join(".config").join("Mizban");
        let cache_dir = home.join(".cache").join("Mizban");

        let mut data = Map::new();
        data.insert(
            "mizban_shared_dir".to_string(),
            Value::from(
                home.join("Desktop")
                    .join("MizbanShared")
                    .display()
                    .to_string(),
            ),
        );
        data.insert("port".to_string(), Value::from(DEFAULT_PORT));

        let settings = Self {
            home_dir: home.to_path_buf(),
            config_file: config_dir.join("config.json"),
            config_dir,
            cache_dir,
            data: RwLock::new(data),
        };
        settings.load()?;
        Ok(settings)
    }

    fn load(&self) -> Result<()> {
        fs::create_dir_all(&self.config_dir)?;
        fs::create_dir_all(&self.cache_dir)?;

        let raw = match fs::read(&self.config_file) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return self.save(),
            Err(err) => return Err(err.into()),
        };

        let Ok(payload) = serde_json::from_slice::<Map<String, Value>>(&raw) else {
            // Keep defaults when the config exists but is malformed.
            tracing::warn!(
                path = %self.config_file.display(),
                "config file is malformed, keeping defaults"
            );
            return Ok(());
        };

        let mut data = self.data.write();
        for (key, value) in payload {
            data.insert(key, value);
        }
        Ok(())
    }

    /// Persist the current settings, preserving unrecognized keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let payload = self.data.read().clone();

        fs::create_dir_all(&self.config_dir)?;

        let mut buf = Vec::with_capacity(256);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        payload
            .serialize(&mut serializer)
            .map_err(|err| Error::Config(format!("failed to serialize config: {err}")))?;
        buf.push(b'\n');

        fs::write(&self.config_file, buf)?;
        Ok(())
    }

    /// Directory holding the config file.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Full path of the config file.
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Per-user cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Directory thumbnails are written to.
    pub fn thumbnail_dir(&self) -> PathBuf {
        self.cache_dir.join(".thumbnails")
    }

    /// Address the HTTP server binds to.
    pub fn host(&self) -> &'static str {
        "0.0.0.0"
    }

    /// The directory whose contents are shared on the LAN.
    pub fn shared_dir(&self) -> PathBuf {
        let data = self.data.read();
        match data.get("mizban_shared_dir").and_then(Value::as_str) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => self.home_dir.join("Desktop").join("MizbanShared"),
        }
    }

    /// Replace the shared directory.
    pub fn set_shared_dir(&self, dir: &Path) {
        self.data.write().insert(
            "mizban_shared_dir".to_string(),
            Value::from(dir.display().to_string()),
        );
    }

    /// Configured HTTP port; out-of-range values fall back to the default.
    pub fn port(&self) -> u16 {
        let data = self.data.read();
        let port = int_from_value(data.get("port"), i64::from(DEFAULT_PORT));
        u16::try_from(port).ok().filter(|p| *p >= 1).unwrap_or(DEFAULT_PORT)
    }

    /// Replace the configured HTTP port.
    pub fn set_port(&self, port: u16) {
        self.data.write().insert("port".to_string(), Value::from(port));
    }

    /// Number of parallel chunk streams advertised to clients, in 1..=64.
    pub fn parallel_chunks(&self) -> u64 {
        let data = self.data.read();
        let value = int_from_value(
            data.get("parallel_chunks"),
            DEFAULT_PARALLEL_CHUNKS as i64,
        );
        if value < 1 {
            DEFAULT_PARALLEL_CHUNKS
        } else {
            (value as u64).min(64)
        }
    }

    /// Replace the parallel chunk count, clamped to 1..=64.
    pub fn set_parallel_chunks(&self, value: u64) {
        let value = if value < 1 {
            DEFAULT_PARALLEL_CHUNKS
        } else {
            value.min(64)
        };
        self.data
            .write()
            .insert("parallel_chunks".to_string(), Value::from(value));
    }

    /// Chunk size clients should use, clamped to 256 KiB..=64 MiB.
    pub fn chunk_size_bytes(&self) -> u64 {
        let data = self.data.read();
        let value = int_from_value(
            data.get("chunk_size_bytes"),
            DEFAULT_CHUNK_SIZE_BYTES as i64,
        );
        if value < 0 {
            DEFAULT_CHUNK_SIZE_BYTES
        } else {
            (value as u64).clamp(MIN_CHUNK_SIZE_BYTES, MAX_CHUNK_SIZE_BYTES)
        }
    }

    /// Replace the chunk size, clamped to 256 KiB..=64 MiB.
    pub fn set_chunk_size_bytes(&self, value: u64) {
        let value = value.clamp(MIN_CHUNK_SIZE_BYTES, MAX_CHUNK_SIZE_BYTES);
        self.data
            .write()
            .insert("chunk_size_bytes".to_string(), Value::from(value));
    }

    /// Largest accepted upload in bytes, capped at 100 GiB.
    pub fn max_file_size_bytes(&self) -> u64 {
        let data = self.data.read();
        let value = int_from_value(
            data.get("max_file_size_bytes"),
            MAX_FILE_SIZE_LIMIT as i64,
        );
        if value <= 0 {
            MAX_FILE_SIZE_LIMIT
        } else {
            (value as u64).min(MAX_FILE_SIZE_LIMIT)
        }
    }

    /// Replace the upload size limit, capped at 100 GiB.
    pub fn set_max_file_size_bytes(&self, value: u64) {
        let value = if value == 0 {
            MAX_FILE_SIZE_LIMIT
        } else {
            value.min(MAX_FILE_SIZE_LIMIT)
        };
        self.data
            .write()
            .insert("max_file_size_bytes".to_string(), Value::from(value));
    }
}

/// Pull an integer out of whatever JSON type an older config stored it as.
fn int_from_value(value: Option<&Value>, fallback: i64) -> i64 {
    match value {
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_u64().and_then(|v| i64::try_from(v).ok()))
            .or_else(|| value.as_f64().map(|v| v as i64))
            .unwrap_or(fallback),
        None => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_created_when_missing() {
        let home = TempDir::new().unwrap();
        let settings = Settings::for_home(home.path()).unwrap();

        assert_eq!(settings.port(), 8000);
        assert_eq!(settings.parallel_chunks(), 8);
        assert_eq!(settings.chunk_size_bytes(), 4 * 1024 * 1024);
        assert_eq!(settings.max_file_size_bytes(), MAX_FILE_SIZE_LIMIT);
        assert!(settings.config_file().is_file());

        let raw = fs::read_to_string(settings.config_file()).unwrap();
        assert!(raw.ends_with('\n'), "config should end with a newline");
        assert!(raw.contains("    \"port\""), "config should be 4-space indented");
    }

    #[test]
    fn unknown_fields_survive_load_and_save() {
        let home = TempDir::new().unwrap();
        let cfg_dir = home.path().join(".config").join("Mizban");
        fs::create_dir_all(&cfg_dir).unwrap();

        let seed = serde_json::json!({
            "mizban_shared_dir": home.path().join("Desktop").join("LegacyShared"),
            "port": 9001,
            "custom_key": "keep-me",
        });
        fs::write(cfg_dir.join("config.json"), seed.to_string()).unwrap();

        let settings = Settings::for_home(home.path()).unwrap();
        assert_eq!(settings.port(), 9001);
        assert_eq!(
            settings.shared_dir(),
            home.path().join("Desktop").join("LegacyShared")
        );
        assert_eq!(settings.parallel_chunks(), 8, "missing keys use defaults");

        settings.set_port(9100);
        settings.save().unwrap();

        let raw = fs::read(settings.config_file()).unwrap();
        let reloaded: Map<String, Value> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(reloaded.get("custom_key"), Some(&Value::from("keep-me")));
        assert_eq!(reloaded.get("port"), Some(&Value::from(9100)));
    }

    #[test]
    fn malformed_config_keeps_defaults() {
        let home = TempDir::new().unwrap();
        let cfg_dir = home.path().join(".config").join("Mizban");
        fs::create_dir_all(&cfg_dir).unwrap();
        fs::write(cfg_dir.join("config.json"), b"{not json").unwrap();

        let settings = Settings::for_home(home.path()).unwrap();
        assert_eq!(settings.port(), 8000);
    }

    #[test]
    fn accessors_clamp_out_of_range_values() {
        let home = TempDir::new().unwrap();
        let cfg_dir = home.path().join(".config").join("Mizban");
        fs::create_dir_all(&cfg_dir).unwrap();

        let seed = serde_json::json!({
            "port": 700_000,
            "parallel_chunks": 999,
            "chunk_size_bytes": 1,
            "max_file_size_bytes": -4,
        });
        fs::write(cfg_dir.join("config.json"), seed.to_string()).unwrap();

        let settings = Settings::for_home(home.path()).unwrap();
        assert_eq!(settings.port(), 8000);
        assert_eq!(settings.parallel_chunks(), 64);
        assert_eq!(settings.chunk_size_bytes(), MIN_CHUNK_SIZE_BYTES);
        assert_eq!(settings.max_file_size_bytes(), MAX_FILE_SIZE_LIMIT);
    }

    #[test]
    fn setters_clamp_before_storing() {
        let home = TempDir::new().unwrap();
        let settings = Settings::for_home(home.path()).unwrap();

        settings.set_chunk_size_bytes(1);
        assert_eq!(settings.chunk_size_bytes(), MIN_CHUNK_SIZE_BYTES);

        settings.set_chunk_size_bytes(128 * 1024 * 1024);
        assert_eq!(settings.chunk_size_bytes(), MAX_CHUNK_SIZE_BYTES);

        settings.set_parallel_chunks(0);
        assert_eq!(settings.parallel_chunks(), 8);

        settings.set_max_file_size_bytes(0);
        assert_eq!(settings.max_file_size_bytes(), MAX_FILE_SIZE_LIMIT);
    }

    #[test]
    fn port_accepts_float_encoded_numbers() {
        let home = TempDir::new().unwrap();
        let cfg_dir = home.path().join(".config").join("Mizban");
        fs::create_dir_all(&cfg_dir).unwrap();
        fs::write(cfg_dir.join("config.json"), br#"{"port": 9001.0}"#).unwrap();

        let settings = Settings::for_home(home.path()).unwrap();
        assert_eq!(settings.port(), 9001);
    }
}
