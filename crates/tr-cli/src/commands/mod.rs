pub mod config;
pub mod db;
pub mod server;

use anyhow::Context;
use serde::Deserialize;

use tr_engine::EngineConfig;

#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    pub bind_host: String,
    pub rest_port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".into(),
            rest_port: 8350,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub engine: EngineConfig,
    pub server: ServerRuntimeConfig,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    server: Option<FileServerConfig>,
    storage: Option<FileStorageConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FileServerConfig {
    bind_host: Option<String>,
    rest_port: Option<u16>,
    cors_allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct FileStorageConfig {
    data_dir: Option<String>,
}

/// Resolve configuration: defaults, then the TOML file, then TRELLIS_* env
/// overrides, strongest last.
pub fn load_runtime_config(config_path: &str) -> anyhow::Result<RuntimeConfig> {
    let path = shellexpand(config_path);

    let mut engine = EngineConfig::default();
    let mut server = ServerRuntimeConfig::default();

    if std::path::Path::new(&path).exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {path}"))?;
        let file_config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse TOML config {path}"))?;

        if let Some(storage) = file_config.storage {
            if let Some(data_dir) = storage.data_dir {
                engine.data_dir = shellexpand(&data_dir);
            }
        }

        if let Some(file_server) = file_config.server {
            if let Some(bind_host) = file_server.bind_host {
                server.bind_host = bind_host;
            }
            if let Some(rest_port) = file_server.rest_port {
                server.rest_port = rest_port;
            }
            if let Some(origins) = file_server.cors_allowed_origins {
                server.cors_allowed_origins = origins;
            }
        }
    }

    apply_env_overrides(&mut engine, &mut server);

    Ok(RuntimeConfig { engine, server })
}

fn apply_env_overrides(engine: &mut EngineConfig, server: &mut ServerRuntimeConfig) {
    if let Ok(value) = std::env::var("TRELLIS_DATA_DIR") {
        if !value.is_empty() {
            engine.data_dir = shellexpand(&value);
        }
    }

    if let Ok(value) = std::env::var("TRELLIS_BIND_HOST") {
        if !value.is_empty() {
            server.bind_host = value;
        }
    }

    if let Some(port) = parse_env::<u16>("TRELLIS_REST_PORT") {
        server.rest_port = port;
    }

    if let Ok(value) = std::env::var("TRELLIS_CORS_ALLOWED_ORIGINS") {
        if !value.trim().is_empty() {
            server.cors_allowed_origins = value
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

pub fn shellexpand(s: &str) -> String {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/{rest}");
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shellexpand_replaces_home_prefix() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(
            shellexpand("~/.trellis/config.toml"),
            "/home/tester/.trellis/config.toml"
        );
        assert_eq!(shellexpand("/abs/path"), "/abs/path");
    }

    #[test]
    fn file_config_parses_partial_toml() {
        let parsed: FileConfig = toml::from_str(
            r#"
            [server]
            rest_port = 9000

            [storage]
            data_dir = "/tmp/trellis"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.server.unwrap().rest_port, Some(9000));
        assert_eq!(parsed.storage.unwrap().data_dir.as_deref(), Some("/tmp/trellis"));
    }
}
