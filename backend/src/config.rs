use anyhow::Result;
use serde::Deserialize;

use crate::chaos::{PumbaSettings, DEFAULT_DOCKER_SOCKET, DEFAULT_PUMBA_IMAGE};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Path to a kubeconfig file; in-cluster or default config when unset
    #[serde(default)]
    pub kubeconfig: Option<String>,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_chaos_image")]
    pub chaos_image: String,

    #[serde(default = "default_docker_socket")]
    pub docker_socket: String,

    /// Upper bound for tearing down live suites on shutdown
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_port() -> u16 {
    8181
}

fn default_database_url() -> String {
    "sqlite://resilia.db".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_chaos_image() -> String {
    DEFAULT_PUMBA_IMAGE.to_string()
}

fn default_docker_socket() -> String {
    DEFAULT_DOCKER_SOCKET.to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        let settings: Config = config.try_deserialize()?;
        Ok(settings)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    pub fn pumba_settings(&self) -> PumbaSettings {
        PumbaSettings {
            image: self.chaos_image.clone(),
            socket_path: self.docker_socket.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            database_url: default_database_url(),
            kubeconfig: None,
            namespace: default_namespace(),
            chaos_image: default_chaos_image(),
            docker_socket: default_docker_socket(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            log_format: default_log_format(),
        }
    }
}
