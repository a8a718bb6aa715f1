use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use notary_engine::EngineConfig;

use crate::error::{ServerError, ServerResult};

/// Full service configuration: `[server]` plus the engine sections.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    #[serde(flatten)]
    pub engine: EngineConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8740)),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

/// `[artifacts]` section: where issued artifact bytes are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactsConfig {
    /// Directory holding one file per artifact id. Without it, stored-byte
    /// issuance and re-checks are unavailable.
    pub root: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn parse(toml_str: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| ServerError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ServerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.server.max_upload_bytes == 0 {
            return Err(ServerError::Config(
                "server.max_upload_bytes must be greater than 0".into(),
            ));
        }
        if let Some(root) = &self.artifacts.root {
            if !root.is_dir() {
                return Err(ServerError::Config(format!(
                    "artifacts.root {} is not a directory",
                    root.display()
                )));
            }
        }
        self.engine.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notary_ledger::LedgerBackend;

    #[test]
    fn default_config() {
        let c = ServiceConfig::default();
        assert_eq!(c.server.bind_addr, "127.0.0.1:8740".parse::<SocketAddr>().unwrap());
        assert_eq!(c.server.max_upload_bytes, 26_214_400);
        assert!(c.engine.scheduler.enabled);
        assert_eq!(c.engine.ledger.backend, LedgerBackend::Memory);
        assert!(c.artifacts.root.is_none());
    }

    #[test]
    fn artifacts_root_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ok = ServiceConfig::parse(&format!(
            "[artifacts]\nroot = {:?}\n",
            dir.path().display().to_string()
        ))
        .unwrap();
        assert_eq!(ok.artifacts.root.as_deref(), Some(dir.path()));

        let missing = ServiceConfig::parse("[artifacts]\nroot = \"/nonexistent/notary-artifacts\"\n");
        assert!(matches!(missing, Err(ServerError::Config(_))));
    }

    #[test]
    fn parse_all_sections() {
        let c = ServiceConfig::parse(
            r#"
[server]
bind_addr = "0.0.0.0:9000"
max_upload_bytes = 1024

[scheduler]
enabled = false
batch_size = 20

[verification]
max_concurrency = 2

[ledger]
backend = "rpc"
rpc_url = "http://127.0.0.1:8545"
"#,
        )
        .unwrap();
        assert_eq!(c.server.bind_addr.port(), 9000);
        assert_eq!(c.server.max_upload_bytes, 1024);
        assert!(!c.engine.scheduler.enabled);
        assert_eq!(c.engine.scheduler.batch_size, 20);
        assert_eq!(c.engine.scheduler.interval_secs, 60);
        assert_eq!(c.engine.verification.max_concurrency, 2);
        assert_eq!(c.engine.ledger.backend, LedgerBackend::Rpc);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(ServiceConfig::parse("").unwrap(), ServiceConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ServiceConfig::parse("[server]\nmax_upload_bytes = 0\n").is_err());
        assert!(ServiceConfig::parse("[scheduler]\nbatch_size = 0\n").is_err());
        assert!(ServiceConfig::parse("[server]\nport = 1\n").is_err());
        assert!(ServiceConfig::parse("[ledger]\nbackend = \"rpc\"\n").is_err());
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = ServiceConfig::load(Path::new("/nonexistent/notary.toml")).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
