use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use notary_crypto::IssuerKey;

use crate::error::{LedgerError, LedgerResult};
use crate::guard::GuardedLedger;
use crate::memory::InMemoryLedger;
use crate::rpc::RpcLedgerClient;
use crate::traits::CommitmentLedger;

/// Which ledger implementation [`connect`] builds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    #[default]
    Memory,
    Rpc,
}

/// `[ledger]` configuration section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    /// Gateway URL. Required for the `rpc` backend.
    pub rpc_url: Option<String>,
    /// Environment variable holding the issuer's hex-encoded Ed25519 seed.
    pub issuer_key_env: String,
    /// Upper bound for every ledger call.
    pub timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::Memory,
            rpc_url: None,
            issuer_key_env: "NOTARY_ISSUER_KEY".to_string(),
            timeout_ms: 15_000,
        }
    }
}

impl LedgerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.timeout_ms == 0 {
            return Err(LedgerError::Config(
                "ledger.timeout_ms must be greater than 0".into(),
            ));
        }
        if self.backend == LedgerBackend::Rpc {
            match self.rpc_url.as_deref() {
                None | Some("") => {
                    return Err(LedgerError::Config(
                        "ledger.rpc_url is required for the rpc backend".into(),
                    ))
                }
                Some(_) => {}
            }
            if self.issuer_key_env.is_empty() {
                return Err(LedgerError::Config(
                    "ledger.issuer_key_env must not be empty".into(),
                ));
            }
        }
        Ok(())
    }

    /// Read and parse the issuer signing key from the configured variable.
    pub fn resolve_issuer_key(&self) -> LedgerResult<IssuerKey> {
        let env_name = &self.issuer_key_env;
        let secret = std::env::var(env_name).map_err(|e| {
            LedgerError::Config(format!("cannot read issuer key from env var {env_name}: {e}"))
        })?;
        IssuerKey::from_hex(&secret)
            .map_err(|e| LedgerError::Config(format!("issuer key in {env_name} is invalid: {e}")))
    }
}

/// Build the configured ledger, wrapped in a [`GuardedLedger`].
pub fn connect(config: &LedgerConfig) -> LedgerResult<Arc<dyn CommitmentLedger>> {
    config.validate()?;
    let backend: Arc<dyn CommitmentLedger> = match config.backend {
        LedgerBackend::Memory => Arc::new(InMemoryLedger::new()),
        LedgerBackend::Rpc => {
            let url = config.rpc_url.as_deref().unwrap_or_default();
            let key = config.resolve_issuer_key()?;
            Arc::new(RpcLedgerClient::new(url, key, config.timeout())?)
        }
    };
    info!(
        backend = backend.name(),
        timeout_ms = config.timeout_ms,
        "ledger client ready"
    );
    Ok(Arc::new(GuardedLedger::new(backend, config.timeout())))
}
