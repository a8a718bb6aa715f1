use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use notary_crypto::{IssuerKey, Signature};
use notary_types::{BatchId, Fingerprint, NodeHash, TxRef};

use crate::error::{LedgerError, LedgerResult};
use crate::traits::{CommitmentLedger, PublishReceipt, RevocationReceipt};

/// JSON-RPC error code the gateway uses for an already-revoked fingerprint.
pub const ALREADY_REVOKED: i64 = -32010;
/// JSON-RPC error code the gateway uses for an unknown batch id.
pub const NOT_FOUND: i64 = -32004;

const CONFIRMED: &str = "confirmed";

/// JSON-RPC 2.0 client for a commitment ledger gateway.
///
/// Write calls carry the issuer's public key and an Ed25519 signature over
/// the domain-separated payload, so the gateway can attribute them.
///
/// Failures are classified by how far the request got:
/// - connection refused or DNS failure: `Unavailable`
/// - timeout: `Timeout`
/// - anything after the request was sent (broken body, unparseable reply,
///   receipt not `confirmed`): `Unconfirmed` for writes
/// - a JSON-RPC error object: `Rejected`, `NotFound` or `AlreadyRevoked`
pub struct RpcLedgerClient {
    client: reqwest::Client,
    url: reqwest::Url,
    key: IssuerKey,
    issuer: String,
    timeout: Duration,
    next_id: AtomicU64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CallKind {
    Read,
    Write,
}

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    #[serde(default = "Option::default")]
    result: Option<R>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Serialize)]
struct SignedRootParams<'a> {
    root: NodeHash,
    issuer: &'a str,
    signature: Signature,
}

#[derive(Serialize)]
struct SignedRevokeParams<'a> {
    fingerprint: Fingerprint,
    issuer: &'a str,
    signature: Signature,
}

#[derive(Serialize)]
struct BatchParams<'a> {
    batch_id: &'a BatchId,
}

#[derive(Serialize)]
struct FingerprintParams {
    fingerprint: Fingerprint,
}

#[derive(Deserialize)]
struct PublishResult {
    batch_id: BatchId,
    tx_ref: TxRef,
    status: String,
}

#[derive(Deserialize)]
struct RevokeResult {
    tx_ref: TxRef,
    status: String,
}

#[derive(Deserialize)]
struct RootResult {
    root: Option<NodeHash>,
}

#[derive(Deserialize)]
struct RevokedResult {
    revoked: bool,
}

impl RpcLedgerClient {
    /// Build a client for the gateway at `url`. Every HTTP exchange is
    /// bounded by `timeout`.
    pub fn new(url: &str, key: IssuerKey, timeout: Duration) -> LedgerResult<Self> {
        let url: reqwest::Url = url
            .parse()
            .map_err(|e| LedgerError::Config(format!("invalid rpc_url {url:?}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Config(format!("cannot build HTTP client: {e}")))?;
        let issuer = key.public_key().to_hex();
        Ok(Self {
            client,
            url,
            key,
            issuer,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Hex-encoded issuer public key sent with every write.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn call<P, R>(
        &self,
        op: &'static str,
        method: &'static str,
        kind: CallKind,
        params: P,
    ) -> LedgerResult<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        debug!(method, id, "ledger rpc call");

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(op, kind, e))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Rejected {
                code: i64::from(status.as_u16()),
                message: format!("{op}: gateway returned {status}: {body}"),
            });
        }
        if !status.is_success() {
            return Err(after_send(op, kind, format!("gateway returned {status}")));
        }

        let envelope: RpcResponse<R> = response
            .json()
            .await
            .map_err(|e| self.transport_error(op, kind, e))?;

        if let Some(err) = envelope.error {
            return Err(match err.code {
                NOT_FOUND => LedgerError::NotFound(err.message),
                code => LedgerError::Rejected {
                    code,
                    message: err.message,
                },
            });
        }
        envelope
            .result
            .ok_or_else(|| after_send(op, kind, "response carried no result".into()))
    }

    fn transport_error(&self, op: &'static str, kind: CallKind, err: reqwest::Error) -> LedgerError {
        if err.is_connect() {
            LedgerError::Unavailable(format!("{op}: {err}"))
        } else if err.is_timeout() {
            LedgerError::Timeout {
                op,
                after_ms: self.timeout.as_millis() as u64,
            }
        } else if err.is_decode() && kind == CallKind::Read {
            LedgerError::Serialization(format!("{op}: {err}"))
        } else {
            after_send(op, kind, err.to_string())
        }
    }
}

/// Failure after the request left this process.
fn after_send(op: &'static str, kind: CallKind, detail: String) -> LedgerError {
    match kind {
        CallKind::Write => LedgerError::Unconfirmed(format!("{op}: {detail}")),
        CallKind::Read => LedgerError::Unavailable(format!("{op}: {detail}")),
    }
}

#[async_trait]
impl CommitmentLedger for RpcLedgerClient {
    fn name(&self) -> &'static str {
        "rpc"
    }

    async fn publish(&self, root: NodeHash) -> LedgerResult<PublishReceipt> {
        let params = SignedRootParams {
            root,
            issuer: &self.issuer,
            signature: self.key.sign_publish(&root),
        };
        let result: PublishResult = self
            .call("publish", "notary_publishRoot", CallKind::Write, params)
            .await?;
        if result.status != CONFIRMED {
            warn!(batch_id = %result.batch_id, status = %result.status, "publish receipt not confirmed");
            return Err(LedgerError::Unconfirmed(format!(
                "publish: receipt for batch {} has status {:?}",
                result.batch_id, result.status
            )));
        }
        Ok(PublishReceipt {
            batch_id: result.batch_id,
            tx_ref: result.tx_ref,
        })
    }

    async fn get_root(&self, batch_id: &BatchId) -> LedgerResult<Option<NodeHash>> {
        let result: LedgerResult<RootResult> = self
            .call("get_root", "notary_getRoot", CallKind::Read, BatchParams { batch_id })
            .await;
        match result {
            Ok(r) => Ok(r.root),
            Err(LedgerError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn revoke(&self, fingerprint: Fingerprint) -> LedgerResult<RevocationReceipt> {
        let params = SignedRevokeParams {
            fingerprint,
            issuer: &self.issuer,
            signature: self.key.sign_revoke(&fingerprint),
        };
        let result: RevokeResult = self
            .call("revoke", "notary_revoke", CallKind::Write, params)
            .await
            .map_err(|e| match e {
                LedgerError::Rejected {
                    code: ALREADY_REVOKED,
                    ..
                } => LedgerError::AlreadyRevoked(fingerprint),
                e => e,
            })?;
        if result.status != CONFIRMED {
            return Err(LedgerError::Unconfirmed(format!(
                "revoke: receipt {} has status {:?}",
                result.tx_ref, result.status
            )));
        }
        Ok(RevocationReceipt {
            tx_ref: result.tx_ref,
        })
    }

    async fn is_revoked(&self, fingerprint: Fingerprint) -> LedgerResult<bool> {
        let result: RevokedResult = self
            .call(
                "is_revoked",
                "notary_isRevoked",
                CallKind::Read,
                FingerprintParams { fingerprint },
            )
            .await?;
        Ok(result.revoked)
    }
}

impl std::fmt::Debug for RpcLedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedgerClient")
            .field("url", &self.url.as_str())
            .field("issuer", &self.issuer)
            .finish()
    }
}
