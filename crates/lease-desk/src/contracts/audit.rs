//! Tamper-evident audit records produced when a contract is signed.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tracing::debug;

use super::error::ContractError;

const UNKNOWN: &str = "unknown";
const SALT_SEPARATOR: u8 = 0x1f;

/// Source of the signing timestamp. Injected so tests can pin time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Request metadata supplied by the calling context. Untrusted; stored as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningContext {
    #[serde(default)]
    pub signer_ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Immutable evidence of who signed, when, and over which exact content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    signed_at: DateTime<Utc>,
    signer_ip: String,
    user_agent: String,
    signer_identifier: String,
    document_hash: String,
    integrity_verified: bool,
}

impl AuditRecord {
    /// Rehydrate a record read back from storage.
    pub fn restore(
        signed_at: DateTime<Utc>,
        signer_ip: String,
        user_agent: String,
        signer_identifier: String,
        document_hash: String,
        integrity_verified: bool,
    ) -> Self {
        Self {
            signed_at,
            signer_ip,
            user_agent,
            signer_identifier,
            document_hash,
            integrity_verified,
        }
    }

    pub fn signed_at(&self) -> DateTime<Utc> {
        self.signed_at
    }

    pub fn signer_ip(&self) -> &str {
        &self.signer_ip
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn signer_identifier(&self) -> &str {
        &self.signer_identifier
    }

    pub fn document_hash(&self) -> &str {
        &self.document_hash
    }

    pub fn integrity_verified(&self) -> bool {
        self.integrity_verified
    }

    /// Recompute the digest for `content` and compare it to the stored hash.
    pub fn matches(&self, content: &[u8]) -> bool {
        document_digest(content, self.signed_at) == self.document_hash
    }
}

/// Builds audit records; one builder per process keeps `signed_at` strictly
/// increasing so identical content never hashes the same twice.
pub struct AuditTrailBuilder {
    clock: Clock,
    last_issued: Mutex<Option<DateTime<Utc>>>,
}

impl Default for AuditTrailBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuditTrailBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrailBuilder")
            .field("last_issued", &self.last_issued)
            .finish_non_exhaustive()
    }
}

impl AuditTrailBuilder {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            last_issued: Mutex::new(None),
        }
    }

    /// Hash `content` off the async executor and assemble the audit record.
    pub async fn capture_signature(
        &self,
        signer_identifier: &str,
        content: impl Into<Vec<u8>>,
        context: SigningContext,
    ) -> Result<AuditRecord, ContractError> {
        let signer_identifier = signer_identifier.trim();
        if signer_identifier.is_empty() {
            return Err(ContractError::signature("signer identifier is required"));
        }

        let content = content.into();
        let signed_at = self.next_timestamp();
        let document_hash =
            tokio::task::spawn_blocking(move || document_digest(&content, signed_at))
                .await
                .map_err(|err| ContractError::signature(format!("digest task failed: {err}")))?;

        debug!(signer = signer_identifier, %signed_at, "audit digest computed");

        Ok(AuditRecord {
            signed_at,
            signer_ip: metadata_or_unknown(context.signer_ip),
            user_agent: metadata_or_unknown(context.user_agent),
            signer_identifier: signer_identifier.to_string(),
            document_hash,
            integrity_verified: true,
        })
    }

    /// Run [`capture_signature`](Self::capture_signature) as a cancellable task.
    pub fn spawn_capture(
        self: &Arc<Self>,
        signer_identifier: String,
        content: Vec<u8>,
        context: SigningContext,
    ) -> SignatureTask {
        let builder = Arc::clone(self);
        let handle = tokio::spawn(async move {
            builder
                .capture_signature(&signer_identifier, content, context)
                .await
        });
        SignatureTask { handle }
    }

    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = (self.clock)();
        let mut last = self
            .last_issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let issued = match *last {
            Some(previous) if now <= previous => previous + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(issued);
        issued
    }
}

/// Handle to an in-flight signature capture.
#[derive(Debug)]
pub struct SignatureTask {
    handle: JoinHandle<Result<AuditRecord, ContractError>>,
}

impl SignatureTask {
    /// Abandon the capture; [`wait`](Self::wait) then reports a failure.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn wait(self) -> Result<AuditRecord, ContractError> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(ContractError::signature("signing cancelled")),
            Err(err) => Err(ContractError::signature(format!(
                "signing task failed: {err}"
            ))),
        }
    }
}

fn metadata_or_unknown(value: Option<String>) -> String {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn document_digest(content: &[u8], signed_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hasher.update([SALT_SEPARATOR]);
    hasher.update(
        signed_at
            .to_rfc3339_opts(SecondsFormat::Nanos, true)
            .as_bytes(),
    );
    to_hex(&hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[(byte >> 4) as usize] as char);
        output.push(HEX[(byte & 0x0f) as usize] as char);
    }
    output
}
