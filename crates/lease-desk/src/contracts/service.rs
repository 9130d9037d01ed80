use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::config::ContractSettings;

use super::audit::{AuditRecord, AuditTrailBuilder, SigningContext};
use super::delivery::{
    DeliveryChannel, DeliveryError, MessageOutbox, OutboundMessage, SignatureRequest,
};
use super::document::ContractDocument;
use super::error::{ContractError, TransitionRejection};
use super::lifecycle::{Contract, ContractId, ContractStatus, LifecycleAction, TenantContact};
use super::report::PortfolioReport;
use super::repository::{ContractRecord, ContractRepository, RepositoryError};
use super::signature::{SignatureCapture, SignatureImage};
use super::template::{ContractTemplate, LeaseTerms};
use super::upload::validate_upload;

type LockTable = Mutex<HashMap<ContractId, Arc<AsyncMutex<()>>>>;

static CONTRACT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_contract_id() -> ContractId {
    let id = CONTRACT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ContractId(format!("ctr-{id:06}"))
}

/// Parties and dates that accompany an uploaded contract file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadDetails {
    pub owner_name: String,
    pub property: String,
    #[serde(default)]
    pub tenant: Option<TenantContact>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub value: u32,
}

/// Orchestrates generation, editing, delivery and signing of contracts.
///
/// Every mutating operation holds the contract's own async lock from fetch to
/// update, so two requests against the same contract never interleave. Work
/// happens on a local copy of the record; nothing is persisted on failure.
pub struct ContractService<R, O> {
    repository: Arc<R>,
    outbox: Arc<O>,
    audit: Arc<AuditTrailBuilder>,
    settings: ContractSettings,
    locks: LockTable,
}

impl<R, O> ContractService<R, O>
where
    R: ContractRepository + 'static,
    O: MessageOutbox + 'static,
{
    pub fn new(repository: Arc<R>, outbox: Arc<O>, settings: ContractSettings) -> Self {
        Self::with_audit_builder(
            repository,
            outbox,
            settings,
            Arc::new(AuditTrailBuilder::new()),
        )
    }

    pub fn with_audit_builder(
        repository: Arc<R>,
        outbox: Arc<O>,
        settings: ContractSettings,
        audit: Arc<AuditTrailBuilder>,
    ) -> Self {
        Self {
            repository,
            outbox,
            audit,
            settings,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &ContractSettings {
        &self.settings
    }

    /// Fill the standard lease from wizard input and paginate it.
    pub fn create_from_terms(
        &self,
        terms: LeaseTerms,
    ) -> Result<ContractRecord, ContractServiceError> {
        let text = ContractTemplate::standard_lease().fill(&terms.field_map());
        let document = ContractDocument::from_text(&text, self.settings.max_chars_per_page);

        let mut contract = Contract::draft(
            next_contract_id(),
            terms.property_address.trim(),
            terms.tenant,
            terms.start_date,
            terms.end_date,
            terms.monthly_rent,
        );
        contract.complete_document()?;

        let record = ContractRecord {
            contract,
            owner_name: terms.owner_name.trim().to_string(),
            document,
            attachment: None,
            signature_history: Vec::new(),
            deliveries: Default::default(),
        };
        let stored = self.repository.insert(record)?;
        info!(
            contract = %stored.id(),
            pages = stored.document.page_count(),
            "contract generated from lease terms"
        );
        Ok(stored)
    }

    /// Validate an uploaded PDF or DOCX and store it as a ready-to-send contract.
    pub fn create_from_upload(
        &self,
        file_name: &str,
        declared_mime: &str,
        bytes: Vec<u8>,
        details: UploadDetails,
    ) -> Result<ContractRecord, ContractServiceError> {
        let upload = match validate_upload(
            file_name,
            declared_mime,
            bytes,
            self.settings.max_upload_bytes,
        ) {
            Ok(upload) => upload,
            Err(err) => {
                warn!(file = file_name, error = %err, "contract upload rejected");
                return Err(err.into());
            }
        };

        let mut contract = Contract::draft(
            next_contract_id(),
            details.property.trim(),
            details.tenant,
            details.start_date,
            details.end_date,
            details.value,
        );
        contract.complete_document()?;

        let record = ContractRecord {
            contract,
            owner_name: details.owner_name.trim().to_string(),
            document: ContractDocument::from_pages([upload.summary()]),
            attachment: Some(upload),
            signature_history: Vec::new(),
            deliveries: Default::default(),
        };
        let stored = self.repository.insert(record)?;
        info!(contract = %stored.id(), "contract created from upload");
        Ok(stored)
    }

    pub async fn add_page(&self, id: &ContractId) -> Result<ContractRecord, ContractServiceError> {
        self.edit_document(id, |document| {
            document.add_page();
            Ok(())
        })
        .await
    }

    pub async fn remove_page(
        &self,
        id: &ContractId,
        index: usize,
    ) -> Result<ContractRecord, ContractServiceError> {
        self.edit_document(id, |document| document.remove_page(index).map(|_| ()))
            .await
    }

    pub async fn update_page(
        &self,
        id: &ContractId,
        index: usize,
        content: String,
    ) -> Result<ContractRecord, ContractServiceError> {
        self.edit_document(id, |document| document.update_page_content(index, content))
            .await
    }

    /// Send (or resend) the signature request and hand it to the outbox.
    ///
    /// The send is persisted before the message is queued; a refused message
    /// restores the previous record so the request can be retried.
    pub async fn send(
        &self,
        id: &ContractId,
        channel: DeliveryChannel,
        at: DateTime<Utc>,
    ) -> Result<OutboundMessage, ContractServiceError> {
        let _lock = self.lock_contract(id).await;

        let previous = self.fetch(id)?;
        let mut record = previous.clone();
        let kind = record
            .deliveries
            .record_send(&mut record.contract, channel, at)?;

        let request = SignatureRequest {
            owner_name: record.owner_name.clone(),
            tenant_name: record
                .contract
                .tenant
                .as_ref()
                .map(|tenant| tenant.name.clone())
                .unwrap_or_default(),
            property_address: record.contract.property.clone(),
            signing_link: self.settings.signing_link(&id.0),
        };
        let message = OutboundMessage::for_contract(&record.contract, channel, &request);
        self.repository.update(record)?;
        if let Err(err) = self.outbox.enqueue(message.clone()) {
            warn!(contract = %id, error = %err, "signature request not queued, restoring contract");
            if let Err(restore) = self.repository.update(previous) {
                warn!(contract = %id, error = %restore, "contract could not be restored");
            }
            return Err(err.into());
        }

        info!(contract = %id, channel = channel.label(), ?kind, "signature request queued");
        Ok(message)
    }

    pub async fn mark_viewed(
        &self,
        id: &ContractId,
        at: DateTime<Utc>,
    ) -> Result<ContractRecord, ContractServiceError> {
        let _lock = self.lock_contract(id).await;

        let mut record = self.fetch(id)?;
        record.deliveries.record_view(&mut record.contract, at)?;
        self.repository.update(record.clone())?;
        Ok(record)
    }

    /// Capture a signature: hash the signing content, bind the optional
    /// drawn signature to the last page, and activate the contract.
    pub async fn sign(
        &self,
        id: &ContractId,
        signer_identifier: &str,
        context: SigningContext,
        capture: Option<&SignatureCapture>,
    ) -> Result<AuditRecord, ContractServiceError> {
        let _lock = self.lock_contract(id).await;

        let mut record = self.fetch(id)?;
        let status = record.contract.status();
        if status != ContractStatus::PendingSignature {
            warn!(contract = %id, %status, "signature attempted outside pending signature");
            return Err(ContractError::lifecycle(status, LifecycleAction::CompleteSignature).into());
        }

        let image = match capture {
            Some(capture) => Some(export_off_executor(capture.clone()).await?),
            None => None,
        };
        let audit = self
            .audit
            .spawn_capture(
                signer_identifier.to_string(),
                record.signing_content(),
                context,
            )
            .wait()
            .await?;

        if let Some(image) = image {
            record
                .document
                .bind_signature(image, audit.signer_identifier())?;
        }
        record.contract.complete_signature(audit.clone())?;
        record.signature_history.push(audit.clone());
        self.repository.update(record)?;

        info!(
            contract = %id,
            signer = audit.signer_identifier(),
            hash = audit.document_hash(),
            "contract signed"
        );
        Ok(audit)
    }

    pub fn get(&self, id: &ContractId) -> Result<ContractRecord, ContractServiceError> {
        self.fetch(id)
    }

    pub fn list(&self) -> Result<Vec<ContractRecord>, ContractServiceError> {
        let mut records = self.repository.list()?;
        records.sort_by(|a, b| a.contract.id.cmp(&b.contract.id));
        Ok(records)
    }

    /// Display-status counts and the expiring list as of `today`.
    pub fn portfolio(&self, today: NaiveDate) -> Result<PortfolioReport, ContractServiceError> {
        let records = self.list()?;
        Ok(PortfolioReport::build(
            records.iter().map(|record| &record.contract),
            today,
            self.settings.expiring_window_days,
        ))
    }

    async fn edit_document<F>(
        &self,
        id: &ContractId,
        edit: F,
    ) -> Result<ContractRecord, ContractServiceError>
    where
        F: FnOnce(&mut ContractDocument) -> Result<(), ContractError>,
    {
        let _lock = self.lock_contract(id).await;

        let mut record = self.fetch(id)?;
        if !record.contract.is_editable() {
            return Err(ContractError::from(TransitionRejection::DocumentLocked(
                record.contract.status(),
            ))
            .into());
        }
        edit(&mut record.document)?;
        self.repository.update(record.clone())?;
        Ok(record)
    }

    fn fetch(&self, id: &ContractId) -> Result<ContractRecord, ContractServiceError> {
        let record = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    async fn lock_contract(&self, id: &ContractId) -> ContractLock<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        let guard = lock.lock_owned().await;
        ContractLock {
            locks: &self.locks,
            id: id.clone(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive hold on one contract. The table entry is dropped with the last
/// holder, so ids that never existed do not accumulate.
struct ContractLock<'a> {
    locks: &'a LockTable,
    id: ContractId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ContractLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.id);
        }
    }
}

async fn export_off_executor(
    capture: SignatureCapture,
) -> Result<SignatureImage, ContractError> {
    tokio::task::spawn_blocking(move || capture.export_image())
        .await
        .map_err(|err| ContractError::signature(format!("signature export failed: {err}")))?
}

/// Error raised by the contract service.
#[derive(Debug, thiserror::Error)]
pub enum ContractServiceError {
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}
