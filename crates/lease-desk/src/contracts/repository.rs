use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::audit::AuditRecord;
use super::delivery::DeliveryTracker;
use super::document::ContractDocument;
use super::lifecycle::{Contract, ContractId};
use super::upload::UploadedContract;

/// Persisted shape: the contract, its document, and the signing history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub contract: Contract,
    pub owner_name: String,
    pub document: ContractDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<UploadedContract>,
    #[serde(default)]
    pub signature_history: Vec<AuditRecord>,
    #[serde(default)]
    pub deliveries: DeliveryTracker,
}

impl ContractRecord {
    pub fn id(&self) -> &ContractId {
        &self.contract.id
    }

    /// Bytes presented to the signer: the uploaded file when there is one,
    /// otherwise the assembled document text.
    pub fn signing_content(&self) -> Vec<u8> {
        match &self.attachment {
            Some(upload) => upload.bytes.clone(),
            None => self.document.full_text().into_bytes(),
        }
    }

    pub fn view(&self, today: NaiveDate, window_days: i64) -> ContractView {
        let contract = &self.contract;
        ContractView {
            id: contract.id.clone(),
            property: contract.property.clone(),
            tenant_name: contract.tenant.as_ref().map(|tenant| tenant.name.clone()),
            owner_name: self.owner_name.clone(),
            start_date: contract.start_date,
            end_date: contract.end_date,
            value: contract.value,
            status: contract.status().label(),
            display_status: contract
                .display_status_with_window(today, window_days)
                .label(),
            days_remaining: contract.days_remaining(today),
            page_count: self.document.page_count(),
            uploaded_file: self
                .attachment
                .as_ref()
                .map(|upload| upload.file_name.clone()),
            sent_date: contract.sent_date().map(|at| at.to_rfc3339()),
            viewed_by_tenant: contract.viewed_by_tenant(),
            audit_trail: contract.audit_trail().map(AuditRecordView::from),
            signature_count: self.signature_history.len(),
        }
    }
}

/// Storage abstraction; the persistence technology lives outside this crate.
pub trait ContractRepository: Send + Sync {
    fn insert(&self, record: ContractRecord) -> Result<ContractRecord, RepositoryError>;
    fn update(&self, record: ContractRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError>;
    fn list(&self) -> Result<Vec<ContractRecord>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Public representation of a contract for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ContractView {
    pub id: ContractId,
    pub property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
    pub owner_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub value: u32,
    pub status: &'static str,
    pub display_status: &'static str,
    pub days_remaining: i64,
    pub page_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_date: Option<String>,
    pub viewed_by_tenant: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_trail: Option<AuditRecordView>,
    pub signature_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecordView {
    pub signed_at: String,
    pub signer_ip: String,
    pub user_agent: String,
    pub signer_identifier: String,
    pub document_hash: String,
    pub integrity_verified: bool,
}

impl From<&AuditRecord> for AuditRecordView {
    fn from(record: &AuditRecord) -> Self {
        Self {
            signed_at: record.signed_at().to_rfc3339(),
            signer_ip: record.signer_ip().to_string(),
            user_agent: record.user_agent().to_string(),
            signer_identifier: record.signer_identifier().to_string(),
            document_hash: record.document_hash().to_string(),
            integrity_verified: record.integrity_verified(),
        }
    }
}
