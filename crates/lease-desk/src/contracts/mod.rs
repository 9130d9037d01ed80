//! Contract lifecycle and e-signature pipeline.
//!
//! Wizard input or an uploaded file becomes a paginated document, is sent to
//! the tenant, and is signed with a tamper-evident audit record. Storage and
//! message transport stay behind the [`ContractRepository`] and
//! [`MessageOutbox`] traits.

pub mod audit;
pub mod delivery;
pub mod document;
pub mod error;
pub mod lifecycle;
pub mod paginate;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod signature;
pub mod template;
pub mod upload;

#[cfg(test)]
mod tests;

pub use audit::{AuditRecord, AuditTrailBuilder, SignatureTask, SigningContext};
pub use delivery::{
    DeliveryChannel, DeliveryError, DeliveryEvent, DeliveryEventKind, DeliveryTracker,
    MessageOutbox, OutboundMessage, SignatureRequest,
};
pub use document::{ContractDocument, Page, PageId, SignatureOverlay};
pub use error::{ContractError, TransitionRejection};
pub use lifecycle::{
    Contract, ContractId, ContractStatus, DisplayStatus, LifecycleAction, TenantContact,
};
pub use paginate::paginate;
pub use report::{PortfolioEntry, PortfolioReport, StatusCount};
pub use repository::{
    AuditRecordView, ContractRecord, ContractRepository, ContractView, RepositoryError,
};
pub use router::contract_router;
pub use service::{ContractService, ContractServiceError, UploadDetails};
pub use signature::{SignatureCapture, SignatureImage, StrokePoint};
pub use template::{fill_template, ContractTemplate, FieldMap, LeaseTerms};
pub use upload::{validate_upload, ContractFileKind, UploadViolation, UploadedContract};
