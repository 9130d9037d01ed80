use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::config::ContractSettings;
use crate::contracts::audit::AuditTrailBuilder;
use crate::contracts::delivery::{DeliveryError, MessageOutbox, OutboundMessage};
use crate::contracts::lifecycle::{ContractId, TenantContact};
use crate::contracts::repository::{ContractRecord, ContractRepository, RepositoryError};
use crate::contracts::service::ContractService;
use crate::contracts::template::LeaseTerms;

pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub(super) fn instant(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn settings() -> ContractSettings {
    ContractSettings {
        signing_base_url: "https://sign.example.com".to_string(),
        ..ContractSettings::default()
    }
}

pub(super) fn lease_terms() -> LeaseTerms {
    LeaseTerms {
        owner_name: "Carla Mendes".to_string(),
        tenant: Some(TenantContact {
            name: "Ana Souza".to_string(),
            phone: Some("+5511999990000".to_string()),
            email: Some("ana@example.com".to_string()),
        }),
        property_address: "12 Harbor Lane, Apt 3".to_string(),
        start_date: date(2026, 1, 1),
        end_date: date(2026, 12, 31),
        monthly_rent: 1450,
        deposit: Some(2900),
        payment_day: Some(5),
        city: Some("Lisbon".to_string()),
        extra_clauses: vec!["No smoking indoors.".to_string()],
    }
}

pub(super) type TestService = ContractService<MemoryRepository, MemoryOutbox>;

pub(super) fn build_service() -> (TestService, Arc<MemoryRepository>, Arc<MemoryOutbox>) {
    let repository = Arc::new(MemoryRepository::default());
    let outbox = Arc::new(MemoryOutbox::default());
    let service = ContractService::with_audit_builder(
        repository.clone(),
        outbox.clone(),
        settings(),
        Arc::new(AuditTrailBuilder::with_clock(Arc::new(|| instant(12)))),
    );
    (service, repository, outbox)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<ContractId, ContractRecord>>>,
}

impl MemoryRepository {
    pub(super) fn stored(&self, id: &ContractId) -> ContractRecord {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(id)
            .cloned()
            .expect("record present")
    }
}

impl ContractRepository for MemoryRepository {
    fn insert(&self, record: ContractRecord) -> Result<ContractRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(record.id()) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id().clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ContractRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if !guard.contains_key(record.id()) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(record.id().clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<ContractRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

/// Reads succeed but every write is refused.
#[derive(Default)]
pub(super) struct ReadOnlyRepository {
    pub(super) inner: MemoryRepository,
}

impl ContractRepository for ReadOnlyRepository {
    fn insert(&self, record: ContractRecord) -> Result<ContractRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn update(&self, _record: ContractRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("read-only replica".to_string()))
    }

    fn fetch(&self, id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn list(&self) -> Result<Vec<ContractRecord>, RepositoryError> {
        self.inner.list()
    }
}

pub(super) struct UnavailableRepository;

impl ContractRepository for UnavailableRepository {
    fn insert(&self, _record: ContractRecord) -> Result<ContractRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance".to_string()))
    }

    fn update(&self, _record: ContractRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance".to_string()))
    }

    fn fetch(&self, _id: &ContractId) -> Result<Option<ContractRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance".to_string()))
    }

    fn list(&self) -> Result<Vec<ContractRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("maintenance".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryOutbox {
    messages: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl MemoryOutbox {
    pub(super) fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().expect("outbox mutex poisoned").clone()
    }
}

impl MessageOutbox for MemoryOutbox {
    fn enqueue(&self, message: OutboundMessage) -> Result<(), DeliveryError> {
        self.messages
            .lock()
            .expect("outbox mutex poisoned")
            .push(message);
        Ok(())
    }
}

pub(super) struct OfflineOutbox;

impl MessageOutbox for OfflineOutbox {
    fn enqueue(&self, _message: OutboundMessage) -> Result<(), DeliveryError> {
        Err(DeliveryError::Transport("gateway offline".to_string()))
    }
}
