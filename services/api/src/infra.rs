use chrono::NaiveDate;
use lease_desk::contracts::{
    ContractId, ContractRecord, ContractRepository, DeliveryError, MessageOutbox,
    OutboundMessage, RepositoryError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryContractRepository {
    records: Arc<Mutex<HashMap<ContractId, ContractRecord>>>,
}

impl ContractRepository for InMemoryContractRepository {
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
        if guard.contains_key(record.id()) {
            guard.insert(record.id().clone(), record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
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

/// Holds formatted signature requests until a WhatsApp or e-mail sender picks them up.
#[derive(Default, Clone)]
pub(crate) struct InMemoryOutbox {
    messages: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl MessageOutbox for InMemoryOutbox {
    fn enqueue(&self, message: OutboundMessage) -> Result<(), DeliveryError> {
        info!(
            contract = %message.contract_id,
            channel = message.channel.label(),
            has_recipient = message.recipient.is_some(),
            "signature request queued for delivery"
        );
        let mut guard = self.messages.lock().expect("outbox mutex poisoned");
        guard.push(message);
        Ok(())
    }
}

impl InMemoryOutbox {
    pub(crate) fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().expect("outbox mutex poisoned").clone()
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
