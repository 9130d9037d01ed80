use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::audit::AuditRecord;
use super::error::ContractError;

/// Days before `end_date` during which an active contract reads as expiring.
pub const EXPIRING_WINDOW_DAYS: i64 = 30;

/// Identifier wrapper for contracts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractId(pub String);

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the landlord reaches the tenant; enough to address a signature request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContact {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Persisted lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    Draft,
    PendingSend,
    PendingSignature,
    Active,
}

impl ContractStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::PendingSend => "pending_send",
            ContractStatus::PendingSignature => "pending_signature",
            ContractStatus::Active => "active",
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the UI shows: the stored status, or a date-derived overlay on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayStatus {
    Draft,
    PendingSend,
    PendingSignature,
    Active,
    Expiring,
    Expired,
}

impl DisplayStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DisplayStatus::Draft => "draft",
            DisplayStatus::PendingSend => "pending_send",
            DisplayStatus::PendingSignature => "pending_signature",
            DisplayStatus::Active => "active",
            DisplayStatus::Expiring => "expiring",
            DisplayStatus::Expired => "expired",
        }
    }
}

impl From<ContractStatus> for DisplayStatus {
    fn from(status: ContractStatus) -> Self {
        match status {
            ContractStatus::Draft => DisplayStatus::Draft,
            ContractStatus::PendingSend => DisplayStatus::PendingSend,
            ContractStatus::PendingSignature => DisplayStatus::PendingSignature,
            ContractStatus::Active => DisplayStatus::Active,
        }
    }
}

/// Operations the state machine guards; used in rejection messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    CompleteDocument,
    Send,
    Resend,
    MarkViewed,
    CompleteSignature,
    EditDocument,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LifecycleAction::CompleteDocument => "complete the document of",
            LifecycleAction::Send => "send",
            LifecycleAction::Resend => "resend",
            LifecycleAction::MarkViewed => "mark as viewed",
            LifecycleAction::CompleteSignature => "complete the signature of",
            LifecycleAction::EditDocument => "edit the document of",
        };
        f.write_str(label)
    }
}

/// A lease between a landlord and tenant, plus its signing lifecycle.
///
/// Lifecycle fields are private: every change goes through a transition method
/// so that `Active` always carries a verified audit record and a viewed
/// contract always has a `sent_date`. Deserialization checks the same rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredContract")]
pub struct Contract {
    pub id: ContractId,
    pub property: String,
    pub tenant: Option<TenantContact>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub value: u32,
    status: ContractStatus,
    sent_date: Option<DateTime<Utc>>,
    viewed_by_tenant: bool,
    audit_trail: Option<AuditRecord>,
}

impl Contract {
    pub fn draft(
        id: ContractId,
        property: impl Into<String>,
        tenant: Option<TenantContact>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        value: u32,
    ) -> Self {
        Self {
            id,
            property: property.into(),
            tenant,
            start_date,
            end_date,
            value,
            status: ContractStatus::Draft,
            sent_date: None,
            viewed_by_tenant: false,
            audit_trail: None,
        }
    }

    pub fn status(&self) -> ContractStatus {
        self.status
    }

    pub fn sent_date(&self) -> Option<DateTime<Utc>> {
        self.sent_date
    }

    pub fn viewed_by_tenant(&self) -> bool {
        self.viewed_by_tenant
    }

    pub fn audit_trail(&self) -> Option<&AuditRecord> {
        self.audit_trail.as_ref()
    }

    /// Draft -> PendingSend once the wizard or upload has produced a document.
    pub fn complete_document(&mut self) -> Result<(), ContractError> {
        self.require(ContractStatus::Draft, LifecycleAction::CompleteDocument)?;
        self.status = ContractStatus::PendingSend;
        Ok(())
    }

    /// PendingSend -> PendingSignature, stamping `sent_date`.
    pub fn send(&mut self, at: DateTime<Utc>) -> Result<(), ContractError> {
        self.require(ContractStatus::PendingSend, LifecycleAction::Send)?;
        self.advance_sent_date(at);
        self.status = ContractStatus::PendingSignature;
        Ok(())
    }

    /// Re-deliver a pending request; `sent_date` only ever moves forward.
    pub fn resend(&mut self, at: DateTime<Utc>) -> Result<(), ContractError> {
        self.require(ContractStatus::PendingSignature, LifecycleAction::Resend)?;
        self.advance_sent_date(at);
        Ok(())
    }

    /// Record that the tenant opened the signing link. Irreversible.
    pub fn mark_viewed(&mut self) -> Result<(), ContractError> {
        self.require(ContractStatus::PendingSignature, LifecycleAction::MarkViewed)?;
        self.viewed_by_tenant = true;
        Ok(())
    }

    /// PendingSignature -> Active, storing the audit record evidencing the signature.
    pub fn complete_signature(&mut self, record: AuditRecord) -> Result<(), ContractError> {
        self.require(
            ContractStatus::PendingSignature,
            LifecycleAction::CompleteSignature,
        )?;
        if !record.integrity_verified() {
            return Err(ContractError::signature(
                "audit record failed integrity verification",
            ));
        }
        self.audit_trail = Some(record);
        self.status = ContractStatus::Active;
        Ok(())
    }

    /// Whether structural document edits are still allowed.
    pub fn is_editable(&self) -> bool {
        matches!(
            self.status,
            ContractStatus::Draft | ContractStatus::PendingSend
        )
    }

    pub fn display_status(&self, today: NaiveDate) -> DisplayStatus {
        display_status(self.status, self.end_date, today, EXPIRING_WINDOW_DAYS)
    }

    pub fn display_status_with_window(&self, today: NaiveDate, window_days: i64) -> DisplayStatus {
        display_status(self.status, self.end_date, today, window_days)
    }

    /// Days from `today` until `end_date`; negative once the lease has ended.
    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        (self.end_date - today).num_days()
    }

    fn require(
        &self,
        expected: ContractStatus,
        action: LifecycleAction,
    ) -> Result<(), ContractError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(ContractError::lifecycle(self.status, action))
        }
    }

    fn advance_sent_date(&mut self, at: DateTime<Utc>) {
        self.sent_date = Some(match self.sent_date {
            Some(previous) if previous > at => previous,
            _ => at,
        });
    }
}

/// Wire shape of [`Contract`] before its lifecycle fields are checked.
#[derive(Deserialize)]
struct StoredContract {
    id: ContractId,
    property: String,
    #[serde(default)]
    tenant: Option<TenantContact>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    value: u32,
    status: ContractStatus,
    #[serde(default)]
    sent_date: Option<DateTime<Utc>>,
    #[serde(default)]
    viewed_by_tenant: bool,
    #[serde(default)]
    audit_trail: Option<AuditRecord>,
}

impl TryFrom<StoredContract> for Contract {
    type Error = &'static str;

    fn try_from(stored: StoredContract) -> Result<Self, Self::Error> {
        let delivered = matches!(
            stored.status,
            ContractStatus::PendingSignature | ContractStatus::Active
        );
        match (&stored.audit_trail, stored.status) {
            (Some(record), ContractStatus::Active) if !record.integrity_verified() => {
                return Err("an active contract needs a verified audit record");
            }
            (None, ContractStatus::Active) => {
                return Err("an active contract needs an audit record");
            }
            (Some(_), status) if status != ContractStatus::Active => {
                return Err("only an active contract carries an audit record");
            }
            _ => {}
        }
        if delivered && stored.sent_date.is_none() {
            return Err("a sent contract needs a sent_date");
        }
        if stored.viewed_by_tenant && !delivered {
            return Err("only a sent contract can be viewed");
        }

        Ok(Self {
            id: stored.id,
            property: stored.property,
            tenant: stored.tenant,
            start_date: stored.start_date,
            end_date: stored.end_date,
            value: stored.value,
            status: stored.status,
            sent_date: stored.sent_date,
            viewed_by_tenant: stored.viewed_by_tenant,
            audit_trail: stored.audit_trail,
        })
    }
}

/// Derive the display status from stored data and an explicit `today`.
pub fn display_status(
    status: ContractStatus,
    end_date: NaiveDate,
    today: NaiveDate,
    window_days: i64,
) -> DisplayStatus {
    if end_date < today {
        return DisplayStatus::Expired;
    }
    if status == ContractStatus::Active && (end_date - today).num_days() <= window_days {
        return DisplayStatus::Expiring;
    }
    status.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::error::TransitionRejection;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn contract() -> Contract {
        Contract::draft(
            ContractId("ctr-test".to_string()),
            "12 Harbor Lane",
            None,
            date(2026, 1, 1),
            date(2026, 12, 31),
            1450,
        )
    }

    #[test]
    fn display_status_is_derived_from_dates() {
        let today = date(2026, 12, 10);
        assert_eq!(
            display_status(ContractStatus::Active, date(2027, 6, 1), today, 30),
            DisplayStatus::Active
        );
        assert_eq!(
            display_status(ContractStatus::Active, date(2027, 1, 9), today, 30),
            DisplayStatus::Expiring
        );
        assert_eq!(
            display_status(ContractStatus::Active, date(2027, 1, 10), today, 30),
            DisplayStatus::Active
        );
        assert_eq!(
            display_status(ContractStatus::Active, date(2026, 12, 9), today, 30),
            DisplayStatus::Expired
        );
        assert_eq!(
            display_status(ContractStatus::PendingSignature, date(2026, 12, 20), today, 30),
            DisplayStatus::PendingSignature
        );
        assert_eq!(
            display_status(ContractStatus::Draft, date(2026, 1, 1), today, 30),
            DisplayStatus::Expired
        );
    }

    #[test]
    fn end_date_today_is_expiring_not_expired() {
        let today = date(2026, 12, 31);
        assert_eq!(
            display_status(ContractStatus::Active, today, today, 30),
            DisplayStatus::Expiring
        );
    }

    #[test]
    fn send_requires_pending_send() {
        let mut contract = contract();
        let err = contract.send(Utc::now()).expect_err("draft cannot be sent");
        assert_eq!(
            err,
            ContractError::StateTransitionRejected(TransitionRejection::Lifecycle {
                from: ContractStatus::Draft,
                action: LifecycleAction::Send,
            })
        );
        assert!(contract.sent_date().is_none());
    }

    #[test]
    fn mark_viewed_only_while_pending_signature() {
        let mut contract = contract();
        contract.complete_document().expect("draft completes");
        assert!(contract.mark_viewed().is_err());
        assert!(!contract.viewed_by_tenant());

        contract.send(Utc::now()).expect("sends");
        contract.mark_viewed().expect("viewed");
        contract.mark_viewed().expect("repeat view is harmless");
        assert!(contract.viewed_by_tenant());
        assert!(contract.sent_date().is_some());
    }

    #[test]
    fn resend_never_moves_sent_date_backwards() {
        let mut contract = contract();
        contract.complete_document().expect("completes");
        let first = Utc::now();
        contract.send(first).expect("sends");

        contract
            .resend(first - chrono::Duration::hours(1))
            .expect("resend allowed");
        assert_eq!(contract.sent_date(), Some(first));

        let later = first + chrono::Duration::hours(2);
        contract.resend(later).expect("resend allowed");
        assert_eq!(contract.sent_date(), Some(later));
    }

    fn audit_record(verified: bool) -> AuditRecord {
        AuditRecord::restore(
            Utc::now(),
            "203.0.113.7".to_string(),
            "Mozilla/5.0".to_string(),
            "ana@example.com".to_string(),
            "ab".repeat(32),
            verified,
        )
    }

    fn pending_signature() -> Contract {
        let mut contract = contract();
        contract.complete_document().expect("completes");
        contract.send(Utc::now()).expect("sends");
        contract
    }

    #[test]
    fn unverified_audit_record_does_not_activate() {
        let mut contract = pending_signature();
        let err = contract
            .complete_signature(audit_record(false))
            .expect_err("unverified record");
        assert!(matches!(err, ContractError::SignatureFailed(_)));
        assert_eq!(contract.status(), ContractStatus::PendingSignature);
        assert!(contract.audit_trail().is_none());

        contract
            .complete_signature(audit_record(true))
            .expect("verified record activates");
        assert_eq!(contract.status(), ContractStatus::Active);
    }

    #[test]
    fn stored_contracts_round_trip_through_json() {
        let mut contract = pending_signature();
        contract.mark_viewed().expect("viewed");
        contract
            .complete_signature(audit_record(true))
            .expect("activates");

        let json = serde_json::to_value(&contract).expect("serializes");
        let restored: Contract = serde_json::from_value(json).expect("valid contract");
        assert_eq!(restored, contract);
    }

    #[test]
    fn deserializing_rejects_broken_lifecycles() {
        let base = serde_json::to_value(contract()).expect("serializes");
        let with = |changes: serde_json::Value| {
            let mut value = base.clone();
            for (key, field) in changes.as_object().expect("object") {
                value[key] = field.clone();
            }
            serde_json::from_value::<Contract>(value)
        };

        assert!(with(serde_json::json!({})).is_ok());
        assert!(with(serde_json::json!({ "status": "ACTIVE" })).is_err());
        assert!(with(serde_json::json!({
            "status": "ACTIVE",
            "sent_date": Utc::now(),
            "audit_trail": audit_record(false),
        }))
        .is_err());
        assert!(with(serde_json::json!({ "status": "PENDING_SIGNATURE" })).is_err());
        assert!(with(serde_json::json!({ "viewed_by_tenant": true })).is_err());
        assert!(with(serde_json::json!({ "audit_trail": audit_record(true) })).is_err());
        assert!(with(serde_json::json!({
            "status": "ACTIVE",
            "sent_date": Utc::now(),
            "audit_trail": audit_record(true),
        }))
        .is_ok());
    }

    #[test]
    fn completing_the_document_twice_is_rejected() {
        let mut contract = contract();
        contract.complete_document().expect("completes");
        assert!(matches!(
            contract.complete_document(),
            Err(ContractError::StateTransitionRejected(_))
        ));
        assert!(contract.is_editable());
    }
}
