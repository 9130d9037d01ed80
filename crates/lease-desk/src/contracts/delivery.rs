//! Send/view tracking and signature-request messages.
//!
//! Nothing here transmits a message. Formatted requests are handed to a
//! [`MessageOutbox`] implemented by whatever WhatsApp or e-mail adapter the
//! deployment wires in.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ContractError;
use super::lifecycle::{Contract, ContractId, ContractStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    WhatsApp,
    Email,
}

impl DeliveryChannel {
    pub const fn label(self) -> &'static str {
        match self {
            DeliveryChannel::WhatsApp => "whatsapp",
            DeliveryChannel::Email => "email",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryEventKind {
    Sent,
    Resent,
    Viewed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub kind: DeliveryEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<DeliveryChannel>,
    pub at: DateTime<Utc>,
}

/// Append-only log of deliveries and views for one contract. Each recorded
/// event first drives the matching lifecycle transition; rejected transitions
/// leave the log untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTracker {
    events: Vec<DeliveryEvent>,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// First send moves the contract to pending signature; later sends are resends.
    pub fn record_send(
        &mut self,
        contract: &mut Contract,
        channel: DeliveryChannel,
        at: DateTime<Utc>,
    ) -> Result<DeliveryEventKind, ContractError> {
        let kind = if contract.status() == ContractStatus::PendingSignature {
            contract.resend(at)?;
            DeliveryEventKind::Resent
        } else {
            contract.send(at)?;
            DeliveryEventKind::Sent
        };
        self.events.push(DeliveryEvent {
            kind,
            channel: Some(channel),
            at,
        });
        Ok(kind)
    }

    /// Only the first view is logged; the flag itself is already irreversible.
    pub fn record_view(
        &mut self,
        contract: &mut Contract,
        at: DateTime<Utc>,
    ) -> Result<(), ContractError> {
        let first_view = !contract.viewed_by_tenant();
        contract.mark_viewed()?;
        if first_view {
            self.events.push(DeliveryEvent {
                kind: DeliveryEventKind::Viewed,
                channel: None,
                at,
            });
        }
        Ok(())
    }

    pub fn events(&self) -> &[DeliveryEvent] {
        &self.events
    }

    pub fn send_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| event.kind != DeliveryEventKind::Viewed)
            .count()
    }

    pub fn first_viewed_at(&self) -> Option<DateTime<Utc>> {
        self.events
            .iter()
            .find(|event| event.kind == DeliveryEventKind::Viewed)
            .map(|event| event.at)
    }
}

/// Data interpolated into a signature request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRequest {
    pub owner_name: String,
    pub tenant_name: String,
    pub property_address: String,
    pub signing_link: String,
}

impl SignatureRequest {
    pub fn message_body(&self) -> String {
        let mut body = String::new();
        writeln!(body, "Hello {},", fallback(&self.tenant_name, "there")).expect("write greeting");
        body.push('\n');
        writeln!(
            body,
            "{} has sent you the lease for {} to review and sign.",
            fallback(&self.owner_name, "Your landlord"),
            fallback(&self.property_address, "your rental"),
        )
        .expect("write introduction");
        writeln!(body, "Open the contract here: {}", self.signing_link).expect("write link");
        body.push('\n');
        body.push_str(
            "Your signature is recorded with the date, time and device used, together with a fingerprint of the document you signed.",
        );
        body
    }

    pub fn subject(&self) -> String {
        format!(
            "Lease ready for signature: {}",
            fallback(&self.property_address, "your rental")
        )
    }
}

fn fallback<'a>(value: &'a str, default: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default
    } else {
        trimmed
    }
}

/// Message prepared for an external sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub contract_id: ContractId,
    pub channel: DeliveryChannel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
    pub signing_link: String,
}

impl OutboundMessage {
    pub fn for_contract(
        contract: &Contract,
        channel: DeliveryChannel,
        request: &SignatureRequest,
    ) -> Self {
        let recipient = contract.tenant.as_ref().and_then(|tenant| match channel {
            DeliveryChannel::WhatsApp => tenant.phone.clone(),
            DeliveryChannel::Email => tenant.email.clone(),
        });
        let subject = match channel {
            DeliveryChannel::Email => Some(request.subject()),
            DeliveryChannel::WhatsApp => None,
        };

        Self {
            contract_id: contract.id.clone(),
            channel,
            recipient,
            subject,
            body: request.message_body(),
            signing_link: request.signing_link.clone(),
        }
    }
}

/// Outbound hook implemented by delivery adapters.
pub trait MessageOutbox: Send + Sync {
    fn enqueue(&self, message: OutboundMessage) -> Result<(), DeliveryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery transport unavailable: {0}")]
    Transport(String),
}
