//! Portfolio overview: contracts grouped by display status, with a CSV export.

use std::collections::BTreeMap;
use std::io;

use chrono::NaiveDate;
use serde::Serialize;

use super::lifecycle::{Contract, ContractId, DisplayStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortfolioEntry {
    pub id: ContractId,
    pub property: String,
    pub tenant: String,
    pub display_status: DisplayStatus,
    pub end_date: NaiveDate,
    pub days_remaining: i64,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: DisplayStatus,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortfolioReport {
    pub as_of: NaiveDate,
    pub window_days: i64,
    pub entries: Vec<PortfolioEntry>,
}

impl PortfolioReport {
    pub fn build<'a, I>(contracts: I, today: NaiveDate, window_days: i64) -> Self
    where
        I: IntoIterator<Item = &'a Contract>,
    {
        let entries = contracts
            .into_iter()
            .map(|contract| PortfolioEntry {
                id: contract.id.clone(),
                property: contract.property.clone(),
                tenant: contract
                    .tenant
                    .as_ref()
                    .map(|tenant| tenant.name.clone())
                    .unwrap_or_default(),
                display_status: contract.display_status_with_window(today, window_days),
                end_date: contract.end_date,
                days_remaining: contract.days_remaining(today),
                value: contract.value,
            })
            .collect();

        Self {
            as_of: today,
            window_days,
            entries,
        }
    }

    /// Counts in display-status order; statuses with no contracts are omitted.
    pub fn counts(&self) -> Vec<StatusCount> {
        let mut counts: BTreeMap<DisplayStatus, usize> = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.display_status).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(status, count)| StatusCount {
                status,
                label: status.label(),
                count,
            })
            .collect()
    }

    pub fn count(&self, status: DisplayStatus) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.display_status == status)
            .count()
    }

    /// Expiring contracts, soonest first.
    pub fn expiring(&self) -> Vec<&PortfolioEntry> {
        let mut expiring: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| entry.display_status == DisplayStatus::Expiring)
            .collect();
        expiring.sort_by_key(|entry| (entry.days_remaining, entry.id.clone()));
        expiring
    }

    pub fn total_value(&self, status: DisplayStatus) -> u64 {
        self.entries
            .iter()
            .filter(|entry| entry.display_status == status)
            .map(|entry| u64::from(entry.value))
            .sum()
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record([
            "id",
            "property",
            "tenant",
            "display_status",
            "end_date",
            "days_remaining",
            "value",
        ])?;
        for entry in &self.entries {
            let end_date = entry.end_date.format("%Y-%m-%d").to_string();
            let days_remaining = entry.days_remaining.to_string();
            let value = entry.value.to_string();
            csv.write_record([
                entry.id.0.as_str(),
                entry.property.as_str(),
                entry.tenant.as_str(),
                entry.display_status.label(),
                end_date.as_str(),
                days_remaining.as_str(),
                value.as_str(),
            ])?;
        }
        csv.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::audit::AuditRecord;
    use crate::contracts::lifecycle::TenantContact;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn active(id: &str, end: NaiveDate) -> Contract {
        let mut contract = Contract::draft(
            ContractId(id.to_string()),
            format!("{id} Harbor Lane"),
            Some(TenantContact {
                name: "Ana, Souza".to_string(),
                phone: None,
                email: None,
            }),
            date(2025, 1, 1),
            end,
            1200,
        );
        contract.complete_document().expect("pending send");
        contract.send(Utc::now()).expect("sent");
        contract
            .complete_signature(AuditRecord::restore(
                Utc::now(),
                "unknown".to_string(),
                "unknown".to_string(),
                "ana@example.com".to_string(),
                "00".repeat(32),
                true,
            ))
            .expect("active");
        contract
    }

    #[test]
    fn groups_by_derived_status() {
        let today = date(2026, 6, 1);
        let contracts = vec![
            active("a", date(2026, 6, 20)),
            active("b", date(2026, 6, 5)),
            active("c", date(2027, 1, 1)),
            active("d", date(2026, 5, 1)),
        ];
        let report = PortfolioReport::build(&contracts, today, 30);

        assert_eq!(report.count(DisplayStatus::Expiring), 2);
        assert_eq!(report.count(DisplayStatus::Active), 1);
        assert_eq!(report.count(DisplayStatus::Expired), 1);
        let expiring: Vec<_> = report.expiring().iter().map(|e| e.id.0.clone()).collect();
        assert_eq!(expiring, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(report.total_value(DisplayStatus::Expiring), 2400);

        let labels: Vec<_> = report.counts().iter().map(|c| c.label).collect();
        assert_eq!(labels, vec!["active", "expiring", "expired"]);
    }

    #[test]
    fn csv_export_quotes_fields() {
        let contracts = vec![active("a", date(2026, 6, 20))];
        let report = PortfolioReport::build(&contracts, date(2026, 6, 1), 30);
        let mut out = Vec::new();
        report.write_csv(&mut out).expect("csv written");
        let text = String::from_utf8(out).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,property,tenant,display_status,end_date,days_remaining,value")
        );
        assert_eq!(
            lines.next(),
            Some("a,a Harbor Lane,\"Ana, Souza\",expiring,2026-06-20,19,1200")
        );
    }
}
