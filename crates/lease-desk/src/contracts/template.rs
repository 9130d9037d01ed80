//! `{{token}}` substitution for contract templates.
//!
//! Filling never fails: a token without a usable value is replaced by a blank
//! line so the printed contract can still be completed by hand.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::lifecycle::TenantContact;

/// Rendered in place of any token that has no non-empty value.
pub const BLANK_FIELD: &str = "_______________________";

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Token name to value mapping. Keys are stored trimmed, so `" name "` and
/// `"name"` address the same entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, String>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.as_ref().trim().to_string(), value.into())
    }

    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key.trim()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// Immutable template text containing `{{token}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractTemplate(String);

impl ContractTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn standard_lease() -> Self {
        Self::new(STANDARD_LEASE_TEMPLATE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn fill(&self, fields: &FieldMap) -> String {
        fill_template(&self.0, fields)
    }

    pub fn tokens(&self) -> Vec<String> {
        template_tokens(&self.0)
    }
}

/// Replace every `{{key}}` with its trimmed-key value, or [`BLANK_FIELD`].
pub fn fill_template(template: &str, fields: &FieldMap) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };

        output.push_str(&rest[..start]);
        let value = fields
            .get(&after_open[..end])
            .filter(|value| !value.is_empty())
            .unwrap_or(BLANK_FIELD);
        output.push_str(value);
        rest = &after_open[end + CLOSE.len()..];
    }

    output.push_str(rest);
    output
}

/// Distinct, trimmed token names referenced by `template`, sorted.
pub fn template_tokens(template: &str) -> Vec<String> {
    let mut tokens = BTreeSet::new();
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        let key = after_open[..end].trim();
        if !key.is_empty() {
            tokens.insert(key.to_string());
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    tokens.into_iter().collect()
}

/// Default residential lease offered by the creation wizard.
pub const STANDARD_LEASE_TEMPLATE: &str = "RESIDENTIAL LEASE AGREEMENT

LANDLORD: {{owner_name}}
TENANT: {{tenant_name}}
PROPERTY: {{property_address}}

1. TERM
The lease begins on {{start_date}} and ends on {{end_date}}. Either party may end the lease early only as allowed by law or by written agreement of both parties.

2. RENT
The tenant agrees to pay a monthly rent of {{monthly_rent}}, due on day {{payment_day}} of each month. Late payments may incur the fees permitted by local law.

3. SECURITY DEPOSIT
The tenant pays a security deposit of {{deposit}} on signing. The deposit is returned at the end of the lease, less any amounts lawfully withheld for unpaid rent or damage beyond normal wear and tear.

4. USE OF THE PROPERTY
The property is to be used only as a private residence. The tenant may not sublet or assign the lease without the landlord's written consent.

5. MAINTENANCE AND REPAIRS
The tenant keeps the property clean and in good condition and reports any needed repairs promptly. The landlord is responsible for structural repairs and for keeping essential services in working order.

6. ADDITIONAL TERMS
{{extra_clauses}}

7. JURISDICTION
Disputes arising from this agreement are settled in the courts of {{city}}.

Signed on {{signing_date}}.

______________________________
{{owner_name}} (Landlord)

______________________________
{{tenant_name}} (Tenant)
";

/// Structured wizard input for a generated lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseTerms {
    pub owner_name: String,
    #[serde(default)]
    pub tenant: Option<TenantContact>,
    pub property_address: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_rent: u32,
    #[serde(default)]
    pub deposit: Option<u32>,
    #[serde(default)]
    pub payment_day: Option<u8>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub extra_clauses: Vec<String>,
}

impl LeaseTerms {
    /// Field values for [`STANDARD_LEASE_TEMPLATE`]; absent data is left out so
    /// the template renders a blank for it.
    pub fn field_map(&self) -> FieldMap {
        let mut fields = FieldMap::new()
            .with("owner_name", self.owner_name.trim())
            .with("property_address", self.property_address.trim())
            .with("start_date", format_date(self.start_date))
            .with("end_date", format_date(self.end_date))
            .with("monthly_rent", format_amount(self.monthly_rent));

        if let Some(tenant) = &self.tenant {
            fields.insert("tenant_name", tenant.name.trim());
        }
        if let Some(deposit) = self.deposit {
            fields.insert("deposit", format_amount(deposit));
        }
        if let Some(day) = self.payment_day {
            fields.insert("payment_day", day.to_string());
        }
        if let Some(city) = &self.city {
            fields.insert("city", city.trim());
        }
        if !self.extra_clauses.is_empty() {
            let clauses = self
                .extra_clauses
                .iter()
                .map(|clause| clause.trim())
                .filter(|clause| !clause.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            fields.insert("extra_clauses", clauses);
        }

        fields
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn format_amount(amount: u32) -> String {
    format!("${amount}.00")
}
