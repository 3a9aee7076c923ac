//! Ownership domain models.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::holders::HolderId;

/// Issuer identifier, usually a CIK or ticker.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(String);

impl CompanyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Filing accession identifier.
///
/// Accession numbers embed the filing sequence, so lexical order is the
/// tiebreak between filings that report the same date.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilingId(String);

impl FilingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Filing form, serialized as the form name the regulator uses.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FilingType {
    /// Proxy statement; carries the beneficial ownership table.
    Def14a,
    /// Quarterly institutional holdings report.
    Form13f,
    /// Passive beneficial ownership above 5%.
    Schedule13g,
    /// Active beneficial ownership above 5%.
    Schedule13d,
    Other(String),
}

impl FilingType {
    pub fn as_str(&self) -> &str {
        match self {
            FilingType::Def14a => "DEF 14A",
            FilingType::Form13f => "13F-HR",
            FilingType::Schedule13g => "SC 13G",
            FilingType::Schedule13d => "SC 13D",
            FilingType::Other(form) => form,
        }
    }

    /// Parse a form name. Amendments map to their base form.
    pub fn parse(form: &str) -> Self {
        let upper = form.trim().to_ascii_uppercase();
        let base = upper.strip_suffix("/A").unwrap_or(&upper);
        match base {
            "DEF 14A" | "DEF14A" => FilingType::Def14a,
            "13F-HR" | "13F" => FilingType::Form13f,
            "SC 13G" | "SC13G" => FilingType::Schedule13g,
            "SC 13D" | "SC13D" => FilingType::Schedule13d,
            _ => FilingType::Other(form.trim().to_string()),
        }
    }
}

impl fmt::Display for FilingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FilingType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FilingType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let form = String::deserialize(deserializer)?;
        Ok(FilingType::parse(&form))
    }
}

/// One holder's position in one company as reported by one filing.
///
/// Identity is `(company_id, holder_id, filing_id)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipFact {
    pub company_id: CompanyId,
    pub holder_id: HolderId,
    pub filing_id: FilingId,
    pub shares: u64,
    pub percent: Option<f64>,
    pub as_of_date: NaiveDate,
    pub source_filing_type: FilingType,
}

impl OwnershipFact {
    pub fn key(&self) -> FactKey {
        FactKey {
            company_id: self.company_id.clone(),
            holder_id: self.holder_id.clone(),
            filing_id: self.filing_id.clone(),
        }
    }

    /// True when every non-key field matches `other`.
    pub fn same_payload(&self, other: &OwnershipFact) -> bool {
        self.shares == other.shares
            && self.percent == other.percent
            && self.as_of_date == other.as_of_date
            && self.source_filing_type == other.source_filing_type
    }
}

/// Identity of an ownership fact.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FactKey {
    pub company_id: CompanyId,
    pub holder_id: HolderId,
    pub filing_id: FilingId,
}

/// What an upsert did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Unchanged,
    Updated,
}

impl UpsertOutcome {
    pub fn is_write(&self) -> bool {
        !matches!(self, UpsertOutcome::Unchanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filing_type_round_trips_sec_form_names() {
        for form in [
            FilingType::Def14a,
            FilingType::Form13f,
            FilingType::Schedule13g,
            FilingType::Schedule13d,
        ] {
            assert_eq!(FilingType::parse(form.as_str()), form);
        }
    }

    #[test]
    fn test_amendments_map_to_base_form() {
        assert_eq!(FilingType::parse("SC 13G/A"), FilingType::Schedule13g);
        assert_eq!(FilingType::parse("def 14a"), FilingType::Def14a);
    }

    #[test]
    fn test_unknown_form_is_kept() {
        assert_eq!(
            FilingType::parse("10-K"),
            FilingType::Other("10-K".to_string())
        );
    }

    #[test]
    fn test_fact_serializes_form_name() {
        let fact = OwnershipFact {
            company_id: CompanyId::new("AAPL"),
            holder_id: HolderId::new("h_0123456789abcdef"),
            filing_id: FilingId::new("0001193125-24-000001"),
            shares: 100,
            percent: Some(1.5),
            as_of_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            source_filing_type: FilingType::Def14a,
        };
        let json = serde_json::to_value(&fact).unwrap();
        assert_eq!(json["sourceFilingType"], "DEF 14A");
        assert_eq!(json["companyId"], "AAPL");
        assert_eq!(json["asOfDate"], "2024-01-31");
    }
}
