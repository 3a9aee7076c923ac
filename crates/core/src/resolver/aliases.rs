//! Curated alias table.
//!
//! Maps a canonical display name to the spellings filings are known to use
//! for it. The built-in seed covers the large asset managers; operators can
//! extend it with a JSON file shaped like the seed:
//!
//! ```json
//! { "Vanguard Group": ["The Vanguard Group, Inc.", "Vanguard"] }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

const SEED: &[(&str, &[&str])] = &[
    (
        "Vanguard Group",
        &["The Vanguard Group, Inc.", "Vanguard Group Inc", "Vanguard"],
    ),
    (
        "BlackRock",
        &[
            "BlackRock, Inc.",
            "BlackRock Fund Advisors",
            "BlackRock Institutional Trust Company",
        ],
    ),
    (
        "State Street",
        &[
            "State Street Corporation",
            "State Street Global Advisors",
            "SSgA Funds Management",
        ],
    ),
    (
        "Fidelity",
        &[
            "FMR LLC",
            "Fidelity Management & Research Company",
            "Fidelity Investments",
        ],
    ),
    (
        "T. Rowe Price",
        &["T. Rowe Price Associates, Inc.", "T. Rowe Price Group"],
    ),
    ("Berkshire Hathaway", &["Berkshire Hathaway Inc."]),
    (
        "JPMorgan",
        &["JPMorgan Chase & Co.", "J.P. Morgan Investment Management"],
    ),
    (
        "Capital Group",
        &[
            "Capital Research and Management Company",
            "Capital World Investors",
            "Capital International Investors",
        ],
    ),
    (
        "Wellington Management",
        &["Wellington Management Group LLP", "Wellington Management Company LLP"],
    ),
    ("Invesco", &["Invesco Ltd."]),
    ("Northern Trust", &["Northern Trust Corporation"]),
    (
        "Bank of New York Mellon",
        &["The Bank of New York Mellon Corporation", "BNY Mellon"],
    ),
    ("Goldman Sachs Asset Management", &["GSAM"]),
    (
        "Morgan Stanley Investment Management",
        &["Morgan Stanley Investment Management Inc."],
    ),
    ("Dimensional Fund Advisors", &["Dimensional Fund Advisors LP"]),
];

/// Canonical name to alias list, ordered by canonical name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    entries: BTreeMap<String, Vec<String>>,
}

impl AliasTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table of major institutions.
    pub fn seeded() -> Self {
        let entries = SEED
            .iter()
            .map(|(canonical, aliases)| {
                (
                    canonical.to_string(),
                    aliases.iter().map(|a| a.to_string()).collect(),
                )
            })
            .collect();
        Self { entries }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let table: AliasTable = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::ConfigIO(format!("Failed to read alias file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    /// Fold another table into this one; aliases for the same canonical name
    /// are concatenated.
    pub fn extend(&mut self, other: AliasTable) {
        for (canonical, aliases) in other.entries {
            self.entries.entry(canonical).or_default().extend(aliases);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(canonical, aliases)| (canonical.as_str(), aliases.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn validate(&self) -> Result<()> {
        for (canonical, aliases) in &self.entries {
            if canonical.trim().is_empty() {
                return Err(Error::InvalidConfigValue(
                    "Alias table has an empty canonical name".to_string(),
                ));
            }
            if aliases.iter().any(|a| a.trim().is_empty()) {
                return Err(Error::InvalidConfigValue(format!(
                    "Alias table entry '{}' has an empty alias",
                    canonical
                )));
            }
        }
        Ok(())
    }
}
