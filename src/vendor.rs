//! NIC vendor lookups using IEEE OUI assignments

use pnet::util::MacAddr;
use std::collections::HashMap;

use crate::error::{LanWhoError, Result};

/// Trait for matching a MAC address to the organization name of its NIC
/// manufacturer
pub trait VendorResolver: Send + Sync {
    /// Returns the organization name for the MAC's OUI prefix, or an empty
    /// string when the prefix is unknown
    fn lookup(&self, mac: &MacAddr) -> String;
}

/// A [`VendorResolver`] that never resolves anything
///
/// Use this when vendor tagging is not wanted; scan results keep their
/// vendor field empty.
pub struct NoVendor;

impl VendorResolver for NoVendor {
    fn lookup(&self, _mac: &MacAddr) -> String {
        String::new()
    }
}

/// A [`VendorResolver`] backed by the dataset bundled with the `oui-data`
/// crate, so callers get vendor names without supplying their own dataset
pub struct BundledVendorData;

impl VendorResolver for BundledVendorData {
    fn lookup(&self, mac: &MacAddr) -> String {
        oui_data::lookup(&mac.to_string())
            .map(|v| v.organization().to_owned())
            .unwrap_or_default()
    }
}

/// A single validated OUI assignment record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OuiRecord {
    assignment: String,
    organization: String,
}

impl OuiRecord {
    /// Validates and returns a new record
    ///
    /// The assignment must be exactly six hexadecimal characters and the
    /// organization name must not be blank.
    pub fn new(assignment: &str, organization: &str) -> Result<Self> {
        if assignment.len() != 6 || !assignment.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LanWhoError::InvalidOuiRecord(format!(
                "assignment must be exactly six hex characters: {assignment:?}"
            )));
        }

        if organization.trim().is_empty() {
            return Err(LanWhoError::InvalidOuiRecord(format!(
                "organization name must not be blank for assignment {assignment:?}"
            )));
        }

        Ok(Self {
            assignment: assignment.to_ascii_uppercase(),
            organization: organization.trim().to_string(),
        })
    }

    /// Returns the six-character OUI assignment, uppercased
    pub fn assignment(&self) -> &str {
        &self.assignment
    }

    /// Returns the organization name the OUI is assigned to
    pub fn organization(&self) -> &str {
        &self.organization
    }
}

/// A prefix to organization-name lookup table built from OUI assignment
/// records
///
/// Read-only after construction. A prefix assigned to several
/// organizations keeps every name, joined with `" OR "`.
pub struct OuiTable {
    assignments: HashMap<String, String>,
}

impl OuiTable {
    /// Builds a table from validated records
    pub fn new<I: IntoIterator<Item = OuiRecord>>(records: I) -> Self {
        let mut assignments: HashMap<String, String> = HashMap::new();

        for record in records {
            assignments
                .entry(record.assignment)
                .and_modify(|org| {
                    org.push_str(" OR ");
                    org.push_str(&record.organization);
                })
                .or_insert(record.organization);
        }

        Self { assignments }
    }

    /// Builds a table from raw (assignment, organization) pairs, as parsed
    /// from an external dataset
    ///
    /// Malformed pairs are skipped with a diagnostic rather than failing
    /// the whole dataset.
    pub fn from_pairs<'a, I: IntoIterator<Item = (&'a str, &'a str)>>(pairs: I) -> Self {
        Self::new(pairs.into_iter().filter_map(|(assignment, organization)| {
            match OuiRecord::new(assignment, organization) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::warn!("skipping oui record: {e}");
                    None
                }
            }
        }))
    }

    /// Returns the number of distinct prefixes in the table
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Returns true if the table holds no assignments
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

impl VendorResolver for OuiTable {
    fn lookup(&self, mac: &MacAddr) -> String {
        let prefix: String = mac
            .to_string()
            .chars()
            .filter(|c| c.is_ascii_hexdigit())
            .take(6)
            .collect::<String>()
            .to_ascii_uppercase();

        self.assignments.get(&prefix).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "./vendor_tests.rs"]
mod tests;
