//! Session Contract Catalog
//!
//! In-memory [`ContractCatalog`] built from whatever the trading session
//! hands out. Sessions expose contracts either as typed descriptors or as
//! loose key/value records; both are normalized here into one [`Contract`]
//! and indexed by `(strike, option type)`.
//!
//! Record field spellings accepted:
//!
//! | field       | keys                                         |
//! |-------------|----------------------------------------------|
//! | code        | `code`, `symbol`                             |
//! | strike      | `strike_price`, `strike`                     |
//! | option type | `option_right`, `option_type`, `right`       |
//! | expiry      | `delivery_month`, `delivery_date`, `expiry`  |
//! | underlying  | `underlying_code`, `underlying`              |
//!
//! When strike or option type is missing, they are parsed from the code
//! (`<root><strike><C|P>`).

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::application::ports::ContractCatalog;
use crate::domain::contract::{Contract, ContractKey, OptionType};
use crate::domain::streaming::RawEvent;

/// One catalog entry as supplied by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEntry {
    /// Typed descriptor.
    Descriptor(Contract),
    /// Key/value record.
    Record(Map<String, Value>),
}

impl From<Contract> for CatalogEntry {
    fn from(contract: Contract) -> Self {
        Self::Descriptor(contract)
    }
}

/// Catalog indexed by [`ContractKey`].
#[derive(Debug, Clone)]
pub struct SessionCatalog {
    root: String,
    contracts: HashMap<ContractKey, Contract>,
    rejected: usize,
    duplicates: usize,
}

impl SessionCatalog {
    /// Create an empty catalog for codes starting with `root`.
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            contracts: HashMap::new(),
            rejected: 0,
            duplicates: 0,
        }
    }

    /// Build a catalog from entries.
    ///
    /// The first entry for a key wins; sessions list the nearest expiry first.
    #[must_use]
    pub fn from_entries(
        root: impl Into<String>,
        entries: impl IntoIterator<Item = CatalogEntry>,
    ) -> Self {
        let mut catalog = Self::new(root);
        for entry in entries {
            catalog.insert_entry(entry);
        }
        tracing::debug!(
            contracts = catalog.contracts.len(),
            rejected = catalog.rejected,
            duplicates = catalog.duplicates,
            "Contract catalog built"
        );
        catalog
    }

    /// Normalize and index one entry. Returns false if it was unusable, from
    /// another root, or a duplicate.
    pub fn insert_entry(&mut self, entry: CatalogEntry) -> bool {
        let contract = match entry {
            CatalogEntry::Descriptor(contract) => {
                (contract.strike() > Decimal::ZERO).then_some(contract)
            }
            CatalogEntry::Record(record) => contract_from_record(&self.root, record),
        }
        .filter(|contract| contract.code().starts_with(self.root.as_str()));

        let Some(contract) = contract else {
            self.rejected += 1;
            return false;
        };

        let key = contract.key();
        if self.contracts.contains_key(&key) {
            self.duplicates += 1;
            return false;
        }
        self.contracts.insert(key, contract);
        true
    }

    /// Code root, e.g. `TXO`.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Entries that could not be normalized.
    #[must_use]
    pub const fn rejected(&self) -> usize {
        self.rejected
    }

    /// Entries ignored because their key was already present.
    #[must_use]
    pub const fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Every indexed contract, sorted by key.
    #[must_use]
    pub fn contracts(&self) -> Vec<Contract> {
        let mut contracts: Vec<Contract> = self.contracts.values().cloned().collect();
        contracts.sort_by_key(Contract::key);
        contracts
    }
}

impl ContractCatalog for SessionCatalog {
    fn lookup(&self, key: &ContractKey) -> Option<Contract> {
        self.contracts.get(key).cloned()
    }

    fn len(&self) -> usize {
        self.contracts.len()
    }
}

fn contract_from_record(root: &str, record: Map<String, Value>) -> Option<Contract> {
    let raw = RawEvent::new(Value::Object(record));
    let code = first_text(&raw, &["code", "symbol"])?;
    let from_code = ContractKey::parse_code(root, &code);

    let strike = first_decimal(&raw, &["strike_price", "strike"])
        .or_else(|| from_code.map(|k| k.strike()))
        .filter(|s| *s > Decimal::ZERO)?;
    let option_type = first_text(&raw, &["option_right", "option_type", "right"])
        .and_then(|t| OptionType::parse_loose(&t))
        .or_else(|| from_code.map(|k| k.option_type()))?;

    let mut contract = Contract::new(code, strike, option_type);
    if let Some(expiry) = first_text(&raw, &["delivery_month", "delivery_date", "expiry"]) {
        contract = contract.with_expiry(expiry);
    }
    if let Some(underlying) = first_text(&raw, &["underlying_code", "underlying"]) {
        contract = contract.with_underlying(underlying);
    }
    Some(contract)
}

fn first_text(raw: &RawEvent, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| raw.text(k))
}

fn first_decimal(raw: &RawEvent, keys: &[&str]) -> Option<Decimal> {
    keys.iter().find_map(|k| raw.decimal(k))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> CatalogEntry {
        match value {
            Value::Object(map) => CatalogEntry::Record(map),
            other => panic!("not an object: {other}"),
        }
    }

    fn key(strike: i64, option_type: OptionType) -> ContractKey {
        ContractKey::new(Decimal::from(strike), option_type)
    }

    #[test]
    fn descriptor_and_record_resolve_to_same_shape() {
        let catalog = SessionCatalog::from_entries(
            "TXO",
            [
                Contract::new("TXO18000C", Decimal::from(18000), OptionType::Call).into(),
                record(json!({
                    "code": "TXO18000P",
                    "strike_price": 18000.0,
                    "option_right": "OptionRight.Put",
                    "delivery_month": "202412",
                })),
            ],
        );

        let call = catalog.lookup(&key(18000, OptionType::Call)).unwrap();
        let put = catalog.lookup(&key(18000, OptionType::Put)).unwrap();
        assert_eq!(call.code(), "TXO18000C");
        assert_eq!(put.code(), "TXO18000P");
        assert_eq!(put.expiry(), Some("202412"));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn record_falls_back_to_code() {
        let catalog = SessionCatalog::from_entries("TXO", [record(json!({"symbol": "TXO17900C"}))]);
        assert!(catalog.lookup(&key(17900, OptionType::Call)).is_some());
    }

    #[test]
    fn unusable_entries_are_counted_not_indexed() {
        let catalog = SessionCatalog::from_entries(
            "TXO",
            [
                record(json!({"strike_price": 18000, "option_right": "C"})),
                record(json!({"code": "ABC", "strike_price": "n/a"})),
                record(json!({"code": "TXO0C"})),
                Contract::new("TXO0C", Decimal::ZERO, OptionType::Call).into(),
            ],
        );
        assert!(catalog.is_empty());
        assert_eq!(catalog.rejected(), 4);
    }

    #[test]
    fn entries_from_another_root_are_rejected() {
        let catalog = SessionCatalog::from_entries(
            "TXO",
            [
                record(json!({
                    "code": "TXFL4",
                    "strike_price": 18000,
                    "option_right": "C",
                })),
                Contract::new("MXF18000P", Decimal::from(18000), OptionType::Put).into(),
                record(json!({
                    "code": "TXO18000C",
                    "strike_price": 18000,
                    "option_right": "C",
                })),
            ],
        );
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.rejected(), 2);
        assert!(catalog.lookup(&key(18000, OptionType::Put)).is_none());
        assert_eq!(
            catalog.lookup(&key(18000, OptionType::Call)).unwrap().code(),
            "TXO18000C"
        );
    }

    #[test]
    fn first_entry_for_key_wins() {
        let catalog = SessionCatalog::from_entries(
            "TXO",
            [
                Contract::new("TXO18000C", Decimal::from(18000), OptionType::Call)
                    .with_expiry("202411")
                    .into(),
                Contract::new("TXO18000C", Decimal::from(18000), OptionType::Call)
                    .with_expiry("202412")
                    .into(),
            ],
        );
        let found = catalog.lookup(&key(18000, OptionType::Call)).unwrap();
        assert_eq!(found.expiry(), Some("202411"));
        assert_eq!(catalog.duplicates(), 1);
    }

    #[test]
    fn lookup_miss_is_none() {
        let catalog = SessionCatalog::new("TXO");
        assert!(catalog.lookup(&key(18000, OptionType::Call)).is_none());
        assert_eq!(catalog.root(), "TXO");
    }

    #[test]
    fn contracts_are_sorted() {
        let catalog = SessionCatalog::from_entries(
            "TXO",
            [
                record(json!({"code": "TXO18100C"})),
                record(json!({"code": "TXO17900C"})),
            ],
        );
        let codes: Vec<String> = catalog
            .contracts()
            .iter()
            .map(|c| c.code().to_string())
            .collect();
        assert_eq!(codes, vec!["TXO17900C", "TXO18100C"]);
    }
}
