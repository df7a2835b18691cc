use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One monetary occurrence detected in a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    amount: Decimal,
    currency: String,
    label: String,
}

impl PriceRecord {
    pub fn new(amount: Decimal, currency: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
            label: label.into(),
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for PriceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.currency, self.amount, self.label)
    }
}

/// Records found on a single page, keyed by occurrence key.
pub type PageResultMap = HashMap<String, PriceRecord>;

/// Records merged across every page of a crawl run.
pub type AggregateResultMap = HashMap<String, PriceRecord>;

/// Build the occurrence key for the `ordinal`-th accepted match on a page.
pub fn occurrence_key(page_url: &str, worker_id: u64, ordinal: usize) -> String {
    format!("{}::worker-{}::#{}", page_url, worker_id, ordinal)
}

/// Fold a page map into the aggregate. Keys already present are kept.
/// Returns how many records were actually inserted.
pub fn merge_into(aggregate: &mut AggregateResultMap, page: PageResultMap) -> usize {
    let mut inserted = 0;
    for (key, record) in page {
        if let std::collections::hash_map::Entry::Vacant(slot) = aggregate.entry(key) {
            slot.insert(record);
            inserted += 1;
        }
    }
    inserted
}
