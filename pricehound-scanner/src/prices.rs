use crate::result::{PageResultMap, PriceRecord, occurrence_key};
use crate::text::{LabelHeuristics, infer_currency_symbol, parse_amount};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, trace};

/// Label used when nothing identifying sits near a price.
pub const DEFAULT_PRICE_LABEL: &str = "price";

// Symbols are only recognised before the amount, so "$5 $6" stays two prices.
// The grouped form needs at least one group, otherwise it would stop after
// three digits of an ungrouped amount.
static PRICE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        (?P<cur>\$|USD|US\$|€|EUR|£|GBP|MXN|R\$|CAD|AUD)?
        \s*
        (?P<val>
            (?: [0-9]{1,3} (?:[.,][0-9]{3})+ | [0-9]+ )
            (?:[.,][0-9]{2})?
        )
        \s*
        (?P<cur2>USD|US\$|EUR|GBP|MXN|CAD|AUD)?
        ",
    )
    .expect("hardcoded regex pattern is valid")
});

static DEFAULT_EXTRACTOR: LazyLock<PriceExtractor> = LazyLock::new(PriceExtractor::default);

/// Scan `html` for prices with the default label heuristics.
pub fn extract_prices(page_url: &str, worker_id: u64, html: &str) -> PageResultMap {
    DEFAULT_EXTRACTOR.extract(page_url, worker_id, html)
}

#[derive(Debug, Clone, Default)]
pub struct PriceExtractor {
    labels: LabelHeuristics,
}

impl PriceExtractor {
    pub fn new(labels: LabelHeuristics) -> Self {
        Self { labels }
    }

    /// Every currency-bearing, parseable amount in `html`, keyed by
    /// `{page_url}::worker-{worker_id}::#{n}` with `n` counting accepted
    /// matches from 1 in document order.
    pub fn extract(&self, page_url: &str, worker_id: u64, html: &str) -> PageResultMap {
        let mut page = PageResultMap::new();
        let mut ordinal = 0;

        for caps in PRICE_REGEX.captures_iter(html) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(raw) = caps.name("val") else { continue };

            let currency = caps
                .name("cur")
                .or_else(|| caps.name("cur2"))
                .map(|m| m.as_str().to_uppercase())
                .unwrap_or_else(|| infer_currency_symbol(whole.as_str()).to_string());

            let amount = match parse_amount(raw.as_str()) {
                Ok(amount) => amount,
                Err(e) => {
                    trace!("Discarding candidate on {}: {}", page_url, e);
                    continue;
                }
            };

            if currency.is_empty() {
                continue;
            }

            let label = self
                .labels
                .find(html, whole.start())
                .unwrap_or_else(|| DEFAULT_PRICE_LABEL.to_string());

            ordinal += 1;
            let key = occurrence_key(page_url, worker_id, ordinal);
            let record = PriceRecord::new(amount, currency, label);
            debug!("Price found: {} => {}", key, record);
            page.insert(key, record);
        }

        page
    }
}
