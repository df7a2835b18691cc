pub mod crawler;
pub mod error;
pub mod links;
pub mod prices;
pub mod result;
pub mod text;

pub use crawler::{CrawlStats, Crawler, PageCallback, PageEvent};
pub use error::ScanError;
pub use prices::{PriceExtractor, extract_prices};
pub use result::{AggregateResultMap, PageResultMap, PriceRecord};
pub use tokio_util::sync::CancellationToken;
