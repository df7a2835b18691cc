// Include command and handler modules directly
#[path = "commands.rs"]
pub mod commands;
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{load_urls_from_file, load_urls_from_source, parse_url_line, render_report};

// Re-export crawl functionality from pricehound-core
pub use pricehound_core::crawl::{
    CrawlOptions, CrawlProgressCallback, SeedReport, execute_crawl, extract_url_path,
};
