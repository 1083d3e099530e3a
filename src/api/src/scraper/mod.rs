//! Web scraper module for boatrace.jp
//!
//! Provides the HTTP page fetcher, HTML parsing, and the in-memory TTL cache.

pub mod cache;
pub mod fetcher;
pub mod parsers;

pub use cache::{Clock, SystemClock, TtlCache};
pub use fetcher::{FetchedPage, HttpFetcher, PageFetcher};

/// Base URL for the official site
pub const BASE_URL: &str = "https://www.boatrace.jp";

/// Build pre-race information (直前情報) URL
pub fn beforeinfo_url(base_url: &str, id: &crate::types::RaceId) -> String {
    format!(
        "{}/owpc/pc/race/beforeinfo?rno={}&jcd={}&hd={}",
        base_url.trim_end_matches('/'),
        id.race(),
        id.jcd(),
        id.hd()
    )
}
