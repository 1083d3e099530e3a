//! Per-message request handling.
//!
//! Every message walks the same state machine and always ends in
//! `Responding`, with either a summary, guidance text, or the fallback link.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::InvalidCommand;
use crate::failsafe::fallback_reply;
use crate::query::{parse_command, today_jst};
use crate::scraper::parsers::BeforeInfoParser;
use crate::scraper::{Clock, FetchedPage, PageFetcher, TtlCache};
use crate::summary::build_summary;
use crate::types::{CommandResult, RaceId, RaceInfo};

/// Cache of parsed races shared by all in-flight requests
pub type RaceCache = TtlCache<RaceId, Arc<RaceInfo>>;

/// Usage text returned for `help`
pub const USAGE: &str = "使い方\n\
『丸亀 8』 今日の丸亀8Rの直前情報と予想\n\
『丸亀 8 20250812』 日付を指定(YYYYMMDD)\n\
『help』 この説明を表示\n\
※ 場名 + スペース + レース番号(1〜12) + 任意で日付";

enum State {
    Parsing,
    Helping,
    Rejecting(InvalidCommand),
    Resolving(RaceId),
    CacheHit(Arc<RaceInfo>),
    Fetching(RaceId),
    Extracting(FetchedPage),
    Failing { id: RaceId, url: String },
    Responding(String),
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Parsing => "parsing",
            State::Helping => "helping",
            State::Rejecting(_) => "rejecting",
            State::Resolving(_) => "resolving",
            State::CacheHit(_) => "cache_hit",
            State::Fetching(_) => "fetching",
            State::Extracting(_) => "extracting",
            State::Failing { .. } => "failing",
            State::Responding(_) => "responding",
        }
    }
}

/// Turns chat text into reply text
pub struct RequestDispatcher {
    cache: Arc<RaceCache>,
    fetcher: Arc<dyn PageFetcher>,
    clock: Arc<dyn Clock>,
}

impl RequestDispatcher {
    pub fn new(cache: Arc<RaceCache>, fetcher: Arc<dyn PageFetcher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            fetcher,
            clock,
        }
    }

    /// Handle one message. Never fails: every path yields a reply.
    pub async fn handle(&self, text: &str) -> String {
        let mut state = State::Parsing;

        loop {
            state = match state {
                State::Parsing => {
                    let today = today_jst(self.clock.now());
                    match parse_command(text, today) {
                        CommandResult::Help => State::Helping,
                        CommandResult::Invalid(reason) => State::Rejecting(reason),
                        CommandResult::Query(id) => State::Resolving(id),
                    }
                }
                State::Helping => State::Responding(USAGE.to_string()),
                State::Rejecting(reason) => {
                    debug!("Rejected {:?}: {}", text, reason);
                    State::Responding(invalid_reply(&reason))
                }
                State::Resolving(id) => match self.cache.get(&id) {
                    Some(info) => State::CacheHit(info),
                    None => State::Fetching(id),
                },
                State::CacheHit(info) => {
                    let url = self.fetcher.url_for(&info.id);
                    State::Responding(build_summary(&info, &url))
                }
                State::Fetching(id) => match self.fetcher.fetch(&id).await {
                    Ok(page) => State::Extracting(page),
                    Err(e) => {
                        warn!("Fetch failed: {}", e);
                        State::Failing {
                            id,
                            url: e.url().to_string(),
                        }
                    }
                },
                State::Extracting(page) => match BeforeInfoParser::parse(&page) {
                    Ok(info) => {
                        let info = Arc::new(info);
                        self.cache.put(info.id, info.clone());
                        debug!("Cached {} ({} entries)", info.id.title(), self.cache.len());
                        State::Responding(build_summary(&info, &page.url))
                    }
                    Err(e) => {
                        warn!("Parse failed for {}: {}", page.url, e);
                        State::Failing {
                            id: page.id,
                            url: page.url,
                        }
                    }
                },
                State::Failing { id, url } => State::Responding(fallback_reply(&id.title(), &url)),
                State::Responding(reply) => return reply,
            };
            debug!("-> {}", state.name());
        }
    }
}

fn invalid_reply(reason: &InvalidCommand) -> String {
    format!("{}\n\n{}", reason, USAGE)
}
