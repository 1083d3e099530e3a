//! HTML parsers for boatrace.jp pages.

pub mod beforeinfo;

pub use beforeinfo::BeforeInfoParser;
