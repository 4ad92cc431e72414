//! Fragment sources.

pub mod jsonl;

pub use jsonl::{FragmentReader, parse_record};
