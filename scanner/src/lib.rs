//! Corpus scan service internals: drives a pattern-matching engine over a
//! lab's sample set plus shared benign and random corpora, and reduces the
//! raw matches to a pass/fail report.

mod config;
mod corpus;
mod engine;
mod models;

pub use config::Config;
pub use corpus::{scan_corpus, CorpusLayout, EvaluateError, Evaluator};
pub use engine::{EngineError, EngineMatch, EngineReport, ScanEngine, YrScanner};
pub use models::{CorpusResult, ScanReport, ScanRequest, Verdict};
