//! Interpreting activation replies.
//!
//! An app answers with one of `ok`, `done`, `testing` or `error <reason>`,
//! case-insensitive, optionally followed by a line ending. Anything else is an
//! anomaly.

use regex::Regex;
use std::sync::LazyLock;
use tgo_common::KvBundle;

static ERROR_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^error .*").unwrap());

/// Name of the bundle carrying an app's test results.
pub const RESULTS_BUNDLE: &str = "testresults";

/// Positive replies. Which one counts as progress depends on the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Ok,
    Done,
    Testing,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Ok => "ok",
            Signal::Done => "done",
            Signal::Testing => "testing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Signal(Signal),
    /// `error <reason>`; holds the text from offset 6 of the reply
    Error(String),
    /// Anything else, as received (minus the line ending)
    Unexpected(String),
}

fn trim_line_ending(raw: &str) -> &str {
    raw.trim_end_matches(['\r', '\n'])
}

impl Reply {
    pub fn parse(raw: &str) -> Self {
        let text = trim_line_ending(raw);
        let lower = text.to_lowercase();
        match lower.as_str() {
            "ok" => Reply::Signal(Signal::Ok),
            "done" => Reply::Signal(Signal::Done),
            "testing" => Reply::Signal(Signal::Testing),
            _ if ERROR_REGEX.is_match(&lower) => {
                Reply::Error(text.get(6..).unwrap_or_default().to_string())
            }
            _ => Reply::Unexpected(text.to_string()),
        }
    }

    pub fn is(&self, signal: Signal) -> bool {
        matches!(self, Reply::Signal(s) if *s == signal)
    }
}

/// Turn a `testresults` reply into a bundle.
///
/// `key=value` tokens become entries. A reply with no such tokens is kept
/// whole under the key `result`; an empty reply gives an empty bundle.
pub fn results_bundle(raw: &str) -> KvBundle {
    let text = trim_line_ending(raw).trim();
    let mut bundle = KvBundle::new(RESULTS_BUNDLE);
    for token in text.split_whitespace() {
        if let Some((key, val)) = token.split_once('=') {
            if !key.is_empty() {
                bundle.push(key, val);
            }
        }
    }
    if bundle.kvs.is_empty() && !text.is_empty() {
        bundle.push("result", text);
    }
    bundle
}
