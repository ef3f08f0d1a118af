//! Trac wiki markup to GitHub-flavored markdown.
//!
//! The translator is a pure, order-sensitive rewrite pipeline: an explicit
//! ordered list of (pattern, replacement) pairs applied sequentially. Order
//! matters — later rules' patterns can be created or destroyed by earlier
//! ones (longer heading markers must run before shorter ones, bold before
//! italic, single-line code spans before multi-line blocks).

use regex::Regex;
use std::sync::LazyLock;

use crate::model::micros_to_rfc3339;

struct Rewrite {
    name: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

impl Rewrite {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("hard-coded rewrite pattern compiles"),
            replacement,
        }
    }
}

static PIPELINE: LazyLock<Vec<Rewrite>> = LazyLock::new(|| {
    vec![
        Rewrite::new("crlf", r"\r\n", "\n"),
        // Single-line {{{span}}} first: `.` does not cross newlines, so
        // multi-line blocks are left for the fenced rule below.
        Rewrite::new("code-span", r"\{\{\{(.+?)\}\}\}", "`$1`"),
        Rewrite::new("code-block", r"(?s)\{\{\{\n?(.*?)\n?\}\}\}", "```\n$1\n```"),
        // Longest heading marker down to shortest, so `== x ==` is never
        // half-eaten by the `=` rule.
        Rewrite::new("heading-4", r"(?m)^====\s+(.*?)\s+====\s*$", "#### $1"),
        Rewrite::new("heading-3", r"(?m)^===\s+(.*?)\s+===\s*$", "### $1"),
        Rewrite::new("heading-2", r"(?m)^==\s+(.*?)\s+==\s*$", "## $1"),
        Rewrite::new("heading-1", r"(?m)^=\s+(.*?)\s+=\s*$", "# $1"),
        Rewrite::new(
            "hyperlink",
            r"\[((?:https?|ftp)://[^\s\[\]]+)\s+([^\]]+)\]",
            "[$2]($1)",
        ),
        // GitHub has no CamelCase auto-linking, so the Trac escape marker
        // is simply dropped.
        Rewrite::new(
            "camelcase-escape",
            r"!([A-Z][a-z0-9]+(?:[A-Z][a-z0-9]+)+)",
            "$1",
        ),
        Rewrite::new("bold", r"'''(.+?)'''", "**$1**"),
        Rewrite::new("italic", r"''(.+?)''", "*$1*"),
        Rewrite::new("bullet-list", r"(?m)^ \* ", "* "),
        Rewrite::new("numbered-list", r"(?m)^ (\d+)\. ", "$1. "),
    ]
});

/// Translate Trac wiki text to GitHub markdown. Pure and deterministic.
#[must_use]
pub fn to_markdown(input: &str) -> String {
    let mut text = input.to_string();
    for rule in PIPELINE.iter() {
        let rewritten = rule.pattern.replace_all(&text, rule.replacement);
        if let std::borrow::Cow::Owned(owned) = rewritten {
            tracing::trace!(rule = rule.name, "markup rule applied");
            text = owned;
        }
    }
    text
}

/// Prepend the provenance header for content whose author has no API
/// credential of their own: a `Date` line when a timestamp is known, then
/// an `Original reporter` line (profile link only when the author maps to
/// a GitHub login).
///
/// Applied after [`to_markdown`] so the header is never subject to the
/// body rewrites.
#[must_use]
pub fn with_provenance(
    body: &str,
    author: &str,
    profile_url: Option<&str>,
    ts_us: Option<i64>,
) -> String {
    let mut out = String::new();

    if let Some(ts) = ts_us {
        out.push_str("**Date:** ");
        out.push_str(&micros_to_rfc3339(ts));
        out.push_str("\n\n");
    }

    match profile_url {
        Some(url) => {
            out.push_str(&format!("**Original reporter:** [{author}]({url})\n\n"));
        }
        None => {
            out.push_str(&format!("**Original reporter:** {author}\n\n"));
        }
    }

    out.push_str(body);
    out
}
