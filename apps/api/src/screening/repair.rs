//! Best-effort syntax repair for near-JSON model output.
//!
//! Each rule is a pure `&str -> String` transformation, applied in the order of
//! `REPAIR_RULES`. Rules that could damage string contents only touch text
//! outside double-quoted strings.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

pub type RepairRule = fn(&str) -> String;

/// Repair rules, in application order.
pub const REPAIR_RULES: &[(&str, RepairRule)] = &[
    ("strip_trailing_commas", strip_trailing_commas),
    ("single_to_double_quotes", single_to_double_quotes),
    ("collapse_newlines", collapse_newlines),
    ("quote_bare_keys", quote_bare_keys),
    ("normalize_value_quotes", normalize_value_quotes),
];

/// Runs every rule over `text`.
pub fn repair_json(text: &str) -> String {
    REPAIR_RULES
        .iter()
        .fold(text.to_string(), |current, (name, rule)| {
            let next = rule(&current);
            if next != current {
                debug!("JSON repair rule '{name}' changed the text");
            }
            next
        })
}

/// `[1, 2,]` → `[1, 2]`, `{"a": 1 ,}` → `{"a": 1 }`.
pub fn strip_trailing_commas(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r",(\s*[\]}])").expect("valid regex"));
    // runs before quote conversion, so single-quoted values are literals too
    map_outside_literals(text, true, |segment| re.replace_all(segment, "$1").into_owned())
}

/// Rewrites single-quoted strings as double-quoted ones, escaping embedded
/// double quotes. A `'` inside a single-quoted string only closes it when the
/// next non-space character could follow a JSON value, so apostrophes survive.
pub fn single_to_double_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_double = false;
    let mut in_single = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_double {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_double = false;
            }
        } else if in_single {
            if escaped {
                if c != '\'' {
                    out.push('\\');
                }
                out.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '\'' && closes_value(&text[i + 1..]) {
                out.push('"');
                in_single = false;
            } else if c == '"' {
                out.push_str("\\\"");
            } else {
                out.push(c);
            }
        } else if c == '"' {
            out.push(c);
            in_double = true;
        } else if c == '\'' {
            out.push('"');
            in_single = true;
        } else {
            out.push(c);
        }
    }
    out
}

fn closes_value(rest: &str) -> bool {
    matches!(
        rest.trim_start().chars().next(),
        None | Some(',' | '}' | ']' | ':')
    )
}

/// Line breaks are illegal inside JSON strings; turn them all into spaces.
pub fn collapse_newlines(text: &str) -> String {
    text.replace("\r\n", " ").replace(&['\n', '\r'][..], " ")
}

/// `{overallScore: 1, ranking: "x"}` → `{"overallScore": 1, "ranking": "x"}`.
pub fn quote_bare_keys(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*):").expect("valid regex")
    });
    map_outside_strings(text, |segment| {
        re.replace_all(segment, "$1\"$2\"$3:").into_owned()
    })
}

/// Typographic double quotes used as delimiters become ASCII quotes, and the
/// gap between a key's colon and a quoted value is tidied to one space.
pub fn normalize_value_quotes(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    // a segment ending in a colon is always followed by a string literal
    let re = RE.get_or_init(|| Regex::new(r":\s+$").expect("valid regex"));
    let ascii = map_outside_strings(text, |segment| {
        segment.replace(&['\u{201C}', '\u{201D}', '\u{201E}', '\u{201F}'][..], "\"")
    });
    map_outside_strings(&ascii, |segment| re.replace(segment, ": ").into_owned())
}

/// Applies `f` to every run of text outside double-quoted strings; string
/// literals (quotes included) are copied through untouched. An unterminated
/// string is copied verbatim to the end.
fn map_outside_strings(text: &str, f: impl FnMut(&str) -> String) -> String {
    map_outside_literals(text, false, f)
}

/// `map_outside_strings`, optionally also treating `'...'` spans as literals.
/// A `'` closes such a span under the same rule `single_to_double_quotes` uses.
fn map_outside_literals(
    text: &str,
    single_quoted: bool,
    mut f: impl FnMut(&str) -> String,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut segment_start = 0;
    let mut open: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        match open {
            Some(quote) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == quote && (quote == '"' || closes_value(&text[i + 1..])) {
                    out.push_str(&text[segment_start..=i]);
                    segment_start = i + 1;
                    open = None;
                }
            }
            None if c == '"' || (single_quoted && c == '\'') => {
                out.push_str(&f(&text[segment_start..i]));
                segment_start = i;
                open = Some(c);
            }
            None => {}
        }
    }

    if open.is_some() {
        out.push_str(&text[segment_start..]);
    } else {
        out.push_str(&f(&text[segment_start..]));
    }
    out
}
