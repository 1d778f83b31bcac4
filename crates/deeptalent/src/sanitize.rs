//! Helpers for keeping candidate PII out of logs and span attributes, and
//! for turning free-form names into safe blob key segments.

use std::sync::LazyLock;

use regex::Regex;

static RE_DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4,}").unwrap());

/// Masks every run of four or more digits (national IDs, phone numbers),
/// keeping the last two digits for correlation.
///
/// `"cedula 1020304050"` → `"cedula ********50"`
pub fn redact_digits(text: &str) -> String {
    RE_DIGIT_RUN
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let run = &caps[0];
            let keep = &run[run.len() - 2..];
            format!("{}{}", "*".repeat(run.len() - 2), keep)
        })
        .into_owned()
}

/// Drops the query string and userinfo from a URL.
///
/// - `https://user:pw@host/a?token=x` → `https://host/a`
pub fn redact_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);

    if let Some(scheme_end) = without_query.find("://") {
        let after_scheme = &without_query[scheme_end + 3..];
        let host_end = after_scheme.find('/').unwrap_or(after_scheme.len());
        if let Some(at_pos) = after_scheme[..host_end].rfind('@') {
            return format!(
                "{}{}",
                &without_query[..scheme_end + 3],
                &after_scheme[at_pos + 1..]
            );
        }
    }

    without_query.to_string()
}

/// Turns an owner (company) name into a lowercase, dash-separated key
/// segment. Falls back to `"unknown"` for names with no usable characters.
pub fn key_segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        let c = fold_accent(c);
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }

    if out.is_empty() {
        "unknown".to_string()
    } else {
        out
    }
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => 'a',
        'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'u',
        'ñ' | 'Ñ' => 'n',
        other => other,
    }
}
