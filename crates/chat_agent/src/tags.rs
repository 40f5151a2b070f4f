//! Tag extraction over semi-structured model output.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock};

use regex::Regex;

/// Every substring strictly between `<tag>` and `</tag>`, in source order.
///
/// Matching is non-greedy and spans newlines. No match yields an empty vector;
/// callers that need a value decide how to fail.
pub fn extract_tags(tag: &str, source: &str, trim: bool) -> Vec<String> {
    let Some(regex) = tag_pattern(tag) else {
        return Vec::new();
    };

    regex
        .captures_iter(source)
        .filter_map(|captures| captures.get(1))
        .map(|found| {
            if trim {
                found.as_str().trim().to_string()
            } else {
                found.as_str().to_string()
            }
        })
        .collect()
}

/// Compiled pattern for `tag`, built once per tag name.
///
/// Tag names come from the markup constants and the registry's parameter
/// names, so the cache stays small.
fn tag_pattern(tag: &str) -> Option<Regex> {
    static PATTERNS: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();
    let mut patterns = lock_unpoisoned(PATTERNS.get_or_init(|| Mutex::new(HashMap::new())));
    if let Some(regex) = patterns.get(tag) {
        return Some(regex.clone());
    }

    let pattern = format!(r"(?s)<{0}>(.*?)</{0}>", regex::escape(tag));
    match Regex::new(&pattern) {
        Ok(regex) => {
            patterns.insert(tag.to_string(), regex.clone());
            Some(regex)
        }
        Err(error) => {
            tracing::warn!(%error, tag, "tag pattern failed to compile");
            None
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// First match of `tag`, if any.
pub fn extract_first(tag: &str, source: &str, trim: bool) -> Option<String> {
    extract_tags(tag, source, trim).into_iter().next()
}

/// Drop exactly one leading and one trailing newline, which the model adds as layout.
pub fn strip_layout_newlines(value: &str) -> &str {
    let value = value
        .strip_prefix("\r\n")
        .or_else(|| value.strip_prefix('\n'))
        .unwrap_or(value);
    value
        .strip_suffix("\r\n")
        .or_else(|| value.strip_suffix('\n'))
        .unwrap_or(value)
}
