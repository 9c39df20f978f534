//! Wildcard pattern matching over tab addresses.
//!
//! A pattern like `*.example.com/admin*` is compiled to a case-insensitive
//! regex and searched (unanchored) against two subjects derived from the
//! address: the hostname alone, and hostname + path + query. The unanchored
//! search is deliberate: a bare `example.com` pattern also matches
//! `www.example.com` without any special-casing of the address side.
//!
//! Everything here is pure and fails closed: an address that does not parse
//! as a URL, or a pattern that does not compile, simply does not match.
//! One bad input must never take down a reconciliation pass.

use regex::{Regex, RegexBuilder};
use tracing::debug;
use url::Url;

/// True when `pattern` matches the address's hostname or its
/// hostname + path + query.
pub fn matches(address: &str, pattern: &str) -> bool {
    let Ok(url) = Url::parse(address) else {
        debug!(address, "address is not a parseable URL; treating as no match");
        return false;
    };
    let Some(regex) = compile_pattern(pattern) else {
        debug!(pattern, "pattern did not compile; treating as no match");
        return false;
    };

    let host = url.host_str().unwrap_or("");
    let mut target = format!("{host}{}", url.path());
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    regex.is_match(host) || regex.is_match(&target)
}

/// Compile a wildcard pattern into its regex form.
///
/// Normalization: drop one leading `http://`/`https://`, drop one leading
/// `www.`, escape literal dots, then expand `*` into `.*`. Dots are escaped
/// before the wildcard expansion so the `.` introduced by `.*` stays a
/// metacharacter. Returns `None` when the remaining text is not a valid
/// regex.
pub fn compile_pattern(pattern: &str) -> Option<Regex> {
    let p = pattern
        .strip_prefix("https://")
        .or_else(|| pattern.strip_prefix("http://"))
        .unwrap_or(pattern);
    let p = p.strip_prefix("www.").unwrap_or(p);
    let p = p.replace('.', "\\.").replace('*', ".*");

    RegexBuilder::new(&p).case_insensitive(true).build().ok()
}
