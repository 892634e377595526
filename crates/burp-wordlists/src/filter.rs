//! Parameter name normalization and noise filtering.
//!
//! Names carrying quotes, angle brackets, parentheses and similar
//! punctuation are almost always injected payloads or junk rather than real
//! application parameters, so they never reach a wordlist.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Characters that mark a parameter name as noise.
static PARAM_NOISE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"\-<>()/]"#).unwrap());

/// Stricter set for controller/method style tokens.
static STRICT_NOISE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['"\-<>()/.&$=%]"#).unwrap());

/// Collapse array-style names: `a[0]`, `a[foo]` and `a[]` all become `a[]`.
pub fn simplify(name: &str) -> String {
    match name.find('[') {
        Some(idx) => format!("{}[]", &name[..idx]),
        None => name.to_string(),
    }
}

/// Check whether a name looks like noise.
///
/// `strict` selects the controller/method pattern, which additionally
/// rejects `. & $ = %`.
pub fn is_noise(name: &str, strict: bool) -> bool {
    if strict {
        STRICT_NOISE_RE.is_match(name)
    } else {
        PARAM_NOISE_RE.is_match(name)
    }
}

/// Insert the simplified form of `name` into `destination` unless it is noise.
///
/// Returns `true` if the name was accepted. An empty name is not noise.
pub fn accept(name: &str, destination: &mut BTreeSet<String>) -> bool {
    if is_noise(name, false) {
        return false;
    }
    destination.insert(simplify(name));
    true
}

/// Underscore-delimited prefix of a name, if it has one and is not array-style.
pub fn prefix_of(name: &str) -> Option<&str> {
    if name.contains('[') {
        return None;
    }
    name.split_once('_').map(|(prefix, _)| prefix)
}
