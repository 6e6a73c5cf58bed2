//! Minimal, deterministic text normalization helpers.
//!
//! Everything here is matching-only: scrubbed strings are never shown to
//! users, so the normalization is intentionally lossy.

use std::collections::BTreeSet;

/// Conservative "scrub" used for matching/search keys.
///
/// - lowercase
/// - treat non-alphanumeric as separators (collapse to single spaces)
///
/// Card names carry apostrophes, commas and hyphens ("Gaea's Cradle",
/// "Ach! Hans, Run!"); the strict separator policy keeps those from
/// fragmenting the comparison.
pub fn scrub(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = true;
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            for lc in ch.to_lowercase() {
                out.push(lc);
            }
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Whitespace-delimited token set of the scrubbed input.
pub fn tokens(s: &str) -> BTreeSet<String> {
    scrub(s)
        .split_whitespace()
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrub_lowercases_and_collapses_separators() {
        assert_eq!(scrub("Lightning  Bolt"), "lightning bolt");
        assert_eq!(scrub("Gaea's Cradle"), "gaea s cradle");
        assert_eq!(scrub("  -- Bolt!! "), "bolt");
    }

    #[test]
    fn scrub_is_total_on_empty_and_symbol_only_input() {
        assert_eq!(scrub(""), "");
        assert_eq!(scrub("!!! ---"), "");
    }

    #[test]
    fn tokens_are_a_set() {
        let t = tokens("Bolt, bolt, BOLT of Keranos");
        assert_eq!(
            t.into_iter().collect::<Vec<_>>(),
            vec!["bolt", "keranos", "of"]
        );
    }

    #[test]
    fn tokens_of_empty_input_is_empty() {
        assert!(tokens("").is_empty());
        assert!(tokens("   ").is_empty());
    }
}
