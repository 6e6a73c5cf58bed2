//! Multi-criterion match scoring for (query, card name) pairs.
//!
//! A score is an ordered tuple compared lexicographically: containment first,
//! then shared full words, then a bounded fuzzy term. Containment is the
//! strongest and cheapest signal ("bolt" inside "lightning bolt"); word
//! overlap rewards multi-word queries; the fuzzy term breaks ties for typos
//! and partial names. Keeping the comparison lexicographic stops a noisy
//! fuzzy metric from outranking exact matches.

use crate::textnorm;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

/// Scale for the position-weighted containment criterion: a hit at scrubbed
/// char position `p` scores `CONTAINMENT_SCALE / (p + 1)`.
const CONTAINMENT_SCALE: u32 = 1_000;

/// Upper bound of the fuzzy criterion.
const FUZZY_SCALE: f64 = 1_000.0;

/// Ordered scoring tuple. Field order is priority order; the derived `Ord`
/// compares lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct MatchScore {
    pub containment: u32,
    pub shared_words: u32,
    pub fuzzy: u32,
}

impl MatchScore {
    pub const ZERO: MatchScore = MatchScore {
        containment: 0,
        shared_words: 0,
        fuzzy: 0,
    };
}

/// Which similarity ratio backs the fuzzy criterion.
///
/// The two backends are interchangeable configurations of the same scoring
/// interface, not separate designs: both produce a bounded ratio in `[0, 1]`
/// that is then combined with the subsequence density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FuzzyBackend {
    /// Weighted edit-distance style ratio via `strsim`.
    #[default]
    Ratio,
    /// `SkimMatcherV2` from `fuzzy-matcher`.
    Skim,
}

impl FuzzyBackend {
    pub fn parse(s: &str) -> Option<FuzzyBackend> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ratio" => Some(FuzzyBackend::Ratio),
            "skim" => Some(FuzzyBackend::Skim),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    backend: FuzzyBackend,
}

impl Scorer {
    pub fn new(backend: FuzzyBackend) -> Self {
        Self { backend }
    }

    /// Score a candidate name against a query. Total: zero-length inputs
    /// score as the zero sentinel rather than failing.
    pub fn score(&self, query: &str, name: &str) -> MatchScore {
        let q = textnorm::scrub(query);
        let n = textnorm::scrub(name);
        if q.is_empty() || n.is_empty() {
            return MatchScore::ZERO;
        }

        let containment = match n.find(&q) {
            Some(byte_pos) => {
                let char_pos = n[..byte_pos].chars().count() as u32;
                CONTAINMENT_SCALE / (char_pos + 1)
            }
            None => 0,
        };

        let shared_words = textnorm::tokens(&q)
            .intersection(&textnorm::tokens(&n))
            .count() as u32;

        MatchScore {
            containment,
            shared_words,
            fuzzy: self.fuzzy(&q, &n),
        }
    }

    /// Plausibility test used by the ranker's filter: containment, word
    /// overlap, or an in-order subsequence hit. Candidates failing all three
    /// still get a fallback fuzzy score but are never returned as matches.
    pub fn is_match(&self, query: &str, name: &str) -> bool {
        let q = textnorm::scrub(query);
        let n = textnorm::scrub(name);
        if q.is_empty() || n.is_empty() {
            return false;
        }
        n.contains(&q)
            || textnorm::tokens(&q)
                .intersection(&textnorm::tokens(&n))
                .next()
                .is_some()
            || subsequence_density(&q, &n).is_some()
    }

    /// Bounded fuzzy term in `[0, FUZZY_SCALE]`, combining the backend ratio
    /// with the subsequence density. When no in-order subsequence exists the
    /// ratio is normalized by candidate length instead, so the candidate can
    /// still be ordered as a ranking fallback without competing with real
    /// matches.
    fn fuzzy(&self, q: &str, n: &str) -> u32 {
        let ratio = self.ratio(q, n);
        let scaled = match subsequence_density(q, n) {
            Some(density) => (2.0 * ratio + density) / 3.0,
            None => ratio / n.chars().count().max(1) as f64,
        };
        (scaled * FUZZY_SCALE).round() as u32
    }

    fn ratio(&self, q: &str, n: &str) -> f64 {
        match self.backend {
            FuzzyBackend::Ratio => {
                // Jaro-Winkler favors shared prefixes, which suits partial
                // card names; plain normalized Levenshtein handles typos in
                // full names better. Take the stronger signal.
                strsim::normalized_levenshtein(q, n).max(strsim::jaro_winkler(q, n))
            }
            FuzzyBackend::Skim => {
                let matcher = SkimMatcherV2::default().ignore_case();
                match matcher.fuzzy_match(n, q) {
                    // Skim scores grow with match quality and are unbounded;
                    // squash into [0, 1) on the same scale as the ratios.
                    Some(s) => {
                        let s = s.max(0) as f64;
                        s / (s + 120.0)
                    }
                    None => 0.0,
                }
            }
        }
    }
}

/// Greedy left-to-right subsequence walk (scrubbed inputs).
///
/// Matches each query character at its first occurrence after the previous
/// match. Returns `None` when the name runs out before every query character
/// is placed; otherwise the density `query_chars / span`, which is 1.0 for a
/// prefix match and approaches 0 as the match spreads out.
fn subsequence_density(q: &str, n: &str) -> Option<f64> {
    let mut name_chars = n.chars();
    let mut span = 0usize;
    let mut matched = 0usize;
    for qc in q.chars() {
        loop {
            let nc = name_chars.next()?;
            span += 1;
            if nc == qc {
                break;
            }
        }
        matched += 1;
    }
    if matched == 0 {
        return None;
    }
    Some(matched as f64 / span as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_dominates_fuzzy() {
        let scorer = Scorer::default();
        // "Shock" has no containment for "bolt"; any fuzzy noise must not
        // outrank a real substring hit.
        let bolt = scorer.score("bolt", "Bolt of Keranos");
        let shock = scorer.score("bolt", "Shock");
        assert!(bolt.containment > 0);
        assert_eq!(shock.containment, 0);
        assert!(bolt > shock);
    }

    #[test]
    fn earlier_containment_position_scores_higher() {
        let scorer = Scorer::default();
        let prefix = scorer.score("bolt", "Bolt of Keranos");
        let infix = scorer.score("bolt", "Lightning Bolt");
        assert!(prefix.containment > infix.containment);
    }

    #[test]
    fn shared_words_break_ties_for_reordered_queries() {
        let scorer = Scorer::default();
        let s = scorer.score("bolt lightning", "Lightning Bolt");
        assert_eq!(s.containment, 0);
        assert_eq!(s.shared_words, 2);
        assert!(scorer.is_match("bolt lightning", "Lightning Bolt"));
    }

    #[test]
    fn zero_length_candidate_scores_zero_sentinel() {
        let scorer = Scorer::default();
        assert_eq!(scorer.score("bolt", ""), MatchScore::ZERO);
        assert_eq!(scorer.score("", "Lightning Bolt"), MatchScore::ZERO);
        assert!(!scorer.is_match("bolt", ""));
    }

    #[test]
    fn subsequence_density_rewards_dense_matches() {
        let dense = subsequence_density("bolt", "bolt of keranos").unwrap();
        let sparse = subsequence_density("bolt", "lightning bolt").unwrap();
        assert_eq!(dense, 1.0);
        assert!(sparse < dense);
        assert!(subsequence_density("bolt", "shock").is_none());
    }

    #[test]
    fn non_subsequence_candidates_are_not_matches() {
        let scorer = Scorer::default();
        assert!(!scorer.is_match("bolt", "Shock"));
        // ...but still carry a small length-normalized fallback score.
        let s = scorer.score("bolt", "Shock");
        assert_eq!(s.containment, 0);
        assert_eq!(s.shared_words, 0);
        assert!(s.fuzzy > 0);
        assert!(s.fuzzy < 500);
    }

    #[test]
    fn transposition_typos_still_match_via_subsequence() {
        let scorer = Scorer::default();
        // "shok" walks s-h-o-(c)-k in order, so it stays a plausible match.
        assert!(scorer.is_match("shok", "Shock"));
    }

    #[test]
    fn both_backends_stay_bounded() {
        for backend in [FuzzyBackend::Ratio, FuzzyBackend::Skim] {
            let scorer = Scorer::new(backend);
            let s = scorer.score("lightning bolt", "Lightning Bolt");
            assert!(s.fuzzy <= 1_000, "{backend:?} fuzzy out of bounds: {s:?}");
            assert!(s.fuzzy > 0);
        }
    }

    #[test]
    fn backend_parse_accepts_known_names_only() {
        assert_eq!(FuzzyBackend::parse("ratio"), Some(FuzzyBackend::Ratio));
        assert_eq!(FuzzyBackend::parse(" Skim "), Some(FuzzyBackend::Skim));
        assert_eq!(FuzzyBackend::parse("wratio"), None);
    }
}
