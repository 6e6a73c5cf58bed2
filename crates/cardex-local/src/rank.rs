//! Top-k selection over the catalog.
//!
//! Ranking is deterministic for a fixed snapshot and query: candidates are
//! filtered to plausible matches, sorted by score descending, and ties break
//! on the corpus iteration order (the catalog iterates sorted by name).
//! The empty-query sentinel bypasses ranking entirely and takes a uniform
//! random sample instead, so callers must not expect determinism there.

use crate::score::{MatchScore, Scorer};
use cardex_core::CardRecord;
use rand::seq::IteratorRandom;

/// Top-k plausible matches for `query`, best first, at most `k` records.
pub fn rank<'a, I>(scorer: &Scorer, query: &str, corpus: I, k: usize) -> Vec<CardRecord>
where
    I: IntoIterator<Item = &'a CardRecord>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(MatchScore, usize, &CardRecord)> = corpus
        .into_iter()
        .enumerate()
        .filter(|(_, rec)| scorer.is_match(query, &rec.name))
        .map(|(idx, rec)| (scorer.score(query, &rec.name), idx, rec))
        .collect();

    // Stable order: score desc, then corpus position asc.
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.truncate(k);
    scored.into_iter().map(|(_, _, rec)| rec.clone()).collect()
}

/// Uniform random sample without replacement, used for the empty-query
/// sentinel. Returns fewer than `k` records only when the corpus is smaller
/// than `k`.
pub fn sample<'a, I>(corpus: I, k: usize) -> Vec<CardRecord>
where
    I: IntoIterator<Item = &'a CardRecord>,
{
    let mut rng = rand::thread_rng();
    corpus
        .into_iter()
        .choose_multiple(&mut rng, k)
        .into_iter()
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn card(id: &str, name: &str) -> CardRecord {
        CardRecord {
            id: id.to_string(),
            name: name.to_string(),
            image_url: format!("https://img.example/{id}.png"),
            set_code: "TST".to_string(),
            release_date: "2015-01-23".to_string(),
        }
    }

    fn corpus() -> Vec<CardRecord> {
        vec![
            card("c1", "Lightning Bolt"),
            card("c2", "Bolt of Keranos"),
            card("c3", "Shock"),
            card("c4", "Lightning Strike"),
        ]
    }

    #[test]
    fn bolt_containing_cards_rank_above_non_matches() {
        let corpus = corpus();
        let scorer = Scorer::default();
        let out = rank(&scorer, "bolt", corpus.iter(), 8);
        let names: Vec<&str> = out.iter().map(|r| r.name.as_str()).collect();
        // Prefix hit outranks the infix hit; Shock fails the plausibility
        // filter and never appears.
        assert_eq!(names, vec!["Bolt of Keranos", "Lightning Bolt"]);
    }

    #[test]
    fn rank_is_deterministic_and_bounded() {
        let corpus = corpus();
        let scorer = Scorer::default();
        let a = rank(&scorer, "lightning", corpus.iter(), 1);
        let b = rank(&scorer, "lightning", corpus.iter(), 1);
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn rank_returns_everything_when_fewer_than_k_match() {
        let corpus = corpus();
        let scorer = Scorer::default();
        let out = rank(&scorer, "keranos", corpus.iter(), 8);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Bolt of Keranos");
    }

    #[test]
    fn ties_break_on_corpus_order() {
        // Two identically named records never happen in a catalog, but equal
        // scores do; corpus position must decide, stably.
        let corpus = vec![card("a", "Giant Growth"), card("b", "Giant Growth")];
        let scorer = Scorer::default();
        let out = rank(&scorer, "giant", corpus.iter(), 2);
        assert_eq!(out[0].id, "a");
        assert_eq!(out[1].id, "b");
    }

    #[test]
    fn zero_k_yields_nothing() {
        let corpus = corpus();
        let scorer = Scorer::default();
        assert!(rank(&scorer, "bolt", corpus.iter(), 0).is_empty());
    }

    #[test]
    fn sample_returns_k_distinct_records() {
        let corpus: Vec<CardRecord> = (0..1000)
            .map(|i| card(&format!("c{i}"), &format!("Card Number {i}")))
            .collect();
        let out = sample(corpus.iter(), 8);
        assert_eq!(out.len(), 8);
        let ids: BTreeSet<&str> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn sample_of_small_corpus_returns_all() {
        let corpus = corpus();
        let out = sample(corpus.iter(), 8);
        assert_eq!(out.len(), 4);
    }
}
