//! Property tests for similarity ranking bounds

use proptest::prelude::*;
use rca_domain::RcaId;
use rca_similarity::{CorpusDocument, IndexConfig, SimilarityIndex};
use ulid::Ulid;

const WORDS: &[&str] = &[
    "pump", "seal", "failure", "line", "gateway", "timeout", "latency", "config", "drift", "belt",
    "sensor", "firmware", "retry", "valve", "leak",
];

fn sentence() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS), 0..8).prop_map(|words| words.join(" "))
}

proptest! {
    #[test]
    fn prop_scores_bounded_sorted_and_truncated(
        texts in prop::collection::vec(sentence(), 0..8),
        query in sentence(),
        top_k in 0usize..10,
        bigrams in any::<bool>(),
    ) {
        let config = IndexConfig { remove_stop_words: true, include_bigrams: bigrams };
        let corpus = texts
            .iter()
            .enumerate()
            .map(|(i, text)| CorpusDocument::new(RcaId(Ulid::from_parts(i as u64 + 1, 0)), text.clone()));
        let index = SimilarityIndex::build(config, corpus);
        let matches = index.find_similar(&query, top_k);

        prop_assert!(matches.len() <= top_k);
        prop_assert!(matches.len() <= texts.len());
        for m in &matches {
            prop_assert!((0.0..=1.0).contains(&m.score));
        }
        for pair in matches.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
            if pair[0].score == pair[1].score {
                prop_assert!(pair[0].rca_id > pair[1].rca_id);
            }
        }
        if query.trim().is_empty() {
            prop_assert!(matches.is_empty());
        }
    }
}
