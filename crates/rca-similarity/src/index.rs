//! tf-idf vector space and cosine ranking
//!
//! - `tf(t, d) = count(t in d) / |d|`
//! - `idf(t) = ln(N / df(t))`; terms absent from the corpus weigh zero
//! - score = cosine(query, document), ties broken by newer RCA id first

use crate::tokenize::tokenize;
use rca_domain::RcaId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Tokenization options shared by corpus and query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Drop English stop words
    pub remove_stop_words: bool,
    /// Add adjacent-term bigrams
    pub include_bigrams: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            remove_stop_words: true,
            include_bigrams: false,
        }
    }
}

/// One RCA's narrative text as fed to the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusDocument {
    /// RCA the text belongs to
    pub rca_id: RcaId,
    /// Narrative text
    pub text: String,
}

impl CorpusDocument {
    /// Create document
    #[inline]
    #[must_use]
    pub fn new(rca_id: RcaId, text: impl Into<String>) -> Self {
        Self {
            rca_id,
            text: text.into(),
        }
    }
}

/// Ranked query result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarMatch {
    /// Matching RCA
    pub rca_id: RcaId,
    /// Cosine similarity in `[0, 1]`
    pub score: f64,
}

/// Sparse tf-idf vector of one document
#[derive(Debug, Clone)]
struct DocumentVector {
    rca_id: RcaId,
    weights: BTreeMap<String, f64>,
    norm: f64,
}

/// Immutable tf-idf index over a corpus snapshot
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    config: IndexConfig,
    idf: HashMap<String, f64>,
    documents: Vec<DocumentVector>,
}

/// Relative term frequencies of a token list
#[allow(clippy::cast_precision_loss)]
fn term_frequencies(tokens: &[String]) -> HashMap<String, f64> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in tokens {
        *counts.entry(token.clone()).or_default() += 1;
    }
    let len = tokens.len() as f64;
    counts
        .into_iter()
        .map(|(term, count)| (term, count as f64 / len))
        .collect()
}

fn norm(weights: &BTreeMap<String, f64>) -> f64 {
    weights.values().map(|w| w * w).sum::<f64>().sqrt()
}

impl SimilarityIndex {
    /// Index over an empty corpus
    #[must_use]
    pub fn empty(config: IndexConfig) -> Self {
        Self {
            config,
            idf: HashMap::new(),
            documents: Vec::new(),
        }
    }

    /// Build the index from a corpus snapshot
    ///
    /// A document id appearing more than once keeps its last text.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn build(config: IndexConfig, corpus: impl IntoIterator<Item = CorpusDocument>) -> Self {
        let mut latest: HashMap<RcaId, String> = HashMap::new();
        for doc in corpus {
            latest.insert(doc.rca_id, doc.text);
        }

        let tokenized: Vec<(RcaId, HashMap<String, f64>)> = latest
            .into_iter()
            .map(|(rca_id, text)| {
                let tokens = tokenize(&text, &config);
                let tf = if tokens.is_empty() {
                    HashMap::new()
                } else {
                    term_frequencies(&tokens)
                };
                (rca_id, tf)
            })
            .collect();

        let mut document_frequency: HashMap<&str, usize> = HashMap::new();
        for (_, tf) in &tokenized {
            for term in tf.keys() {
                *document_frequency.entry(term.as_str()).or_default() += 1;
            }
        }

        let n = tokenized.len() as f64;
        let idf: HashMap<String, f64> = document_frequency
            .into_iter()
            .map(|(term, df)| (term.to_string(), (n / df as f64).ln()))
            .collect();

        let mut documents: Vec<DocumentVector> = tokenized
            .into_iter()
            .map(|(rca_id, tf)| {
                let weights: BTreeMap<String, f64> = tf
                    .into_iter()
                    .map(|(term, freq)| {
                        let weight = freq * idf.get(&term).copied().unwrap_or(0.0);
                        (term, weight)
                    })
                    .filter(|(_, weight)| *weight > 0.0)
                    .collect();
                let norm = norm(&weights);
                DocumentVector {
                    rca_id,
                    weights,
                    norm,
                }
            })
            .collect();
        // newest first, so equal scores already come out in tie-break order
        documents.sort_by(|a, b| b.rca_id.cmp(&a.rca_id));

        tracing::debug!(
            documents = documents.len(),
            vocabulary = idf.len(),
            "similarity index built"
        );

        Self {
            config,
            idf,
            documents,
        }
    }

    /// Tokenization options this index was built with
    #[inline]
    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Number of indexed documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the corpus is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of distinct terms in the corpus
    #[inline]
    #[must_use]
    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    /// Whether an RCA is part of the indexed corpus
    #[must_use]
    pub fn contains(&self, rca_id: RcaId) -> bool {
        self.documents.iter().any(|d| d.rca_id == rca_id)
    }

    /// Inverse document frequency of a term; zero when unseen
    #[must_use]
    pub fn idf(&self, term: &str) -> f64 {
        self.idf.get(term).copied().unwrap_or(0.0)
    }

    /// Query vector under this corpus's idf weights
    fn query_vector(&self, query: &str) -> BTreeMap<String, f64> {
        let tokens = tokenize(query, &self.config);
        if tokens.is_empty() {
            return BTreeMap::new();
        }
        term_frequencies(&tokens)
            .into_iter()
            .map(|(term, freq)| {
                let weight = freq * self.idf(&term);
                (term, weight)
            })
            .filter(|(_, weight)| *weight > 0.0)
            .collect()
    }

    /// Up to `top_k` most similar RCAs, best first
    ///
    /// Empty query text, a query with no indexable terms, an empty corpus or
    /// `top_k == 0` all yield an empty result. Documents sharing no weighted
    /// term with the query still rank, with score zero.
    #[must_use]
    pub fn find_similar(&self, query: &str, top_k: usize) -> Vec<SimilarMatch> {
        if top_k == 0 || self.documents.is_empty() || tokenize(query, &self.config).is_empty() {
            return Vec::new();
        }

        let query_weights = self.query_vector(query);
        let query_norm = norm(&query_weights);

        let mut matches: Vec<SimilarMatch> = self
            .documents
            .iter()
            .map(|doc| SimilarMatch {
                rca_id: doc.rca_id,
                score: cosine(&query_weights, query_norm, doc),
            })
            .collect();

        matches.sort_by(|a, b| match b.score.total_cmp(&a.score) {
            Ordering::Equal => b.rca_id.cmp(&a.rca_id),
            other => other,
        });
        matches.truncate(top_k);
        matches
    }
}

// Ordered maps keep summation order fixed, so identical documents score identically.
fn cosine(query: &BTreeMap<String, f64>, query_norm: f64, doc: &DocumentVector) -> f64 {
    if query_norm == 0.0 || doc.norm == 0.0 {
        return 0.0;
    }
    let dot: f64 = query
        .iter()
        .filter_map(|(term, w)| doc.weights.get(term).map(|other| w * other))
        .sum();
    (dot / (query_norm * doc.norm)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn id(ms: u64) -> RcaId {
        RcaId(Ulid::from_parts(ms, 0))
    }

    fn corpus() -> Vec<CorpusDocument> {
        vec![
            CorpusDocument::new(id(1), "Pump seal failure on line 3, worn mechanical seal"),
            CorpusDocument::new(id(2), "Gateway timeout during high latency calls"),
            CorpusDocument::new(id(3), "Conveyor belt misalignment at packing station"),
            CorpusDocument::new(id(4), "Config drift between UAT and production"),
        ]
    }

    #[test]
    fn empty_query_or_corpus_yields_nothing() {
        let index = SimilarityIndex::build(IndexConfig::default(), corpus());
        assert!(index.find_similar("", 5).is_empty());
        assert!(index.find_similar("   ", 5).is_empty());
        assert!(index.find_similar("the of and", 5).is_empty());

        let empty = SimilarityIndex::empty(IndexConfig::default());
        assert!(empty.find_similar("pump seal", 5).is_empty());
        assert!(empty.is_empty());
    }

    #[test]
    fn zero_top_k_yields_nothing() {
        let index = SimilarityIndex::build(IndexConfig::default(), corpus());
        assert!(index.find_similar("pump seal", 0).is_empty());
    }

    #[test]
    fn result_is_bounded_by_top_k() {
        let index = SimilarityIndex::build(IndexConfig::default(), corpus());
        assert_eq!(index.find_similar("pump", 2).len(), 2);
        assert_eq!(index.find_similar("pump", 10).len(), 4);
    }

    #[test]
    fn relevant_document_ranks_first() {
        let index = SimilarityIndex::build(IndexConfig::default(), corpus());
        let matches = index.find_similar("seal failure on line 3 pump", 3);
        assert_eq!(matches[0].rca_id, id(1));
        assert!(matches[0].score > 0.0);
        assert!(matches[1].score < matches[0].score);
    }

    #[test]
    fn query_only_terms_weigh_nothing() {
        let index = SimilarityIndex::build(IndexConfig::default(), corpus());
        let matches = index.find_similar("hydraulic compressor", 4);
        assert!(matches.iter().all(|m| m.score == 0.0));
        // all-zero scores come back newest first
        let ids: Vec<RcaId> = matches.iter().map(|m| m.rca_id).collect();
        assert_eq!(ids, vec![id(4), id(3), id(2), id(1)]);
    }

    #[test]
    fn idf_is_log_of_inverse_document_frequency() {
        let index = SimilarityIndex::build(IndexConfig::default(), corpus());
        assert!((index.idf("pump") - 4f64.ln()).abs() < 1e-12);
        assert_eq!(index.idf("nonexistent"), 0.0);
    }

    #[test]
    fn self_similarity_is_maximal() {
        let docs = corpus();
        let index = SimilarityIndex::build(IndexConfig::default(), docs.clone());
        for doc in &docs {
            let matches = index.find_similar(&doc.text, docs.len());
            let own = matches.iter().find(|m| m.rca_id == doc.rca_id).unwrap();
            assert!((own.score - 1.0).abs() < 1e-9);
            assert!(matches.iter().all(|m| m.score <= own.score));
        }
    }

    #[test]
    fn duplicate_narratives_tie_newest_first() {
        let mut docs = corpus();
        docs.push(CorpusDocument::new(id(9), "Pump seal failure on line 3, worn mechanical seal"));
        let index = SimilarityIndex::build(IndexConfig::default(), docs);

        let matches = index.find_similar("Pump seal failure on line 3, worn mechanical seal", 2);
        assert_eq!(matches[0].rca_id, id(9));
        assert_eq!(matches[1].rca_id, id(1));
        assert_eq!(matches[0].score, matches[1].score);
    }

    #[test]
    fn reinserting_the_same_document_is_idempotent() {
        let once = SimilarityIndex::build(IndexConfig::default(), corpus());
        let mut twice_docs = corpus();
        twice_docs.extend(corpus());
        let twice = SimilarityIndex::build(IndexConfig::default(), twice_docs);

        assert_eq!(once.len(), twice.len());
        assert_eq!(
            once.find_similar("gateway timeout", 4),
            twice.find_similar("gateway timeout", 4)
        );
    }

    #[test]
    fn last_text_wins_for_repeated_id() {
        let index = SimilarityIndex::build(
            IndexConfig::default(),
            vec![
                CorpusDocument::new(id(1), "gateway timeout"),
                CorpusDocument::new(id(2), "belt misalignment"),
                CorpusDocument::new(id(1), "pump seal failure"),
            ],
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.find_similar("pump seal", 1)[0].rca_id, id(1));
        assert_eq!(index.idf("gateway"), 0.0);
    }
}
