use std::collections::BTreeMap;
use std::iter;

use once_cell::sync::Lazy;
use regex::Regex;

use super::SimilarityScorer;

/// Words of two or more word characters
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"));

// Ordered maps keep floating-point accumulation order fixed, so equal inputs
// always produce bit-identical scores and ties break the same way every run.
type TermWeights<'a> = BTreeMap<&'a str, f64>;

/// Bag-of-words TF-IDF vectors compared by cosine similarity
///
/// The vocabulary is rebuilt from the candidates and the query on every call;
/// nothing is persisted between calls.
#[derive(Debug, Clone, Default)]
pub struct TfIdfScorer;

impl TfIdfScorer {
    pub fn new() -> Self {
        Self
    }

    fn term_counts(text: &str) -> BTreeMap<String, f64> {
        let mut counts = BTreeMap::new();

        for token in TOKEN_PATTERN.find_iter(&text.to_lowercase()) {
            *counts.entry(token.as_str().to_string()).or_insert(0.0) += 1.0;
        }

        counts
    }

    /// Smoothed inverse document frequency: ln((1 + n) / (1 + df)) + 1
    fn inverse_document_frequencies<'a>(
        documents: impl Iterator<Item = &'a BTreeMap<String, f64>>,
    ) -> TermWeights<'a> {
        let mut document_frequency: BTreeMap<&str, f64> = BTreeMap::new();
        let mut n = 0.0;

        for counts in documents {
            n += 1.0;
            for term in counts.keys() {
                *document_frequency.entry(term.as_str()).or_insert(0.0) += 1.0;
            }
        }

        document_frequency
            .into_iter()
            .map(|(term, df)| (term, ((1.0 + n) / (1.0 + df)).ln() + 1.0))
            .collect()
    }

    /// TF-IDF weights scaled to unit length; empty when the text has no terms
    fn unit_vector<'a>(
        counts: &'a BTreeMap<String, f64>,
        idf: &TermWeights<'_>,
    ) -> TermWeights<'a> {
        let weights: TermWeights<'a> = counts
            .iter()
            .map(|(term, count)| {
                let weight = count * idf.get(term.as_str()).copied().unwrap_or(1.0);
                (term.as_str(), weight)
            })
            .collect();

        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();

        if norm == 0.0 {
            return TermWeights::new();
        }

        weights.into_iter().map(|(term, w)| (term, w / norm)).collect()
    }

    fn cosine(a: &TermWeights<'_>, b: &TermWeights<'_>) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let dot: f64 = a
            .iter()
            .filter_map(|(term, wa)| b.get(term).map(|wb| wa * wb))
            .sum();

        // An empty sum is -0.0
        if dot <= 0.0 { 0.0 } else { dot.min(1.0) }
    }
}

impl SimilarityScorer for TfIdfScorer {
    fn score(&self, query: &str, candidates: &[&str]) -> Vec<f64> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let candidate_counts: Vec<BTreeMap<String, f64>> = candidates
            .iter()
            .map(|candidate| Self::term_counts(candidate))
            .collect();
        let query_counts = Self::term_counts(query);

        let idf = Self::inverse_document_frequencies(
            candidate_counts.iter().chain(iter::once(&query_counts)),
        );
        let query_vector = Self::unit_vector(&query_counts, &idf);

        candidates
            .iter()
            .zip(&candidate_counts)
            .map(|(candidate, counts)| {
                if *candidate == query {
                    return 1.0;
                }

                Self::cosine(&Self::unit_vector(counts, &idf), &query_vector)
            })
            .collect()
    }
}
