use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use crate::normalizer::Corpus;


/// Token table of a corpus, most frequent first.
///
/// The index of a token is the row of its vector in a model trained on this
/// vocabulary. Ties in frequency are ordered by token so that the same corpus
/// always yields the same indices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, usize)>", into = "Vec<(String, usize)>")]
pub struct Vocabulary {
    entries: Vec<(String, usize)>,
    t2i: HashMap<String, usize>,
}

impl Vocabulary {

    pub fn count_tokens(corpus: &Corpus) -> HashMap<String, usize> {
        let mut token2count: HashMap<String, usize> = HashMap::new();
        for tok in corpus.tokens() {
            *token2count.entry(tok.to_owned()).or_insert(0) += 1;
        }
        token2count
    }

    /// Keeps tokens seen at least `min_token_frequency` times, optionally only the
    /// `max_size` most frequent of those.
    pub fn build(corpus: &Corpus, min_token_frequency: usize, max_size: Option<usize>) -> Vocabulary {

        let token2count = Vocabulary::count_tokens(corpus);
        let n_unique = token2count.len();

        let mut entries: Vec<(String, usize)> = token2count
        .into_iter()
        .filter(|(_, count)| *count >= min_token_frequency)
        .collect();
        entries.sort_by(|(t1, c1), (t2, c2)| c2.cmp(c1).then_with(|| t1.cmp(t2)));
        if let Some(max_size) = max_size {
            entries.truncate(max_size);
        }

        tracing::info!("vocabulary keeps {} of {} unique tokens (min frequency {})", entries.len(), n_unique, min_token_frequency);
        Vocabulary::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<(String, usize)>) -> Vocabulary {
        let t2i = entries
        .iter()
        .enumerate()
        .map(|(i, (t, _))| (t.to_owned(), i))
        .collect();
        Self { entries, t2i }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index_of(&self, token: &str) -> Option<usize> {
        self.t2i.get(token).copied()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.t2i.contains_key(token)
    }

    pub fn token(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(t, _)| t.as_str())
    }

    pub fn count(&self, token: &str) -> Option<usize> {
        self.index_of(token).map(|i| self.entries[i].1)
    }

    pub fn entries(&self) -> &[(String, usize)] {
        &self.entries
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }
}

impl From<Vec<(String, usize)>> for Vocabulary {
    fn from(entries: Vec<(String, usize)>) -> Self {
        Vocabulary::from_entries(entries)
    }
}

impl From<Vocabulary> for Vec<(String, usize)> {
    fn from(vocabulary: Vocabulary) -> Self {
        vocabulary.entries
    }
}
