use std::collections::{BTreeMap, HashSet};
use regex::{Captures, Regex};
use crate::error::{EmbeddingError, Result};
use crate::loader::RawCorpus;

/// Characters removed from every sentence regardless of configuration.
pub const ASCII_PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Typographic quotation marks, the default extra set.
pub const DEFAULT_SPECIAL_CHARACTERS: &str = "\u{201C}\u{201D}\u{2018}\u{2019}";

const SENTENCE_DELIMITERS: &str = "[.?!]";

pub fn default_abbreviations() -> BTreeMap<String, String> {
    [("Mr.", "Mr"), ("Mrs.", "Mrs"), ("Ms.", "Ms"), ("Dr.", "Dr"), ("St.", "St")]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub type Sentence = Vec<String>;


/// Sentences of lowercase tokens in source order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Corpus {
    sentences: Vec<Sentence>,
}

impl Corpus {

    pub fn new(sentences: Vec<Sentence>) -> Self {
        Self { sentences }
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.sentences.iter().map(|s| s.len()).sum()
    }

    pub fn empty_sentences(&self) -> usize {
        self.sentences.iter().filter(|s| s.is_empty()).count()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.sentences.iter().flatten().map(|t| t.as_str())
    }

    /// Copy of the corpus without the sentences that carry no tokens.
    pub fn without_empty(&self) -> Corpus {
        Corpus::new(self.sentences.iter().filter(|s| !s.is_empty()).cloned().collect())
    }
}


/// Turns raw text into sentences of lowercase word tokens.
///
/// Steps, in order: header strip, abbreviation normalisation, line breaks to
/// spaces, split at `.`/`?`/`!`, lowercase and drop punctuation, trim, split on
/// whitespace. Empty sentences are kept.
pub struct Normalizer {
    header_skip_offset: usize,
    abbreviations: BTreeMap<String, String>,
    abbreviation_re: Option<Regex>,
    delimiters: Regex,
    removed: HashSet<char>,
}

impl Normalizer {

    pub fn new(header_skip_offset: usize, abbreviations: BTreeMap<String, String>, special_characters: &str) -> Result<Normalizer> {

        let abbreviation_re = Normalizer::abbreviation_regex(&abbreviations)?;
        let delimiters = Regex::new(SENTENCE_DELIMITERS)
        .map_err(|e| EmbeddingError::Config(e.to_string()))?;
        let removed = ASCII_PUNCTUATION.chars().chain(special_characters.chars()).collect();

        Ok(Self {
            header_skip_offset,
            abbreviations,
            abbreviation_re,
            delimiters,
            removed,
        })
    }

    // an abbreviation only matches at a word start and when followed by whitespace or the end of
    // text, so the replaced form can never be matched again
    fn abbreviation_regex(abbreviations: &BTreeMap<String, String>) -> Result<Option<Regex>> {

        let mut keys: Vec<&String> = abbreviations.keys().filter(|k| !k.is_empty()).collect();
        if keys.is_empty() {
            return Ok(None);
        }
        keys.sort_by_key(|k| std::cmp::Reverse(k.chars().count()));

        let alternatives = keys
        .iter()
        .map(|k| {
            let starts_with_word = k.chars().next().map_or(false, |c| c.is_alphanumeric() || c == '_');
            if starts_with_word { format!(r"\b{}", regex::escape(k)) } else { regex::escape(k) }
        })
        .collect::<Vec<String>>()
        .join("|");

        Regex::new(&format!(r"({})(\s|$)", alternatives))
        .map(Some)
        .map_err(|e| EmbeddingError::Config(format!("bad abbreviation table: {}", e)))
    }

    pub fn strip_header<'a>(&self, text: &'a str) -> &'a str {
        match text.char_indices().nth(self.header_skip_offset) {
            Some((byte_offset, _)) => &text[byte_offset..],
            None => "",
        }
    }

    pub fn normalize_abbreviations(&self, text: &str) -> String {
        match &self.abbreviation_re {
            Some(re) => re.replace_all(text, |caps: &Captures| {
                let replacement = self.abbreviations.get(&caps[1]).map_or(&caps[1], |v| v.as_str());
                let tail = caps.get(2).map_or("", |m| m.as_str());
                format!("{}{}", replacement, tail)
            }).into_owned(),
            None => text.to_string(),
        }
    }

    pub fn normalize_line_breaks(text: &str) -> String {
        text.replace("\r\n", " ").replace(['\n', '\r'], " ")
    }

    pub fn split_sentences<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.delimiters.split(text).collect()
    }

    /// Lowercases, drops punctuation and special characters, trims.
    pub fn clean_sentence(&self, sentence: &str) -> String {
        sentence
        .to_lowercase()
        .chars()
        .filter(|c| !self.removed.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
    }

    pub fn tokenize(sentence: &str) -> Sentence {
        sentence.split_whitespace().map(|t| t.to_string()).collect()
    }

    pub fn normalize_text(&self, text: &str) -> Corpus {

        let body = self.strip_header(text);
        if body.is_empty() {
            return Corpus::default();
        }

        let body = Normalizer::normalize_line_breaks(&self.normalize_abbreviations(body));
        let sentences = self
        .split_sentences(&body)
        .into_iter()
        .map(|raw| Normalizer::tokenize(&self.clean_sentence(raw)))
        .collect();

        Corpus::new(sentences)
    }

    pub fn normalize(&self, raw: &RawCorpus) -> Corpus {
        let corpus = self.normalize_text(raw.as_str());
        tracing::info!("normalized {} chars into {} sentences ({} empty), {} tokens",
            raw.char_len(), corpus.len(), corpus.empty_sentences(), corpus.token_count());
        corpus
    }
}


#[cfg(test)]
mod tests {

    use super::{Normalizer, Corpus, default_abbreviations, ASCII_PUNCTUATION, DEFAULT_SPECIAL_CHARACTERS};

    const SAMPLES: [&str; 8] = [
        "Mrs. Jones met Mr. Smith. They talked!",
        "\u{201C}Is it you?\u{201D} she asked, \u{2018}quietly\u{2019}.",
        "It was the best of times,\r\nit was the worst of times...",
        "ÉMILE and Zoë went to St. Petersburg; Dr. Who didn't!",
        "!!!???...",
        "   ",
        "Mrs.. Mr.Mr. end Mr.",
        "no delimiters at all",
    ];

    fn normalizer(offset: usize) -> Normalizer {
        Normalizer::new(offset, default_abbreviations(), DEFAULT_SPECIAL_CHARACTERS).unwrap()
    }

    fn sentences(raw: &[&[&str]]) -> Corpus {
        Corpus::new(raw.iter().map(|s| s.iter().map(|t| t.to_string()).collect()).collect())
    }

    #[test]
    fn worked_example() {

        let n = normalizer(0);
        let text = "Mrs. Jones met Mr. Smith. They talked!";

        let abbreviated = n.normalize_abbreviations(text);
        assert_eq!(abbreviated, "Mrs Jones met Mr Smith. They talked!");
        assert_eq!(n.split_sentences(&abbreviated), vec!["Mrs Jones met Mr Smith", " They talked", ""]);

        let expected = sentences(&[&["mrs", "jones", "met", "mr", "smith"], &["they", "talked"], &[]]);
        assert_eq!(n.normalize_text(text), expected);
    }

    #[test]
    fn abbreviation_normalisation_is_idempotent() {
        let n = normalizer(0);
        for text in SAMPLES {
            let once = n.normalize_abbreviations(text);
            assert_eq!(n.normalize_abbreviations(&once), once, "input: {:?}", text);
        }
    }

    #[test]
    fn abbreviation_needs_word_start_and_trailing_space() {
        let n = normalizer(0);
        assert_eq!(n.normalize_abbreviations("HMr. x"), "HMr. x");
        assert_eq!(n.normalize_abbreviations("Mr.Smith"), "Mr.Smith");
        assert_eq!(n.normalize_abbreviations("ask Dr."), "ask Dr");
    }

    #[test]
    fn tokens_are_lowercase_without_punctuation() {

        let n = normalizer(0);
        for text in SAMPLES {
            for token in n.normalize_text(text).tokens() {
                assert!(!token.is_empty());
                assert_eq!(token, token.to_lowercase());
                assert!(!token.chars().any(|c| ASCII_PUNCTUATION.contains(c) || DEFAULT_SPECIAL_CHARACTERS.contains(c)),
                    "token {:?} from {:?}", token, text);
            }
        }
    }

    #[test]
    fn sentence_count_is_bounded_by_delimiters() {

        let n = normalizer(0);
        for text in SAMPLES {
            let abbreviated = n.normalize_abbreviations(text);
            let delimiters = abbreviated.chars().filter(|c| matches!(c, '.' | '?' | '!')).count();
            let sentences = n.normalize_text(text).len();
            assert!(sentences <= delimiters + 1, "input: {:?}", text);

            let adjacent = abbreviated.chars().zip(abbreviated.chars().skip(1))
                .any(|(a, b)| matches!(a, '.' | '?' | '!') && matches!(b, '.' | '?' | '!'));
            if !text.is_empty() && !adjacent {
                assert_eq!(sentences, delimiters + 1, "input: {:?}", text);
            }
        }
        assert_eq!(n.normalize_text("One. Two? Three").len(), 3);
    }

    #[test]
    fn retokenizing_joined_tokens_is_stable() {

        let n = normalizer(0);
        for text in SAMPLES {
            let corpus = n.normalize_text(text);
            let tokens: Vec<&str> = corpus.tokens().collect();
            let joined = tokens.join(" ");
            let again = n.normalize_text(&joined);
            assert_eq!(again.tokens().collect::<Vec<_>>(), tokens, "input: {:?}", text);
        }
    }

    #[test]
    fn header_is_skipped_by_characters() {

        let n = normalizer(4);
        assert_eq!(n.strip_header("ÀÉÎÕbody"), "body");
        assert_eq!(n.normalize_text("HEADHello there."), sentences(&[&["hello", "there"], &[]]));
        assert!(n.normalize_text("abc").is_empty());
    }

    #[test]
    fn line_breaks_and_quotes() {

        let n = normalizer(0);
        let text = "\u{201C}Good\r\nmorning,\u{201D} said\nthe\rclerk.";
        assert_eq!(n.normalize_text(text), sentences(&[&["good", "morning", "said", "the", "clerk"], &[]]));
    }

    #[test]
    fn custom_special_characters() {

        let n = Normalizer::new(0, Default::default(), "—").unwrap();
        assert_eq!(n.normalize_text("yes—no"), sentences(&[&["yesno"]]));
        assert_eq!(n.normalize_text("Mr. X"), sentences(&[&["mr"], &["x"]]));
    }

    #[test]
    fn empty_input_gives_empty_corpus() {
        let n = normalizer(0);
        assert!(n.normalize_text("").is_empty());
        assert_eq!(n.normalize_text(".."), sentences(&[&[], &[], &[]]));
        assert_eq!(n.normalize_text("..").without_empty(), Corpus::default());
    }
}
