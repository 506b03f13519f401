use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::embedding::{TrainingObjective, TrainingParams};
use crate::error::{EmbeddingError, Result};
use crate::loader::CorpusLoader;
use crate::normalizer::{self, Normalizer};


fn default_file_glob_pattern() -> String { "*.txt".to_string() }
fn default_special_characters() -> String { normalizer::DEFAULT_SPECIAL_CHARACTERS.to_string() }
fn default_neighbors() -> usize { 10 }
fn default_min_token_frequency() -> usize { 5 }
fn default_embedding_dimension() -> usize { 100 }
fn default_training_objective() -> TrainingObjective { TrainingObjective::SkipGram }
fn default_context_window_size() -> usize { 5 }
fn default_training_epochs() -> usize { 5 }
fn default_learning_rate() -> f32 { 0.05 }
fn default_x_max() -> f32 { 100.0 }
fn default_alpha() -> f32 { 0.75 }
fn default_batch_size() -> usize { 64 }
fn default_num_threads() -> usize { 4 }


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_min_token_frequency")]
    pub min_token_frequency: usize,
    #[serde(default)]
    pub max_vocab_size: Option<usize>,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    #[serde(default = "default_training_objective")]
    pub training_objective: TrainingObjective,
    #[serde(default = "default_context_window_size")]
    pub context_window_size: usize,
    #[serde(default = "default_training_epochs")]
    pub training_epochs: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default = "default_x_max")]
    pub x_max: f32,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Display for TrainingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "training hyper parameters:
        min_token_frequency: {},
        max_vocab_size: {:?},
        embedding_dimension: {},
        training_objective: {},
        context_window_size: {},
        training_epochs: {},
        learning_rate: {},
        x_max: {},
        alpha: {},
        batch_size: {},
        num_threads: {},
        seed: {:?}",
        self.min_token_frequency, self.max_vocab_size, self.embedding_dimension, self.training_objective,
        self.context_window_size, self.training_epochs, self.learning_rate, self.x_max, self.alpha,
        self.batch_size, self.num_threads, self.seed
        )
    }
}


/// Everything a pipeline run needs, read from one JSON file.
///
/// Only `data_directory` is required. Training keys sit at the top level of the
/// file next to the corpus keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub data_directory: String,
    #[serde(default = "default_file_glob_pattern")]
    pub file_glob_pattern: String,
    #[serde(default)]
    pub header_skip_offset: usize,
    #[serde(default = "normalizer::default_abbreviations")]
    pub abbreviations: BTreeMap<String, String>,
    #[serde(default = "default_special_characters")]
    pub special_characters: String,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub saved_counts: bool,
    #[serde(default)]
    pub probe_tokens: Vec<String>,
    #[serde(default)]
    pub analogies: Vec<[String; 3]>,
    #[serde(default = "default_neighbors")]
    pub neighbors: usize,
    #[serde(flatten)]
    pub training: TrainingConfig,
}

impl Display for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "using parameters:
        data_directory: {}
        file_glob_pattern: {}
        header_skip_offset: {}
        abbreviations: {}
        special_characters: {}
        output_dir: {:?}
        saved_counts: {}
        {}",
        self.data_directory, self.file_glob_pattern, self.header_skip_offset, self.abbreviations.len(),
        self.special_characters, self.output_dir, self.saved_counts, self.training)
    }
}

impl PipelineConfig {

    pub fn from_json(json: &str) -> Result<PipelineConfig> {
        let params: PipelineConfig = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<PipelineConfig> {
        let f = BufReader::new(File::open(path)?);
        let params: PipelineConfig = serde_json::from_reader(f)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {

        let t = &self.training;
        let positive = [
            ("embedding_dimension", t.embedding_dimension),
            ("context_window_size", t.context_window_size),
            ("training_epochs", t.training_epochs),
            ("batch_size", t.batch_size),
            ("num_threads", t.num_threads),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(EmbeddingError::Config(format!("{} must be positive", name)));
            }
        }
        if !(t.learning_rate > 0.0 && t.x_max > 0.0) {
            return Err(EmbeddingError::Config("learning_rate and x_max must be positive".to_string()));
        }
        if self.saved_counts && self.output_dir.is_none() {
            return Err(EmbeddingError::Config("saved_counts needs an output_dir to read counts from".to_string()));
        }
        Ok(())
    }

    pub fn loader(&self) -> Result<CorpusLoader> {
        CorpusLoader::new(&self.data_directory, &self.file_glob_pattern)
    }

    pub fn normalizer(&self) -> Result<Normalizer> {
        Normalizer::new(self.header_skip_offset, self.abbreviations.clone(), &self.special_characters)
    }

    pub fn training_params(&self) -> TrainingParams {
        TrainingParams {
            embedding_dimension: self.training.embedding_dimension,
            objective: self.training.training_objective,
            context_window: self.training.context_window_size,
            epochs: self.training.training_epochs,
        }
    }
}


pub mod files_handling {

    use ndarray::Array2;
    use ndarray_npy::{read_npy, write_npy};
    use std::fs::{self, File};
    use std::io::{BufReader, BufWriter, Read, Write};
    use flate2::{Compression, read::GzDecoder, write::GzEncoder};
    use crate::error::{EmbeddingError, Result};
    use crate::vocabulary::Vocabulary;

    pub fn read_input<R: ReadFile>(file_path: &str) -> Result<R> {
        R::read_file(file_path)
    }

    pub fn save_output<S: SaveFile + ?Sized>(output_dir: &str, file_name: &str, item: &S) -> Result<()> {
        fs::create_dir_all(output_dir)?;
        item.save_file(output_dir, file_name)
    }

    pub trait ReadFile: Sized {
        fn read_file(file_path: &str) -> Result<Self>;
    }

    pub trait SaveFile {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()>;
    }

    impl ReadFile for Array2<f32> {
        fn read_file(file_path: &str) -> Result<Self> {
            let in_file = file_path.to_string() + ".npy";
            Ok(read_npy(in_file)?)
        }
    }

    impl SaveFile for Array2<f32> {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()> {
            let out = output_dir.to_string() + "/" + file_name + ".npy";
            write_npy(out, self)?;
            Ok(())
        }
    }

    impl ReadFile for Vocabulary {
        fn read_file(file_path: &str) -> Result<Self> {
            let in_file = file_path.to_string() + ".json";
            let f = BufReader::new(File::open(in_file)?);
            Ok(serde_json::from_reader(f)?)
        }
    }

    impl SaveFile for Vocabulary {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()> {
            let out = output_dir.to_string() + "/" + file_name + ".json";
            let mut f = BufWriter::new(File::create(out)?);
            serde_json::to_writer(&mut f, self)?;
            f.flush()?;
            Ok(())
        }
    }

    // compressed blobs stored as `<file_name><i>.gz`, listed in index order
    fn indexed_blobs(main_dir: &str, prefix: &str) -> Result<Vec<(usize, std::path::PathBuf)>> {
        let mut indexed: Vec<(usize, std::path::PathBuf)> = fs::read_dir(main_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let index = name.strip_prefix(prefix)?.strip_suffix(".gz")?.parse::<usize>().ok()?;
            Some((index, path))
        })
        .collect();
        indexed.sort_by_key(|(i, _)| *i);
        Ok(indexed)
    }

    impl ReadFile for Vec<Vec<u8>> {
        fn read_file(file_path: &str) -> Result<Self> {

            let (main_dir, prefix) = file_path.rsplit_once('/').unwrap_or((".", file_path));
            let indexed = indexed_blobs(main_dir, prefix)?;

            if indexed.is_empty() {
                return Err(EmbeddingError::Config(format!("no '{}*.gz' files in '{}'", prefix, main_dir)));
            }

            let mut items: Vec<Vec<u8>> = Vec::new();
            for (_, path) in indexed {
                let f = BufReader::new(File::open(path)?);
                let mut reader = GzDecoder::new(f);
                let mut buf: Vec<u8> = Vec::new();
                reader.read_to_end(&mut buf)?;
                items.push(buf);
            }
            Ok(items)
        }
    }

    impl SaveFile for [Vec<u8>] {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()> {
            // blobs of an earlier save would otherwise be read back with these
            for (_, stale) in indexed_blobs(output_dir, file_name)? {
                fs::remove_file(stale)?;
            }
            for (i, buf) in self.iter().enumerate() {
                let out = output_dir.to_string() + "/" + file_name + &format!("{}.gz", i);
                let f = BufWriter::new(File::create(out)?);
                let mut writer = GzEncoder::new(f, Compression::default());
                writer.write_all(buf)?;
                writer.finish()?.flush()?;
            }
            Ok(())
        }
    }
}


#[cfg(test)]
mod tests {

    use super::PipelineConfig;
    use crate::embedding::TrainingObjective;
    use crate::config::files_handling;
    use crate::vocabulary::Vocabulary;

    #[test]
    fn defaults_fill_missing_keys() {

        let params = PipelineConfig::from_json(r#"{"data_directory": "books"}"#).unwrap();
        assert_eq!(params.file_glob_pattern, "*.txt");
        assert_eq!(params.header_skip_offset, 0);
        assert_eq!(params.abbreviations.get("Mrs.").map(|s| s.as_str()), Some("Mrs"));
        assert_eq!(params.training.min_token_frequency, 5);
        assert_eq!(params.training.training_objective, TrainingObjective::SkipGram);
        assert_eq!(params.training_params().context_window, 5);
        assert!(params.output_dir.is_none());
    }

    #[test]
    fn training_keys_are_read_from_top_level() {

        let json = r#"{
            "data_directory": "books",
            "header_skip_offset": 120,
            "embedding_dimension": 32,
            "training_objective": "continuous_bag_of_words",
            "context_window_size": 3,
            "training_epochs": 7,
            "analogies": [["man", "king", "woman"]]
        }"#;
        let params = PipelineConfig::from_json(json).unwrap();
        let training = params.training_params();

        assert_eq!(params.header_skip_offset, 120);
        assert_eq!(training.embedding_dimension, 32);
        assert_eq!(training.objective, TrainingObjective::ContinuousBagOfWords);
        assert_eq!(training.epochs, 7);
        assert_eq!(params.analogies[0][1], "king");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(PipelineConfig::from_json(r#"{}"#).is_err());
        assert!(PipelineConfig::from_json(r#"{"data_directory": "d", "embedding_dimension": 0}"#).is_err());
        assert!(PipelineConfig::from_json(r#"{"data_directory": "d", "saved_counts": true}"#).is_err());
        assert!(PipelineConfig::from_json(r#"{"data_directory": "d", "training_objective": "glove"}"#).is_err());
    }

    #[test]
    fn compressed_blobs_round_trip_in_order() {

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_str().unwrap();
        let blobs: Vec<Vec<u8>> = (0..12u8).map(|i| vec![i; 3 + i as usize]).collect();

        files_handling::save_output(out, "cooc", blobs.as_slice()).unwrap();
        let back = files_handling::read_input::<Vec<Vec<u8>>>(&format!("{}/cooc", out)).unwrap();
        assert_eq!(back, blobs);
    }

    #[test]
    fn vocabulary_file_is_complete_when_save_returns() {

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_str().unwrap();
        let vocab = Vocabulary::from_entries(vec![("y".to_string(), 2), ("x".to_string(), 1)]);

        files_handling::save_output(out, "vocabulary", &vocab).unwrap();
        let written = std::fs::read_to_string(dir.path().join("vocabulary.json")).unwrap();
        assert_eq!(written, r#"[["y",2],["x",1]]"#);
        assert_eq!(files_handling::read_input::<Vocabulary>(&format!("{}/vocabulary", out)).unwrap(), vocab);
    }

    #[test]
    fn saving_fewer_blobs_removes_the_older_ones() {

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_str().unwrap();

        let four: Vec<Vec<u8>> = (0..4u8).map(|i| vec![i; 2]).collect();
        files_handling::save_output(out, "cooc", four.as_slice()).unwrap();
        let two: Vec<Vec<u8>> = vec![vec![7; 3], vec![8; 3]];
        files_handling::save_output(out, "cooc", two.as_slice()).unwrap();

        assert!(!dir.path().join("cooc2.gz").exists());
        assert!(!dir.path().join("cooc3.gz").exists());
        assert_eq!(files_handling::read_input::<Vec<Vec<u8>>>(&format!("{}/cooc", out)).unwrap(), two);
    }
}
