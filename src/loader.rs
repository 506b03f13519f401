use std::fs;
use std::path::{Path, PathBuf};
use glob::Pattern;
use crate::error::Result;

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];


/// The concatenated text of every file the loader selected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawCorpus {
    text: String,
}

impl RawCorpus {

    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Length in characters, the unit `header_skip_offset` is measured in.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}


/// Reads every file in a directory whose name matches a glob pattern.
pub struct CorpusLoader {
    data_directory: PathBuf,
    pattern: Pattern,
}

impl CorpusLoader {

    pub fn new(data_directory: impl Into<PathBuf>, file_glob_pattern: &str) -> Result<CorpusLoader> {
        Ok(Self {
            data_directory: data_directory.into(),
            pattern: Pattern::new(file_glob_pattern)?,
        })
    }

    // matching files sorted by name; a missing or unreadable directory is an empty listing
    fn matching_files(&self) -> Vec<PathBuf> {

        let entries = match fs::read_dir(&self.data_directory) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("cannot list '{}': {}, using an empty corpus", self.data_directory.display(), e);
                return Vec::new();
            }
        };

        let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| self.pattern.matches(name))
        })
        .collect();

        files.sort();
        files
    }

    fn read_file(path: &Path) -> Option<String> {
        match fs::read(path) {
            Ok(bytes) => {
                let text = decode_lenient(&bytes);
                tracing::debug!("loaded '{}' ({} chars)", path.display(), text.chars().count());
                Some(text)
            },
            Err(e) => {
                tracing::warn!("skipping '{}': {}", path.display(), e);
                None
            }
        }
    }

    pub fn load(&self) -> RawCorpus {

        let files = self.matching_files();
        let n_files = files.len();

        let text = files
        .iter()
        .filter_map(|path| CorpusLoader::read_file(path))
        .fold(String::new(), |mut acc, text| {
            acc.push_str(&text);
            acc
        });

        tracing::info!("loaded {} files matching '{}' from '{}'", n_files, self.pattern, self.data_directory.display());
        RawCorpus::new(text)
    }
}


/// UTF-8 decoding that strips a leading byte-order mark and drops invalid byte sequences.
pub fn decode_lenient(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}


#[cfg(test)]
mod tests {

    use std::fs;
    use super::{CorpusLoader, decode_lenient};

    #[test]
    fn decode_strips_bom_and_drops_invalid_bytes() {
        let bytes = [0xEF, 0xBB, 0xBF, b'a', b'b', 0xFF, b'c', 0xC3, 0xA9];
        assert_eq!(decode_lenient(&bytes), "abcé");
    }

    #[test]
    fn bom_is_only_stripped_at_start() {
        let bytes = [b'x', 0xEF, 0xBB, 0xBF, b'y'];
        assert_eq!(decode_lenient(&bytes), "x\u{FEFF}y");
    }

    #[test]
    fn concatenates_matching_files_in_name_order() {

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "second. ").unwrap();
        fs::write(dir.path().join("a.txt"), "first. ").unwrap();
        fs::write(dir.path().join("c.md"), "ignored. ").unwrap();
        fs::create_dir(dir.path().join("d.txt")).unwrap();

        let loader = CorpusLoader::new(dir.path(), "*.txt").unwrap();
        assert_eq!(loader.load().as_str(), "first. second. ");
    }

    #[test]
    fn empty_or_missing_directory_gives_empty_corpus() {

        let dir = tempfile::tempdir().unwrap();
        let loader = CorpusLoader::new(dir.path(), "*.txt").unwrap();
        assert!(loader.load().is_empty());

        let loader = CorpusLoader::new(dir.path().join("missing"), "*.txt").unwrap();
        assert!(loader.load().is_empty());
    }

    #[test]
    fn unreadable_file_is_skipped() {
        // matching_files keeps only entries that pass is_file, so load only meets read failures
        // for files removed after listing or without read permission; both go through read_file
        let dir = tempfile::tempdir().unwrap();
        assert!(CorpusLoader::read_file(&dir.path().join("gone.txt")).is_none());
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(CorpusLoader::new("data", "[").is_err());
    }
}
