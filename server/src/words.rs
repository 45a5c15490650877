//! Pool of words handed to drawers

use crate::ServerError;
use log::info;
use rand::Rng;
use std::path::Path;

const DEFAULT_WORDS: &[&str] = &[
    "apple", "banana", "bicycle", "bridge", "butterfly", "camera", "candle", "castle", "cat",
    "cloud", "computer", "crown", "dinosaur", "dog", "dragon", "elephant", "envelope", "fish",
    "flower", "giraffe", "guitar", "hammer", "helicopter", "house", "island", "kangaroo", "key",
    "ladder", "lamp", "lighthouse", "moon", "mountain", "mushroom", "octopus", "penguin",
    "piano", "pizza", "rainbow", "robot", "rocket", "scissors", "snowman", "spider", "sun",
    "sword", "telescope", "tree", "umbrella", "volcano", "whale",
];

/// Non-empty list of candidate words
#[derive(Debug, Clone)]
pub struct WordList {
    words: Vec<String>,
}

impl WordList {
    /// Builds a list from the given words, ignoring blank entries
    ///
    /// Masks and hints work per character while the wire counts UTF-16
    /// units, so words with characters outside the BMP are rejected.
    pub fn new(words: Vec<String>) -> Result<Self, ServerError> {
        let words: Vec<String> = words
            .into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return Err(ServerError::EmptyWordList);
        }
        if let Some(word) = words.iter().find(|w| w.chars().any(|c| c.len_utf16() > 1)) {
            return Err(ServerError::UnsupportedWord(word.clone()));
        }
        Ok(Self { words })
    }

    pub fn builtin() -> Self {
        Self {
            words: DEFAULT_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Loads one word per line; blank lines and `#` comments are skipped
    pub fn from_file(path: &Path) -> Result<Self, ServerError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ServerError::WordList {
            path: path.display().to_string(),
            source,
        })?;

        let list = Self::new(parse_lines(&contents))?;
        info!("Loaded {} words from {}", list.len(), path.display());
        Ok(list)
    }

    pub fn pick<R: Rng>(&self, rng: &mut R) -> &str {
        &self.words[rng.gen_range(0..self.words.len())]
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for WordList {
    fn default() -> Self {
        Self::builtin()
    }
}

fn parse_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}
