//! Vocabulary adapter between token strings and model ids.
//!
//! The generation vocabulary is a word-level table: every token string maps
//! to exactly one id. Unknown tokens map to the padding id.

use std::collections::HashMap;
use std::path::Path;

use tokenizers::Tokenizer;

use crate::error::{DaemonError, Result};
use crate::types::token::{BAR_TOKEN, EOS_TOKEN, PAD_TOKEN};

/// Two-way mapping between token strings and integer ids.
pub trait Vocabulary: Send + Sync {
    /// Number of ids the model scores.
    fn len(&self) -> usize;

    /// Returns true if the vocabulary has no tokens.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the id of `token`, or the padding id if it is unknown.
    fn token_to_id(&self, token: &str) -> u32;

    /// Returns the token for `id`, or None if the id is out of range.
    fn id_to_token(&self, id: u32) -> Option<&str>;

    /// Id used for padding and for unknown tokens.
    fn pad_id(&self) -> u32;

    /// Id of the end-of-sequence token, if the vocabulary has one.
    fn eos_id(&self) -> Option<u32>;

    /// Id of the bar delimiter, if the vocabulary has one.
    fn bar_id(&self) -> Option<u32>;

    /// Maps a token list to ids.
    fn encode(&self, tokens: &[String]) -> Vec<u32> {
        tokens.iter().map(|t| self.token_to_id(t)).collect()
    }
}

/// In-memory token table.
#[derive(Debug, Clone)]
pub struct TokenTable {
    tokens: Vec<String>,
    ids: HashMap<String, u32>,
    pad_id: u32,
    eos_id: Option<u32>,
    bar_id: Option<u32>,
}

impl TokenTable {
    /// Builds a table where each token's id is its index.
    ///
    /// Fails unless the list contains the `<pad>` token.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let mut ids = HashMap::with_capacity(tokens.len());
        for (i, token) in tokens.iter().enumerate() {
            ids.entry(token.clone()).or_insert(i as u32);
        }
        Self::from_parts(tokens, ids, PAD_TOKEN)
    }

    /// Loads the table from a word-level `tokenizer.json`.
    ///
    /// The padding token comes from the tokenizer's padding settings when
    /// they name a known token, and is `<pad>` otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            DaemonError::model_load_failed(format!("Failed to load tokenizer: {}", e))
        })?;

        let vocab = tokenizer.get_vocab(true);
        let size = vocab.values().max().map_or(0, |&max| max as usize + 1);
        if size == 0 {
            return Err(DaemonError::model_load_failed(format!(
                "Tokenizer at {} has an empty vocabulary",
                path.display()
            )));
        }

        let pad_token = tokenizer
            .get_padding()
            .map(|padding| padding.pad_token.clone())
            .filter(|token| vocab.contains_key(token))
            .unwrap_or_else(|| PAD_TOKEN.to_string());

        // Ids the tokenizer leaves unassigned stay empty and never resolve.
        let mut tokens = vec![String::new(); size];
        for (token, &id) in &vocab {
            tokens[id as usize] = token.clone();
        }

        Self::from_parts(tokens, vocab, &pad_token)
    }

    fn from_parts(tokens: Vec<String>, ids: HashMap<String, u32>, pad_token: &str) -> Result<Self> {
        let pad_id = ids.get(pad_token).copied().ok_or_else(|| {
            DaemonError::model_load_failed(format!(
                "Vocabulary has no padding token {:?}",
                pad_token
            ))
        })?;
        let eos_id = ids.get(EOS_TOKEN).copied();
        let bar_id = ids.get(BAR_TOKEN).copied();
        Ok(Self {
            tokens,
            ids,
            pad_id,
            eos_id,
            bar_id,
        })
    }
}

impl Vocabulary for TokenTable {
    fn len(&self) -> usize {
        self.tokens.len()
    }

    fn token_to_id(&self, token: &str) -> u32 {
        self.ids.get(token).copied().unwrap_or(self.pad_id)
    }

    fn id_to_token(&self, id: u32) -> Option<&str> {
        self.tokens
            .get(id as usize)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }

    fn pad_id(&self) -> u32 {
        self.pad_id
    }

    fn eos_id(&self) -> Option<u32> {
        self.eos_id
    }

    fn bar_id(&self) -> Option<u32> {
        self.bar_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn unknown_tokens_map_to_pad() {
        let table = TokenTable::from_tokens(["<pad>", "EOS", "BAR", "NOTE_60"]).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.pad_id(), 0);
        assert_eq!(table.eos_id(), Some(1));
        assert_eq!(table.bar_id(), Some(2));
        assert_eq!(table.token_to_id("NOTE_60"), 3);
        assert_eq!(table.token_to_id("KEY_Zb"), 0);
        assert_eq!(table.id_to_token(3), Some("NOTE_60"));
        assert_eq!(table.id_to_token(4), None);
    }

    #[test]
    fn missing_pad_token_fails() {
        let err = TokenTable::from_tokens(["BAR", "NOTE_60"]).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ModelLoadFailed);
    }

    #[test]
    fn pad_may_sit_anywhere() {
        let table = TokenTable::from_tokens(["BAR", "NOTE_60", "<pad>"]).unwrap();
        assert_eq!(table.pad_id(), 2);
        assert_eq!(table.eos_id(), None);
        assert_eq!(table.token_to_id("KEY_C"), 2);
    }

    #[test]
    fn encode_seed() {
        let table = TokenTable::from_tokens(["<pad>", "EOS", "BAR", "BPM_120"]).unwrap();
        let ids = table.encode(&["BPM_120".to_string(), "BAR".to_string(), "???".to_string()]);
        assert_eq!(ids, vec![3, 2, 0]);
    }

    #[test]
    fn load_word_level_tokenizer() {
        let json = r#"{
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": {"type": "WhitespaceSplit"},
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": {"<pad>": 0, "EOS": 1, "BAR": 2, "NOTE_60": 3, "DUR_2": 4},
                "unk_token": "<pad>"
            }
        }"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let table = TokenTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(table.eos_id(), Some(1));
        assert_eq!(table.token_to_id("DUR_2"), 4);
        assert_eq!(table.id_to_token(2), Some("BAR"));
    }

    fn write_tokenizer(vocab: &str) -> tempfile::NamedTempFile {
        let json = format!(
            r#"{{
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": {{"type": "WhitespaceSplit"}},
            "post_processor": null,
            "decoder": null,
            "model": {{"type": "WordLevel", "vocab": {vocab}, "unk_token": "BAR"}}
        }}"#
        );
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_without_pad_token_fails() {
        let file = write_tokenizer(r#"{"EOS": 0, "BAR": 1, "NOTE_60": 2}"#);
        let err = TokenTable::load(file.path()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ModelLoadFailed);
        assert!(err.message.contains("padding token"));
    }

    #[test]
    fn load_takes_pad_from_padding_settings() {
        let plain = write_tokenizer(r#"{"EOS": 0, "BAR": 1, "NOTE_60": 2, "[PAD]": 3}"#);
        let mut tokenizer = Tokenizer::from_file(plain.path()).unwrap();
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            pad_id: 3,
            pad_token: "[PAD]".to_string(),
            ..Default::default()
        }));
        let padded = tempfile::NamedTempFile::new().unwrap();
        tokenizer.save(padded.path(), false).unwrap();

        let table = TokenTable::load(padded.path()).unwrap();
        assert_eq!(table.pad_id(), 3);
        assert_eq!(table.token_to_id("KEY_C"), 3);
    }

    #[test]
    fn load_missing_file_fails() {
        let err = TokenTable::load(Path::new("/nonexistent/tokenizer.json")).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ModelLoadFailed);
    }
}
