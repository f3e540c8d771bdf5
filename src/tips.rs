//! Tip store
//!
//! Loads the pipe-delimited tips file once at startup. Each line is either
//! `<text>` or `<text>|<phonetic>`, where the phonetic form is what gets
//! spoken when present.

use std::collections::HashSet;
use std::path::Path;

use crate::{Error, Result};

/// Field separator between display text and phonetic override
pub const SEPARATOR: char = '|';

/// A single spoken tip
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tip {
    /// Literal tip text
    pub text: String,
    /// Pronunciation override used for speech
    pub phonetic: Option<String>,
}

impl Tip {
    /// Create a tip without a phonetic override
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            phonetic: None,
        }
    }

    /// Create a tip with a phonetic override
    #[must_use]
    pub fn with_phonetic(text: impl Into<String>, phonetic: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            phonetic: Some(phonetic.into()),
        }
    }

    /// Text handed to the synthesizer
    #[must_use]
    pub fn spoken(&self) -> &str {
        self.phonetic.as_deref().unwrap_or(&self.text)
    }
}

/// Immutable pool of tips
#[derive(Debug, Clone)]
pub struct TipStore {
    tips: Vec<Tip>,
}

impl TipStore {
    /// Load tips from a file
    ///
    /// # Errors
    ///
    /// Returns `Error::Load` if the file cannot be read or any line is malformed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Load(format!("{}: {e}", path.display())))?;

        let store = Self::parse(&content)?;
        tracing::info!(path = %path.display(), count = store.len(), "loaded tips");
        Ok(store)
    }

    /// Parse tips from file contents
    ///
    /// # Errors
    ///
    /// Returns `Error::Load` on a blank line, an empty text field, more than
    /// one separator, or when no tips are present at all
    pub fn parse(content: &str) -> Result<Self> {
        let mut tips = Vec::new();
        let mut seen = HashSet::new();

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let tip = parse_line(line).map_err(|reason| {
                Error::Load(format!("line {line_no}: {reason}"))
            })?;

            if !seen.insert(tip.clone()) {
                tracing::warn!(line = line_no, text = %tip.text, "duplicate tip");
            }
            tips.push(tip);
        }

        if tips.is_empty() {
            return Err(Error::Load("no tips found".to_string()));
        }

        Ok(Self { tips })
    }

    /// Build a store from already parsed tips
    ///
    /// # Errors
    ///
    /// Returns `Error::Load` if `tips` is empty
    pub fn from_tips(tips: Vec<Tip>) -> Result<Self> {
        if tips.is_empty() {
            return Err(Error::Load("no tips found".to_string()));
        }
        Ok(Self { tips })
    }

    /// Number of tips
    #[must_use]
    pub fn len(&self) -> usize {
        self.tips.len()
    }

    /// Always false for a successfully loaded store
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tips.is_empty()
    }

    /// Tip at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Tip> {
        self.tips.get(index)
    }

    /// All tips in file order
    #[must_use]
    pub fn as_slice(&self) -> &[Tip] {
        &self.tips
    }

    /// Iterate over all tips
    pub fn iter(&self) -> impl Iterator<Item = &Tip> {
        self.tips.iter()
    }
}

fn parse_line(line: &str) -> std::result::Result<Tip, &'static str> {
    // `lines()` strips `\n` and `\r\n`; a lone trailing `\r` can still remain
    let line = line.strip_suffix('\r').unwrap_or(line);

    if line.trim().is_empty() {
        return Err("blank line");
    }

    let mut fields = line.split(SEPARATOR);
    let text = fields.next().unwrap_or_default();
    let phonetic = fields.next();

    if fields.next().is_some() {
        return Err("more than one separator");
    }
    if text.trim().is_empty() {
        return Err("empty tip text");
    }

    Ok(Tip {
        text: text.to_string(),
        phonetic: phonetic
            .filter(|p| !p.trim().is_empty())
            .map(ToString::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_phonetic_lines() {
        let store = TipStore::parse("Keep your point in line\nOS|OH-ess\n").unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0), Some(&Tip::new("Keep your point in line")));
        assert_eq!(store.get(1), Some(&Tip::with_phonetic("OS", "OH-ess")));
    }

    #[test]
    fn spoken_prefers_phonetic() {
        assert_eq!(Tip::with_phonetic("OS", "OH-ess").spoken(), "OH-ess");
        assert_eq!(Tip::new("Advance lunge").spoken(), "Advance lunge");
    }

    #[test]
    fn strips_crlf_line_endings() {
        let store = TipStore::parse("Parry four\r\nRiposte|ree-POST\r\n").unwrap();
        assert_eq!(store.get(0).unwrap().text, "Parry four");
        assert_eq!(store.get(1).unwrap().phonetic.as_deref(), Some("ree-POST"));
    }

    #[test]
    fn empty_phonetic_is_absent() {
        let store = TipStore::parse("Salute first|\n").unwrap();
        assert_eq!(store.get(0).unwrap().phonetic, None);
    }

    #[test]
    fn rejects_blank_line() {
        let err = TipStore::parse("one\n\ntwo\n").unwrap_err();
        assert!(matches!(err, Error::Load(ref msg) if msg.contains("line 2")));
    }

    #[test]
    fn rejects_empty_text() {
        let err = TipStore::parse("|phonetic only\n").unwrap_err();
        assert!(matches!(err, Error::Load(_)));
    }

    #[test]
    fn rejects_extra_separator() {
        let err = TipStore::parse("a|b|c\n").unwrap_err();
        assert!(matches!(err, Error::Load(ref msg) if msg.contains("separator")));
    }

    #[test]
    fn rejects_empty_source() {
        assert!(matches!(TipStore::parse(""), Err(Error::Load(_))));
    }

    #[test]
    fn keeps_duplicates_as_distinct_tips() {
        let store = TipStore::parse("same\nsame\n").unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn preserves_inner_whitespace() {
        let store = TipStore::parse("  Bend   your knees \n").unwrap();
        assert_eq!(store.get(0).unwrap().text, "  Bend   your knees ");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = TipStore::load(Path::new("/nonexistent/tips.txt")).unwrap_err();
        assert!(matches!(err, Error::Load(_)));
    }
}
