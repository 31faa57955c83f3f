//! Reference parsing
//!
//! Two grammars are tried in order:
//! - strict: the whole input is a citation ("1 Kor 13:4-7", "Joh. 3,16")
//! - loose: a spelled-out book name followed by a chapter somewhere in
//!   running text ("wat zegt mattheus 20 over het loon")

use super::canon::BookCanon;
use crate::errors::{AppError, Result};
use regex_lite::{Captures, Regex};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Letters allowed in a book name: ASCII plus Latin-1 Supplement and
/// Latin Extended-A, without the multiplication and division signs.
const LETTERS: &str = "A-Za-zÀ-ÖØ-öø-ÿĀ-ſ";

/// Why a text did not yield a reference
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseMiss {
    #[error("no scripture reference found")]
    NoMatch,

    #[error("unknown book '{book}'")]
    UnknownBook { book: String },

    #[error("verse range {start}-{end} runs backwards")]
    InvalidRange { start: u32, end: u32 },

    #[error("verse end given without a verse start")]
    MissingVerseStart,

    #[error("chapter and verse numbers start at 1")]
    ZeroNumber,
}

impl ParseMiss {
    /// Whether another reading of the same text may still succeed.
    ///
    /// A known book with bad numbers is a definitive miss.
    pub fn allows_retry(&self) -> bool {
        matches!(self, ParseMiss::NoMatch | ParseMiss::UnknownBook { .. })
    }
}

/// A canonical citation: book, chapter and an optional verse range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptureReference {
    book: &'static str,
    chapter: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    verse_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verse_end: Option<u32>,
}

impl ScriptureReference {
    /// Build a reference, resolving `book` through the canon
    pub fn new(
        canon: &BookCanon,
        book: &str,
        chapter: u32,
        verse_start: Option<u32>,
        verse_end: Option<u32>,
    ) -> std::result::Result<Self, ParseMiss> {
        let book = canon.resolve(book).ok_or_else(|| ParseMiss::UnknownBook {
            book: canon.normalize_book(book),
        })?;
        Self::checked(book, chapter, verse_start, verse_end)
    }

    fn checked(
        book: &'static str,
        chapter: u32,
        verse_start: Option<u32>,
        verse_end: Option<u32>,
    ) -> std::result::Result<Self, ParseMiss> {
        if chapter == 0 || verse_start == Some(0) || verse_end == Some(0) {
            return Err(ParseMiss::ZeroNumber);
        }

        match (verse_start, verse_end) {
            (None, Some(_)) => return Err(ParseMiss::MissingVerseStart),
            (Some(start), Some(end)) if start > end => {
                return Err(ParseMiss::InvalidRange { start, end })
            }
            _ => {}
        }

        Ok(Self {
            book,
            chapter,
            verse_start,
            verse_end,
        })
    }

    pub fn book(&self) -> &'static str {
        self.book
    }

    pub fn chapter(&self) -> u32 {
        self.chapter
    }

    pub fn verse_start(&self) -> Option<u32> {
        self.verse_start
    }

    pub fn verse_end(&self) -> Option<u32> {
        self.verse_end
    }

    pub fn is_whole_chapter(&self) -> bool {
        self.verse_start.is_none()
    }

    /// Whether `verse` of this chapter falls inside the cited range.
    ///
    /// Retrieval filters on book and chapter only; callers that want the
    /// verse bounds apply this to the hits themselves.
    pub fn contains_verse(&self, verse: u32) -> bool {
        match (self.verse_start, self.verse_end) {
            (None, _) => true,
            (Some(start), None) => verse == start,
            (Some(start), Some(end)) => (start..=end).contains(&verse),
        }
    }
}

impl fmt::Display for ScriptureReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.book, self.chapter)?;
        match (self.verse_start, self.verse_end) {
            (Some(start), Some(end)) if end != start => write!(f, ":{}-{}", start, end),
            (Some(start), _) => write!(f, ":{}", start),
            _ => Ok(()),
        }
    }
}

/// Parses free-text citations into [`ScriptureReference`]s
pub struct ReferenceParser {
    canon: Arc<BookCanon>,
    strict: Regex,
}

impl ReferenceParser {
    pub fn new(canon: Arc<BookCanon>) -> Result<Self> {
        let pattern = format!(
            r"^(?P<book>(?:[1-3]\s*)?[{l}]+(?:\s+[{l}]+)*)\.?\s*(?P<chapter>\d{{1,3}})(?:\s*[:,]\s*(?P<start>\d{{1,3}})(?:\s*[-–]\s*(?P<end>\d{{1,3}}))?)?[\s.!?]*$",
            l = LETTERS
        );

        let strict = Regex::new(&pattern).map_err(|e| AppError::Internal {
            message: format!("Invalid reference pattern: {}", e),
        })?;

        Ok(Self { canon, strict })
    }

    /// Parse `text`, returning `None` on any miss
    pub fn parse(&self, text: &str) -> Option<ScriptureReference> {
        self.parse_detailed(text).ok()
    }

    /// Parse `text`, reporting why it failed
    pub fn parse_detailed(&self, text: &str) -> std::result::Result<ScriptureReference, ParseMiss> {
        let text = text.trim();
        let mut miss = ParseMiss::NoMatch;

        if let Some(caps) = self.strict.captures(text) {
            let token = &caps["book"];
            match self.canon.resolve(token) {
                Some(book) => return self.from_strict(book, &caps),
                None => {
                    miss = ParseMiss::UnknownBook {
                        book: self.canon.normalize_book(token),
                    }
                }
            }
        }

        self.scan_loose(text).ok_or(miss)
    }

    fn from_strict(
        &self,
        book: &'static str,
        caps: &Captures<'_>,
    ) -> std::result::Result<ScriptureReference, ParseMiss> {
        let chapter = number(caps, "chapter").ok_or(ParseMiss::NoMatch)?;
        ScriptureReference::checked(
            book,
            chapter,
            number(caps, "start"),
            number(caps, "end"),
        )
    }

    /// Find the first "<book> <chapter>" pair in running text.
    ///
    /// Aliases count when the pair opens the text or follows an ordinal;
    /// elsewhere only spelled-out names do ("kijk op 3 manieren").
    fn scan_loose(&self, text: &str) -> Option<ScriptureReference> {
        let words: Vec<&str> = text
            .split(|c: char| !(is_book_letter(c) || c.is_ascii_digit()))
            .filter(|w| !w.is_empty())
            .collect();

        for (i, pair) in words.windows(2).enumerate() {
            let (name, chapter) = (pair[0], pair[1]);
            if !is_book_word(name) {
                continue;
            }
            let Some(chapter) = chapter_number(chapter) else {
                continue;
            };

            let ordinal = i
                .checked_sub(1)
                .map(|j| words[j])
                .filter(|w| matches!(*w, "1" | "2" | "3"));

            let with_ordinal = ordinal.map(|o| format!("{} {}", o, name));
            let found = with_ordinal
                .as_deref()
                .and_then(|candidate| self.canon.resolve(candidate))
                .or_else(|| {
                    if i == 0 || name.starts_with(['1', '2', '3']) {
                        self.canon.resolve(name)
                    } else {
                        self.canon.resolve_full_name(name)
                    }
                });

            if let Some(book) = found {
                tracing::debug!(book, chapter, "Reference found in running text");
                return ScriptureReference::checked(book, chapter, None, None).ok();
            }
        }

        None
    }
}

fn number(caps: &Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

fn chapter_number(word: &str) -> Option<u32> {
    if word.len() > 3 || !word.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    word.parse().ok().filter(|&n| n > 0)
}

/// A letter run, optionally glued to one leading ordinal ("1kor")
fn is_book_word(word: &str) -> bool {
    let letters = word.strip_prefix(['1', '2', '3']).unwrap_or(word);
    !letters.is_empty() && letters.chars().all(is_book_letter)
}

fn is_book_letter(c: char) -> bool {
    c.is_ascii_alphabetic()
        || (('\u{C0}'..='\u{FF}').contains(&c) && c != '\u{D7}' && c != '\u{F7}')
        || ('\u{100}'..='\u{17F}').contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripture::CANONICAL_BOOKS;

    fn parser() -> ReferenceParser {
        ReferenceParser::new(Arc::new(BookCanon::dutch().unwrap())).unwrap()
    }

    fn parts(r: &ScriptureReference) -> (&str, u32, Option<u32>, Option<u32>) {
        (r.book(), r.chapter(), r.verse_start(), r.verse_end())
    }

    #[test]
    fn test_full_citation() {
        let r = parser().parse("Mattheüs 20:1-16").unwrap();
        assert_eq!(parts(&r), ("Mattheüs", 20, Some(1), Some(16)));
    }

    #[test]
    fn test_whole_chapter_without_diacritics() {
        let r = parser().parse("mattheus 20").unwrap();
        assert_eq!(parts(&r), ("Mattheüs", 20, None, None));
        assert!(r.is_whole_chapter());
    }

    #[test]
    fn test_plain_question_is_no_reference() {
        let parser = parser();
        assert_eq!(parser.parse("de zin van het leven"), None);
        assert_eq!(
            parser.parse_detailed("de zin van het leven"),
            Err(ParseMiss::NoMatch)
        );
    }

    #[test]
    fn test_backwards_range_is_rejected() {
        let parser = parser();
        assert_eq!(
            parser.parse_detailed("Johannes 3:16-10"),
            Err(ParseMiss::InvalidRange { start: 16, end: 10 })
        );
        assert_eq!(parser.parse("Johannes 3:16-10"), None);
    }

    #[test]
    fn test_zero_numbers_are_rejected() {
        let parser = parser();
        assert_eq!(parser.parse_detailed("Johannes 0"), Err(ParseMiss::ZeroNumber));
        assert_eq!(parser.parse_detailed("Johannes 3:0"), Err(ParseMiss::ZeroNumber));
    }

    #[test]
    fn test_abbreviations_and_ordinals() {
        let parser = parser();

        let r = parser.parse("1 Kor 13:4-7").unwrap();
        assert_eq!(parts(&r), ("1 Korinthe", 13, Some(4), Some(7)));

        let r = parser.parse("1kor 13").unwrap();
        assert_eq!(parts(&r), ("1 Korinthe", 13, None, None));

        let r = parser.parse("Joh. 3,16").unwrap();
        assert_eq!(parts(&r), ("Johannes", 3, Some(16), None));

        let r = parser.parse("Ps 23 : 1 – 4").unwrap();
        assert_eq!(parts(&r), ("Psalmen", 23, Some(1), Some(4)));
    }

    #[test]
    fn test_every_book_round_trips() {
        let parser = parser();
        for book in CANONICAL_BOOKS {
            for chapter in [1, 7, 150] {
                let text = format!("{} {}", book, chapter);
                let r = parser
                    .parse(&text)
                    .unwrap_or_else(|| panic!("failed to parse '{}'", text));
                assert_eq!(parts(&r), (book, chapter, None, None));
            }
        }
    }

    #[test]
    fn test_reference_in_running_text() {
        let parser = parser();

        let r = parser.parse("wat zegt mattheus 20 over het loon?").unwrap();
        assert_eq!(parts(&r), ("Mattheüs", 20, None, None));

        let r = parser.parse("Lees 1 Johannes 4 eens").unwrap();
        assert_eq!(parts(&r), ("1 Johannes", 4, None, None));
    }

    #[test]
    fn test_running_text_ignores_short_aliases() {
        let parser = parser();
        assert_eq!(parser.parse("kijk op 3 manieren naar vergeving"), None);
        assert_eq!(parser.parse("en dan 2 keer bidden"), None);
    }

    #[test]
    fn test_running_text_accepts_leading_aliases() {
        let parser = parser();

        let r = parser.parse_detailed("1 Kor 13 vers 4").unwrap();
        assert_eq!(parts(&r), ("1 Korinthe", 13, None, None));

        let r = parser.parse_detailed("Ps 23 de goede herder").unwrap();
        assert_eq!(parts(&r), ("Psalmen", 23, None, None));

        let r = parser.parse_detailed("Joh 3 vers 16").unwrap();
        assert_eq!(parts(&r), ("Johannes", 3, None, None));

        let r = parser.parse_detailed("Mat 20 gelijkenis").unwrap();
        assert_eq!(parts(&r), ("Mattheüs", 20, None, None));

        let r = parser.parse_detailed("1 Korintiërs 13 over liefde").unwrap();
        assert_eq!(parts(&r), ("1 Korinthe", 13, None, None));

        let r = parser.parse("wat staat er in 2 kor 5 over verzoening").unwrap();
        assert_eq!(parts(&r), ("2 Korinthe", 5, None, None));

        let r = parser.parse("lees 1kor 13 nog eens").unwrap();
        assert_eq!(parts(&r), ("1 Korinthe", 13, None, None));
    }

    #[test]
    fn test_unknown_book() {
        let miss = parser().parse_detailed("Tobit 3").unwrap_err();
        assert!(matches!(miss, ParseMiss::UnknownBook { .. }));
        assert!(miss.allows_retry());
        assert!(!ParseMiss::ZeroNumber.allows_retry());
    }

    #[test]
    fn test_constructor_and_display() {
        let canon = BookCanon::dutch().unwrap();

        let r = ScriptureReference::new(&canon, "1 kor", 13, Some(4), Some(7)).unwrap();
        assert_eq!(r.to_string(), "1 Korinthe 13:4-7");

        let r = ScriptureReference::new(&canon, "joh", 3, Some(16), None).unwrap();
        assert_eq!(r.to_string(), "Johannes 3:16");

        assert_eq!(
            ScriptureReference::new(&canon, "joh", 3, None, Some(16)),
            Err(ParseMiss::MissingVerseStart)
        );
    }

    #[test]
    fn test_contains_verse() {
        let parser = parser();
        let range = parser.parse("1 Kor 13:4-7").unwrap();
        assert!(range.contains_verse(4));
        assert!(range.contains_verse(7));
        assert!(!range.contains_verse(8));

        let chapter = parser.parse("Psalm 23").unwrap();
        assert!(chapter.contains_verse(6));
    }

    #[test]
    fn test_serialization_omits_missing_verses() {
        let parser = parser();

        let json = serde_json::to_value(parser.parse("Mattheüs 20:1-16").unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"book": "Mattheüs", "chapter": 20, "verseStart": 1, "verseEnd": 16})
        );

        let json = serde_json::to_value(parser.parse("mattheus 20").unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"book": "Mattheüs", "chapter": 20}));
    }
}
