//! Book canon and alias table
//!
//! The canon is the fixed set of 66 Dutch book names. The alias table maps
//! normalized lookup keys (abbreviations, alternative spellings, English
//! names) onto those canonical names.

use crate::errors::{AppError, Result};
use std::collections::HashMap;

/// Canonical book names in canonical order.
pub const CANONICAL_BOOKS: [&str; 66] = [
    // Old Testament
    "Genesis", "Exodus", "Leviticus", "Numeri", "Deuteronomium",
    "Jozua", "Richteren", "Ruth", "1 Samuël", "2 Samuël",
    "1 Koningen", "2 Koningen", "1 Kronieken", "2 Kronieken", "Ezra",
    "Nehemia", "Ester", "Job", "Psalmen", "Spreuken",
    "Prediker", "Hooglied", "Jesaja", "Jeremia", "Klaagliederen",
    "Ezechiël", "Daniël", "Hosea", "Joël", "Amos",
    "Obadja", "Jona", "Micha", "Nahum", "Habakuk",
    "Sefanja", "Haggai", "Zacharia", "Maleachi",
    // New Testament
    "Mattheüs", "Marcus", "Lucas", "Johannes", "Handelingen",
    "Romeinen", "1 Korinthe", "2 Korinthe", "Galaten", "Efeziërs",
    "Filippenzen", "Kolossenzen", "1 Thessalonicenzen", "2 Thessalonicenzen", "1 Timotheüs",
    "2 Timotheüs", "Titus", "Filemon", "Hebreeën", "Jakobus",
    "1 Petrus", "2 Petrus", "1 Johannes", "2 Johannes", "3 Johannes",
    "Judas", "Openbaring",
];

/// Aliases per canonical book. Entries pass through [`lookup_key`] before
/// they are stored, so they may be written in any case or spelling.
const ALIASES: &[(&str, &[&str])] = &[
    ("Genesis", &["gen", "gn"]),
    ("Exodus", &["ex", "exo", "exod"]),
    ("Leviticus", &["lev", "lv"]),
    ("Numeri", &["num", "nu", "numbers"]),
    ("Deuteronomium", &["deut", "deu", "dt", "deuteronomy"]),
    ("Jozua", &["joz", "joshua"]),
    ("Richteren", &["richt", "ri", "judges"]),
    ("Ruth", &["ru", "rt"]),
    ("1 Samuël", &["1 sam", "1 sa"]),
    ("2 Samuël", &["2 sam", "2 sa"]),
    ("1 Koningen", &["1 kon", "1 ko", "1 kings"]),
    ("2 Koningen", &["2 kon", "2 ko", "2 kings"]),
    ("1 Kronieken", &["1 kron", "1 kr", "1 chronicles"]),
    ("2 Kronieken", &["2 kron", "2 kr", "2 chronicles"]),
    ("Ezra", &["ezr"]),
    ("Nehemia", &["neh", "nehemiah"]),
    ("Ester", &["est", "esther"]),
    ("Psalmen", &["ps", "psa", "psalm", "psalms"]),
    ("Spreuken", &["spr", "proverbs"]),
    ("Prediker", &["pred", "prd", "ecclesiastes"]),
    ("Hooglied", &["hoogl", "hl", "hgl", "song of songs"]),
    ("Jesaja", &["jes", "isaiah"]),
    ("Jeremia", &["jer", "jeremiah"]),
    ("Klaagliederen", &["klaagl", "kl", "lamentations"]),
    ("Ezechiël", &["ez", "eze", "ezech", "ezekiel"]),
    ("Daniël", &["dan", "da"]),
    ("Hosea", &["hos"]),
    ("Joël", &["jl"]),
    ("Amos", &["am"]),
    ("Obadja", &["ob", "obad", "obadia", "obadiah"]),
    ("Jona", &["jon", "jonah"]),
    ("Micha", &["mi", "mic", "micah"]),
    ("Nahum", &["nah", "na"]),
    ("Habakuk", &["hab", "habakkuk"]),
    ("Sefanja", &["sef", "zef", "zefanja", "zephaniah"]),
    ("Haggai", &["hag", "haggaï"]),
    ("Zacharia", &["zach", "za", "zechariah"]),
    ("Maleachi", &["mal", "malachi"]),
    ("Mattheüs", &["mat", "mt", "matt", "matheus", "matteüs", "matthew"]),
    ("Marcus", &["mar", "mc", "mk", "markus", "mark"]),
    ("Lucas", &["luc", "lc", "lk", "lukas", "luke"]),
    ("Johannes", &["joh", "jh", "john"]),
    ("Handelingen", &["hand", "hnd", "acts"]),
    ("Romeinen", &["rom", "ro", "romans"]),
    ("1 Korinthe", &["1 kor", "1 korinte", "1 korintiërs", "1 korinthiërs", "1 corinthians"]),
    ("2 Korinthe", &["2 kor", "2 korinte", "2 korintiërs", "2 korinthiërs", "2 corinthians"]),
    ("Galaten", &["gal", "galatians"]),
    ("Efeziërs", &["ef", "efe", "efez", "efeze", "ephesians"]),
    ("Filippenzen", &["fil", "flp", "filip", "philippians"]),
    ("Kolossenzen", &["kol", "colossians"]),
    (
        "1 Thessalonicenzen",
        &["1 thess", "1 tess", "1 tes", "1 th", "1 tessalonicenzen", "1 thessalonians"],
    ),
    (
        "2 Thessalonicenzen",
        &["2 thess", "2 tess", "2 tes", "2 th", "2 tessalonicenzen", "2 thessalonians"],
    ),
    ("1 Timotheüs", &["1 tim", "1 timoteüs", "1 timothy"]),
    ("2 Timotheüs", &["2 tim", "2 timoteüs", "2 timothy"]),
    ("Titus", &["tit"]),
    ("Filemon", &["filem", "flm", "philemon"]),
    ("Hebreeën", &["hebr", "heb", "hebrews"]),
    ("Jakobus", &["jak", "jac", "jacobus", "james"]),
    ("1 Petrus", &["1 pet", "1 petr", "1 peter"]),
    ("2 Petrus", &["2 pet", "2 petr", "2 peter"]),
    ("1 Johannes", &["1 joh", "1 john"]),
    ("2 Johannes", &["2 joh", "2 john"]),
    ("3 Johannes", &["3 joh", "3 john"]),
    ("Judas", &["jud", "jude"]),
    ("Openbaring", &["op", "opb", "openb", "openbaringen", "revelation"]),
];

/// Immutable book canon with its alias table.
#[derive(Debug, Clone)]
pub struct BookCanon {
    /// Canonical name -> position in canonical order
    books: HashMap<&'static str, usize>,

    /// Lookup key -> canonical name
    aliases: HashMap<String, &'static str>,

    /// Lookup key of each canonical name (no abbreviations)
    full_names: HashMap<String, &'static str>,
}

impl BookCanon {
    /// Build the Dutch canon with its built-in alias table
    pub fn dutch() -> Result<Self> {
        Self::from_tables(&CANONICAL_BOOKS, ALIASES)
    }

    /// Build a canon from explicit tables.
    ///
    /// Every canonical name is registered under its own lookup key. Fails
    /// when an alias names a book outside the canon or when one key would
    /// resolve to two different books.
    pub fn from_tables(
        books: &[&'static str],
        aliases: &[(&'static str, &[&'static str])],
    ) -> Result<Self> {
        let mut canon = Self {
            books: HashMap::with_capacity(books.len()),
            aliases: HashMap::new(),
            full_names: HashMap::with_capacity(books.len()),
        };

        for (position, book) in books.iter().copied().enumerate() {
            canon.books.insert(book, position);
            canon.full_names.insert(lookup_key(book), book);
            canon.register(book, book)?;
        }

        for (book, names) in aliases {
            let canonical = canon.canonical(book).ok_or_else(|| AppError::Configuration {
                message: format!("alias table names unknown book '{}'", book),
            })?;
            for name in names.iter() {
                canon.register(name, canonical)?;
            }
        }

        Ok(canon)
    }

    fn register(&mut self, alias: &str, book: &'static str) -> Result<()> {
        let key = lookup_key(alias);
        if let Some(existing) = self.aliases.get(&key).copied() {
            if existing != book {
                return Err(AppError::Configuration {
                    message: format!(
                        "alias '{}' maps to both '{}' and '{}'",
                        key, existing, book
                    ),
                });
            }
        }
        self.aliases.insert(key, book);
        Ok(())
    }

    /// Map a raw book name onto its canonical name.
    ///
    /// Unknown names come back title-cased; callers decide whether the
    /// result is a real book through [`BookCanon::canonical`].
    pub fn normalize_book(&self, raw: &str) -> String {
        match self.aliases.get(&lookup_key(raw)) {
            Some(book) => (*book).to_string(),
            None => title_case(raw),
        }
    }

    /// Exact (case- and diacritic-sensitive) canon membership
    pub fn canonical(&self, name: &str) -> Option<&'static str> {
        self.books.get_key_value(name).map(|(book, _)| *book)
    }

    /// Resolve a raw name straight to a canonical book, if it is one
    pub fn resolve(&self, raw: &str) -> Option<&'static str> {
        self.canonical(&self.normalize_book(raw))
    }

    /// Resolve only spelled-out book names, ignoring abbreviations.
    ///
    /// Used when scanning running text, where short aliases ("op", "dan",
    /// "hand") collide with ordinary Dutch words.
    pub fn resolve_full_name(&self, raw: &str) -> Option<&'static str> {
        self.full_names.get(&lookup_key(raw)).copied()
    }

    /// Canonical names in canonical order
    pub fn books(&self) -> Vec<&'static str> {
        let mut books: Vec<_> = self.books.iter().map(|(b, p)| (*p, *b)).collect();
        books.sort_unstable();
        books.into_iter().map(|(_, b)| b).collect()
    }

    /// All lookup keys with their canonical book
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &'static str)> + '_ {
        self.aliases.iter().map(|(k, b)| (k.as_str(), *b))
    }

    /// Number of canonical books
    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

/// Derive the alias lookup key for a raw book name.
///
/// Trims, lower-cases, strips periods, collapses whitespace, folds
/// diacritics, separates a leading ordinal from the name ("1kor" -> "1 kor")
/// and rewrites the "matth" spelling to "matt". Applying it twice gives the
/// same key.
pub fn lookup_key(raw: &str) -> String {
    let folded: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '.')
        .map(fold_diacritics)
        .collect();

    let mut key = folded.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut chars = key.chars();
    if let (Some(first), Some(second)) = (chars.next(), chars.next()) {
        if matches!(first, '1'..='3') && second.is_alphabetic() {
            key.insert(1, ' ');
        }
    }

    while let Some(rest) = key.strip_prefix("matth") {
        key = format!("matt{}", rest);
    }

    key
}

/// Fold a lower-case Latin-1 Supplement or Latin Extended-A letter to its
/// ASCII base letter. Other characters pass through unchanged.
pub fn fold_diacritics(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ĥ' | 'ħ' => 'h',
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'ĵ' => 'j',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'ţ' | 'ť' | 'ŧ' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ŵ' => 'w',
        'ý' | 'ÿ' | 'ŷ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon() -> BookCanon {
        BookCanon::dutch().unwrap()
    }

    #[test]
    fn test_canon_has_66_books_in_order() {
        let canon = canon();
        assert_eq!(canon.len(), 66);
        let books = canon.books();
        assert_eq!(books.first(), Some(&"Genesis"));
        assert_eq!(books[39], "Mattheüs");
        assert_eq!(books.last(), Some(&"Openbaring"));
    }

    #[test]
    fn test_diacritic_tolerant_lookup() {
        let canon = canon();
        assert_eq!(canon.normalize_book("mattheus"), "Mattheüs");
        assert_eq!(canon.normalize_book("mattheüs"), "Mattheüs");
        assert_eq!(canon.normalize_book("Matteüs"), "Mattheüs");
        assert_eq!(canon.normalize_book("MATTH."), "Mattheüs");
        assert_eq!(canon.normalize_book("efeziers"), "Efeziërs");
        assert_eq!(canon.normalize_book("Hebreeen"), "Hebreeën");
    }

    #[test]
    fn test_ordinal_with_and_without_space() {
        let canon = canon();
        assert_eq!(canon.normalize_book("1 Kor"), "1 Korinthe");
        assert_eq!(canon.normalize_book("1kor."), "1 Korinthe");
        assert_eq!(canon.normalize_book("2  Sam"), "2 Samuël");
        assert_eq!(canon.normalize_book("3 john"), "3 Johannes");
    }

    #[test]
    fn test_unknown_book_is_title_cased() {
        let canon = canon();
        assert_eq!(canon.normalize_book("  onbekend   BOEK "), "Onbekend Boek");
        assert_eq!(canon.resolve("onbekend boek"), None);
        assert_eq!(canon.resolve("kor"), None);
    }

    #[test]
    fn test_normalize_is_idempotent_on_canonical_names() {
        let canon = canon();
        for book in CANONICAL_BOOKS {
            let once = canon.normalize_book(book);
            assert_eq!(once, book);
            assert_eq!(canon.normalize_book(&once), book);
        }
    }

    #[test]
    fn test_every_alias_key_resolves_to_its_book() {
        let canon = canon();
        for (key, book) in canon.aliases() {
            assert_eq!(canon.normalize_book(key), book, "alias key '{}'", key);
        }
        for (book, names) in ALIASES {
            for name in names.iter() {
                assert_eq!(canon.normalize_book(name), *book, "alias '{}'", name);
            }
        }
    }

    #[test]
    fn test_lookup_key_is_idempotent() {
        for raw in ["Mattheüs", "1kor.", "matthhew", "  Song  of Songs ", "2 Timotheüs"] {
            let key = lookup_key(raw);
            assert_eq!(lookup_key(&key), key);
        }
        assert_eq!(lookup_key("Mattheüs"), "matteus");
    }

    #[test]
    fn test_full_name_resolution_ignores_abbreviations() {
        let canon = canon();
        assert_eq!(canon.resolve_full_name("mattheus"), Some("Mattheüs"));
        assert_eq!(canon.resolve_full_name("1 Korinthe"), Some("1 Korinthe"));
        assert_eq!(canon.resolve_full_name("op"), None);
        assert_eq!(canon.resolve("op"), Some("Openbaring"));
    }

    #[test]
    fn test_conflicting_alias_is_rejected() {
        let result = BookCanon::from_tables(
            &["Jona", "Johannes"],
            &[("Jona", &["jo"]), ("Johannes", &["jo"])],
        );
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }

    #[test]
    fn test_alias_for_unknown_book_is_rejected() {
        let result = BookCanon::from_tables(&["Jona"], &[("Tobit", &["tob"])]);
        assert!(result.is_err());
    }
}
