//! Scripture references
//!
//! Turns free-text citations such as "Mattheus 20" or "1 Kor 13:4-7" into
//! canonical references:
//! - Book canon and alias table (Dutch book names)
//! - Reference parsing with a strict and a loose grammar
//!
//! Both types are immutable after construction and meant to be built once
//! at startup and shared behind an `Arc`.

mod canon;
mod reference;

pub use canon::{fold_diacritics, lookup_key, BookCanon, CANONICAL_BOOKS};
pub use reference::{ParseMiss, ReferenceParser, ScriptureReference};
