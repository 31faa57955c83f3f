//! Metadata filter on book and chapter

use clarus_common::config::PayloadFields;
use clarus_common::ScriptureReference;
use serde_json::{json, Map, Value};

/// Exact-match constraint on the verse payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFilter {
    pub book: String,
    pub chapter: Option<u32>,
}

impl MetadataFilter {
    /// Filter on the reference's book and chapter; verse bounds are left out
    pub fn for_reference(reference: &ScriptureReference) -> Self {
        Self {
            book: reference.book().to_string(),
            chapter: Some(reference.chapter()),
        }
    }

    /// Pinecone filter expression, e.g. `{"boek": {"$eq": "Johannes"}, "hoofdstuk": {"$eq": 3}}`
    pub fn to_pinecone(&self, fields: &PayloadFields) -> Value {
        let mut filter = Map::new();
        filter.insert(fields.book.clone(), json!({ "$eq": self.book }));
        if let Some(chapter) = self.chapter {
            filter.insert(fields.chapter.clone(), json!({ "$eq": chapter }));
        }
        Value::Object(filter)
    }
}
