use crate::types::{Collection, Document};

/// A single mutation inside a [`WriteBatch`].
#[derive(Debug, Clone)]
pub enum Write {
    /// Envelope plus Data record of a new document.
    InsertDocument(Document),
    /// Overwrites envelope and Data record of an existing document.
    ReplaceDocument(Document),
    DeleteDocument {
        collection_id: String,
        document_id: String,
    },
    /// Collection metadata, accepted only while the stored version still
    /// equals `expected_version`.
    UpdateCollection {
        collection: Collection,
        expected_version: u64,
    },
    /// Strips one key from every Data record of a collection.
    RemoveDataAttribute {
        collection_id: String,
        attribute_id: String,
    },
}

/// Writes applied atomically by [`Store::commit`](super::Store::commit):
/// either every write lands or none does.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_document(&mut self, document: Document) -> &mut Self {
        self.writes.push(Write::InsertDocument(document));
        self
    }

    pub fn replace_document(&mut self, document: Document) -> &mut Self {
        self.writes.push(Write::ReplaceDocument(document));
        self
    }

    pub fn delete_document(&mut self, collection_id: &str, document_id: &str) -> &mut Self {
        self.writes.push(Write::DeleteDocument {
            collection_id: collection_id.to_string(),
            document_id: document_id.to_string(),
        });
        self
    }

    pub fn update_collection(&mut self, collection: Collection, expected_version: u64) -> &mut Self {
        self.writes.push(Write::UpdateCollection {
            collection,
            expected_version,
        });
        self
    }

    pub fn remove_data_attribute(&mut self, collection_id: &str, attribute_id: &str) -> &mut Self {
        self.writes.push(Write::RemoveDataAttribute {
            collection_id: collection_id.to_string(),
            attribute_id: attribute_id.to_string(),
        });
        self
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}
