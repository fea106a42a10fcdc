//! File attachments referenced from document attributes.
//!
//! Binary transport is out of scope for the core; it only needs to drop and
//! copy the attachments owned by a document when the document goes away or
//! is duplicated.

mod storage;

use std::collections::BTreeMap;

pub use storage::{FsAttachmentStore, is_valid_content_id};

use crate::error::Result;

pub trait AttachmentStore: Send + Sync {
    /// Removes every attachment of `document_id` stored under `attribute_id`.
    /// Returns how many were removed; removing nothing is not an error.
    fn remove_all(&self, collection_id: &str, document_id: &str, attribute_id: &str)
    -> Result<usize>;

    /// Copies the attachments of each source document to its clone, keyed by
    /// the original to clone id map.
    fn duplicate(
        &self,
        collection_id: &str,
        attribute_ids: &[String],
        id_map: &BTreeMap<String, String>,
    ) -> Result<usize>;
}

/// Attachment store for deployments without file support.
#[derive(Debug, Default)]
pub struct NoopAttachments;

impl AttachmentStore for NoopAttachments {
    fn remove_all(&self, _: &str, _: &str, _: &str) -> Result<usize> {
        Ok(0)
    }

    fn duplicate(&self, _: &str, _: &[String], _: &BTreeMap<String, String>) -> Result<usize> {
        Ok(0)
    }
}
