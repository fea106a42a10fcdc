use serde::Serialize;

use super::AppState;
use crate::error::{Error, Result};
use crate::types::Collection;

/// What one cleanup run removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub link_types: usize,
    pub links: usize,
    pub favorites: usize,
    pub attachments: usize,
}

/// Ordered cascade run after documents or collections disappear:
/// links, then favorites, then attachments.
///
/// Every stage runs even when an earlier one fails; the first failure is
/// returned once all stages finished. Stages are idempotent, so a failed
/// run can be repeated.
pub struct Cleanup<'a> {
    state: &'a AppState,
}

impl<'a> Cleanup<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub fn documents_removed(
        &self,
        collection: &Collection,
        document_ids: &[String],
    ) -> Result<CleanupReport> {
        if document_ids.is_empty() {
            return Ok(CleanupReport::default());
        }

        let mut failure = None;
        let report = CleanupReport {
            link_types: 0,
            links: stage(&mut failure, "links", || {
                self.state.links().delete_links_for_documents(document_ids)
            }),
            favorites: stage(&mut failure, "favorites", || {
                self.state.favorites().remove_all_for_documents(document_ids)
            }),
            attachments: stage(&mut failure, "attachments", || {
                self.remove_attachments(collection, document_ids)
            }),
        };
        finish(failure, report)
    }

    /// Cascade for a dropped collection: its link types (and their
    /// instances), links from other types touching its documents, every
    /// favorite pointing into it, and its attachments.
    pub fn collection_removed(
        &self,
        collection: &Collection,
        document_ids: &[String],
    ) -> Result<CleanupReport> {
        let mut failure = None;
        let report = CleanupReport {
            link_types: stage(&mut failure, "link types", || {
                self.state
                    .links()
                    .delete_link_types_for_collection(&collection.id)
            }),
            links: stage(&mut failure, "links", || {
                self.state.links().delete_links_for_documents(document_ids)
            }),
            favorites: stage(&mut failure, "favorites", || {
                self.state
                    .favorites()
                    .remove_all_for_collection(&collection.id)
            }),
            attachments: stage(&mut failure, "attachments", || {
                self.remove_attachments(collection, document_ids)
            }),
        };
        finish(failure, report)
    }

    fn remove_attachments(&self, collection: &Collection, document_ids: &[String]) -> Result<usize> {
        let attribute_ids = self
            .state
            .constraints
            .file_attribute_ids(&collection.attributes);
        let mut removed = 0;
        for document_id in document_ids {
            for attribute_id in &attribute_ids {
                removed += self
                    .state
                    .attachments
                    .remove_all(&collection.id, document_id, attribute_id)?;
            }
        }
        Ok(removed)
    }
}

fn stage<F>(failure: &mut Option<Error>, name: &str, run: F) -> usize
where
    F: FnOnce() -> Result<usize>,
{
    match run() {
        Ok(removed) => removed,
        Err(e) => {
            tracing::warn!(stage = name, "cleanup stage failed: {e}");
            failure.get_or_insert(e);
            0
        }
    }
}

fn finish(failure: Option<Error>, report: CleanupReport) -> Result<CleanupReport> {
    match failure {
        Some(e) => Err(e),
        None => Ok(report),
    }
}
