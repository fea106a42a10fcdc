use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::validation::validate_attribute_id;
use super::{AppState, load_collection};
use crate::access::PermissionChecker;
use crate::error::{Error, Result};
use crate::ledger::{
    AttributeUsageLedger, UsageCounts, UsageDelta, apply_usage, apply_usage_counts,
};
use crate::notify::Event;
use crate::store::{Store, WriteBatch};
use crate::types::{
    Collection, DataRecord, Document, META_ORIGINAL_DOCUMENT_ID, MetaData, NewDocument,
    ResourceType, Roles, Value,
};
use crate::workspace::Workspace;

/// Result of [`DocumentStore::duplicate`].
#[derive(Debug, Clone, Serialize)]
pub struct Duplicated {
    pub documents: Vec<Document>,
    /// Original document id to clone id.
    pub id_map: BTreeMap<String, String>,
}

/// Document lifecycle. Every mutation commits the document and the
/// collection ledger in one batch.
pub struct DocumentStore<'a> {
    state: &'a AppState,
}

impl<'a> DocumentStore<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn store(&self) -> &dyn Store {
        self.state.store.as_ref()
    }

    fn writable(&self, ws: &Workspace, collection_id: &str) -> Result<Collection> {
        let collection = load_collection(self.store(), ws, collection_id)?;
        ws.checker()
            .check_role_with_view(&collection, Roles::WRITE, Roles::WRITE)?;
        Ok(collection)
    }

    fn readable(&self, ws: &Workspace, collection_id: &str) -> Result<Collection> {
        let collection = load_collection(self.store(), ws, collection_id)?;
        ws.checker()
            .check_role_with_view(&collection, Roles::READ, Roles::READ)?;
        Ok(collection)
    }

    fn existing(&self, collection_id: &str, document_id: &str) -> Result<Document> {
        self.store()
            .get_document(collection_id, document_id)?
            .ok_or(Error::ResourceNotFound(ResourceType::Document))
    }

    fn check_quota(&self, ws: &Workspace, adding: u64) -> Result<()> {
        let limits = &ws.organization.service_limits;
        if limits.max_documents.is_none() {
            return Ok(());
        }
        let current = self
            .store()
            .count_organization_documents(&ws.organization.id)?;
        PermissionChecker::check_document_limits(limits, current, adding)
    }

    fn encode(&self, collection: &Collection, data: &mut DataRecord) -> Result<()> {
        for id in data.keys() {
            validate_attribute_id(id)?;
        }
        self.state.constraints.encode(&collection.attributes, data);
        Ok(())
    }

    fn decode(&self, collection: &Collection, mut document: Document) -> Document {
        self.state
            .constraints
            .decode(&collection.attributes, &mut document.data);
        document
    }

    fn notify(&self, event: Event) {
        self.state.notifier.notify(event);
    }

    pub fn create(
        &self,
        ws: &Workspace,
        collection_id: &str,
        document: NewDocument,
    ) -> Result<Document> {
        let collection = self.writable(ws, collection_id)?;
        self.check_quota(ws, 1)?;

        let mut data = document.data;
        self.encode(&collection, &mut data)?;

        let now = Utc::now();
        let stored = Document {
            id: Uuid::new_v4().to_string(),
            collection_id: collection.id.clone(),
            created_by: ws.user_id().to_string(),
            created_at: now,
            updated_by: None,
            updated_at: None,
            meta_data: document.meta_data,
            data,
        };

        let next = apply_usage(&collection, &UsageDelta::created(&stored.data), now);
        let mut batch = WriteBatch::new();
        batch.insert_document(stored.clone());
        AttributeUsageLedger::stage(&mut batch, &collection, next.clone());
        self.store().commit(&batch)?;

        tracing::debug!(collection = %collection.id, document = %stored.id, "document created");
        let created = self.decode(&next, stored);
        self.notify(Event::DocumentCreated {
            project_id: ws.project_id().to_string(),
            document: created.clone(),
        });
        Ok(created)
    }

    /// Creates all `documents` with a single ledger update. Emits one
    /// `CollectionImported` event when `notify` is set and no per-document
    /// events.
    pub fn create_many(
        &self,
        ws: &Workspace,
        collection_id: &str,
        documents: Vec<NewDocument>,
        notify: bool,
    ) -> Result<Vec<Document>> {
        let collection = self.writable(ws, collection_id)?;
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        self.check_quota(ws, documents.len() as u64)?;

        let now = Utc::now();
        let mut counts = UsageCounts::default();
        let mut batch = WriteBatch::new();
        let mut stored = Vec::with_capacity(documents.len());

        for document in documents {
            let mut data = document.data;
            self.encode(&collection, &mut data)?;
            counts.add_document(&data);

            let doc = Document {
                id: Uuid::new_v4().to_string(),
                collection_id: collection.id.clone(),
                created_by: ws.user_id().to_string(),
                created_at: now,
                updated_by: None,
                updated_at: None,
                meta_data: document.meta_data,
                data,
            };
            batch.insert_document(doc.clone());
            stored.push(doc);
        }

        let next = apply_usage_counts(&collection, &counts, now);
        AttributeUsageLedger::stage(&mut batch, &collection, next.clone());
        self.store().commit(&batch)?;

        tracing::info!(collection = %collection.id, documents = stored.len(), "documents imported");
        if notify {
            self.notify(Event::CollectionImported {
                project_id: ws.project_id().to_string(),
                collection_id: collection.id.clone(),
                documents: stored.len(),
            });
        }
        Ok(stored
            .into_iter()
            .map(|doc| self.decode(&next, doc))
            .collect())
    }

    pub fn get(&self, ws: &Workspace, collection_id: &str, document_id: &str) -> Result<Document> {
        let collection = self.readable(ws, collection_id)?;
        let document = self.existing(&collection.id, document_id)?;
        Ok(self.decode(&collection, document))
    }

    pub fn list(&self, ws: &Workspace, collection_id: &str) -> Result<Vec<Document>> {
        let collection = self.readable(ws, collection_id)?;
        Ok(self
            .store()
            .list_documents(&collection.id)?
            .into_iter()
            .map(|doc| self.decode(&collection, doc))
            .collect())
    }

    /// Replaces the whole Data record.
    pub fn update_data(
        &self,
        ws: &Workspace,
        collection_id: &str,
        document_id: &str,
        data: DataRecord,
    ) -> Result<Document> {
        let collection = self.writable(ws, collection_id)?;
        let before = self.existing(&collection.id, document_id)?;

        let mut data = data;
        self.encode(&collection, &mut data)?;
        self.write_data(ws, &collection, before, data)
    }

    /// Merges `patch` into the Data record; keys absent from the patch keep
    /// their value.
    pub fn patch_data(
        &self,
        ws: &Workspace,
        collection_id: &str,
        document_id: &str,
        patch: DataRecord,
    ) -> Result<Document> {
        let collection = self.writable(ws, collection_id)?;
        let before = self.existing(&collection.id, document_id)?;

        let mut patch = patch;
        self.encode(&collection, &mut patch)?;
        let mut merged = before.data.clone();
        merged.extend(patch);
        self.write_data(ws, &collection, before, merged)
    }

    fn write_data(
        &self,
        ws: &Workspace,
        collection: &Collection,
        before: Document,
        data: DataRecord,
    ) -> Result<Document> {
        let now = Utc::now();
        let delta = UsageDelta::changed(&before.data, &data);
        let after = Document {
            updated_by: Some(ws.user_id().to_string()),
            updated_at: Some(now),
            data,
            ..before.clone()
        };

        let next = apply_usage(collection, &delta, now);
        let mut batch = WriteBatch::new();
        batch.replace_document(after.clone());
        AttributeUsageLedger::stage(&mut batch, collection, next.clone());
        self.store().commit(&batch)?;

        tracing::debug!(
            collection = %collection.id,
            document = %after.id,
            added = delta.increment.len(),
            removed = delta.decrement.len(),
            "document data updated"
        );
        let before = self.decode(collection, before);
        let after = self.decode(&next, after);
        self.notify(Event::DocumentUpdated {
            project_id: ws.project_id().to_string(),
            before,
            after: after.clone(),
        });
        Ok(after)
    }

    pub fn update_meta_data(
        &self,
        ws: &Workspace,
        collection_id: &str,
        document_id: &str,
        meta_data: MetaData,
    ) -> Result<Document> {
        let collection = self.writable(ws, collection_id)?;
        let before = self.existing(&collection.id, document_id)?;
        self.write_meta_data(ws, &collection, before, meta_data)
    }

    pub fn patch_meta_data(
        &self,
        ws: &Workspace,
        collection_id: &str,
        document_id: &str,
        patch: MetaData,
    ) -> Result<Document> {
        let collection = self.writable(ws, collection_id)?;
        let before = self.existing(&collection.id, document_id)?;
        let mut merged = before.meta_data.clone();
        merged.extend(patch);
        self.write_meta_data(ws, &collection, before, merged)
    }

    fn write_meta_data(
        &self,
        ws: &Workspace,
        collection: &Collection,
        before: Document,
        meta_data: MetaData,
    ) -> Result<Document> {
        let after = Document {
            updated_by: Some(ws.user_id().to_string()),
            updated_at: Some(Utc::now()),
            meta_data,
            ..before.clone()
        };

        let mut batch = WriteBatch::new();
        batch.replace_document(after.clone());
        self.store().commit(&batch)?;

        let before = self.decode(collection, before);
        let after = self.decode(collection, after);
        self.notify(Event::DocumentUpdated {
            project_id: ws.project_id().to_string(),
            before,
            after: after.clone(),
        });
        Ok(after)
    }

    /// Deletes the document, then removes its links, favorites and
    /// attachments. A failing cleanup stage is returned after the document
    /// itself was deleted.
    pub fn delete(&self, ws: &Workspace, collection_id: &str, document_id: &str) -> Result<()> {
        let collection = self.writable(ws, collection_id)?;
        let existing = self.existing(&collection.id, document_id)?;

        let next = apply_usage(&collection, &UsageDelta::deleted(&existing.data), Utc::now());
        let mut batch = WriteBatch::new();
        batch.delete_document(&collection.id, &existing.id);
        AttributeUsageLedger::stage(&mut batch, &collection, next.clone());
        self.store().commit(&batch)?;

        let document_ids = [existing.id.clone()];
        let cleanup = self
            .state
            .cleanup()
            .documents_removed(&collection, &document_ids);

        let deleted = self.decode(&next, existing);
        self.notify(Event::DocumentDeleted {
            project_id: ws.project_id().to_string(),
            document: deleted,
        });

        // The document is gone either way; a failed cascade is reported so
        // the caller can re-run it.
        let report = cleanup?;
        tracing::debug!(
            collection = %collection.id,
            document = %document_ids[0],
            links = report.links,
            favorites = report.favorites,
            "document deleted"
        );
        Ok(())
    }

    /// Clones documents with fresh ids. Each clone records its source in
    /// `originalDocumentId` and receives copies of its file attachments.
    pub fn duplicate(
        &self,
        ws: &Workspace,
        collection_id: &str,
        document_ids: &[String],
    ) -> Result<Duplicated> {
        let collection = self.writable(ws, collection_id)?;
        if document_ids.is_empty() {
            return Ok(Duplicated {
                documents: Vec::new(),
                id_map: BTreeMap::new(),
            });
        }
        self.check_quota(ws, document_ids.len() as u64)?;

        let now = Utc::now();
        let mut counts = UsageCounts::default();
        let mut batch = WriteBatch::new();
        let mut clones = Vec::with_capacity(document_ids.len());
        let mut id_map = BTreeMap::new();

        for original_id in document_ids {
            let original = self.existing(&collection.id, original_id)?;
            let mut meta_data = original.meta_data.clone();
            meta_data.insert(
                META_ORIGINAL_DOCUMENT_ID.to_string(),
                Value::String(original.id.clone()),
            );

            let clone = Document {
                id: Uuid::new_v4().to_string(),
                created_by: ws.user_id().to_string(),
                created_at: now,
                updated_by: None,
                updated_at: None,
                meta_data,
                ..original
            };
            counts.add_document(&clone.data);
            batch.insert_document(clone.clone());
            id_map.insert(original_id.clone(), clone.id.clone());
            clones.push(clone);
        }

        let next = apply_usage_counts(&collection, &counts, now);
        AttributeUsageLedger::stage(&mut batch, &collection, next.clone());
        self.store().commit(&batch)?;

        let file_attributes = self
            .state
            .constraints
            .file_attribute_ids(&collection.attributes);
        if !file_attributes.is_empty() {
            if let Err(e) =
                self.state
                    .attachments
                    .duplicate(&collection.id, &file_attributes, &id_map)
            {
                tracing::warn!(collection = %collection.id, "failed to duplicate attachments: {e}");
            }
        }

        let documents: Vec<Document> = clones
            .into_iter()
            .map(|doc| self.decode(&next, doc))
            .collect();
        for document in &documents {
            self.notify(Event::DocumentCreated {
                project_id: ws.project_id().to_string(),
                document: document.clone(),
            });
        }
        tracing::info!(collection = %collection.id, documents = documents.len(), "documents duplicated");
        Ok(Duplicated { documents, id_map })
    }
}
