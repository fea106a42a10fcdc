#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use vellum::attachments::FsAttachmentStore;
use vellum::notify::MemorySink;
use vellum::service::AppState;
use vellum::store::{SqliteStore, Store};
use vellum::types::{
    Collection, DataRecord, NewDocument, Principal, Roles, ServiceLimits, record_from_json,
};
use vellum::workspace::Workspace;

pub const OWNER: &str = "owner";

/// A platform backed by a temporary SQLite file, with one organization
/// (`acme`), one project (`crm`) and one collection (`contacts`) owned by
/// [`OWNER`].
pub struct Platform {
    pub temp_dir: TempDir,
    pub state: Arc<AppState>,
    pub events: Arc<MemorySink>,
    pub attachments: Arc<FsAttachmentStore>,
    pub organization_id: String,
    pub project_id: String,
    pub contacts: Collection,
}

impl Platform {
    pub fn new() -> Self {
        Self::with_limits(ServiceLimits::default())
    }

    pub fn with_limits(limits: ServiceLimits) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = SqliteStore::new(temp_dir.path().join("vellum.db")).expect("open store");
        store.initialize().expect("initialize store");

        let events = Arc::new(MemorySink::new());
        let attachments = Arc::new(FsAttachmentStore::new(&temp_dir.path().join("attachments")));
        let state = Arc::new(
            AppState::new(Arc::new(store))
                .with_notifier(events.clone())
                .with_attachments(attachments.clone()),
        );

        let owner = Principal::new(OWNER);
        let hierarchy = state.hierarchy();
        let org = hierarchy
            .create_organization(&owner, "acme", "Acme", limits)
            .expect("create organization");
        let project = hierarchy
            .create_project(&owner, &org.id, "crm", "CRM")
            .expect("create project");
        let ws = hierarchy
            .resolve_workspace(&owner, "acme", "crm", None)
            .expect("resolve workspace");
        let contacts = hierarchy
            .create_collection(&ws, "contacts", "Contacts")
            .expect("create collection");

        Self {
            temp_dir,
            state,
            events,
            attachments,
            organization_id: org.id,
            project_id: project.id,
            contacts,
        }
    }

    pub fn owner(&self) -> Workspace {
        self.workspace(&Principal::new(OWNER))
    }

    pub fn workspace(&self, principal: &Principal) -> Workspace {
        self.state
            .hierarchy()
            .resolve_workspace(principal, "acme", "crm", None)
            .expect("resolve workspace")
    }

    /// Gives `user` READ on the organization and project plus `roles` on
    /// `collection_id`, and returns their workspace.
    pub fn member(&self, user: &str, collection_id: &str, roles: Roles) -> Workspace {
        let owner = Principal::new(OWNER);
        let hierarchy = self.state.hierarchy();
        hierarchy
            .share_organization(&owner, &self.organization_id, user, Roles::READ)
            .expect("share organization");
        hierarchy
            .share_project(&owner, &self.project_id, user, Roles::READ)
            .expect("share project");

        let ws = self.owner();
        let collection = self.collection(collection_id);
        let mut permissions = collection.permissions.clone();
        permissions.update_user(user, roles);
        hierarchy
            .update_collection_permissions(&ws, collection_id, permissions)
            .expect("update collection permissions");

        self.workspace(&Principal::new(user))
    }

    pub fn collection(&self, collection_id: &str) -> Collection {
        self.state
            .store
            .get_collection(collection_id)
            .expect("read collection")
            .expect("collection exists")
    }

    pub fn usage(&self, collection_id: &str, attribute_id: &str) -> Option<u64> {
        self.collection(collection_id)
            .attribute(attribute_id)
            .map(|a| a.usage_count)
    }

    pub fn create_collection(&self, code: &str) -> Collection {
        self.state
            .hierarchy()
            .create_collection(&self.owner(), code, code)
            .expect("create collection")
    }
}

pub fn record(value: serde_json::Value) -> DataRecord {
    record_from_json(value)
}

pub fn doc(value: serde_json::Value) -> NewDocument {
    NewDocument::new(record(value))
}

pub fn named(name: &str) -> NewDocument {
    doc(json!({ "name": name }))
}
