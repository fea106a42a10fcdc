//! The platform's operations, composed from the store, the permission
//! checker, the codec, the ledger and the injected collaborators.

mod cleanup;
mod documents;
mod favorites;
mod hierarchy;
mod links;
pub mod validation;

use std::fs;
use std::sync::Arc;

pub use cleanup::{Cleanup, CleanupReport};
pub use documents::{DocumentStore, Duplicated};
pub use favorites::{FavoriteTarget, FavoritesIndex};
pub use hierarchy::{AttributeDefinition, ResourceHierarchy};
pub use links::LinkStore;

use crate::attachments::{AttachmentStore, FsAttachmentStore, NoopAttachments};
use crate::config::{NotificationMode, PlatformConfig};
use crate::constraint::ConstraintManager;
use crate::error::{Error, Result};
use crate::notify::{LogSink, NoopSink, NotificationSink};
use crate::store::{SqliteStore, Store};
use crate::types::{Collection, ResourceType};
use crate::workspace::Workspace;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub notifier: Arc<dyn NotificationSink>,
    pub constraints: ConstraintManager,
}

impl AppState {
    /// State over `store` with attachments and notifications disabled.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            attachments: Arc::new(NoopAttachments),
            notifier: Arc::new(NoopSink),
            constraints: ConstraintManager::new(),
        }
    }

    #[must_use]
    pub fn with_attachments(mut self, attachments: Arc<dyn AttachmentStore>) -> Self {
        self.attachments = attachments;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Opens (and initializes) the SQLite store described by `config`.
    pub fn from_config(config: &PlatformConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let store = SqliteStore::new(config.db_path())?;
        store.initialize()?;

        let mut state = Self::new(Arc::new(store));
        if config.attachments {
            state = state.with_attachments(Arc::new(FsAttachmentStore::new(
                &config.attachments_dir(),
            )));
        }
        if config.notifications == NotificationMode::Log {
            state = state.with_notifier(Arc::new(LogSink));
        }
        Ok(state)
    }

    pub fn hierarchy(&self) -> ResourceHierarchy<'_> {
        ResourceHierarchy::new(self)
    }

    pub fn documents(&self) -> DocumentStore<'_> {
        DocumentStore::new(self)
    }

    pub fn links(&self) -> LinkStore<'_> {
        LinkStore::new(self)
    }

    pub fn favorites(&self) -> FavoritesIndex<'_> {
        FavoritesIndex::new(self)
    }

    pub fn cleanup(&self) -> Cleanup<'_> {
        Cleanup::new(self)
    }
}

/// Loads a collection of the workspace project. Collections of other
/// projects are reported as missing.
pub(crate) fn load_collection(
    store: &dyn Store,
    ws: &Workspace,
    collection_id: &str,
) -> Result<Collection> {
    store
        .get_collection(collection_id)?
        .filter(|c| c.project_id == ws.project_id())
        .ok_or(Error::ResourceNotFound(ResourceType::Collection))
}
