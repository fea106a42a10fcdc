use chrono::Utc;

use super::{AppState, load_collection};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{FavoriteItem, FavoriteType, ResourceType, Roles};
use crate::workspace::Workspace;

/// A resource a user can bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteTarget<'t> {
    Collection(&'t str),
    Document {
        collection_id: &'t str,
        document_id: &'t str,
    },
    View(&'t str),
}

impl FavoriteTarget<'_> {
    pub fn resource_type(&self) -> FavoriteType {
        match self {
            FavoriteTarget::Collection(_) => FavoriteType::Collection,
            FavoriteTarget::Document { .. } => FavoriteType::Document,
            FavoriteTarget::View(_) => FavoriteType::View,
        }
    }

    pub fn resource_id(&self) -> &str {
        match self {
            FavoriteTarget::Collection(id) | FavoriteTarget::View(id) => id,
            FavoriteTarget::Document { document_id, .. } => document_id,
        }
    }
}

/// Per-user bookmarks scoped to a project.
pub struct FavoritesIndex<'a> {
    state: &'a AppState,
}

impl<'a> FavoritesIndex<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn store(&self) -> &dyn Store {
        self.state.store.as_ref()
    }

    /// Bookmarks `target` for the calling user. Requires READ on it.
    pub fn add(&self, ws: &Workspace, target: FavoriteTarget<'_>) -> Result<()> {
        let checker = ws.checker();
        let collection_id = match target {
            FavoriteTarget::Collection(id) => {
                let collection = load_collection(self.store(), ws, id)?;
                checker.check_role_with_view(&collection, Roles::READ, Roles::READ)?;
                None
            }
            FavoriteTarget::Document {
                collection_id,
                document_id,
            } => {
                let collection = load_collection(self.store(), ws, collection_id)?;
                checker.check_role_with_view(&collection, Roles::READ, Roles::READ)?;
                if self
                    .store()
                    .get_document(&collection.id, document_id)?
                    .is_none()
                {
                    return Err(Error::ResourceNotFound(ResourceType::Document));
                }
                Some(collection.id)
            }
            FavoriteTarget::View(id) => {
                let view = self
                    .store()
                    .get_view(id)?
                    .filter(|v| v.project_id == ws.project_id())
                    .ok_or(Error::ResourceNotFound(ResourceType::View))?;
                checker.check_role(&view, Roles::READ)?;
                None
            }
        };

        self.store().add_favorite(&FavoriteItem {
            user_id: ws.user_id().to_string(),
            project_id: ws.project_id().to_string(),
            resource_type: target.resource_type(),
            resource_id: target.resource_id().to_string(),
            collection_id,
            created_at: Utc::now(),
        })
    }

    /// Removes the caller's own bookmark; never touches other users.
    pub fn remove(&self, ws: &Workspace, target: FavoriteTarget<'_>) -> Result<bool> {
        self.store().remove_favorite(
            ws.user_id(),
            ws.project_id(),
            target.resource_type(),
            target.resource_id(),
        )
    }

    pub fn is_favorite(&self, ws: &Workspace, target: FavoriteTarget<'_>) -> Result<bool> {
        Ok(self
            .favorite_ids(ws, target.resource_type())?
            .iter()
            .any(|id| id == target.resource_id()))
    }

    pub fn favorite_ids(&self, ws: &Workspace, resource_type: FavoriteType) -> Result<Vec<String>> {
        Ok(self
            .store()
            .list_favorites(ws.user_id(), ws.project_id(), resource_type)?
            .into_iter()
            .map(|item| item.resource_id)
            .collect())
    }

    pub fn remove_all_for_project(&self, project_id: &str) -> Result<usize> {
        self.store().delete_favorites_for_project(project_id)
    }

    /// Drops bookmarks of the collection and of every document in it.
    pub fn remove_all_for_collection(&self, collection_id: &str) -> Result<usize> {
        self.store().delete_favorites_for_collection(collection_id)
    }

    pub fn remove_all_for_document(&self, document_id: &str) -> Result<usize> {
        self.remove_all_for_documents(&[document_id.to_string()])
    }

    pub fn remove_all_for_documents(&self, document_ids: &[String]) -> Result<usize> {
        self.store()
            .delete_favorites_for_resources(FavoriteType::Document, document_ids)
    }

    pub fn remove_all_for_view(&self, view_id: &str) -> Result<usize> {
        self.store()
            .delete_favorites_for_resources(FavoriteType::View, &[view_id.to_string()])
    }

    /// Drops every bookmark of a user leaving a project.
    pub fn remove_all_for_user(&self, user_id: &str, project_id: &str) -> Result<usize> {
        self.store().delete_favorites_for_user(user_id, project_id)
    }
}
