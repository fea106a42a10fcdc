mod batch;
pub mod naming;
mod schema;
mod sqlite;

pub use batch::{Write, WriteBatch};
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the persistence interface of the platform core.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Organization operations
    fn create_organization(&self, org: &Organization) -> Result<()>;
    fn get_organization(&self, id: &str) -> Result<Option<Organization>>;
    fn get_organization_by_code(&self, code: &str) -> Result<Option<Organization>>;
    fn list_organizations(&self) -> Result<Vec<Organization>>;
    fn update_organization(&self, org: &Organization) -> Result<()>;
    fn delete_organization(&self, id: &str) -> Result<bool>;

    // Project operations
    fn create_project(&self, project: &Project) -> Result<()>;
    fn get_project(&self, id: &str) -> Result<Option<Project>>;
    fn get_project_by_code(&self, organization_id: &str, code: &str) -> Result<Option<Project>>;
    fn list_projects(&self, organization_id: &str) -> Result<Vec<Project>>;
    fn count_projects(&self, organization_id: &str) -> Result<u64>;
    fn update_project(&self, project: &Project) -> Result<()>;
    fn delete_project(&self, id: &str) -> Result<bool>;

    // Collection operations (also own the per-collection Data table)
    fn create_collection(&self, collection: &Collection) -> Result<()>;
    fn get_collection(&self, id: &str) -> Result<Option<Collection>>;
    fn get_collection_by_code(&self, project_id: &str, code: &str) -> Result<Option<Collection>>;
    fn list_collections(&self, project_id: &str) -> Result<Vec<Collection>>;
    fn count_collections(&self, project_id: &str) -> Result<u64>;
    fn delete_collection(&self, id: &str) -> Result<bool>;

    // View operations
    fn create_view(&self, view: &View) -> Result<()>;
    fn get_view(&self, id: &str) -> Result<Option<View>>;
    fn list_views(&self, project_id: &str) -> Result<Vec<View>>;
    fn update_view(&self, view: &View) -> Result<()>;
    fn delete_view(&self, id: &str) -> Result<bool>;

    // Document reads; writes go through `commit`
    fn get_document(&self, collection_id: &str, id: &str) -> Result<Option<Document>>;
    fn list_documents(&self, collection_id: &str) -> Result<Vec<Document>>;
    fn list_document_ids(&self, collection_id: &str) -> Result<Vec<String>>;
    fn count_organization_documents(&self, organization_id: &str) -> Result<u64>;

    // Link type operations
    fn create_link_type(&self, link_type: &LinkType) -> Result<()>;
    fn get_link_type(&self, id: &str) -> Result<Option<LinkType>>;
    fn list_link_types(&self, project_id: &str) -> Result<Vec<LinkType>>;
    fn list_link_types_for_collection(&self, collection_id: &str) -> Result<Vec<LinkType>>;
    fn delete_link_type(&self, id: &str) -> Result<bool>;

    // Link instance operations
    fn create_link_instance(&self, link: &LinkInstance) -> Result<()>;
    fn get_link_instance(&self, id: &str) -> Result<Option<LinkInstance>>;
    fn list_link_instances(&self, link_type_id: &str) -> Result<Vec<LinkInstance>>;
    fn list_link_instances_for_documents(&self, document_ids: &[String]) -> Result<Vec<LinkInstance>>;
    fn delete_link_instance(&self, id: &str) -> Result<bool>;
    fn delete_link_instances_for_documents(&self, document_ids: &[String]) -> Result<usize>;

    // Favorite operations
    fn add_favorite(&self, item: &FavoriteItem) -> Result<()>;
    fn remove_favorite(
        &self,
        user_id: &str,
        project_id: &str,
        resource_type: FavoriteType,
        resource_id: &str,
    ) -> Result<bool>;
    fn list_favorites(
        &self,
        user_id: &str,
        project_id: &str,
        resource_type: FavoriteType,
    ) -> Result<Vec<FavoriteItem>>;
    fn delete_favorites_for_project(&self, project_id: &str) -> Result<usize>;
    fn delete_favorites_for_collection(&self, collection_id: &str) -> Result<usize>;
    fn delete_favorites_for_resources(
        &self,
        resource_type: FavoriteType,
        resource_ids: &[String],
    ) -> Result<usize>;
    fn delete_favorites_for_user(&self, user_id: &str, project_id: &str) -> Result<usize>;

    /// Applies every write in `batch` atomically.
    ///
    /// Fails with `StorageConflict` when a collection write carries a stale
    /// version; nothing from the batch is persisted in that case.
    fn commit(&self, batch: &WriteBatch) -> Result<()>;
}
