use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::{validate_attribute_id, validate_code, validate_name};
use super::{AppState, load_collection};
use crate::access::PermissionChecker;
use crate::constraint::Constraint;
use crate::error::{Error, Result};
use crate::store::{Store, WriteBatch};
use crate::types::{
    Attribute, Collection, Organization, Permissions, Principal, Project, ResourceType, Roles,
    ServiceLimits, View,
};
use crate::workspace::Workspace;

/// Declared shape of an attribute. Usage is never set by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
}

/// Organization, project, collection and view lifecycle plus workspace
/// resolution.
pub struct ResourceHierarchy<'a> {
    state: &'a AppState,
}

impl<'a> ResourceHierarchy<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn store(&self) -> &dyn Store {
        self.state.store.as_ref()
    }

    fn organization(&self, organization_id: &str) -> Result<Organization> {
        self.store()
            .get_organization(organization_id)?
            .ok_or(Error::ResourceNotFound(ResourceType::Organization))
    }

    // Organizations

    /// Creates an organization; the creator holds every role on it.
    pub fn create_organization(
        &self,
        principal: &Principal,
        code: &str,
        name: &str,
        service_limits: ServiceLimits,
    ) -> Result<Organization> {
        validate_code(code, ResourceType::Organization)?;
        validate_name(name, ResourceType::Organization)?;

        let organization = Organization {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            name: name.to_string(),
            permissions: Permissions::with_user(&principal.user_id, Roles::all()),
            service_limits,
            created_at: Utc::now(),
        };
        self.store().create_organization(&organization)?;

        tracing::info!(organization = %organization.code, "organization created");
        Ok(organization)
    }

    pub fn get_organization(&self, principal: &Principal, code: &str) -> Result<Organization> {
        let organization = self
            .store()
            .get_organization_by_code(code)?
            .ok_or(Error::ResourceNotFound(ResourceType::Organization))?;
        PermissionChecker::for_organization(principal, &organization)
            .check_role(&organization, Roles::READ)?;
        Ok(organization)
    }

    pub fn list_organizations(&self, principal: &Principal) -> Result<Vec<Organization>> {
        Ok(self
            .store()
            .list_organizations()?
            .into_iter()
            .filter(|o| PermissionChecker::for_organization(principal, o).has_role(o, Roles::READ))
            .collect())
    }

    pub fn update_service_limits(
        &self,
        principal: &Principal,
        organization_id: &str,
        service_limits: ServiceLimits,
    ) -> Result<Organization> {
        let mut organization = self.organization(organization_id)?;
        PermissionChecker::for_organization(principal, &organization)
            .check_role(&organization, Roles::MANAGE)?;

        organization.service_limits = service_limits;
        self.store().update_organization(&organization)?;
        Ok(organization)
    }

    /// Grants `roles` on the organization to a user. Requires MANAGE.
    pub fn share_organization(
        &self,
        principal: &Principal,
        organization_id: &str,
        user_id: &str,
        roles: Roles,
    ) -> Result<Organization> {
        let mut organization = self.organization(organization_id)?;
        PermissionChecker::for_organization(principal, &organization)
            .check_role(&organization, Roles::MANAGE)?;

        organization.permissions.update_user(user_id, roles);
        self.store().update_organization(&organization)?;
        Ok(organization)
    }

    /// Deletes the organization after tearing down each of its projects.
    pub fn delete_organization(&self, principal: &Principal, organization_id: &str) -> Result<()> {
        let organization = self.organization(organization_id)?;
        PermissionChecker::for_organization(principal, &organization)
            .check_role(&organization, Roles::MANAGE)?;

        for project in self.store().list_projects(&organization.id)? {
            self.teardown_project(&project)?;
        }
        self.store().delete_organization(&organization.id)?;

        tracing::info!(organization = %organization.code, "organization deleted");
        Ok(())
    }

    // Projects

    pub fn create_project(
        &self,
        principal: &Principal,
        organization_id: &str,
        code: &str,
        name: &str,
    ) -> Result<Project> {
        let organization = self.organization(organization_id)?;
        PermissionChecker::for_organization(principal, &organization)
            .check_role(&organization, Roles::WRITE)?;
        validate_code(code, ResourceType::Project)?;
        validate_name(name, ResourceType::Project)?;

        let current = self.store().count_projects(&organization.id)?;
        PermissionChecker::check_creation_limits(
            &organization.service_limits,
            ResourceType::Project,
            current,
        )?;

        let project = Project {
            id: Uuid::new_v4().to_string(),
            organization_id: organization.id.clone(),
            code: code.to_string(),
            name: name.to_string(),
            permissions: Permissions::with_user(&principal.user_id, Roles::all()),
            created_at: Utc::now(),
        };
        self.store().create_project(&project)?;

        tracing::info!(organization = %organization.code, project = %project.code, "project created");
        Ok(project)
    }

    pub fn list_projects(&self, principal: &Principal, organization_id: &str) -> Result<Vec<Project>> {
        let organization = self.organization(organization_id)?;
        let checker = PermissionChecker::for_organization(principal, &organization);
        checker.check_role(&organization, Roles::READ)?;

        Ok(self
            .store()
            .list_projects(&organization.id)?
            .into_iter()
            .filter(|p| checker.has_role(p, Roles::READ))
            .collect())
    }

    fn managed_project(&self, principal: &Principal, project_id: &str) -> Result<Project> {
        let project = self
            .store()
            .get_project(project_id)?
            .ok_or(Error::ResourceNotFound(ResourceType::Project))?;
        let organization = self.organization(&project.organization_id)?;
        PermissionChecker::for_organization(principal, &organization)
            .with_project(&project)
            .check_role(&project, Roles::MANAGE)?;
        Ok(project)
    }

    /// Grants `roles` on the project to a user. Requires MANAGE.
    pub fn share_project(
        &self,
        principal: &Principal,
        project_id: &str,
        user_id: &str,
        roles: Roles,
    ) -> Result<Project> {
        let mut project = self.managed_project(principal, project_id)?;
        project.permissions.update_user(user_id, roles);
        self.store().update_project(&project)?;
        Ok(project)
    }

    /// Revokes a user's roles on the project and drops their bookmarks in it.
    pub fn remove_project_member(
        &self,
        principal: &Principal,
        project_id: &str,
        user_id: &str,
    ) -> Result<Project> {
        let mut project = self.managed_project(principal, project_id)?;
        project.permissions.remove_user(user_id);
        self.store().update_project(&project)?;
        self.state
            .favorites()
            .remove_all_for_user(user_id, &project.id)?;
        Ok(project)
    }

    pub fn delete_project(&self, principal: &Principal, project_id: &str) -> Result<()> {
        let project = self.managed_project(principal, project_id)?;
        self.teardown_project(&project)?;
        tracing::info!(project = %project.code, "project deleted");
        Ok(())
    }

    /// Removes collections (with their cascades), views, link types and
    /// favorites, then the project itself.
    fn teardown_project(&self, project: &Project) -> Result<()> {
        for collection in self.store().list_collections(&project.id)? {
            self.remove_collection(&collection)?;
        }
        for view in self.store().list_views(&project.id)? {
            self.store().delete_view(&view.id)?;
        }
        for link_type in self.store().list_link_types(&project.id)? {
            self.store().delete_link_type(&link_type.id)?;
        }
        self.state.favorites().remove_all_for_project(&project.id)?;
        self.store().delete_project(&project.id)?;
        Ok(())
    }

    /// Resolves the request context. The principal needs READ on both the
    /// organization and the project; a view must belong to the project.
    pub fn resolve_workspace(
        &self,
        principal: &Principal,
        organization_code: &str,
        project_code: &str,
        view_id: Option<&str>,
    ) -> Result<Workspace> {
        let organization = self
            .store()
            .get_organization_by_code(organization_code)?
            .ok_or(Error::ResourceNotFound(ResourceType::Organization))?;
        let project = self
            .store()
            .get_project_by_code(&organization.id, project_code)?
            .ok_or(Error::ResourceNotFound(ResourceType::Project))?;

        let view = match view_id {
            Some(id) => Some(
                self.store()
                    .get_view(id)?
                    .filter(|v| v.project_id == project.id)
                    .ok_or(Error::ResourceNotFound(ResourceType::View))?,
            ),
            None => None,
        };

        let ws = Workspace::new(principal.clone(), organization, project).with_view(view);
        let checker = ws.checker();
        checker.check_role(&ws.organization, Roles::READ)?;
        checker.check_role(&ws.project, Roles::READ)?;
        Ok(ws)
    }

    // Collections

    pub fn create_collection(&self, ws: &Workspace, code: &str, name: &str) -> Result<Collection> {
        ws.checker().check_role(&ws.project, Roles::WRITE)?;
        validate_code(code, ResourceType::Collection)?;
        validate_name(name, ResourceType::Collection)?;

        let current = self.store().count_collections(ws.project_id())?;
        PermissionChecker::check_creation_limits(
            &ws.organization.service_limits,
            ResourceType::Collection,
            current,
        )?;

        let now = Utc::now();
        let collection = Collection {
            id: Uuid::new_v4().to_string(),
            project_id: ws.project_id().to_string(),
            code: code.to_string(),
            name: name.to_string(),
            permissions: Permissions::with_user(ws.user_id(), Roles::all()),
            attributes: Vec::new(),
            documents_count: 0,
            last_time_used: now,
            version: 0,
            created_at: now,
        };
        self.store().create_collection(&collection)?;

        tracing::info!(project = %ws.project.code, collection = %collection.code, "collection created");
        Ok(collection)
    }

    pub fn get_collection(&self, ws: &Workspace, collection_id: &str) -> Result<Collection> {
        let collection = load_collection(self.store(), ws, collection_id)?;
        ws.checker()
            .check_role_with_view(&collection, Roles::READ, Roles::READ)?;
        Ok(collection)
    }

    pub fn get_collection_by_code(&self, ws: &Workspace, code: &str) -> Result<Collection> {
        let collection = self
            .store()
            .get_collection_by_code(ws.project_id(), code)?
            .ok_or(Error::ResourceNotFound(ResourceType::Collection))?;
        ws.checker()
            .check_role_with_view(&collection, Roles::READ, Roles::READ)?;
        Ok(collection)
    }

    pub fn list_collections(&self, ws: &Workspace) -> Result<Vec<Collection>> {
        let checker = ws.checker();
        Ok(self
            .store()
            .list_collections(ws.project_id())?
            .into_iter()
            .filter(|c| checker.has_role_with_view(c, Roles::READ, Roles::READ))
            .collect())
    }

    fn manageable(&self, ws: &Workspace, collection_id: &str) -> Result<Collection> {
        let collection = load_collection(self.store(), ws, collection_id)?;
        ws.checker().check_role(&collection, Roles::MANAGE)?;
        Ok(collection)
    }

    /// Commits `next` over `current` with compare-and-swap on the version.
    fn commit_collection(
        &self,
        current: &Collection,
        mut next: Collection,
        batch: &mut WriteBatch,
    ) -> Result<Collection> {
        next.version = current.version + 1;
        batch.update_collection(next.clone(), current.version);
        self.store().commit(batch)?;
        Ok(next)
    }

    /// Declares an attribute's name and constraint. Known attributes keep
    /// their usage count.
    pub fn set_attribute(
        &self,
        ws: &Workspace,
        collection_id: &str,
        definition: AttributeDefinition,
    ) -> Result<Collection> {
        validate_attribute_id(&definition.id)?;
        let collection = self.manageable(ws, collection_id)?;

        let mut next = collection.clone();
        let name = definition.name.unwrap_or_else(|| definition.id.clone());
        match next.attributes.iter_mut().find(|a| a.id == definition.id) {
            Some(attribute) => {
                attribute.name = name;
                attribute.constraint = definition.constraint;
            }
            None => next.attributes.push(Attribute {
                id: definition.id,
                name,
                constraint: definition.constraint,
                usage_count: 0,
            }),
        }

        self.commit_collection(&collection, next, &mut WriteBatch::new())
    }

    /// Removes an attribute and strips its key from every document.
    pub fn remove_attribute(
        &self,
        ws: &Workspace,
        collection_id: &str,
        attribute_id: &str,
    ) -> Result<Collection> {
        let collection = self.manageable(ws, collection_id)?;
        let Some(removed) = collection.attribute(attribute_id).cloned() else {
            return Err(Error::ResourceNotFound(ResourceType::Attribute));
        };

        let mut next = collection.clone();
        next.attributes.retain(|a| a.id != attribute_id);
        let mut batch = WriteBatch::new();
        batch.remove_data_attribute(&collection.id, attribute_id);
        let next = self.commit_collection(&collection, next, &mut batch)?;

        if matches!(removed.constraint, Some(Constraint::FileAttachment)) {
            let mut failure = None;
            for document_id in self.store().list_document_ids(&collection.id)? {
                if let Err(e) =
                    self.state
                        .attachments
                        .remove_all(&collection.id, &document_id, attribute_id)
                {
                    tracing::warn!(document = %document_id, "failed to remove attachments: {e}");
                    failure.get_or_insert(e);
                }
            }
            if let Some(e) = failure {
                return Err(e);
            }
        }

        tracing::info!(collection = %collection.id, attribute = attribute_id, "attribute removed");
        Ok(next)
    }

    pub fn update_collection_permissions(
        &self,
        ws: &Workspace,
        collection_id: &str,
        permissions: Permissions,
    ) -> Result<Collection> {
        let collection = self.manageable(ws, collection_id)?;
        let next = Collection {
            permissions,
            ..collection.clone()
        };
        self.commit_collection(&collection, next, &mut WriteBatch::new())
    }

    /// Drops a collection with everything that points into it.
    pub fn drop_collection(&self, ws: &Workspace, collection_id: &str) -> Result<()> {
        let collection = self.manageable(ws, collection_id)?;
        self.remove_collection(&collection)?;
        tracing::info!(collection = %collection.code, "collection dropped");
        Ok(())
    }

    fn remove_collection(&self, collection: &Collection) -> Result<()> {
        let document_ids = self.store().list_document_ids(&collection.id)?;
        let report = self
            .state
            .cleanup()
            .collection_removed(collection, &document_ids)?;
        tracing::debug!(
            collection = %collection.id,
            link_types = report.link_types,
            links = report.links,
            favorites = report.favorites,
            attachments = report.attachments,
            "collection cleanup finished"
        );
        self.store().delete_collection(&collection.id)?;
        Ok(())
    }

    // Views

    /// Creates a view over collections of the workspace project, capturing
    /// the author's current roles on each of them.
    pub fn create_view(
        &self,
        ws: &Workspace,
        code: &str,
        name: &str,
        collection_ids: &[String],
    ) -> Result<View> {
        let checker = ws.checker();
        checker.check_role(&ws.project, Roles::WRITE)?;
        validate_code(code, ResourceType::View)?;
        validate_name(name, ResourceType::View)?;

        let mut author_roles = BTreeMap::new();
        for id in collection_ids {
            let collection = load_collection(self.store(), ws, id)?;
            checker.check_role(&collection, Roles::READ)?;
            author_roles.insert(collection.id.clone(), checker.roles_on(&collection));
        }

        let view = View {
            id: Uuid::new_v4().to_string(),
            project_id: ws.project_id().to_string(),
            code: code.to_string(),
            name: name.to_string(),
            permissions: Permissions::with_user(ws.user_id(), Roles::all()),
            collection_ids: collection_ids.to_vec(),
            author_roles,
            created_by: ws.user_id().to_string(),
            created_at: Utc::now(),
        };
        self.store().create_view(&view)?;
        Ok(view)
    }

    /// Grants roles on a view. Requires MANAGE on the view.
    pub fn share_view(
        &self,
        ws: &Workspace,
        view_id: &str,
        user_id: &str,
        roles: Roles,
    ) -> Result<View> {
        let mut view = self.view(ws, view_id)?;
        ws.checker().check_role(&view, Roles::MANAGE)?;

        view.permissions.update_user(user_id, roles);
        self.store().update_view(&view)?;
        Ok(view)
    }

    pub fn delete_view(&self, ws: &Workspace, view_id: &str) -> Result<()> {
        let view = self.view(ws, view_id)?;
        ws.checker().check_role(&view, Roles::MANAGE)?;

        self.state.favorites().remove_all_for_view(&view.id)?;
        self.store().delete_view(&view.id)?;
        Ok(())
    }

    fn view(&self, ws: &Workspace, view_id: &str) -> Result<View> {
        self.store()
            .get_view(view_id)?
            .filter(|v| v.project_id == ws.project_id())
            .ok_or(Error::ResourceNotFound(ResourceType::View))
    }
}
