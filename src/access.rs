//! Role evaluation over resource permission sets.
//!
//! Everything here is a pure function of the principal, the resource snapshot
//! and the optional view carried by the request.

use crate::error::{Error, Result};
use crate::types::{
    Collection, Organization, Permissions, Principal, Project, ResourceType, Roles,
    ServiceLimits, View,
};
use crate::workspace::Workspace;

/// A permission-checked entity.
pub trait Resource {
    fn resource_type(&self) -> ResourceType;
    fn id(&self) -> &str;
    fn permissions(&self) -> &Permissions;
}

impl Resource for Organization {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Organization
    }
    fn id(&self) -> &str {
        &self.id
    }
    fn permissions(&self) -> &Permissions {
        &self.permissions
    }
}

impl Resource for Project {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Project
    }
    fn id(&self) -> &str {
        &self.id
    }
    fn permissions(&self) -> &Permissions {
        &self.permissions
    }
}

impl Resource for Collection {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Collection
    }
    fn id(&self) -> &str {
        &self.id
    }
    fn permissions(&self) -> &Permissions {
        &self.permissions
    }
}

impl Resource for View {
    fn resource_type(&self) -> ResourceType {
        ResourceType::View
    }
    fn id(&self) -> &str {
        &self.id
    }
    fn permissions(&self) -> &Permissions {
        &self.permissions
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PermissionChecker<'a> {
    principal: &'a Principal,
    organization: Option<&'a Organization>,
    project: Option<&'a Project>,
    view: Option<&'a View>,
}

impl<'a> PermissionChecker<'a> {
    /// Checker without workspace context, used before a workspace exists.
    #[must_use]
    pub fn for_principal(principal: &'a Principal) -> Self {
        Self {
            principal,
            organization: None,
            project: None,
            view: None,
        }
    }

    #[must_use]
    pub fn for_organization(principal: &'a Principal, organization: &'a Organization) -> Self {
        Self {
            organization: Some(organization),
            ..Self::for_principal(principal)
        }
    }

    #[must_use]
    pub fn with_project(mut self, project: &'a Project) -> Self {
        self.project = Some(project);
        self
    }

    #[must_use]
    pub fn for_workspace(workspace: &'a Workspace) -> Self {
        Self {
            principal: &workspace.principal,
            organization: Some(&workspace.organization),
            project: Some(&workspace.project),
            view: workspace.view.as_ref(),
        }
    }

    /// Principals managing the active organization or project hold every
    /// role on the resources inside it.
    #[must_use]
    pub fn is_manager(&self) -> bool {
        let manages = |p: &Permissions| p.roles_for(self.principal).has(Roles::MANAGE);
        self.organization.is_some_and(|o| manages(&o.permissions))
            || self.project.is_some_and(|p| manages(&p.permissions))
    }

    #[must_use]
    pub fn roles_on(&self, resource: &dyn Resource) -> Roles {
        if self.is_manager() {
            return Roles::all();
        }
        resource.permissions().roles_for(self.principal)
    }

    #[must_use]
    pub fn has_role(&self, resource: &dyn Resource, role: Roles) -> bool {
        self.roles_on(resource).has(role)
    }

    pub fn check_role(&self, resource: &dyn Resource, role: Roles) -> Result<()> {
        if !self.has_role(resource, role) {
            return Err(denied(resource, role));
        }
        Ok(())
    }

    /// Like [`has_role`](Self::has_role), but also accepts `view_role`
    /// granted through the view the request was made from.
    #[must_use]
    pub fn has_role_with_view(&self, resource: &dyn Resource, role: Roles, view_role: Roles) -> bool {
        self.has_role(resource, role) || self.view_grants(resource, view_role)
    }

    pub fn check_role_with_view(
        &self,
        resource: &dyn Resource,
        role: Roles,
        view_role: Roles,
    ) -> Result<()> {
        if !self.has_role_with_view(resource, role, view_role) {
            return Err(denied(resource, role));
        }
        Ok(())
    }

    fn view_grants(&self, resource: &dyn Resource, view_role: Roles) -> bool {
        let Some(view) = self.view else {
            return false;
        };
        if resource.resource_type() != ResourceType::Collection
            || !view.collection_ids.iter().any(|id| id == resource.id())
        {
            return false;
        }
        if let Some(project) = self.project {
            if view.project_id != project.id {
                return false;
            }
        }

        let on_view = self.roles_on(view).has(view_role);
        let author = view
            .author_roles
            .get(resource.id())
            .copied()
            .unwrap_or_default()
            .expand_implied()
            .has(view_role);

        on_view && author
    }

    /// Fails when creating one more resource of `kind` would pass the limit.
    pub fn check_creation_limits(
        limits: &ServiceLimits,
        kind: ResourceType,
        current: u64,
    ) -> Result<()> {
        let max = match kind {
            ResourceType::Project => limits.max_projects,
            ResourceType::Collection => limits.max_collections,
            ResourceType::Document => limits.max_documents,
            _ => None,
        };
        match max {
            Some(max) if current >= max => {
                Err(Error::LimitExceeded(format!("{kind} limit of {max} reached")))
            }
            _ => Ok(()),
        }
    }

    pub fn check_document_limits(limits: &ServiceLimits, current: u64, adding: u64) -> Result<()> {
        match limits.max_documents {
            Some(max) if current.saturating_add(adding) > max => Err(Error::LimitExceeded(
                format!("document limit of {max} reached ({current} stored, {adding} requested)"),
            )),
            _ => Ok(()),
        }
    }
}

fn denied(resource: &dyn Resource, role: Roles) -> Error {
    Error::PermissionDenied {
        resource: resource.resource_type(),
        required: role,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;

    fn organization(permissions: Permissions) -> Organization {
        Organization {
            id: "org-1".into(),
            code: "acme".into(),
            name: "Acme".into(),
            permissions,
            service_limits: ServiceLimits::default(),
            created_at: Utc::now(),
        }
    }

    fn project(permissions: Permissions) -> Project {
        Project {
            id: "proj-1".into(),
            organization_id: "org-1".into(),
            code: "crm".into(),
            name: "CRM".into(),
            permissions,
            created_at: Utc::now(),
        }
    }

    fn collection(permissions: Permissions) -> Collection {
        Collection {
            id: "coll-1".into(),
            project_id: "proj-1".into(),
            code: "contacts".into(),
            name: "Contacts".into(),
            permissions,
            attributes: Vec::new(),
            documents_count: 0,
            last_time_used: Utc::now(),
            version: 0,
            created_at: Utc::now(),
        }
    }

    fn view(permissions: Permissions, author_roles: Roles) -> View {
        View {
            id: "view-1".into(),
            project_id: "proj-1".into(),
            code: "board".into(),
            name: "Board".into(),
            permissions,
            collection_ids: vec!["coll-1".into()],
            author_roles: BTreeMap::from([("coll-1".to_string(), author_roles)]),
            created_by: "owner".into(),
            created_at: Utc::now(),
        }
    }

    fn workspace(principal: &str) -> Workspace {
        Workspace::new(
            Principal::new(principal),
            organization(Permissions::with_user(principal, Roles::READ)),
            project(Permissions::with_user(principal, Roles::READ)),
        )
    }

    #[test]
    fn test_direct_role() {
        let ws = workspace("alice");
        let coll = collection(Permissions::with_user("alice", Roles::READ));
        let checker = ws.checker();
        assert!(checker.check_role(&coll, Roles::READ).is_ok());
        assert!(matches!(
            checker.check_role(&coll, Roles::WRITE),
            Err(Error::PermissionDenied {
                resource: ResourceType::Collection,
                ..
            })
        ));
    }

    #[test]
    fn test_group_role() {
        let mut ws = workspace("alice");
        ws.principal = Principal::new("alice").with_groups(["editors"]);
        let mut permissions = Permissions::default();
        permissions.update_group("editors", Roles::WRITE);
        let coll = collection(permissions);
        assert!(ws.checker().has_role(&coll, Roles::WRITE));
    }

    #[test]
    fn test_manage_implies_write() {
        let ws = workspace("alice");
        let coll = collection(Permissions::with_user("alice", Roles::MANAGE));
        assert!(ws.checker().has_role(&coll, Roles::WRITE));
        assert!(ws.checker().has_role(&coll, Roles::READ));
    }

    #[test]
    fn test_project_manager_holds_everything() {
        let mut ws = workspace("alice");
        ws.project.permissions = Permissions::with_user("alice", Roles::MANAGE);
        let coll = collection(Permissions::default());
        assert!(ws.checker().has_role(&coll, Roles::all()));
    }

    #[test]
    fn test_view_elevation() {
        let coll = collection(Permissions::with_user("alice", Roles::READ));
        let ws = workspace("alice")
            .with_view(Some(view(Permissions::with_user("alice", Roles::WRITE), Roles::MANAGE)));
        let checker = ws.checker();

        assert!(!checker.has_role(&coll, Roles::WRITE));
        assert!(checker.check_role_with_view(&coll, Roles::WRITE, Roles::WRITE).is_ok());
    }

    #[test]
    fn test_view_elevation_bounded_by_author_rights() {
        let coll = collection(Permissions::default());
        let ws = workspace("alice")
            .with_view(Some(view(Permissions::with_user("alice", Roles::WRITE), Roles::READ)));
        assert!(!ws.checker().has_role_with_view(&coll, Roles::WRITE, Roles::WRITE));
    }

    #[test]
    fn test_view_elevation_requires_role_on_view() {
        let coll = collection(Permissions::default());
        let ws = workspace("alice")
            .with_view(Some(view(Permissions::with_user("alice", Roles::READ), Roles::MANAGE)));
        let checker = ws.checker();
        assert!(checker.has_role_with_view(&coll, Roles::READ, Roles::READ));
        assert!(!checker.has_role_with_view(&coll, Roles::WRITE, Roles::WRITE));
    }

    #[test]
    fn test_view_elevation_ignores_other_collections() {
        let mut other = collection(Permissions::default());
        other.id = "coll-2".into();
        let ws = workspace("alice")
            .with_view(Some(view(Permissions::with_user("alice", Roles::MANAGE), Roles::MANAGE)));
        assert!(!ws.checker().has_role_with_view(&other, Roles::READ, Roles::READ));
    }

    #[test]
    fn test_creation_limits() {
        let limits = ServiceLimits {
            max_projects: Some(2),
            ..ServiceLimits::default()
        };
        assert!(PermissionChecker::check_creation_limits(&limits, ResourceType::Project, 1).is_ok());
        assert!(matches!(
            PermissionChecker::check_creation_limits(&limits, ResourceType::Project, 2),
            Err(Error::LimitExceeded(_))
        ));
        assert!(PermissionChecker::check_creation_limits(&limits, ResourceType::Collection, 99).is_ok());
    }

    #[test]
    fn test_document_limits() {
        let limits = ServiceLimits {
            max_documents: Some(10),
            ..ServiceLimits::default()
        };
        assert!(PermissionChecker::check_document_limits(&limits, 8, 2).is_ok());
        assert!(matches!(
            PermissionChecker::check_document_limits(&limits, 8, 3),
            Err(Error::LimitExceeded(_))
        ));
        assert!(PermissionChecker::check_document_limits(&ServiceLimits::default(), u64::MAX, 1).is_ok());
    }
}
