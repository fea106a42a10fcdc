use serde::Serialize;

use crate::access::PermissionChecker;
use crate::types::{Organization, Principal, Project, View};

/// Per-request context: who is calling, in which organization and project,
/// and through which view (if any).
///
/// Resolved once by [`ResourceHierarchy::resolve_workspace`] and passed to
/// every component call.
///
/// [`ResourceHierarchy::resolve_workspace`]: crate::service::ResourceHierarchy::resolve_workspace
#[derive(Debug, Clone, Serialize)]
pub struct Workspace {
    pub principal: Principal,
    pub organization: Organization,
    pub project: Project,
    pub view: Option<View>,
}

impl Workspace {
    #[must_use]
    pub fn new(principal: Principal, organization: Organization, project: Project) -> Self {
        Self {
            principal,
            organization,
            project,
            view: None,
        }
    }

    #[must_use]
    pub fn with_view(mut self, view: Option<View>) -> Self {
        self.view = view;
        self
    }

    #[must_use]
    pub fn checker(&self) -> PermissionChecker<'_> {
        PermissionChecker::for_workspace(self)
    }

    pub fn user_id(&self) -> &str {
        &self.principal.user_id
    }

    pub fn project_id(&self) -> &str {
        &self.project.id
    }
}
