use std::fs;
use std::path::Path;

use serde_json::json;

use crate::config::{CONFIG_FILE, PlatformConfig};
use crate::constraint::Constraint;
use crate::service::{AppState, AttributeDefinition};
use crate::types::{Organization, ServiceLimits};

use super::{
    AttributeCommands, CollectionCommands, LimitArgs, OrgCommands, ProjectCommands, Session,
    parse_roles, print_json,
};

impl From<LimitArgs> for ServiceLimits {
    fn from(args: LimitArgs) -> Self {
        Self {
            max_projects: args.max_projects,
            max_collections: args.max_collections,
            max_documents: args.max_documents,
        }
    }
}

/// Creates the data directory, a default config file and the database.
pub fn run_init(data_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;

    let config_path = data_dir.join(CONFIG_FILE);
    let created_config = !config_path.exists();
    if created_config {
        let config = PlatformConfig {
            data_dir: data_dir.to_path_buf(),
            ..PlatformConfig::default()
        };
        fs::write(&config_path, config.to_toml()?)?;
    }

    let config = PlatformConfig::load(data_dir)?;
    AppState::from_config(&config)?;
    tracing::info!(database = %config.db_path().display(), "data directory initialized");

    print_json(&json!({
        "data_dir": data_dir,
        "database": config.db_path(),
        "config": config_path,
        "created_config": created_config,
    }))
}

fn organization(session: &Session, code: &str) -> anyhow::Result<Organization> {
    session
        .state
        .hierarchy()
        .get_organization(&session.principal, code)
        .map_err(Into::into)
}

pub fn run_org(session: &Session, command: OrgCommands) -> anyhow::Result<()> {
    let hierarchy = session.state.hierarchy();
    let principal = &session.principal;

    match command {
        OrgCommands::Create { code, name, limits } => {
            let name = name.unwrap_or_else(|| code.clone());
            let org = hierarchy.create_organization(principal, &code, &name, limits.into())?;
            print_json(&org)
        }
        OrgCommands::List => print_json(&hierarchy.list_organizations(principal)?),
        OrgCommands::Limits { org, limits } => {
            let org = organization(session, &org)?;
            print_json(&hierarchy.update_service_limits(principal, &org.id, limits.into())?)
        }
        OrgCommands::Share { org, member, roles } => {
            let org = organization(session, &org)?;
            let roles = parse_roles(&roles)?;
            print_json(&hierarchy.share_organization(principal, &org.id, &member, roles)?)
        }
        OrgCommands::Delete { org } => {
            let org = organization(session, &org)?;
            hierarchy.delete_organization(principal, &org.id)?;
            print_json(&json!({ "deleted": org.id }))
        }
    }
}

pub fn run_project(session: &Session, command: ProjectCommands) -> anyhow::Result<()> {
    let hierarchy = session.state.hierarchy();
    let principal = &session.principal;

    match command {
        ProjectCommands::Create { org, code, name } => {
            let org = organization(session, &org)?;
            let name = name.unwrap_or_else(|| code.clone());
            print_json(&hierarchy.create_project(principal, &org.id, &code, &name)?)
        }
        ProjectCommands::List { org } => {
            let org = organization(session, &org)?;
            print_json(&hierarchy.list_projects(principal, &org.id)?)
        }
        ProjectCommands::Share { ws, member, roles } => {
            let ws = session.workspace(&ws)?;
            let roles = parse_roles(&roles)?;
            print_json(&hierarchy.share_project(principal, ws.project_id(), &member, roles)?)
        }
        ProjectCommands::RemoveMember { ws, member } => {
            let ws = session.workspace(&ws)?;
            print_json(&hierarchy.remove_project_member(principal, ws.project_id(), &member)?)
        }
        ProjectCommands::Delete { ws } => {
            let ws = session.workspace(&ws)?;
            hierarchy.delete_project(principal, ws.project_id())?;
            print_json(&json!({ "deleted": ws.project_id() }))
        }
    }
}

pub fn run_collection(session: &Session, command: CollectionCommands) -> anyhow::Result<()> {
    let hierarchy = session.state.hierarchy();

    match command {
        CollectionCommands::Create { ws, code, name } => {
            let ws = session.workspace(&ws)?;
            let name = name.unwrap_or_else(|| code.clone());
            print_json(&hierarchy.create_collection(&ws, &code, &name)?)
        }
        CollectionCommands::List { ws } => {
            let ws = session.workspace(&ws)?;
            print_json(&hierarchy.list_collections(&ws)?)
        }
        CollectionCommands::Show { ws, collection } => {
            let ws = session.workspace(&ws)?;
            print_json(&session.collection(&ws, &collection)?)
        }
        CollectionCommands::Drop { ws, collection } => {
            let ws = session.workspace(&ws)?;
            let collection = session.collection(&ws, &collection)?;
            hierarchy.drop_collection(&ws, &collection.id)?;
            print_json(&json!({ "deleted": collection.id }))
        }
    }
}

pub fn run_attribute(session: &Session, command: AttributeCommands) -> anyhow::Result<()> {
    let hierarchy = session.state.hierarchy();

    match command {
        AttributeCommands::Set {
            ws,
            collection,
            id,
            name,
            constraint,
        } => {
            let ws = session.workspace(&ws)?;
            let collection = session.collection(&ws, &collection)?;
            let constraint = constraint
                .map(|json| serde_json::from_str::<Constraint>(&json))
                .transpose()?;
            let definition = AttributeDefinition {
                id,
                name,
                constraint,
            };
            print_json(&hierarchy.set_attribute(&ws, &collection.id, definition)?)
        }
        AttributeCommands::Remove { ws, collection, id } => {
            let ws = session.workspace(&ws)?;
            let collection = session.collection(&ws, &collection)?;
            print_json(&hierarchy.remove_attribute(&ws, &collection.id, &id)?)
        }
    }
}
