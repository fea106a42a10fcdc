mod commands;
mod documents;
mod favorites;
mod hierarchy;
mod links;

pub use commands::{
    AttributeCommands, CollectionCommands, DocCommands, FavoriteArgs, FavoriteCommands,
    LimitArgs, LinkCommands, OrgCommands, ProjectCommands, WorkspaceArgs,
};
pub use documents::run_doc;
pub use favorites::run_favorite;
pub use hierarchy::{run_attribute, run_collection, run_init, run_org, run_project};
pub use links::run_link;

use std::path::Path;

use serde::Serialize;

use crate::config::PlatformConfig;
use crate::service::AppState;
use crate::types::{Collection, DataRecord, Principal, Roles, try_record_from_json};
use crate::workspace::Workspace;

/// Open platform state for an initialized data directory.
pub fn init_state(data_dir: &Path) -> anyhow::Result<AppState> {
    let config = PlatformConfig::load(data_dir)?;
    let db_path = config.db_path();

    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'vellum init' first.",
            db_path.display()
        );
    }

    AppState::from_config(&config).map_err(Into::into)
}

/// Everything a command needs: the opened state and who is calling.
pub struct Session {
    pub state: AppState,
    pub principal: Principal,
}

impl Session {
    pub fn open(data_dir: &Path, user: &str, groups: &[String]) -> anyhow::Result<Self> {
        Ok(Self {
            state: init_state(data_dir)?,
            principal: Principal::new(user).with_groups(groups.iter().cloned()),
        })
    }

    pub fn workspace(&self, args: &WorkspaceArgs) -> anyhow::Result<Workspace> {
        self.state
            .hierarchy()
            .resolve_workspace(&self.principal, &args.org, &args.project, args.view.as_deref())
            .map_err(Into::into)
    }

    pub fn collection(&self, ws: &Workspace, code: &str) -> anyhow::Result<Collection> {
        self.state
            .hierarchy()
            .get_collection_by_code(ws, code)
            .map_err(Into::into)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn parse_roles(roles: &[String]) -> anyhow::Result<Roles> {
    let names: Vec<&str> = roles.iter().map(String::as_str).collect();
    Roles::parse_many(&names)
        .ok_or_else(|| anyhow::anyhow!("Invalid roles: {}", roles.join(",")))
}

/// Parses a JSON object argument into a data record.
pub fn parse_record(json: &str) -> anyhow::Result<DataRecord> {
    record_from_value(serde_json::from_str(json)?)
}

/// Converts a parsed JSON value into a data record; only objects qualify.
pub fn record_from_value(value: serde_json::Value) -> anyhow::Result<DataRecord> {
    match try_record_from_json(value) {
        Some(record) => Ok(record),
        None => anyhow::bail!("Expected a JSON object"),
    }
}
