use serde_json::json;

use crate::service::FavoriteTarget;
use crate::types::FavoriteType;
use crate::workspace::Workspace;

use super::{FavoriteArgs, FavoriteCommands, Session, print_json};

/// Resolves collection codes to ids; the returned pair owns the ids a
/// [`FavoriteTarget`] borrows.
fn resolve(
    session: &Session,
    ws: &Workspace,
    args: &FavoriteArgs,
) -> anyhow::Result<(String, Option<String>)> {
    match (&args.collection, &args.view_id) {
        (Some(code), _) => {
            let collection = session.collection(ws, code)?;
            Ok((collection.id, args.document.clone()))
        }
        (None, Some(view_id)) => Ok((view_id.clone(), None)),
        (None, None) => anyhow::bail!("--collection or --view-id is required"),
    }
}

fn target<'t>(
    args: &FavoriteArgs,
    id: &'t str,
    document: Option<&'t str>,
) -> FavoriteTarget<'t> {
    match (args.view_id.is_some(), document) {
        (true, _) => FavoriteTarget::View(id),
        (false, Some(document_id)) => FavoriteTarget::Document {
            collection_id: id,
            document_id,
        },
        (false, None) => FavoriteTarget::Collection(id),
    }
}

pub fn run_favorite(session: &Session, command: FavoriteCommands) -> anyhow::Result<()> {
    let favorites = session.state.favorites();

    match command {
        FavoriteCommands::Add { ws, target: args } => {
            let ws = session.workspace(&ws)?;
            let (id, document) = resolve(session, &ws, &args)?;
            let target = target(&args, &id, document.as_deref());
            favorites.add(&ws, target)?;
            print_json(&json!({
                "type": target.resource_type().as_str(),
                "id": target.resource_id(),
                "favorite": true,
            }))
        }
        FavoriteCommands::Remove { ws, target: args } => {
            let ws = session.workspace(&ws)?;
            let (id, document) = resolve(session, &ws, &args)?;
            let target = target(&args, &id, document.as_deref());
            let removed = favorites.remove(&ws, target)?;
            print_json(&json!({
                "type": target.resource_type().as_str(),
                "id": target.resource_id(),
                "removed": removed,
            }))
        }
        FavoriteCommands::List { ws, resource_type } => {
            let ws = session.workspace(&ws)?;
            let Some(resource_type) = FavoriteType::parse(&resource_type) else {
                anyhow::bail!("Unknown favorite type: {resource_type}");
            };
            print_json(&favorites.favorite_ids(&ws, resource_type)?)
        }
    }
}
