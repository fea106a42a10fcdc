use serde_json::json;

use crate::types::DataRecord;

use super::{LinkCommands, Session, parse_record, print_json};

pub fn run_link(session: &Session, command: LinkCommands) -> anyhow::Result<()> {
    let links = session.state.links();

    match command {
        LinkCommands::CreateType { ws, name, from, to } => {
            let ws = session.workspace(&ws)?;
            let from = session.collection(&ws, &from)?;
            let to = session.collection(&ws, &to)?;
            let link_type =
                links.create_link_type(&ws, &name, [from.id.as_str(), to.id.as_str()], Vec::new())?;
            print_json(&link_type)
        }
        LinkCommands::Types { ws } => {
            let ws = session.workspace(&ws)?;
            print_json(&links.list_link_types(&ws)?)
        }
        LinkCommands::DeleteType { ws, id } => {
            let ws = session.workspace(&ws)?;
            links.delete_link_type(&ws, &id)?;
            print_json(&json!({ "deleted": id }))
        }
        LinkCommands::Create {
            ws,
            link_type,
            from,
            to,
            data,
        } => {
            let ws = session.workspace(&ws)?;
            let data = match data {
                Some(json) => parse_record(&json)?,
                None => DataRecord::new(),
            };
            let link = links.create_link(&ws, &link_type, [from.as_str(), to.as_str()], data)?;
            print_json(&link)
        }
        LinkCommands::List {
            ws,
            collection,
            document,
        } => {
            let ws = session.workspace(&ws)?;
            let collection = session.collection(&ws, &collection)?;
            print_json(&links.links_for_document(&ws, &collection.id, &document)?)
        }
        LinkCommands::Delete { ws, id } => {
            let ws = session.workspace(&ws)?;
            links.delete_link(&ws, &id)?;
            print_json(&json!({ "deleted": id }))
        }
    }
}
