use std::fs;

use anyhow::Context;
use serde_json::json;

use crate::types::NewDocument;

use super::{DocCommands, Session, parse_record, print_json, record_from_value};

pub fn run_doc(session: &Session, command: DocCommands) -> anyhow::Result<()> {
    let documents = session.state.documents();

    match command {
        DocCommands::Create {
            ws,
            collection,
            data,
            meta,
        } => {
            let ws = session.workspace(&ws)?;
            let collection = session.collection(&ws, &collection)?;
            let document = NewDocument {
                data: parse_record(&data)?,
                meta_data: meta.as_deref().map(parse_record).transpose()?.unwrap_or_default(),
            };
            print_json(&documents.create(&ws, &collection.id, document)?)
        }
        DocCommands::Import {
            ws,
            collection,
            file,
        } => {
            let ws = session.workspace(&ws)?;
            let collection = session.collection(&ws, &collection)?;
            let content = fs::read_to_string(&file)?;
            let parsed: serde_json::Value = serde_json::from_str(&content)?;
            let serde_json::Value::Array(items) = parsed else {
                anyhow::bail!("{} must hold a JSON array of objects", file.display());
            };
            let batch = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    record_from_value(item)
                        .map(NewDocument::new)
                        .with_context(|| format!("{} item {i}", file.display()))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let created = documents.create_many(&ws, &collection.id, batch, true)?;
            print_json(&json!({
                "collection": collection.id,
                "imported": created.len(),
            }))
        }
        DocCommands::Get { ws, collection, id } => {
            let ws = session.workspace(&ws)?;
            let collection = session.collection(&ws, &collection)?;
            print_json(&documents.get(&ws, &collection.id, &id)?)
        }
        DocCommands::List { ws, collection } => {
            let ws = session.workspace(&ws)?;
            let collection = session.collection(&ws, &collection)?;
            print_json(&documents.list(&ws, &collection.id)?)
        }
        DocCommands::Update {
            ws,
            collection,
            id,
            data,
            replace,
        } => {
            let ws = session.workspace(&ws)?;
            let collection = session.collection(&ws, &collection)?;
            let data = parse_record(&data)?;
            let updated = if replace {
                documents.update_data(&ws, &collection.id, &id, data)?
            } else {
                documents.patch_data(&ws, &collection.id, &id, data)?
            };
            print_json(&updated)
        }
        DocCommands::Delete { ws, collection, id } => {
            let ws = session.workspace(&ws)?;
            let collection = session.collection(&ws, &collection)?;
            documents.delete(&ws, &collection.id, &id)?;
            print_json(&json!({ "deleted": id }))
        }
        DocCommands::Duplicate {
            ws,
            collection,
            ids,
            with_links,
        } => {
            let ws = session.workspace(&ws)?;
            let collection = session.collection(&ws, &collection)?;
            let duplicated = documents.duplicate(&ws, &collection.id, &ids)?;
            let links = if with_links {
                session
                    .state
                    .links()
                    .duplicate_links(&ws, &duplicated.id_map)?
            } else {
                Vec::new()
            };
            print_json(&json!({
                "documents": duplicated.documents,
                "id_map": duplicated.id_map,
                "links": links,
            }))
        }
    }
}
