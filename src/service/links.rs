use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use super::validation::{validate_attribute_id, validate_name};
use super::{AppState, load_collection};
use crate::error::{Error, Result};
use crate::notify::Event;
use crate::store::Store;
use crate::types::{
    Attribute, Collection, DataRecord, LinkInstance, LinkType, ResourceType, Roles,
};
use crate::workspace::Workspace;

/// Link types between two collections and link instances between their
/// documents. Link data goes through the codec but has no usage ledger.
pub struct LinkStore<'a> {
    state: &'a AppState,
}

impl<'a> LinkStore<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn store(&self) -> &dyn Store {
        self.state.store.as_ref()
    }

    fn collections(&self, ws: &Workspace, ids: &[String; 2]) -> Result<[Collection; 2]> {
        Ok([
            load_collection(self.store(), ws, &ids[0])?,
            load_collection(self.store(), ws, &ids[1])?,
        ])
    }

    /// Loads a link type of the workspace project and checks `role` on both
    /// of its collections, optionally through the request's view.
    fn link_type(
        &self,
        ws: &Workspace,
        link_type_id: &str,
        role: Roles,
        with_view: bool,
    ) -> Result<LinkType> {
        let link_type = self
            .store()
            .get_link_type(link_type_id)?
            .filter(|lt| lt.project_id == ws.project_id())
            .ok_or(Error::ResourceNotFound(ResourceType::LinkType))?;

        let checker = ws.checker();
        for collection in self.collections(ws, &link_type.collection_ids)? {
            if with_view {
                checker.check_role_with_view(&collection, role, role)?;
            } else {
                checker.check_role(&collection, role)?;
            }
        }
        Ok(link_type)
    }

    fn decode(&self, link_type: &LinkType, mut link: LinkInstance) -> LinkInstance {
        self.state
            .constraints
            .decode(&link_type.attributes, &mut link.data);
        link
    }

    pub fn create_link_type(
        &self,
        ws: &Workspace,
        name: &str,
        collection_ids: [&str; 2],
        attributes: Vec<Attribute>,
    ) -> Result<LinkType> {
        validate_name(name, ResourceType::LinkType)?;
        for attribute in &attributes {
            validate_attribute_id(&attribute.id)?;
        }

        let ids = collection_ids.map(str::to_string);
        let checker = ws.checker();
        for collection in self.collections(ws, &ids)? {
            checker.check_role(&collection, Roles::WRITE)?;
        }

        let link_type = LinkType {
            id: Uuid::new_v4().to_string(),
            project_id: ws.project_id().to_string(),
            name: name.to_string(),
            collection_ids: ids,
            attributes,
            created_at: Utc::now(),
        };
        self.store().create_link_type(&link_type)?;

        tracing::info!(link_type = %link_type.id, name = %link_type.name, "link type created");
        Ok(link_type)
    }

    pub fn get_link_type(&self, ws: &Workspace, link_type_id: &str) -> Result<LinkType> {
        self.link_type(ws, link_type_id, Roles::READ, false)
    }

    /// Link types of the workspace project readable on both sides.
    pub fn list_link_types(&self, ws: &Workspace) -> Result<Vec<LinkType>> {
        let checker = ws.checker();
        let mut visible = Vec::new();
        for link_type in self.store().list_link_types(ws.project_id())? {
            let readable = match self.collections(ws, &link_type.collection_ids) {
                Ok(collections) => collections
                    .iter()
                    .all(|c| checker.has_role(c, Roles::READ)),
                Err(Error::ResourceNotFound(_)) => false,
                Err(e) => return Err(e),
            };
            if readable {
                visible.push(link_type);
            }
        }
        Ok(visible)
    }

    pub fn delete_link_type(&self, ws: &Workspace, link_type_id: &str) -> Result<()> {
        let link_type = self.link_type(ws, link_type_id, Roles::WRITE, false)?;
        let instances = self.store().list_link_instances(&link_type.id)?;
        self.store().delete_link_type(&link_type.id)?;

        for link in instances {
            self.state.notifier.notify(Event::LinkDeleted {
                project_id: ws.project_id().to_string(),
                link: self.decode(&link_type, link),
            });
        }
        tracing::info!(link_type = %link_type.id, "link type deleted");
        Ok(())
    }

    /// Removes every link type touching `collection_id` together with its
    /// instances. Part of the collection drop cascade.
    pub fn delete_link_types_for_collection(&self, collection_id: &str) -> Result<usize> {
        let mut removed = 0;
        for link_type in self.store().list_link_types_for_collection(collection_id)? {
            if self.store().delete_link_type(&link_type.id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn create_link(
        &self,
        ws: &Workspace,
        link_type_id: &str,
        document_ids: [&str; 2],
        data: DataRecord,
    ) -> Result<LinkInstance> {
        let link_type = self.link_type(ws, link_type_id, Roles::WRITE, true)?;

        for (collection_id, document_id) in link_type.collection_ids.iter().zip(document_ids) {
            if self
                .store()
                .get_document(collection_id, document_id)?
                .is_none()
            {
                return Err(Error::ResourceNotFound(ResourceType::Document));
            }
        }

        let mut data = data;
        for id in data.keys() {
            validate_attribute_id(id)?;
        }
        self.state.constraints.encode(&link_type.attributes, &mut data);

        let link = LinkInstance {
            id: Uuid::new_v4().to_string(),
            link_type_id: link_type.id.clone(),
            document_ids: document_ids.map(str::to_string),
            data,
            created_by: ws.user_id().to_string(),
            created_at: Utc::now(),
            updated_at: None,
        };
        self.store().create_link_instance(&link)?;

        let created = self.decode(&link_type, link);
        self.state.notifier.notify(Event::LinkCreated {
            project_id: ws.project_id().to_string(),
            link: created.clone(),
        });
        Ok(created)
    }

    pub fn get_link(&self, ws: &Workspace, link_id: &str) -> Result<LinkInstance> {
        let link = self
            .store()
            .get_link_instance(link_id)?
            .ok_or(Error::ResourceNotFound(ResourceType::LinkInstance))?;
        let link_type = self.link_type(ws, &link.link_type_id, Roles::READ, true)?;
        Ok(self.decode(&link_type, link))
    }

    /// Links touching a document, limited to link types readable on both
    /// sides.
    pub fn links_for_document(
        &self,
        ws: &Workspace,
        collection_id: &str,
        document_id: &str,
    ) -> Result<Vec<LinkInstance>> {
        let collection = load_collection(self.store(), ws, collection_id)?;
        ws.checker()
            .check_role_with_view(&collection, Roles::READ, Roles::READ)?;

        let mut types: BTreeMap<String, Option<LinkType>> = BTreeMap::new();
        let mut links = Vec::new();
        for link in self
            .store()
            .list_link_instances_for_documents(&[document_id.to_string()])?
        {
            if !types.contains_key(&link.link_type_id) {
                let link_type = match self.link_type(ws, &link.link_type_id, Roles::READ, true) {
                    Ok(lt) => Some(lt),
                    Err(Error::PermissionDenied { .. } | Error::ResourceNotFound(_)) => None,
                    Err(e) => return Err(e),
                };
                types.insert(link.link_type_id.clone(), link_type);
            }
            if let Some(Some(link_type)) = types.get(&link.link_type_id) {
                links.push(self.decode(link_type, link));
            }
        }
        Ok(links)
    }

    pub fn delete_link(&self, ws: &Workspace, link_id: &str) -> Result<()> {
        let link = self
            .store()
            .get_link_instance(link_id)?
            .ok_or(Error::ResourceNotFound(ResourceType::LinkInstance))?;
        let link_type = self.link_type(ws, &link.link_type_id, Roles::WRITE, true)?;
        self.store().delete_link_instance(&link.id)?;

        self.state.notifier.notify(Event::LinkDeleted {
            project_id: ws.project_id().to_string(),
            link: self.decode(&link_type, link),
        });
        Ok(())
    }

    /// Removes every link instance referencing any of `document_ids`.
    pub fn delete_links_for_documents(&self, document_ids: &[String]) -> Result<usize> {
        self.store().delete_link_instances_for_documents(document_ids)
    }

    /// Copies the links of duplicated documents, moving each endpoint found
    /// in `id_map` to its clone.
    pub fn duplicate_links(
        &self,
        ws: &Workspace,
        id_map: &BTreeMap<String, String>,
    ) -> Result<Vec<LinkInstance>> {
        let originals: Vec<String> = id_map.keys().cloned().collect();
        let mut types: BTreeMap<String, LinkType> = BTreeMap::new();
        let mut copies = Vec::new();

        for link in self.store().list_link_instances_for_documents(&originals)? {
            if !types.contains_key(&link.link_type_id) {
                let link_type = self.link_type(ws, &link.link_type_id, Roles::WRITE, true)?;
                types.insert(link.link_type_id.clone(), link_type);
            }

            let document_ids = link
                .document_ids
                .clone()
                .map(|id| id_map.get(&id).cloned().unwrap_or(id));
            let copy = LinkInstance {
                id: Uuid::new_v4().to_string(),
                document_ids,
                created_by: ws.user_id().to_string(),
                created_at: Utc::now(),
                updated_at: None,
                ..link
            };
            self.store().create_link_instance(&copy)?;
            copies.push(copy);
        }

        Ok(copies
            .into_iter()
            .map(|copy| match types.get(&copy.link_type_id) {
                Some(link_type) => self.decode(link_type, copy),
                None => copy,
            })
            .collect())
    }
}
