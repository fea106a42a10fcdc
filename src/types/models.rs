use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DataRecord, MetaData, Permissions, Roles};
use crate::constraint::Constraint;

/// Metadata key a duplicated document uses to point back at its source.
pub const META_ORIGINAL_DOCUMENT_ID: &str = "originalDocumentId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Organization,
    Project,
    Collection,
    View,
    Document,
    LinkType,
    LinkInstance,
    Attribute,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Organization => "organization",
            ResourceType::Project => "project",
            ResourceType::Collection => "collection",
            ResourceType::View => "view",
            ResourceType::Document => "document",
            ResourceType::LinkType => "link type",
            ResourceType::LinkInstance => "link instance",
            ResourceType::Attribute => "attribute",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-organization quotas. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_projects: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_collections: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_documents: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub code: String,
    pub name: String,
    pub permissions: Permissions,
    pub service_limits: ServiceLimits,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub organization_id: String,
    pub code: String,
    pub name: String,
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    pub usage_count: u64,
}

impl Attribute {
    /// An attribute discovered on write: named after its id, unconstrained.
    #[must_use]
    pub fn discovered(id: &str, usage_count: u64) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            constraint: None,
            usage_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub project_id: String,
    pub code: String,
    pub name: String,
    pub permissions: Permissions,
    pub attributes: Vec<Attribute>,
    pub documents_count: u64,
    pub last_time_used: DateTime<Utc>,
    /// Optimistic concurrency token, bumped on every metadata write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Collection {
    #[must_use]
    pub fn attribute(&self, id: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub collection_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub meta_data: MetaData,
    #[serde(default)]
    pub data: DataRecord,
}

/// Caller-supplied content for a document that does not exist yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDocument {
    #[serde(default)]
    pub data: DataRecord,
    #[serde(default)]
    pub meta_data: MetaData,
}

impl NewDocument {
    #[must_use]
    pub fn new(data: DataRecord) -> Self {
        Self {
            data,
            meta_data: MetaData::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    pub id: String,
    pub project_id: String,
    pub code: String,
    pub name: String,
    pub permissions: Permissions,
    /// Collections whose documents the view surfaces.
    pub collection_ids: Vec<String>,
    /// Roles the view's author held on each surfaced collection.
    pub author_roles: BTreeMap<String, Roles>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkType {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub collection_ids: [String; 2],
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkInstance {
    pub id: String,
    pub link_type_id: String,
    pub document_ids: [String; 2],
    #[serde(default)]
    pub data: DataRecord,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteType {
    Collection,
    Document,
    View,
}

impl FavoriteType {
    pub fn as_str(self) -> &'static str {
        match self {
            FavoriteType::Collection => "collection",
            FavoriteType::Document => "document",
            FavoriteType::View => "view",
        }
    }

    pub fn parse(s: &str) -> Option<FavoriteType> {
        match s {
            "collection" => Some(FavoriteType::Collection),
            "document" => Some(FavoriteType::Document),
            "view" => Some(FavoriteType::View),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteItem {
    pub user_id: String,
    pub project_id: String,
    pub resource_type: FavoriteType,
    pub resource_id: String,
    /// Owning collection, set for documents only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub collection_id: String,
    pub document_id: String,
    pub attribute_id: String,
    /// sha-256 of the content, lowercase hex.
    pub content_id: String,
    pub file_name: String,
    pub size: u64,
}
