use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use serde::de::DeserializeOwned;

use super::Store;
use super::batch::{Write, WriteBatch};
use super::naming::data_table;
use super::schema::{SCHEMA, data_table_ddl};
use crate::error::{Error, Result};
use crate::types::*;

const ORGANIZATION_COLUMNS: &str =
    "id, code, name, permissions, max_projects, max_collections, max_documents, created_at";
const PROJECT_COLUMNS: &str = "id, organization_id, code, name, permissions, created_at";
const COLLECTION_COLUMNS: &str = "id, project_id, code, name, permissions, attributes, \
     documents_count, last_time_used, version, created_at";
const VIEW_COLUMNS: &str =
    "id, project_id, code, name, permissions, collection_ids, author_roles, created_by, created_at";
const LINK_TYPE_COLUMNS: &str =
    "id, project_id, name, collection_a, collection_b, attributes, created_at";
const LINK_INSTANCE_COLUMNS: &str =
    "id, link_type_id, document_a, document_b, data, created_by, created_at, updated_at";
const FAVORITE_COLUMNS: &str =
    "user_id, project_id, resource_type, resource_id, collection_id, created_at";

/// Ids bound per `IN (...)` list; SQLite caps host parameters at 32766.
const MAX_BOUND_IDS: usize = 500;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn to_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn from_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn limit_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<u64>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(from_count))
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Maps unique-key violations on insert to `AlreadyExists`.
fn map_insert(result: rusqlite::Result<usize>, what: impl FnOnce() -> String) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(Error::AlreadyExists(what()))
        }
        Err(e) => Err(Error::from(e)),
    }
}

fn organization_from_row(row: &Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        permissions: json_column(row, 3)?,
        service_limits: ServiceLimits {
            max_projects: limit_column(row, 4)?,
            max_collections: limit_column(row, 5)?,
            max_documents: limit_column(row, 6)?,
        },
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        permissions: json_column(row, 4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn collection_from_row(row: &Row<'_>) -> rusqlite::Result<Collection> {
    Ok(Collection {
        id: row.get(0)?,
        project_id: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        permissions: json_column(row, 4)?,
        attributes: json_column(row, 5)?,
        documents_count: from_count(row.get(6)?),
        last_time_used: parse_datetime(&row.get::<_, String>(7)?),
        version: from_count(row.get(8)?),
        created_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

fn view_from_row(row: &Row<'_>) -> rusqlite::Result<View> {
    Ok(View {
        id: row.get(0)?,
        project_id: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        permissions: json_column(row, 4)?,
        collection_ids: json_column(row, 5)?,
        author_roles: json_column(row, 6)?,
        created_by: row.get(7)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

/// Envelope columns followed by the joined Data column.
fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let data = match row.get::<_, Option<String>>(7)? {
        Some(_) => json_column(row, 7)?,
        None => DataRecord::new(),
    };
    Ok(Document {
        id: row.get(0)?,
        collection_id: row.get(1)?,
        created_by: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        updated_by: row.get(4)?,
        updated_at: row
            .get::<_, Option<String>>(5)?
            .map(|s| parse_datetime(&s)),
        meta_data: json_column(row, 6)?,
        data,
    })
}

fn link_type_from_row(row: &Row<'_>) -> rusqlite::Result<LinkType> {
    Ok(LinkType {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        collection_ids: [row.get(3)?, row.get(4)?],
        attributes: json_column(row, 5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn link_instance_from_row(row: &Row<'_>) -> rusqlite::Result<LinkInstance> {
    Ok(LinkInstance {
        id: row.get(0)?,
        link_type_id: row.get(1)?,
        document_ids: [row.get(2)?, row.get(3)?],
        data: json_column(row, 4)?,
        created_by: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: row
            .get::<_, Option<String>>(7)?
            .map(|s| parse_datetime(&s)),
    })
}

fn favorite_from_row(row: &Row<'_>) -> rusqlite::Result<FavoriteItem> {
    let raw_type: String = row.get(2)?;
    let resource_type = FavoriteType::parse(&raw_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown favorite type '{raw_type}'").into(),
        )
    })?;
    Ok(FavoriteItem {
        user_id: row.get(0)?,
        project_id: row.get(1)?,
        resource_type,
        resource_id: row.get(3)?,
        collection_id: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn document_select(table: &str) -> String {
    format!(
        "SELECT d.id, d.collection_id, d.created_by, d.created_at, d.updated_by, d.updated_at,
                d.meta_data, t.data
         FROM documents d LEFT JOIN {table} t ON t.id = d.id"
    )
}

/// Drops the Data tables of every collection selected by `ids_sql`.
fn drop_data_tables(tx: &Transaction<'_>, ids_sql: &str, param: &str) -> Result<()> {
    let ids: Vec<String> = {
        let mut stmt = tx.prepare(ids_sql)?;
        let rows = stmt.query_map(params![param], |row| row.get(0))?;
        let ids = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        ids
    };
    for id in ids {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", data_table(&id)?))?;
    }
    Ok(())
}

fn apply_write(tx: &Transaction<'_>, write: &Write) -> Result<()> {
    match write {
        Write::InsertDocument(doc) => {
            let table = data_table(&doc.collection_id)?;
            map_insert(
                tx.execute(
                    "INSERT INTO documents (id, collection_id, created_by, created_at, updated_by, updated_at, meta_data)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        doc.id,
                        doc.collection_id,
                        doc.created_by,
                        format_datetime(&doc.created_at),
                        doc.updated_by,
                        doc.updated_at.as_ref().map(format_datetime),
                        serde_json::to_string(&doc.meta_data)?,
                    ],
                ),
                || format!("document '{}'", doc.id),
            )?;
            tx.execute(
                &format!("INSERT INTO {table} (id, data) VALUES (?1, ?2)"),
                params![doc.id, serde_json::to_string(&doc.data)?],
            )?;
        }
        Write::ReplaceDocument(doc) => {
            let table = data_table(&doc.collection_id)?;
            let rows = tx.execute(
                "UPDATE documents SET updated_by = ?1, updated_at = ?2, meta_data = ?3
                 WHERE id = ?4 AND collection_id = ?5",
                params![
                    doc.updated_by,
                    doc.updated_at.as_ref().map(format_datetime),
                    serde_json::to_string(&doc.meta_data)?,
                    doc.id,
                    doc.collection_id,
                ],
            )?;
            if rows == 0 {
                return Err(Error::ResourceNotFound(ResourceType::Document));
            }
            tx.execute(
                &format!(
                    "INSERT INTO {table} (id, data) VALUES (?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET data = excluded.data"
                ),
                params![doc.id, serde_json::to_string(&doc.data)?],
            )?;
        }
        Write::DeleteDocument {
            collection_id,
            document_id,
        } => {
            let table = data_table(collection_id)?;
            let rows = tx.execute(
                "DELETE FROM documents WHERE id = ?1 AND collection_id = ?2",
                params![document_id, collection_id],
            )?;
            if rows == 0 {
                return Err(Error::ResourceNotFound(ResourceType::Document));
            }
            tx.execute(
                &format!("DELETE FROM {table} WHERE id = ?1"),
                params![document_id],
            )?;
        }
        Write::UpdateCollection {
            collection,
            expected_version,
        } => {
            let rows = tx.execute(
                "UPDATE collections
                 SET name = ?1, permissions = ?2, attributes = ?3, documents_count = ?4,
                     last_time_used = ?5, version = ?6
                 WHERE id = ?7 AND version = ?8",
                params![
                    collection.name,
                    serde_json::to_string(&collection.permissions)?,
                    serde_json::to_string(&collection.attributes)?,
                    to_count(collection.documents_count),
                    format_datetime(&collection.last_time_used),
                    to_count(expected_version.saturating_add(1)),
                    collection.id,
                    to_count(*expected_version),
                ],
            )?;
            if rows == 0 {
                let stored: Option<i64> = tx
                    .query_row(
                        "SELECT version FROM collections WHERE id = ?1",
                        params![collection.id],
                        |row| row.get(0),
                    )
                    .optional()?;
                return Err(match stored {
                    None => Error::ResourceNotFound(ResourceType::Collection),
                    Some(version) => Error::StorageConflict(format!(
                        "collection '{}' is at version {version}, expected {expected_version}",
                        collection.id
                    )),
                });
            }
        }
        Write::RemoveDataAttribute {
            collection_id,
            attribute_id,
        } => {
            let table = data_table(collection_id)?;
            let records: Vec<(String, String)> = {
                let mut stmt = tx.prepare(&format!("SELECT id, data FROM {table}"))?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                let records = rows.collect::<std::result::Result<Vec<_>, _>>()?;
                records
            };
            for (id, raw) in records {
                let mut data: DataRecord = serde_json::from_str(&raw)?;
                if data.remove(attribute_id).is_some() {
                    tx.execute(
                        &format!("UPDATE {table} SET data = ?1 WHERE id = ?2"),
                        params![serde_json::to_string(&data)?, id],
                    )?;
                }
            }
        }
    }
    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Organization operations

    fn create_organization(&self, org: &Organization) -> Result<()> {
        map_insert(
            self.conn().execute(
                "INSERT INTO organizations (id, code, name, permissions, max_projects, max_collections, max_documents, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    org.id,
                    org.code,
                    org.name,
                    serde_json::to_string(&org.permissions)?,
                    org.service_limits.max_projects.map(to_count),
                    org.service_limits.max_collections.map(to_count),
                    org.service_limits.max_documents.map(to_count),
                    format_datetime(&org.created_at),
                ],
            ),
            || format!("organization '{}'", org.code),
        )
    }

    fn get_organization(&self, id: &str) -> Result<Option<Organization>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = ?1"),
            params![id],
            organization_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_organization_by_code(&self, code: &str) -> Result<Option<Organization>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE code = ?1"),
            params![code],
            organization_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_organizations(&self) -> Result<Vec<Organization>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations ORDER BY code"
        ))?;
        let rows = stmt.query_map([], organization_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_organization(&self, org: &Organization) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE organizations
             SET name = ?1, permissions = ?2, max_projects = ?3, max_collections = ?4, max_documents = ?5
             WHERE id = ?6",
            params![
                org.name,
                serde_json::to_string(&org.permissions)?,
                org.service_limits.max_projects.map(to_count),
                org.service_limits.max_collections.map(to_count),
                org.service_limits.max_documents.map(to_count),
                org.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::ResourceNotFound(ResourceType::Organization));
        }
        Ok(())
    }

    fn delete_organization(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        drop_data_tables(
            &tx,
            "SELECT c.id FROM collections c JOIN projects p ON p.id = c.project_id
             WHERE p.organization_id = ?1",
            id,
        )?;
        let rows = tx.execute("DELETE FROM organizations WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    // Project operations

    fn create_project(&self, project: &Project) -> Result<()> {
        map_insert(
            self.conn().execute(
                "INSERT INTO projects (id, organization_id, code, name, permissions, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    project.id,
                    project.organization_id,
                    project.code,
                    project.name,
                    serde_json::to_string(&project.permissions)?,
                    format_datetime(&project.created_at),
                ],
            ),
            || format!("project '{}'", project.code),
        )
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
            params![id],
            project_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_project_by_code(&self, organization_id: &str, code: &str) -> Result<Option<Project>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {PROJECT_COLUMNS} FROM projects WHERE organization_id = ?1 AND code = ?2"
            ),
            params![organization_id, code],
            project_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_projects(&self, organization_id: &str) -> Result<Vec<Project>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE organization_id = ?1 ORDER BY code"
        ))?;
        let rows = stmt.query_map(params![organization_id], project_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_projects(&self, organization_id: &str) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM projects WHERE organization_id = ?1",
            params![organization_id],
            |row| row.get(0),
        )?;
        Ok(from_count(count))
    }

    fn update_project(&self, project: &Project) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE projects SET name = ?1, permissions = ?2 WHERE id = ?3",
            params![
                project.name,
                serde_json::to_string(&project.permissions)?,
                project.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::ResourceNotFound(ResourceType::Project));
        }
        Ok(())
    }

    fn delete_project(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        drop_data_tables(&tx, "SELECT id FROM collections WHERE project_id = ?1", id)?;
        let rows = tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    // Collection operations

    fn create_collection(&self, collection: &Collection) -> Result<()> {
        let table = data_table(&collection.id)?;
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        map_insert(
            tx.execute(
                "INSERT INTO collections (id, project_id, code, name, permissions, attributes,
                                          documents_count, last_time_used, version, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    collection.id,
                    collection.project_id,
                    collection.code,
                    collection.name,
                    serde_json::to_string(&collection.permissions)?,
                    serde_json::to_string(&collection.attributes)?,
                    to_count(collection.documents_count),
                    format_datetime(&collection.last_time_used),
                    to_count(collection.version),
                    format_datetime(&collection.created_at),
                ],
            ),
            || format!("collection '{}'", collection.code),
        )?;
        tx.execute_batch(&data_table_ddl(&table))?;

        tx.commit()?;
        Ok(())
    }

    fn get_collection(&self, id: &str) -> Result<Option<Collection>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = ?1"),
            params![id],
            collection_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_collection_by_code(&self, project_id: &str, code: &str) -> Result<Option<Collection>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {COLLECTION_COLUMNS} FROM collections WHERE project_id = ?1 AND code = ?2"
            ),
            params![project_id, code],
            collection_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_collections(&self, project_id: &str) -> Result<Vec<Collection>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections WHERE project_id = ?1 ORDER BY code"
        ))?;
        let rows = stmt.query_map(params![project_id], collection_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_collections(&self, project_id: &str) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM collections WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )?;
        Ok(from_count(count))
    }

    fn delete_collection(&self, id: &str) -> Result<bool> {
        let table = data_table(id)?;
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx.execute("DELETE FROM collections WHERE id = ?1", params![id])?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))?;

        tx.commit()?;
        Ok(rows > 0)
    }

    // View operations

    fn create_view(&self, view: &View) -> Result<()> {
        map_insert(
            self.conn().execute(
                "INSERT INTO views (id, project_id, code, name, permissions, collection_ids, author_roles, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    view.id,
                    view.project_id,
                    view.code,
                    view.name,
                    serde_json::to_string(&view.permissions)?,
                    serde_json::to_string(&view.collection_ids)?,
                    serde_json::to_string(&view.author_roles)?,
                    view.created_by,
                    format_datetime(&view.created_at),
                ],
            ),
            || format!("view '{}'", view.code),
        )
    }

    fn get_view(&self, id: &str) -> Result<Option<View>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {VIEW_COLUMNS} FROM views WHERE id = ?1"),
            params![id],
            view_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_views(&self, project_id: &str) -> Result<Vec<View>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {VIEW_COLUMNS} FROM views WHERE project_id = ?1 ORDER BY code"
        ))?;
        let rows = stmt.query_map(params![project_id], view_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_view(&self, view: &View) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE views SET name = ?1, permissions = ?2 WHERE id = ?3",
            params![view.name, serde_json::to_string(&view.permissions)?, view.id],
        )?;

        if rows == 0 {
            return Err(Error::ResourceNotFound(ResourceType::View));
        }
        Ok(())
    }

    fn delete_view(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM views WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Document operations

    fn get_document(&self, collection_id: &str, id: &str) -> Result<Option<Document>> {
        let table = data_table(collection_id)?;
        let conn = self.conn();
        conn.query_row(
            &format!(
                "{} WHERE d.id = ?1 AND d.collection_id = ?2",
                document_select(&table)
            ),
            params![id, collection_id],
            document_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_documents(&self, collection_id: &str) -> Result<Vec<Document>> {
        let table = data_table(collection_id)?;
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE d.collection_id = ?1 ORDER BY d.created_at, d.id",
            document_select(&table)
        ))?;
        let rows = stmt.query_map(params![collection_id], document_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_document_ids(&self, collection_id: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id FROM documents WHERE collection_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![collection_id], |row| row.get(0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_organization_documents(&self, organization_id: &str) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM documents d
             JOIN collections c ON c.id = d.collection_id
             JOIN projects p ON p.id = c.project_id
             WHERE p.organization_id = ?1",
            params![organization_id],
            |row| row.get(0),
        )?;
        Ok(from_count(count))
    }

    // Link type operations

    fn create_link_type(&self, link_type: &LinkType) -> Result<()> {
        map_insert(
            self.conn().execute(
                "INSERT INTO link_types (id, project_id, name, collection_a, collection_b, attributes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    link_type.id,
                    link_type.project_id,
                    link_type.name,
                    link_type.collection_ids[0],
                    link_type.collection_ids[1],
                    serde_json::to_string(&link_type.attributes)?,
                    format_datetime(&link_type.created_at),
                ],
            ),
            || format!("link type '{}'", link_type.name),
        )
    }

    fn get_link_type(&self, id: &str) -> Result<Option<LinkType>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {LINK_TYPE_COLUMNS} FROM link_types WHERE id = ?1"),
            params![id],
            link_type_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_link_types(&self, project_id: &str) -> Result<Vec<LinkType>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LINK_TYPE_COLUMNS} FROM link_types WHERE project_id = ?1 ORDER BY name"
        ))?;
        let rows = stmt.query_map(params![project_id], link_type_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_link_types_for_collection(&self, collection_id: &str) -> Result<Vec<LinkType>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LINK_TYPE_COLUMNS} FROM link_types
             WHERE collection_a = ?1 OR collection_b = ?1 ORDER BY name"
        ))?;
        let rows = stmt.query_map(params![collection_id], link_type_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_link_type(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM link_types WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Link instance operations

    fn create_link_instance(&self, link: &LinkInstance) -> Result<()> {
        map_insert(
            self.conn().execute(
                "INSERT INTO link_instances (id, link_type_id, document_a, document_b, data, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    link.id,
                    link.link_type_id,
                    link.document_ids[0],
                    link.document_ids[1],
                    serde_json::to_string(&link.data)?,
                    link.created_by,
                    format_datetime(&link.created_at),
                    link.updated_at.as_ref().map(format_datetime),
                ],
            ),
            || format!("link instance '{}'", link.id),
        )
    }

    fn get_link_instance(&self, id: &str) -> Result<Option<LinkInstance>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {LINK_INSTANCE_COLUMNS} FROM link_instances WHERE id = ?1"),
            params![id],
            link_instance_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_link_instances(&self, link_type_id: &str) -> Result<Vec<LinkInstance>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LINK_INSTANCE_COLUMNS} FROM link_instances
             WHERE link_type_id = ?1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params![link_type_id], link_instance_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_link_instances_for_documents(&self, document_ids: &[String]) -> Result<Vec<LinkInstance>> {
        let conn = self.conn();
        let mut links = Vec::new();
        for chunk in document_ids.chunks(MAX_BOUND_IDS) {
            let marks = placeholders(chunk.len());
            let mut stmt = conn.prepare(&format!(
                "SELECT {LINK_INSTANCE_COLUMNS} FROM link_instances
                 WHERE document_a IN ({marks}) OR document_b IN ({marks})"
            ))?;
            let rows = stmt.query_map(params_from_iter(chunk), link_instance_from_row)?;
            for row in rows {
                links.push(row?);
            }
        }

        // A link whose endpoints fall into different chunks is read twice.
        links.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        links.dedup_by(|a, b| a.id == b.id);
        Ok(links)
    }

    fn delete_link_instance(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM link_instances WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn delete_link_instances_for_documents(&self, document_ids: &[String]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut rows = 0;
        for chunk in document_ids.chunks(MAX_BOUND_IDS) {
            let marks = placeholders(chunk.len());
            rows += tx.execute(
                &format!(
                    "DELETE FROM link_instances WHERE document_a IN ({marks}) OR document_b IN ({marks})"
                ),
                params_from_iter(chunk),
            )?;
        }
        tx.commit()?;
        Ok(rows)
    }

    // Favorite operations

    fn add_favorite(&self, item: &FavoriteItem) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO favorites (user_id, project_id, resource_type, resource_id, collection_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item.user_id,
                item.project_id,
                item.resource_type.as_str(),
                item.resource_id,
                item.collection_id,
                format_datetime(&item.created_at),
            ],
        )?;
        Ok(())
    }

    fn remove_favorite(
        &self,
        user_id: &str,
        project_id: &str,
        resource_type: FavoriteType,
        resource_id: &str,
    ) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM favorites
             WHERE user_id = ?1 AND project_id = ?2 AND resource_type = ?3 AND resource_id = ?4",
            params![user_id, project_id, resource_type.as_str(), resource_id],
        )?;
        Ok(rows > 0)
    }

    fn list_favorites(
        &self,
        user_id: &str,
        project_id: &str,
        resource_type: FavoriteType,
    ) -> Result<Vec<FavoriteItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FAVORITE_COLUMNS} FROM favorites
             WHERE user_id = ?1 AND project_id = ?2 AND resource_type = ?3
             ORDER BY created_at, resource_id"
        ))?;
        let rows = stmt.query_map(
            params![user_id, project_id, resource_type.as_str()],
            favorite_from_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_favorites_for_project(&self, project_id: &str) -> Result<usize> {
        let rows = self
            .conn()
            .execute("DELETE FROM favorites WHERE project_id = ?1", params![project_id])?;
        Ok(rows)
    }

    fn delete_favorites_for_collection(&self, collection_id: &str) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM favorites
             WHERE (resource_type = 'collection' AND resource_id = ?1) OR collection_id = ?1",
            params![collection_id],
        )?;
        Ok(rows)
    }

    fn delete_favorites_for_resources(
        &self,
        resource_type: FavoriteType,
        resource_ids: &[String],
    ) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut rows = 0;
        for chunk in resource_ids.chunks(MAX_BOUND_IDS) {
            let marks = (2..=chunk.len() + 1)
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut values = Vec::with_capacity(chunk.len() + 1);
            values.push(resource_type.as_str());
            values.extend(chunk.iter().map(String::as_str));

            rows += tx.execute(
                &format!("DELETE FROM favorites WHERE resource_type = ?1 AND resource_id IN ({marks})"),
                params_from_iter(values),
            )?;
        }
        tx.commit()?;
        Ok(rows)
    }

    fn delete_favorites_for_user(&self, user_id: &str, project_id: &str) -> Result<usize> {
        let rows = self.conn().execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND project_id = ?2",
            params![user_id, project_id],
        )?;
        Ok(rows)
    }

    fn commit(&self, batch: &WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        for write in batch.writes() {
            apply_write(&tx, write)?;
        }

        tx.commit()?;
        Ok(())
    }
}
