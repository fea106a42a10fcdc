pub const SCHEMA: &str = r#"
-- Organizations are the tenant boundary
CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    permissions TEXT NOT NULL DEFAULT '{}',

    -- Service limits, NULL = unlimited
    max_projects INTEGER,
    max_collections INTEGER,
    max_documents INTEGER,

    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    permissions TEXT NOT NULL DEFAULT '{}',
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(organization_id, code)
);

-- Collection metadata; attributes and their usage counts live in JSON
CREATE TABLE IF NOT EXISTS collections (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    permissions TEXT NOT NULL DEFAULT '{}',
    attributes TEXT NOT NULL DEFAULT '[]',
    documents_count INTEGER NOT NULL DEFAULT 0,
    last_time_used TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 0,  -- compare-and-swap token
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(project_id, code)
);

CREATE TABLE IF NOT EXISTS views (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    permissions TEXT NOT NULL DEFAULT '{}',
    collection_ids TEXT NOT NULL DEFAULT '[]',
    author_roles TEXT NOT NULL DEFAULT '{}',
    created_by TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(project_id, code)
);

-- Document envelopes; Data records live in one data_c_* table per collection
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    collection_id TEXT NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_by TEXT,
    updated_at TEXT,
    meta_data TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS link_types (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    collection_a TEXT NOT NULL,
    collection_b TEXT NOT NULL,
    attributes TEXT NOT NULL DEFAULT '[]',
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(project_id, name)
);

-- Document endpoints are not foreign keys: removal is an explicit cleanup step
CREATE TABLE IF NOT EXISTS link_instances (
    id TEXT PRIMARY KEY,
    link_type_id TEXT NOT NULL REFERENCES link_types(id) ON DELETE CASCADE,
    document_a TEXT NOT NULL,
    document_b TEXT NOT NULL,
    data TEXT NOT NULL DEFAULT '{}',
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS favorites (
    user_id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    resource_type TEXT NOT NULL,  -- collection, document or view
    resource_id TEXT NOT NULL,
    collection_id TEXT,           -- owning collection for documents
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (user_id, project_id, resource_type, resource_id)
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_projects_organization ON projects(organization_id);
CREATE INDEX IF NOT EXISTS idx_collections_project ON collections(project_id);
CREATE INDEX IF NOT EXISTS idx_views_project ON views(project_id);
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection_id);
CREATE INDEX IF NOT EXISTS idx_link_types_project ON link_types(project_id);
CREATE INDEX IF NOT EXISTS idx_link_instances_type ON link_instances(link_type_id);
CREATE INDEX IF NOT EXISTS idx_link_instances_a ON link_instances(document_a);
CREATE INDEX IF NOT EXISTS idx_link_instances_b ON link_instances(document_b);
CREATE INDEX IF NOT EXISTS idx_favorites_project ON favorites(project_id);
CREATE INDEX IF NOT EXISTS idx_favorites_collection ON favorites(collection_id);
"#;

/// DDL for a collection's Data table.
pub fn data_table_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            data TEXT NOT NULL DEFAULT '{{}}'
        )"
    )
}
