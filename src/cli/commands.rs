use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Organization and project a command runs in.
#[derive(Args, Debug, Clone)]
pub struct WorkspaceArgs {
    /// Organization code
    #[arg(long)]
    pub org: String,

    /// Project code
    #[arg(long)]
    pub project: String,

    /// View id the request is made through
    #[arg(long)]
    pub view: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LimitArgs {
    /// Maximum number of projects (unlimited when omitted)
    #[arg(long)]
    pub max_projects: Option<u64>,

    /// Maximum number of collections per project
    #[arg(long)]
    pub max_collections: Option<u64>,

    /// Maximum number of documents across the organization
    #[arg(long)]
    pub max_documents: Option<u64>,
}

#[derive(Subcommand)]
pub enum OrgCommands {
    /// Create an organization owned by the calling user
    Create {
        /// URL-safe organization code
        #[arg(long)]
        code: String,

        /// Display name (defaults to the code)
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        limits: LimitArgs,
    },

    /// List organizations readable by the calling user
    List,

    /// Replace the service limits of an organization
    Limits {
        /// Organization code
        #[arg(long)]
        org: String,

        #[command(flatten)]
        limits: LimitArgs,
    },

    /// Grant roles on an organization
    Share {
        /// Organization code
        #[arg(long)]
        org: String,

        /// User receiving the roles
        #[arg(long)]
        member: String,

        /// Comma-separated roles (read, write, manage, share, clone)
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,
    },

    /// Delete an organization with everything it owns
    Delete {
        /// Organization code
        #[arg(long)]
        org: String,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a project in an organization
    Create {
        /// Organization code
        #[arg(long)]
        org: String,

        /// URL-safe project code
        #[arg(long)]
        code: String,

        /// Display name (defaults to the code)
        #[arg(long)]
        name: Option<String>,
    },

    /// List projects of an organization
    List {
        /// Organization code
        #[arg(long)]
        org: String,
    },

    /// Grant roles on a project
    Share {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// User receiving the roles
        #[arg(long)]
        member: String,

        /// Comma-separated roles (read, write, manage, share, clone)
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,
    },

    /// Revoke every role of a user on a project
    RemoveMember {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// User losing access
        #[arg(long)]
        member: String,
    },

    /// Delete a project with everything it owns
    Delete {
        #[command(flatten)]
        ws: WorkspaceArgs,
    },
}

#[derive(Subcommand)]
pub enum CollectionCommands {
    /// Create a collection
    Create {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// URL-safe collection code
        #[arg(long)]
        code: String,

        /// Display name (defaults to the code)
        #[arg(long)]
        name: Option<String>,
    },

    /// List collections readable in the project
    List {
        #[command(flatten)]
        ws: WorkspaceArgs,
    },

    /// Show a collection with its attribute usage
    Show {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Collection code
        #[arg(long)]
        collection: String,
    },

    /// Drop a collection with its documents, links and favorites
    Drop {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Collection code
        #[arg(long)]
        collection: String,
    },
}

#[derive(Subcommand)]
pub enum AttributeCommands {
    /// Declare an attribute's name and constraint
    Set {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Collection code
        #[arg(long)]
        collection: String,

        /// Attribute id
        #[arg(long)]
        id: String,

        /// Display name (defaults to the id)
        #[arg(long)]
        name: Option<String>,

        /// Constraint as JSON, e.g. '{"type":"number"}'
        #[arg(long)]
        constraint: Option<String>,
    },

    /// Remove an attribute and its values from every document
    Remove {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Collection code
        #[arg(long)]
        collection: String,

        /// Attribute id
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
pub enum DocCommands {
    /// Create a document from a JSON object
    Create {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Collection code
        #[arg(long)]
        collection: String,

        /// Data record as a JSON object
        #[arg(long)]
        data: String,

        /// Meta data as a JSON object
        #[arg(long)]
        meta: Option<String>,
    },

    /// Import documents from a file holding a JSON array of objects
    Import {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Collection code
        #[arg(long)]
        collection: String,

        /// Path to the JSON file
        #[arg(long)]
        file: PathBuf,
    },

    /// Show a document
    Get {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Collection code
        #[arg(long)]
        collection: String,

        /// Document id
        #[arg(long)]
        id: String,
    },

    /// List documents of a collection
    List {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Collection code
        #[arg(long)]
        collection: String,
    },

    /// Merge a JSON object into a document's data
    Update {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Collection code
        #[arg(long)]
        collection: String,

        /// Document id
        #[arg(long)]
        id: String,

        /// Data as a JSON object
        #[arg(long)]
        data: String,

        /// Replace the whole data record instead of merging
        #[arg(long)]
        replace: bool,
    },

    /// Delete a document
    Delete {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Collection code
        #[arg(long)]
        collection: String,

        /// Document id
        #[arg(long)]
        id: String,
    },

    /// Clone documents, optionally with their links
    Duplicate {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Collection code
        #[arg(long)]
        collection: String,

        /// Document ids to clone
        #[arg(long = "id", required = true)]
        ids: Vec<String>,

        /// Also copy the links of the cloned documents
        #[arg(long)]
        with_links: bool,
    },
}

#[derive(Subcommand)]
pub enum LinkCommands {
    /// Create a link type between two collections
    CreateType {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Link type name
        #[arg(long)]
        name: String,

        /// First collection code
        #[arg(long)]
        from: String,

        /// Second collection code
        #[arg(long)]
        to: String,
    },

    /// List link types of the project
    Types {
        #[command(flatten)]
        ws: WorkspaceArgs,
    },

    /// Delete a link type with all its links
    DeleteType {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Link type id
        #[arg(long)]
        id: String,
    },

    /// Link two documents
    Create {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Link type id
        #[arg(long)]
        link_type: String,

        /// Document id in the first collection
        #[arg(long)]
        from: String,

        /// Document id in the second collection
        #[arg(long)]
        to: String,

        /// Link data as a JSON object
        #[arg(long)]
        data: Option<String>,
    },

    /// List links touching a document
    List {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Collection code of the document
        #[arg(long)]
        collection: String,

        /// Document id
        #[arg(long)]
        document: String,
    },

    /// Delete a link
    Delete {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// Link id
        #[arg(long)]
        id: String,
    },
}

/// What a favorite command points at. A document needs its collection.
#[derive(Args, Debug, Clone)]
pub struct FavoriteArgs {
    /// Collection code
    #[arg(long, required_unless_present = "view_id")]
    pub collection: Option<String>,

    /// Document id inside the collection
    #[arg(long, requires = "collection")]
    pub document: Option<String>,

    /// View id
    #[arg(long = "view-id", conflicts_with = "collection")]
    pub view_id: Option<String>,
}

#[derive(Subcommand)]
pub enum FavoriteCommands {
    /// Bookmark a collection, document or view
    Add {
        #[command(flatten)]
        ws: WorkspaceArgs,

        #[command(flatten)]
        target: FavoriteArgs,
    },

    /// Remove a bookmark
    Remove {
        #[command(flatten)]
        ws: WorkspaceArgs,

        #[command(flatten)]
        target: FavoriteArgs,
    },

    /// List bookmarked ids of one resource type
    List {
        #[command(flatten)]
        ws: WorkspaceArgs,

        /// collection, document or view
        #[arg(long = "type", default_value = "collection")]
        resource_type: String,
    },
}
