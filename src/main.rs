use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vellum::cli::{
    AttributeCommands, CollectionCommands, DocCommands, FavoriteCommands, LinkCommands,
    OrgCommands, ProjectCommands, Session, run_attribute, run_collection, run_doc, run_favorite,
    run_init, run_link, run_org, run_project,
};

#[derive(Parser)]
#[command(name = "vellum")]
#[command(about = "A multi-tenant document platform", long_about = None)]
struct Cli {
    /// Data directory holding the database, config and attachments
    #[arg(long, global = true, default_value = "./data")]
    data_dir: PathBuf,

    /// User the command runs as
    #[arg(long, global = true, default_value = "admin")]
    user: String,

    /// Group the user belongs to (repeatable)
    #[arg(long = "group", global = true)]
    groups: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, config file and database
    Init,

    /// Manage organizations
    Org {
        #[command(subcommand)]
        command: OrgCommands,
    },

    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Manage collections
    Collection {
        #[command(subcommand)]
        command: CollectionCommands,
    },

    /// Manage collection attributes
    Attribute {
        #[command(subcommand)]
        command: AttributeCommands,
    },

    /// Manage documents
    Doc {
        #[command(subcommand)]
        command: DocCommands,
    },

    /// Manage link types and links
    Link {
        #[command(subcommand)]
        command: LinkCommands,
    },

    /// Manage favorites
    Favorite {
        #[command(subcommand)]
        command: FavoriteCommands,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vellum=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::Init = cli.command {
        return run_init(&cli.data_dir);
    }

    let session = Session::open(&cli.data_dir, &cli.user, &cli.groups)?;
    dispatch(&session, cli.command)
}

fn dispatch(session: &Session, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init => anyhow::bail!("'init' does not run inside a session"),
        Commands::Org { command } => run_org(session, command),
        Commands::Project { command } => run_project(session, command),
        Commands::Collection { command } => run_collection(session, command),
        Commands::Attribute { command } => run_attribute(session, command),
        Commands::Doc { command } => run_doc(session, command),
        Commands::Link { command } => run_link(session, command),
        Commands::Favorite { command } => run_favorite(session, command),
    }
}
