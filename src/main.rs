// conduit - keeps a production project's folders, assets and versions in order
//
// This is the main entry point. Parses CLI args and dispatches to handlers.

use anyhow::Context;
use clap::{Parser, Subcommand};
use conduit_lib::{
    model::{AssetId, FolderId, NodeRef, TaskId},
    render::render_tree,
    settings::SettingsEntry,
    Conduit, ConduitError, Settings,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "conduit", version)]
#[command(about = "Manage a production project: folders, assets, tasks and versions")]
struct Cli {
    /// Project directory (overrides the configured one for this run)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the project directory and remember it
    Open { dir: PathBuf },
    /// Print the project tree
    Tree,
    /// List assets, optionally below one folder
    Assets {
        #[arg(long)]
        folder: Option<PathBuf>,
    },
    /// Fuzzy-find assets by name
    Find { query: String },
    /// Print an asset (and optionally one of its tasks) as JSON
    Show {
        asset: PathBuf,
        #[arg(long)]
        task: Option<String>,
    },
    /// Create a folder
    NewFolder {
        name: String,
        #[arg(long)]
        parent: Option<PathBuf>,
    },
    /// Create an asset
    NewAsset {
        name: String,
        #[arg(long)]
        parent: Option<PathBuf>,
        /// Also create the configured template tasks
        #[arg(long)]
        templates: bool,
    },
    /// Create a task inside an asset
    NewTask { asset: PathBuf, name: String },
    /// Delete a folder, asset or task from disk and from the project
    Delete { path: PathBuf },
    /// List the deliverable files of a task
    Files { asset: PathBuf, task: String },
    /// Show the version the next ingested file would get
    NextVersion { asset: PathBuf, task: String },
    /// Copy a file into a task as its next version
    Ingest {
        file: PathBuf,
        asset: PathBuf,
        task: String,
        #[arg(short, long)]
        comment: Option<String>,
    },
    /// Read or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print every setting
    Show,
    /// Print one setting
    Get { key: String },
    /// Set a setting (JSON values are parsed, anything else is a string)
    Set { key: String, value: String },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ConduitError>() {
                Some(err) => eprintln!("✗ {}", err.user_message()),
                None => eprintln!("✗ {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with output to stderr
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "conduit=info,conduit_lib=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = match &cli.config {
        Some(path) => Settings::with_path(path),
        None => Settings::new()?,
    };
    if let Some(root) = &cli.root {
        settings.set(SettingsEntry::ProjectDirectory.key(), root.display().to_string());
    }
    let mut conduit = Conduit::new(settings);

    match cli.command {
        Commands::Open { dir } => handle_open(&mut conduit, &dir),
        Commands::Config { action } => handle_config(&mut conduit, action),
        command => {
            if !conduit.load_project()? {
                return Err(ConduitError::NoProjectLoaded.into());
            }
            handle_project(&mut conduit, command)
        }
    }
}

fn handle_open(conduit: &mut Conduit, dir: &Path) -> anyhow::Result<()> {
    let dir = dir
        .canonicalize()
        .with_context(|| format!("cannot open {}", dir.display()))?;
    conduit.open(&dir)?;
    conduit
        .settings_mut()
        .set(SettingsEntry::LastOpenedDirectory.key(), dir.display().to_string());
    conduit.settings().save()?;

    let assets = conduit.get_all_assets(None)?;
    println!("✓ Opened {} ({} assets)", dir.display(), assets.len());
    Ok(())
}

fn handle_config(conduit: &mut Conduit, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let all = serde_json::Value::Object(conduit.settings().all());
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
        ConfigAction::Get { key } => match conduit.settings().get(&key) {
            Some(value) => println!("{}", value),
            None => println!("(not set)"),
        },
        ConfigAction::Set { key, value } => {
            let parsed = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            conduit.settings_mut().set(&key, parsed);
            conduit.settings().save()?;
            println!("✓ {} updated", key);
        }
    }
    Ok(())
}

fn handle_project(conduit: &mut Conduit, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Tree => {
            print!("{}", render_tree(conduit.project()?)?);
        }
        Commands::Assets { folder } => {
            let folder = folder.map(|p| find_folder(conduit, &p)).transpose()?;
            for id in conduit.get_all_assets(folder)? {
                println!("{}", conduit.asset(id)?.path.display());
            }
        }
        Commands::Find { query } => {
            let results = conduit.search_assets(&query)?;
            if results.is_empty() {
                println!("No assets matching '{}'", query);
            }
            for (i, (id, score)) in results.iter().enumerate() {
                let asset = conduit.asset(*id)?;
                println!("{:3}. {} (score {}) {}", i + 1, asset.name, score, asset.path.display());
            }
        }
        Commands::Show { asset, task } => {
            let asset = find_asset(conduit, &asset)?;
            conduit.set_selected_asset(Some(asset));
            if let Some(name) = task {
                let task = find_task(conduit, asset, &name)?;
                conduit.set_selected_task(Some(task));
            }
            let snapshot = conduit.selection_handle().snapshot();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::NewFolder { name, parent } => {
            let parent = parent.map(|p| find_folder(conduit, &p)).transpose()?;
            let id = conduit.create_folder(&name, parent)?;
            println!("✓ Created folder {}", conduit.folder(id)?.path.display());
        }
        Commands::NewAsset {
            name,
            parent,
            templates,
        } => {
            let parent = match parent {
                Some(p) => find_folder(conduit, &p)?,
                None => conduit.project()?.root(),
            };
            let id = conduit.create_asset(&name, parent)?;
            if templates {
                conduit.create_template_tasks(id)?;
            }
            let record = conduit.asset_record(id)?;
            println!("✓ Created asset {} (tasks: {})", record.path, record.tasks.join(", "));
        }
        Commands::NewTask { asset, name } => {
            let asset = find_asset(conduit, &asset)?;
            let id = conduit.create_task(&name, asset)?;
            println!("✓ Created task {}", conduit.task(id)?.path.display());
        }
        Commands::Delete { path } => {
            let node = find_node(conduit, &path)?;
            conduit.delete_node(node)?;
            println!("✓ Deleted {}", resolve(conduit, &path)?.display());
        }
        Commands::Files { asset, task } => {
            let task = find_task(conduit, find_asset(conduit, &asset)?, &task)?;
            for file in conduit.task_files(task)? {
                let name = file.file_name().unwrap_or_default().to_string_lossy().into_owned();
                match conduit_lib::versioning::read_metadata(&file)? {
                    Some(meta) => println!(
                        "{}  ({}{})",
                        name,
                        meta.user,
                        meta.comment.map(|c| format!(": {}", c)).unwrap_or_default()
                    ),
                    None => println!("{}", name),
                }
            }
        }
        Commands::NextVersion { asset, task } => {
            let task = find_task(conduit, find_asset(conduit, &asset)?, &task)?;
            println!("{}", conduit.next_version(task)?);
        }
        Commands::Ingest {
            file,
            asset,
            task,
            comment,
        } => {
            let asset = find_asset(conduit, &asset)?;
            let task = find_task(conduit, asset, &task)?;
            conduit.set_selected_asset(Some(asset));
            conduit.set_selected_task(Some(task));

            if let Some(ingested) = conduit.ingest_file(&file, None, comment.as_deref())? {
                println!("✓ {} (version {})", ingested.path.display(), ingested.version);
            }
        }
        Commands::Open { .. } | Commands::Config { .. } => unreachable!("handled before loading"),
    }
    Ok(())
}

// Paths on the command line are relative to the project root unless absolute
fn resolve(conduit: &Conduit, path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(conduit.project()?.root_path().join(path))
}

fn find_folder(conduit: &Conduit, path: &Path) -> anyhow::Result<FolderId> {
    let full = resolve(conduit, path)?;
    conduit
        .project()?
        .find_folder(&full)
        .ok_or_else(|| ConduitError::NodeNotFound(path.display().to_string()).into())
}

fn find_asset(conduit: &Conduit, path: &Path) -> anyhow::Result<AssetId> {
    let full = resolve(conduit, path)?;
    conduit
        .project()?
        .find_asset(&full)
        .ok_or_else(|| ConduitError::NodeNotFound(path.display().to_string()).into())
}

fn find_task(conduit: &Conduit, asset: AssetId, name: &str) -> anyhow::Result<TaskId> {
    conduit
        .project()?
        .find_task(asset, name)
        .ok_or_else(|| ConduitError::NodeNotFound(name.to_string()).into())
}

// Work out what kind of node sits at `path`
fn find_node(conduit: &Conduit, path: &Path) -> anyhow::Result<NodeRef> {
    let full = resolve(conduit, path)?;
    let tree = conduit.project()?;

    if let Some(id) = tree.find_asset(&full) {
        return Ok(NodeRef::Asset(id));
    }
    if let Some(id) = tree.find_folder(&full) {
        return Ok(NodeRef::Folder(id));
    }
    if let (Some(parent), Some(name)) = (full.parent(), full.file_name()) {
        if let Some(asset) = tree.find_asset(parent) {
            if let Some(id) = tree.find_task(asset, &name.to_string_lossy()) {
                return Ok(NodeRef::Task(id));
            }
        }
    }
    Err(ConduitError::NodeNotFound(path.display().to_string()).into())
}
