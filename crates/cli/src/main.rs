mod registry;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use registry::{ProjectEntry, ProjectRegistry};
use semdex_store::{provider_from_config, Config, ContextRetriever};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "semdex", version, about = "Semantic code index and retriever")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index a codebase
    Index {
        /// Root directory of the codebase (defaults to the current project)
        root: Option<PathBuf>,

        /// Path to a configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Restrict indexing to these file extensions (e.g. .py .md)
        #[arg(short, long, num_args = 1..)]
        extensions: Vec<String>,

        /// Do not persist the index after building
        #[arg(long)]
        no_save: bool,

        /// Project name (uses the current project if not specified)
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Query the indexed codebase
    Query {
        /// Query string
        query: String,

        /// Minimum similarity score threshold
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Number of results to return
        #[arg(long)]
        top_k: Option<usize>,

        /// Output file path
        #[arg(short, long, default_value = "context.txt")]
        output: PathBuf,

        /// Also print full results to the terminal
        #[arg(short = 'T', long)]
        terminal: bool,

        /// Path to a configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Name of the index to load
        #[arg(short, long)]
        index: Option<String>,

        /// Project name (uses the current project if not specified)
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Manage the project registry
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    /// Set the current project, registering it when a directory is given
    Set {
        name: String,

        /// Project directory (required for new projects)
        directory: Option<PathBuf>,

        /// Path to a custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List all projects
    List,

    /// Remove a project
    Remove { name: String },

    /// Show the current project
    Current,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut registry = ProjectRegistry::open_default()?;

    match cli.command {
        Command::Project { command } => run_project(&mut registry, command),
        Command::Index {
            root,
            config,
            extensions,
            no_save,
            project,
        } => run_index(&registry, root, config, &extensions, no_save, project.as_deref()).await,
        Command::Query {
            query,
            threshold,
            top_k,
            output,
            terminal,
            config,
            index,
            project,
        } => {
            run_query(
                &registry,
                &query,
                threshold,
                top_k,
                &output,
                terminal,
                config,
                index,
                project.as_deref(),
            )
            .await
        }
    }
}

fn run_project(registry: &mut ProjectRegistry, command: ProjectCommand) -> Result<()> {
    match command {
        ProjectCommand::Set {
            name,
            directory,
            config,
        } => {
            if !registry.contains(&name) && directory.is_none() {
                bail!(
                    "project '{name}' does not exist; specify a directory to create it"
                );
            }
            if let Some(directory) = directory {
                registry.add_project(&name, &directory, config.as_deref())?;
            }
            let entry = registry.set_current(&name)?;
            println!(
                "Current project set to '{name}' ({})",
                entry.directory.display()
            );
        }
        ProjectCommand::List => {
            let projects = registry.list();
            if projects.is_empty() {
                println!("No projects found.");
            } else {
                println!("Projects:");
                for (name, entry, current) in projects {
                    let marker = if current { " (current)" } else { "" };
                    println!("  {name}{marker}: {}", entry.directory.display());
                }
            }
        }
        ProjectCommand::Remove { name } => {
            if !registry.contains(&name) {
                bail!("project '{name}' does not exist");
            }
            registry.remove_project(&name)?;
            println!("Project '{name}' removed.");
        }
        ProjectCommand::Current => match registry.current_name() {
            Some(name) => {
                let entry = registry
                    .get(Some(name))
                    .context("current project is missing from the registry")?;
                println!("Current project: {name}");
                println!("  Directory: {}", entry.directory.display());
                if let Some(config) = &entry.config_path {
                    println!("  Config: {}", config.display());
                }
                println!("  Index name: {}", entry.index_name);
            }
            None => println!("No current project set."),
        },
    }
    Ok(())
}

async fn run_index(
    registry: &ProjectRegistry,
    root: Option<PathBuf>,
    config_path: Option<PathBuf>,
    extensions: &[String],
    no_save: bool,
    project: Option<&str>,
) -> Result<()> {
    let project = resolve_project(registry, project)?;

    let root = root
        .or_else(|| project.as_ref().map(|p| p.directory.clone()))
        .context("no root directory specified and no current project set")?;
    let config_path =
        config_path.or_else(|| project.as_ref().and_then(|p| p.config_path.clone()));

    let mut config = Config::load(config_path.as_deref())?;
    if let Some(project) = &project {
        config.index_name = project.index_name.clone();
    }

    let provider = provider_from_config(&config.embedding)
        .await
        .context("failed to initialize the embedding provider")?;
    let mut retriever = ContextRetriever::new(config, provider)?;

    let extensions = normalize_extensions(extensions);
    let count = retriever
        .index_corpus(&root, extensions.as_deref(), !no_save)
        .await?;
    println!(
        "Successfully indexed {count} chunks from {}",
        root.display()
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_query(
    registry: &ProjectRegistry,
    query: &str,
    threshold: Option<f32>,
    top_k: Option<usize>,
    output: &PathBuf,
    terminal: bool,
    config_path: Option<PathBuf>,
    index: Option<String>,
    project: Option<&str>,
) -> Result<()> {
    let project = resolve_project(registry, project)?;
    let config_path =
        config_path.or_else(|| project.as_ref().and_then(|p| p.config_path.clone()));

    let mut config = Config::load(config_path.as_deref())?;
    if let Some(index) = index {
        config.index_name = index;
    } else if let Some(project) = &project {
        config.index_name = project.index_name.clone();
    }
    if let Some(top_k) = top_k {
        config.retriever.top_k = top_k;
    }

    let provider = provider_from_config(&config.embedding)
        .await
        .context("failed to initialize the embedding provider")?;
    let mut retriever = ContextRetriever::new(config, provider)?;

    if !retriever.load_index().await {
        bail!("could not load index `{}`", retriever.index_name());
    }

    let results = retriever.query(query, threshold).await?;

    let mut content = format!("Results for query: {query}\n\n");
    for (i, result) in results.iter().enumerate() {
        content.push_str(&format!("Result {}:\n{result}\n\n", i + 1));
    }
    std::fs::write(output, &content)
        .with_context(|| format!("cannot write results to {}", output.display()))?;

    println!("Results for query: {query}");
    println!(
        "Found {} results. Saved to {}",
        results.len(),
        output.display()
    );

    if terminal {
        println!("\nFull results:");
        for (i, result) in results.iter().enumerate() {
            println!("Result {}:\n{result}\n", i + 1);
        }
    }
    Ok(())
}

fn resolve_project(
    registry: &ProjectRegistry,
    name: Option<&str>,
) -> Result<Option<ProjectEntry>> {
    match name {
        Some(name) => match registry.get(Some(name)) {
            Some(entry) => Ok(Some(entry.clone())),
            None => bail!("project '{name}' not found"),
        },
        None => Ok(registry.get(None).cloned()),
    }
}

/// Ensure extensions carry a leading dot and are lowercase
fn normalize_extensions(extensions: &[String]) -> Option<Vec<String>> {
    if extensions.is_empty() {
        return None;
    }
    Some(
        extensions
            .iter()
            .map(|extension| {
                let lower = extension.to_ascii_lowercase();
                if lower.starts_with('.') {
                    lower
                } else {
                    format!(".{lower}")
                }
            })
            .collect(),
    )
}
