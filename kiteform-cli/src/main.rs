mod config;
mod display;
mod engine;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::info;

use kiteform_core::differ::create_plan;
use kiteform_core::provider::Provider;
use kiteform_core::resource::ResourceId;
use kiteform_provider_buildkite::{BuildkiteProvider, PIPELINE_RESOURCE_TYPE};
use kiteform_state::{LockInfo, StateBackend, StateFile, create_backend};

use config::KiteformConfig;
use display::print_plan;
use engine::{ApplyReport, apply_plan, destroy_plan, persist, record_state, refresh};

#[derive(Parser)]
#[command(name = "kiteform")]
#[command(about = "Declarative management of Buildkite pipelines", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, short, global = true, default_value = "main.toml")]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate,
    /// Show execution plan without applying changes
    Plan,
    /// Apply changes to reach the desired state
    Apply,
    /// Delete every pipeline tracked in state
    Destroy {
        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Adopt an existing pipeline into state
    Import {
        /// Name of the `[pipeline.<name>]` table
        name: String,
        /// Slug of the existing pipeline
        slug: String,
    },
    /// Update state from the remote API without changing pipelines
    Refresh,
    /// State inspection and maintenance
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List tracked resources
    List,
    /// Remove a stale state lock
    ForceUnlock {
        /// ID of the lock to remove
        lock_id: String,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate => run_validate(&cli.file),
        Commands::Plan => run_plan(&cli.file).await,
        Commands::Apply => run_apply(&cli.file).await,
        Commands::Destroy { auto_approve } => run_destroy(&cli.file, auto_approve).await,
        Commands::Import { name, slug } => run_import(&cli.file, &name, &slug).await,
        Commands::Refresh => run_refresh(&cli.file).await,
        Commands::State { command } => match command {
            StateCommands::List => run_state_list(&cli.file).await,
            StateCommands::ForceUnlock { lock_id } => run_force_unlock(&cli.file, &lock_id).await,
        },
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_validate(file: &Path) -> Result<(), String> {
    let config = KiteformConfig::load(file)?;
    println!(
        "{}",
        format!(
            "Configuration is valid. {} pipeline(s) declared.",
            config.pipelines.len()
        )
        .green()
    );
    Ok(())
}

async fn run_plan(file: &Path) -> Result<(), String> {
    let config = KiteformConfig::load(file)?;
    let provider = build_provider(&config)?;
    let backend = open_backend(&config).await?;

    let state_file = load_state(&*backend).await?;
    let current = refresh(&provider, &state_file).await?;

    print_plan(&create_plan(&config.resources(), &current));
    Ok(())
}

async fn run_apply(file: &Path) -> Result<(), String> {
    let config = KiteformConfig::load(file)?;
    let provider = build_provider(&config)?;
    let backend = open_backend(&config).await?;

    let lock = acquire_lock(&*backend, "apply").await?;
    let result = apply_locked(&config, &provider, &*backend).await;
    release_lock(&*backend, &lock).await;
    result
}

async fn apply_locked(
    config: &KiteformConfig,
    provider: &BuildkiteProvider,
    backend: &dyn StateBackend,
) -> Result<(), String> {
    let mut state_file = load_state(backend).await?;
    let current = refresh(provider, &state_file).await?;
    sync_refreshed(backend, &mut state_file, provider.name(), &current).await?;

    let plan = create_plan(&config.resources(), &current);
    if plan.is_empty() {
        println!("{}", "No changes needed.".green());
        return Ok(());
    }

    print_plan(&plan);
    println!();
    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let report = apply_plan(provider, &plan, backend, &mut state_file).await?;
    print_report("Apply", &report);
    Ok(())
}

async fn run_destroy(file: &Path, auto_approve: bool) -> Result<(), String> {
    let config = KiteformConfig::load(file)?;
    let provider = build_provider(&config)?;
    let backend = open_backend(&config).await?;

    let lock = acquire_lock(&*backend, "destroy").await?;
    let result = destroy_locked(&provider, &*backend, auto_approve).await;
    release_lock(&*backend, &lock).await;
    result
}

async fn destroy_locked(
    provider: &BuildkiteProvider,
    backend: &dyn StateBackend,
    auto_approve: bool,
) -> Result<(), String> {
    let mut state_file = load_state(backend).await?;
    let current = refresh(provider, &state_file).await?;
    sync_refreshed(backend, &mut state_file, provider.name(), &current).await?;

    let plan = destroy_plan(&current);
    if plan.is_empty() {
        println!("{}", "No pipelines to destroy.".green());
        return Ok(());
    }

    println!("{}", "Destroy Plan:".red().bold());
    println!();
    print_plan(&plan);
    println!();

    if !auto_approve && !confirm("Do you really want to destroy all tracked pipelines?")? {
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Destroying pipelines...".red().bold());
    println!();

    let report = apply_plan(provider, &plan, backend, &mut state_file).await?;
    print_report("Destroy", &report);
    Ok(())
}

async fn run_import(file: &Path, name: &str, slug: &str) -> Result<(), String> {
    let config = KiteformConfig::load(file)?;
    if !config.pipelines.contains_key(name) {
        return Err(format!(
            "{}.{} is not declared in {}",
            PIPELINE_RESOURCE_TYPE,
            name,
            file.display()
        ));
    }
    let provider = build_provider(&config)?;
    let backend = open_backend(&config).await?;
    let id = ResourceId::new(PIPELINE_RESOURCE_TYPE, name);

    let lock = acquire_lock(&*backend, "import").await?;
    let result = import_locked(&provider, &*backend, &id, slug).await;
    release_lock(&*backend, &lock).await;
    result
}

async fn import_locked(
    provider: &BuildkiteProvider,
    backend: &dyn StateBackend,
    id: &ResourceId,
    slug: &str,
) -> Result<(), String> {
    let mut state_file = load_state(backend).await?;
    if state_file.find_resource(id).is_some() {
        return Err(format!("{} is already managed", id));
    }

    let imported = provider
        .import_pipeline(id, slug)
        .await
        .map_err(|e| e.to_string())?;
    record_state(&mut state_file, provider.name(), id, &imported)?;
    persist(backend, &mut state_file).await?;

    println!("  {} Imported {} ({})", "✓".green(), id, slug);
    Ok(())
}

async fn run_refresh(file: &Path) -> Result<(), String> {
    let config = KiteformConfig::load(file)?;
    let provider = build_provider(&config)?;
    let backend = open_backend(&config).await?;

    let lock = acquire_lock(&*backend, "refresh").await?;
    let result = refresh_locked(&provider, &*backend).await;
    release_lock(&*backend, &lock).await;
    result
}

async fn refresh_locked(provider: &BuildkiteProvider, backend: &dyn StateBackend) -> Result<(), String> {
    let mut state_file = load_state(backend).await?;
    let current = refresh(provider, &state_file).await?;

    let mut ids: Vec<&ResourceId> = current.keys().collect();
    ids.sort();
    for id in ids {
        match current[id].identifier.as_deref() {
            Some(slug) => println!("  {} {} ({})", "✓".green(), id, slug),
            None => println!("  {} {} (no longer exists)", "-".red(), id),
        }
    }

    sync_refreshed(backend, &mut state_file, provider.name(), &current).await
}

async fn run_state_list(file: &Path) -> Result<(), String> {
    let config = KiteformConfig::load(file)?;
    let backend = open_backend(&config).await?;

    let Some(state_file) = backend.read_state().await.map_err(|e| e.to_string())? else {
        println!("{}", "No state found.".yellow());
        return Ok(());
    };

    for resource in &state_file.resources {
        println!(
            "{}\t{}",
            resource.resource_id(),
            resource.identifier.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn run_force_unlock(file: &Path, lock_id: &str) -> Result<(), String> {
    let config = KiteformConfig::load(file)?;
    let backend = open_backend(&config).await?;

    backend
        .force_unlock(lock_id)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", format!("Lock {} released.", lock_id).green());
    Ok(())
}

fn build_provider(config: &KiteformConfig) -> Result<BuildkiteProvider, String> {
    let resolved = config
        .provider
        .buildkite
        .resolve()
        .map_err(|e| format!("provider.buildkite: {}", e))?;
    info!("using organization {}", resolved.organization);
    BuildkiteProvider::new(&resolved).map_err(|e| e.to_string())
}

async fn open_backend(config: &KiteformConfig) -> Result<Box<dyn StateBackend>, String> {
    create_backend(&config.backend)
        .await
        .map_err(|e| e.to_string())
}

async fn load_state(backend: &dyn StateBackend) -> Result<StateFile, String> {
    Ok(backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default())
}

async fn acquire_lock(backend: &dyn StateBackend, operation: &str) -> Result<LockInfo, String> {
    backend
        .acquire_lock(operation)
        .await
        .map_err(|e| e.to_string())
}

/// Failing to release is reported but never masks the command's own result
async fn release_lock(backend: &dyn StateBackend, lock: &LockInfo) {
    if let Err(e) = backend.release_lock(lock).await {
        eprintln!("{} Failed to release lock: {}", "Warning:".yellow().bold(), e);
    }
}

/// Write refreshed states back, so vanished pipelines leave the state file
async fn sync_refreshed(
    backend: &dyn StateBackend,
    state_file: &mut StateFile,
    provider: &str,
    current: &engine::CurrentStates,
) -> Result<(), String> {
    let before = state_file.clone();
    for (id, observed) in current {
        record_state(state_file, provider, id, observed)?;
    }
    if *state_file != before {
        persist(backend, state_file).await?;
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool, String> {
    println!("{}", question.yellow().bold());
    println!(
        "  {}",
        "This action cannot be undone. Type 'yes' to confirm.".yellow()
    );
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();
    Ok(input.trim() == "yes")
}

fn print_report(operation: &str, report: &ApplyReport) {
    println!();
    if report.failed == 0 {
        println!(
            "{}",
            format!(
                "{} complete! {} changes applied.",
                operation, report.succeeded
            )
            .green()
            .bold()
        );
    } else {
        println!(
            "{}",
            format!(
                "{} failed. {} succeeded, {} failed.",
                operation, report.succeeded, report.failed
            )
            .red()
            .bold()
        );
    }
}
