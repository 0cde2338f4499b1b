use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use demo_store::config::ConfigFile;
use demo_store::fingerprint::TaskConfig;
use demo_store::store::{DemoStore, SeedOutcome};
use demo_store::{Result, StoreError};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to a store configuration TOML
    #[arg(long, global = true, default_value = "store.toml")]
    store: PathBuf,
    /// Log filter (e.g. info, debug, demo_store=trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch demos for a task configuration into the local cache
    Fetch {
        /// Path to a task configuration TOML (falls back to [task] in the store config)
        task: Option<PathBuf>,
        /// Exact number of demos to fetch; omit to fetch everything available
        #[arg(long)]
        count: Option<usize>,
    },
    /// Show cached (and optionally remote) demos for a task configuration
    List {
        /// Path to a task configuration TOML (falls back to [task] in the store config)
        task: Option<PathBuf>,
        /// Also query the remote manifest
        #[arg(long)]
        remote: bool,
    },
    /// Upload demo files (or directories of them) to the remote repository
    Upload {
        /// Demo files or directories to scan for demo files
        paths: Vec<PathBuf>,
    },
    /// Populate the cache once from the published release archive
    Seed,
    /// Print the metadata of one demo file
    Show {
        /// Path to a demo file
        demo: PathBuf,
    },
    /// Remove the cache entry for a task configuration
    Purge {
        /// Path to a task configuration TOML (falls back to [task] in the store config)
        task: Option<PathBuf>,
    },
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    init_logging(&args.log_level)?;
    match args.cmd {
        Command::Fetch { task, count } => cmd_fetch(&args.store, task.as_deref(), count),
        Command::List { task, remote } => cmd_list(&args.store, task.as_deref(), remote),
        Command::Upload { paths } => cmd_upload(&args.store, &paths),
        Command::Seed => cmd_seed(&args.store),
        Command::Show { demo } => cmd_show(&demo),
        Command::Purge { task } => cmd_purge(&args.store, task.as_deref()),
    }
}

fn init_logging(filter: &str) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|e| StoreError::config(format!("invalid log filter '{filter}': {e}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
    Ok(())
}

fn task_config_for(cfg: &ConfigFile, task_file: Option<&Path>) -> Result<TaskConfig> {
    if let Some(path) = task_file {
        return demo_store::config::load_task_file(path);
    }
    if let Some(task) = &cfg.task {
        task.validate()?;
        return Ok(task.clone());
    }
    Err(StoreError::config(
        "no task configuration given; pass a task TOML or set [task] in the store config",
    ))
}

fn cmd_fetch(store_file: &Path, task_file: Option<&Path>, count: Option<usize>) -> Result<()> {
    let cfg = demo_store::config::load_config_file(store_file)?;
    let store = DemoStore::open(&cfg.store)?;
    let task = task_config_for(&cfg, task_file)?;
    let fingerprint = demo_store::fingerprint::fingerprint_for(&task)?;

    let demos = match count {
        Some(n) => store.get_demos(&task, n)?,
        None => store.get_all_demos(&task)?,
    };
    println!("{} demos for {}/{}", demos.len(), task.task, fingerprint);
    for demo in &demos {
        println!(
            "  {}  steps={:<5} format={}",
            demo.id(),
            demo.step_count(),
            demo.format().as_str()
        );
    }
    Ok(())
}

fn cmd_list(store_file: &Path, task_file: Option<&Path>, remote: bool) -> Result<()> {
    let cfg = demo_store::config::load_config_file(store_file)?;
    let store = DemoStore::open(&cfg.store)?;
    let task = task_config_for(&cfg, task_file)?;

    let inventory = store.inventory(&task, remote)?;
    println!("task:        {}", inventory.task);
    println!("profile:     {}", task.describe());
    println!("fingerprint: {}", inventory.fingerprint);
    println!("cache dir:   {}", inventory.entry_dir.display());
    println!("cached ({}):", inventory.local.len());
    for id in &inventory.local {
        println!("  {id}");
    }
    if remote {
        match (&inventory.backend, &inventory.remote, &inventory.remote_error) {
            (Some(backend), Some(ids), _) => {
                println!("remote {backend} ({}):", ids.len());
                for id in ids {
                    println!("  {id}");
                }
            }
            (Some(backend), None, Some(err)) => {
                println!("remote {backend}: unavailable: {err}");
            }
            _ => println!("remote: no backend configured"),
        }
    }
    Ok(())
}

fn cmd_upload(store_file: &Path, paths: &[PathBuf]) -> Result<()> {
    if paths.is_empty() {
        return Err(StoreError::config("no demo files given to upload"));
    }
    let cfg = demo_store::config::load_config_file(store_file)?;
    let store = DemoStore::open(&cfg.store)?;

    let mut files = Vec::<PathBuf>::new();
    for path in paths {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    StoreError::io(format!("failed to scan {}", path.display()), e.into())
                })?;
                if entry.file_type().is_file()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|n| n.ends_with(demo_store::demo::DEMO_FILE_SUFFIX))
                {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    if files.is_empty() {
        return Err(StoreError::config("no demo files found under the given paths"));
    }

    let demos = files
        .iter()
        .map(|p| demo_store::demo::read_demo_file(p))
        .collect::<Result<Vec<_>>>()?;
    let uploaded = store.upload_demos(&demos)?;
    println!("uploaded {uploaded} demos");
    Ok(())
}

fn cmd_seed(store_file: &Path) -> Result<()> {
    let cfg = demo_store::config::load_config_file(store_file)?;
    let store = DemoStore::open(&cfg.store)?;
    match store.seed_cache()? {
        SeedOutcome::AlreadySeeded => println!("cache already seeded"),
        SeedOutcome::Seeded { demo_files } => println!("seeded {demo_files} demo files"),
    }
    Ok(())
}

fn cmd_show(demo_file: &Path) -> Result<()> {
    let demo = demo_store::demo::read_demo_file(demo_file)?;
    let fingerprint = demo_store::fingerprint::fingerprint_for(&demo.metadata.config)?;
    println!("id:          {}", demo.id());
    println!("task:        {}", demo.metadata.config.task);
    println!("profile:     {}", demo.metadata.config.describe());
    println!("fingerprint: {fingerprint}");
    println!("format:      {}", demo.format().as_str());
    println!("steps:       {}", demo.step_count());
    if let Some(seed) = demo.metadata.seed {
        println!("seed:        {seed}");
    }
    println!("recorded at: {}", demo.metadata.recorded_at);
    for (tool, version) in &demo.metadata.tool_versions {
        println!("tool:        {tool} {version}");
    }
    Ok(())
}

fn cmd_purge(store_file: &Path, task_file: Option<&Path>) -> Result<()> {
    let cfg = demo_store::config::load_config_file(store_file)?;
    let store = DemoStore::open(&cfg.store)?;
    let task = task_config_for(&cfg, task_file)?;
    let fingerprint = demo_store::fingerprint::fingerprint_for(&task)?;

    let entry_dir = store.cache().entry_dir(&task.task, &fingerprint)?;
    store.cache().remove_entry(&task.task, &fingerprint)?;
    println!("removed {}", entry_dir.display());
    Ok(())
}
