use checklist::{
    EditOutcome, FileStore, FilterMode, KeyValueStore, ListStore, PersistFormat, SnapshotFormat, SqliteStore,
    StoreOptions, UuidGenerator,
};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

type CliStore = ListStore<Box<dyn KeyValueStore>, UuidGenerator>;

#[derive(Parser)]
#[command(name = "checklist")]
#[command(about = "Checklist CLI - add, edit, reorder, filter and import/export to-do items")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Directory holding the persisted list (default: platform data dir)
    #[arg(short, long)]
    store_dir: Option<PathBuf>,

    /// Storage backend
    #[arg(short, long, value_enum, default_value_t = Backend::File)]
    backend: Backend,

    /// Key the list is stored under
    #[arg(short, long, default_value = checklist::DEFAULT_KEY)]
    key: String,

    /// Persist compact JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    File,
    Sqlite,
}

#[derive(Subcommand)]
enum Commands {
    /// Add an item to the top of the list
    Add { text: Vec<String> },

    /// Add one item per line from a file, or stdin with `-`
    AddBulk { input: Option<PathBuf> },

    /// Show items
    List {
        /// all, active or completed
        #[arg(short, long, default_value = "all")]
        filter: String,
    },

    /// Mark an item done, or not done
    Toggle { id: String },

    /// Replace an item's text; empty text deletes it
    Edit { id: String, text: Vec<String> },

    /// Delete an item
    Rm { id: String },

    /// Delete all completed items
    ClearCompleted,

    /// Move the item at one position to another (0-based)
    Move { from: usize, to: usize },

    /// Write the list to a file, or stdout with `-`
    Export {
        path: Option<PathBuf>,

        /// json or yaml
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Replace the list with the contents of a file, or stdin with `-`
    Import {
        path: PathBuf,

        /// json or yaml (default: from file extension)
        #[arg(short, long)]
        format: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing; stdout is reserved for command output
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let mut store = open_store(&cli)?;

    match cli.command {
        Commands::Add { text } => match store.add(&text.join(" ")) {
            Some(id) => println!("Added {}", id),
            None => println!("Nothing to add"),
        },
        Commands::AddBulk { input } => {
            let text = read_input(input.as_deref())?;
            let ids = store.add_bulk(&text);
            println!("Added {} item(s)", ids.len());
        }
        Commands::List { filter } => {
            let mode: FilterMode = filter.parse()?;
            print_list(&store, mode);
        }
        Commands::Toggle { id } => {
            let id = resolve_id(&store, &id)?;
            if let Some(completed) = store.toggle(&id) {
                println!("{} {}", if completed { "Completed" } else { "Reopened" }, id);
            }
        }
        Commands::Edit { id, text } => {
            let id = resolve_id(&store, &id)?;
            match store.edit(&id, &text.join(" ")) {
                EditOutcome::Updated => println!("Updated {}", id),
                EditOutcome::Unchanged => println!("No change to {}", id),
                EditOutcome::Removed => println!("Removed {}", id),
                EditOutcome::NotFound => return Err(eyre!("No item matching '{}'", id)),
            }
        }
        Commands::Rm { id } => {
            let id = resolve_id(&store, &id)?;
            store.remove(&id);
            println!("Removed {}", id);
        }
        Commands::ClearCompleted => {
            let removed = store.clear_completed();
            println!("Cleared {} completed item(s)", removed);
        }
        Commands::Move { from, to } => {
            store.reorder(from, to)?;
            println!("Moved item {} to {}", from, to);
        }
        Commands::Export { path, format } => {
            let format: SnapshotFormat = format.parse()?;
            let content = store.export_snapshot_as(format)?;
            let path = path.unwrap_or_else(|| default_export_path(format));

            if path.as_os_str() == "-" {
                print!("{}", content);
            } else {
                fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Exported {} item(s) to {}", store.len(), path.display());
            }
        }
        Commands::Import { path, format } => {
            let format = match format {
                Some(f) => f.parse()?,
                None => format_from_extension(&path),
            };
            let bytes = read_bytes(&path)?;
            let report = store.import_snapshot_as(&bytes, format)?;
            println!(
                "Imported {} item(s) ({} dropped, {} new ids)",
                report.imported, report.dropped, report.regenerated_ids
            );
        }
    }

    Ok(())
}

fn open_store(cli: &Cli) -> Result<CliStore> {
    let dir = cli.store_dir.clone().unwrap_or_else(default_store_dir);

    let kv: Box<dyn KeyValueStore> = match cli.backend {
        Backend::File => Box::new(FileStore::open(&dir)?),
        Backend::Sqlite => Box::new(SqliteStore::open(dir.join("checklist.db"))?),
    };

    let options = StoreOptions {
        key: cli.key.clone(),
        persist_format: if cli.compact {
            PersistFormat::Compact
        } else {
            PersistFormat::Pretty
        },
    };

    ListStore::open(kv, UuidGenerator, options)
}

fn default_store_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("checklist"))
        .unwrap_or_else(|| PathBuf::from(".checklist"))
}

fn default_export_path(format: SnapshotFormat) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    PathBuf::from(format!("checklist-{}.{}", stamp, format.extension()))
}

fn format_from_extension(path: &Path) -> SnapshotFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => SnapshotFormat::Yaml,
        _ => SnapshotFormat::Json,
    }
}

/// Exact id, or a prefix matching exactly one item
fn resolve_id(store: &CliStore, query: &str) -> Result<String> {
    if store.get(query).is_some() {
        return Ok(query.to_string());
    }

    let matches: Vec<&str> = store
        .items()
        .iter()
        .map(|item| item.id.as_str())
        .filter(|id| id.starts_with(query))
        .collect();

    match matches.as_slice() {
        [] => Err(eyre!("No item matching '{}'", query)),
        [id] => Ok(id.to_string()),
        many => Err(eyre!(
            "Ambiguous id '{}' matches {} items: {}",
            query,
            many.len(),
            many.join(", ")
        )),
    }
}

fn print_list(store: &CliStore, mode: FilterMode) {
    let visible = store.filter(mode);
    if visible.is_empty() {
        println!("{}", "No items".dimmed());
    }

    for item in visible {
        // Index in the full list, as taken by `move`
        let index = store.position(&item.id).unwrap_or_default();
        if item.completed {
            println!(
                "{:>3} {} {} {}",
                index,
                "[x]".green(),
                item.text.dimmed().strikethrough(),
                item.id.dimmed()
            );
        } else {
            println!("{:>3} {} {} {}", index, "[ ]".yellow(), item.text, item.id.dimmed());
        }
    }

    let left = store.active_count();
    println!(
        "{} item{} left ({} shown: {})",
        left,
        if left == 1 { "" } else { "s" },
        store.filter(mode).len(),
        mode
    );
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf).context("Failed to read stdin")?;
        return Ok(buf);
    }
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    let bytes = read_bytes(path.unwrap_or_else(|| Path::new("-")))?;
    String::from_utf8(bytes).context("Input is not valid UTF-8")
}
