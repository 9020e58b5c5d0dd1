use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;

use sovereign_startpage_lib::config;
use sovereign_startpage_lib::modules::navigation::{self, EntityForm};
use sovereign_startpage_lib::storage::FileStorage;
use sovereign_startpage_lib::{CollectionId, Store};

#[derive(Parser, Debug)]
#[command(name = "sovereign-startpage", version, about = "Manage start page shortcuts and search engines")]
struct Cli {
    /// Directory holding the persisted start page data.
    #[arg(long, global = true, env = config::DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print sites, search engines and the active engine.
    List {
        collection: Option<CollectionId>,
    },
    /// Write all data as JSON to a file or stdout.
    Export {
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Replace all data with the contents of an export file.
    Import { file: PathBuf },
    /// Add an entry. Search engine urls must contain one `%s`.
    Add {
        collection: CollectionId,
        url: String,
        #[arg(long, default_value = "")]
        name: String,
    },
    Delete {
        collection: CollectionId,
        id: String,
    },
    /// Move `moved` so it sits directly before `anchor`.
    Reorder {
        collection: CollectionId,
        moved: String,
        anchor: String,
    },
    /// Make a search engine the active one.
    UseEngine { id: String },
    /// Print the search URL for a query.
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        #[arg(long)]
        engine: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn print_collection(store: &Store<FileStorage>, collection: CollectionId) {
    println!("{}:", collection);
    let active = &store.settings().active_search_engine_id;
    for entity in store.collection(collection) {
        let marker = if collection == CollectionId::SearchEngines && &entity.id == active {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:<16} {:<20} {}",
            marker, entity.id, entity.display_name, entity.target_url_template
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let dir = match cli.data_dir {
        Some(dir) => dir,
        None => config::data_dir()?,
    };
    log::debug!("[CLI] Using data directory {}", dir.display());
    let mut store = Store::open(FileStorage::new(dir));

    match cli.command {
        Commands::List { collection } => {
            let collections = match collection {
                Some(c) => vec![c],
                None => CollectionId::ALL.to_vec(),
            };
            for c in collections {
                print_collection(&store, c);
            }
        }
        Commands::Export { out } => {
            let json = store.export_json()?;
            match out {
                Some(path) => fs::write(&path, json)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{}", json),
            }
        }
        Commands::Import { file } => {
            let json = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            store.import_json(&json)?;
            println!(
                "Imported {} sites and {} search engines",
                store.sites().len(),
                store.search_engines().len()
            );
        }
        Commands::Add {
            collection,
            url,
            name,
        } => {
            let form = EntityForm {
                id: String::new(),
                url,
                name,
            };
            let entity = navigation::entity_from_form(&form, collection)?;
            let id = entity.id.clone();
            store.add(collection, entity)?;
            println!("Added {} to {}", id, collection);
        }
        Commands::Delete { collection, id } => {
            store.delete(collection, &id)?;
            println!("Deleted {} from {}", id, collection);
        }
        Commands::Reorder {
            collection,
            moved,
            anchor,
        } => {
            if store.reorder(collection, &moved, &anchor)? {
                print_collection(&store, collection);
            } else {
                println!("{} is already before {}", moved, anchor);
            }
        }
        Commands::UseEngine { id } => {
            store.set_active_search_engine(&id)?;
            println!("Active search engine: {}", id);
        }
        Commands::Search { query, engine } => {
            let query = query.join(" ");
            let engine = match engine {
                Some(id) => store
                    .get(CollectionId::SearchEngines, &id)
                    .with_context(|| format!("unknown search engine '{}'", id))?,
                None => store
                    .active_search_engine()
                    .context("no search engine configured")?,
            };
            let Some(url) = navigation::search_url(engine, &query) else {
                bail!("query is empty");
            };
            println!("{}", url);
        }
    }

    if let Some(err) = store.last_storage_error() {
        log::warn!("[CLI] Changes were not saved: {}", err);
    }
    Ok(())
}
