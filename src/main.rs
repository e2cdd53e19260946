//! contact-photos - photo cache command line
#![allow(clippy::uninlined_format_args)]

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use contact_photos::{Config, ContactsSource, Photo, PhotoCacheService, PhotoKey, PhotoStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG=debug for verbose output)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match parse_args()? {
        Command::Import {
            photo_id,
            file,
            contact,
            starred,
        } => import(photo_id, &file, contact.as_deref(), starred),
        Command::Fetch { keys } => fetch(keys).await,
        Command::Preload => preload().await,
        Command::Config => show_config(),
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            println!("contact-photos {}", contact_photos::VERSION);
            Ok(())
        }
    }
}

/// CLI commands
enum Command {
    Import {
        photo_id: i64,
        file: String,
        contact: Option<String>,
        starred: bool,
    },
    Fetch {
        keys: Vec<PhotoKey>,
    },
    Preload,
    Config,
    Help,
    Version,
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() == 1 {
        return Ok(Command::Help);
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),

        "import" => {
            let photo_id = args
                .get(2)
                .ok_or_else(|| anyhow::anyhow!("Missing photo id"))?
                .parse()
                .context("Photo id must be an integer")?;
            let file = args
                .get(3)
                .ok_or_else(|| anyhow::anyhow!("Missing photo file"))?
                .clone();
            let contact = args
                .iter()
                .position(|a| a == "--contact" || a == "-c")
                .and_then(|i| args.get(i + 1))
                .cloned();
            let starred = args.iter().any(|a| a == "--star" || a == "-s");
            Ok(Command::Import {
                photo_id,
                file,
                contact,
                starred,
            })
        }

        "fetch" => {
            let keys: Vec<PhotoKey> = args[2..]
                .iter()
                .filter_map(|a| a.parse().ok())
                .collect();
            if keys.is_empty() {
                return Err(anyhow::anyhow!("Missing photo keys (ids or URIs)"));
            }
            Ok(Command::Fetch { keys })
        }

        "preload" => Ok(Command::Preload),
        "config" => Ok(Command::Config),

        other => Err(anyhow::anyhow!(
            "Unknown command: {other}\nRun 'contact-photos --help' for usage"
        )),
    }
}

fn print_help() {
    let config_path = Config::default_path()
        .map_or_else(|_| "Unknown".to_string(), |p| p.display().to_string());

    println!(
        r#"contact-photos - contact photo cache

USAGE:
    contact-photos [COMMAND]

COMMANDS:
    import <photo-id> <file> [OPTIONS]   Store a photo in the photo database
      Options:
        -c, --contact <name>             Also add a contact using the photo
        -s, --star                       Mark that contact as starred

    fetch <key>...                       Load photos through the cache
      Keys are photo ids or URIs (https://..., file://...)

    preload                              Warm the cache and print its stats
    config                               Print the effective configuration

OPTIONS:
    -h, --help                           Show this help message
    -v, --version                        Show version information

CONFIG:
    {}
"#,
        config_path
    );
}

fn open_source(config: &Config) -> Result<ContactsSource> {
    let store = PhotoStore::open_path(&config.database_path()?)?;
    let source = ContactsSource::new(store, config.http_timeout())?;
    Ok(source)
}

fn import(photo_id: i64, file: &str, contact: Option<&str>, starred: bool) -> Result<()> {
    let config = Config::load()?;
    let store = PhotoStore::open_path(&config.database_path()?)?;

    let data = std::fs::read(file).with_context(|| format!("Failed to read {file}"))?;
    store.insert_photo(photo_id, &data)?;
    println!("Stored photo #{photo_id} ({} bytes)", data.len());

    if let Some(name) = contact {
        let contact_id = store.insert_contact(name, Some(photo_id), starred)?;
        store.mark_contacted(contact_id)?;
        println!("Added contact {name} (#{contact_id})");
    }

    Ok(())
}

async fn fetch(keys: Vec<PhotoKey>) -> Result<()> {
    let config = Config::load()?;
    let source = open_source(&config)?;

    let results: Arc<Mutex<Vec<(usize, Photo)>>> = Arc::default();
    let sink = Arc::clone(&results);
    let mut photos = PhotoCacheService::new(&config, source, move |row: &usize, photo: Photo| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((*row, photo));
    });

    for (row, key) in keys.iter().enumerate() {
        photos.request(row, Some(key.clone()));
    }
    photos.wait_idle().await;

    let mut results = std::mem::take(&mut *results.lock().unwrap_or_else(PoisonError::into_inner));
    results.sort_by_key(|(row, _)| *row);
    for (row, photo) in results {
        match photo.dimensions() {
            Some((w, h)) => println!("{}  {w}x{h}", keys[row]),
            None => println!("{}  (no photo)", keys[row]),
        }
    }

    Ok(())
}

async fn preload() -> Result<()> {
    let config = Config::load()?;
    let source = open_source(&config)?;
    let mut photos = PhotoCacheService::<usize>::new(&config, source, |_, _| {});

    photos.preload();
    photos.wait_for_preload().await;

    let stats = photos.stats();
    println!(
        "Preloaded {} photos, {} bytes of {}",
        stats.byte_entries, stats.estimated_bytes, config.max_byte_cache_bytes
    );
    Ok(())
}

fn show_config() -> Result<()> {
    let config = Config::load()?;
    print!("{}", toml::to_string_pretty(&config).context("Failed to serialize config")?);
    Ok(())
}
