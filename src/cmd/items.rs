//! Collection commands: `taskorder init`, `list`, `add`, `move`, `renumber`.
//!
//! Local commands open the SQLite board directly; `--remote` goes through
//! the hosted-table store instead. Both paths use the same `Reorderer`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use taskorder::board::{BoardDb, DbHandle, Item};
use taskorder::config::TaskorderToml;
use taskorder::ordering::{CollectionView, DropEvent, MoveOutcome, OrderStore, Reorderer};
use taskorder::remote::RemoteStore;

fn open_board(db_path: &Path, config: &TaskorderToml) -> Result<DbHandle> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let db = BoardDb::new(db_path)
        .with_context(|| format!("Failed to open board database {}", db_path.display()))?;
    Ok(DbHandle::new(db.with_policy(config.policy()?)))
}

fn print_items(collection: &str, items: &[Item]) {
    if items.is_empty() {
        println!("No items in {}", collection);
        return;
    }
    println!(
        "{}",
        style(format!("{:>3}  {:>6}  {:>14}  title", "#", "id", "key")).bold()
    );
    for (index, item) in items.iter().enumerate() {
        println!(
            "{:>3}  {:>6}  {:>14}  {}",
            index, item.id, item.sort_key, item.title
        );
    }
}

fn print_view(view: &CollectionView) {
    if view.items.is_empty() {
        println!("No items in {}", view.collection);
        return;
    }
    println!(
        "{}",
        style(format!("{:>3}  {:>12}  {:>14}", "#", "id", "key")).bold()
    );
    for (index, item) in view.items.iter().enumerate() {
        println!("{:>3}  {:>12}  {:>14}", index, item.id, item.sort_key);
    }
}

async fn list_local(db: &DbHandle, collection: &str) -> Result<Vec<Item>> {
    let collection = collection.to_string();
    db.call(move |db| db.list_items(&collection)).await
}

pub fn cmd_init(config_path: Option<&Path>, db_path: &Path) -> Result<()> {
    open_board(db_path, &TaskorderToml::default())?;
    println!("Board database initialized at {}", db_path.display());

    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(TaskorderToml::default_path);
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        let mut toml = TaskorderToml::default();
        toml.server.db_path = db_path.to_path_buf();
        toml.save(&config_path)?;
        println!("Created config at {}", config_path.display());
    }
    Ok(())
}

pub async fn cmd_list(
    config: &TaskorderToml,
    db_path: &Path,
    collection: &str,
    remote: bool,
    json: bool,
) -> Result<()> {
    if remote {
        let reorderer = Reorderer::new(Arc::new(RemoteStore::from_config(config)?), config.policy()?);
        let view = reorderer.load(collection).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&view.items)?);
        } else {
            print_view(&view);
        }
        return Ok(());
    }

    let items = list_local(&open_board(db_path, config)?, collection).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        print_items(collection, &items);
    }
    Ok(())
}

pub async fn cmd_add(
    config: &TaskorderToml,
    db_path: &Path,
    collection: &str,
    title: &str,
    key: Option<f64>,
) -> Result<()> {
    if key.is_some_and(|k| !k.is_finite()) {
        anyhow::bail!("--key must be a finite number");
    }
    let db = open_board(db_path, config)?;
    let (c, t) = (collection.to_string(), title.to_string());
    let item = db.call(move |db| db.create_item(&c, &t, key)).await?;
    println!(
        "Added #{} {:?} to {} (key {})",
        item.id, item.title, item.collection, item.sort_key
    );
    Ok(())
}

async fn move_with<S: OrderStore>(
    store: S,
    config: &TaskorderToml,
    collection: &str,
    event: &DropEvent,
) -> Result<(MoveOutcome, CollectionView)> {
    let reorderer = Reorderer::new(Arc::new(store), config.policy()?);
    Ok(reorderer.move_fresh(collection, event).await?)
}

fn print_outcome(collection: &str, item: &str, outcome: &MoveOutcome) {
    match outcome {
        MoveOutcome::Unchanged => println!("{} is already at that position", item),
        MoveOutcome::Applied { item_id, key } => {
            println!("Moved {} in {} (key {})", item_id, collection, key)
        }
        MoveOutcome::Renumbered {
            item_id,
            key,
            written,
        } => println!(
            "Moved {} in {} (key {}); {} {} keys rewritten",
            item_id,
            collection,
            key,
            style("renumbered:").yellow(),
            written
        ),
        MoveOutcome::Resynced { .. } => println!(
            "{} {} was reloaded from the store",
            style("not persisted:").red(),
            collection
        ),
    }
}

/// Runs after the list is printed so a resync still shows the reloaded order.
fn ensure_persisted(collection: &str, outcome: &MoveOutcome) -> Result<()> {
    if let MoveOutcome::Resynced { reason } = outcome {
        anyhow::bail!("Move not persisted; {} was reloaded: {}", collection, reason);
    }
    Ok(())
}

pub async fn cmd_move(
    config: &TaskorderToml,
    db_path: &Path,
    collection: &str,
    item: &str,
    index: usize,
    remote: bool,
) -> Result<()> {
    let event = DropEvent::to_index(item, index);

    if remote {
        let store = RemoteStore::from_config(config)?;
        let (outcome, view) = move_with(store, config, collection, &event).await?;
        print_outcome(collection, item, &outcome);
        print_view(&view);
        return ensure_persisted(collection, &outcome);
    }

    let db = open_board(db_path, config)?;
    let (outcome, _view) = move_with(db.clone(), config, collection, &event).await?;
    print_outcome(collection, item, &outcome);
    print_items(collection, &list_local(&db, collection).await?);
    ensure_persisted(collection, &outcome)
}

pub async fn cmd_renumber(
    config: &TaskorderToml,
    db_path: &Path,
    collection: &str,
    remote: bool,
) -> Result<()> {
    let written = if remote {
        let reorderer = Reorderer::new(Arc::new(RemoteStore::from_config(config)?), config.policy()?);
        let mut view = reorderer.load(collection).await?;
        reorderer.renumber(&mut view).await?
    } else {
        let reorderer = Reorderer::new(Arc::new(open_board(db_path, config)?), config.policy()?);
        let mut view = reorderer.load(collection).await?;
        reorderer.renumber(&mut view).await?
    };
    println!("Renumbered {}: {} keys rewritten", collection, written);
    Ok(())
}
