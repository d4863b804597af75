//! cw - comicwatch command-line entry point

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use comicstore::{ComicId, ComicStore};
use comicwatch::booru::{BooruClient, ComicUpdate, parse_option_id};
use comicwatch::cli::{Cli, Command, OutputFormat};
use comicwatch::config::Config;
use comicwatch::domain::Priority;
use comicwatch::scheduler::Scheduler;
use comicwatch::transport::HttpTransport;
use comicwatch::watcher::UpdateWatcher;

fn setup_logging(level: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("comicwatch")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Write to the log file so command output stays clean
    let level: tracing::Level = level
        .parse()
        .map_err(|_| eyre!("Invalid log level: {}", level))?;
    let log_file = fs::File::create(log_dir.join("comicwatch.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config is loaded before logging so its log-level can apply
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let level = cli
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    setup_logging(&level).context("Failed to setup logging")?;

    if cli.command.needs_api() {
        run_api_command(&config, cli.command).await
    } else {
        run_store_command(&config, cli.command)
    }
}

/// Commands that only touch the comic store
fn run_store_command(config: &Config, command: Command) -> Result<()> {
    match command {
        Command::List { user, format } => cmd_list(config, user.as_deref(), format),
        Command::Unfollow { comic, user } => cmd_unfollow(config, &comic, &user),
        Command::Forget { user } => cmd_forget(config, &user),
        Command::Search { .. } | Command::Follow { .. } | Command::Check { .. } | Command::Watch { .. } => {
            Err(eyre!("Command needs the booru API"))
        }
    }
}

/// Start the scheduler, run one API-backed command, then shut down
async fn run_api_command(config: &Config, command: Command) -> Result<()> {
    // EARLY VALIDATION - credentials and scheduler settings
    config.validate()?;

    let transport = Arc::new(HttpTransport::from_config(&config.booru)?);
    let scheduler = Arc::new(Scheduler::new(config.scheduler.clone(), transport));
    let dispatch_handle = scheduler.start()?;
    let booru = BooruClient::new(config.booru.clone(), scheduler.clone());

    let result = match command {
        Command::Search { query } => cmd_search(config, &booru, &query.join(" ")).await,
        Command::Follow { comic, user } => cmd_follow(config, &booru, &comic, &user).await,
        Command::Check { format } => cmd_check(config, booru, format).await,
        Command::Watch { format } => cmd_watch(config, booru, format).await,
        Command::List { .. } | Command::Unfollow { .. } | Command::Forget { .. } => {
            Err(eyre!("Command does not use the booru API"))
        }
    };

    let broken = scheduler.shutdown();
    if broken > 0 {
        warn!(broken, "Shutdown broke queued requests");
    }
    if let Err(e) = dispatch_handle.await {
        error!(error = %e, "Dispatch loop ended abnormally");
    }

    let stats = scheduler.stats();
    info!(
        submitted = stats.total_submitted,
        fulfilled = stats.total_fulfilled,
        failed = stats.total_failed,
        retries = stats.total_retries,
        "Scheduler stopped"
    );
    result
}

fn open_store(config: &Config) -> Result<ComicStore> {
    ComicStore::open(&config.storage.store_dir)
        .context(format!("Failed to open comic store at {}", config.storage.store_dir.display()))
}

fn parse_comic(comic: &str) -> Result<ComicId> {
    parse_option_id(comic).ok_or_else(|| eyre!("Not a comic id or search option: {}", comic))
}

/// Search and show the closest matches as selectable options
async fn cmd_search(config: &Config, booru: &BooruClient, query: &str) -> Result<()> {
    let pools = booru.search_ranked(query, config.watcher.max_search_results).await?;

    if pools.is_empty() {
        println!("No comics match \"{}\"", query);
        return Ok(());
    }

    println!("{}", format!("Closest matches for \"{}\":", query).bold());
    for pool in &pools {
        println!("  {}", pool.option_label().cyan());
    }
    println!();
    println!("Follow one with: cw follow \"<option>\" --user <id>");
    Ok(())
}

/// Follow a comic, recording its current pages as already seen
async fn cmd_follow(config: &Config, booru: &BooruClient, comic: &str, user: &str) -> Result<()> {
    let comic_id = parse_comic(comic)?;
    let pool = booru.fetch_pool(comic_id, Priority::User).await?;

    let mut store = open_store(config)?;
    let is_new = store.add_user_to_comic(user, comic_id)?;
    if is_new {
        store.update_comic(comic_id, &pool.display_name(), pool.post_ids.clone())?;
    }

    println!(
        "{} {} now follows {} ({} pages)",
        "✓".green(),
        user,
        pool.display_name().cyan(),
        pool.post_ids.len()
    );
    Ok(())
}

fn cmd_unfollow(config: &Config, comic: &str, user: &str) -> Result<()> {
    let comic_id = parse_comic(comic)?;
    let mut store = open_store(config)?;

    if store.remove_user_from_comic(user, comic_id)? {
        println!("{} {} unfollowed comic {}", "✓".green(), user, comic_id);
    } else {
        println!("{} {} does not follow comic {}", "✗".red(), user, comic_id);
    }
    Ok(())
}

fn cmd_forget(config: &Config, user: &str) -> Result<()> {
    let mut store = open_store(config)?;
    let count = store.remove_from_all(user)?;
    println!("{} {} unfollowed {} comics", "✓".green(), user, count);
    Ok(())
}

fn cmd_list(config: &Config, user: Option<&str>, format: OutputFormat) -> Result<()> {
    let store = open_store(config)?;
    let comics = match user {
        Some(user) => store.comics_for_user(user),
        None => store.list(),
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&comics)?);
        }
        OutputFormat::Text => {
            if comics.is_empty() {
                println!("No followed comics");
                return Ok(());
            }
            for comic in comics {
                let updated = comic
                    .updated_at
                    .map(|at| at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{} ({}) - {} pages, updated {}, followers: {}",
                    comic.name.cyan(),
                    comic.id,
                    comic.pages.len(),
                    updated,
                    comic.users.join(", ")
                );
            }
        }
    }
    Ok(())
}

/// Run a single update pass
async fn cmd_check(config: &Config, booru: BooruClient, format: OutputFormat) -> Result<()> {
    let mut watcher = UpdateWatcher::new(booru, open_store(config)?, config.watcher.clone());
    let updates = watcher.check_once().await?;

    if updates.is_empty() && format == OutputFormat::Text {
        println!("No new pages");
    }
    for update in &updates {
        print_update(update, format)?;
    }
    Ok(())
}

/// Poll until Ctrl+C, printing updates as they arrive
async fn cmd_watch(config: &Config, booru: BooruClient, format: OutputFormat) -> Result<()> {
    let watcher = UpdateWatcher::new(booru, open_store(config)?, config.watcher.clone());
    let (tx, mut rx) = mpsc::channel::<ComicUpdate>(32);
    let watcher_handle = tokio::spawn(watcher.run(tx));

    if format == OutputFormat::Text {
        println!("Watching for new pages, Ctrl+C to stop");
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Some(update) => print_update(&update, format)?,
                None => break,
            },
            _ = &mut ctrl_c => {
                info!("Ctrl+C received, stopping watch");
                break;
            }
        }
    }

    drop(rx);
    watcher_handle.abort();
    Ok(())
}

fn print_update(update: &ComicUpdate, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(update)?),
        OutputFormat::Text => {
            println!(
                "{} {} ({}): {} new pages for {}",
                "New:".green().bold(),
                update.name.cyan(),
                update.comic_id,
                update.pages.len(),
                update.users.join(", ")
            );
            for page in &update.pages {
                println!("  {}", page);
            }
        }
    }
    Ok(())
}
