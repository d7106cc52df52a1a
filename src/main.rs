//! aisle, the wedding emcee assistant from the command line.
//!
//! Every command works on the local dataset first; the cloud commands
//! talk to the sync server configured in config.toml.

use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use aisle::app::{App, NoticeLevel};
use aisle::config::Config;
use aisle::identity;
use aisle::store::LocalStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = Config::load()?;

    match args.get(1).map(String::as_str) {
        Some("status") => cmd_status(config).await,
        Some("show") => cmd_show(config),
        Some("enable-sync") => cmd_set_sync(config, true).await,
        Some("disable-sync") => cmd_set_sync(config, false).await,
        Some("pull") => cmd_pull(config).await,
        Some("push") => cmd_push(config).await,
        Some("sync") => cmd_sync(config).await,
        Some("watch") => cmd_watch(config).await,
        Some("share-link") => cmd_share_link(config),
        Some("import-link") => cmd_import_link(config, args.get(2)).await,
        Some("clear-remote") => cmd_clear_remote(config).await,
        Some("reset-local") => cmd_reset_local(config),
        Some("config") => cmd_config(&args),
        _ => {
            usage();
            std::process::exit(1);
        }
    }
}

fn usage() {
    eprintln!("aisle - wedding emcee assistant");
    eprintln!();
    eprintln!("Usage: aisle <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status                 local and cloud state at a glance");
    eprintln!("  show                   print the program, settings, and music");
    eprintln!("  enable-sync            turn cloud sync on (pulls, or seeds an empty cloud)");
    eprintln!("  disable-sync           turn cloud sync off");
    eprintln!("  pull                   fetch the shared dataset from the cloud");
    eprintln!("  push                   push local data to the cloud");
    eprintln!("  sync                   push every category at once and report each one");
    eprintln!("  watch                  keep syncing on an interval until interrupted");
    eprintln!("  share-link             print the link that shares this dataset");
    eprintln!("  import-link <url>      join a dataset shared from another device");
    eprintln!("  clear-remote           delete this user's data from the cloud");
    eprintln!("  reset-local            restore the built-in program and settings");
    eprintln!("  config [example]       show the config file (or an example one)");
}

async fn cmd_status(config: Config) -> Result<()> {
    let mut app = App::new(config)?;
    let status = app.check_cloud_health().await;

    println!("config:     {}", Config::config_path()?.display());
    println!("data:       {}", app.store.dir().display());
    println!("server:     {}", app.config.cloud.server_url);
    println!("owner id:   {}", app.store.owner_id()?);
    println!("cloud sync: {}", on_off(app.settings.enable_cloud_sync));
    match app.coordinator.last_sync() {
        Some(t) => println!("last sync:  {}", t.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("last sync:  never"),
    }
    if status.connected {
        println!("remote:     connected ({})", status.message);
    } else {
        println!("remote:     unreachable ({})", status.message);
    }
    print_notices(&app);
    Ok(())
}

fn cmd_show(config: Config) -> Result<()> {
    let app = App::new(config)?;

    println!(
        "Program ({} steps, {} min):",
        app.program.len(),
        app.total_duration()
    );
    for (i, step) in app.program.iter().enumerate() {
        let music = if step.is_preset && !step.music.is_empty() {
            format!("  [preset] {}", step.music_name)
        } else if !step.music_source.is_empty() {
            format!("  [upload] {}", step.music_name)
        } else {
            String::new()
        };
        println!("  {:>2}. {} ({} min){}", i + 1, step.name, step.duration, music);
    }

    println!(
        "\nSettings: auto play music {}, auto start timer {}, cloud sync {}",
        on_off(app.settings.auto_play_music),
        on_off(app.settings.auto_start_timer),
        on_off(app.settings.enable_cloud_sync)
    );

    println!("\nPreset music ({}):", app.presets.len());
    for track in &app.presets {
        println!("  {} [{}] {}", track.name, track.category, track.path);
    }

    println!("\nUploaded music ({}):", app.uploads.len());
    for info in &app.uploads {
        println!(
            "  {} ({}, added {})",
            info.name,
            info.mime,
            info.date_added.format("%Y-%m-%d")
        );
    }

    let trims = app.music_db.all_trim_settings()?;
    println!("\nTrim points ({}):", trims.len());
    for trim in &trims {
        let kind = if trim.is_preset { "preset" } else { "upload" };
        println!(
            "  {} [{}] {:.1}s..{:.1}s",
            trim.music_id, kind, trim.start, trim.end
        );
    }
    Ok(())
}

async fn cmd_set_sync(config: Config, enabled: bool) -> Result<()> {
    let mut app = App::new(config)?;
    let mut settings = app.settings;
    settings.enable_cloud_sync = enabled;
    app.update_settings(settings).await;
    print_notices(&app);
    if app.notices.is_empty() {
        println!("cloud sync {}", on_off(enabled));
    }
    Ok(())
}

async fn cmd_pull(config: Config) -> Result<()> {
    let mut app = App::new(config)?;
    if let Some(outcome) = app.pull_now().await {
        println!(
            "pulled: program {}, settings {}, preset music {}, trim entries merged {}",
            yes_no(outcome.program),
            yes_no(outcome.settings),
            yes_no(outcome.presets),
            outcome.trim_merged
        );
    }
    print_notices(&app);
    Ok(())
}

async fn cmd_push(config: Config) -> Result<()> {
    let mut app = App::new(config)?;
    if !app.settings.enable_cloud_sync {
        eprintln!("cloud sync is off; run `aisle enable-sync` first");
        std::process::exit(1);
    }
    match app.coordinator.push_local().await {
        Some(outcome) => println!(
            "pushed: program {}, settings {}, preset music {}, trim settings {}/{}",
            yes_no(outcome.program),
            yes_no(outcome.settings),
            yes_no(outcome.presets),
            outcome.trim_synced,
            outcome.trim_total
        ),
        None => println!("another sync is in flight, nothing pushed"),
    }
    Ok(())
}

async fn cmd_sync(config: Config) -> Result<()> {
    let mut app = App::new(config)?;
    app.sync_now().await?;
    print_notices(&app);
    Ok(())
}

async fn cmd_watch(config: Config) -> Result<()> {
    let mut app = App::new(config)?;
    app.startup_sync().await;
    print_notices(&app);
    app.notices.clear();

    let interval_mins = app.config.cloud.sync_interval_mins.max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_mins * 60));
    ticker.tick().await; // the first tick fires immediately
    println!("syncing every {} min, ctrl-c to stop", interval_mins);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                app.periodic_sync().await;
                if app.settings.enable_cloud_sync {
                    if let Some(t) = app.coordinator.last_sync() {
                        println!("synced {}", t.format("%Y-%m-%d %H:%M:%S UTC"));
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("stopped");
                return Ok(());
            }
        }
    }
}

fn cmd_share_link(config: Config) -> Result<()> {
    let app = App::new(config)?;
    println!("{}", app.share_link()?);
    Ok(())
}

async fn cmd_import_link(config: Config, link: Option<&String>) -> Result<()> {
    let link = match link {
        Some(link) => link,
        None => {
            eprintln!("Usage: aisle import-link <url>");
            std::process::exit(1);
        }
    };
    let owner_id = match identity::owner_id_from_link(link) {
        Some(id) => id,
        None => {
            eprintln!("no userId found in that link");
            std::process::exit(1);
        }
    };

    // Persist the identity before the app builds its HTTP client, so
    // the pull below already runs as the shared user.
    let store = LocalStore::open(&config.data_dir()?)?;
    store.set_owner_id(&owner_id)?;

    let mut app = App::new(config)?;
    app.adopt_shared_identity(&owner_id).await?;
    print_notices(&app);
    Ok(())
}

async fn cmd_clear_remote(config: Config) -> Result<()> {
    let mut app = App::new(config)?;
    app.clear_remote().await;
    print_notices(&app);
    Ok(())
}

fn cmd_reset_local(config: Config) -> Result<()> {
    let mut app = App::new(config)?;
    app.reset_local()?;
    print_notices(&app);
    Ok(())
}

fn cmd_config(args: &[String]) -> Result<()> {
    if args.get(2).map(String::as_str) == Some("example") {
        print!("{}", Config::example_config());
        return Ok(());
    }
    let path = Config::config_path()?;
    println!("# {}", path.display());
    print!("{}", std::fs::read_to_string(&path)?);
    Ok(())
}

fn print_notices(app: &App) {
    for notice in &app.notices {
        println!("{} {}", tag(notice.level), notice.message);
    }
}

fn tag(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "[info]",
        NoticeLevel::Success => "[ok]",
        NoticeLevel::Warning => "[warn]",
        NoticeLevel::Error => "[error]",
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
