use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use media_portal_client::display;
use media_portal_client::state::{self, DownloadState, DownloadTracker, ResultView, VideoView};
use media_portal_client::{Access, Config, PortalClient, SearchResultItem, Session};
use portal_core::session::ADMIN_ROLES;
use portal_core::AdminAction;

fn cli() -> Command {
    Command::new("portal-client")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Search, stream and queue downloads from the media portal")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (default: search the usual locations)")
                .global(true),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .value_name("URL")
                .help("Portal backend base URL")
                .global(true),
        )
        .arg(
            Arg::new("cookie")
                .long("cookie")
                .value_name("COOKIE")
                .help("Session cookie header value, e.g. session=...")
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print JSON instead of text")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("search")
                .about("Search the library, printing results as they stream in")
                .arg(Arg::new("query").required(true).num_args(1..)),
        )
        .subcommand(Command::new("popular").about("Show the popular listing"))
        .subcommand(
            Command::new("video")
                .about("Show the playable stream and metadata for a video page")
                .arg(Arg::new("page-url").required(true)),
        )
        .subcommand(
            Command::new("download")
                .about("Queue a download for a video page")
                .arg(Arg::new("page-url").required(true))
                .arg(
                    Arg::new("id")
                        .long("id")
                        .value_name("ID")
                        .help("Result id reported by search")
                        .value_parser(clap::value_parser!(u64)),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Show download queue status")
                .arg(Arg::new("filename").required(false)),
        )
        .subcommand(Command::new("whoami").about("Show the signed-in account"))
        .subcommand(Command::new("logout").about("End the current session"))
        .subcommand(
            Command::new("admin")
                .about("Apply a moderation action to a user")
                .arg(Arg::new("user-id").required(true))
                .arg(
                    Arg::new("action")
                        .required(true)
                        .value_parser(["delete", "ban", "unban", "change_role"]),
                )
                .arg(
                    Arg::new("role")
                        .long("role")
                        .value_name("ROLE")
                        .help("New role for change_role"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Show the effective configuration")
                .arg(
                    Arg::new("init")
                        .long("init")
                        .value_name("FILE")
                        .help("Write a default configuration file"),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    if let Some(base_url) = matches.get_one::<String>("base-url") {
        config.server.base_url = base_url.clone();
    }
    if let Some(cookie) = matches.get_one::<String>("cookie") {
        config.session.cookie = Some(cookie.clone());
    }
    if matches.get_flag("json") {
        config.display.json_output = true;
    }
    Ok(config)
}

fn init_logging(level: &str, verbose: bool) {
    let default_level = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,media_portal_client={0},portal_core={0},portal_client={0}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    init_logging(&config.output.log_level, matches.get_flag("verbose"));

    if let Some(("config", sub)) = matches.subcommand() {
        return show_config(&config, sub.get_one::<String>("init").map(String::as_str));
    }

    config.validate()?;
    let client = PortalClient::from_config(&config)?;
    debug!("Using backend {}", client.base_url());

    match matches.subcommand() {
        Some(("search", sub)) => {
            let query = sub
                .get_many::<String>("query")
                .map(|words| words.cloned().collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
            run_listing(&client, &config, Listing::Search(&query)).await
        }
        Some(("popular", _)) => run_listing(&client, &config, Listing::Popular).await,
        Some(("video", sub)) => {
            let page_url = required(sub, "page-url")?;
            show_video(&client, &config, page_url).await
        }
        Some(("download", sub)) => {
            let item = SearchResultItem {
                page_url: required(sub, "page-url")?.to_string(),
                id: sub.get_one::<u64>("id").copied(),
                ..Default::default()
            };
            queue_download(&client, &item).await
        }
        Some(("status", sub)) => {
            let filename = sub.get_one::<String>("filename").map(String::as_str);
            let status = client.download_status(filename).await?;
            if config.display.json_output {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print!("{}", display::render_download_status(&status));
            }
            Ok(())
        }
        Some(("whoami", _)) => {
            let status = client.user_status().await?;
            if config.display.json_output {
                println!("{}", serde_json::to_string_pretty(&status)?);
                return Ok(());
            }
            let session = Session::from_status(status);
            print!("{}", display::render_session(&session));
            if !session.is_authenticated() {
                println!("Sign in at {}", client.login_url()?);
            }
            Ok(())
        }
        Some(("logout", _)) => {
            client.logout().await?;
            println!("Signed out");
            Ok(())
        }
        Some(("admin", sub)) => {
            let user_id = required(sub, "user-id")?;
            let action = AdminAction::parse(
                required(sub, "action")?,
                sub.get_one::<String>("role").map(String::as_str),
            )?;

            let session = Session::from_status(client.user_status().await?);
            match session.access(&ADMIN_ROLES) {
                Access::Granted => {}
                denied => {
                    return Err(anyhow!(
                        "Admin access denied (redirect to {})",
                        denied.redirect_path().unwrap_or("/")
                    ))
                }
            }

            let message = client.admin_action(user_id, &action).await?;
            println!("{}: {}", action, message);
            Ok(())
        }
        Some((other, _)) => Err(anyhow!("Unknown command: {}", other)),
        None => Err(anyhow!("No command given")),
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing argument: {}", name))
}

enum Listing<'a> {
    Search(&'a str),
    Popular,
}

/// Run a search or popular listing, printing cards as batches arrive
async fn run_listing(client: &PortalClient, config: &Config, listing: Listing<'_>) -> Result<()> {
    let label = match listing {
        Listing::Search(query) => query.to_string(),
        Listing::Popular => "popular".to_string(),
    };

    let shared = state::shared_accumulator();
    let ticket = state::lock(&shared).begin(label.clone());
    let json = config.display.json_output;
    let max = config.display.max_results;
    let placeholder = config.display.placeholder_poster.clone();
    let mut printed = 0usize;

    let on_batch = |items: &[SearchResultItem], complete: bool| {
        let mut acc = state::lock(&shared);
        if !acc.apply(ticket, items, complete) || json {
            return;
        }
        let limit = display::shown_count(acc.items().len(), max);
        for item in acc.items().iter().take(limit).skip(printed) {
            println!("{}", display::render_card(item, &placeholder));
        }
        printed = printed.max(limit);
    };

    let result = match listing {
        Listing::Search(query) => client.search(query, on_batch).await,
        Listing::Popular => client.popular(on_batch).await,
    };

    let mut acc = state::lock(&shared);
    if let Err(e) = result {
        acc.fail(ticket, e.to_string());
    }

    if json {
        if let Some(message) = acc.error() {
            return Err(anyhow!("{}", message));
        }
        println!("{}", serde_json::to_string_pretty(acc.items())?);
        return Ok(());
    }

    if let ResultView::Failed(message) = acc.view() {
        return Err(anyhow!("'{}' failed: {}", label, message));
    }
    print!("{}", display::render_results(acc.view(), printed, max, &placeholder));
    info!("✅ {} results for '{}'", acc.items().len(), label);
    Ok(())
}

async fn show_video(client: &PortalClient, config: &Config, page_url: &str) -> Result<()> {
    match VideoView::load(client, page_url).await {
        VideoView::Ready(detail) => {
            if config.display.json_output {
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                print!("{}", display::render_video(&detail));
            }
            Ok(())
        }
        VideoView::Failed(message) => Err(anyhow!(message)),
        VideoView::Loading => Ok(()),
    }
}

async fn queue_download(client: &PortalClient, item: &SearchResultItem) -> Result<()> {
    let mut tracker = DownloadTracker::new();
    let state = tracker.start(client, item).await;
    println!("{}", display::render_download_state(state));

    match state {
        DownloadState::Failed(message) => Err(anyhow!("Download failed: {}", message)),
        _ => Ok(()),
    }
}

fn show_config(config: &Config, init: Option<&str>) -> Result<()> {
    if let Some(path) = init {
        Config::default()
            .save(path)
            .with_context(|| format!("Cannot write configuration to {}", path))?;
        println!("Wrote default configuration to {}", path);
        return Ok(());
    }
    println!("{}", config.summary());
    Ok(())
}
