use std::{error::Error, io::BufRead, path::PathBuf, process, sync::Arc};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, info, LevelFilter};
use tokio::sync::mpsc;
use url::Url;

use groovify::{
    config::Config,
    poll::NowPlayingPoller,
    protocol::{player::NowPlaying, stats::TimeRange},
    session::{Session, SessionState},
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    ///
    /// TOML file overriding the built-in defaults.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, env = "GROOVIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Backend address
    #[arg(long, value_name = "URL", value_hint = ValueHint::Url, env = "GROOVIFY_BASE_URL")]
    base_url: Option<Url>,

    /// Session token file
    ///
    /// Ensure that this file is kept secure and not shared publicly, as it
    /// grants access to your account.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath, env = "GROOVIFY_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Log in through the browser
    ///
    /// Prints the login page address, then reads the redirect URL the
    /// browser lands on from standard input.
    Login,

    /// Complete a login with a redirect URL
    Redirect {
        /// URL of the form myapp://auth/success?code=...
        url: String,
    },

    /// Show who is logged in
    Status,

    /// Log out on this device and on the server
    Logout,

    /// List your playlists
    Playlists,

    /// Show a playlist and its tracks
    Playlist {
        /// Playlist id
        id: String,
    },

    /// Generate and save an AI description for a playlist
    Describe {
        /// Playlist id
        id: String,
    },

    /// Generate and upload an AI cover image for a playlist
    Cover {
        /// Playlist id
        id: String,
    },

    /// Show your top tracks
    TopTracks {
        /// short_term, medium_term or long_term
        #[arg(short, long, default_value_t = TimeRange::default())]
        range: TimeRange,
    },

    /// Show your top artists
    TopArtists {
        /// short_term, medium_term or long_term
        #[arg(short, long, default_value_t = TimeRange::default())]
        range: TimeRange,
    },

    /// Show what is playing right now
    NowPlaying {
        /// Keep watching until interrupted
        #[arg(short, long, default_value_t = false)]
        watch: bool,
    },

    /// Create a playlist of favourites you have not played in a while
    ForgottenGems,

    /// Get an AI analysis of your listening habits
    Analysis,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "warn"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module("groovify", level);
    }

    logger.init();
}

/// Builds the configuration from the file and command line overrides.
fn load_config(args: &Args) -> groovify::error::Result<Config> {
    let mut config = match args.config {
        Some(ref path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(ref base_url) = args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(ref token_file) = args.token_file {
        config.token_file = token_file.clone();
    }

    Ok(config)
}

/// Prints `error` the way the user should see it and fails.
fn alert(error: &groovify::error::Error, fallback: &str) -> Box<dyn Error> {
    debug!("{error}");
    error.user_message(fallback).into()
}

fn print_now_playing(now_playing: Option<&NowPlaying>) {
    match now_playing.and_then(NowPlaying::track) {
        Some(track) => println!("Now playing: {} - {}", track.artist_names(), track.name),
        None => println!("Nothing is currently playing."),
    }
}

/// Runs the browser login: waits for redirect URLs on standard input until
/// one of them logs the user in.
async fn login(session: Arc<Session>) -> Result<(), Box<dyn Error>> {
    println!("Open this address in a browser to log in:\n");
    println!("    {}\n", session.backend().login_url()?);
    println!("Then paste the address you were redirected to:");

    let mut state = session.subscribe();
    let mut alerts = session.subscribe_alerts();

    // Standard input stands in for the OS delivering deep links. A plain
    // thread, so a pending read does not hold up runtime shutdown.
    let (tx, rx) = mpsc::channel(4);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    let listener = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.serve_redirects(None, rx).await }
    });

    let result = loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break Err("login aborted".into());
                }
                let current = state.borrow_and_update().clone();
                if let SessionState::Authenticated(profile) = current {
                    println!("Welcome, {}!", profile.name());
                    break Ok(());
                }
            }

            alert = alerts.recv() => {
                if let Ok(message) = alert {
                    eprintln!("Error: {message}");
                }
            }

            _ = tokio::signal::ctrl_c() => break Err("login cancelled".into()),
        }
    };

    listener.abort();
    result
}

/// Main application logic.
///
/// # Errors
///
/// Returns the message to show the user when the command fails.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args)?;
    let session = Arc::new(Session::new(&config)?);

    // A redirect completes a login on its own, like an app launched from
    // a deep link.
    if let Command::Redirect { ref url } = args.command {
        return match session.handle_redirect(url).await {
            Ok(Some(profile)) => {
                println!("Welcome, {}!", profile.name());
                Ok(())
            }
            Ok(None) => Err(format!("{url} is not a login redirect").into()),
            Err(e) => Err(alert(&e, Session::LOGIN_FAILED)),
        };
    }

    // Logging out must not depend on the backend confirming the token
    // first, or a failed check would drop it before it is invalidated.
    if let Command::Logout = args.command {
        session.attach_stored().await;
        session.logout().await;
        println!("Logged out.");
        return Ok(());
    }

    let state = session.bootstrap().await;
    let backend = session.backend();

    match args.command {
        Command::Login => {
            if let SessionState::Authenticated(profile) = state {
                println!("Already logged in as {}.", profile.name());
                return Ok(());
            }
            return login(Arc::clone(&session)).await;
        }
        Command::Status => {
            match state {
                SessionState::Authenticated(profile) => {
                    println!("Logged in as {} <{}> ({})", profile.name(), profile.email, profile.id);
                }
                _ => println!("Not logged in."),
            }
            return Ok(());
        }
        _ => {}
    }

    if !state.is_authenticated() {
        return Err("not logged in: run `groovify login` first".into());
    }

    match args.command {
        Command::Playlists => {
            let playlists = backend
                .playlists()
                .await
                .map_err(|e| alert(&e, "Could not load playlists."))?;
            for playlist in playlists.items {
                println!("{}  {} ({} tracks)", playlist.id, playlist.name, playlist.tracks.total);
            }
        }

        Command::Playlist { id } => {
            let (details, tracks) = tokio::try_join!(backend.playlist_details(&id), backend.playlist_tracks(&id))
                .map_err(|e| alert(&e, "Failed to load playlist."))?;
            println!("{}", details.name);
            if let Some(description) = details.description.filter(|d| !d.is_empty()) {
                println!("{description}");
            }
            println!();
            for (index, track) in tracks.iter().enumerate() {
                println!("{:>3}. {} - {}", index + 1, track.artist_names(), track.name);
            }
        }

        Command::Describe { id } => {
            let description = backend
                .ai_description(&id)
                .await
                .map_err(|e| alert(&e, "Could not generate description."))?;
            println!("{description}");
        }

        Command::Cover { id } => {
            let image_url = backend
                .ai_cover(&id)
                .await
                .map_err(|e| alert(&e, "Could not generate cover."))?;
            println!("{image_url}");
        }

        Command::TopTracks { range } => {
            let top = backend
                .top_tracks(range)
                .await
                .map_err(|e| alert(&e, "Failed to load top tracks."))?;
            for (index, track) in top.items.iter().enumerate() {
                println!("{:>2}. {} - {}", index + 1, track.artist_names(), track.name);
            }
        }

        Command::TopArtists { range } => {
            let top = backend
                .top_artists(range)
                .await
                .map_err(|e| alert(&e, "Failed to load top artists."))?;
            for (index, artist) in top.items.iter().enumerate() {
                if artist.genres.is_empty() {
                    println!("{:>2}. {}", index + 1, artist.name);
                } else {
                    println!("{:>2}. {} ({})", index + 1, artist.name, artist.genres.join(", "));
                }
            }
        }

        Command::NowPlaying { watch: false } => {
            let now_playing = backend
                .currently_playing()
                .await
                .map_err(|e| alert(&e, "Could not fetch currently playing track."))?;
            print_now_playing(Some(&now_playing));
        }

        Command::NowPlaying { watch: true } => {
            let poller = NowPlayingPoller::spawn(Arc::clone(&session), config.poll_interval)?;
            let mut updates = poller.updates();
            loop {
                tokio::select! {
                    biased;

                    _ = tokio::signal::ctrl_c() => break,

                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let latest = updates.borrow_and_update().clone();
                        print_now_playing(latest.as_ref());
                    }
                }
            }
            poller.stop().await?;
        }

        Command::ForgottenGems => {
            let playlist = backend
                .forgotten_gems()
                .await
                .map_err(|e| alert(&e, "Could not create playlist."))?;
            if playlist.is_empty() {
                println!("{}", playlist.name);
            } else {
                println!("Created {}: {}", playlist.name, playlist.external_urls.spotify);
            }
        }

        Command::Analysis => {
            let analysis = backend
                .ai_analysis()
                .await
                .map_err(|e| alert(&e, "Failed to get analysis."))?;
            println!("{analysis}");
        }

        Command::Login | Command::Redirect { .. } | Command::Status | Command::Logout => {}
    }

    Ok(())
}

/// Main entry point of the application.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
