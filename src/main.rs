//! Playlist metrics command line tool.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signage::db::{DbConfig, DbPool, NewUser, SqliteStore, run_migrations};
use signage::metrics::{MetricsConfig, MetricsEngine};
use signage::models::{NewItem, NewPlaylist};

/// Keeps duration and size of digital signage playlists up to date.
#[derive(Parser)]
#[command(name = "signage")]
#[command(about = "Playlist metrics engine for digital signage")]
struct Cli {
    /// Database file path
    #[arg(short, long, env = "DATABASE_URL", default_value = "signage.db")]
    database: String,

    /// Seconds given to content without a duration of its own
    #[arg(long, env = "SIGNAGE_DEFAULT_DURATION", default_value = "15")]
    default_duration: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new user
    CreateUser {
        /// Username
        #[arg(short, long)]
        username: String,

        /// Company the user belongs to
        #[arg(short, long, default_value = "1")]
        company: i32,

        /// Company administrator, not bound by time limits
        #[arg(long)]
        admin: bool,

        /// May add content to playlists of other users
        #[arg(long, conflicts_with = "admin")]
        sub_admin: bool,
    },

    /// Create a playlist
    CreatePlaylist {
        /// Name of the playlist
        #[arg(short, long)]
        name: String,

        /// Owner user ID
        #[arg(short, long)]
        owner: i32,

        /// Time limit for owner content in seconds (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        time_limit: i64,

        /// Shuffle, drawing this many items per round (0 = all)
        #[arg(long)]
        shuffle: Option<i32>,

        /// Zone playlist IDs, makes this a multizone playlist
        #[arg(long, value_delimiter = ',')]
        zones: Vec<i32>,
    },

    /// Add media or a nested playlist to a playlist
    AddItem {
        /// Target playlist ID
        #[arg(short, long)]
        playlist: i32,

        /// Acting user ID
        #[arg(short, long)]
        user: i32,

        /// Media pool identifier
        #[arg(short, long, conflicts_with = "nested", required_unless_present = "nested")]
        media: Option<String>,

        /// Playlist ID to nest
        #[arg(long)]
        nested: Option<i32>,

        /// Requested duration in seconds
        #[arg(short, long)]
        duration: Option<f64>,

        /// Size of the media in bytes
        #[arg(short, long, default_value = "0")]
        filesize: i64,

        /// Zero based position (appended if not specified)
        #[arg(long)]
        position: Option<i32>,
    },

    /// Change the duration of an item
    SetDuration {
        /// Item ID
        #[arg(short, long)]
        item: i32,

        /// Acting user ID
        #[arg(short, long)]
        user: i32,

        /// Requested duration in seconds
        #[arg(short, long)]
        duration: i64,
    },

    /// Remove an item from its playlist
    RemoveItem {
        /// Item ID
        #[arg(short, long)]
        item: i32,
    },

    /// Compute the metrics of a playlist without storing them
    Metrics {
        /// Playlist ID
        #[arg(short, long)]
        playlist: i32,
    },

    /// Recompute a playlist and everything nesting it
    Export {
        /// Playlist ID
        #[arg(short, long)]
        playlist: i32,
    },

    /// Show how many seconds a user may still add to a playlist
    AllowedDuration {
        /// Playlist ID
        #[arg(short, long)]
        playlist: i32,

        /// Acting user ID
        #[arg(short, long)]
        user: i32,

        /// Candidate duration (configured default if not specified)
        #[arg(short, long)]
        candidate: Option<i64>,
    },

    /// Show the totals of a playlist
    Show {
        /// Playlist ID
        #[arg(short, long)]
        playlist: i32,

        /// Viewing user ID
        #[arg(short, long)]
        viewer: i32,
    },
}

fn setup_database(database_url: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    let config = DbConfig::new(database_url);
    let pool = config.build_pool()?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;

    Ok(pool)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let pool = setup_database(&cli.database)?;
    let mut conn = pool.get()?;
    let store = SqliteStore::new(&mut conn);
    let mut engine = MetricsEngine::with_config(store, MetricsConfig::new(cli.default_duration));

    match cli.command {
        Commands::CreateUser {
            username,
            company,
            admin,
            sub_admin,
        } => {
            let new_user = if admin {
                NewUser::simple_admin(&username, company)
            } else if sub_admin {
                NewUser::sub_admin(&username, company)
            } else {
                NewUser::regular(&username, company)
            };
            let user = engine.store_mut().create_user(&new_user)?;
            println!(
                "Created user '{}' (id: {}, exempt from time limits: {})",
                user.username,
                user.id,
                user.is_exempt_from_quota()
            );
        }
        Commands::CreatePlaylist {
            name,
            owner,
            time_limit,
            shuffle,
            zones,
        } => {
            let mut new_playlist = if zones.is_empty() {
                NewPlaylist::master(name, owner)
            } else {
                NewPlaylist::multizone(name, owner, &zones)
            };
            new_playlist = new_playlist.with_time_limit(time_limit);
            if let Some(picking) = shuffle {
                new_playlist = new_playlist.with_shuffle(picking);
            }

            let playlist = engine.store_mut().create_playlist(&new_playlist)?;
            println!(
                "Created playlist '{}' (id: {})",
                playlist.playlist_name, playlist.playlist_id
            );
            if playlist.is_multizone() {
                print_json(&engine.export(playlist.playlist_id)?)?;
            }
        }
        Commands::AddItem {
            playlist,
            user,
            media,
            nested,
            duration,
            filesize,
            position,
        } => {
            let mut new_item = match (nested, media) {
                (Some(nested_id), _) => NewItem::nested(playlist, user, nested_id),
                (None, Some(media_id)) => {
                    NewItem::media(playlist, user, media_id, duration, filesize)
                }
                (None, None) => return Err("either --media or --nested is required".into()),
            };
            if let Some(position) = position {
                new_item = new_item.at_position(position);
            }

            print_json(&engine.add_item(user, new_item)?)?;
        }
        Commands::SetDuration {
            item,
            user,
            duration,
        } => {
            print_json(&engine.update_item_duration(user, item, duration)?)?;
        }
        Commands::RemoveItem { item } => {
            engine.remove_item(item)?;
            println!("Removed item {}", item);
        }
        Commands::Metrics { playlist } => {
            let (metrics, zone_count) = engine.preview(playlist)?;
            print_json(&serde_json::json!({
                "playlist_id": playlist,
                "metrics": metrics,
                "zone_count": zone_count,
            }))?;
        }
        Commands::Export { playlist } => {
            print_json(&engine.export(playlist)?)?;
        }
        Commands::AllowedDuration {
            playlist,
            user,
            candidate,
        } => {
            let is_exempt = engine.is_exempt(user)?;
            let target = engine.load_playlist(playlist)?;
            let allowed = match candidate {
                Some(candidate) => engine.allowed_duration(&target, candidate, is_exempt)?,
                None => engine.default_duration_for(&target, is_exempt)?,
            };
            println!("{}", allowed);
        }
        Commands::Show { playlist, viewer } => {
            print_json(&engine.summary(playlist, viewer)?)?;
        }
    }

    Ok(())
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
