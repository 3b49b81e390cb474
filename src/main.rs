use std::io::{BufRead, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use musicreco::{
    api::MusicRecoClient,
    config::Config,
    db::FileStorage,
    models::{GeneratedPlaylist, PlaylistId, Song, SongId},
    services::{Backend, Toggled},
    session::Session,
};

/// Options configurable via the CLI.
#[derive(Debug, Parser)]
#[command(name = "musicreco", version, about = "Tag and song based playlist recommendations")]
struct Flags {
    /// Backend base URL, overrides MUSICRECO_API_URL
    #[arg(long)]
    api_url: Option<String>,
    /// subcommand to run
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and remember the credential
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account and log in
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored credential
    Logout,
    /// Show the logged in identity
    Whoami,
    /// Generate a playlist from tags and seed songs
    Generate {
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long = "song")]
        songs: Vec<SongId>,
        /// Save the result to the library
        #[arg(long)]
        save: bool,
    },
    /// List saved playlists
    Playlists,
    /// Show a saved playlist
    Show { id: PlaylistId },
    /// Delete a saved playlist
    Delete { id: PlaylistId },
    /// Like or unlike a popular song
    Like { id: SongId },
    /// List liked songs with similar picks
    Favorites,
    /// Personalized picks based on every liked song
    ForYou,
    /// Find a video for a free-text query
    Video {
        #[arg(required = true)]
        query: Vec<String>,
    },
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("musicreco=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let flags = Flags::parse();

    let mut config = Config::from_env()?;
    if let Some(api_url) = flags.api_url {
        config.api_url = api_url;
    }

    tracing::debug!(api_url = %config.api_url, storage = %config.storage_path.display(), "Configuration loaded");

    let client = Arc::new(MusicRecoClient::new(&config)?);
    let storage = Arc::new(FileStorage::open(&config.storage_path));
    let session = Session::init(config, Backend::from_client(client), storage).await;

    let result = run(&session, flags.command).await;

    if let Some(notice) = session.take_notice().await {
        eprintln!("{}", notice);
    }
    session.teardown().await;

    result
}

async fn run(session: &Session, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => {
            let password = password_or_prompt(password)?;
            let user = session.login(&email, &password).await?;
            println!("Logged in as {} <{}>", user.name, user.email);
        }
        Command::Signup {
            name,
            email,
            password,
        } => {
            let password = password_or_prompt(password)?;
            let user = session.signup(&name, &email, &password).await?;
            println!("Welcome, {}", user.name);
        }
        Command::Logout => {
            session.logout().await;
            println!("Logged out");
        }
        Command::Whoami => match session.user().await {
            Some(user) => println!("{} <{}>", user.name, user.email),
            None => println!("Not logged in"),
        },
        Command::Generate { tags, songs, save } => {
            if !songs.is_empty() {
                load_popular_songs(session).await;
            }
            for tag in &tags {
                session.select_tag(tag).await;
            }
            for id in songs {
                session.toggle_song(resolve_song(session, id).await).await;
            }

            let playlist = session.generate().await?;
            print_playlist(&playlist);

            if save {
                let id = session.save_playlist().await?;
                println!("Saved as playlist {}", id);
            }
        }
        Command::Playlists => {
            let library = session.open_library().await?;
            if library.is_empty() {
                println!("No saved playlists");
            }
            for summary in library {
                let created = summary
                    .created_at
                    .map(|at| at.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                println!(
                    "{:>5}  {}  ({} songs)  {}",
                    summary.id, summary.title, summary.song_count, created
                );
            }
        }
        Command::Show { id } => {
            let playlist = session.open_saved(id).await?;
            print_playlist(&playlist);
        }
        Command::Delete { id } => {
            let remaining = session.delete_saved(id).await?;
            println!("Deleted playlist {}, {} left", id, remaining.len());
        }
        Command::Like { id } => {
            load_popular_songs(session).await;
            let song = resolve_song(session, id).await;
            match session.toggle_favorite(song.clone()).await {
                Toggled::Added => println!("Liked {} - {}", song.title, song.artist),
                Toggled::Removed => println!("Unliked {} - {}", song.title, song.artist),
            }
        }
        Command::Favorites => {
            let favorites = session.favorites().await;
            if favorites.is_empty() {
                println!("No liked songs yet");
            }
            for song in favorites {
                println!("{} - {}", song.title, song.artist);
                for similar in session.recommendations_for(song.id).await.unwrap_or_default() {
                    println!("    {} - {}", similar.title, similar.artist);
                }
            }
        }
        Command::ForYou => {
            let picks = session.personalized().await;
            if picks.is_empty() {
                println!(
                    "Like at least {} songs to get personalized picks",
                    session.config().personalized_threshold
                );
            }
            for (i, song) in picks.iter().enumerate() {
                println!("{:>2}. {} - {}  [{}]", i + 1, song.title, song.artist, song.genre);
            }
        }
        Command::Video { query } => {
            match session.find_video(&query.join(" ")).await {
                Some(video_id) => println!("https://www.youtube.com/watch?v={}", video_id),
                None => println!("No video found"),
            }
        }
    }

    Ok(())
}

async fn load_popular_songs(session: &Session) {
    if session.load_dashboard().await.is_err() {
        tracing::warn!("Popular songs unavailable, using bare song ids");
    }
}

/// Popular song by id, or a bare placeholder when it is not in the table
async fn resolve_song(session: &Session, id: SongId) -> Song {
    match session.top_song(id).await {
        Some(song) => song,
        None => Song::new(id, format!("Song {}", id), ""),
    }
}

fn password_or_prompt(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    eprint!("Password: ");
    std::io::stderr().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_playlist(playlist: &GeneratedPlaylist) {
    let mut tags: Vec<String> = playlist
        .display_tags()
        .iter()
        .map(|t| format!("#{}", t))
        .collect();
    if playlist.hidden_tag_count() > 0 {
        tags.push(format!("+{}", playlist.hidden_tag_count()));
    }

    println!("{}", playlist.title);
    if !tags.is_empty() {
        println!("{}", tags.join(" "));
    }
    for (i, song) in playlist.songs.iter().enumerate() {
        println!("{:>2}. {} - {}  [{}]", i + 1, song.title, song.artist, song.genre);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Flags::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let flags = Flags::parse_from([
            "musicreco", "generate", "--tag", "chill", "--tag", "rain", "--song", "7", "--save",
        ]);
        match flags.command {
            Command::Generate { tags, songs, save } => {
                assert_eq!(tags, vec!["chill", "rain"]);
                assert_eq!(songs, vec![7]);
                assert!(save);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
