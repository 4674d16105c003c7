use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use moviematch::catalog::{
    all_genres, find_genre, BrowseRows, CatalogClient, MergeOutcome, Movie, MovieId, Pager,
    QueryContext, RowSelector, Suggestions,
};
use moviematch::collections::CollectionKind;
use moviematch::config::{Config, API_KEY_ENV};
use moviematch::presentation::{FilterState, GenreFilter, ListController, SortKey};
use moviematch::recommend::Recommender;
use moviematch::session::Session;
use moviematch::storage::{Database, DatabaseError};
use moviematch::util::{fit_column, format_rating, sanitize_line};

const TITLE_WIDTH: usize = 42;

/// Get the config directory path (~/.config/moviematch/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("moviematch"))
}

#[derive(Parser, Debug)]
#[command(name = "moviematch", about = "Browse, search and collect movies from TMDB")]
struct Args {
    /// Use this config file instead of ~/.config/moviematch/config.toml
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in; collections are stored per name
    Login { name: String },
    /// Sign out
    Logout,
    /// Show the signed-in name
    Whoami,
    /// Manage favorites
    Favorites {
        #[command(subcommand)]
        action: CollectionAction,
    },
    /// Manage the watchlist
    Watchlist {
        #[command(subcommand)]
        action: CollectionAction,
    },
    /// Manage movies marked as not interested
    Hidden {
        #[command(subcommand)]
        action: CollectionAction,
    },
    /// Popular movies
    Popular {
        #[command(flatten)]
        list: ListArgs,
    },
    /// Popular movies plus one row per genre
    Browse {
        /// Load further pages of one row: a genre name or id, or "popular"
        #[arg(long, value_name = "ROW")]
        more: Option<RowSelector>,
        /// Extra pages to load for the --more row
        #[arg(long, default_value_t = 1, requires = "more")]
        pages: u32,
        /// Movies shown per row when browsing every row
        #[arg(long, default_value_t = 5)]
        per_row: usize,
    },
    /// Popular movies in one genre
    Genre {
        /// Genre name or id (see `moviematch genres`)
        #[arg(value_name = "GENRE")]
        name: String,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Search by title
    Search {
        query: String,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Type-ahead suggestions for a partial title
    Suggest { query: String },
    /// Movie details
    Show { id: MovieId },
    /// Recommendations based on your favorites
    Recommend,
    /// List known genres
    Genres,
}

#[derive(Subcommand, Debug)]
enum CollectionAction {
    Add { id: MovieId },
    Remove { id: MovieId },
    List {
        #[command(flatten)]
        filters: FilterArgs,
    },
}

#[derive(ClapArgs, Debug)]
struct ListArgs {
    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pages: u32,

    #[command(flatten)]
    filters: FilterArgs,
}

#[derive(ClapArgs, Debug)]
struct FilterArgs {
    /// Only show movies in this genre (name or id)
    #[arg(long)]
    genre: Option<String>,

    /// Minimum rating, 0-10
    #[arg(long, default_value_t = 0.0)]
    min_rating: f64,

    /// title-asc, title-desc, date-newest, date-oldest, rating-high, rating-low
    #[arg(long)]
    sort: Option<SortKey>,

    /// Only show movies whose title or overview contains this text
    #[arg(long)]
    filter: Option<String>,
}

impl FilterArgs {
    fn to_state(&self) -> Result<FilterState> {
        let genre = match &self.genre {
            Some(name) => {
                let genre = find_genre(name)
                    .with_context(|| format!("Unknown genre '{}'", name))?;
                GenreFilter::Only(genre.id)
            }
            None => GenreFilter::All,
        };
        Ok(FilterState {
            genre,
            min_rating: self.min_rating.clamp(0.0, 10.0),
            sort: self.sort.unwrap_or_default(),
            query: self.filter.clone().unwrap_or_default(),
        })
    }

    /// Apply filters; sort only when a sort key was given.
    fn refine(&self, movies: Vec<Movie>, excluded: HashSet<MovieId>) -> Result<Vec<Movie>> {
        let state = self.to_state()?;
        if self.sort.is_some() {
            let mut list = ListController::new();
            list.set_filters(state);
            list.set_excluded(excluded);
            list.set_movies(movies);
            return Ok(list.view().to_vec());
        }
        Ok(movies
            .into_iter()
            .filter(|m| !excluded.contains(&m.id) && state.matches(m))
            .collect())
    }
}

fn build_http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("moviematch/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()?;
    Ok(client)
}

fn catalog_client(config: &Config) -> Result<CatalogClient> {
    let api_key = config.api_key().with_context(|| {
        format!(
            "No TMDB API key configured. Set {} or add tmdb_api_key to config.toml",
            API_KEY_ENV
        )
    })?;
    CatalogClient::new(
        build_http_client()?,
        &config.api_base_url,
        api_key,
        &config.language,
    )
    .context("Failed to create catalog client")
}

fn release_year(movie: &Movie) -> String {
    movie
        .release_date
        .as_deref()
        .and_then(|d| d.get(..4))
        .unwrap_or("----")
        .to_string()
}

fn print_movies(movies: &[Movie]) {
    if movies.is_empty() {
        println!("No movies.");
        return;
    }
    for movie in movies {
        let genres: Vec<&str> = movie.genres.iter().map(|g| g.name.as_str()).collect();
        println!(
            "{:>8}  {}  {}  {:>4}  {}",
            movie.id,
            fit_column(&sanitize_line(&movie.title), TITLE_WIDTH),
            release_year(movie),
            format_rating(movie.rating),
            genres.join(", ")
        );
    }
}

async fn run_collection(
    session: &mut Session,
    config: &Config,
    kind: CollectionKind,
    action: &CollectionAction,
) -> Result<()> {
    if session.identity().is_none() {
        anyhow::bail!("Not signed in. Run `moviematch login <name>` first.");
    }

    match action {
        CollectionAction::Add { id } => {
            if session.add(kind, *id).await? {
                println!("Added {} to {}.", id, kind);
            } else {
                println!("{} is already in {}.", id, kind);
            }
        }
        CollectionAction::Remove { id } => {
            if session.remove(kind, *id).await? {
                println!("Removed {} from {}.", id, kind);
            } else {
                println!("{} is not in {}.", id, kind);
            }
        }
        CollectionAction::List { filters } => {
            let ids = session.library().get(kind).all().to_vec();
            if ids.is_empty() {
                println!("Your {} list is empty.", kind);
                return Ok(());
            }
            let client = catalog_client(config)?;
            let movies = client.details_for(&ids).await;
            print_movies(&filters.refine(movies, HashSet::new())?);
        }
    }
    Ok(())
}

async fn run_list(
    session: &Session,
    config: &Config,
    context: QueryContext,
    list: &ListArgs,
) -> Result<()> {
    let client = catalog_client(config)?;
    let excluded = session.not_interested_set();
    let mut pager = Pager::new(context);

    for _ in 0..list.pages.max(1) {
        let Some(ticket) = pager.load_more() else {
            break;
        };
        let page = ticket.page;
        pager.spawn(ticket, client.clone());
        let settled = tokio::select! {
            outcome = pager.settle(&excluded) => Some(outcome),
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(outcome) = settled else {
            pager.cancel();
            eprintln!("Interrupted.");
            break;
        };
        if outcome == MergeOutcome::Failed {
            eprintln!("Failed to load page {}; run with RUST_LOG=debug for details.", page);
        }
        if !pager.has_more() {
            break;
        }
    }

    let movies = list.filters.refine(pager.movies().to_vec(), excluded)?;
    print_movies(&movies);
    if pager.has_more() {
        println!("(more available: --pages {})", pager.next_page());
    }
    Ok(())
}

fn print_row(title: &str, pager: &Pager, limit: usize, hint: &str) {
    println!("== {} ==", title);
    let movies = pager.movies();
    print_movies(&movies[..movies.len().min(limit)]);
    if movies.len() > limit || pager.has_more() {
        println!("(more: moviematch browse --more {})", hint);
    }
    println!();
}

async fn run_browse(
    session: &Session,
    config: &Config,
    more: Option<RowSelector>,
    pages: u32,
    per_row: usize,
) -> Result<()> {
    let client = catalog_client(config)?;
    let excluded = session.not_interested_set();
    let mut browse = BrowseRows::with_all_genres();

    let Some(row) = more else {
        browse.load_initial(&client, &excluded).await;
        print_row("Popular", browse.popular(), per_row, "popular");
        for row in browse.rows() {
            print_row(&row.genre.name, &row.pager, per_row, &row.genre.id.to_string());
        }
        return Ok(());
    };

    for _ in 0..=pages {
        let outcome = browse.load_more_row(row, &client, &excluded).await;
        if matches!(outcome, MergeOutcome::Idle | MergeOutcome::Failed) {
            break;
        }
    }
    let next = pages.saturating_add(1);
    match row {
        RowSelector::Popular => {
            let hint = format!("popular --pages {}", next);
            print_row("Popular", browse.popular(), usize::MAX, &hint);
        }
        RowSelector::Genre(id) => {
            if let Some(genre_row) = browse.row(id) {
                let hint = format!("{} --pages {}", id, next);
                print_row(&genre_row.genre.name, &genre_row.pager, usize::MAX, &hint);
            }
        }
    }
    Ok(())
}

async fn run_show(session: &Session, config: &Config, id: MovieId) -> Result<()> {
    let client = catalog_client(config)?;
    let movie = client
        .movie_details(id)
        .await
        .with_context(|| format!("Failed to load movie {}", id))?;

    println!("{} ({})", sanitize_line(&movie.title), release_year(&movie));
    println!("Rating: {}", format_rating(movie.rating));
    let genres: Vec<&str> = movie.genres.iter().map(|g| g.name.as_str()).collect();
    if !genres.is_empty() {
        println!("Genres: {}", genres.join(", "));
    }
    if let Some(poster) = movie.poster_url(&config.image_base_url) {
        println!("Poster: {}", poster);
    }
    let tags: Vec<String> = CollectionKind::ALL
        .into_iter()
        .filter(|kind| session.library().contains(*kind, id))
        .map(|kind| kind.to_string())
        .collect();
    if !tags.is_empty() {
        println!("In: {}", tags.join(", "));
    }
    if !movie.overview.is_empty() {
        println!();
        println!("{}", sanitize_line(&movie.overview));
    }
    Ok(())
}

async fn run_recommend(session: &Session, config: &Config) -> Result<()> {
    let favorites = session.library().favorites().all().to_vec();
    if favorites.is_empty() {
        println!("Add some favorites first: moviematch favorites add <id>");
        return Ok(());
    }

    let client = catalog_client(config)?;
    let mut recommender = Recommender::new(client, config.recommendation_concurrency);
    recommender
        .refresh(&favorites, &session.not_interested_set())
        .await;

    let bundle = recommender.bundle();
    if bundle.is_empty() {
        println!("No recommendations found.");
        return Ok(());
    }
    for group in &bundle.groups {
        println!("Because you liked {}:", sanitize_line(&group.source_title));
        print_movies(&group.movies);
        println!();
    }
    if !bundle.general.is_empty() {
        println!("Recommended for you:");
        print_movies(&bundle.general);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // User-only access to the config directory
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    tracing::debug!(?config, "Configuration");

    let db_path = config_dir.join("moviematch.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of moviematch appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let mut session = Session::open(db).await.context("Failed to restore session")?;

    match &args.command {
        Command::Login { name } => {
            let identity = session.sign_in(name).await?;
            println!("Signed in as {}.", identity);
        }
        Command::Logout => {
            session.sign_out().await?;
            println!("Signed out.");
        }
        Command::Whoami => match session.identity() {
            Some(identity) => println!("{}", identity),
            None => println!("(not signed in)"),
        },
        Command::Favorites { action } => {
            run_collection(&mut session, &config, CollectionKind::Favorites, action).await?;
        }
        Command::Watchlist { action } => {
            run_collection(&mut session, &config, CollectionKind::Watchlist, action).await?;
        }
        Command::Hidden { action } => {
            run_collection(&mut session, &config, CollectionKind::NotInterested, action).await?;
        }
        Command::Popular { list } => {
            run_list(&session, &config, QueryContext::Popular, list).await?;
        }
        Command::Browse {
            more,
            pages,
            per_row,
        } => run_browse(&session, &config, *more, *pages, *per_row).await?,
        Command::Genre { name, list } => {
            let genre = find_genre(name).with_context(|| format!("Unknown genre '{}'", name))?;
            run_list(&session, &config, QueryContext::Genre(genre.id), list).await?;
        }
        Command::Search { query, list } => {
            run_list(&session, &config, QueryContext::from_query(query), list).await?;
        }
        Command::Suggest { query } => {
            let mut suggestions = Suggestions::new(catalog_client(&config)?, config.suggestion_limit);
            suggestions.update(query);
            let excluded = session.not_interested_set();
            let visible: Vec<Movie> = suggestions
                .settle()
                .await
                .iter()
                .filter(|m| !excluded.contains(&m.id))
                .cloned()
                .collect();
            print_movies(&visible);
        }
        Command::Show { id } => run_show(&session, &config, *id).await?,
        Command::Recommend => run_recommend(&session, &config).await?,
        Command::Genres => {
            for genre in all_genres() {
                println!("{:>6}  {}", genre.id, genre.name);
            }
        }
    }

    Ok(())
}
