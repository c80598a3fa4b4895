use anyhow::{bail, Context};
use clap::Parser;
use sneakervault_core::{
    models::{FetchState, SaveStatus, Sneaker},
    AddOutcome, AppContext, Config, DetailOutcome, Error, SearchOutcome,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "sneakervault")]
#[command(version, about = "Search sneakers and keep track of the ones you love", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Search for sneakers
    Search {
        /// Search query
        query: String,
    },
    /// Search as you type - each line on stdin is the new contents of the search box
    Live,
    /// Show sneaker details
    Show {
        /// Style ID (e.g. DZ4549-001)
        style_id: String,
    },
    /// Manage your vault
    Vault {
        #[command(subcommand)]
        action: VaultAction,
    },
    /// Manage collections
    Collections {
        #[command(subcommand)]
        action: CollectionAction,
    },
    /// Manage the local cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand)]
enum VaultAction {
    /// List saved sneakers
    List,
    /// Save a sneaker
    Add { style_id: String },
    /// Remove a sneaker
    Remove { style_id: String },
}

#[derive(clap::Subcommand)]
enum CollectionAction {
    /// List your collections
    List,
    /// Create a collection
    Create {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a collection
    Delete { id: Uuid },
    /// List the sneakers in a collection
    Items { id: Uuid },
    /// Add a sneaker to a collection
    Add { id: Uuid, style_id: String },
    /// Remove a sneaker from a collection
    Remove { id: Uuid, style_id: String },
}

#[derive(clap::Subcommand)]
enum CacheAction {
    /// Drop every cached entry
    Clear,
}

#[derive(clap::Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - helps when things go sideways
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sneakervault=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load config")?;

    let Some(command) = cli.command else {
        println!("No command specified. Try --help");
        return Ok(());
    };

    if let Commands::Config { action } = command {
        return run_config(action, &config);
    }

    let ctx = AppContext::from_config(&config).context("Failed to start up")?;

    match command {
        Commands::Search { query } => {
            tracing::info!("Searching for: {}", query);
            match ctx.search.search(&query).await {
                SearchOutcome::TooShort => {
                    println!(
                        "Type at least {} characters to search",
                        config.search.min_query_len
                    );
                }
                SearchOutcome::Failed => {
                    if let FetchState::Failed(msg) = ctx.search.state().status {
                        bail!("Search failed: {}", msg);
                    }
                    bail!("Search failed");
                }
                _ => print_sneakers(ctx.search.state().results()),
            }
        }
        Commands::Live => run_live(ctx, config.search.min_query_len).await?,
        Commands::Show { style_id } => show(&ctx, &style_id).await?,
        Commands::Vault { action } => run_vault(&ctx, action).await?,
        Commands::Collections { action } => run_collections(&ctx, action).await?,
        Commands::Cache {
            action: CacheAction::Clear,
        } => {
            ctx.content_cache.clear();
            println!("Cache cleared");
        }
        Commands::Config { action } => run_config(action, &config)?,
    }

    Ok(())
}

fn run_config(action: ConfigAction, config: &Config) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let mut shown = config.clone();
            if shown.rowstore.access_token.is_some() {
                shown.rowstore.access_token = Some("********".into());
            }
            print!("{}", toml::to_string_pretty(&shown)?);
        }
        ConfigAction::Init { force } => {
            let path = Config::config_path()?;
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            let path = Config::default().save()?;
            println!("Wrote default config to {}", path.display());
        }
    }
    Ok(())
}

/// Feed stdin through the debounced search and print each settled result
async fn run_live(ctx: AppContext, min_query_len: usize) -> anyhow::Result<()> {
    let AppContext { search, .. } = ctx;
    let mut updates = search.subscribe();

    let printer = tokio::spawn(async move {
        let mut last_printed: Option<String> = None;
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            let rendered = match &state.status {
                FetchState::Success(results) => format_sneakers(results),
                FetchState::Failed(msg) => format!("Search failed: {}\n", msg),
                _ => continue,
            };
            let rendered = format!("== {} ==\n{}", state.query.trim(), rendered);
            if last_printed.as_deref() != Some(rendered.as_str()) {
                print!("{}", rendered);
                last_printed = Some(rendered);
            }
        }
    });

    println!("Type to search (min {} characters), Ctrl-D to quit", min_query_len);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        search.input_changed(&line);
    }

    // Whatever is still waiting on the debounce runs now
    search.submit().await;
    drop(search);
    printer.await?;
    Ok(())
}

async fn show(ctx: &AppContext, style_id: &str) -> anyhow::Result<()> {
    tracing::info!("Showing sneaker: {}", style_id);
    let (outcome, _) = ctx.detail.open(style_id).await;
    let state = ctx.detail.state();

    match (outcome, state.item) {
        (DetailOutcome::NotFound, _) => bail!("No sneaker found with style ID {}", style_id),
        (_, FetchState::Failed(msg)) => bail!("Couldn't load {}: {}", style_id, msg),
        (_, FetchState::Success(detail)) => {
            let sneaker = &detail.sneaker;
            println!("{} ({})", sneaker.name, sneaker.style_id);
            println!("Brand:     {}", sneaker.brand);
            if let Some(colorway) = &sneaker.colorway {
                println!("Colorway:  {}", colorway);
            }
            if let Some(date) = &sneaker.release_date {
                println!("Released:  {}", date);
            }
            if let Some(price) = sneaker.retail_price {
                println!("Retail:    ${:.2}", price);
            }
            if let Some((platform, price)) = detail.lowest_resell_price() {
                println!("Lowest:    ${:.2} on {}", price, platform);
            }
            match state.saved {
                SaveStatus::Saved => println!("In your vault"),
                SaveStatus::NotSaved => println!("Not in your vault"),
                _ => {}
            }
            if let Some(description) = &detail.description {
                println!("\n{}", description);
            }
        }
        _ => bail!("Couldn't load {}", style_id),
    }
    Ok(())
}

/// Load a sneaker through the detail view so the cache gets a say
async fn load_sneaker(ctx: &AppContext, style_id: &str) -> anyhow::Result<Sneaker> {
    match ctx.detail.load(style_id).await {
        DetailOutcome::NotFound => bail!("No sneaker found with style ID {}", style_id),
        DetailOutcome::Fetched | DetailOutcome::CacheHit => {}
        _ => bail!("Couldn't load {}", style_id),
    }
    match ctx.detail.state().item {
        FetchState::Success(detail) => Ok(detail.sneaker),
        _ => bail!("Couldn't load {}", style_id),
    }
}

async fn run_vault(ctx: &AppContext, action: VaultAction) -> anyhow::Result<()> {
    match action {
        VaultAction::List => {
            let items = ctx.vault.list_vault().await?;
            if items.is_empty() {
                println!("Your vault is empty");
            }
            for item in items {
                println!(
                    "{:<14} {} ({}) - saved {}",
                    item.sneaker_id,
                    item.name,
                    item.brand,
                    item.created_at.format("%Y-%m-%d")
                );
            }
        }
        VaultAction::Add { style_id } => {
            load_sneaker(ctx, &style_id).await?;
            match ctx.detail.add_to_vault().await? {
                AddOutcome::Added => println!("Added {} to your vault", style_id),
                AddOutcome::AlreadySaved => println!("{} is already in your vault", style_id),
            }
        }
        VaultAction::Remove { style_id } => {
            ctx.vault.remove_from_vault(&style_id).await?;
            println!("Removed {} from your vault", style_id);
        }
    }
    Ok(())
}

async fn run_collections(ctx: &AppContext, action: CollectionAction) -> anyhow::Result<()> {
    match action {
        CollectionAction::List => {
            let collections = ctx.vault.list_collections().await?;
            if collections.is_empty() {
                println!("No collections yet");
            }
            for collection in collections {
                match &collection.description {
                    Some(description) => {
                        println!("{}  {} - {}", collection.id, collection.name, description)
                    }
                    None => println!("{}  {}", collection.id, collection.name),
                }
            }
        }
        CollectionAction::Create { name, description } => {
            let collection = ctx
                .vault
                .create_collection(&name, description.as_deref())
                .await?;
            println!("Created '{}' ({})", collection.name, collection.id);
        }
        CollectionAction::Delete { id } => {
            ctx.vault.delete_collection(id).await?;
            println!("Deleted collection {}", id);
        }
        CollectionAction::Items { id } => {
            let items = ctx.vault.collection_items(id).await?;
            if items.is_empty() {
                println!("Nothing in this collection yet");
            }
            for item in items {
                println!("{:<14} {} ({})", item.sneaker_id, item.name, item.brand);
            }
        }
        CollectionAction::Add { id, style_id } => {
            let sneaker = load_sneaker(ctx, &style_id).await?;
            match ctx.vault.add_to_collection(id, &sneaker).await {
                Ok(_) => println!("Added {} to collection", style_id),
                Err(Error::AlreadyExists(msg)) => println!("{}", msg),
                Err(e) => return Err(e.into()),
            }
        }
        CollectionAction::Remove { id, style_id } => {
            ctx.vault.remove_from_collection(id, &style_id).await?;
            println!("Removed {} from collection", style_id);
        }
    }
    Ok(())
}

fn format_sneakers(sneakers: &[Sneaker]) -> String {
    if sneakers.is_empty() {
        return "No sneakers found\n".to_string();
    }

    let mut out = String::new();
    for sneaker in sneakers {
        let price = sneaker
            .retail_price
            .map(|p| format!("${:.0}", p))
            .unwrap_or_else(|| "-".into());
        out.push_str(&format!(
            "{:<14} {:<6} {} ({})\n",
            sneaker.style_id, price, sneaker.name, sneaker.brand
        ));
    }
    out
}

fn print_sneakers(sneakers: &[Sneaker]) {
    print!("{}", format_sneakers(sneakers));
}
