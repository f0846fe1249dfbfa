//! # Cart CLI
//!
//! Inspects and edits a persisted cart from the command line. Handy for
//! reproducing UI bug reports against a copy of a device's database.
//!
//! ## Usage
//! ```bash
//! # Show the cart in the default database
//! cargo run -p cart-store --bin cart -- show
//!
//! # Add a product, then bump it
//! cargo run -p cart-store --bin cart -- add --id p1 --title Shoe --image-url u --price 10
//! cargo run -p cart-store --bin cart -- increment p1
//!
//! # Point at a specific database file
//! cargo run -p cart-store --bin cart -- --db ./device-copy.db show
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cart_core::NewLineItem;
use cart_store::{CartConfig, CartStore, StoreResult};

#[derive(Debug, Parser)]
#[command(name = "cart", about = "Inspect and edit a persisted storefront cart")]
struct Cli {
    /// SQLite database file (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the cart and its totals
    Show,

    /// Add a product (or one more unit of it)
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        image_url: String,
        #[arg(long)]
        price: f64,
    },

    /// Add one unit of an item already in the cart
    Increment { id: String },

    /// Remove one unit (removes the item at zero)
    Decrement { id: String },

    /// Empty the cart
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.code(), error = %e, "Command failed");
            eprintln!("error [{}]: {}", e.code(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> StoreResult<()> {
    let mut config = CartConfig::load(cli.config)?;
    if let Some(db) = cli.db {
        config.database.path = Some(db);
    }

    let store = CartStore::from_config(&config).await?;

    let result = apply(&store, cli.command);
    store.shutdown().await?;
    result?;

    print_cart(&store);
    Ok(())
}

fn apply(store: &CartStore, command: Command) -> StoreResult<()> {
    match command {
        Command::Show => {}
        Command::Add {
            id,
            title,
            image_url,
            price,
        } => {
            let change = store.add_to_cart(NewLineItem::new(id, title, image_url, price))?;
            info!(?change, "Added to cart");
        }
        Command::Increment { id } => {
            let quantity = store.increment(&id)?;
            info!(%id, quantity, "Incremented");
        }
        Command::Decrement { id } => match store.decrement(&id)? {
            Some(quantity) => info!(%id, quantity, "Decremented"),
            None => info!(%id, "Removed from cart"),
        },
        Command::Clear => {
            store.clear()?;
            info!("Cart cleared");
        }
    }
    Ok(())
}

fn print_cart(store: &CartStore) {
    let items = store.items();
    if items.is_empty() {
        println!("(cart is empty)");
        return;
    }

    for item in &items {
        println!(
            "{:<12} {:<30} {:>4} x {:>10.2} = {:>10.2}",
            item.id,
            item.title,
            item.quantity,
            item.price,
            item.line_total()
        );
    }

    let totals = store.totals();
    println!(
        "{} items, {} units, subtotal {:.2}",
        totals.item_count, totals.total_quantity, totals.subtotal
    );
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=cart_store=trace` - Show trace for the store only
/// - Default: WARN for the CLI so output stays readable
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,cart_store=info,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
