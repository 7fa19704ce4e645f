//! Curio CLI - Drive the file-backed storefront cart.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! curio cart show
//!
//! # Add two units of a product
//! curio cart add --id 1 --name "Artisan Candle Set" --price 45.00 --category Home --units 2
//!
//! # Change or remove a line
//! curio cart set 1 3
//! curio cart remove 1
//!
//! # Place an order and empty the cart
//! curio checkout --name "Ada Lovelace" --email ada@example.com \
//!     --address "1 Gift Lane" --city London --zip N1
//! ```
//!
//! # Commands
//!
//! - `cart` - Inspect and edit the cart
//! - `checkout` - Submit the cart as an order

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use curio_cart::{CartConfig, CartError, LogFormat};
use curio_core::{Price, ProductId};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "curio")]
#[command(author, version, about = "Curio storefront cart tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Submit the cart as an order and empty it
    Checkout {
        /// Customer full name
        #[arg(long)]
        name: String,

        /// Contact email address
        #[arg(long)]
        email: String,

        /// Street address
        #[arg(long)]
        address: String,

        #[arg(long)]
        city: String,

        /// Postal code
        #[arg(long)]
        zip: String,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show line items and totals
    Show,
    /// Add a product (one unit unless --units is given)
    Add {
        /// Product ID
        #[arg(long)]
        id: ProductId,

        /// Product name
        #[arg(long)]
        name: String,

        /// Unit price (e.g. 45.00)
        #[arg(long)]
        price: Price,

        /// Image URL
        #[arg(long, default_value = "")]
        image: String,

        #[arg(long, default_value = "")]
        category: String,

        /// Number of units to add
        #[arg(long, default_value_t = 1)]
        units: u32,
    },
    /// Remove a product
    Remove {
        /// Product ID
        id: ProductId,
    },
    /// Set the quantity of a product already in the cart (0 or less removes it)
    Set {
        /// Product ID
        id: ProductId,

        /// New quantity
        #[arg(allow_hyphen_values = true)]
        quantity: i64,
    },
    /// Remove every product
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(config: &CartConfig) {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "curio_cart=info,curio=info".into());

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter));

    match config.log_format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing(&config);

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartConfig) -> curio_cart::Result<()> {
    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(config).await,
            CartAction::Add {
                id,
                name,
                price,
                image,
                category,
                units,
            } => {
                if units == 0 {
                    return Err(CartError::InvalidInput("--units must be at least 1".into()));
                }
                commands::cart::add(
                    config,
                    commands::cart::AddArgs {
                        id,
                        name,
                        price,
                        image,
                        category,
                        units,
                    },
                )
                .await;
            }
            CartAction::Remove { id } => commands::cart::remove(config, id).await,
            CartAction::Set { id, quantity } => commands::cart::set(config, id, quantity).await,
            CartAction::Clear => commands::cart::clear(config).await,
        },
        Commands::Checkout {
            name,
            email,
            address,
            city,
            zip,
        } => {
            commands::checkout::run(
                config,
                commands::checkout::CheckoutArgs {
                    name,
                    email,
                    address,
                    city,
                    zip,
                },
            )
            .await?;
        }
    }
    Ok(())
}
