//! minicart CLI - manage a file-backed cart from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Add two widgets
//! minicart add --id a --name Widget --price 9.99 --quantity 2
//!
//! # Change or remove a line (zero or negative removes)
//! minicart update a 5
//! minicart update a -1
//!
//! # Inspect, export and import
//! minicart show
//! minicart export --output cart.json
//! minicart import cart.json
//! ```
//!
//! # Commands
//!
//! - `add` / `remove` / `update` / `clear` - Mutate the cart
//! - `show` - Log the cart lines and subtotal
//! - `export` / `import` - Snapshot the cart to and from JSON
//! - `sync` - Push the current cart to the host platform

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use minicart_storefront::CartConfig;
use minicart_storefront::telemetry;

mod commands;

#[derive(Parser)]
#[command(name = "minicart")]
#[command(author, version, about = "minicart cart tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a product to the cart
    Add {
        /// Product identifier
        #[arg(long)]
        id: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Unit price
        #[arg(short, long, value_parser = parse_price)]
        price: Decimal,

        /// Display image reference
        #[arg(long)]
        image: Option<String>,

        /// Number of units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Remove a product from the cart
    Remove {
        /// Product identifier
        id: String,
    },
    /// Set the quantity of a product (zero or less removes it)
    Update {
        /// Product identifier
        id: String,

        /// New quantity
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove every product
    Clear,
    /// Show the cart contents
    Show,
    /// Write a cart snapshot as JSON
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the cart with a JSON snapshot
    Import {
        /// Snapshot file containing an `items` array
        file: PathBuf,
    },
    /// Send the current cart to the host platform
    Sync,
}

fn parse_price(raw: &str) -> Result<Decimal, String> {
    let price: Decimal = raw.parse().map_err(|e| format!("invalid price: {e}"))?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err("price must not be negative".to_string());
    }
    Ok(price)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            telemetry::init_tracing(telemetry::LogFormat::default());
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = telemetry::init_sentry(&config);
    telemetry::init_tracing(config.log_format);

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, &config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = commands::cart::open(config)?;

    match cli.command {
        Commands::Add {
            id,
            name,
            price,
            image,
            quantity,
        } => commands::cart::add(&mut session, id, name, price, image, quantity),
        Commands::Remove { id } => commands::cart::remove(&mut session, &id),
        Commands::Update { id, quantity } => commands::cart::update(&mut session, &id, quantity),
        Commands::Clear => commands::cart::clear(&mut session),
        Commands::Show => commands::cart::show(&session),
        Commands::Export { output } => commands::cart::export(&session, output.as_deref())?,
        Commands::Import { file } => commands::cart::import(&mut session, &file)?,
        Commands::Sync => commands::cart::sync(&session),
    }

    session.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("9.99"), Ok(Decimal::new(999, 2)));
        assert_eq!(parse_price("0"), Ok(Decimal::ZERO));
        assert!(parse_price("-1").is_err());
        assert!(parse_price("free").is_err());
    }

    #[test]
    fn test_cli_parses_negative_update() {
        let cli = Cli::try_parse_from(["minicart", "update", "a", "-1"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Update { quantity: -1, .. })
        ));
    }

    #[test]
    fn test_cli_add_defaults_quantity() {
        let cli = Cli::try_parse_from([
            "minicart", "add", "--id", "a", "--name", "Widget", "--price", "9.99",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Add { quantity: 1, .. })
        ));
    }

    #[test]
    fn test_cli_verifies() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
