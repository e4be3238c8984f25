use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;

use piggy_bank::{AccessToken, UserId, create_bank_connection, initialize_db};

/// A utility for registering a Plaid item with the piggy_bank database.
///
/// The item is synced on the next webhook or poll, or straight away with
/// `POST /api/sync {"item_id": ...}`.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database. It is created if it
    /// does not exist.
    #[arg(long)]
    db_path: String,

    /// The ID of the user that owns the connection.
    #[arg(long, default_value_t = 1)]
    user_id: UserId,

    /// The Plaid item ID returned by the public token exchange.
    #[arg(long)]
    item_id: String,

    /// The Plaid access token returned by the public token exchange.
    #[arg(long, env = "PLAID_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let db_path = Path::new(&args.db_path);

    if db_path.extension().is_none_or(|extension| extension.is_empty()) {
        eprintln!("Database path must include a file extension (e.g., 'piggy_bank.db').");
        exit(1);
    }

    println!("Opening database at {db_path:#?}");
    let conn = Connection::open(db_path)?;

    initialize_db(&conn)?;

    println!("Adding connection for item {}...", args.item_id);

    let access_token = AccessToken::new(args.access_token);
    let bank_connection = create_bank_connection(args.user_id, &args.item_id, &access_token, &conn)?;

    println!(
        "Success! Created bank connection {} for user {}.",
        bank_connection.id, bank_connection.user_id
    );

    Ok(())
}
