//! Load demo data into a flashdeck data directory
//!
//! Creates a demo account and a few decks with cards, going through the same
//! services the server uses so every rule and reference link applies.
//! Run with the server stopped (Sled holds an exclusive lock):
//!   cargo run --bin load_data -- --data-dir flashdeck_data

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use flashdeck::auth::{AuthService, Registration, TokenKeys};
use flashdeck::decks::DeckService;
use flashdeck::error::ServiceError;
use flashdeck::storage::Storage;

#[derive(Parser)]
#[command(name = "load_data", about = "Seed a demo account with example decks")]
struct Args {
    #[arg(long, env = "DATA_DIR", default_value = "flashdeck_data")]
    data_dir: PathBuf,

    #[arg(long, default_value = "demo@flashdeck.local")]
    email: String,

    #[arg(long, default_value = "demo-password")]
    password: String,
}

const DECKS: &[(&str, &[(&str, &str)])] = &[
    (
        "Spanish basics",
        &[("hola", "hello"), ("gracias", "thank you"), ("perro", "dog"), ("gato", "cat")],
    ),
    (
        "Capitals",
        &[("France", "Paris"), ("Japan", "Tokyo"), ("Peru", "Lima"), ("Kenya", "Nairobi")],
    ),
    (
        "Rust keywords",
        &[("impl", "implementation block"), ("dyn", "trait object"), ("move", "closure takes ownership")],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("flashdeck=info").init();
    let args = Args::parse();

    let storage = Arc::new(Storage::open(&args.data_dir)?);
    // Tokens are not handed out here; any secret will do.
    let keys = TokenKeys::from_secret(b"load-data", chrono::Duration::hours(1));
    let auth = AuthService::new(Arc::clone(&storage), keys, bcrypt::DEFAULT_COST)?;
    let decks = DeckService::new(Arc::clone(&storage));

    let registration = Registration {
        first_name: "Demo".to_string(),
        last_name: "User".to_string(),
        email: args.email.clone(),
        password: args.password.clone(),
        password_verify: args.password.clone(),
    };
    let owner = match auth.register(registration).await {
        Ok((user, _)) => user,
        Err(ServiceError::Conflict(_)) => {
            println!("Demo account {} already exists, nothing to do", args.email);
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    for (title, cards) in DECKS {
        let deck = decks.create_deck(&owner.id, title)?;
        for (front, back) in cards.iter() {
            let sides = [front.to_string(), back.to_string()];
            decks.add_card(deck.id.as_str(), &owner.id, &sides)?;
        }
        println!("✅ Deck '{}' with {} cards ({})", title, cards.len(), deck.id);
    }

    storage.flush().await?;
    println!(
        "✅ Loaded {} decks for {} (user id {})",
        DECKS.len(),
        owner.email,
        owner.id
    );
    Ok(())
}
