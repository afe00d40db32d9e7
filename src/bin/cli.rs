use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use std::fs;

const TOKEN_FILE: &str = ".flashdeck_token";
const AUTH_HEADER: &str = "x-auth-token";

#[derive(Parser)]
#[command(name = "flashdeck-cli")]
#[command(about = "CLI for the flashdeck API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, env = "FLASHDECK_URL", default_value = "http://localhost:5000")]
    url: String,
}

#[derive(Subcommand)]
enum Commands {
    Register {
        #[arg(short, long)]
        first_name: String,
        #[arg(short, long)]
        last_name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Show whether the saved token is still valid.
    Whoami,
    EditProfile {
        #[arg(short, long)]
        first_name: String,
        #[arg(short, long)]
        last_name: String,
    },
    CreateDeck {
        #[arg(short, long)]
        title: String,
    },
    ListDecks {
        #[arg(short, long)]
        user_id: String,
    },
    GetDeck {
        #[arg(short, long)]
        deck_id: String,
    },
    AddCard {
        #[arg(short, long)]
        deck_id: String,
        #[arg(short, long)]
        front: String,
        #[arg(short, long)]
        back: String,
    },
    RenameDeck {
        #[arg(short, long)]
        deck_id: String,
        #[arg(short, long)]
        title: String,
    },
    EditCard {
        #[arg(short, long)]
        deck_id: String,
        #[arg(short = 'n', long)]
        card_no: i64,
        #[arg(short, long)]
        front: String,
        #[arg(short, long)]
        back: String,
    },
    RemoveCard {
        #[arg(short, long)]
        deck_id: String,
        #[arg(short = 'n', long)]
        card_no: i64,
    },
    DeleteDeck {
        #[arg(short, long)]
        deck_id: String,
    },
    IsOwner {
        #[arg(short, long)]
        deck_id: String,
    },
    Logout,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

fn with_token(request: RequestBuilder) -> RequestBuilder {
    let token = fs::read_to_string(TOKEN_FILE).unwrap_or_default();
    request.header(AUTH_HEADER, token.trim())
}

async fn print_response(request: RequestBuilder) -> Result<(), Box<dyn std::error::Error>> {
    let res = request.send().await?;
    println!("{} {}", res.status(), res.text().await?);
    Ok(())
}

async fn save_token(request: RequestBuilder) -> Result<(), Box<dyn std::error::Error>> {
    let res = request.send().await?;
    if res.status().is_success() {
        let body: TokenResponse = res.json().await?;
        fs::write(TOKEN_FILE, body.token)?;
        println!("Logged in. Token saved to {TOKEN_FILE}");
    } else {
        println!("Failed: {}", res.text().await?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();
    let url = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Register { first_name, last_name, email, password } => {
            let request = client.post(format!("{url}/auth")).json(&json!({
                "firstName": first_name,
                "lastName": last_name,
                "email": email,
                "password": password,
                "passwordVerify": password,
            }));
            save_token(request).await?;
        }
        Commands::Login { email, password } => {
            let request = client
                .post(format!("{url}/auth/login"))
                .json(&json!({ "email": email, "password": password }));
            save_token(request).await?;
        }
        Commands::Whoami => {
            print_response(with_token(client.get(format!("{url}/auth/loggedIn")))).await?;
        }
        Commands::EditProfile { first_name, last_name } => {
            let request = client
                .patch(format!("{url}/auth/edit"))
                .json(&json!({ "firstName": first_name, "lastName": last_name }));
            print_response(with_token(request)).await?;
        }
        Commands::CreateDeck { title } => {
            let request = client.post(format!("{url}/deck")).json(&json!({ "title": title }));
            print_response(with_token(request)).await?;
        }
        Commands::ListDecks { user_id } => {
            print_response(client.get(format!("{url}/deck/user/{user_id}"))).await?;
        }
        Commands::GetDeck { deck_id } => {
            print_response(client.get(format!("{url}/deck/{deck_id}"))).await?;
        }
        Commands::AddCard { deck_id, front, back } => {
            let request = client
                .patch(format!("{url}/deck/{deck_id}"))
                .json(&json!({ "card": [front, back] }));
            print_response(with_token(request)).await?;
        }
        Commands::RenameDeck { deck_id, title } => {
            let request = client
                .patch(format!("{url}/deck/{deck_id}/title"))
                .json(&json!({ "newTitle": title }));
            print_response(with_token(request)).await?;
        }
        Commands::EditCard { deck_id, card_no, front, back } => {
            let request = client
                .patch(format!("{url}/deck/{deck_id}/{card_no}"))
                .json(&json!({ "card": [front, back] }));
            print_response(with_token(request)).await?;
        }
        Commands::RemoveCard { deck_id, card_no } => {
            let request = client.delete(format!("{url}/deck/{deck_id}/{card_no}"));
            print_response(with_token(request)).await?;
        }
        Commands::DeleteDeck { deck_id } => {
            print_response(with_token(client.delete(format!("{url}/deck/{deck_id}")))).await?;
        }
        Commands::IsOwner { deck_id } => {
            let request = client.get(format!("{url}/deck/{deck_id}/isOwner"));
            print_response(with_token(request)).await?;
        }
        Commands::Logout => {
            let _ = fs::remove_file(TOKEN_FILE);
            println!("Logged out (token removed).");
        }
    }

    Ok(())
}
