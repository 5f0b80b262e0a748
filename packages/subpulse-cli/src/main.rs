use clap::{Parser, Subcommand};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use subpulse_client::{
    ConnectionState, InboxController, LiveChannelManager, StatusFilter, ToastStack, ToastUpdate,
    format_notification, format_surface,
};
use subpulse_core::AppConfig;
use subpulse_sdk::InboxClient;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "subpulse")]
#[command(about = "Subpulse notification inbox client")]
struct Cli {
    /// Server base URL (overrides SUBPULSE_SERVER)
    #[arg(short, long)]
    server: Option<String>,

    /// Bearer token (overrides SUBPULSE_TOKEN)
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the notification inbox
    Inbox {
        /// User id
        user: i64,
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
        /// Case-insensitive search over title and message
        #[arg(long)]
        search: Option<String>,
        /// Page to display
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Show every notification (unscoped global view)
    All,
    /// Mark notifications as read
    MarkRead {
        /// Notification ids, comma separated
        #[arg(long, value_delimiter = ',')]
        ids: Vec<i64>,
        /// Mark the entire inbox (ids are ignored server-side)
        #[arg(long)]
        all: bool,
    },
    /// Delete notifications
    Delete {
        /// User id
        user: i64,
        /// Notification ids, comma separated
        #[arg(long, value_delimiter = ',')]
        ids: Vec<i64>,
        /// Delete the entire inbox (asks for confirmation)
        #[arg(long)]
        all: bool,
        /// Skip the delete-all confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Listen for live push events and print the deduplicated toast stack
    Listen {
        /// User id; omit to connect anonymously
        #[arg(long)]
        user: Option<i64>,
    },
}

fn confirm_delete_all() -> bool {
    print!("⚠️  Delete ALL notifications? This cannot be undone. [y/N] ");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim(), "y" | "Y" | "yes")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    let server = cli.server.unwrap_or(config.server_url.clone());
    let token = cli.token.or_else(|| std::env::var("SUBPULSE_TOKEN").ok());

    let mut client = InboxClient::new(&server).on_unauthorized(Arc::new(|| {
        eprintln!("🔒 Session expired, redirecting to /login");
    }));
    if let Some(token) = &token {
        client.set_token(token);
    }

    match cli.command {
        Commands::Inbox {
            user,
            unread,
            search,
            page,
        } => {
            let mut controller = InboxController::with_page_size(client, user, config.page_size);
            if let Err(e) = controller.refresh().await {
                eprintln!("❌ Failed to fetch inbox: {}", e);
                std::process::exit(1);
            }
            if unread {
                controller.set_filter(StatusFilter::Unread);
            }
            if let Some(text) = search {
                controller.set_search(&text);
            }
            controller.set_page(page);

            println!(
                "📬 Inbox — page {}/{} ({} matching):",
                controller.page(),
                controller.total_pages(),
                controller.filtered().len()
            );
            println!("{}", "─".repeat(60));
            for item in controller.page_items() {
                println!("{}", format_notification(item));
                println!("{}", "─".repeat(60));
            }
            if controller.pagination_visible() {
                println!("Use --page to see the other pages");
            }
        }
        Commands::All => match client.fetch_all().await {
            Ok(items) => {
                println!("📬 Notifications ({} total):", items.len());
                println!("{}", "─".repeat(60));
                for item in items {
                    println!("{}", format_notification(&item));
                    println!("{}", "─".repeat(60));
                }
            }
            Err(e) => {
                eprintln!("❌ Failed to fetch notifications: {}", e);
                std::process::exit(1);
            }
        },
        Commands::MarkRead { ids, all } => {
            if ids.is_empty() && !all {
                eprintln!("❌ Pass --ids or --all");
                std::process::exit(1);
            }
            match client.toggle_read(&ids, all).await {
                Ok(result) => println!("✅ {}", result.message),
                Err(e) => {
                    eprintln!("❌ Failed to mark read: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Delete { user, ids, all, yes } => {
            if all {
                let mut controller =
                    InboxController::with_page_size(client, user, config.page_size);
                match controller.delete_all(|| yes || confirm_delete_all()).await {
                    Ok(true) => println!("✅ Inbox cleared"),
                    Ok(false) => println!("Cancelled"),
                    Err(e) => {
                        eprintln!("❌ Failed to delete: {}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                if ids.is_empty() {
                    eprintln!("❌ Pass --ids or --all");
                    std::process::exit(1);
                }
                match client.delete(&ids, false).await {
                    Ok(result) => println!("✅ {}", result.message),
                    Err(e) => {
                        eprintln!("❌ Failed to delete: {}", e);
                        std::process::exit(1);
                    }
                }
            }
        }
        Commands::Listen { user } => {
            let mut manager = LiveChannelManager::new(&server);
            manager.set_identity(user).await;
            if manager.state() != ConnectionState::Connected {
                eprintln!("❌ Could not connect to the live channel at {}", server);
                std::process::exit(1);
            }

            println!("👂 Listening for notifications (Ctrl+C to stop)...");
            let mut stack = ToastStack::new();
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(500));
            loop {
                tokio::select! {
                    event = manager.recv() => match event {
                        Some(event) => {
                            let update = stack.push(event, Instant::now());
                            let id = match update {
                                ToastUpdate::Created(id) => id,
                                ToastUpdate::Folded { id, .. } => id,
                            };
                            if let Some(surface) = stack.get(id) {
                                println!("{}", format_surface(surface));
                            }
                        }
                        None => {
                            println!("🔌 Live channel closed");
                            break;
                        }
                    },
                    _ = ticker.tick() => {
                        stack.sweep(Instant::now());
                    }
                }
            }
        }
    }

    Ok(())
}
