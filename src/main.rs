//! tokenprobe entry point: configuration, logging and the command loop.

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tokenprobe::config::Config;
use tokenprobe::controller::AuthFlowController;
use tokenprobe::error::AppError;
use tokenprobe::probe::BackendProbe;
use tokenprobe::provider::azure::AzureProvider;
use tokenprobe::provider::IdentityProvider;
use tokenprobe::ui::{ConsolePresenter, Presenter};

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything else
    if let Err(e) = dotenvy::dotenv() {
        // .env file is optional - only log if it's not a "file not found" error
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("\nPlease set the following environment variables:");
            eprintln!("  AZURE_CLIENT_ID=<your-azure-ad-client-id>");
            eprintln!("  AZURE_TENANT_ID=<your-tenant-id>");
            eprintln!("  AZURE_SCOPE=<requested-scope> (optional)");
            eprintln!("  API_URL=<backend-debug-endpoint> (optional)");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    info!("Starting tokenprobe v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(config).await {
        error!("Fatal error: {}", e);
        eprintln!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging.
fn init_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

/// Build the components and drive the command loop.
async fn run(config: Config) -> Result<()> {
    let provider =
        Arc::new(AzureProvider::new(&config).context("Failed to create Azure provider")?);
    let presenter = Arc::new(ConsolePresenter::new());
    let probe = BackendProbe::new(config.api.debug_endpoint.clone())
        .context("Failed to create backend probe")?;

    let mut controller = AuthFlowController::new(
        Arc::clone(&provider),
        Arc::clone(&presenter),
        config.scopes(),
    );

    // Initialization failure is fatal to startup; it has already been
    // rendered once by the controller.
    let mut events = controller
        .initialize()
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut commands = spawn_stdin_reader();

    print_help();
    prompt();

    loop {
        tokio::select! {
            // Login-success events from the provider. May race an explicit
            // sign-in; both converge on the same provider account, so the
            // last callback to run wins.
            Some(event) = events.recv() => {
                controller.handle_event(event).await;
                prompt();
            }

            command = commands.recv() => {
                let Some(line) = command else {
                    // stdin closed
                    break;
                };

                match line.trim() {
                    "" => {}
                    "signin" => {
                        // Failures are rendered by the controller
                        let _ = controller.sign_in().await;
                    }
                    "signout" => {
                        let _ = controller.sign_out().await;
                    }
                    "token" => match controller.request_token().await {
                        Ok(token) => println!("{token}"),
                        Err(e) => {
                            presenter.render_error(&AppError::Auth(e).user_message());
                        }
                    },
                    "probe" => run_probe(&controller, &probe, presenter.as_ref()).await,
                    "status" => {
                        if let Some(account) = controller.session().active() {
                            presenter.render_signed_in(account);
                        } else {
                            presenter.render_signed_out();
                        }
                    }
                    "help" => print_help(),
                    "quit" | "exit" => break,
                    other => println!("Unknown command: {other} (try 'help')"),
                }
                prompt();
            }
        }
    }

    info!("Shutting down");
    Ok(())
}

/// Acquire a token and send it to the backend debug endpoint.
async fn run_probe<P, U>(controller: &AuthFlowController<P, U>, probe: &BackendProbe, presenter: &U)
where
    P: IdentityProvider,
    U: Presenter,
{
    match controller.request_token().await {
        Ok(token) => match probe.probe(&token).await {
            Ok(result) => {
                presenter.clear_error();
                presenter.render_api_result(&result.body, result.success);
            }
            Err(e) => presenter.render_error(&AppError::Probe(e).user_message()),
        },
        Err(e) => presenter.render_error(&AppError::Auth(e).user_message()),
    }
}

/// Forward stdin lines into a channel the select loop can consume.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });

    rx
}

fn print_help() {
    println!("Commands:");
    println!("  signin   Sign in through the browser");
    println!("  signout  Sign out and clear the session");
    println!("  token    Acquire and print an access token");
    println!("  probe    Send the token to the backend debug endpoint");
    println!("  status   Show the current session");
    println!("  help     Show this help");
    println!("  quit     Exit");
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}
