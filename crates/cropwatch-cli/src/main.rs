//! CropWatch command-line client: drives the session and delivery core
//! without a browser.

mod app;
mod commands;
mod push;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cropwatch_config::{init_logging, Config, Paths};

/// CropWatch client command-line interface.
#[derive(Parser)]
#[command(name = "cropwatch")]
#[command(about = "CropWatch client: session and notification tooling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for client state (config, credentials, logs). Defaults to ~/.cropwatch
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Treat the device as offline
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "CROPWATCH_PASSWORD", hide_env_values = true)]
        password: String,
        /// Keep the session across restarts
        #[arg(long)]
        remember_me: bool,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show the current session
    Status,
    /// Refresh the access token now
    Refresh,
    /// Fetch the unread notification count
    Unread,
    /// Poll the unread count at the configured interval until interrupted
    WatchUnread,
    /// Manage push registration for this device
    Push {
        #[command(subcommand)]
        command: PushCommands,
    },
    /// Resend the email verification link
    ResendVerification {
        #[arg(short, long)]
        email: String,
    },
    /// Request a password reset email
    ForgotPassword {
        #[arg(short, long)]
        email: String,
    },
    /// Set a new password with a reset token
    ResetPassword {
        #[arg(short, long)]
        token: String,
        #[arg(short, long, env = "CROPWATCH_NEW_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Resolve where a notification click would land
    Route {
        /// Push payload JSON
        #[arg(long)]
        payload: String,
        /// Shortcut action the user pressed
        #[arg(long)]
        action: Option<String>,
    },
    /// Show the notification a push payload would produce
    Preview {
        /// Push payload JSON
        #[arg(long)]
        payload: String,
    },
}

#[derive(Subcommand)]
enum PushCommands {
    /// Register a delivery token issued by a paired device
    Enable {
        /// Delivery token; the cached one is reused when omitted
        #[arg(long)]
        token: Option<String>,
    },
    /// Opt out and unregister the cached token
    Disable,
    /// Show the current registration
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    let level = cli.log_level.unwrap_or_else(|| config.log_level.clone());
    init_logging(&level, &paths);

    let online = !cli.offline;
    let open_app = || app::App::open(&config, &paths, online);

    match cli.command {
        Commands::Login {
            email,
            password,
            remember_me,
        } => commands::login(&open_app()?, email, password, remember_me).await?,
        Commands::Logout => commands::logout(&open_app()?).await?,
        Commands::Status => commands::status(&open_app()?)?,
        Commands::Refresh => commands::refresh(&open_app()?).await?,
        Commands::Unread => commands::unread(&open_app()?).await?,
        Commands::WatchUnread => commands::watch_unread(&open_app()?).await?,
        Commands::Push { command } => {
            let app = open_app()?;
            match command {
                PushCommands::Enable { token } => commands::push_enable(&app, token).await?,
                PushCommands::Disable => commands::push_disable(&app).await?,
                PushCommands::Status => commands::push_status(&app)?,
            }
        }
        Commands::ResendVerification { email } => {
            open_app()?.session.resend_verification(&email).await?;
            println!("Verification email sent to {email}");
        }
        Commands::ForgotPassword { email } => {
            open_app()?.session.request_password_reset(&email).await?;
            println!("If {email} has an account, a reset link is on its way");
        }
        Commands::ResetPassword { token, password } => {
            open_app()?.session.reset_password(&token, &password).await?;
            println!("Password updated");
        }
        Commands::Route { payload, action } => {
            println!("{}", commands::route(&payload, action.as_deref()));
        }
        Commands::Preview { payload } => {
            println!("{}", commands::preview(&config, &payload)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_args() {
        let cli = Cli::try_parse_from([
            "cropwatch",
            "login",
            "--email",
            "farmer@example.com",
            "--password",
            "pw",
            "--remember-me",
            "--offline",
        ])
        .unwrap();
        assert!(cli.offline);
        assert!(matches!(
            cli.command,
            Commands::Login { remember_me: true, .. }
        ));
    }

    #[test]
    fn test_route_args() {
        let cli = Cli::try_parse_from([
            "cropwatch",
            "route",
            "--payload",
            r#"{"data":{"type":"tip"}}"#,
            "--action",
            "diagnose",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Route { action: Some(_), .. }));
    }

    #[test]
    fn test_push_enable_args() {
        let cli =
            Cli::try_parse_from(["cropwatch", "push", "enable", "--token", "delivery-1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Push {
                command: PushCommands::Enable { token: Some(_) }
            }
        ));
    }
}
