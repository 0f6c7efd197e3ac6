use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use latchkey_core::api::{
    ApiError, AuthApi, LoginRequest, LogoutRequest, RegisterRequest, TokenRefreshRequest,
};
use latchkey_core::domain::UserRole;
use latchkey_core::logging::{init_logging_json, init_logging_with_level};
use latchkey_core::store::Database;
use latchkey_core::{AuthService, Config, SystemClock};

#[derive(Parser)]
#[command(name = "latchkey")]
#[command(about = "Password login, JWT access tokens and rotating refresh tokens")]
#[command(version)]
struct Cli {
    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run pending migrations
    Migrate,
    /// Create a user
    Register {
        username: String,
        password: String,
        /// Guest, User or Admin
        #[arg(long, default_value = "User", value_parser = parse_role)]
        role: UserRole,
    },
    /// Exchange a username and password for a token pair
    Login { username: String, password: String },
    /// Exchange a refresh token for a new token pair
    Refresh {
        username: String,
        refresh_token: String,
    },
    /// Revoke a refresh token
    Logout {
        username: String,
        refresh_token: String,
    },
    /// Validate an access token and print its claims
    Inspect { access_token: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.json_logs {
        init_logging_json();
    } else {
        init_logging_with_level(&cli.log_level);
    }

    let config = Config::from_env().inspect_err(|e| {
        tracing::error!(code = e.error_code(), "Refusing to start: {}", e);
    })?;

    let db = Database::connect(&config).await?;
    if let Commands::Migrate = cli.command {
        db.migrate().await?;
        tracing::info!("Migrations applied");
        return Ok(ExitCode::SUCCESS);
    }

    let auth = AuthService::new(config.auth.clone(), Arc::new(SystemClock))?;
    let api = AuthApi::new(db, auth);

    let exit = match cli.command {
        Commands::Migrate => ExitCode::SUCCESS,
        Commands::Register {
            username,
            password,
            role,
        } => report(
            api.register(RegisterRequest {
                username,
                password,
                role: Some(role),
            })
            .await,
        )?,
        Commands::Login { username, password } => {
            report(api.login(LoginRequest { username, password }).await)?
        }
        Commands::Refresh {
            username,
            refresh_token,
        } => report(
            api.refresh(TokenRefreshRequest {
                username,
                refresh_token,
            })
            .await,
        )?,
        Commands::Logout {
            username,
            refresh_token,
        } => report(
            api.logout(LogoutRequest {
                username,
                refresh_token,
            })
            .await
            .map(|()| serde_json::json!({ "loggedOut": true })),
        )?,
        Commands::Inspect { access_token } => report(api.inspect(&access_token))?,
    };

    Ok(exit)
}

/// Print the result as JSON on stdout. Errors become `{"error": {...}}` and a failing exit code.
fn report<T: Serialize>(result: Result<T, ApiError>) -> Result<ExitCode, serde_json::Error> {
    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "error": err.detail() }))?
            );
            Ok(ExitCode::from(exit_code(&err)))
        }
    }
}

fn parse_role(s: &str) -> Result<UserRole, String> {
    s.parse().map_err(|e: latchkey_core::AuthError| e.to_string())
}

fn exit_code(err: &ApiError) -> u8 {
    match err {
        ApiError::Unauthorized => 3,
        ApiError::Conflict(_) | ApiError::BadRequest(_) => 4,
        ApiError::Internal => 1,
    }
}
