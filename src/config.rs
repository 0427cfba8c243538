use clap::Parser;
use std::env;

/// Command-line flags; each one overrides its environment variable
#[derive(Debug, Default, Parser)]
#[command(version, about = "New-tab sync server")]
pub struct Cli {
    /// Administrator username
    #[arg(long)]
    pub user: Option<String>,

    /// Administrator password
    #[arg(long)]
    pub pwd: Option<String>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Path of the SQLite database file
    #[arg(long)]
    pub db: Option<String>,

    /// Directory for daily log files
    #[arg(long = "log-dir")]
    pub log_dir: Option<String>,

    /// Days of log files to keep, 0 keeps them forever
    #[arg(long = "log-keep-days")]
    pub log_keep_days: Option<u32>,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_path: String,
    pub database_max_connections: u32,
    pub allowed_origins: Vec<String>,
    pub environment: String,
    pub app_secret_key: String,
    pub token_ttl_hours: i64,
    pub request_timeout_secs: u64,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub log_dir: String,
    pub log_keep_days: u32,
    /// Web front end: `index.html`, `favicon.ico` and assets under `/static`
    pub static_dir: String,
}

/// Value of the first variable in `names` that is set
///
/// Later names are legacy aliases (`ITAB_*`) kept for existing deployments.
fn first_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| env::var(name).ok())
}

fn string_var(names: &[&str], default: &str) -> String {
    first_var(names).unwrap_or_else(|| default.to_string())
}

fn parse_var<T: std::str::FromStr>(names: &[&str], default: &str) -> Result<T, String> {
    string_var(names, default)
        .parse()
        .map_err(|_| format!("Invalid {}", names.join("/")))
}

fn optional_var(names: &[&str]) -> Option<String> {
    first_var(names).filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists (development)
        dotenvy::dotenv().ok();

        let server_host = string_var(&["SERVER_HOST"], "0.0.0.0");
        let server_port = parse_var(&["SERVER_PORT", "ITAB_PORT"], "8445")?;

        let database_path = string_var(&["DATABASE_PATH", "ITAB_DB"], "./data/itab.db");
        let database_max_connections = parse_var(&["DATABASE_MAX_CONNECTIONS"], "5")?;

        let allowed_origins = string_var(&["ALLOWED_ORIGINS"], "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let environment = string_var(&["ENVIRONMENT"], "development");

        let app_secret_key = env::var("APP_SECRET_KEY")
            .map_err(|_| "APP_SECRET_KEY must be set for token signing")?;

        let token_ttl_hours = parse_var(&["TOKEN_TTL_HOURS"], "24")?;
        let request_timeout_secs = parse_var(&["REQUEST_TIMEOUT_SECS"], "30")?;

        let log_dir = string_var(&["LOG_DIR", "ITAB_LOG_DIR"], "./logs");
        let log_keep_days = parse_var(&["LOG_KEEP_DAYS", "ITAB_LOG_KEEP_DAYS"], "3")?;

        let static_dir = string_var(&["STATIC_DIR"], "./static");

        Ok(Config {
            server_host,
            server_port,
            database_path,
            database_max_connections,
            allowed_origins,
            environment,
            app_secret_key,
            token_ttl_hours,
            request_timeout_secs,
            admin_username: optional_var(&["ADMIN_USERNAME", "ITAB_USER"]),
            admin_password: optional_var(&["ADMIN_PASSWORD", "ITAB_PWD"]),
            log_dir,
            log_keep_days,
            static_dir,
        })
    }

    /// Apply command-line flags on top of the environment
    pub fn with_cli(mut self, cli: Cli) -> Self {
        if let Some(user) = cli.user.filter(|u| !u.is_empty()) {
            self.admin_username = Some(user);
        }
        if let Some(pwd) = cli.pwd.filter(|p| !p.is_empty()) {
            self.admin_password = Some(pwd);
        }
        if let Some(port) = cli.port {
            self.server_port = port;
        }
        if let Some(db) = cli.db {
            self.database_path = db;
        }
        if let Some(dir) = cli.log_dir {
            self.log_dir = dir;
        }
        if let Some(days) = cli.log_keep_days {
            self.log_keep_days = days;
        }
        self
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Administrator credentials, when both halves were supplied
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        match (&self.admin_username, &self.admin_password) {
            (Some(user), Some(pwd)) => Some((user.as_str(), pwd.as_str())),
            _ => None,
        }
    }
}
