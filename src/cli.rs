use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "marktforge", about = "Marketplace account registration pipeline")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the Google account pool
    Accounts {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Manage the proxy pool
    Proxies {
        #[command(subcommand)]
        action: ProxyAction,
    },
    /// Inspect and prune registration tasks
    Tasks {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Pair idle accounts with idle proxies into waiting tasks
    Start {
        /// Max pairs to create this call (defaults to config pair_limit)
        #[arg(short, long)]
        limit: Option<i64>,
    },
    /// Claim and run waiting tasks, one at a time
    Process {
        /// How many tasks to process before returning
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,
    },
    /// Show pool and task counts
    Status,
    /// Key-value automation settings
    Settings {
        #[command(subcommand)]
        action: SettingAction,
    },
}

#[derive(Subcommand)]
pub enum AccountAction {
    /// List all pooled accounts
    List,
    /// Bulk import from a file of `email:password` lines
    Import {
        #[arg(short, long)]
        file: String,
    },
    /// Delete one account
    Delete { id: i64 },
    /// Run the Google sign-in liveness probe for one account
    Check { id: i64 },
}

#[derive(Subcommand)]
pub enum ProxyAction {
    /// List all pooled proxies
    List,
    /// Bulk import from a file of `host:port[:user:pass]` lines
    Import {
        #[arg(short, long)]
        file: String,
    },
    /// Delete one proxy
    Delete { id: i64 },
    /// Probe one proxy through the IP-echo endpoint
    Check { id: i64 },
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// List all tasks with their joined account/proxy info
    List,
    /// Show one task in full, including its step log
    Show { id: i64 },
    /// Delete one task, releasing its account and proxy back to the pool
    Delete { id: i64 },
    /// Delete all tasks
    Clear,
}

#[derive(Subcommand)]
pub enum SettingAction {
    /// List all settings
    List,
    /// Upsert one setting
    Set { key: String, value: String },
}
