//! CLI argument definitions.

use clap::{Parser, Subcommand, ValueEnum};

use campus_core::Role;

/// Command line client for a campus LMS server.
#[derive(Parser, Debug)]
#[command(name = "campus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// API base URL (falls back to the CAMPUS_API_URL environment variable)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and log into it
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long, value_enum, default_value = "student")]
        role: RoleArg,
    },
    /// End the current session
    Logout,
    /// Show the currently logged-in user
    Whoami,
    /// Open a realtime chat for a dialog
    Chat {
        /// Dialog identifier
        dialog_id: i64,
    },
}

/// Self-service roles. Admin accounts are provisioned server-side.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum RoleArg {
    Student,
    Teacher,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Student => Role::Student,
            RoleArg::Teacher => Role::Teacher,
        }
    }
}
