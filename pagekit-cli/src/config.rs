//! Command-line arguments and the connection settings derived from them.

use clap::{Parser, Subcommand};
use pagekit_core::ElementType;
use pagekit_sync::RetryConfig;

/// Command-line arguments for `pagekit`.
#[derive(Debug, Clone, Parser)]
#[command(name = "pagekit")]
#[command(about = "Edit page-builder projects against a remote repository")]
#[command(version)]
pub struct CliArgs {
    /// Base URL of the repository API
    #[arg(long, env = "PAGEKIT_API_URL", default_value = "http://localhost:3000/api")]
    pub api_url: String,

    /// Bearer token for the repository API
    #[arg(long, env = "PAGEKIT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Project the element commands operate on
    #[arg(long, env = "PAGEKIT_PROJECT")]
    pub project: Option<String>,

    /// Maximum attempts for idempotent reads
    #[arg(long, default_value = "5")]
    pub max_attempts: u32,

    #[command(subcommand)]
    pub command: Command,
}

/// What to do.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List projects
    Projects,

    /// Create a project
    NewProject {
        /// Display name
        name: String,

        /// Free-form description
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Print the element tree of the project
    Tree {
        /// Read a published scope instead of the project
        #[arg(long)]
        public: Option<String>,
    },

    /// Add an element from the palette
    Add {
        /// Element type (Text, Frame, Button, ...)
        #[arg(value_name = "TYPE")]
        element_type: ElementType,

        /// Drop onto this element instead of the canvas
        #[arg(long)]
        on: Option<String>,

        /// Pointer X
        #[arg(long, default_value = "0")]
        x: f64,

        /// Pointer Y
        #[arg(long, default_value = "0")]
        y: f64,
    },

    /// Apply a JSON patch to an element
    Update {
        /// Element id
        id: String,

        /// Patch, e.g. '{"content":"Hello","styles":{"color":"red"}}'
        #[arg(long)]
        patch: String,
    },

    /// Delete an element; its children move to the root
    Delete {
        /// Element id
        id: String,
    },

    /// Swap the order of two siblings
    Swap {
        /// First sibling
        first: String,

        /// Second sibling
        second: String,
    },
}

/// Resolved connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the repository API.
    pub api_url: String,
    /// Bearer token.
    pub token: Option<String>,
    /// Project scope.
    pub project: Option<String>,
    /// Retry policy for reads.
    pub retry: RetryConfig,
}

impl From<&CliArgs> for ClientConfig {
    fn from(args: &CliArgs) -> Self {
        Self {
            api_url: args.api_url.clone(),
            token: args.token.clone(),
            project: args.project.clone(),
            retry: RetryConfig {
                max_attempts: args.max_attempts.max(1),
                ..RetryConfig::default()
            },
        }
    }
}
