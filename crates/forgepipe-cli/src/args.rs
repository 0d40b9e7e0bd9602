use clap::{Parser, Subcommand};

/// forgepipe - build-pipeline orchestrator for AI-generated applications
#[derive(Parser)]
#[command(name = "forgepipe")]
#[command(about = "Drives a project spec through clarification, codegen, and deployment stages")]
#[command(version)]
pub struct Cli {
    /// Control API base URL, for every command except `serve`
    #[arg(long, global = true, default_value = "http://127.0.0.1:8420")]
    pub api_url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the full pipeline stack in this process and serve the Control API
    Serve {
        /// Host to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind
        #[arg(long, default_value_t = 8420)]
        port: u16,

        /// Directory artifacts are written under
        #[arg(long, default_value = "./forgepipe-data/artifacts")]
        work_dir: String,
    },

    /// Start a new build from a spec file
    Start {
        /// Path to the project spec, as JSON
        spec_path: String,

        #[arg(long)]
        tenant: String,

        #[arg(long)]
        user: String,

        #[arg(long)]
        project: String,
    },

    /// Show a build's current state
    Status {
        build_id: String,

        /// Emit the raw JSON response instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// List every build the server knows about
    List {
        #[arg(long)]
        json: bool,
    },

    /// Request cancellation of a running build
    Cancel { build_id: String },

    /// Clone a terminal build's spec into a fresh build and run it again
    Retry { build_id: String },

    /// Reset one stage and everything after it, then resume from there
    RetryStage {
        build_id: String,

        /// Stage number to resume from, e.g. 3 or 3.5
        #[arg(long)]
        from: f64,
    },

    /// Stream a build's progress events to stdout until the build closes
    Watch { build_id: String },
}
