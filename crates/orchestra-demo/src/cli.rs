use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "orchestra-demo")]
#[command(author, version, about = "Synthetic traffic generator for orchestra-gateway", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fire synthetic requests at a running gateway's `/v1/requests`
    GenerateTraffic {
        /// Gateway base URL
        #[arg(short, long, default_value = "http://127.0.0.1:8080")]
        target: String,

        /// Requests per second
        #[arg(short, long, default_value = "5")]
        rate: u32,

        /// Duration in seconds (0 = run until Ctrl-C)
        #[arg(short, long, default_value = "30")]
        duration: u64,

        /// Request-type templates to draw from (comma-separated: general,coding,financial,pii)
        #[arg(long, default_value = "general,coding,financial,pii")]
        templates: String,

        /// Internal service secret header value, if the gateway requires one
        #[arg(long)]
        service_secret: Option<String>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Execute a named workflow once and print the resulting execution
    RunWorkflow {
        /// Gateway base URL
        #[arg(short, long, default_value = "http://127.0.0.1:8080")]
        target: String,

        /// Workflow name, as registered under `workflows_dir`
        #[arg(short, long)]
        workflow: String,

        /// JSON object merged into the workflow's declared input
        #[arg(short, long, default_value = "{}")]
        input: String,

        /// Internal service secret header value, if the gateway requires one
        #[arg(long)]
        service_secret: Option<String>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}
