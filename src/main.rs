//! Main entry point for the TF (TraceFinder) CLI application.

use chrono::Utc;
use clap::Parser;
use tf::{app::App, cli::Args, error::Result};

fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    let config = tf::cli::Config::from_args(args, Utc::now())?;
    let app = App::new(config);
    app.run()
}
