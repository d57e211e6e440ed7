pub mod template;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use lateclone::config::Config;

#[derive(Parser)]
#[command(name = "lateclone")]
#[command(about = "Inspect and clean up saved UVM templates", long_about = None)]
pub struct Cli {
    /// Path to the config file (defaults to $LATECLONE_CONFIG or the usual locations)
    #[arg(long = "config", short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Saved template management
    #[command(subcommand)]
    Template(TemplateCommand),
}

#[derive(Subcommand)]
pub enum TemplateCommand {
    /// List saved templates (short: ls)
    #[command(alias = "ls")]
    List,

    /// Print the saved config of a template
    Get(GetTemplateArgs),

    /// Remove the saved config of a template (short: rm)
    #[command(alias = "rm")]
    Remove(TemplateIdArgs),
}

#[derive(Clone, Debug, Args)]
pub struct TemplateIdArgs {
    /// Id of the template (the id of the source VM)
    pub id: String,
}

#[derive(Clone, Debug, Args)]
pub struct GetTemplateArgs {
    /// Id of the template (the id of the source VM)
    pub id: String,

    /// Print the whole config as JSON
    #[arg(long = "json")]
    pub json: bool,
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config).await?;

    match cli.command {
        Command::Template(cmd) => match cmd {
            TemplateCommand::List => template::run_list_templates(&config).await,
            TemplateCommand::Get(args) => template::run_get_template(&config, args).await,
            TemplateCommand::Remove(args) => template::run_remove_template(&config, args).await,
        },
    }
}
