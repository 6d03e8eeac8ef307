use clap::{Parser, Subcommand};
use clap_verbosity_flag::Verbosity;

use crate::commands;

/// Styles for CLI
fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .literal(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::BrightCyan))),
    )
    .usage(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
}

/// Provision instances for Splunk and manage Splunk through its REST API
#[derive(Debug, Parser)]
#[command(author, about, version)]
#[command(propagate_version = true)]
#[command(styles=get_styles())]
pub struct Cli {
  #[command(subcommand)]
  pub command: Commands,

  #[clap(flatten)]
  pub verbose: Verbosity,

  /// AWS region; falls back to AWS_DEFAULT_REGION and then the default provider chain
  #[arg(long, global = true, env = "AWS_REGION")]
  pub region: Option<String>,

  /// Disable colored log output
  #[arg(long, global = true)]
  pub no_color: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
  /// Launch and manage EC2 instances
  Instance(commands::instance::Instance),

  /// Check or install the SSM agent on an instance
  Agent(commands::agent::Agent),

  /// Run shell commands on an instance through SSM
  Command(commands::command::Command),

  /// Deploy and configure Splunk on an instance
  Splunk(commands::splunk::Splunk),

  /// Manage Splunk indexes
  Index(commands::index::Index),

  /// Run Splunk searches
  Search(commands::search::Search),

  /// Manage Splunk apps
  App(commands::app::App),

  /// Restart or inspect the Splunk server
  Server(commands::server::Server),

  /// Move artifacts to and from S3
  Object(commands::object::Object),

  /// Manage CloudWatch alarms for an instance
  Alarm(commands::alarm::Alarm),
}
