use anyhow::Result;
use clap::Parser;
use splunkops::{get_sdk_config, Cli, Commands};
use tracing_log::AsTrace;
use tracing_subscriber::FmtSubscriber;

#[cfg(not(tarpaulin_include))]
#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let subscriber = FmtSubscriber::builder()
    .with_max_level(cli.verbose.log_level_filter().as_trace())
    .without_time()
    .with_ansi(!cli.no_color)
    .finish();
  tracing::subscriber::set_global_default(subscriber).expect("Setting default subscriber failed");

  let config = get_sdk_config(cli.region.clone()).await?;

  match &cli.command {
    Commands::Instance(instance) => instance.run(&config).await,
    Commands::Agent(agent) => agent.run(&config).await,
    Commands::Command(command) => command.run(&config).await,
    Commands::Splunk(splunk) => splunk.run(&config).await,
    Commands::Index(index) => index.run(&config).await,
    Commands::Search(search) => search.run(&config).await,
    Commands::App(app) => app.run(&config).await,
    Commands::Server(server) => server.run(&config).await,
    Commands::Object(object) => object.run(&config).await,
    Commands::Alarm(alarm) => alarm.run(&config).await,
  }
}
