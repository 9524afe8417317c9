use cinder_miner::config::Config;
use cinder_miner::daemon::Daemon;
use cinder_miner::tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing::init_journald_or_stdout();

    let config = Config::from_env();
    Daemon::new().run(config).await
}
