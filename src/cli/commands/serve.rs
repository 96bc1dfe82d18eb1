use anyhow::Result;
use clap::Args;

use crate::models::Config;
use crate::server;

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, short = 'b', help = "Address to listen on (e.g. 0.0.0.0:8000)")]
    pub bind: Option<String>,
}

pub async fn handle_serve(args: ServeArgs) -> Result<()> {
    let mut config = Config::load()?.config;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    server::serve(config).await
}
