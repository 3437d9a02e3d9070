use std::process;

use anyhow::{Context, Result};
use blogd::config::server::ServerConfig;
use blogd::config::ConfigArgs;
use blogd::recycle;
use clap::Parser;
use log::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct ServerArgs {
    /// Print server configuration data (JSON) and exit.
    #[arg(long)]
    pub print_config: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

async fn run(args: ServerArgs) -> Result<()> {
    let cfg: ServerConfig = args.config.load("server")?;

    if args.print_config {
        let json = serde_json::to_string_pretty(&cfg).context("encode config to json")?;
        println!("{json}");
        return Ok(());
    }

    cfg.logs.init("blogd")?;

    let ctx = cfg.build_ctx()?;
    ctx.seed_admin()?;

    let restful_server = cfg.build_restful_server(ctx.clone())?;

    tokio::spawn(async move {
        recycle::start_recycle(ctx).await;
    });

    restful_server.run().await.context("run restful server")?;

    info!("Server exited by user");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = ServerArgs::parse();
    if let Err(e) = run(args).await {
        error!("Error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
