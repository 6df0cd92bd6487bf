use anyhow::Result;
use clap::Parser;
use mutuo::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run().await
}
