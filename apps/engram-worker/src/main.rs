use clap::Parser;

use engram_worker::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	engram_worker::run(args).await
}
