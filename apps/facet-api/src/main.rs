use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = facet_api::Args::parse();

	facet_api::run(args).await
}
