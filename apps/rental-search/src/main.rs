use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = rental_search::Args::parse();

	rental_search::run(args).await
}
