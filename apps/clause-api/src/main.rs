use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = clause_api::Args::parse();

	clause_api::run(args).await
}
