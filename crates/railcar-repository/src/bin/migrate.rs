use anyhow::{Context, Result};
use railcar_repository::PostgresRepository;

#[tokio::main]
async fn main() -> Result<()> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let repository = PostgresRepository::connect(&database_url, 2).await?;
    repository.run_migrations().await?;
    println!("migrations applied");
    Ok(())
}
