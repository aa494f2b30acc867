use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use railcar_core::model::CityDirectory;
use railcar_core::process_batch;
use railcar_repository::{PostgresRepository, TripRepository};

/// A CLI for the railcar trips pipeline.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Process an equipment events CSV file into trips, replacing the stored batch.
    Process {
        /// Path to the events CSV file.
        file: PathBuf,
    },
    /// List all processed trips.
    Trips,
    /// Show one trip with its ordered events.
    Trip { id: i32 },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let repository = PostgresRepository::connect(&database_url, 5).await?;
    repository.run_migrations().await?;

    match cli.command {
        Commands::Process { file } => {
            let contents = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;

            let cities = repository.load_cities().await?;
            let directory = CityDirectory::new(cities);

            let batch = match process_batch(&contents, &directory) {
                Ok(batch) => batch,
                Err(err) => {
                    eprintln!("ERROR: {err}");
                    std::process::exit(1);
                }
            };

            repository.replace_batch(&batch.trips).await?;

            let result = batch.result();
            println!(
                "Processed {} events into {} trips ({} orphaned events)",
                result.events_processed, result.trips_created, result.orphaned_events
            );
        }
        Commands::Trips => {
            let trips = repository.list_trips().await?;
            let mut table = Table::new();
            table.set_header([
                "Id",
                "Equipment",
                "Origin",
                "Destination",
                "Start (UTC)",
                "End (UTC)",
                "Hours",
            ]);
            for trip in &trips {
                table.add_row([
                    trip.id.to_string(),
                    trip.equipment_id.clone(),
                    trip.origin_city_name.clone(),
                    trip.destination_city_name.clone(),
                    trip.start_utc.to_rfc3339(),
                    trip.end_utc.to_rfc3339(),
                    format!("{:.2}", trip.total_hours),
                ]);
            }
            println!("{table}");
            println!("{} trips", trips.len());
        }
        Commands::Trip { id } => {
            let Some(detail) = repository.fetch_trip(id).await? else {
                eprintln!("trip {id} not found");
                std::process::exit(1);
            };

            let trip = &detail.trip;
            println!(
                "Trip {}: {} from {} to {} ({:.2} h)",
                trip.id,
                trip.equipment_id,
                trip.origin_city_name,
                trip.destination_city_name,
                trip.total_hours
            );

            let mut table = Table::new();
            table.set_header(["Code", "Description", "City", "Local Time", "UTC Time"]);
            for event in &detail.events {
                table.add_row([
                    event.event_code.clone(),
                    event.event_description.clone(),
                    event.city_name.clone(),
                    event.event_time_local.to_string(),
                    event.event_time_utc.to_rfc3339(),
                ]);
            }
            println!("{table}");
        }
    }

    Ok(())
}
