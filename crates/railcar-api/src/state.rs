use railcar_core::model::{BatchResult, CityDirectory};
use railcar_core::process_batch;
use railcar_repository::{
    PostgresRepository, RepositoryError, TripDetail, TripRepository, TripSummary,
};
use tracing::error;

pub struct AppState {
    repository: PostgresRepository,
}

impl AppState {
    pub fn new(repository: PostgresRepository) -> Self {
        Self { repository }
    }

    /// Run one upload through the pipeline and atomically replace the stored
    /// batch. Per-event anomalies surface only as counters; a parse failure
    /// or a persistence failure yields `success=false` with the prior stored
    /// state intact.
    pub async fn process_upload(&self, input: &[u8]) -> BatchResult {
        let cities = match self.repository.load_cities().await {
            Ok(cities) => cities,
            Err(err) => {
                error!(%err, "failed to load city directory");
                return BatchResult::failure(format!("failed to load city directory: {err}"));
            }
        };
        let directory = CityDirectory::new(cities);

        let batch = match process_batch(input, &directory) {
            Ok(batch) => batch,
            Err(err) => return BatchResult::failure(format!("error processing file: {err}")),
        };

        if let Err(err) = self.repository.replace_batch(&batch.trips).await {
            error!(%err, "failed to persist batch");
            return BatchResult::failure(format!("failed to persist batch: {err}"));
        }

        batch.result()
    }

    pub async fn list_trips(&self) -> Result<Vec<TripSummary>, RepositoryError> {
        self.repository.list_trips().await
    }

    pub async fn fetch_trip(&self, id: i32) -> Result<Option<TripDetail>, RepositoryError> {
        self.repository.fetch_trip(id).await
    }
}
