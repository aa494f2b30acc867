//! Postgres persistence for processed railcar trips.
//!
//! A batch run replaces the entire stored set of trips and events inside one
//! database transaction, so a concurrent reader sees either the previous
//! batch or the new one, never a partial mix.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use railcar_core::model::{describe_event_code, City, Trip};
use serde::{Deserialize, Serialize};
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] MigrateError),
}

/// List-view row: one trip with resolved city names, hours rounded to two
/// decimals for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TripSummary {
    pub id: i32,
    pub equipment_id: String,
    pub origin_city_id: i32,
    pub origin_city_name: String,
    pub destination_city_id: i32,
    pub destination_city_name: String,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub total_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TripEventView {
    pub id: i32,
    pub equipment_id: String,
    pub event_code: String,
    pub event_description: String,
    pub event_time_utc: DateTime<Utc>,
    pub event_time_local: NaiveDateTime,
    pub city_id: i32,
    pub city_name: String,
}

/// Detail view: a trip plus its events ordered by UTC time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TripDetail {
    pub trip: TripSummary,
    pub events: Vec<TripEventView>,
}

#[async_trait]
pub trait TripRepository: Send + Sync {
    /// Load the full city directory, once per batch.
    async fn load_cities(&self) -> Result<Vec<City>, RepositoryError>;

    /// Atomically replace every stored trip and event with the given batch.
    async fn replace_batch(&self, trips: &[Trip]) -> Result<(), RepositoryError>;

    /// All trips, ordered by equipment id then start time.
    async fn list_trips(&self) -> Result<Vec<TripSummary>, RepositoryError>;

    /// One trip with its ordered events, `None` when absent.
    async fn fetch_trip(&self, id: i32) -> Result<Option<TripDetail>, RepositoryError>;
}

#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TripRepository for PostgresRepository {
    async fn load_cities(&self) -> Result<Vec<City>, RepositoryError> {
        let rows = sqlx::query(r#"SELECT id, name, time_zone FROM cities"#)
            .fetch_all(&self.pool)
            .await?;

        let mut cities = Vec::with_capacity(rows.len());
        for row in rows {
            cities.push(City {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                time_zone: row.try_get("time_zone")?,
            });
        }
        Ok(cities)
    }

    async fn replace_batch(&self, trips: &[Trip]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM equipment_events")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM trips").execute(&mut *tx).await?;

        for trip in trips {
            let row = sqlx::query(
                r#"
                INSERT INTO trips (
                    equipment_id,
                    origin_city_id,
                    destination_city_id,
                    start_utc,
                    end_utc,
                    total_hours
                ) VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                "#,
            )
            .bind(&trip.equipment_id)
            .bind(trip.origin_city_id)
            .bind(trip.destination_city_id)
            .bind(trip.start_utc)
            .bind(trip.end_utc)
            .bind(trip.total_hours)
            .fetch_one(&mut *tx)
            .await?;
            let trip_id: i32 = row.try_get("id")?;

            for event in &trip.events {
                sqlx::query(
                    r#"
                    INSERT INTO equipment_events (
                        equipment_id,
                        event_code,
                        event_time_local,
                        event_time_utc,
                        city_id,
                        trip_id
                    ) VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(&event.equipment_id)
                .bind(&event.event_code)
                .bind(event.event_time_local)
                .bind(event.event_time_utc)
                .bind(event.city_id)
                .bind(trip_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        tracing::info!(trips = trips.len(), "replaced stored batch");
        Ok(())
    }

    async fn list_trips(&self) -> Result<Vec<TripSummary>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT
                t.id,
                t.equipment_id,
                t.origin_city_id,
                o.name AS origin_city_name,
                t.destination_city_id,
                d.name AS destination_city_name,
                t.start_utc,
                t.end_utc,
                t.total_hours
            FROM trips t
            JOIN cities o ON o.id = t.origin_city_id
            JOIN cities d ON d.id = t.destination_city_id
            ORDER BY t.equipment_id, t.start_utc
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut trips = Vec::with_capacity(rows.len());
        for row in rows {
            trips.push(trip_summary_from_row(&row)?);
        }
        Ok(trips)
    }

    async fn fetch_trip(&self, id: i32) -> Result<Option<TripDetail>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                t.id,
                t.equipment_id,
                t.origin_city_id,
                o.name AS origin_city_name,
                t.destination_city_id,
                d.name AS destination_city_name,
                t.start_utc,
                t.end_utc,
                t.total_hours
            FROM trips t
            JOIN cities o ON o.id = t.origin_city_id
            JOIN cities d ON d.id = t.destination_city_id
            WHERE t.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let trip = trip_summary_from_row(&row)?;

        let event_rows = sqlx::query(
            r#"
            SELECT
                e.id,
                e.equipment_id,
                e.event_code,
                e.event_time_utc,
                e.event_time_local,
                e.city_id,
                c.name AS city_name
            FROM equipment_events e
            JOIN cities c ON c.id = e.city_id
            WHERE e.trip_id = $1
            ORDER BY e.event_time_utc
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(event_rows.len());
        for row in event_rows {
            let event_code: String = row.try_get("event_code")?;
            events.push(TripEventView {
                id: row.try_get("id")?,
                equipment_id: row.try_get("equipment_id")?,
                event_description: describe_event_code(&event_code).to_string(),
                event_code,
                event_time_utc: row.try_get("event_time_utc")?,
                event_time_local: row.try_get("event_time_local")?,
                city_id: row.try_get("city_id")?,
                city_name: row.try_get("city_name")?,
            });
        }

        Ok(Some(TripDetail { trip, events }))
    }
}

fn trip_summary_from_row(row: &sqlx::postgres::PgRow) -> Result<TripSummary, RepositoryError> {
    let total_hours: f64 = row.try_get("total_hours")?;
    Ok(TripSummary {
        id: row.try_get("id")?,
        equipment_id: row.try_get("equipment_id")?,
        origin_city_id: row.try_get("origin_city_id")?,
        origin_city_name: row.try_get("origin_city_name")?,
        destination_city_id: row.try_get("destination_city_id")?,
        destination_city_name: row.try_get("destination_city_name")?,
        start_utc: row.try_get("start_utc")?,
        end_utc: row.try_get("end_utc")?,
        total_hours: (total_hours * 100.0).round() / 100.0,
    })
}
