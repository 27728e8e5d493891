//! Flight repository

use crate::models::Flight;
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Inactivity gap that ends a flight: a position stream silent for longer
/// than this starts a new flight record for the same aircraft.
pub const FLIGHT_INACTIVITY_GAP_MINUTES: i64 = 15;

type FlightRow = (
    String,                // id
    String,                // mode_s
    Option<String>,        // callsign
    Option<String>,        // airline_icao
    bool,                  // is_military
    DateTime<Utc>,         // first_contact
    DateTime<Utc>,         // last_contact
    Option<DateTime<Utc>>, // expires_at
);

fn from_row(row: FlightRow) -> Option<Flight> {
    Some(Flight {
        id: Uuid::parse_str(&row.0).ok()?,
        mode_s: row.1,
        callsign: row.2,
        airline_icao: row.3,
        is_military: row.4,
        first_contact: row.5,
        last_contact: row.6,
        expires_at: row.7,
    })
}

/// Repository for flight lifecycle records
#[derive(Clone)]
pub struct FlightRepository {
    pool: SqlitePool,
}

impl FlightRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Bulk-upsert a cycle's worth of flight records in one transaction.
    /// Idempotent: re-running the same batch yields the same rows.
    pub async fn upsert_many(&self, flights: &[Flight]) -> Result<()> {
        if flights.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for flight in flights {
            sqlx::query(
                r#"
                INSERT INTO flights
                    (id, mode_s, callsign, airline_icao, is_military,
                     first_contact, last_contact, expires_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    callsign = excluded.callsign,
                    airline_icao = excluded.airline_icao,
                    last_contact = excluded.last_contact,
                    expires_at = excluded.expires_at
                "#,
            )
            .bind(flight.id.to_string())
            .bind(&flight.mode_s)
            .bind(&flight.callsign)
            .bind(&flight.airline_icao)
            .bind(flight.is_military)
            .bind(flight.first_contact)
            .bind(flight.last_contact)
            .bind(flight.expires_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Flights with a contact at or after `since` (feed warm start)
    pub async fn recent(&self, since: DateTime<Utc>) -> Result<Vec<Flight>> {
        let rows: Vec<FlightRow> = sqlx::query_as(
            r#"
            SELECT id, mode_s, callsign, airline_icao, is_military,
                   first_contact, last_contact, expires_at
            FROM flights WHERE last_contact >= ?
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(from_row).collect())
    }

    /// Fetch one flight by id
    pub async fn get(&self, id: Uuid) -> Result<Option<Flight>> {
        let row: Option<FlightRow> = sqlx::query_as(
            r#"
            SELECT id, mode_s, callsign, airline_icao, is_military,
                   first_contact, last_contact, expires_at
            FROM flights WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(from_row))
    }

    /// Delete flights whose retention expiry has passed. Rows without an
    /// expiry (retention disabled at write time) are kept.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM flights WHERE expires_at IS NOT NULL AND expires_at < ?")
                .bind(now)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Number of stored flights
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM flights")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use chrono::Duration;

    fn flight(mode_s: &str, last_contact: DateTime<Utc>) -> Flight {
        let mut f = Flight::new(mode_s, Some("SWR123".to_string()), false, last_contact, None);
        f.last_contact = last_contact;
        f
    }

    #[tokio::test]
    async fn test_upsert_many_is_idempotent() {
        let repo = FlightRepository::new(test_pool().await);
        let now = Utc::now();
        let flights = vec![flight("4B1617", now), flight("AE1460", now)];

        repo.upsert_many(&flights).await.unwrap();
        repo.upsert_many(&flights).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_updates_contact_and_callsign() {
        let repo = FlightRepository::new(test_pool().await);
        let now = Utc::now();
        let mut f = flight("4B1617", now);
        repo.upsert_many(std::slice::from_ref(&f)).await.unwrap();

        f.touch(Some("SWR88P"), now + Duration::seconds(30));
        repo.upsert_many(std::slice::from_ref(&f)).await.unwrap();

        let stored = repo.get(f.id).await.unwrap().unwrap();
        assert_eq!(stored.callsign.as_deref(), Some("SWR88P"));
        assert!(stored.last_contact > now);
        // first_contact is not rewritten by the upsert
        assert_eq!(
            stored.first_contact.timestamp(),
            now.timestamp()
        );
    }

    #[tokio::test]
    async fn test_recent_filters_by_last_contact() {
        let repo = FlightRepository::new(test_pool().await);
        let now = Utc::now();
        repo.upsert_many(&[
            flight("4B1617", now),
            flight("AE1460", now - Duration::hours(2)),
        ])
        .await
        .unwrap();

        let recent = repo.recent(now - Duration::minutes(15)).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].mode_s, "4B1617");
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let repo = FlightRepository::new(test_pool().await);
        let now = Utc::now();

        let mut expired = flight("4B1617", now - Duration::hours(3));
        expired.expires_at = Some(now - Duration::hours(1));
        let mut live = flight("AE1460", now);
        live.expires_at = Some(now + Duration::hours(24));
        let unbounded = flight("3C6589", now);

        repo.upsert_many(&[expired, live, unbounded]).await.unwrap();

        let deleted = repo.delete_expired(now).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
