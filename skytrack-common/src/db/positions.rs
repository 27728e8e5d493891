//! Position repository
//!
//! Track points are append-only. When reading a whole aircraft history the
//! rows are regrouped into logical flights: any gap longer than the
//! inactivity threshold starts a new segment, so a landed-then-departed
//! aircraft shows up as two flights even though the address is unchanged.

use super::flights::FLIGHT_INACTIVITY_GAP_MINUTES;
use crate::models::{Position, PositionReport};
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

/// Split a time-ordered slice of track points into flight segments.
///
/// A new segment begins whenever the gap between consecutive points
/// exceeds `gap`.
pub fn split_by_gap(points: &[Position], gap: Duration) -> Vec<Vec<Position>> {
    let mut segments: Vec<Vec<Position>> = Vec::new();

    for point in points {
        match segments.last_mut() {
            Some(segment) => {
                let last_ts = segment
                    .last()
                    .map(|p| p.timestamp)
                    .unwrap_or(point.timestamp);
                if point.timestamp - last_ts > gap {
                    segments.push(vec![point.clone()]);
                } else {
                    segment.push(point.clone());
                }
            }
            None => segments.push(vec![point.clone()]),
        }
    }

    segments
}

/// Repository for persisted track points
#[derive(Clone)]
pub struct PositionRepository {
    pool: SqlitePool,
}

impl PositionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a cycle's worth of track points in one transaction
    pub async fn insert_many(&self, positions: &[Position]) -> Result<()> {
        if positions.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for position in positions {
            sqlx::query(
                r#"
                INSERT INTO positions (flight_id, lat, lon, alt, gs, timestamp)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(position.flight_id.to_string())
            .bind(position.lat)
            .bind(position.lon)
            .bind(position.alt)
            .bind(position.gs)
            .bind(position.timestamp)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Latest persisted position per flight, shaped as position reports
    /// (used to warm the in-memory cache at feed startup).
    pub async fn last_positions(&self) -> Result<HashMap<Uuid, PositionReport>> {
        // MAX(timestamp) in the select list makes the bare columns resolve
        // to the newest row per flight (SQLite min/max bare-column rule).
        #[allow(clippy::type_complexity)]
        let rows: Vec<(String, String, Option<String>, f64, f64, Option<i32>, Option<f64>, DateTime<Utc>)> =
            sqlx::query_as(
                r#"
                SELECT p.flight_id, f.mode_s, f.callsign, p.lat, p.lon, p.alt, p.gs,
                       MAX(p.timestamp)
                FROM positions p
                JOIN flights f ON f.id = p.flight_id
                GROUP BY p.flight_id
                "#,
            )
            .fetch_all(&self.pool)
            .await?;

        let mut map = HashMap::with_capacity(rows.len());
        for (flight_id, mode_s, callsign, lat, lon, alt, gs, _ts) in rows {
            let Ok(id) = Uuid::parse_str(&flight_id) else {
                continue;
            };
            map.insert(
                id,
                PositionReport {
                    icao24: mode_s,
                    lat: Some(lat),
                    lon: Some(lon),
                    alt,
                    gs,
                    track: None,
                    callsign,
                    category: None,
                },
            );
        }
        Ok(map)
    }

    /// Full track history of one aircraft address, regrouped into logical
    /// flight segments by the inactivity gap.
    pub async fn segments_for_aircraft(&self, mode_s: &str) -> Result<Vec<Vec<Position>>> {
        let rows: Vec<(String, f64, f64, Option<i32>, Option<f64>, DateTime<Utc>)> =
            sqlx::query_as(
                r#"
                SELECT p.flight_id, p.lat, p.lon, p.alt, p.gs, p.timestamp
                FROM positions p
                JOIN flights f ON f.id = p.flight_id
                WHERE f.mode_s = ?
                ORDER BY p.timestamp ASC
                "#,
            )
            .bind(mode_s.trim().to_ascii_uppercase())
            .fetch_all(&self.pool)
            .await?;

        let points: Vec<Position> = rows
            .into_iter()
            .filter_map(|(flight_id, lat, lon, alt, gs, timestamp)| {
                Some(Position {
                    flight_id: Uuid::parse_str(&flight_id).ok()?,
                    lat,
                    lon,
                    alt,
                    gs,
                    timestamp,
                })
            })
            .collect();

        Ok(split_by_gap(
            &points,
            Duration::minutes(FLIGHT_INACTIVITY_GAP_MINUTES),
        ))
    }

    /// Delete track points older than `cutoff` (retention sweep)
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM positions WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of stored track points
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM positions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::FlightRepository;
    use crate::models::Flight;

    fn point(flight_id: Uuid, minute: i64, base: DateTime<Utc>) -> Position {
        Position {
            flight_id,
            lat: 47.0 + minute as f64 * 0.01,
            lon: 8.0,
            alt: Some(30000),
            gs: Some(420.0),
            timestamp: base + Duration::minutes(minute),
        }
    }

    #[test]
    fn test_split_by_gap_twenty_minute_gap_splits() {
        let base = Utc::now();
        let id = Uuid::new_v4();
        // k = index 2; 20-minute gap between k and k+1
        let points = vec![
            point(id, 0, base),
            point(id, 1, base),
            point(id, 2, base),
            point(id, 22, base),
            point(id, 23, base),
        ];

        let segments = split_by_gap(&points, Duration::minutes(15));
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].len(), 3);
        assert_eq!(segments[1].len(), 2);
    }

    #[test]
    fn test_split_by_gap_ten_minute_gap_does_not_split() {
        let base = Utc::now();
        let id = Uuid::new_v4();
        let points = vec![point(id, 0, base), point(id, 10, base), point(id, 11, base)];

        let segments = split_by_gap(&points, Duration::minutes(15));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].len(), 3);
    }

    #[test]
    fn test_split_by_gap_empty() {
        assert!(split_by_gap(&[], Duration::minutes(15)).is_empty());
    }

    #[tokio::test]
    async fn test_insert_and_last_positions() {
        let pool = test_pool().await;
        let flight_repo = FlightRepository::new(pool.clone());
        let repo = PositionRepository::new(pool);

        let now = Utc::now();
        let flight = Flight::new("4B1617", Some("SWR123".to_string()), false, now, None);
        flight_repo
            .upsert_many(std::slice::from_ref(&flight))
            .await
            .unwrap();

        repo.insert_many(&[point(flight.id, 0, now), point(flight.id, 1, now)])
            .await
            .unwrap();

        let last = repo.last_positions().await.unwrap();
        assert_eq!(last.len(), 1);
        let report = &last[&flight.id];
        assert_eq!(report.icao24, "4B1617");
        // Latest of the two points
        assert_eq!(report.lat, Some(47.01));
    }

    #[tokio::test]
    async fn test_segments_for_aircraft_splits_on_gap() {
        let pool = test_pool().await;
        let flight_repo = FlightRepository::new(pool.clone());
        let repo = PositionRepository::new(pool);

        let now = Utc::now();
        let flight = Flight::new("4B1617", None, false, now, None);
        flight_repo
            .upsert_many(std::slice::from_ref(&flight))
            .await
            .unwrap();

        repo.insert_many(&[
            point(flight.id, 0, now),
            point(flight.id, 5, now),
            point(flight.id, 25, now),
        ])
        .await
        .unwrap();

        let segments = repo.segments_for_aircraft("4B1617").await.unwrap();
        assert_eq!(segments.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_older_than() {
        let pool = test_pool().await;
        let flight_repo = FlightRepository::new(pool.clone());
        let repo = PositionRepository::new(pool);

        let now = Utc::now();
        let flight = Flight::new("4B1617", None, false, now, None);
        flight_repo
            .upsert_many(std::slice::from_ref(&flight))
            .await
            .unwrap();

        repo.insert_many(&[point(flight.id, -120, now), point(flight.id, 0, now)])
            .await
            .unwrap();

        let deleted = repo.delete_older_than(now - Duration::hours(1)).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
