// 📈 Analytics Engine
//
// Read-only aggregates behind the dashboard. Anything time-dependent takes
// `now` explicitly so results are reproducible.

use crate::db::{Database, Table, TIMESTAMP_FORMAT};
use crate::entities::{ClaimStatus, ProviderType};
use crate::error::Result;
use chrono::NaiveDateTime;
use rusqlite::{params, Params, Row};
use serde::Serialize;

/// Listings expiring within this many days count as "expiring soon"
pub const EXPIRING_WINDOW_DAYS: i64 = 3;

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub providers: i64,
    pub receivers: i64,
    pub listings: i64,
    pub claims: i64,
}

/// Row count for one value of a grouping column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub label: String,
    pub count: i64,
}

/// Listing count and summed quantity for one city or provider type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuantityTotals {
    pub label: String,
    pub listings: i64,
    pub total_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderPerformance {
    pub provider_id: i64,
    pub name: String,
    pub provider_type: ProviderType,
    pub total_listings: i64,
    pub total_quantity: i64,
    pub total_claims: i64,
}

/// Headline numbers for the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSnapshot {
    pub counts: EntityCounts,
    pub waste_prevented_pct: f64,
    pub avg_claim_age_days: Option<f64>,
    pub active_listings: i64,
    pub expiring_soon: i64,
    pub pending_claims: i64,
    pub completed_today: i64,
    pub active_receivers: i64,
}

// ============================================================================
// HELPERS
// ============================================================================

fn scalar<P: Params>(db: &Database, sql: &str, params: P) -> Result<i64> {
    let value = db.connection().query_row(sql, params, |row| row.get(0))?;
    Ok(value)
}

fn rows<T, F>(db: &Database, sql: &str, map: F) -> Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = db.connection().prepare(sql)?;
    let result = stmt
        .query_map([], map)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(result)
}

fn group_count(row: &Row<'_>) -> rusqlite::Result<GroupCount> {
    Ok(GroupCount {
        label: row.get(0)?,
        count: row.get(1)?,
    })
}

fn stamp(now: NaiveDateTime) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// `part / total * 100`, 0 when `total` is 0
pub fn percentage(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

// ============================================================================
// COUNTS & DISTRIBUTIONS
// ============================================================================

pub fn entity_counts(db: &Database) -> Result<EntityCounts> {
    Ok(EntityCounts {
        providers: db.count(Table::Provider)?,
        receivers: db.count(Table::Receiver)?,
        listings: db.count(Table::FoodListing)?,
        claims: db.count(Table::Claim)?,
    })
}

pub fn providers_by_type(db: &Database) -> Result<Vec<GroupCount>> {
    rows(
        db,
        "SELECT Type, COUNT(*) AS n FROM providers GROUP BY Type ORDER BY n DESC, Type",
        group_count,
    )
}

pub fn claims_by_status(db: &Database) -> Result<Vec<GroupCount>> {
    rows(
        db,
        "SELECT Status, COUNT(*) AS n FROM claims GROUP BY Status ORDER BY n DESC, Status",
        group_count,
    )
}

pub fn listings_by_food_type(db: &Database) -> Result<Vec<GroupCount>> {
    rows(
        db,
        "SELECT Food_Type, COUNT(*) AS n FROM food_listings
         GROUP BY Food_Type ORDER BY n DESC, Food_Type",
        group_count,
    )
}

/// Listing count and quantity per city, largest quantity first
pub fn quantity_by_city(db: &Database) -> Result<Vec<QuantityTotals>> {
    rows(
        db,
        "SELECT Location, COUNT(*), COALESCE(SUM(Quantity), 0) AS total
         FROM food_listings
         GROUP BY Location
         ORDER BY total DESC, Location",
        |row| {
            Ok(QuantityTotals {
                label: row.get(0)?,
                listings: row.get(1)?,
                total_quantity: row.get(2)?,
            })
        },
    )
}

/// Listings and quantity per provider type (providers without listings count 0)
pub fn provider_type_totals(db: &Database) -> Result<Vec<QuantityTotals>> {
    rows(
        db,
        "SELECT p.Type, COUNT(fl.Food_ID), COALESCE(SUM(fl.Quantity), 0) AS total
         FROM providers p
         LEFT JOIN food_listings fl ON p.Provider_ID = fl.Provider_ID
         GROUP BY p.Type
         ORDER BY total DESC, p.Type",
        |row| {
            Ok(QuantityTotals {
                label: row.get(0)?,
                listings: row.get(1)?,
                total_quantity: row.get(2)?,
            })
        },
    )
}

/// Claims per receiver type (receivers without claims count 0)
pub fn receiver_type_claims(db: &Database) -> Result<Vec<GroupCount>> {
    rows(
        db,
        "SELECT r.Type, COUNT(c.Claim_ID) AS n
         FROM receivers r
         LEFT JOIN claims c ON r.Receiver_ID = c.Receiver_ID
         GROUP BY r.Type
         ORDER BY n DESC, r.Type",
        group_count,
    )
}

// ============================================================================
// RATIOS & TIME WINDOWS
// ============================================================================

/// Share of listed quantity whose listing has at least one Completed claim
///
/// Each listing counts once no matter how many completed claims it has.
pub fn waste_prevented_pct(db: &Database) -> Result<f64> {
    let total = scalar(
        db,
        "SELECT COALESCE(SUM(Quantity), 0) FROM food_listings",
        [],
    )?;
    let claimed = scalar(
        db,
        "SELECT COALESCE(SUM(fl.Quantity), 0)
         FROM food_listings fl
         WHERE EXISTS (
             SELECT 1 FROM claims c WHERE c.Food_ID = fl.Food_ID AND c.Status = ?1
         )",
        params![ClaimStatus::Completed],
    )?;

    Ok(percentage(claimed, total))
}

/// Mean days between creation and `now` over Completed claims
pub fn avg_claim_age_days(db: &Database, now: NaiveDateTime) -> Result<Option<f64>> {
    let avg = db.connection().query_row(
        "SELECT AVG(julianday(?1) - julianday(Timestamp)) FROM claims WHERE Status = ?2",
        params![stamp(now), ClaimStatus::Completed],
        |row| row.get(0),
    )?;
    Ok(avg)
}

/// Listings whose expiry date is on or before `now + days`
///
/// Already-expired listings are included.
pub fn expiring_within(db: &Database, now: NaiveDateTime, days: i64) -> Result<i64> {
    scalar(
        db,
        "SELECT COUNT(*) FROM food_listings WHERE DATE(Expiry_Date) <= DATE(?1, ?2)",
        params![stamp(now), format!("{:+} days", days)],
    )
}

pub fn expiring_soon(db: &Database, now: NaiveDateTime) -> Result<i64> {
    expiring_within(db, now, EXPIRING_WINDOW_DAYS)
}

/// Completed claims whose timestamp falls on the calendar day of `now`
pub fn completed_today(db: &Database, now: NaiveDateTime) -> Result<i64> {
    scalar(
        db,
        "SELECT COUNT(*) FROM claims WHERE Status = ?1 AND DATE(Timestamp) = DATE(?2)",
        params![ClaimStatus::Completed, stamp(now)],
    )
}

/// Listings with no Completed claim yet
pub fn active_listings(db: &Database) -> Result<i64> {
    scalar(
        db,
        "SELECT COUNT(*)
         FROM food_listings fl
         LEFT JOIN claims c ON fl.Food_ID = c.Food_ID AND c.Status = ?1
         WHERE c.Food_ID IS NULL",
        params![ClaimStatus::Completed],
    )
}

pub fn claims_with_status(db: &Database, status: ClaimStatus) -> Result<i64> {
    scalar(
        db,
        "SELECT COUNT(*) FROM claims WHERE Status = ?1",
        params![status],
    )
}

pub fn pending_claims(db: &Database) -> Result<i64> {
    claims_with_status(db, ClaimStatus::Pending)
}

/// Distinct receivers with at least one claim
pub fn active_receivers(db: &Database) -> Result<i64> {
    scalar(db, "SELECT COUNT(DISTINCT Receiver_ID) FROM claims", [])
}

// ============================================================================
// PROVIDER RANKING
// ============================================================================

/// Providers ranked by total listed quantity
///
/// Every provider appears; those without listings or claims report zeros.
pub fn top_providers(db: &Database, limit: i64) -> Result<Vec<ProviderPerformance>> {
    let mut stmt = db.connection().prepare(
        "SELECT p.Provider_ID, p.Name, p.Type,
                COALESCE(l.listings, 0) AS total_listings,
                COALESCE(l.quantity, 0) AS total_quantity,
                COALESCE(cl.claims, 0) AS total_claims
         FROM providers p
         LEFT JOIN (
             SELECT Provider_ID, COUNT(*) AS listings, SUM(Quantity) AS quantity
             FROM food_listings
             GROUP BY Provider_ID
         ) l ON l.Provider_ID = p.Provider_ID
         LEFT JOIN (
             SELECT fl.Provider_ID, COUNT(*) AS claims
             FROM claims c
             JOIN food_listings fl ON c.Food_ID = fl.Food_ID
             GROUP BY fl.Provider_ID
         ) cl ON cl.Provider_ID = p.Provider_ID
         ORDER BY total_quantity DESC, p.Provider_ID ASC
         LIMIT ?1",
    )?;

    let ranking = stmt
        .query_map([limit], |row| {
            Ok(ProviderPerformance {
                provider_id: row.get(0)?,
                name: row.get(1)?,
                provider_type: row.get(2)?,
                total_listings: row.get(3)?,
                total_quantity: row.get(4)?,
                total_claims: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(ranking)
}

// ============================================================================
// SNAPSHOT
// ============================================================================

pub fn kpi_snapshot(db: &Database, now: NaiveDateTime) -> Result<KpiSnapshot> {
    Ok(KpiSnapshot {
        counts: entity_counts(db)?,
        waste_prevented_pct: waste_prevented_pct(db)?,
        avg_claim_age_days: avg_claim_age_days(db, now)?,
        active_listings: active_listings(db)?,
        expiring_soon: expiring_soon(db, now)?,
        pending_claims: pending_claims(db)?,
        completed_today: completed_today(db, now)?,
        active_receivers: active_receivers(db)?,
    })
}
