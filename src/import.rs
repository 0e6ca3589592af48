// 📥 Bulk load from the four donation CSV exports
//
// Headers are the database column names and rows carry their own ids, so a
// directory of exports recreates the database exactly. The whole load runs in
// one transaction: a bad row leaves the previous data untouched.

use crate::db::{recreate_schema, Database, DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::entities::{ClaimStatus, FoodType, MealType, Provider, ProviderType, Receiver};
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use log::info;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const PROVIDERS_FILE: &str = "providers_data.csv";
pub const RECEIVERS_FILE: &str = "receivers_data.csv";
pub const LISTINGS_FILE: &str = "food_listings_data.csv";
pub const CLAIMS_FILE: &str = "claims_data.csv";

/// Date layouts seen in exports; the first is the storage format
const DATE_LAYOUTS: [&str; 3] = [DATE_FORMAT, "%m/%d/%Y", "%d-%m-%Y"];

const TIMESTAMP_LAYOUTS: [&str; 5] = [
    TIMESTAMP_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Rows loaded per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub providers: usize,
    pub receivers: usize,
    pub listings: usize,
    pub claims: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.providers + self.receivers + self.listings + self.claims
    }
}

/// Listing row as exported; dates are normalized before insert
#[derive(Debug, Deserialize)]
struct ListingRow {
    #[serde(rename = "Food_ID")]
    id: i64,
    #[serde(rename = "Food_Name")]
    food_name: String,
    #[serde(rename = "Quantity")]
    quantity: i64,
    #[serde(rename = "Expiry_Date")]
    expiry_date: String,
    #[serde(rename = "Provider_ID")]
    provider_id: i64,
    #[serde(rename = "Provider_Type")]
    provider_type: ProviderType,
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Food_Type")]
    food_type: FoodType,
    #[serde(rename = "Meal_Type")]
    meal_type: MealType,
}

#[derive(Debug, Deserialize)]
struct ClaimRow {
    #[serde(rename = "Claim_ID")]
    id: i64,
    #[serde(rename = "Food_ID")]
    food_id: i64,
    #[serde(rename = "Receiver_ID")]
    receiver_id: i64,
    #[serde(rename = "Status")]
    status: ClaimStatus,
    #[serde(rename = "Timestamp")]
    timestamp: String,
}

/// Deserialize every row of a CSV file, reporting the failing line
pub fn load_csv<T: DeserializeOwned>(csv_path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;

    let mut rows = Vec::new();
    for (index, result) in rdr.deserialize().enumerate() {
        // +2: header is line 1
        let row: T = result.with_context(|| {
            format!("{} line {}: failed to parse row", csv_path.display(), index + 2)
        })?;
        rows.push(row);
    }

    Ok(rows)
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(value, layout).ok())
        .with_context(|| format!("Unrecognized date '{}'", value))
}

pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
        .with_context(|| format!("Unrecognized timestamp '{}'", value))
}

/// Replace the database contents with the four CSV files found in `dir`
pub fn import_directory(db: &Database, dir: &Path) -> Result<ImportSummary> {
    let providers: Vec<Provider> = load_csv(&dir.join(PROVIDERS_FILE))?;
    let receivers: Vec<Receiver> = load_csv(&dir.join(RECEIVERS_FILE))?;
    let listings: Vec<ListingRow> = load_csv(&dir.join(LISTINGS_FILE))?;
    let claims: Vec<ClaimRow> = load_csv(&dir.join(CLAIMS_FILE))?;

    // Parse everything up front so the transaction only sees clean rows
    let mut expiry_dates = Vec::with_capacity(listings.len());
    for row in &listings {
        if row.quantity < 1 {
            bail!(
                "{}: listing {} has quantity {}, expected at least 1",
                LISTINGS_FILE,
                row.id,
                row.quantity
            );
        }
        let date = parse_date(&row.expiry_date)
            .with_context(|| format!("{}: listing {}", LISTINGS_FILE, row.id))?;
        expiry_dates.push(date);
    }

    let mut timestamps = Vec::with_capacity(claims.len());
    for row in &claims {
        let ts = parse_timestamp(&row.timestamp)
            .with_context(|| format!("{}: claim {}", CLAIMS_FILE, row.id))?;
        timestamps.push(ts);
    }

    let summary = db
        .transaction(|conn| {
            recreate_schema(conn)?;
            Ok(ImportSummary {
                providers: insert_providers(conn, &providers)?,
                receivers: insert_receivers(conn, &receivers)?,
                listings: insert_listings(conn, &listings, &expiry_dates)?,
                claims: insert_claims(conn, &claims, &timestamps)?,
            })
        })
        .with_context(|| format!("Failed to import {}", dir.display()))?;

    info!(
        "imported {} rows from {}: {} providers, {} receivers, {} listings, {} claims",
        summary.total(),
        dir.display(),
        summary.providers,
        summary.receivers,
        summary.listings,
        summary.claims
    );

    Ok(summary)
}

fn insert_providers(conn: &Connection, providers: &[Provider]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO providers (Provider_ID, Name, Type, Address, City, Contact)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for p in providers {
        stmt.execute(params![p.id, p.name, p.provider_type, p.address, p.city, p.contact])?;
    }
    Ok(providers.len())
}

fn insert_receivers(conn: &Connection, receivers: &[Receiver]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO receivers (Receiver_ID, Name, Type, City, Contact)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for r in receivers {
        stmt.execute(params![r.id, r.name, r.receiver_type, r.city, r.contact])?;
    }
    Ok(receivers.len())
}

fn insert_listings(
    conn: &Connection,
    listings: &[ListingRow],
    expiry_dates: &[NaiveDate],
) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO food_listings (
            Food_ID, Food_Name, Quantity, Expiry_Date, Provider_ID,
            Provider_Type, Location, Food_Type, Meal_Type
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for (row, expiry) in listings.iter().zip(expiry_dates) {
        stmt.execute(params![
            row.id,
            row.food_name,
            row.quantity,
            expiry.format(DATE_FORMAT).to_string(),
            row.provider_id,
            row.provider_type,
            row.location,
            row.food_type,
            row.meal_type,
        ])?;
    }
    Ok(listings.len())
}

fn insert_claims(
    conn: &Connection,
    claims: &[ClaimRow],
    timestamps: &[NaiveDateTime],
) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT INTO claims (Claim_ID, Food_ID, Receiver_ID, Status, Timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (row, ts) in claims.iter().zip(timestamps) {
        stmt.execute(params![
            row.id,
            row.food_id,
            row.receiver_id,
            row.status,
            ts.format(TIMESTAMP_FORMAT).to_string(),
        ])?;
    }
    Ok(claims.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crud::{find, read_all};
    use crate::db::Table;
    use crate::entities::{Claim, FoodListing};
    use std::fs;

    fn write_exports(dir: &Path, listings: &str) {
        fs::write(
            dir.join(PROVIDERS_FILE),
            "Provider_ID,Name,Type,Address,City,Contact\n\
             1,Acme Bakery,Bakery,1 Main St,Springfield,555-0100\n\
             2,Green Grocer,Grocery Store,9 Elm St,Shelbyville,555-0101\n",
        )
        .unwrap();
        fs::write(
            dir.join(RECEIVERS_FILE),
            "Receiver_ID,Name,Type,City,Contact\n\
             1,Food Bank,NGO,Springfield,555-0199\n",
        )
        .unwrap();
        fs::write(dir.join(LISTINGS_FILE), listings).unwrap();
        fs::write(
            dir.join(CLAIMS_FILE),
            "Claim_ID,Food_ID,Receiver_ID,Status,Timestamp\n\
             1,1,1,Pending,2025-03-05 14:30:00\n\
             2,2,1,Completed,3/6/2025 9:15\n",
        )
        .unwrap();
    }

    const LISTINGS: &str = "Food_ID,Food_Name,Quantity,Expiry_Date,Provider_ID,Provider_Type,Location,Food_Type,Meal_Type\n\
        1,Bread,10,2025-03-17,1,Bakery,Springfield,Vegetarian,Breakfast\n\
        2,Chicken,4,3/18/2025,2,Grocery Store,Shelbyville,Non-Vegetarian,Dinner\n";

    #[test]
    fn test_import_directory_loads_all_tables() {
        let dir = tempfile::tempdir().unwrap();
        write_exports(dir.path(), LISTINGS);
        let db = Database::open_in_memory().unwrap();

        let summary = import_directory(&db, dir.path()).unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                providers: 2,
                receivers: 1,
                listings: 2,
                claims: 2
            }
        );
        assert_eq!(summary.total(), 7);
        assert_eq!(db.count(Table::FoodListing).unwrap(), 2);

        // Slash dates are normalized to the storage format
        let chicken = find::<FoodListing>(&db, 2).unwrap().unwrap();
        assert_eq!(chicken.expiry_date, NaiveDate::from_ymd_opt(2025, 3, 18).unwrap());
        assert_eq!(chicken.provider_type, ProviderType::GroceryStore);

        let claims = read_all::<Claim>(&db).unwrap();
        assert_eq!(claims[1].status, ClaimStatus::Completed);
        assert_eq!(
            claims[1].timestamp,
            NaiveDate::from_ymd_opt(2025, 3, 6).unwrap().and_hms_opt(9, 15, 0).unwrap()
        );
    }

    #[test]
    fn test_bad_row_leaves_existing_data() {
        let dir = tempfile::tempdir().unwrap();
        write_exports(dir.path(), LISTINGS);
        let db = Database::open_in_memory().unwrap();
        import_directory(&db, dir.path()).unwrap();

        let broken = "Food_ID,Food_Name,Quantity,Expiry_Date,Provider_ID,Provider_Type,Location,Food_Type,Meal_Type\n\
            1,Bread,10,2025-03-17,1,Bakery,Springfield,Pescatarian,Breakfast\n";
        write_exports(dir.path(), broken);

        let err = import_directory(&db, dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
        assert_eq!(db.count(Table::FoodListing).unwrap(), 2);
        assert_eq!(db.count(Table::Provider).unwrap(), 2);
    }

    #[test]
    fn test_duplicate_ids_name_the_constraint_once() {
        let dir = tempfile::tempdir().unwrap();
        write_exports(dir.path(), LISTINGS);
        fs::write(
            dir.path().join(PROVIDERS_FILE),
            "Provider_ID,Name,Type,Address,City,Contact\n\
             1,Acme Bakery,Bakery,1 Main St,Springfield,555-0100\n\
             1,Acme Again,Bakery,2 Main St,Springfield,555-0102\n",
        )
        .unwrap();
        let db = Database::open_in_memory().unwrap();

        let err = import_directory(&db, dir.path()).unwrap_err();
        let chain = format!("{:#}", err);
        assert!(chain.contains("database error"));
        assert_eq!(
            chain.matches("UNIQUE constraint failed: providers.Provider_ID").count(),
            1,
            "{}",
            chain
        );
        assert_eq!(db.count(Table::Provider).unwrap(), 0);
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let listings = "Food_ID,Food_Name,Quantity,Expiry_Date,Provider_ID,Provider_Type,Location,Food_Type,Meal_Type\n\
            1,Bread,0,2025-03-17,1,Bakery,Springfield,Vegetarian,Breakfast\n";
        write_exports(dir.path(), listings);
        let db = Database::open_in_memory().unwrap();

        assert!(import_directory(&db, dir.path()).is_err());
        assert_eq!(db.count(Table::Provider).unwrap(), 0);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();

        let err = import_directory(&db, dir.path()).unwrap_err();
        assert!(err.to_string().contains(PROVIDERS_FILE));
    }

    #[test]
    fn test_date_layouts() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(parse_date("2025-03-07").unwrap(), expected);
        assert_eq!(parse_date("3/7/2025").unwrap(), expected);
        assert_eq!(parse_date(" 07-03-2025 ").unwrap(), expected);
        assert!(parse_date("March 7th").is_err());

        assert!(parse_timestamp("2025-03-07T10:00:00").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }
}
