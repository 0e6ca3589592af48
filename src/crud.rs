// ⚙️ CRUD Engine
//
// Generic create/read/update/delete over the four entities. Each entity
// implements `Entity`; the `Record` enum covers the cases where the table is
// only known at runtime (e.g. a shell letting the user pick one).
//
// Every mutation is one transaction: validate, write, commit.
// Update/delete of a missing key returns `NotFound` instead of silently
// touching zero rows. Deletes never cascade.

use crate::db::{Database, Table};
use crate::entities::{Claim, FoodListing, Provider, Receiver};
use crate::error::{DonationError, Result, ValidationError};
use log::{info, warn};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

// ============================================================================
// ENTITY TRAIT
// ============================================================================

/// CRUD capability shared by every table
pub trait Entity: Sized {
    const TABLE: Table;

    /// SELECT column list, primary key first
    const COLUMNS: &'static str;

    /// Payload for create
    type Draft;

    /// Payload for update
    type Patch;

    fn id(&self) -> i64;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Check a draft against the current state (empty = valid)
    fn validate_draft(conn: &Connection, draft: &Self::Draft) -> Result<Vec<ValidationError>>;

    fn validate_patch(conn: &Connection, patch: &Self::Patch) -> Result<Vec<ValidationError>>;

    /// INSERT an already-validated draft, returning the new primary key
    fn insert(conn: &Connection, draft: &Self::Draft) -> Result<i64>;

    /// UPDATE by primary key, returning affected rows
    fn apply_patch(conn: &Connection, id: i64, patch: &Self::Patch) -> Result<usize>;
}

fn reject(table: Table, errors: Vec<ValidationError>) -> DonationError {
    warn!(
        "rejected {} write: {}",
        table,
        errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    );
    DonationError::Validation(errors)
}

// ============================================================================
// GENERIC OPERATIONS
// ============================================================================

/// Validate and insert a new row, returning its id
pub fn create<E: Entity>(db: &Database, draft: &E::Draft) -> Result<i64> {
    db.transaction(|conn| {
        let errors = E::validate_draft(conn, draft)?;
        if !errors.is_empty() {
            return Err(reject(E::TABLE, errors));
        }

        let id = E::insert(conn, draft)?;
        info!("created {} {}", E::TABLE, id);
        Ok(id)
    })
}

/// All rows ordered by primary key
pub fn read_all<E: Entity>(db: &Database) -> Result<Vec<E>> {
    let sql = format!(
        "SELECT {} FROM {} ORDER BY {}",
        E::COLUMNS,
        E::TABLE.name(),
        E::TABLE.primary_key()
    );

    let mut stmt = db.connection().prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| E::from_row(row))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// One row by primary key
pub fn find<E: Entity>(db: &Database, id: i64) -> Result<Option<E>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?1",
        E::COLUMNS,
        E::TABLE.name(),
        E::TABLE.primary_key()
    );

    let found = db
        .connection()
        .query_row(&sql, [id], |row| E::from_row(row))
        .optional()?;

    Ok(found)
}

/// Overwrite a row's mutable fields
pub fn update<E: Entity>(db: &Database, id: i64, patch: &E::Patch) -> Result<()> {
    db.transaction(|conn| {
        let errors = E::validate_patch(conn, patch)?;
        if !errors.is_empty() {
            return Err(reject(E::TABLE, errors));
        }

        if E::apply_patch(conn, id, patch)? == 0 {
            return Err(DonationError::NotFound { table: E::TABLE, id });
        }

        info!("updated {} {}", E::TABLE, id);
        Ok(())
    })
}

/// Delete a row; dependent rows are left untouched
pub fn delete<E: Entity>(db: &Database, id: i64) -> Result<()> {
    delete_from(db, E::TABLE, id)
}

/// Whether `id` exists in `table`
pub fn exists(conn: &Connection, table: Table, id: i64) -> Result<bool> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)",
        table.name(),
        table.primary_key()
    );
    let found: bool = conn.query_row(&sql, [id], |row| row.get(0))?;
    Ok(found)
}

// ============================================================================
// RUNTIME TABLE DISPATCH
// ============================================================================

/// A row from any of the four tables
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Provider(Provider),
    Receiver(Receiver),
    FoodListing(FoodListing),
    Claim(Claim),
}

impl Record {
    pub fn table(&self) -> Table {
        match self {
            Record::Provider(_) => Table::Provider,
            Record::Receiver(_) => Table::Receiver,
            Record::FoodListing(_) => Table::FoodListing,
            Record::Claim(_) => Table::Claim,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Record::Provider(p) => p.id(),
            Record::Receiver(r) => r.id(),
            Record::FoodListing(f) => f.id(),
            Record::Claim(c) => c.id(),
        }
    }
}

/// Every row of `table`, ordered by primary key
pub fn read_table(db: &Database, table: Table) -> Result<Vec<Record>> {
    let records = match table {
        Table::Provider => read_all::<Provider>(db)?
            .into_iter()
            .map(Record::Provider)
            .collect(),
        Table::Receiver => read_all::<Receiver>(db)?
            .into_iter()
            .map(Record::Receiver)
            .collect(),
        Table::FoodListing => read_all::<FoodListing>(db)?
            .into_iter()
            .map(Record::FoodListing)
            .collect(),
        Table::Claim => read_all::<Claim>(db)?
            .into_iter()
            .map(Record::Claim)
            .collect(),
    };

    Ok(records)
}

/// Delete by primary key from a table chosen at runtime
pub fn delete_from(db: &Database, table: Table, id: i64) -> Result<()> {
    db.transaction(|conn| {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            table.name(),
            table.primary_key()
        );

        if conn.execute(&sql, [id])? == 0 {
            return Err(DonationError::NotFound { table, id });
        }

        info!("deleted {} {}", table, id);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        FoodListingDraft, FoodType, MealType, ProviderDraft, ProviderType, ReceiverDraft,
        ReceiverType,
    };
    use chrono::NaiveDate;

    fn bakery(name: &str) -> ProviderDraft {
        ProviderDraft::new(name, ProviderType::Bakery, "1 Main St", "X", "555-0100")
    }

    fn bread(provider_id: i64, quantity: i64) -> FoodListingDraft {
        FoodListingDraft {
            food_name: "Bread".to_string(),
            quantity,
            expiry_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            provider_id,
            location: "X".to_string(),
            food_type: FoodType::Vegetarian,
            meal_type: MealType::Breakfast,
        }
    }

    #[test]
    fn test_create_then_read_back() {
        let db = Database::open_in_memory().unwrap();

        let first = create::<Provider>(&db, &bakery("Acme")).unwrap();
        let second = create::<Provider>(&db, &bakery("Zenith")).unwrap();
        assert!(second > first);

        let providers = read_all::<Provider>(&db).unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].id, first);
        assert_eq!(providers[0].name, "Acme");
        assert_eq!(providers[1].name, "Zenith");

        let found = find::<Provider>(&db, first).unwrap().unwrap();
        assert_eq!(found.provider_type, ProviderType::Bakery);
        assert!(find::<Provider>(&db, 999).unwrap().is_none());
    }

    #[test]
    fn test_create_rejects_missing_fields_without_writing() {
        let db = Database::open_in_memory().unwrap();

        let err = create::<Provider>(&db, &bakery("   ")).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.validation_errors()[0].field, "Name");
        assert_eq!(db.count(Table::Provider).unwrap(), 0);
    }

    #[test]
    fn test_listing_requires_existing_provider() {
        let db = Database::open_in_memory().unwrap();

        let err = create::<FoodListing>(&db, &bread(7, 10)).unwrap_err();
        assert_eq!(err.validation_errors()[0].field, "Provider_ID");
        assert_eq!(db.count(Table::FoodListing).unwrap(), 0);
    }

    #[test]
    fn test_listing_rejects_non_positive_quantity() {
        let db = Database::open_in_memory().unwrap();
        let provider = create::<Provider>(&db, &bakery("Acme")).unwrap();

        let err = create::<FoodListing>(&db, &bread(provider, 0)).unwrap_err();
        assert_eq!(err.validation_errors()[0].field, "Quantity");
        assert_eq!(db.count(Table::FoodListing).unwrap(), 0);
    }

    #[test]
    fn test_listing_snapshots_provider_type() {
        let db = Database::open_in_memory().unwrap();
        let provider = create::<Provider>(&db, &bakery("Acme")).unwrap();
        let listing = create::<FoodListing>(&db, &bread(provider, 10)).unwrap();

        // Provider changes type after the listing was written
        let mut changed = bakery("Acme");
        changed.provider_type = ProviderType::Supermarket;
        update::<Provider>(&db, provider, &changed).unwrap();

        let stored = find::<FoodListing>(&db, listing).unwrap().unwrap();
        assert_eq!(stored.provider_type, ProviderType::Bakery, "snapshot is not resynced");

        // Rewriting the listing takes a fresh snapshot
        update::<FoodListing>(&db, listing, &bread(provider, 12)).unwrap();
        let rewritten = find::<FoodListing>(&db, listing).unwrap().unwrap();
        assert_eq!(rewritten.provider_type, ProviderType::Supermarket);
        assert_eq!(rewritten.quantity, 12);
    }

    #[test]
    fn test_update_and_delete_missing_key_report_not_found() {
        let db = Database::open_in_memory().unwrap();

        let err = update::<Provider>(&db, 41, &bakery("Ghost")).unwrap_err();
        assert!(matches!(
            err,
            DonationError::NotFound { table: Table::Provider, id: 41 }
        ));

        let err = delete::<Receiver>(&db, 5).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_deleting_provider_leaves_orphaned_listings() {
        let db = Database::open_in_memory().unwrap();
        let provider = create::<Provider>(&db, &bakery("Acme")).unwrap();
        let listing = create::<FoodListing>(&db, &bread(provider, 10)).unwrap();

        delete::<Provider>(&db, provider).unwrap();

        assert_eq!(db.count(Table::Provider).unwrap(), 0);
        let orphan = find::<FoodListing>(&db, listing).unwrap().unwrap();
        assert_eq!(orphan.provider_id, provider);
    }

    #[test]
    fn test_runtime_dispatch() {
        let db = Database::open_in_memory().unwrap();
        create::<Provider>(&db, &bakery("Acme")).unwrap();
        let receiver = create::<Receiver>(
            &db,
            &ReceiverDraft::new("Food Bank", ReceiverType::Ngo, "X", "555-0199"),
        )
        .unwrap();

        let records = read_table(&db, Table::Receiver).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].table(), Table::Receiver);
        assert_eq!(records[0].id(), receiver);

        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(json["Name"], "Food Bank");

        delete_from(&db, Table::Receiver, receiver).unwrap();
        assert!(read_table(&db, Table::Receiver).unwrap().is_empty());
        assert_eq!(read_table(&db, Table::Provider).unwrap().len(), 1);
    }
}
