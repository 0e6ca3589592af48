// 🗄️ Schema & Storage
//
// One SQLite connection, owned by `Database` and passed explicitly to every
// operation. Column names match the donation CSV exports so files
// produced by earlier tooling keep working.

use crate::error::{Result, ValidationError};
use log::debug;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Storage format of `Expiry_Date`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage format of `Timestamp` (second precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// TABLES
// ============================================================================

/// The closed set of tables the core knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    Provider,
    Receiver,
    FoodListing,
    Claim,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Provider,
        Table::Receiver,
        Table::FoodListing,
        Table::Claim,
    ];

    /// SQL table name
    pub fn name(&self) -> &'static str {
        match self {
            Table::Provider => "providers",
            Table::Receiver => "receivers",
            Table::FoodListing => "food_listings",
            Table::Claim => "claims",
        }
    }

    /// Primary key column
    pub fn primary_key(&self) -> &'static str {
        match self {
            Table::Provider => "Provider_ID",
            Table::Receiver => "Receiver_ID",
            Table::FoodListing => "Food_ID",
            Table::Claim => "Claim_ID",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Table::Provider => "Provider",
            Table::Receiver => "Receiver",
            Table::FoodListing => "Food listing",
            Table::Claim => "Claim",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Table {
    type Err = ValidationError;

    /// Accepts the SQL name ("food_listings") or a singular form ("listing")
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "providers" | "provider" => Ok(Table::Provider),
            "receivers" | "receiver" => Ok(Table::Receiver),
            "food_listings" | "food_listing" | "listings" | "listing" => Ok(Table::FoodListing),
            "claims" | "claim" => Ok(Table::Claim),
            other => Err(ValidationError::new(
                "table",
                format!("Unknown table '{}'", other),
            )),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS providers (
        Provider_ID INTEGER PRIMARY KEY,
        Name TEXT NOT NULL,
        Type TEXT NOT NULL,
        Address TEXT NOT NULL,
        City TEXT NOT NULL,
        Contact TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS receivers (
        Receiver_ID INTEGER PRIMARY KEY,
        Name TEXT NOT NULL,
        Type TEXT NOT NULL,
        City TEXT NOT NULL,
        Contact TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS food_listings (
        Food_ID INTEGER PRIMARY KEY,
        Food_Name TEXT NOT NULL,
        Quantity INTEGER NOT NULL CHECK (Quantity >= 1),
        Expiry_Date DATE NOT NULL,
        Provider_ID INTEGER NOT NULL,
        Provider_Type TEXT NOT NULL,
        Location TEXT NOT NULL,
        Food_Type TEXT NOT NULL,
        Meal_Type TEXT NOT NULL,
        FOREIGN KEY (Provider_ID) REFERENCES providers(Provider_ID)
    );

    CREATE TABLE IF NOT EXISTS claims (
        Claim_ID INTEGER PRIMARY KEY,
        Food_ID INTEGER NOT NULL,
        Receiver_ID INTEGER NOT NULL,
        Status TEXT NOT NULL CHECK (Status IN ('Pending', 'Completed', 'Cancelled')),
        Timestamp DATETIME NOT NULL,
        FOREIGN KEY (Food_ID) REFERENCES food_listings(Food_ID),
        FOREIGN KEY (Receiver_ID) REFERENCES receivers(Receiver_ID)
    );

    CREATE INDEX IF NOT EXISTS idx_listings_expiry ON food_listings(Expiry_Date);
    CREATE INDEX IF NOT EXISTS idx_listings_provider ON food_listings(Provider_ID);
    CREATE INDEX IF NOT EXISTS idx_claims_food ON claims(Food_ID);
    CREATE INDEX IF NOT EXISTS idx_claims_status ON claims(Status);
";

const DROP_TABLES: &str = "
    DROP TABLE IF EXISTS claims;
    DROP TABLE IF EXISTS food_listings;
    DROP TABLE IF EXISTS receivers;
    DROP TABLE IF EXISTS providers;
";

/// Drop and recreate the four tables on an open connection or transaction
pub(crate) fn recreate_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(DROP_TABLES)?;
    conn.execute_batch(CREATE_TABLES)
}

// ============================================================================
// DATABASE
// ============================================================================

/// Storage context handed to every query and command
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;

        // WAL for crash recovery on file-backed databases
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Database { conn };
        db.setup_schema()?;
        debug!("opened database at {}", path.as_ref().display());
        Ok(db)
    }

    /// Fresh in-memory database, used by tests and scratch sessions
    pub fn open_in_memory() -> Result<Self> {
        let db = Database {
            conn: Connection::open_in_memory()?,
        };
        db.setup_schema()?;
        Ok(db)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create the four tables if missing
    ///
    /// Foreign keys are declared for documentation only. Enforcement stays off
    /// so deleting a provider leaves its listings in place.
    pub fn setup_schema(&self) -> Result<()> {
        self.conn.pragma_update(None, "foreign_keys", false)?;
        self.conn.execute_batch(CREATE_TABLES)?;
        Ok(())
    }

    /// Drop every table and recreate an empty schema
    pub fn reset_schema(&self) -> Result<()> {
        self.transaction(|conn| {
            recreate_schema(conn)?;
            Ok(())
        })
    }

    /// Run `f` inside one transaction
    ///
    /// Commits when `f` succeeds. Any error drops the transaction, which rolls
    /// back every statement it issued; the connection stays usable.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Row count of a table
    pub fn count(&self, table: Table) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let count = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DonationError;

    #[test]
    fn test_schema_creates_empty_tables() {
        let db = Database::open_in_memory().unwrap();

        for table in Table::ALL {
            assert_eq!(db.count(table).unwrap(), 0, "{} should start empty", table);
        }

        // Running setup again is harmless
        db.setup_schema().unwrap();
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();

        let result: Result<()> = db.transaction(|conn| {
            conn.execute(
                "INSERT INTO receivers (Name, Type, City, Contact) VALUES ('A', 'NGO', 'X', '1')",
                [],
            )?;
            // Second statement violates the status CHECK constraint
            conn.execute(
                "INSERT INTO claims (Food_ID, Receiver_ID, Status, Timestamp)
                 VALUES (1, 1, 'Lost', '2024-01-01 00:00:00')",
                [],
            )?;
            Ok(())
        });

        assert!(matches!(result, Err(DonationError::Storage(_))));
        assert_eq!(db.count(Table::Receiver).unwrap(), 0);
        assert_eq!(db.count(Table::Claim).unwrap(), 0);

        // Connection is still usable afterwards
        db.transaction(|conn| {
            conn.execute(
                "INSERT INTO receivers (Name, Type, City, Contact) VALUES ('B', 'NGO', 'X', '1')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        assert_eq!(db.count(Table::Receiver).unwrap(), 1);
    }

    #[test]
    fn test_reset_schema_clears_rows() {
        let db = Database::open_in_memory().unwrap();
        db.connection()
            .execute(
                "INSERT INTO providers (Name, Type, Address, City, Contact)
                 VALUES ('Acme', 'Bakery', '1 Main St', 'X', '555')",
                [],
            )
            .unwrap();
        assert_eq!(db.count(Table::Provider).unwrap(), 1);

        db.reset_schema().unwrap();
        assert_eq!(db.count(Table::Provider).unwrap(), 0);
    }

    #[test]
    fn test_table_parsing() {
        assert_eq!("providers".parse::<Table>().unwrap(), Table::Provider);
        assert_eq!("food-listings".parse::<Table>().unwrap(), Table::FoodListing);
        assert_eq!("Claim".parse::<Table>().unwrap(), Table::Claim);
        assert!("donors".parse::<Table>().is_err());
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("food_donation.db");

        {
            let db = Database::open(&path).unwrap();
            db.connection()
                .execute(
                    "INSERT INTO receivers (Name, Type, City, Contact) VALUES ('A', 'NGO', 'X', '1')",
                    [],
                )
                .unwrap();
        }

        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.count(Table::Receiver).unwrap(), 1);
    }
}
