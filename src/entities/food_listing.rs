// 🥘 FoodListing - one donation offer with quantity and expiry
//
// Provider_Type is a snapshot: it is copied from the provider whenever the
// listing is written and is NOT refreshed when the provider changes later.

use super::{date_column, require_text, serde_format, text_enum, ProviderType};
use crate::crud::{exists, Entity};
use crate::db::{Table, DATE_FORMAT};
use crate::error::{Result, ValidationError};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

text_enum! {
    pub enum FoodType ("Food_Type") {
        Vegetarian => "Vegetarian",
        NonVegetarian => "Non-Vegetarian",
        Vegan => "Vegan",
    }
}

text_enum! {
    pub enum MealType ("Meal_Type") {
        Breakfast => "Breakfast",
        Lunch => "Lunch",
        Dinner => "Dinner",
        Snacks => "Snacks",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodListing {
    #[serde(rename = "Food_ID")]
    pub id: i64,

    #[serde(rename = "Food_Name")]
    pub food_name: String,

    #[serde(rename = "Quantity")]
    pub quantity: i64,

    #[serde(rename = "Expiry_Date", with = "serde_format::date")]
    pub expiry_date: NaiveDate,

    #[serde(rename = "Provider_ID")]
    pub provider_id: i64,

    /// Provider's type at the time the listing was written
    #[serde(rename = "Provider_Type")]
    pub provider_type: ProviderType,

    #[serde(rename = "Location")]
    pub location: String,

    #[serde(rename = "Food_Type")]
    pub food_type: FoodType,

    #[serde(rename = "Meal_Type")]
    pub meal_type: MealType,
}

/// Field set for creating or overwriting a listing
///
/// Provider_Type is absent on purpose; it is read from the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodListingDraft {
    #[serde(rename = "Food_Name")]
    pub food_name: String,

    #[serde(rename = "Quantity")]
    pub quantity: i64,

    #[serde(rename = "Expiry_Date", with = "serde_format::date")]
    pub expiry_date: NaiveDate,

    #[serde(rename = "Provider_ID")]
    pub provider_id: i64,

    #[serde(rename = "Location")]
    pub location: String,

    #[serde(rename = "Food_Type")]
    pub food_type: FoodType,

    #[serde(rename = "Meal_Type")]
    pub meal_type: MealType,
}

impl FoodListingDraft {
    /// Field checks that need no database access
    pub fn validate_fields(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        require_text(&mut errors, "Food_Name", &self.food_name);
        require_text(&mut errors, "Location", &self.location);

        if self.quantity < 1 {
            errors.push(ValidationError::new(
                "Quantity",
                format!("Must be at least 1, got {}", self.quantity),
            ));
        }

        errors
    }

    /// Field checks plus the provider reference
    pub fn validate(&self, conn: &Connection) -> Result<Vec<ValidationError>> {
        let mut errors = self.validate_fields();

        if !exists(conn, Table::Provider, self.provider_id)? {
            errors.push(ValidationError::new(
                "Provider_ID",
                format!("No provider with id {}", self.provider_id),
            ));
        }

        Ok(errors)
    }
}

/// Current type of a provider, the value snapshotted into listings
fn provider_type_of(conn: &Connection, provider_id: i64) -> Result<ProviderType> {
    let found: Option<ProviderType> = conn
        .query_row(
            "SELECT Type FROM providers WHERE Provider_ID = ?1",
            [provider_id],
            |row| row.get(0),
        )
        .optional()?;

    found.ok_or_else(|| {
        ValidationError::new("Provider_ID", format!("No provider with id {}", provider_id)).into()
    })
}

impl Entity for FoodListing {
    const TABLE: Table = Table::FoodListing;
    const COLUMNS: &'static str = "Food_ID, Food_Name, Quantity, Expiry_Date, Provider_ID, \
                                   Provider_Type, Location, Food_Type, Meal_Type";

    type Draft = FoodListingDraft;
    type Patch = FoodListingDraft;

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(FoodListing {
            id: row.get("Food_ID")?,
            food_name: row.get("Food_Name")?,
            quantity: row.get("Quantity")?,
            expiry_date: date_column(row, "Expiry_Date")?,
            provider_id: row.get("Provider_ID")?,
            provider_type: row.get("Provider_Type")?,
            location: row.get("Location")?,
            food_type: row.get("Food_Type")?,
            meal_type: row.get("Meal_Type")?,
        })
    }

    fn validate_draft(conn: &Connection, draft: &FoodListingDraft) -> Result<Vec<ValidationError>> {
        draft.validate(conn)
    }

    fn validate_patch(conn: &Connection, patch: &FoodListingDraft) -> Result<Vec<ValidationError>> {
        patch.validate(conn)
    }

    fn insert(conn: &Connection, draft: &FoodListingDraft) -> Result<i64> {
        let provider_type = provider_type_of(conn, draft.provider_id)?;

        conn.execute(
            "INSERT INTO food_listings
             (Food_Name, Quantity, Expiry_Date, Provider_ID, Provider_Type, Location, Food_Type, Meal_Type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                draft.food_name.trim(),
                draft.quantity,
                draft.expiry_date.format(DATE_FORMAT).to_string(),
                draft.provider_id,
                provider_type,
                draft.location.trim(),
                draft.food_type,
                draft.meal_type,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // Rewriting a listing takes a fresh snapshot of its provider's type
    fn apply_patch(conn: &Connection, id: i64, patch: &FoodListingDraft) -> Result<usize> {
        let provider_type = provider_type_of(conn, patch.provider_id)?;

        let affected = conn.execute(
            "UPDATE food_listings
             SET Food_Name = ?1, Quantity = ?2, Expiry_Date = ?3, Provider_ID = ?4,
                 Provider_Type = ?5, Location = ?6, Food_Type = ?7, Meal_Type = ?8
             WHERE Food_ID = ?9",
            params![
                patch.food_name.trim(),
                patch.quantity,
                patch.expiry_date.format(DATE_FORMAT).to_string(),
                patch.provider_id,
                provider_type,
                patch.location.trim(),
                patch.food_type,
                patch.meal_type,
                id,
            ],
        )?;
        Ok(affected)
    }
}
