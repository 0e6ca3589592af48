// 🔎 Query Builder
//
// Filterable read queries. Filter values always travel as bound parameters;
// only static column names are ever spliced into SQL text.

use crate::crud::Entity;
use crate::db::Database;
use crate::entities::{
    serde_format, timestamp_column, ClaimStatus, FoodListing, FoodType, MealType, Provider,
    Receiver, ReceiverType,
};
use crate::error::Result;
use chrono::NaiveDateTime;
use log::debug;
use rusqlite::types::{FromSql, Value};
use rusqlite::{params_from_iter, Row};
use serde::Serialize;
use std::str::FromStr;

// ============================================================================
// FILTERS
// ============================================================================

/// One optional equality constraint; `All` means no constraint
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Filter<T> {
    #[default]
    All,
    Only(T),
}

impl<T> Filter<T> {
    pub fn only(&self) -> Option<&T> {
        match self {
            Filter::All => None,
            Filter::Only(value) => Some(value),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Filter::All)
    }
}

impl<T: PartialEq> Filter<T> {
    pub fn matches(&self, value: &T) -> bool {
        self.only().map_or(true, |wanted| wanted == value)
    }
}

impl<T> From<Option<T>> for Filter<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Filter::All, Filter::Only)
    }
}

impl<T: FromStr> FromStr for Filter<T> {
    type Err = T::Err;

    /// "All" (any case) or an empty string means no constraint
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(Filter::All);
        }
        trimmed.parse().map(Filter::Only)
    }
}

/// Filters offered on the food listings page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListingFilter {
    pub location: Filter<String>,
    pub food_type: Filter<FoodType>,
    pub meal_type: Filter<MealType>,
}

// ============================================================================
// SELECT BUILDER
// ============================================================================

/// Base SELECT plus AND-ed equality clauses, ordering and limit
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    base: String,
    clauses: Vec<&'static str>,
    params: Vec<Value>,
    order_by: Option<&'static str>,
    limit: Option<i64>,
}

impl SelectBuilder {
    pub fn new(base: &str) -> Self {
        SelectBuilder {
            base: base.trim().to_string(),
            clauses: Vec::new(),
            params: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Add `column = ?`
    pub fn and_eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.clauses.push(column);
        self.params.push(value.into());
        self
    }

    /// Add `column = ?` when the filter constrains anything
    pub fn and_filter<T, V>(self, column: &'static str, filter: &Filter<T>, to_value: V) -> Self
    where
        V: FnOnce(&T) -> Value,
    {
        match filter.only() {
            Some(value) => {
                let bound = to_value(value);
                self.and_eq(column, bound)
            }
            None => self,
        }
    }

    pub fn order_by(mut self, order: &'static str) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn sql(&self) -> String {
        let mut sql = self.base.clone();

        if !self.clauses.is_empty() {
            let conditions: Vec<String> =
                self.clauses.iter().map(|c| format!("{} = ?", c)).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if let Some(order) = self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }

        if self.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        sql
    }

    /// Bound values in placeholder order
    pub fn params(&self) -> Vec<Value> {
        let mut params = self.params.clone();
        if let Some(limit) = self.limit {
            params.push(Value::Integer(limit));
        }
        params
    }

    /// Run the query and map each row
    pub fn fetch<T, F>(&self, db: &Database, mut map: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let sql = self.sql();
        debug!("query: {} ({} params)", sql, self.params.len());

        let mut stmt = db.connection().prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(self.params()), |row| map(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }
}

fn text<T: ToString>(value: &T) -> Value {
    Value::Text(value.to_string())
}

// ============================================================================
// FOOD LISTINGS
// ============================================================================

/// A listing joined with its provider's name and contact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingView {
    #[serde(flatten)]
    pub listing: FoodListing,

    #[serde(rename = "Provider_Name")]
    pub provider_name: String,

    #[serde(rename = "Provider_Contact")]
    pub provider_contact: String,
}

/// Listings matching every active filter, soonest expiry first
pub fn food_listings(db: &Database, filter: &ListingFilter) -> Result<Vec<ListingView>> {
    SelectBuilder::new(
        "SELECT fl.*, p.Name AS Provider_Name, p.Contact AS Provider_Contact
         FROM food_listings fl
         JOIN providers p ON fl.Provider_ID = p.Provider_ID",
    )
    .and_filter("fl.Location", &filter.location, text)
    .and_filter("fl.Food_Type", &filter.food_type, text)
    .and_filter("fl.Meal_Type", &filter.meal_type, text)
    .order_by("fl.Expiry_Date ASC, fl.Food_ID ASC")
    .fetch(db, |row| {
        Ok(ListingView {
            listing: FoodListing::from_row(row)?,
            provider_name: row.get("Provider_Name")?,
            provider_contact: row.get("Provider_Contact")?,
        })
    })
}

// ============================================================================
// PROVIDERS & RECEIVERS
// ============================================================================

pub fn providers_by_city(db: &Database, city: &Filter<String>) -> Result<Vec<Provider>> {
    SelectBuilder::new("SELECT * FROM providers")
        .and_filter("City", city, text)
        .order_by("Name ASC, Provider_ID ASC")
        .fetch(db, Provider::from_row)
}

pub fn receivers_by_city(db: &Database, city: &Filter<String>) -> Result<Vec<Receiver>> {
    SelectBuilder::new("SELECT * FROM receivers")
        .and_filter("City", city, text)
        .order_by("Name ASC, Receiver_ID ASC")
        .fetch(db, Receiver::from_row)
}

// ============================================================================
// CLAIMS
// ============================================================================

/// A claim with the names behind its ids
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimView {
    #[serde(rename = "Claim_ID")]
    pub claim_id: i64,

    #[serde(rename = "Status")]
    pub status: ClaimStatus,

    #[serde(rename = "Timestamp", with = "serde_format::timestamp")]
    pub timestamp: NaiveDateTime,

    #[serde(rename = "Food_Name")]
    pub food_name: String,

    #[serde(rename = "Quantity")]
    pub quantity: i64,

    #[serde(rename = "Food_Type")]
    pub food_type: FoodType,

    #[serde(rename = "Receiver_Name")]
    pub receiver_name: String,

    #[serde(rename = "Receiver_Type")]
    pub receiver_type: ReceiverType,

    #[serde(rename = "Provider_Name")]
    pub provider_name: String,
}

/// Every claim joined with listing, receiver and provider, newest first,
/// then narrowed to `status`
pub fn claims_by_status(db: &Database, status: &Filter<ClaimStatus>) -> Result<Vec<ClaimView>> {
    let all = SelectBuilder::new(
        "SELECT c.Claim_ID, c.Status, c.Timestamp,
                fl.Food_Name, fl.Quantity, fl.Food_Type,
                r.Name AS Receiver_Name, r.Type AS Receiver_Type,
                p.Name AS Provider_Name
         FROM claims c
         JOIN food_listings fl ON c.Food_ID = fl.Food_ID
         JOIN receivers r ON c.Receiver_ID = r.Receiver_ID
         JOIN providers p ON fl.Provider_ID = p.Provider_ID",
    )
    .order_by("c.Timestamp DESC, c.Claim_ID DESC")
    .fetch(db, |row| {
        Ok(ClaimView {
            claim_id: row.get("Claim_ID")?,
            status: row.get("Status")?,
            timestamp: timestamp_column(row, "Timestamp")?,
            food_name: row.get("Food_Name")?,
            quantity: row.get("Quantity")?,
            food_type: row.get("Food_Type")?,
            receiver_name: row.get("Receiver_Name")?,
            receiver_type: row.get("Receiver_Type")?,
            provider_name: row.get("Provider_Name")?,
        })
    })?;

    Ok(all.into_iter().filter(|c| status.matches(&c.status)).collect())
}

/// Latest claim activity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentClaim {
    #[serde(rename = "Timestamp", with = "serde_format::timestamp")]
    pub timestamp: NaiveDateTime,

    #[serde(rename = "Food_Name")]
    pub food_name: String,

    #[serde(rename = "Receiver_Name")]
    pub receiver_name: String,

    #[serde(rename = "Status")]
    pub status: ClaimStatus,
}

pub fn recent_claims(db: &Database, limit: i64) -> Result<Vec<RecentClaim>> {
    SelectBuilder::new(
        "SELECT c.Timestamp, fl.Food_Name, r.Name AS Receiver_Name, c.Status
         FROM claims c
         JOIN food_listings fl ON c.Food_ID = fl.Food_ID
         JOIN receivers r ON c.Receiver_ID = r.Receiver_ID",
    )
    .order_by("c.Timestamp DESC, c.Claim_ID DESC")
    .limit(limit)
    .fetch(db, |row| {
        Ok(RecentClaim {
            timestamp: timestamp_column(row, "Timestamp")?,
            food_name: row.get("Food_Name")?,
            receiver_name: row.get("Receiver_Name")?,
            status: row.get("Status")?,
        })
    })
}

// ============================================================================
// FILTER OPTIONS
// ============================================================================

fn distinct<T: FromSql>(db: &Database, table: &str, column: &str) -> Result<Vec<T>> {
    let sql = format!(
        "SELECT DISTINCT {col} FROM {table} ORDER BY {col}",
        col = column,
        table = table
    );
    let mut stmt = db.connection().prepare(&sql)?;
    let values = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(values)
}

pub fn listing_locations(db: &Database) -> Result<Vec<String>> {
    distinct(db, "food_listings", "Location")
}

pub fn listing_food_types(db: &Database) -> Result<Vec<FoodType>> {
    distinct(db, "food_listings", "Food_Type")
}

pub fn listing_meal_types(db: &Database) -> Result<Vec<MealType>> {
    distinct(db, "food_listings", "Meal_Type")
}

pub fn provider_cities(db: &Database) -> Result<Vec<String>> {
    distinct(db, "providers", "City")
}

pub fn receiver_cities(db: &Database) -> Result<Vec<String>> {
    distinct(db, "receivers", "City")
}
