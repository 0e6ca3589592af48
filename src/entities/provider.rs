// 🏪 Provider - organization listing surplus food

use super::{require_text, text_enum};
use crate::crud::Entity;
use crate::db::Table;
use crate::error::{Result, ValidationError};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

text_enum! {
    /// Kind of business donating food
    pub enum ProviderType ("Type") {
        Restaurant => "Restaurant",
        GroceryStore => "Grocery Store",
        Supermarket => "Supermarket",
        Bakery => "Bakery",
        Other => "Other",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    #[serde(rename = "Provider_ID")]
    pub id: i64,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Type")]
    pub provider_type: ProviderType,

    #[serde(rename = "Address")]
    pub address: String,

    #[serde(rename = "City")]
    pub city: String,

    #[serde(rename = "Contact")]
    pub contact: String,
}

/// Field set for creating or overwriting a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDraft {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Type")]
    pub provider_type: ProviderType,

    #[serde(rename = "Address")]
    pub address: String,

    #[serde(rename = "City")]
    pub city: String,

    #[serde(rename = "Contact")]
    pub contact: String,
}

impl ProviderDraft {
    pub fn new(
        name: &str,
        provider_type: ProviderType,
        address: &str,
        city: &str,
        contact: &str,
    ) -> Self {
        ProviderDraft {
            name: name.to_string(),
            provider_type,
            address: address.to_string(),
            city: city.to_string(),
            contact: contact.to_string(),
        }
    }

    /// Every provider field is required
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        require_text(&mut errors, "Name", &self.name);
        require_text(&mut errors, "Address", &self.address);
        require_text(&mut errors, "City", &self.city);
        require_text(&mut errors, "Contact", &self.contact);
        errors
    }
}

impl From<&Provider> for ProviderDraft {
    fn from(provider: &Provider) -> Self {
        ProviderDraft {
            name: provider.name.clone(),
            provider_type: provider.provider_type,
            address: provider.address.clone(),
            city: provider.city.clone(),
            contact: provider.contact.clone(),
        }
    }
}

impl Entity for Provider {
    const TABLE: Table = Table::Provider;
    const COLUMNS: &'static str = "Provider_ID, Name, Type, Address, City, Contact";

    type Draft = ProviderDraft;
    type Patch = ProviderDraft;

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Provider {
            id: row.get("Provider_ID")?,
            name: row.get("Name")?,
            provider_type: row.get("Type")?,
            address: row.get("Address")?,
            city: row.get("City")?,
            contact: row.get("Contact")?,
        })
    }

    fn validate_draft(_conn: &Connection, draft: &ProviderDraft) -> Result<Vec<ValidationError>> {
        Ok(draft.validate())
    }

    fn validate_patch(_conn: &Connection, patch: &ProviderDraft) -> Result<Vec<ValidationError>> {
        Ok(patch.validate())
    }

    fn insert(conn: &Connection, draft: &ProviderDraft) -> Result<i64> {
        conn.execute(
            "INSERT INTO providers (Name, Type, Address, City, Contact)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                draft.name.trim(),
                draft.provider_type,
                draft.address.trim(),
                draft.city.trim(),
                draft.contact.trim(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // Listings keep the Provider_Type they were written with
    fn apply_patch(conn: &Connection, id: i64, patch: &ProviderDraft) -> Result<usize> {
        let affected = conn.execute(
            "UPDATE providers
             SET Name = ?1, Type = ?2, Address = ?3, City = ?4, Contact = ?5
             WHERE Provider_ID = ?6",
            params![
                patch.name.trim(),
                patch.provider_type,
                patch.address.trim(),
                patch.city.trim(),
                patch.contact.trim(),
                id,
            ],
        )?;
        Ok(affected)
    }
}
