// 🤝 Receiver - organization claiming donated food

use super::{require_text, text_enum};
use crate::crud::Entity;
use crate::db::Table;
use crate::error::{Result, ValidationError};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

text_enum! {
    /// Kind of organization collecting food
    pub enum ReceiverType ("Type") {
        Ngo => "NGO",
        CommunityCenter => "Community Center",
        Individual => "Individual",
        Orphanage => "Orphanage",
        Other => "Other",
    }
}

/// A stored receiver row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    #[serde(rename = "Receiver_ID")]
    pub id: i64,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Type")]
    pub receiver_type: ReceiverType,

    #[serde(rename = "City")]
    pub city: String,

    #[serde(rename = "Contact")]
    pub contact: String,
}

/// Field set for creating or overwriting a receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverDraft {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Type")]
    pub receiver_type: ReceiverType,

    #[serde(rename = "City")]
    pub city: String,

    #[serde(rename = "Contact")]
    pub contact: String,
}

impl ReceiverDraft {
    pub fn new(name: &str, receiver_type: ReceiverType, city: &str, contact: &str) -> Self {
        ReceiverDraft {
            name: name.to_string(),
            receiver_type,
            city: city.to_string(),
            contact: contact.to_string(),
        }
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        require_text(&mut errors, "Name", &self.name);
        require_text(&mut errors, "City", &self.city);
        require_text(&mut errors, "Contact", &self.contact);
        errors
    }
}

impl Entity for Receiver {
    const TABLE: Table = Table::Receiver;
    const COLUMNS: &'static str = "Receiver_ID, Name, Type, City, Contact";

    type Draft = ReceiverDraft;
    type Patch = ReceiverDraft;

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Receiver {
            id: row.get("Receiver_ID")?,
            name: row.get("Name")?,
            receiver_type: row.get("Type")?,
            city: row.get("City")?,
            contact: row.get("Contact")?,
        })
    }

    fn validate_draft(_conn: &Connection, draft: &ReceiverDraft) -> Result<Vec<ValidationError>> {
        Ok(draft.validate())
    }

    fn validate_patch(_conn: &Connection, patch: &ReceiverDraft) -> Result<Vec<ValidationError>> {
        Ok(patch.validate())
    }

    fn insert(conn: &Connection, draft: &ReceiverDraft) -> Result<i64> {
        conn.execute(
            "INSERT INTO receivers (Name, Type, City, Contact) VALUES (?1, ?2, ?3, ?4)",
            params![
                draft.name.trim(),
                draft.receiver_type,
                draft.city.trim(),
                draft.contact.trim(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn apply_patch(conn: &Connection, id: i64, patch: &ReceiverDraft) -> Result<usize> {
        let affected = conn.execute(
            "UPDATE receivers SET Name = ?1, Type = ?2, City = ?3, Contact = ?4
             WHERE Receiver_ID = ?5",
            params![
                patch.name.trim(),
                patch.receiver_type,
                patch.city.trim(),
                patch.contact.trim(),
                id,
            ],
        )?;
        Ok(affected)
    }
}
