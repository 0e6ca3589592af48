// 📋 Claim - a receiver's request against a food listing
//
// Created Pending with an immutable creation timestamp. Status is the only
// field that changes afterwards.

use super::{serde_format, text_enum, timestamp_column};
use crate::crud::{exists, Entity};
use crate::db::{Table, TIMESTAMP_FORMAT};
use crate::error::{Result, ValidationError};
use chrono::{Local, NaiveDateTime, Timelike};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

text_enum! {
    /// Claim lifecycle state
    ///
    /// Completed and Cancelled are terminal in intent only; nothing stops a
    /// caller from moving a claim out of them.
    pub enum ClaimStatus ("Status") {
        Pending => "Pending",
        Completed => "Completed",
        Cancelled => "Cancelled",
    }
}

impl ClaimStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimStatus::Completed | ClaimStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "Claim_ID")]
    pub id: i64,

    #[serde(rename = "Food_ID")]
    pub food_id: i64,

    #[serde(rename = "Receiver_ID")]
    pub receiver_id: i64,

    #[serde(rename = "Status")]
    pub status: ClaimStatus,

    #[serde(rename = "Timestamp", with = "serde_format::timestamp")]
    pub timestamp: NaiveDateTime,
}

/// A new claim: which listing, who asks, and when
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimDraft {
    pub food_id: i64,
    pub receiver_id: i64,
    pub submitted_at: NaiveDateTime,
}

impl ClaimDraft {
    /// Claim submitted now (local time)
    pub fn new(food_id: i64, receiver_id: i64) -> Self {
        Self::at(food_id, receiver_id, Local::now().naive_local())
    }

    /// Claim submitted at `submitted_at`, truncated to whole seconds
    pub fn at(food_id: i64, receiver_id: i64, submitted_at: NaiveDateTime) -> Self {
        ClaimDraft {
            food_id,
            receiver_id,
            submitted_at: submitted_at.with_nanosecond(0).unwrap_or(submitted_at),
        }
    }

    /// Both references must resolve
    pub fn validate(&self, conn: &Connection) -> Result<Vec<ValidationError>> {
        let mut errors = Vec::new();

        if !exists(conn, Table::FoodListing, self.food_id)? {
            errors.push(ValidationError::new(
                "Food_ID",
                format!("No food listing with id {}", self.food_id),
            ));
        }

        if !exists(conn, Table::Receiver, self.receiver_id)? {
            errors.push(ValidationError::new(
                "Receiver_ID",
                format!("No receiver with id {}", self.receiver_id),
            ));
        }

        Ok(errors)
    }
}

impl Entity for Claim {
    const TABLE: Table = Table::Claim;
    const COLUMNS: &'static str = "Claim_ID, Food_ID, Receiver_ID, Status, Timestamp";

    type Draft = ClaimDraft;
    type Patch = ClaimStatus;

    fn id(&self) -> i64 {
        self.id
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Claim {
            id: row.get("Claim_ID")?,
            food_id: row.get("Food_ID")?,
            receiver_id: row.get("Receiver_ID")?,
            status: row.get("Status")?,
            timestamp: timestamp_column(row, "Timestamp")?,
        })
    }

    fn validate_draft(conn: &Connection, draft: &ClaimDraft) -> Result<Vec<ValidationError>> {
        draft.validate(conn)
    }

    // The status type already rules out anything but the three states
    fn validate_patch(_conn: &Connection, _patch: &ClaimStatus) -> Result<Vec<ValidationError>> {
        Ok(Vec::new())
    }

    fn insert(conn: &Connection, draft: &ClaimDraft) -> Result<i64> {
        conn.execute(
            "INSERT INTO claims (Food_ID, Receiver_ID, Status, Timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                draft.food_id,
                draft.receiver_id,
                ClaimStatus::Pending,
                draft.submitted_at.format(TIMESTAMP_FORMAT).to_string(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn apply_patch(conn: &Connection, id: i64, status: &ClaimStatus) -> Result<usize> {
        let affected = conn.execute(
            "UPDATE claims SET Status = ?1 WHERE Claim_ID = ?2",
            params![status, id],
        )?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_status_parsing_rejects_unknown_values() {
        assert_eq!("Pending".parse::<ClaimStatus>().unwrap(), ClaimStatus::Pending);
        assert_eq!("completed".parse::<ClaimStatus>().unwrap(), ClaimStatus::Completed);

        for bad in ["Done", "", "Pending;DROP TABLE claims"] {
            let err = bad.parse::<ClaimStatus>().unwrap_err();
            assert_eq!(err.field, "Status");
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ClaimStatus::Pending.is_terminal());
        assert!(ClaimStatus::Completed.is_terminal());
        assert!(ClaimStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_draft_truncates_to_seconds() {
        let precise = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_milli_opt(10, 30, 15, 742)
            .unwrap();

        let draft = ClaimDraft::at(1, 2, precise);
        assert_eq!(draft.submitted_at.nanosecond(), 0);
        assert_eq!(draft.submitted_at.second(), 15);
    }
}
