// 🔄 Claim Workflow
//
//   Pending ──► Completed
//      │
//      └──────► Cancelled
//
// Claims start Pending. Status can then be set to any of the three states,
// including moving back out of Completed/Cancelled; no transition is refused.
// Several claims may target the same listing: the core assumes a single
// writer and does not arbitrate between competing receivers.

use crate::crud::{self, find};
use crate::db::Database;
use crate::entities::{Claim, ClaimDraft, ClaimStatus};
use crate::error::Result;
use chrono::NaiveDateTime;
use log::info;

/// Submit a claim stamped with the current local time
pub fn submit_claim(db: &Database, food_id: i64, receiver_id: i64) -> Result<i64> {
    create_claim(db, ClaimDraft::new(food_id, receiver_id))
}

/// Submit a claim stamped with `now`
pub fn submit_claim_at(
    db: &Database,
    food_id: i64,
    receiver_id: i64,
    now: NaiveDateTime,
) -> Result<i64> {
    create_claim(db, ClaimDraft::at(food_id, receiver_id, now))
}

fn create_claim(db: &Database, draft: ClaimDraft) -> Result<i64> {
    let id = crud::create::<Claim>(db, &draft)?;
    info!(
        "claim {} submitted: listing {} by receiver {}",
        id, draft.food_id, draft.receiver_id
    );
    Ok(id)
}

/// Overwrite a claim's status
pub fn update_status(db: &Database, claim_id: i64, status: ClaimStatus) -> Result<()> {
    crud::update::<Claim>(db, claim_id, &status)?;
    info!("claim {} is now {}", claim_id, status);
    Ok(())
}

/// Parse `status` and apply it; unknown labels fail validation with nothing written
pub fn update_status_str(db: &Database, claim_id: i64, status: &str) -> Result<()> {
    let parsed: ClaimStatus = status.parse()?;
    update_status(db, claim_id, parsed)
}

pub fn complete(db: &Database, claim_id: i64) -> Result<()> {
    update_status(db, claim_id, ClaimStatus::Completed)
}

pub fn cancel(db: &Database, claim_id: i64) -> Result<()> {
    update_status(db, claim_id, ClaimStatus::Cancelled)
}

/// Current status of a claim, if it exists
pub fn status_of(db: &Database, claim_id: i64) -> Result<Option<ClaimStatus>> {
    Ok(find::<Claim>(db, claim_id)?.map(|c| c.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crud::create;
    use crate::db::Table;
    use crate::entities::{
        FoodListing, FoodListingDraft, FoodType, MealType, Provider, ProviderDraft, ProviderType,
        Receiver, ReceiverDraft, ReceiverType,
    };
    use crate::error::DonationError;
    use crate::query::{claims_by_status, Filter};
    use chrono::{Duration, Local, NaiveDate};

    struct Fixture {
        db: Database,
        food_id: i64,
        receiver_id: i64,
    }

    /// Acme bakery in city X with 10 units expiring tomorrow, plus one receiver
    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let provider_id = create::<Provider>(
            &db,
            &ProviderDraft::new("Acme", ProviderType::Bakery, "1 Main St", "X", "555-0100"),
        )
        .unwrap();
        let food_id = create::<FoodListing>(
            &db,
            &FoodListingDraft {
                food_name: "Bread".to_string(),
                quantity: 10,
                expiry_date: Local::now().date_naive() + Duration::days(1),
                provider_id,
                location: "X".to_string(),
                food_type: FoodType::Vegetarian,
                meal_type: MealType::Breakfast,
            },
        )
        .unwrap();
        let receiver_id = create::<Receiver>(
            &db,
            &ReceiverDraft::new("Food Bank", ReceiverType::Ngo, "X", "555-0199"),
        )
        .unwrap();

        Fixture {
            db,
            food_id,
            receiver_id,
        }
    }

    fn ids(db: &Database, status: ClaimStatus) -> Vec<i64> {
        claims_by_status(db, &Filter::Only(status))
            .unwrap()
            .into_iter()
            .map(|c| c.claim_id)
            .collect()
    }

    #[test]
    fn test_pending_to_completed_scenario() {
        let f = fixture();

        let claim = submit_claim(&f.db, f.food_id, f.receiver_id).unwrap();
        assert_eq!(ids(&f.db, ClaimStatus::Pending), vec![claim]);
        assert!(ids(&f.db, ClaimStatus::Completed).is_empty());

        complete(&f.db, claim).unwrap();
        assert_eq!(ids(&f.db, ClaimStatus::Completed), vec![claim]);
        assert!(ids(&f.db, ClaimStatus::Pending).is_empty());
    }

    #[test]
    fn test_claim_is_created_pending_with_given_timestamp() {
        let f = fixture();
        let now = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_milli_opt(8, 15, 30, 999)
            .unwrap();

        let claim_id = submit_claim_at(&f.db, f.food_id, f.receiver_id, now).unwrap();
        let claim = find::<Claim>(&f.db, claim_id).unwrap().unwrap();

        assert_eq!(claim.status, ClaimStatus::Pending);
        assert_eq!(claim.timestamp, NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 15, 30)
            .unwrap());

        // Status changes never touch the timestamp
        cancel(&f.db, claim_id).unwrap();
        let after = find::<Claim>(&f.db, claim_id).unwrap().unwrap();
        assert_eq!(after.timestamp, claim.timestamp);
    }

    #[test]
    fn test_claim_does_not_consume_quantity() {
        let f = fixture();

        submit_claim(&f.db, f.food_id, f.receiver_id).unwrap();
        let claim = submit_claim(&f.db, f.food_id, f.receiver_id).unwrap();
        complete(&f.db, claim).unwrap();

        let listing = find::<FoodListing>(&f.db, f.food_id).unwrap().unwrap();
        assert_eq!(listing.quantity, 10);
    }

    #[test]
    fn test_claim_requires_existing_listing_and_receiver() {
        let f = fixture();

        let err = submit_claim(&f.db, 999, 888).unwrap_err();
        let fields: Vec<&str> = err.validation_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["Food_ID", "Receiver_ID"]);

        let err = submit_claim(&f.db, f.food_id, 888).unwrap_err();
        assert_eq!(err.validation_errors()[0].field, "Receiver_ID");

        assert_eq!(f.db.count(Table::Claim).unwrap(), 0);
    }

    #[test]
    fn test_invalid_status_is_rejected_and_not_persisted() {
        let f = fixture();
        let claim = submit_claim(&f.db, f.food_id, f.receiver_id).unwrap();

        let err = update_status_str(&f.db, claim, "Delivered").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(status_of(&f.db, claim).unwrap(), Some(ClaimStatus::Pending));

        update_status_str(&f.db, claim, "Cancelled").unwrap();
        assert_eq!(status_of(&f.db, claim).unwrap(), Some(ClaimStatus::Cancelled));
    }

    #[test]
    fn test_storage_refuses_unknown_status_written_directly() {
        let f = fixture();
        let claim = submit_claim(&f.db, f.food_id, f.receiver_id).unwrap();

        let result = f.db.connection().execute(
            "UPDATE claims SET Status = 'Lost' WHERE Claim_ID = ?1",
            [claim],
        );
        assert!(result.is_err());
        assert_eq!(status_of(&f.db, claim).unwrap(), Some(ClaimStatus::Pending));
    }

    #[test]
    fn test_missing_claim_reports_not_found() {
        let f = fixture();

        let err = update_status(&f.db, 404, ClaimStatus::Completed).unwrap_err();
        assert!(matches!(err, DonationError::NotFound { table: Table::Claim, id: 404 }));
        assert_eq!(status_of(&f.db, 404).unwrap(), None);
    }

    // Known gap: terminal states are not locked
    #[test]
    fn test_completed_claim_can_still_be_edited() {
        let f = fixture();
        let claim = submit_claim(&f.db, f.food_id, f.receiver_id).unwrap();

        complete(&f.db, claim).unwrap();
        update_status(&f.db, claim, ClaimStatus::Pending).unwrap();
        assert_eq!(status_of(&f.db, claim).unwrap(), Some(ClaimStatus::Pending));

        cancel(&f.db, claim).unwrap();
        complete(&f.db, claim).unwrap();
        assert_eq!(status_of(&f.db, claim).unwrap(), Some(ClaimStatus::Completed));
    }

    // Known gap: nothing stops two receivers claiming one listing
    #[test]
    fn test_listing_can_be_claimed_twice() {
        let f = fixture();
        let other = create::<Receiver>(
            &f.db,
            &ReceiverDraft::new("Orphan Care", ReceiverType::Orphanage, "X", "555-0142"),
        )
        .unwrap();

        let first = submit_claim(&f.db, f.food_id, f.receiver_id).unwrap();
        let second = submit_claim(&f.db, f.food_id, other).unwrap();

        assert_ne!(first, second);
        assert_eq!(ids(&f.db, ClaimStatus::Pending).len(), 2);
    }
}
