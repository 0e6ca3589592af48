// Food Donation Core - Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod db;
pub mod error;
pub mod entities;  // Provider, Receiver, FoodListing, Claim
pub mod crud;      // Generic create/read/update/delete over entities
pub mod query;     // Filtered listings, directories, claim views
pub mod workflow;  // Claim lifecycle
pub mod analytics; // Dashboard counts, rates, rankings
pub mod import;    // CSV bulk load
pub mod config;

// Re-export commonly used types
pub use db::{Database, Table, DATE_FORMAT, TIMESTAMP_FORMAT};
pub use error::{DonationError, Result, ValidationError};
pub use entities::{
    Claim, ClaimDraft, ClaimStatus,
    FoodListing, FoodListingDraft, FoodType, MealType,
    Provider, ProviderDraft, ProviderType,
    Receiver, ReceiverDraft, ReceiverType,
};
pub use crud::{create, delete, delete_from, find, read_all, read_table, update, Entity, Record};
pub use query::{
    food_listings, providers_by_city, receivers_by_city, recent_claims,
    ClaimView, Filter, ListingFilter, ListingView, RecentClaim, SelectBuilder,
};
pub use workflow::{submit_claim, submit_claim_at, update_status};
pub use analytics::{kpi_snapshot, top_providers, KpiSnapshot, ProviderPerformance};
pub use import::{import_directory, ImportSummary};
pub use config::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
