use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use food_donation::{
    analytics, crud, import_directory, query, workflow, ClaimStatus, Config, Database, Filter,
    FoodType, ListingFilter, MealType, Table,
};

#[derive(Parser, Debug)]
#[command(name = "food-donation", version, about = "Food donation listings, claims and analytics")]
struct Args {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the schema if it does not exist yet
    Init,
    /// Replace all data with the four CSV exports in a directory
    Import { dir: PathBuf },
    /// Food listings, soonest expiry first
    Listings {
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        food_type: Option<FoodType>,
        #[arg(long)]
        meal_type: Option<MealType>,
    },
    Providers {
        #[arg(long)]
        city: Option<String>,
    },
    Receivers {
        #[arg(long)]
        city: Option<String>,
    },
    /// Claims with listing, receiver and provider details, newest first
    Claims {
        #[arg(long)]
        status: Option<ClaimStatus>,
    },
    /// Submit a Pending claim
    Claim { food_id: i64, receiver_id: i64 },
    SetStatus { claim_id: i64, status: ClaimStatus },
    /// Delete one row by primary key
    Delete { table: Table, id: i64 },
    /// Headline numbers, top providers and recent claims
    Dashboard,
}

fn main() -> Result<()> {
    let args = Args::parse();
    args.config.init_logging()?;

    let db = Database::open(&args.config.database)
        .with_context(|| format!("Failed to open {}", args.config.database.display()))?;

    match args.commands {
        Commands::Init => {
            println!("✓ Database ready at {}", args.config.database.display());
        }
        Commands::Import { dir } => run_import(&db, &dir)?,
        Commands::Listings {
            city,
            food_type,
            meal_type,
        } => {
            let filter = ListingFilter {
                location: Filter::from(city),
                food_type: Filter::from(food_type),
                meal_type: Filter::from(meal_type),
            };
            print_json(&query::food_listings(&db, &filter)?)?;
        }
        Commands::Providers { city } => {
            print_json(&query::providers_by_city(&db, &Filter::from(city))?)?;
        }
        Commands::Receivers { city } => {
            print_json(&query::receivers_by_city(&db, &Filter::from(city))?)?;
        }
        Commands::Claims { status } => {
            print_json(&query::claims_by_status(&db, &Filter::from(status))?)?;
        }
        Commands::Claim {
            food_id,
            receiver_id,
        } => {
            let id = workflow::submit_claim(&db, food_id, receiver_id)?;
            println!("✓ Claim {} submitted (Pending)", id);
        }
        Commands::SetStatus { claim_id, status } => {
            workflow::update_status(&db, claim_id, status)?;
            println!("✓ Claim {} is now {}", claim_id, status);
        }
        Commands::Delete { table, id } => {
            crud::delete_from(&db, table, id)?;
            println!("✓ {} {} deleted", table, id);
        }
        Commands::Dashboard => run_dashboard(&db)?,
    }

    Ok(())
}

fn run_import(db: &Database, dir: &Path) -> Result<()> {
    println!("📂 Loading CSV exports from {}...", dir.display());

    let summary = import_directory(db, dir)?;

    println!("✓ Providers:     {}", summary.providers);
    println!("✓ Receivers:     {}", summary.receivers);
    println!("✓ Food listings: {}", summary.listings);
    println!("✓ Claims:        {}", summary.claims);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🎉 Imported {} rows", summary.total());

    Ok(())
}

fn run_dashboard(db: &Database) -> Result<()> {
    let now = Local::now().naive_local();
    let kpi = analytics::kpi_snapshot(db, now)?;

    println!("📊 Food Donation Dashboard");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Providers:          {}", kpi.counts.providers);
    println!("Receivers:          {}", kpi.counts.receivers);
    println!("Food listings:      {}", kpi.counts.listings);
    println!("Claims:             {}", kpi.counts.claims);
    println!("Waste prevented:    {:.1}%", kpi.waste_prevented_pct);
    match kpi.avg_claim_age_days {
        Some(days) => println!("Avg claim age:      {:.1} days", days),
        None => println!("Avg claim age:      -"),
    }
    println!("Active listings:    {}", kpi.active_listings);
    println!("Expiring soon:      {}", kpi.expiring_soon);
    println!("Pending claims:     {}", kpi.pending_claims);
    println!("Completed today:    {}", kpi.completed_today);
    println!("Active receivers:   {}", kpi.active_receivers);

    println!("\n🏆 Top providers");
    for (rank, p) in analytics::top_providers(db, 5)?.iter().enumerate() {
        println!(
            "{}. {} ({}) - {} listings, {} units, {} claims",
            rank + 1,
            p.name,
            p.provider_type,
            p.total_listings,
            p.total_quantity,
            p.total_claims
        );
    }

    println!("\n🕒 Recent claims");
    for c in query::recent_claims(db, 5)? {
        println!(
            "{}  {:<9}  {} → {}",
            c.timestamp.format(food_donation::TIMESTAMP_FORMAT),
            c.status.to_string(),
            c.food_name,
            c.receiver_name
        );
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
