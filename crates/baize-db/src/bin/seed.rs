//! # Seed Data Generator
//!
//! Populates a database with development data: two station types with
//! day-rate schedules, a grid of stations, a small product catalog, a
//! global billing rule, and a couple of promotions.
//!
//! ## Usage
//! ```bash
//! cargo run -p baize-db --bin seed
//! cargo run -p baize-db --bin seed -- --db ./data/baize.db
//! ```

use std::env;

use chrono::Utc;
use uuid::Uuid;

use baize_core::promotion::{ApplyTarget, BillRule, DiscountKind, DiscountSpec, TimeRule};
use baize_core::{
    BillingRule, DayRate, Money, Product, PromoScope, PromotionRule, RoundingMode, Station,
    StationStatus, StationType, TimeRange,
};
use baize_db::{Database, DbConfig};

const PRODUCTS: &[(&str, &str, i64)] = &[
    ("Cola", "drinks", 25_000),
    ("Iced Tea", "drinks", 20_000),
    ("Mineral Water", "drinks", 15_000),
    ("Energy Drink", "drinks", 30_000),
    ("Instant Noodles", "food", 35_000),
    ("French Fries", "food", 40_000),
    ("Club Sandwich", "food", 55_000),
    ("Cue Chalk", "gear", 10_000),
    ("Glove Rental", "gear", 20_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let db_path = parse_db_path().unwrap_or_else(|| "./baize.db".to_string());
    println!("Seeding database at {db_path}");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let now = Utc::now();

    // Global billing rule: 15-minute ceiling, no grace
    db.settings()
        .upsert_billing_rule(
            None,
            &BillingRule {
                rounding_step: 15,
                rounding_mode: RoundingMode::Ceil,
                grace_minutes: 0,
            },
        )
        .await?;

    // Station types with evening/weekend bands
    let standard = StationType {
        id: Uuid::new_v4().to_string(),
        name: "Standard".into(),
        base_rate_per_hour: 50_000,
        day_rates: vec![
            DayRate {
                days: vec![1, 2, 3, 4, 5],
                window: Some(TimeRange::new("08:00".parse()?, "17:00".parse()?)),
                rate_per_hour: 40_000,
            },
            DayRate {
                days: vec![],
                window: Some(TimeRange::new("22:00".parse()?, "02:00".parse()?)),
                rate_per_hour: 60_000,
            },
        ],
        created_at: now,
        updated_at: now,
    };
    let vip = StationType {
        id: Uuid::new_v4().to_string(),
        name: "VIP".into(),
        base_rate_per_hour: 90_000,
        day_rates: vec![],
        created_at: now,
        updated_at: now,
    };
    db.station_types().insert(&standard).await?;
    db.station_types().insert(&vip).await?;

    // Station grid
    for i in 1..=6 {
        let (type_id, name) = if i <= 4 {
            (&standard.id, format!("Table {i}"))
        } else {
            (&vip.id, format!("VIP {}", i - 4))
        };
        db.stations()
            .insert(&Station {
                id: Uuid::new_v4().to_string(),
                branch_id: None,
                name,
                station_type_id: type_id.clone(),
                rate_per_hour: None,
                status: StationStatus::Available,
                order_index: i,
                active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;
    }

    // Product catalog
    for (name, category, price) in PRODUCTS {
        db.products()
            .insert(&Product {
                id: Uuid::new_v4().to_string(),
                branch_id: None,
                name: (*name).into(),
                category_id: Some(format!("c-{category}")),
                price_units: *price,
                active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;
    }

    // Promotions: a stackable drinks discount and a non-stackable bill cap
    db.promotions()
        .insert(&PromotionRule {
            id: Uuid::new_v4().to_string(),
            branch_id: None,
            code: Some("DRINKS20".into()),
            name: "20% off drinks".into(),
            active: true,
            apply_order: 0,
            stackable: true,
            scope: PromoScope::Product,
            discount: DiscountSpec {
                kind: DiscountKind::Percent,
                value: 20.0,
                max_amount: None,
                applies_to: ApplyTarget::Service,
            },
            time_rule: TimeRule::default(),
            product_rule: baize_core::promotion::ProductRule {
                products: vec![],
                categories: vec!["c-drinks".into()],
                combo: vec![],
            },
            bill_rule: BillRule::default(),
            created_at: now,
        })
        .await?;
    db.promotions()
        .insert(&PromotionRule {
            id: Uuid::new_v4().to_string(),
            branch_id: None,
            code: Some("BILL10".into()),
            name: "10% off the bill".into(),
            active: true,
            apply_order: 1,
            stackable: false,
            scope: PromoScope::Bill,
            discount: DiscountSpec {
                kind: DiscountKind::Percent,
                value: 10.0,
                max_amount: Some(Money::from_units(50_000)),
                applies_to: ApplyTarget::Bill,
            },
            time_rule: TimeRule::default(),
            product_rule: baize_core::promotion::ProductRule::default(),
            bill_rule: BillRule {
                station_types: vec![],
                min_subtotal: Money::from_units(100_000),
                min_service_amount: Money::zero(),
                min_play_minutes: 0,
            },
            created_at: now,
        })
        .await?;

    println!("Seed complete: 2 station types, 6 stations, {} products, 2 promotions", PRODUCTS.len());
    Ok(())
}

fn parse_db_path() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter()
        .position(|a| a == "--db")
        .and_then(|i| args.get(i + 1).cloned())
}
