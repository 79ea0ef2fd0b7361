//! Shared fixtures for service tests: an in-memory database seeded with a
//! station type, stations, products, and the global billing rule used by
//! the scenario tests (15-minute ceiling, no grace).

use chrono::Utc;
use uuid::Uuid;

use baize_core::promotion::{ApplyTarget, BillRule, DiscountKind, DiscountSpec, ProductRule, TimeRule};
use baize_core::{
    BillingRule, Money, Product, PromoScope, PromotionRule, RoundingMode, Station, StationStatus,
    StationType,
};
use baize_db::{Database, DbConfig};

pub struct Fixture {
    pub db: Database,
    pub station_type: StationType,
    /// Rate override 60,000/hr, active, available.
    pub station: Station,
    pub inactive_station: Station,
    /// 25,000, category c-drinks.
    pub cola: Product,
    /// 35,000, category c-food.
    pub noodles: Product,
    pub inactive_product: Product,
}

pub async fn fixture() -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let now = Utc::now();

    db.settings()
        .upsert_billing_rule(
            None,
            &BillingRule {
                rounding_step: 15,
                rounding_mode: RoundingMode::Ceil,
                grace_minutes: 0,
            },
        )
        .await
        .unwrap();

    let station_type = StationType {
        id: Uuid::new_v4().to_string(),
        name: "Standard".into(),
        base_rate_per_hour: 50_000,
        day_rates: vec![],
        created_at: now,
        updated_at: now,
    };
    db.station_types().insert(&station_type).await.unwrap();

    let station = Station {
        id: Uuid::new_v4().to_string(),
        branch_id: None,
        name: "Table 1".into(),
        station_type_id: station_type.id.clone(),
        rate_per_hour: Some(60_000),
        status: StationStatus::Available,
        order_index: 1,
        active: true,
        created_at: now,
        updated_at: now,
    };
    db.stations().insert(&station).await.unwrap();

    let inactive_station = Station {
        id: Uuid::new_v4().to_string(),
        branch_id: None,
        name: "Broken Table".into(),
        station_type_id: station_type.id.clone(),
        rate_per_hour: Some(60_000),
        status: StationStatus::Available,
        order_index: 2,
        active: false,
        created_at: now,
        updated_at: now,
    };
    db.stations().insert(&inactive_station).await.unwrap();

    let cola = Product {
        id: Uuid::new_v4().to_string(),
        branch_id: None,
        name: "Cola".into(),
        category_id: Some("c-drinks".into()),
        price_units: 25_000,
        active: true,
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&cola).await.unwrap();

    let noodles = Product {
        id: Uuid::new_v4().to_string(),
        branch_id: None,
        name: "Instant Noodles".into(),
        category_id: Some("c-food".into()),
        price_units: 35_000,
        active: true,
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&noodles).await.unwrap();

    let inactive_product = Product {
        id: Uuid::new_v4().to_string(),
        branch_id: None,
        name: "Discontinued Snack".into(),
        category_id: Some("c-food".into()),
        price_units: 10_000,
        active: false,
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&inactive_product).await.unwrap();

    Fixture {
        db,
        station_type,
        station,
        inactive_station,
        cola,
        noodles,
        inactive_product,
    }
}

/// The scenario promo: 10% off the bill, non-stackable, capped at 20,000.
pub fn promo_ten_percent_bill_capped() -> PromotionRule {
    PromotionRule {
        id: Uuid::new_v4().to_string(),
        branch_id: None,
        code: Some("BILL10".into()),
        name: "10% off the bill".into(),
        active: true,
        apply_order: 0,
        stackable: false,
        scope: PromoScope::Bill,
        discount: DiscountSpec {
            kind: DiscountKind::Percent,
            value: 10.0,
            max_amount: Some(Money::from_units(20_000)),
            applies_to: ApplyTarget::Bill,
        },
        time_rule: TimeRule::default(),
        product_rule: ProductRule::default(),
        bill_rule: BillRule::default(),
        created_at: Utc::now(),
    }
}
