//! Row types for the dimensional warehouse.
//!
//! Dimension rows (customer, product, calendar day) describe entities,
//! fact rows (purchase) are immutable events referencing them, and the
//! two summary rows are fully derived from facts.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Spending band a product's base price falls into, ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriceTier {
    Budget,
    Standard,
    Premium,
    Luxury,
}

impl PriceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceTier::Budget => "budget",
            PriceTier::Standard => "standard",
            PriceTier::Premium => "premium",
            PriceTier::Luxury => "luxury",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "budget" => Some(PriceTier::Budget),
            "standard" => Some(PriceTier::Standard),
            "premium" => Some(PriceTier::Premium),
            "luxury" => Some(PriceTier::Luxury),
            _ => None,
        }
    }
}

/// Age band derived from a product's publication year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AgeCategory {
    New,
    Recent,
    Classic,
    Vintage,
}

impl AgeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeCategory::New => "new",
            AgeCategory::Recent => "recent",
            AgeCategory::Classic => "classic",
            AgeCategory::Vintage => "vintage",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(AgeCategory::New),
            "recent" => Some(AgeCategory::Recent),
            "classic" => Some(AgeCategory::Classic),
            "vintage" => Some(AgeCategory::Vintage),
            _ => None,
        }
    }
}

/// Customer segment label derived from cumulative purchase history.
///
/// This is the one derived field computed from facts rather than from the
/// raw record, so it is re-derived by the Aggregator whenever a
/// customer's fact rows change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CustomerSegment {
    HighValue,
    Regular,
    Occasional,
    Inactive,
}

impl CustomerSegment {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerSegment::HighValue => "high_value",
            CustomerSegment::Regular => "regular",
            CustomerSegment::Occasional => "occasional",
            CustomerSegment::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high_value" => Some(CustomerSegment::HighValue),
            "regular" => Some(CustomerSegment::Regular),
            "occasional" => Some(CustomerSegment::Occasional),
            "inactive" => Some(CustomerSegment::Inactive),
            _ => None,
        }
    }
}

/// Customer dimension row. Unique by `customer_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRow {
    pub customer_id: i64,
    pub name: String,
    pub email: String,
    pub location: String,
    pub city: String,
    pub state: String,
    pub signup_date: NaiveDate,
    pub segment: CustomerSegment,
}

/// Product dimension row. Unique by `product_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRow {
    pub product_id: i64,
    pub title: String,
    pub author: String,
    pub category: String,
    pub publication_year: i32,
    pub base_price: f64,
    pub price_tier: PriceTier,
    pub age_category: AgeCategory,
}

/// Calendar day dimension row, keyed by `date_id = y*10000 + m*100 + d`.
/// Generated lazily for each distinct date seen in a purchase; never
/// deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDayRow {
    pub date_id: i64,
    pub full_date: NaiveDate,
    pub year: i32,
    pub quarter: i32,
    pub month: i32,
    pub day: i32,
    /// ISO weekday, Monday = 1 through Sunday = 7.
    pub day_of_week: i32,
    pub day_name: String,
    pub month_name: String,
    pub is_weekend: bool,
}

/// Purchase fact row. Insert-only; `purchase_id` is globally unique.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseRow {
    pub purchase_id: i64,
    pub customer_id: i64,
    pub product_id: i64,
    pub date_id: i64,
    pub amount: f64,
    pub quantity: i64,
    pub timestamp: NaiveDateTime,
}

/// Daily summary row, one per calendar day with at least one purchase.
/// Always equals the aggregate computed directly over that day's facts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummaryRow {
    pub date_id: i64,
    pub total_revenue: f64,
    pub transaction_count: i64,
    pub distinct_customers: i64,
    pub average_transaction_value: f64,
    pub total_quantity: i64,
}

/// Product performance row, one per product with at least one sale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductPerformanceRow {
    pub product_id: i64,
    pub total_units: i64,
    pub total_revenue: f64,
    pub average_price: f64,
    pub distinct_customers: i64,
    pub first_sale_date_id: i64,
    pub last_sale_date_id: i64,
}

/// Warehouse-wide headline numbers for the read-only query surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsOverview {
    pub total_revenue: f64,
    pub total_transactions: i64,
    pub total_customers: i64,
    pub total_products: i64,
    pub average_transaction_value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_tier_round_trip() {
        for tier in [
            PriceTier::Budget,
            PriceTier::Standard,
            PriceTier::Premium,
            PriceTier::Luxury,
        ] {
            assert_eq!(PriceTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(PriceTier::parse("mid"), None);
    }

    #[test]
    fn test_age_category_round_trip() {
        for cat in [
            AgeCategory::New,
            AgeCategory::Recent,
            AgeCategory::Classic,
            AgeCategory::Vintage,
        ] {
            assert_eq!(AgeCategory::parse(cat.as_str()), Some(cat));
        }
    }

    #[test]
    fn test_customer_segment_round_trip() {
        for seg in [
            CustomerSegment::HighValue,
            CustomerSegment::Regular,
            CustomerSegment::Occasional,
            CustomerSegment::Inactive,
        ] {
            assert_eq!(CustomerSegment::parse(seg.as_str()), Some(seg));
        }
        assert_eq!(CustomerSegment::parse("vip"), None);
    }
}
