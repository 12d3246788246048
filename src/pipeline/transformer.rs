//! Derivations from validated records to warehouse rows. Every function
//! here is total and deterministic; the same input always yields the
//! same row.

use super::validator::{ValidCustomer, ValidProduct, ValidPurchase};
use crate::warehouse::{
    AgeCategory, CalendarDayRow, CustomerRow, CustomerSegment, PriceTier, ProductRow, PurchaseRow,
};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

/// Ordered price-tier bands, cheapest first.
const PRICE_TIERS: [PriceTier; 4] = [
    PriceTier::Budget,
    PriceTier::Standard,
    PriceTier::Premium,
    PriceTier::Luxury,
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SegmentThresholds {
    pub high_value_spend: f64,
    pub high_value_purchases: i64,
    pub regular_spend: f64,
    pub regular_purchases: i64,
}

impl Default for SegmentThresholds {
    fn default() -> Self {
        Self {
            high_value_spend: 500.0,
            high_value_purchases: 10,
            regular_spend: 100.0,
            regular_purchases: 3,
        }
    }
}

/// Tunables for the derivations that are business policy rather than
/// arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivationConfig {
    /// Ascending price boundaries. With n thresholds the first n bands
    /// of [`PriceTier`] are used plus one band above the last boundary;
    /// extra thresholds collapse into the top band.
    pub price_tier_thresholds: Vec<f64>,
    /// Reference year for age categories, normally the current year.
    pub reference_year: i32,
    pub segments: SegmentThresholds,
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self {
            price_tier_thresholds: vec![10.0, 25.0, 50.0],
            reference_year: chrono::Local::now().year(),
            segments: SegmentThresholds::default(),
        }
    }
}

impl DerivationConfig {
    pub fn price_tier(&self, base_price: f64) -> PriceTier {
        let band = self
            .price_tier_thresholds
            .iter()
            .position(|threshold| base_price < *threshold)
            .unwrap_or(self.price_tier_thresholds.len());
        PRICE_TIERS[band.min(PRICE_TIERS.len() - 1)]
    }

    pub fn age_category(&self, publication_year: i32) -> AgeCategory {
        let age = self.reference_year - publication_year;
        if age < 2 {
            AgeCategory::New
        } else if age < 5 {
            AgeCategory::Recent
        } else if age < 20 {
            AgeCategory::Classic
        } else {
            AgeCategory::Vintage
        }
    }

    /// Segment from cumulative purchase history. Spend and count
    /// thresholds are alternatives, not conjuncts: a few very large
    /// orders qualify as well as many small ones.
    pub fn customer_segment(&self, total_spend: f64, purchase_count: i64) -> CustomerSegment {
        let s = &self.segments;
        if purchase_count == 0 {
            CustomerSegment::Inactive
        } else if total_spend >= s.high_value_spend || purchase_count >= s.high_value_purchases {
            CustomerSegment::HighValue
        } else if total_spend >= s.regular_spend || purchase_count >= s.regular_purchases {
            CustomerSegment::Regular
        } else {
            CustomerSegment::Occasional
        }
    }
}

/// Surrogate key for a calendar day: `YYYYMMDD` as an integer.
pub fn date_id(date: NaiveDate) -> i64 {
    date.year() as i64 * 10_000 + date.month() as i64 * 100 + date.day() as i64
}

/// `"Portland, OR"` -> `("Portland", "OR")`. A location without a comma
/// is all city, with an empty state.
pub fn split_location(location: &str) -> (String, String) {
    match location.split_once(',') {
        Some((city, state)) => (city.trim().to_string(), state.trim().to_string()),
        None => (location.trim().to_string(), String::new()),
    }
}

/// Full calendar decomposition of one date.
pub fn calendar_day(date: NaiveDate) -> CalendarDayRow {
    let day_of_week = date.weekday().number_from_monday();
    CalendarDayRow {
        date_id: date_id(date),
        full_date: date,
        year: date.year(),
        quarter: (date.month() as i32 - 1) / 3 + 1,
        month: date.month() as i32,
        day: date.day() as i32,
        day_of_week: day_of_week as i32,
        day_name: date.format("%A").to_string(),
        month_name: date.format("%B").to_string(),
        is_weekend: day_of_week >= 6,
    }
}

pub struct Transformer {
    config: DerivationConfig,
}

/// Warehouse-shaped output of one transform pass, ready for the Loader.
#[derive(Debug, Clone, Default)]
pub struct TransformedBatch {
    pub customers: Vec<CustomerRow>,
    pub products: Vec<ProductRow>,
    pub calendar_days: Vec<CalendarDayRow>,
    pub purchases: Vec<PurchaseRow>,
}

impl Transformer {
    pub fn new(config: DerivationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DerivationConfig {
        &self.config
    }

    /// New customers enter as Inactive; the Aggregator re-derives the
    /// segment from facts once the batch's purchases have landed.
    pub fn transform_customer(&self, valid: &ValidCustomer) -> CustomerRow {
        let (city, state) = split_location(&valid.location);
        CustomerRow {
            customer_id: valid.customer_id,
            name: valid.name.clone(),
            email: valid.email.clone(),
            location: valid.location.clone(),
            city,
            state,
            signup_date: valid.signup_date,
            segment: CustomerSegment::Inactive,
        }
    }

    pub fn transform_product(&self, valid: &ValidProduct) -> ProductRow {
        ProductRow {
            product_id: valid.product_id,
            title: valid.title.clone(),
            author: valid.author.clone(),
            category: valid.category.clone(),
            publication_year: valid.publication_year,
            base_price: valid.base_price,
            price_tier: self.config.price_tier(valid.base_price),
            age_category: self.config.age_category(valid.publication_year),
        }
    }

    pub fn transform_purchase(&self, valid: &ValidPurchase) -> PurchaseRow {
        PurchaseRow {
            purchase_id: valid.purchase_id,
            customer_id: valid.customer_id,
            product_id: valid.product_id,
            date_id: date_id(valid.timestamp.date()),
            amount: valid.amount,
            quantity: valid.quantity,
            timestamp: valid.timestamp,
        }
    }

    /// Transform a whole validated batch, synthesizing the calendar
    /// dimension from the distinct purchase dates.
    pub fn transform_batch(
        &self,
        customers: &[ValidCustomer],
        products: &[ValidProduct],
        purchases: &[ValidPurchase],
    ) -> TransformedBatch {
        let mut batch = TransformedBatch {
            customers: customers.iter().map(|c| self.transform_customer(c)).collect(),
            products: products.iter().map(|p| self.transform_product(p)).collect(),
            purchases: purchases.iter().map(|p| self.transform_purchase(p)).collect(),
            ..Default::default()
        };

        let mut dates: Vec<NaiveDate> =
            purchases.iter().map(|p| p.timestamp.date()).collect();
        dates.sort_unstable();
        dates.dedup();
        batch.calendar_days = dates.into_iter().map(calendar_day).collect();

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config() -> DerivationConfig {
        DerivationConfig {
            price_tier_thresholds: vec![10.0, 25.0, 50.0],
            reference_year: 2026,
            segments: SegmentThresholds::default(),
        }
    }

    #[test]
    fn test_price_tiers_default_thresholds() {
        let c = config();
        assert_eq!(c.price_tier(5.0), PriceTier::Budget);
        assert_eq!(c.price_tier(10.0), PriceTier::Standard);
        assert_eq!(c.price_tier(24.99), PriceTier::Standard);
        assert_eq!(c.price_tier(25.0), PriceTier::Premium);
        assert_eq!(c.price_tier(50.0), PriceTier::Luxury);
        assert_eq!(c.price_tier(500.0), PriceTier::Luxury);
    }

    #[test]
    fn test_price_tiers_two_thresholds_use_three_bands() {
        let mut c = config();
        c.price_tier_thresholds = vec![10.0, 50.0];
        assert_eq!(c.price_tier(5.0), PriceTier::Budget);
        assert_eq!(c.price_tier(25.0), PriceTier::Standard);
        assert_eq!(c.price_tier(60.0), PriceTier::Premium);
    }

    #[test]
    fn test_age_category_bands() {
        let c = config();
        assert_eq!(c.age_category(2026), AgeCategory::New);
        assert_eq!(c.age_category(2025), AgeCategory::New);
        assert_eq!(c.age_category(2024), AgeCategory::Recent);
        assert_eq!(c.age_category(2022), AgeCategory::Recent);
        assert_eq!(c.age_category(2021), AgeCategory::Classic);
        assert_eq!(c.age_category(2007), AgeCategory::Classic);
        assert_eq!(c.age_category(2006), AgeCategory::Vintage);
        assert_eq!(c.age_category(1974), AgeCategory::Vintage);
    }

    #[test]
    fn test_customer_segments() {
        let c = config();
        assert_eq!(c.customer_segment(0.0, 0), CustomerSegment::Inactive);
        assert_eq!(c.customer_segment(19.99, 1), CustomerSegment::Occasional);
        assert_eq!(c.customer_segment(150.0, 2), CustomerSegment::Regular);
        assert_eq!(c.customer_segment(40.0, 3), CustomerSegment::Regular);
        assert_eq!(c.customer_segment(600.0, 2), CustomerSegment::HighValue);
        assert_eq!(c.customer_segment(200.0, 10), CustomerSegment::HighValue);
    }

    #[test]
    fn test_date_id_and_calendar_day() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(date_id(date), 20240115);

        let day = calendar_day(date);
        assert_eq!(day.date_id, 20240115);
        assert_eq!(day.year, 2024);
        assert_eq!(day.quarter, 1);
        assert_eq!(day.month, 1);
        assert_eq!(day.day, 15);
        assert_eq!(day.day_of_week, 1); // Monday
        assert_eq!(day.day_name, "Monday");
        assert_eq!(day.month_name, "January");
        assert!(!day.is_weekend);

        let saturday = calendar_day(NaiveDate::from_ymd_opt(2024, 1, 20).unwrap());
        assert!(saturday.is_weekend);
        assert_eq!(saturday.quarter, 1);

        let q4 = calendar_day(NaiveDate::from_ymd_opt(2024, 11, 2).unwrap());
        assert_eq!(q4.quarter, 4);
    }

    #[test]
    fn test_split_location() {
        assert_eq!(
            split_location("Portland, OR"),
            ("Portland".to_string(), "OR".to_string())
        );
        assert_eq!(
            split_location("  Austin ,TX "),
            ("Austin".to_string(), "TX".to_string())
        );
        assert_eq!(
            split_location("Springfield"),
            ("Springfield".to_string(), String::new())
        );
    }

    #[test]
    fn test_transform_batch_builds_distinct_calendar_days() {
        let transformer = Transformer::new(config());
        let ts = |d: u32, h: u32| {
            NaiveDate::from_ymd_opt(2024, 1, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        let purchases = vec![
            super::super::validator::ValidPurchase {
                purchase_id: 1,
                customer_id: 1,
                product_id: 1,
                amount: 10.0,
                quantity: 1,
                timestamp: ts(15, 9),
            },
            super::super::validator::ValidPurchase {
                purchase_id: 2,
                customer_id: 1,
                product_id: 1,
                amount: 10.0,
                quantity: 1,
                timestamp: ts(15, 17),
            },
            super::super::validator::ValidPurchase {
                purchase_id: 3,
                customer_id: 1,
                product_id: 1,
                amount: 10.0,
                quantity: 1,
                timestamp: ts(16, 9),
            },
        ];
        let batch = transformer.transform_batch(&[], &[], &purchases);
        assert_eq!(batch.purchases.len(), 3);
        let ids: Vec<i64> = batch.calendar_days.iter().map(|d| d.date_id).collect();
        assert_eq!(ids, vec![20240115, 20240116]);
    }
}
