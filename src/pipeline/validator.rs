//! Record validation: the gate between raw upstream exports and the
//! typed pipeline. Pure functions, no warehouse access.

use super::raw::{RawCustomer, RawProduct, RawPurchase};
use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectReason {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is not a positive identifier: `{value}`")]
    InvalidId { field: &'static str, value: String },
    #[error("field `{field}` is not a number: `{value}`")]
    InvalidNumber { field: &'static str, value: String },
    #[error("amount {0} is outside (0, {1}]")]
    AmountOutOfRange(f64, f64),
    #[error("quantity must be at least 1, got {0}")]
    InvalidQuantity(i64),
    #[error("base price must be positive, got {0}")]
    NonPositivePrice(f64),
    #[error("publication year {0} is outside {1}..={2}")]
    PublicationYearOutOfRange(i32, i32, i32),
    #[error("invalid email address `{0}`")]
    InvalidEmail(String),
    #[error("field `{field}` is not a valid date: `{value}`")]
    InvalidDate { field: &'static str, value: String },
    #[error("timestamp {0} predates the accepted window start {1}")]
    TimestampTooOld(NaiveDateTime, NaiveDate),
    // Load-stage rejections, surfaced through the same report channel.
    #[error("purchase references unknown customer {0}")]
    UnknownCustomer(i64),
    #[error("purchase references unknown product {0}")]
    UnknownProduct(i64),
    #[error("purchase references unknown calendar day {0}")]
    UnknownCalendarDay(i64),
    #[error("purchase {0} already exists with different content")]
    ConflictingPurchase(i64),
}

impl RejectReason {
    /// Stable machine-readable code for run reports.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MissingField(_) => "missing_field",
            RejectReason::InvalidId { .. } => "invalid_id",
            RejectReason::InvalidNumber { .. } => "invalid_number",
            RejectReason::AmountOutOfRange(..) => "amount_out_of_range",
            RejectReason::InvalidQuantity(_) => "invalid_quantity",
            RejectReason::NonPositivePrice(_) => "non_positive_price",
            RejectReason::PublicationYearOutOfRange(..) => "publication_year_out_of_range",
            RejectReason::InvalidEmail(_) => "invalid_email",
            RejectReason::InvalidDate { .. } => "invalid_date",
            RejectReason::TimestampTooOld(..) => "timestamp_too_old",
            RejectReason::UnknownCustomer(_) => "unknown_customer",
            RejectReason::UnknownProduct(_) => "unknown_product",
            RejectReason::UnknownCalendarDay(_) => "unknown_calendar_day",
            RejectReason::ConflictingPurchase(_) => "conflicting_purchase",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Customer,
    Product,
    Purchase,
}

/// A raw record the validator (or a later stage) turned away, with
/// whatever identifier the source row carried.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub kind: RecordKind,
    pub source_id: Option<String>,
    pub reason: RejectReason,
}

/// Validator output for one record type.
#[derive(Debug, Clone)]
pub struct Partition<T> {
    pub valid: Vec<T>,
    pub rejected: Vec<RejectedRecord>,
}

impl<T> Default for Partition<T> {
    fn default() -> Self {
        Self {
            valid: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidCustomer {
    pub customer_id: i64,
    pub name: String,
    pub email: String,
    pub location: String,
    pub signup_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidProduct {
    pub product_id: i64,
    pub title: String,
    pub author: String,
    pub category: String,
    pub publication_year: i32,
    pub base_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidPurchase {
    pub purchase_id: i64,
    pub customer_id: i64,
    pub product_id: i64,
    pub amount: f64,
    pub quantity: i64,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Copy)]
pub struct Validator {
    /// Upper bound for a single purchase amount; the lower bound is
    /// always exclusive zero.
    pub max_amount: f64,
    /// Purchases timestamped before this date are considered corrupt
    /// exports and rejected.
    pub min_valid_date: NaiveDate,
    /// Latest publication year accepted for a product (forthcoming
    /// titles are allowed one year ahead).
    pub max_publication_year: i32,
}

const MIN_PUBLICATION_YEAR: i32 = 1900;
const DATE_FMT: &str = "%Y-%m-%d";

fn required<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, RejectReason> {
    match value.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(RejectReason::MissingField(field)),
    }
}

fn parse_id(value: &str, field: &'static str) -> Result<i64, RejectReason> {
    let id = value.parse::<i64>().map_err(|_| RejectReason::InvalidId {
        field,
        value: value.to_string(),
    })?;
    if id <= 0 {
        return Err(RejectReason::InvalidId {
            field,
            value: value.to_string(),
        });
    }
    Ok(id)
}

fn parse_f64(value: &str, field: &'static str) -> Result<f64, RejectReason> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RejectReason::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

fn parse_date(value: &str, field: &'static str) -> Result<NaiveDate, RejectReason> {
    NaiveDate::parse_from_str(value, DATE_FMT).map_err(|_| RejectReason::InvalidDate {
        field,
        value: value.to_string(),
    })
}

/// Accepts `YYYY-MM-DD HH:MM:SS`, ISO `T` separators, or a bare date
/// (midnight assumed). Anything else is rejected.
fn parse_timestamp(value: &str) -> Result<NaiveDateTime, RejectReason> {
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FMT) {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts);
        }
    }
    Err(RejectReason::InvalidDate {
        field: "timestamp",
        value: value.to_string(),
    })
}

impl Validator {
    pub fn validate_customer(&self, raw: &RawCustomer) -> Result<ValidCustomer, RejectReason> {
        let customer_id = parse_id(required(&raw.customer_id, "customer_id")?, "customer_id")?;
        let name = required(&raw.name, "name")?.to_string();
        let email = required(&raw.email, "email")?.to_string();
        if !EMAIL_REGEX.is_match(&email) {
            return Err(RejectReason::InvalidEmail(email));
        }
        let location = required(&raw.location, "location")?.to_string();
        let signup_date = parse_date(required(&raw.signup_date, "signup_date")?, "signup_date")?;
        Ok(ValidCustomer {
            customer_id,
            name,
            email,
            location,
            signup_date,
        })
    }

    pub fn validate_product(&self, raw: &RawProduct) -> Result<ValidProduct, RejectReason> {
        let product_id = parse_id(required(&raw.product_id, "product_id")?, "product_id")?;
        let title = required(&raw.title, "title")?.to_string();
        let author = required(&raw.author, "author")?.to_string();
        let category = required(&raw.category, "category")?.to_string();

        let year_str = required(&raw.publication_year, "publication_year")?;
        let publication_year =
            year_str
                .parse::<i32>()
                .map_err(|_| RejectReason::InvalidNumber {
                    field: "publication_year",
                    value: year_str.to_string(),
                })?;
        if publication_year < MIN_PUBLICATION_YEAR
            || publication_year > self.max_publication_year
        {
            return Err(RejectReason::PublicationYearOutOfRange(
                publication_year,
                MIN_PUBLICATION_YEAR,
                self.max_publication_year,
            ));
        }

        let base_price = parse_f64(required(&raw.base_price, "base_price")?, "base_price")?;
        if base_price <= 0.0 {
            return Err(RejectReason::NonPositivePrice(base_price));
        }

        Ok(ValidProduct {
            product_id,
            title,
            author,
            category,
            publication_year,
            base_price,
        })
    }

    pub fn validate_purchase(&self, raw: &RawPurchase) -> Result<ValidPurchase, RejectReason> {
        let purchase_id = parse_id(required(&raw.purchase_id, "purchase_id")?, "purchase_id")?;
        let customer_id = parse_id(required(&raw.customer_id, "customer_id")?, "customer_id")?;
        let product_id = parse_id(required(&raw.product_id, "product_id")?, "product_id")?;

        let amount = parse_f64(required(&raw.amount, "amount")?, "amount")?;
        if amount <= 0.0 || amount > self.max_amount {
            return Err(RejectReason::AmountOutOfRange(amount, self.max_amount));
        }

        // Quantity is optional upstream; a missing value means one unit.
        let quantity = match raw.quantity.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(s) => {
                let q = s.parse::<i64>().map_err(|_| RejectReason::InvalidNumber {
                    field: "quantity",
                    value: s.to_string(),
                })?;
                if q < 1 {
                    return Err(RejectReason::InvalidQuantity(q));
                }
                q
            }
        };

        let timestamp = parse_timestamp(required(&raw.timestamp, "timestamp")?)?;
        if timestamp.date() < self.min_valid_date {
            return Err(RejectReason::TimestampTooOld(timestamp, self.min_valid_date));
        }

        Ok(ValidPurchase {
            purchase_id,
            customer_id,
            product_id,
            amount,
            quantity,
            timestamp,
        })
    }

    pub fn validate_customers(&self, raws: &[RawCustomer]) -> Partition<ValidCustomer> {
        let mut partition = Partition::default();
        for raw in raws {
            match self.validate_customer(raw) {
                Ok(valid) => partition.valid.push(valid),
                Err(reason) => partition.rejected.push(RejectedRecord {
                    kind: RecordKind::Customer,
                    source_id: raw.customer_id.clone(),
                    reason,
                }),
            }
        }
        partition
    }

    pub fn validate_products(&self, raws: &[RawProduct]) -> Partition<ValidProduct> {
        let mut partition = Partition::default();
        for raw in raws {
            match self.validate_product(raw) {
                Ok(valid) => partition.valid.push(valid),
                Err(reason) => partition.rejected.push(RejectedRecord {
                    kind: RecordKind::Product,
                    source_id: raw.product_id.clone(),
                    reason,
                }),
            }
        }
        partition
    }

    pub fn validate_purchases(&self, raws: &[RawPurchase]) -> Partition<ValidPurchase> {
        let mut partition = Partition::default();
        for raw in raws {
            match self.validate_purchase(raw) {
                Ok(valid) => partition.valid.push(valid),
                Err(reason) => partition.rejected.push(RejectedRecord {
                    kind: RecordKind::Purchase,
                    source_id: raw.purchase_id.clone(),
                    reason,
                }),
            }
        }
        partition
    }
}
