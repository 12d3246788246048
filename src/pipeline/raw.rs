//! Raw input records as they arrive from upstream exports.
//!
//! Everything is optional and string-typed here; the Validator decides
//! what survives. Field aliases cover the column names the various
//! source systems use for the same thing.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawCustomer {
    #[serde(alias = "id", alias = "user_id")]
    pub customer_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    #[serde(alias = "join_date", alias = "registration_date")]
    pub signup_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawProduct {
    #[serde(alias = "id", alias = "book_id")]
    pub product_id: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    #[serde(alias = "genre")]
    pub category: Option<String>,
    #[serde(alias = "year")]
    pub publication_year: Option<String>,
    #[serde(alias = "price")]
    pub base_price: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawPurchase {
    #[serde(alias = "id", alias = "transaction_id")]
    pub purchase_id: Option<String>,
    #[serde(alias = "user_id")]
    pub customer_id: Option<String>,
    #[serde(alias = "book_id")]
    pub product_id: Option<String>,
    #[serde(alias = "total", alias = "price")]
    pub amount: Option<String>,
    pub quantity: Option<String>,
    #[serde(alias = "purchase_date", alias = "date")]
    pub timestamp: Option<String>,
}

/// One extraction's worth of raw input, ready for a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    pub customers: Vec<RawCustomer>,
    pub products: Vec<RawProduct>,
    pub purchases: Vec<RawPurchase>,
}

fn read_csv<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file {:?}", path))?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record.with_context(|| format!("Malformed CSV row in {:?}", path))?);
    }
    Ok(records)
}

pub fn read_customers_csv(path: &Path) -> Result<Vec<RawCustomer>> {
    read_csv(path)
}

pub fn read_products_csv(path: &Path) -> Result<Vec<RawProduct>> {
    read_csv(path)
}

pub fn read_purchases_csv(path: &Path) -> Result<Vec<RawPurchase>> {
    read_csv(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_customers_with_aliased_columns() {
        let file = write_temp_csv(
            "user_id,name,email,location,join_date\n\
             1,Ada,ada@example.com,\"Austin, TX\",2021-05-01\n",
        );
        let customers = read_customers_csv(file.path()).unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].customer_id.as_deref(), Some("1"));
        assert_eq!(customers[0].location.as_deref(), Some("Austin, TX"));
        assert_eq!(customers[0].signup_date.as_deref(), Some("2021-05-01"));
    }

    #[test]
    fn test_read_purchases_missing_columns_become_none() {
        let file = write_temp_csv(
            "transaction_id,user_id,book_id,amount\n\
             7,1,10,19.99\n",
        );
        let purchases = read_purchases_csv(file.path()).unwrap();
        assert_eq!(purchases[0].purchase_id.as_deref(), Some("7"));
        assert_eq!(purchases[0].quantity, None);
        assert_eq!(purchases[0].timestamp, None);
    }
}
