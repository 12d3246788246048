//! Shared fixtures for end-to-end pipeline tests.
#![allow(dead_code)]

use booksales_warehouse::pipeline::raw::{RawBatch, RawCustomer, RawProduct, RawPurchase};
use booksales_warehouse::pipeline::runner::PipelineRunner;
use booksales_warehouse::pipeline::transformer::DerivationConfig;
use booksales_warehouse::pipeline::validator::Validator;
use booksales_warehouse::warehouse::SqliteWarehouseStore;
use chrono::NaiveDate;
use std::path::Path;

pub const CUSTOMER_ADA_ID: &str = "1";
pub const CUSTOMER_GRACE_ID: &str = "2";
pub const CUSTOMER_ALAN_ID: &str = "3";
pub const PRODUCT_DISPOSSESSED_ID: &str = "10";
pub const PRODUCT_PIRANESI_ID: &str = "11";

/// A warehouse backed by a temp file, as production runs use. The
/// handle keeps the directory alive for the test's duration.
pub struct TestWarehouse {
    pub store: SqliteWarehouseStore,
    _dir: tempfile::TempDir,
}

impl TestWarehouse {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteWarehouseStore::open(&dir.path().join("warehouse.db"), 1_000).unwrap();
        Self { store, _dir: dir }
    }

    /// Reopen the same database file, as a second process would.
    pub fn reopen(&self) -> SqliteWarehouseStore {
        SqliteWarehouseStore::open(&self._dir.path().join("warehouse.db"), 1_000).unwrap()
    }

    pub fn db_path(&self) -> std::path::PathBuf {
        self._dir.path().join("warehouse.db")
    }
}

pub fn test_validator() -> Validator {
    Validator {
        max_amount: 10_000.0,
        min_valid_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
        max_publication_year: 2027,
    }
}

pub fn test_derivations() -> DerivationConfig {
    DerivationConfig {
        price_tier_thresholds: vec![10.0, 25.0, 50.0],
        reference_year: 2026,
        segments: Default::default(),
    }
}

pub fn test_runner(store: &SqliteWarehouseStore) -> PipelineRunner<'_> {
    PipelineRunner::new(store, test_validator(), test_derivations(), None)
}

pub fn customer(id: &str, name: &str, location: &str) -> RawCustomer {
    RawCustomer {
        customer_id: Some(id.to_string()),
        name: Some(name.to_string()),
        email: Some(format!(
            "{}@example.com",
            name.to_lowercase().replace(' ', ".")
        )),
        location: Some(location.to_string()),
        signup_date: Some("2021-05-01".to_string()),
    }
}

pub fn product(id: &str, title: &str, year: &str, price: &str) -> RawProduct {
    RawProduct {
        product_id: Some(id.to_string()),
        title: Some(title.to_string()),
        author: Some("Test Author".to_string()),
        category: Some("Fiction".to_string()),
        publication_year: Some(year.to_string()),
        base_price: Some(price.to_string()),
    }
}

pub fn purchase(
    id: &str,
    customer_id: &str,
    product_id: &str,
    amount: &str,
    timestamp: &str,
) -> RawPurchase {
    RawPurchase {
        purchase_id: Some(id.to_string()),
        customer_id: Some(customer_id.to_string()),
        product_id: Some(product_id.to_string()),
        amount: Some(amount.to_string()),
        quantity: Some("1".to_string()),
        timestamp: Some(timestamp.to_string()),
    }
}

/// Three customers, two products, three same-day purchases.
pub fn sample_batch() -> RawBatch {
    RawBatch {
        customers: vec![
            customer(CUSTOMER_ADA_ID, "Ada Lovelace", "Austin, TX"),
            customer(CUSTOMER_GRACE_ID, "Grace Hopper", "Arlington, VA"),
            customer(CUSTOMER_ALAN_ID, "Alan Turing", "Princeton, NJ"),
        ],
        products: vec![
            product(PRODUCT_DISPOSSESSED_ID, "The Dispossessed", "1974", "12.50"),
            product(PRODUCT_PIRANESI_ID, "Piranesi", "2020", "27.00"),
        ],
        purchases: vec![
            purchase("100", CUSTOMER_ADA_ID, PRODUCT_DISPOSSESSED_ID, "12.50", "2024-01-15 09:30:00"),
            purchase("101", CUSTOMER_GRACE_ID, PRODUCT_DISPOSSESSED_ID, "12.50", "2024-01-15 13:05:00"),
            purchase("102", CUSTOMER_ALAN_ID, PRODUCT_PIRANESI_ID, "27.00", "2024-01-15 18:45:00"),
        ],
    }
}

pub fn write_csv(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
