//! SQLite schema for the book-sales warehouse.
//!
//! Star layout: three dimension tables and one fact table, plus two
//! derived summary tables owned by the Aggregator. Dimension and fact
//! keys are the natural identifiers from the source data, so uniqueness
//! rides on the primary keys. Referential integrity between facts and
//! dimensions is enforced by the Loader before commit, not by engine
//! foreign keys.

use crate::sql_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const DIM_CUSTOMERS_TABLE: Table = Table {
    name: "dim_customers",
    columns: &[
        sql_column!("customer_id", SqlType::Integer, is_primary_key),
        sql_column!("name", SqlType::Text, non_null),
        sql_column!("email", SqlType::Text, non_null),
        sql_column!("location", SqlType::Text, non_null),
        sql_column!("city", SqlType::Text, non_null),
        sql_column!("state", SqlType::Text, non_null),
        sql_column!("signup_date", SqlType::Text, non_null), // YYYY-MM-DD
        sql_column!("segment", SqlType::Text, non_null),
    ],
    indices: &[("idx_customers_segment", "segment")],
};

const DIM_PRODUCTS_TABLE: Table = Table {
    name: "dim_products",
    columns: &[
        sql_column!("product_id", SqlType::Integer, is_primary_key),
        sql_column!("title", SqlType::Text, non_null),
        sql_column!("author", SqlType::Text, non_null),
        sql_column!("category", SqlType::Text, non_null),
        sql_column!("publication_year", SqlType::Integer, non_null),
        sql_column!("base_price", SqlType::Real, non_null),
        sql_column!("price_tier", SqlType::Text, non_null),
        sql_column!("age_category", SqlType::Text, non_null),
    ],
    indices: &[("idx_products_category", "category")],
};

const DIM_DATES_TABLE: Table = Table {
    name: "dim_dates",
    columns: &[
        sql_column!("date_id", SqlType::Integer, is_primary_key), // y*10000 + m*100 + d
        sql_column!("full_date", SqlType::Text, non_null),
        sql_column!("year", SqlType::Integer, non_null),
        sql_column!("quarter", SqlType::Integer, non_null),
        sql_column!("month", SqlType::Integer, non_null),
        sql_column!("day", SqlType::Integer, non_null),
        sql_column!("day_of_week", SqlType::Integer, non_null),
        sql_column!("day_name", SqlType::Text, non_null),
        sql_column!("month_name", SqlType::Text, non_null),
        sql_column!("is_weekend", SqlType::Integer, non_null),
    ],
    indices: &[("idx_dates_year", "year")],
};

/// Purchases are append-only historical truth; rows are never updated.
const FACT_PURCHASES_TABLE: Table = Table {
    name: "fact_purchases",
    columns: &[
        sql_column!("purchase_id", SqlType::Integer, is_primary_key),
        sql_column!("customer_id", SqlType::Integer, non_null),
        sql_column!("product_id", SqlType::Integer, non_null),
        sql_column!("date_id", SqlType::Integer, non_null),
        sql_column!("amount", SqlType::Real, non_null),
        sql_column!("quantity", SqlType::Integer, non_null),
        sql_column!("timestamp", SqlType::Text, non_null), // YYYY-MM-DD HH:MM:SS
    ],
    // The Aggregator's scoped recompute looks facts up by day, product
    // and customer; these indexes keep it proportional to batch size.
    indices: &[
        ("idx_purchases_date", "date_id"),
        ("idx_purchases_product", "product_id"),
        ("idx_purchases_customer", "customer_id"),
    ],
};

const SUMMARY_DAILY_SALES_TABLE: Table = Table {
    name: "summary_daily_sales",
    columns: &[
        sql_column!("date_id", SqlType::Integer, is_primary_key),
        sql_column!("total_revenue", SqlType::Real, non_null),
        sql_column!("transaction_count", SqlType::Integer, non_null),
        sql_column!("distinct_customers", SqlType::Integer, non_null),
        sql_column!("average_transaction_value", SqlType::Real, non_null),
        sql_column!("total_quantity", SqlType::Integer, non_null),
    ],
    indices: &[],
};

const SUMMARY_PRODUCT_PERFORMANCE_TABLE: Table = Table {
    name: "summary_product_performance",
    columns: &[
        sql_column!("product_id", SqlType::Integer, is_primary_key),
        sql_column!("total_units", SqlType::Integer, non_null),
        sql_column!("total_revenue", SqlType::Real, non_null),
        sql_column!("average_price", SqlType::Real, non_null),
        sql_column!("distinct_customers", SqlType::Integer, non_null),
        sql_column!("first_sale_date_id", SqlType::Integer, non_null),
        sql_column!("last_sale_date_id", SqlType::Integer, non_null),
    ],
    indices: &[("idx_product_performance_revenue", "total_revenue")],
};

pub const WAREHOUSE_SCHEMA: VersionedSchema = VersionedSchema {
    version: 0,
    tables: &[
        DIM_CUSTOMERS_TABLE,
        DIM_PRODUCTS_TABLE,
        DIM_DATES_TABLE,
        FACT_PURCHASES_TABLE,
        SUMMARY_DAILY_SALES_TABLE,
        SUMMARY_PRODUCT_PERFORMANCE_TABLE,
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        WAREHOUSE_SCHEMA.create(&conn).unwrap();
        WAREHOUSE_SCHEMA.validate(&conn).unwrap();
    }

    #[test]
    fn test_duplicate_purchase_id_rejected_by_primary_key() {
        let conn = Connection::open_in_memory().unwrap();
        WAREHOUSE_SCHEMA.create(&conn).unwrap();

        conn.execute(
            "INSERT INTO fact_purchases (purchase_id, customer_id, product_id, date_id, amount, quantity, timestamp)
             VALUES (1, 10, 20, 20240115, 19.99, 1, '2024-01-15 09:30:00')",
            [],
        )
        .unwrap();

        let err = conn.execute(
            "INSERT INTO fact_purchases (purchase_id, customer_id, product_id, date_id, amount, quantity, timestamp)
             VALUES (1, 11, 21, 20240116, 9.99, 1, '2024-01-16 10:00:00')",
            [],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_fact_lookup_by_day_uses_index() {
        let conn = Connection::open_in_memory().unwrap();
        WAREHOUSE_SCHEMA.create(&conn).unwrap();

        let plan: String = conn
            .query_row(
                "EXPLAIN QUERY PLAN SELECT * FROM fact_purchases WHERE date_id = 20240115",
                [],
                |row| row.get(3),
            )
            .unwrap();
        assert!(plan.contains("idx_purchases_date"), "plan was: {}", plan);
    }
}
