//! Warehouse store: the only component that issues SQL.
//!
//! The Loader and Aggregator own the write policy; this module owns the
//! mechanics. Each mutating method runs as a single transaction so that
//! a mid-stage failure leaves the warehouse at either the pre-stage or
//! post-stage snapshot, never in between.

use super::models::{
    AgeCategory, AnalyticsOverview, CalendarDayRow, CustomerRow, CustomerSegment, DailySummaryRow,
    PriceTier, ProductPerformanceRow, ProductRow, PurchaseRow,
};
use super::schema::WAREHOUSE_SCHEMA;
use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

const DATE_FMT: &str = "%Y-%m-%d";
const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of a dimension upsert pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct UpsertCounts {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
}

/// Why a fact row was turned away by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactReject {
    /// Referenced customer does not exist even after this batch's
    /// dimension load.
    UnknownCustomer(i64),
    UnknownProduct(i64),
    UnknownCalendarDay(i64),
    /// A purchase with this identifier exists with different content;
    /// the stored row is preserved.
    Conflicting,
}

/// Per-stage report from a fact insert pass, including the keys the
/// Aggregator must recompute.
#[derive(Debug, Clone, Default)]
pub struct FactLoadOutcome {
    pub inserted: u64,
    pub skipped_duplicates: u64,
    pub rejected: Vec<(i64, FactReject)>,
    pub touched_date_ids: BTreeSet<i64>,
    pub touched_product_ids: BTreeSet<i64>,
    pub touched_customer_ids: BTreeSet<i64>,
}

/// Counts from a combined dimension load (one transaction).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DimensionLoadCounts {
    pub customers: UpsertCounts,
    pub products: UpsertCounts,
    pub calendar_days: UpsertCounts,
}

pub trait WarehouseStore: Send + Sync {
    // ==================== Loader surface ====================

    /// Upsert all dimension rows for a batch in one transaction:
    /// insert if absent, update in place if any field differs, leave
    /// untouched if identical.
    fn load_dimensions(
        &self,
        customers: &[CustomerRow],
        products: &[ProductRow],
        calendar_days: &[CalendarDayRow],
    ) -> Result<DimensionLoadCounts>;

    /// Insert fact rows in one transaction. Rows referencing missing
    /// dimensions or conflicting with an existing purchase are reported
    /// in the outcome and not inserted; everything else commits.
    fn insert_purchases(&self, rows: &[PurchaseRow]) -> Result<FactLoadOutcome>;

    // ==================== Aggregator surface ====================

    /// Recompute the daily summary and product performance rows for the
    /// given keys by full aggregation over current facts, in one
    /// transaction. Returns (days recomputed, products recomputed).
    fn refresh_summaries(&self, date_ids: &[i64], product_ids: &[i64]) -> Result<(usize, usize)>;

    /// Re-derive segment labels for the given customers in one
    /// transaction. History is aggregated from facts and the label
    /// written inside the same critical section, so a concurrent batch
    /// touching the same customer cannot land a stale label. Unchanged
    /// labels are skipped; returns the number actually updated.
    fn rederive_segments(
        &self,
        customer_ids: &[i64],
        derive: &dyn Fn(f64, i64) -> CustomerSegment,
    ) -> Result<usize>;

    // ==================== Read surface ====================

    fn get_customer(&self, customer_id: i64) -> Result<Option<CustomerRow>>;
    fn get_product(&self, product_id: i64) -> Result<Option<ProductRow>>;
    fn get_calendar_day(&self, date_id: i64) -> Result<Option<CalendarDayRow>>;
    fn get_purchase(&self, purchase_id: i64) -> Result<Option<PurchaseRow>>;
    fn get_daily_summary(&self, date_id: i64) -> Result<Option<DailySummaryRow>>;
    fn get_product_performance(&self, product_id: i64) -> Result<Option<ProductPerformanceRow>>;

    /// Daily summaries for `from_date_id..=to_date_id`, ascending.
    fn daily_summaries_between(
        &self,
        from_date_id: i64,
        to_date_id: i64,
    ) -> Result<Vec<DailySummaryRow>>;

    /// Product performance rows ordered by total revenue, descending.
    fn top_products_by_revenue(&self, limit: usize) -> Result<Vec<ProductPerformanceRow>>;

    fn analytics_overview(&self) -> Result<AnalyticsOverview>;

    fn purchase_count(&self) -> Result<i64>;
}

/// SQLite implementation of [`WarehouseStore`].
pub struct SqliteWarehouseStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteWarehouseStore {
    /// Open or create a warehouse database. A fresh file gets the
    /// schema created; an existing file is validated against it.
    pub fn open(path: &Path, busy_timeout_ms: u64) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open warehouse database: {:?}", path))?;
        Self::init(conn, busy_timeout_ms)
    }

    /// In-memory warehouse, for tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, 0)
    }

    fn init(conn: Connection, busy_timeout_ms: u64) -> Result<Self> {
        if busy_timeout_ms > 0 {
            conn.busy_timeout(std::time::Duration::from_millis(busy_timeout_ms))?;
        }
        let table_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
            [],
            |row| row.get(0),
        )?;
        if table_count == 0 {
            WAREHOUSE_SCHEMA
                .create(&conn)
                .context("Failed to create warehouse schema")?;
        }
        WAREHOUSE_SCHEMA
            .validate(&conn)
            .context("Warehouse schema validation failed")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Warehouse connection mutex poisoned"))
    }

    // ==================== Row mappers ====================

    fn row_to_customer(row: &rusqlite::Row) -> rusqlite::Result<CustomerRow> {
        Ok(CustomerRow {
            customer_id: row.get("customer_id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            location: row.get("location")?,
            city: row.get("city")?,
            state: row.get("state")?,
            signup_date: parse_date_col(&row.get::<_, String>("signup_date")?)?,
            segment: CustomerSegment::parse(&row.get::<_, String>("segment")?)
                .unwrap_or(CustomerSegment::Inactive),
        })
    }

    fn row_to_product(row: &rusqlite::Row) -> rusqlite::Result<ProductRow> {
        Ok(ProductRow {
            product_id: row.get("product_id")?,
            title: row.get("title")?,
            author: row.get("author")?,
            category: row.get("category")?,
            publication_year: row.get("publication_year")?,
            base_price: row.get("base_price")?,
            price_tier: PriceTier::parse(&row.get::<_, String>("price_tier")?)
                .unwrap_or(PriceTier::Standard),
            age_category: AgeCategory::parse(&row.get::<_, String>("age_category")?)
                .unwrap_or(AgeCategory::Recent),
        })
    }

    fn row_to_calendar_day(row: &rusqlite::Row) -> rusqlite::Result<CalendarDayRow> {
        Ok(CalendarDayRow {
            date_id: row.get("date_id")?,
            full_date: parse_date_col(&row.get::<_, String>("full_date")?)?,
            year: row.get("year")?,
            quarter: row.get("quarter")?,
            month: row.get("month")?,
            day: row.get("day")?,
            day_of_week: row.get("day_of_week")?,
            day_name: row.get("day_name")?,
            month_name: row.get("month_name")?,
            is_weekend: row.get::<_, i32>("is_weekend")? != 0,
        })
    }

    fn row_to_purchase(row: &rusqlite::Row) -> rusqlite::Result<PurchaseRow> {
        Ok(PurchaseRow {
            purchase_id: row.get("purchase_id")?,
            customer_id: row.get("customer_id")?,
            product_id: row.get("product_id")?,
            date_id: row.get("date_id")?,
            amount: row.get("amount")?,
            quantity: row.get("quantity")?,
            timestamp: parse_timestamp_col(&row.get::<_, String>("timestamp")?)?,
        })
    }

    fn row_to_daily_summary(row: &rusqlite::Row) -> rusqlite::Result<DailySummaryRow> {
        Ok(DailySummaryRow {
            date_id: row.get("date_id")?,
            total_revenue: row.get("total_revenue")?,
            transaction_count: row.get("transaction_count")?,
            distinct_customers: row.get("distinct_customers")?,
            average_transaction_value: row.get("average_transaction_value")?,
            total_quantity: row.get("total_quantity")?,
        })
    }

    fn row_to_product_performance(row: &rusqlite::Row) -> rusqlite::Result<ProductPerformanceRow> {
        Ok(ProductPerformanceRow {
            product_id: row.get("product_id")?,
            total_units: row.get("total_units")?,
            total_revenue: row.get("total_revenue")?,
            average_price: row.get("average_price")?,
            distinct_customers: row.get("distinct_customers")?,
            first_sale_date_id: row.get("first_sale_date_id")?,
            last_sale_date_id: row.get("last_sale_date_id")?,
        })
    }

    // ==================== Upsert helpers ====================

    fn upsert_customer_tx(tx: &Transaction, row: &CustomerRow) -> Result<Upsert> {
        let existing = tx
            .query_row(
                "SELECT * FROM dim_customers WHERE customer_id = ?1",
                params![row.customer_id],
                Self::row_to_customer,
            )
            .optional()?;

        match existing {
            None => {
                tx.execute(
                    "INSERT INTO dim_customers (customer_id, name, email, location, city, state, signup_date, segment)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        row.customer_id,
                        row.name,
                        row.email,
                        row.location,
                        row.city,
                        row.state,
                        row.signup_date.format(DATE_FMT).to_string(),
                        row.segment.as_str(),
                    ],
                )?;
                Ok(Upsert::Inserted)
            }
            Some(current) => {
                // Segment is owned by the re-derivation pass; a raw
                // reload must neither clobber a label derived from
                // facts nor count as an update because of it.
                let identical_but_segment = CustomerRow {
                    segment: current.segment,
                    ..row.clone()
                } == current;
                if identical_but_segment {
                    return Ok(Upsert::Unchanged);
                }
                tx.execute(
                    "UPDATE dim_customers SET name = ?2, email = ?3, location = ?4, city = ?5, state = ?6, signup_date = ?7
                     WHERE customer_id = ?1",
                    params![
                        row.customer_id,
                        row.name,
                        row.email,
                        row.location,
                        row.city,
                        row.state,
                        row.signup_date.format(DATE_FMT).to_string(),
                    ],
                )?;
                Ok(Upsert::Updated)
            }
        }
    }

    fn upsert_product_tx(tx: &Transaction, row: &ProductRow) -> Result<Upsert> {
        let existing = tx
            .query_row(
                "SELECT * FROM dim_products WHERE product_id = ?1",
                params![row.product_id],
                Self::row_to_product,
            )
            .optional()?;

        match existing {
            None => {
                tx.execute(
                    "INSERT INTO dim_products (product_id, title, author, category, publication_year, base_price, price_tier, age_category)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        row.product_id,
                        row.title,
                        row.author,
                        row.category,
                        row.publication_year,
                        row.base_price,
                        row.price_tier.as_str(),
                        row.age_category.as_str(),
                    ],
                )?;
                Ok(Upsert::Inserted)
            }
            Some(ref current) if current == row => Ok(Upsert::Unchanged),
            Some(_) => {
                tx.execute(
                    "UPDATE dim_products SET title = ?2, author = ?3, category = ?4, publication_year = ?5, base_price = ?6, price_tier = ?7, age_category = ?8
                     WHERE product_id = ?1",
                    params![
                        row.product_id,
                        row.title,
                        row.author,
                        row.category,
                        row.publication_year,
                        row.base_price,
                        row.price_tier.as_str(),
                        row.age_category.as_str(),
                    ],
                )?;
                Ok(Upsert::Updated)
            }
        }
    }

    fn upsert_calendar_day_tx(tx: &Transaction, row: &CalendarDayRow) -> Result<Upsert> {
        let existing = tx
            .query_row(
                "SELECT * FROM dim_dates WHERE date_id = ?1",
                params![row.date_id],
                Self::row_to_calendar_day,
            )
            .optional()?;

        match existing {
            None => {
                tx.execute(
                    "INSERT INTO dim_dates (date_id, full_date, year, quarter, month, day, day_of_week, day_name, month_name, is_weekend)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        row.date_id,
                        row.full_date.format(DATE_FMT).to_string(),
                        row.year,
                        row.quarter,
                        row.month,
                        row.day,
                        row.day_of_week,
                        row.day_name,
                        row.month_name,
                        row.is_weekend as i32,
                    ],
                )?;
                Ok(Upsert::Inserted)
            }
            // Calendar attributes are a pure function of the date, so a
            // differing row here means a derivation change; update in place.
            Some(ref current) if current == row => Ok(Upsert::Unchanged),
            Some(_) => {
                tx.execute(
                    "UPDATE dim_dates SET full_date = ?2, year = ?3, quarter = ?4, month = ?5, day = ?6, day_of_week = ?7, day_name = ?8, month_name = ?9, is_weekend = ?10
                     WHERE date_id = ?1",
                    params![
                        row.date_id,
                        row.full_date.format(DATE_FMT).to_string(),
                        row.year,
                        row.quarter,
                        row.month,
                        row.day,
                        row.day_of_week,
                        row.day_name,
                        row.month_name,
                        row.is_weekend as i32,
                    ],
                )?;
                Ok(Upsert::Updated)
            }
        }
    }

    fn dimension_exists(tx: &Transaction, table: &str, key: &str, id: i64) -> Result<bool> {
        let found: Option<i64> = tx
            .query_row(
                &format!("SELECT 1 FROM {} WHERE {} = ?1", table, key),
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

fn tally(counts: &mut UpsertCounts, outcome: Upsert) {
    match outcome {
        Upsert::Inserted => counts.inserted += 1,
        Upsert::Updated => counts.updated += 1,
        Upsert::Unchanged => counts.unchanged += 1,
    }
}

fn parse_date_col(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|_| {
        rusqlite::Error::InvalidColumnType(0, s.to_string(), rusqlite::types::Type::Text)
    })
}

fn parse_timestamp_col(s: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FMT).map_err(|_| {
        rusqlite::Error::InvalidColumnType(0, s.to_string(), rusqlite::types::Type::Text)
    })
}

impl WarehouseStore for SqliteWarehouseStore {
    // ==================== Loader surface ====================

    fn load_dimensions(
        &self,
        customers: &[CustomerRow],
        products: &[ProductRow],
        calendar_days: &[CalendarDayRow],
    ) -> Result<DimensionLoadCounts> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut counts = DimensionLoadCounts::default();

        for row in customers {
            tally(&mut counts.customers, Self::upsert_customer_tx(&tx, row)?);
        }
        for row in products {
            tally(&mut counts.products, Self::upsert_product_tx(&tx, row)?);
        }
        for row in calendar_days {
            tally(
                &mut counts.calendar_days,
                Self::upsert_calendar_day_tx(&tx, row)?,
            );
        }

        tx.commit().context("Failed to commit dimension load")?;
        Ok(counts)
    }

    fn insert_purchases(&self, rows: &[PurchaseRow]) -> Result<FactLoadOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut outcome = FactLoadOutcome::default();

        for row in rows {
            if !Self::dimension_exists(&tx, "dim_customers", "customer_id", row.customer_id)? {
                outcome
                    .rejected
                    .push((row.purchase_id, FactReject::UnknownCustomer(row.customer_id)));
                continue;
            }
            if !Self::dimension_exists(&tx, "dim_products", "product_id", row.product_id)? {
                outcome
                    .rejected
                    .push((row.purchase_id, FactReject::UnknownProduct(row.product_id)));
                continue;
            }
            if !Self::dimension_exists(&tx, "dim_dates", "date_id", row.date_id)? {
                outcome
                    .rejected
                    .push((row.purchase_id, FactReject::UnknownCalendarDay(row.date_id)));
                continue;
            }

            let existing = tx
                .query_row(
                    "SELECT * FROM fact_purchases WHERE purchase_id = ?1",
                    params![row.purchase_id],
                    Self::row_to_purchase,
                )
                .optional()?;

            match existing {
                Some(ref current) if current == row => {
                    outcome.skipped_duplicates += 1;
                }
                Some(_) => {
                    outcome.rejected.push((row.purchase_id, FactReject::Conflicting));
                }
                None => {
                    tx.execute(
                        "INSERT INTO fact_purchases (purchase_id, customer_id, product_id, date_id, amount, quantity, timestamp)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            row.purchase_id,
                            row.customer_id,
                            row.product_id,
                            row.date_id,
                            row.amount,
                            row.quantity,
                            row.timestamp.format(TIMESTAMP_FMT).to_string(),
                        ],
                    )?;
                    outcome.inserted += 1;
                    outcome.touched_date_ids.insert(row.date_id);
                    outcome.touched_product_ids.insert(row.product_id);
                    outcome.touched_customer_ids.insert(row.customer_id);
                }
            }
        }

        tx.commit().context("Failed to commit fact load")?;
        Ok(outcome)
    }

    // ==================== Aggregator surface ====================

    fn refresh_summaries(&self, date_ids: &[i64], product_ids: &[i64]) -> Result<(usize, usize)> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut days = 0usize;
        let mut products = 0usize;

        for date_id in date_ids {
            let (revenue, count, customers, avg, quantity): (f64, i64, i64, f64, i64) = tx
                .query_row(
                    "SELECT COALESCE(SUM(amount), 0), COUNT(purchase_id), COUNT(DISTINCT customer_id),
                            COALESCE(AVG(amount), 0), COALESCE(SUM(quantity), 0)
                     FROM fact_purchases WHERE date_id = ?1",
                    params![date_id],
                    |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                    },
                )?;

            if count == 0 {
                // Full recompute from facts: a day with no facts has no
                // summary row.
                tx.execute(
                    "DELETE FROM summary_daily_sales WHERE date_id = ?1",
                    params![date_id],
                )?;
            } else {
                tx.execute(
                    "INSERT OR REPLACE INTO summary_daily_sales
                     (date_id, total_revenue, transaction_count, distinct_customers, average_transaction_value, total_quantity)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![date_id, revenue, count, customers, avg, quantity],
                )?;
            }
            days += 1;
        }

        for product_id in product_ids {
            let (units, revenue, avg, customers, count): (i64, f64, f64, i64, i64) = tx
                .query_row(
                    "SELECT COALESCE(SUM(quantity), 0), COALESCE(SUM(amount), 0), COALESCE(AVG(amount), 0),
                            COUNT(DISTINCT customer_id), COUNT(purchase_id)
                     FROM fact_purchases WHERE product_id = ?1",
                    params![product_id],
                    |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                    },
                )?;

            if count == 0 {
                tx.execute(
                    "DELETE FROM summary_product_performance WHERE product_id = ?1",
                    params![product_id],
                )?;
            } else {
                let (first, last): (i64, i64) = tx.query_row(
                    "SELECT MIN(date_id), MAX(date_id) FROM fact_purchases WHERE product_id = ?1",
                    params![product_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                tx.execute(
                    "INSERT OR REPLACE INTO summary_product_performance
                     (product_id, total_units, total_revenue, average_price, distinct_customers, first_sale_date_id, last_sale_date_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![product_id, units, revenue, avg, customers, first, last],
                )?;
            }
            products += 1;
        }

        tx.commit().context("Failed to commit summary refresh")?;
        Ok((days, products))
    }

    fn rederive_segments(
        &self,
        customer_ids: &[i64],
        derive: &dyn Fn(f64, i64) -> CustomerSegment,
    ) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut updated = 0usize;

        for customer_id in customer_ids {
            let (total_spend, purchase_count): (f64, i64) = tx.query_row(
                "SELECT COALESCE(SUM(amount), 0), COUNT(purchase_id)
                 FROM fact_purchases WHERE customer_id = ?1",
                params![customer_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            let segment = derive(total_spend, purchase_count);
            updated += tx.execute(
                "UPDATE dim_customers SET segment = ?2 WHERE customer_id = ?1 AND segment != ?2",
                params![customer_id, segment.as_str()],
            )?;
        }

        tx.commit().context("Failed to commit segment re-derivation")?;
        Ok(updated)
    }

    // ==================== Read surface ====================

    fn get_customer(&self, customer_id: i64) -> Result<Option<CustomerRow>> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                "SELECT * FROM dim_customers WHERE customer_id = ?1",
                params![customer_id],
                Self::row_to_customer,
            )
            .optional()?;
        Ok(result)
    }

    fn get_product(&self, product_id: i64) -> Result<Option<ProductRow>> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                "SELECT * FROM dim_products WHERE product_id = ?1",
                params![product_id],
                Self::row_to_product,
            )
            .optional()?;
        Ok(result)
    }

    fn get_calendar_day(&self, date_id: i64) -> Result<Option<CalendarDayRow>> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                "SELECT * FROM dim_dates WHERE date_id = ?1",
                params![date_id],
                Self::row_to_calendar_day,
            )
            .optional()?;
        Ok(result)
    }

    fn get_purchase(&self, purchase_id: i64) -> Result<Option<PurchaseRow>> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                "SELECT * FROM fact_purchases WHERE purchase_id = ?1",
                params![purchase_id],
                Self::row_to_purchase,
            )
            .optional()?;
        Ok(result)
    }

    fn get_daily_summary(&self, date_id: i64) -> Result<Option<DailySummaryRow>> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                "SELECT * FROM summary_daily_sales WHERE date_id = ?1",
                params![date_id],
                Self::row_to_daily_summary,
            )
            .optional()?;
        Ok(result)
    }

    fn get_product_performance(&self, product_id: i64) -> Result<Option<ProductPerformanceRow>> {
        let conn = self.lock()?;
        let result = conn
            .query_row(
                "SELECT * FROM summary_product_performance WHERE product_id = ?1",
                params![product_id],
                Self::row_to_product_performance,
            )
            .optional()?;
        Ok(result)
    }

    fn daily_summaries_between(
        &self,
        from_date_id: i64,
        to_date_id: i64,
    ) -> Result<Vec<DailySummaryRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM summary_daily_sales WHERE date_id >= ?1 AND date_id <= ?2 ORDER BY date_id ASC",
        )?;
        let rows = stmt
            .query_map(params![from_date_id, to_date_id], Self::row_to_daily_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn top_products_by_revenue(&self, limit: usize) -> Result<Vec<ProductPerformanceRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM summary_product_performance ORDER BY total_revenue DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], Self::row_to_product_performance)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn analytics_overview(&self) -> Result<AnalyticsOverview> {
        let conn = self.lock()?;
        let (total_revenue, total_transactions): (f64, i64) = conn.query_row(
            "SELECT COALESCE(SUM(amount), 0), COUNT(purchase_id) FROM fact_purchases",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let total_customers: i64 =
            conn.query_row("SELECT COUNT(*) FROM dim_customers", [], |row| row.get(0))?;
        let total_products: i64 =
            conn.query_row("SELECT COUNT(*) FROM dim_products", [], |row| row.get(0))?;
        let average_transaction_value = if total_transactions > 0 {
            total_revenue / total_transactions as f64
        } else {
            0.0
        };
        Ok(AnalyticsOverview {
            total_revenue,
            total_transactions,
            total_customers,
            total_products,
            average_transaction_value,
        })
    }

    fn purchase_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row("SELECT COUNT(*) FROM fact_purchases", [], |row| row.get(0))?;
        Ok(count)
    }
}
