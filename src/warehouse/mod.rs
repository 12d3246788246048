mod models;
mod schema;
mod store;

pub use models::{
    AgeCategory, AnalyticsOverview, CalendarDayRow, CustomerRow, CustomerSegment,
    DailySummaryRow, PriceTier, ProductPerformanceRow, ProductRow, PurchaseRow,
};
pub use store::{
    DimensionLoadCounts, FactLoadOutcome, FactReject, SqliteWarehouseStore, UpsertCounts,
    WarehouseStore,
};
