/// Catalog and column name constants shared by the transforms, the sinks and the CLI

// Catalog locations
pub const DATABASE: &str = "bursa_market_share";
pub const RAW_TABLE: &str = "bursa_raw";
pub const SILVER_TABLE: &str = "bursa_silver";
pub const GOLD_TABLE: &str = "bursa_gold";

// Default sink paths (relative to the working directory)
pub const SILVER_PATH: &str = "bursa-curated";
pub const GOLD_PATH: &str = "bursa-transformed";

// Raw columns as scraped from source
pub const COL_CASHTAG_RAW: &str = "cashtag";
pub const COL_PCT_CHG_RAW: &str = "%chg";
pub const COL_BUY_QTY_RAW: &str = "BUY (QTY)";
pub const COL_SELL_QTY_RAW: &str = "SELL (QTY)";
pub const COL_HIGH: &str = "HIGH";
pub const COL_LOW: &str = "LOW";
pub const COL_CLOSE: &str = "CLOSE";
pub const COL_PRICE: &str = "PRICE";
pub const COL_NAME: &str = "NAME";
pub const COL_CHG: &str = "CHG";
pub const COL_VOLUME: &str = "VOLUME";

// Derived columns
pub const COL_CASHTAG: &str = "CASHTAG";
pub const COL_PCT_CHANGE: &str = "PCT_CHANGE";
pub const COL_BUY_PRICE: &str = "BUY_PRICE";
pub const COL_BUY_QTY: &str = "BUY_QTY";
pub const COL_SELL_PRICE: &str = "SELL_PRICE";
pub const COL_SELL_QTY: &str = "SELL_QTY";
pub const COL_SPREAD: &str = "SPREAD";
pub const COL_DELTA: &str = "DELTA";

/// Final gold projection, in output order
pub const GOLD_COLUMNS: [&str; 12] = [
    COL_CASHTAG,
    COL_NAME,
    COL_PRICE,
    COL_CHG,
    COL_VOLUME,
    COL_BUY_PRICE,
    COL_BUY_QTY,
    COL_SELL_PRICE,
    COL_SELL_QTY,
    COL_SPREAD,
    COL_DELTA,
    COL_PCT_CHANGE,
];

/// Ruleset applied to every output unless overridden in config
pub const DEFAULT_DATA_QUALITY_RULESET: &str = r#"
    Rules = [
        ColumnCount > 0
    ]
"#;

pub const SILVER_DQ_CONTEXT: &str = "bursa_silver_dq";
pub const GOLD_DQ_CONTEXT: &str = "bursa_gold_dq";
