//! Log store schema definitions
//!
//! The report only reads this table; the DDL lives here so fresh stores and
//! tests agree with the log processor on column names.

pub const CREATE_LOGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS logs (
    id VARCHAR PRIMARY KEY,
    t DATETIME,
    y INTEGER,
    m INTEGER,
    d INTEGER,
    msec INTEGER,
    client_ip VARCHAR,
    id_scheme VARCHAR,
    id_value VARCHAR,
    country_code VARCHAR,
    browser_family VARCHAR,
    browser_major VARCHAR,
    device_brand VARCHAR,
    device_family VARCHAR,
    device_model VARCHAR,
    os_family VARCHAR,
    os_major VARCHAR
)
"#;

pub const CREATE_INDEX_YEAR: &str = "CREATE INDEX IF NOT EXISTS logs_year ON logs(y)";

pub const CREATE_INDEX_MONTH: &str = "CREATE INDEX IF NOT EXISTS logs_month ON logs(m)";

pub const CREATE_INDEX_DAY: &str = "CREATE INDEX IF NOT EXISTS logs_day ON logs(d)";

pub const CREATE_INDEX_SCHEME: &str = "CREATE INDEX IF NOT EXISTS logs_scheme ON logs(id_scheme)";

/// Statements needed to initialize an empty store, in order
pub const ALL: &[&str] = &[
    CREATE_LOGS_TABLE,
    CREATE_INDEX_YEAR,
    CREATE_INDEX_MONTH,
    CREATE_INDEX_DAY,
    CREATE_INDEX_SCHEME,
];

pub const INSERT_LOG: &str = r#"
INSERT INTO logs (
    id, t, y, m, d, msec, client_ip, id_scheme, id_value, country_code,
    browser_family, browser_major, device_brand, device_family, device_model,
    os_family, os_major
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;
