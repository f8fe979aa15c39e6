//! # auditchain-parse
//!
//! The Postgres pgAudit and MySQL/Percona audit log parsers: both formats
//! boil down to "extract a SQL statement and some structured metadata
//! from one line of heterogeneous log output", shared via a common
//! `detect_query_type` classifier and `ParseOptions`.

pub mod classify;
pub mod mysql;
pub mod postgres;
pub mod time;

pub use classify::detect_query_type;
pub use mysql::parse_mysql_line;
pub use postgres::{parse_postgres_line, ParseOptions};
