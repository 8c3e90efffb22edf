//! Read-only decoder for the SQLite database file format.
//!
//! Works directly on the raw bytes of a database file: validates the 100
//! byte header, walks the table b-trees page by page, decodes records
//! and their serial typed payloads, and recovers table schemas from the
//! CREATE TABLE text stored in the master schema table. No database
//! engine is involved and nothing is ever written.

pub mod error;
pub mod parser;
pub mod sqlite;

pub use error::{ErrorKind, Result, SqliteError};
pub use parser::{parse_create_table, Column};
pub use sqlite::data_containers::headers::DatabaseHeader;
pub use sqlite::data_containers::page::{Page, PageType};
pub use sqlite::data_containers::record::{OverflowNote, PayloadValue, Value};
pub use sqlite::data_containers::schema::{SchemaEntry, SchemaObjectType};
pub use sqlite::query_engine::{Row, RowScan};
pub use sqlite::source::FetchRange;
pub use sqlite::Sqlite;
