pub mod data_containers;
pub mod query_engine;
pub mod source;
pub mod utils;

/* This module holds the sqlite file format logic
* 1. utilities for reading sqlite varints, which differ slightly from
*    protobuf style varints (big endian groups, full 9th byte)
* 2. types that represent the on disk data structures
*       - database header, the first 100 bytes of the file
*       - the four b-tree page kinds
*       - serial types and record payloads
*       - master schema entries
* 3. the table scan over the b-tree and the byte source it reads through
* */

use crate::error::{Result, SqliteError};
use crate::parser::{parse_create_table, Column};
use data_containers::headers::DatabaseHeader;
use data_containers::page::Page;
use data_containers::schema::{SchemaEntry, SchemaObjectType};
use query_engine::RowScan;
use source::{FetchRange, PageSource};

/// Read side of one database file.
///
/// Holds only the validated header and the byte source. Every listing or
/// scan re-reads the relevant pages from the bytes; nothing decoded is
/// cached, so repeated calls on an unchanged buffer return identical
/// results.
pub struct Sqlite {
    header: DatabaseHeader,
    source: PageSource,
}

impl std::fmt::Debug for Sqlite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sqlite")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl Sqlite {
    /// Open a fully resident file image.
    pub fn new(buffer: Vec<u8>) -> Result<Sqlite> {
        Sqlite::from_source(PageSource::resident(buffer))
    }

    /// Open a prefix of a file plus a port for fetching missing pages.
    pub fn with_fetcher(prefix: Vec<u8>, fetcher: Box<dyn FetchRange>) -> Result<Sqlite> {
        Sqlite::from_source(PageSource::with_fetcher(prefix, fetcher))
    }

    fn from_source(source: PageSource) -> Result<Sqlite> {
        let header = DatabaseHeader::new(source.header_bytes()?)?;
        tracing::debug!(
            page_size = header.page_size,
            page_count = header.page_count,
            "decoded database header"
        );
        Ok(Sqlite { header, source })
    }

    pub fn header(&self) -> &DatabaseHeader {
        &self.header
    }

    /// Decode one page for diagnostic consumers.
    pub fn get_page(&mut self, page_number: u32) -> Result<Page> {
        if page_number < 1 || page_number > self.header.page_count {
            return Err(SqliteError::PageIndexOutOfRange {
                page: page_number,
                page_count: self.header.page_count,
            });
        }

        let page_size = self.header.page_size as usize;
        let usable_size = self.header.usable_size();
        let data = self.source.page_bytes(page_number, page_size)?;
        Page::decode(data, page_number, usable_size)
    }

    /// All table and index entries of the master schema table.
    ///
    /// Page 1 is scanned from scratch on every call.
    pub fn schema_entries(&mut self) -> Result<Vec<SchemaEntry>> {
        match self.get_page(1)? {
            Page::InteriorTable(_) | Page::LeafTable(_) => {}
            _ => return Err(SqliteError::InvalidRootPageType),
        }

        let mut entries: Vec<SchemaEntry> = Vec::new();
        for row in RowScan::new(self, 1) {
            let row = row?;
            if let Some(entry) = SchemaEntry::from_master_row(row.row_id, &row.values)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Names of the user tables, in master table order.
    pub fn get_tables(&mut self) -> Result<Vec<String>> {
        Ok(self
            .schema_entries()?
            .into_iter()
            .filter(|entry| entry.object_type == SchemaObjectType::Table)
            .map(|entry| entry.name)
            .collect())
    }

    /// Column names and declared types of one table, recovered from its
    /// CREATE TABLE text.
    pub fn get_columns(&mut self, table_name: &str) -> Result<Vec<Column>> {
        let entry = self.find_table(table_name)?;
        parse_create_table(&entry.sql, table_name)
    }

    /// Scan every row of one table, root to leaves.
    pub fn get_rows(&mut self, table_name: &str) -> Result<RowScan<'_>> {
        let entry = self.find_table(table_name)?;
        Ok(RowScan::new(self, entry.root_page))
    }

    fn find_table(&mut self, table_name: &str) -> Result<SchemaEntry> {
        self.schema_entries()?
            .into_iter()
            .find(|entry| {
                entry.object_type == SchemaObjectType::Table && entry.name == table_name
            })
            .ok_or_else(|| SqliteError::TableNotFound(table_name.to_string()))
    }
}
