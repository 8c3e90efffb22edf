use crate::error::{Result, SqliteError};
use crate::sqlite::data_containers::page::Page;
use crate::sqlite::data_containers::record::{LeafTableCell, PayloadValue};
use crate::sqlite::Sqlite;
use std::collections::VecDeque;

/// One table row: the rowid plus the payload values in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub row_id: i64,
    pub values: Vec<PayloadValue>,
}

/// Lazy breadth first walk of a table b-tree.
///
/// Interior pages enqueue their left children in cell order followed by
/// the right most pointer, so rows come out in key order within each
/// level. One page is decoded at a time; after the first error the scan
/// is over. Restart by asking for a fresh scan, decoding is stateless.
pub struct RowScan<'a> {
    sqlite: &'a mut Sqlite,
    pending_pages: VecDeque<u32>,
    current_cells: std::vec::IntoIter<LeafTableCell>,
    done: bool,
}

impl<'a> RowScan<'a> {
    pub(crate) fn new(sqlite: &'a mut Sqlite, root_page: u32) -> RowScan<'a> {
        tracing::debug!(root_page, "starting table scan");
        let mut pending_pages = VecDeque::new();
        pending_pages.push_back(root_page);
        RowScan {
            sqlite,
            pending_pages,
            current_cells: Vec::new().into_iter(),
            done: false,
        }
    }

    fn check_child(&self, page: u32, child: u32) -> Result<u32> {
        // a zero or out of range pointer means the tree structure itself
        // is damaged; skipping it would silently drop rows
        if child == 0 || child > self.sqlite.header().page_count {
            return Err(SqliteError::CorruptPageLink { page, child });
        }
        Ok(child)
    }

    fn advance(&mut self) -> Result<Option<Row>> {
        loop {
            if let Some(cell) = self.current_cells.next() {
                return Ok(Some(Row {
                    row_id: cell.row_id,
                    values: cell.payload,
                }));
            }

            let Some(page_number) = self.pending_pages.pop_front() else {
                return Ok(None);
            };

            match self.sqlite.get_page(page_number)? {
                Page::InteriorTable(interior) => {
                    for cell in &interior.cells {
                        let child = self.check_child(page_number, cell.left_child)?;
                        self.pending_pages.push_back(child);
                    }
                    // interior headers always carry the right pointer; the
                    // zero fallback lands in the corrupt link check
                    let right = interior.header.right_pointer.unwrap_or(0);
                    let right = self.check_child(page_number, right)?;
                    self.pending_pages.push_back(right);
                }
                Page::LeafTable(leaf) => {
                    self.current_cells = leaf.cells.into_iter();
                }
                other => {
                    return Err(SqliteError::UnexpectedPageType {
                        page: page_number,
                        found: other.page_type().name(),
                    });
                }
            }
        }
    }
}

impl Iterator for RowScan<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
