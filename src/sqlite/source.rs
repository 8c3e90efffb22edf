use crate::error::{Result, SqliteError};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Port for supplying byte ranges that are not in the resident prefix.
///
/// Callers that hold the whole file never need this. Callers that start
/// with a prefix (a streamed download, a sampled read) implement it to
/// fetch the missing range on demand.
pub trait FetchRange {
    fn fetch_range(&mut self, offset: usize, length: usize) -> std::io::Result<Vec<u8>>;
}

/// The immutable byte view of one database file: a resident prefix plus
/// pages fetched through the port.
///
/// Fetched pages are cached by page number, so with the single threaded
/// decode model there is never more than one fetch per missing page, and
/// never a second fetch for a page already seen.
pub struct PageSource {
    buffer: Vec<u8>,
    fetcher: Option<Box<dyn FetchRange>>,
    fetched: HashMap<u32, Vec<u8>>,
}

impl PageSource {
    pub fn resident(buffer: Vec<u8>) -> PageSource {
        PageSource {
            buffer,
            fetcher: None,
            fetched: HashMap::new(),
        }
    }

    pub fn with_fetcher(prefix: Vec<u8>, fetcher: Box<dyn FetchRange>) -> PageSource {
        PageSource {
            buffer: prefix,
            fetcher: Some(fetcher),
            fetched: HashMap::new(),
        }
    }

    /// The first 100 bytes, which must always be resident.
    pub fn header_bytes(&self) -> Result<&[u8]> {
        if self.buffer.len() < 100 {
            return Err(SqliteError::MissingBytes {
                offset: 0,
                length: 100,
            });
        }
        Ok(&self.buffer[0..100])
    }

    /// Raw bytes of a page, fetching them at most once if not resident.
    /// Page 1 includes the database header in its image.
    pub fn page_bytes(&mut self, page_number: u32, page_size: usize) -> Result<&[u8]> {
        let offset = (page_number as usize - 1) * page_size;

        if self.buffer.len() >= offset + page_size {
            return Ok(&self.buffer[offset..offset + page_size]);
        }

        match self.fetched.entry(page_number) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(slot) => {
                let Some(fetcher) = self.fetcher.as_mut() else {
                    return Err(SqliteError::MissingBytes {
                        offset,
                        length: page_size,
                    });
                };
                tracing::debug!(page_number, offset, "fetching non resident page");
                let bytes = fetcher.fetch_range(offset, page_size)?;
                if bytes.len() != page_size {
                    return Err(SqliteError::ShortFetch {
                        requested: page_size,
                        actual: bytes.len(),
                    });
                }
                Ok(slot.insert(bytes))
            }
        }
    }
}
