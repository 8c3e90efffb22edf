use super::record::{InteriorTableCell, LeafTableCell};
use crate::error::{Result, SqliteError};

/// Offset of the b-tree header within the page image: page 1 carries the
/// 100 byte database header first, every other page starts at zero.
pub fn btree_header_offset(page_number: u32) -> usize {
    if page_number == 1 {
        100
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PageType {
    InteriorIndex,
    InteriorTable,
    LeafIndex,
    LeafTable,
}

impl PageType {
    pub fn from_tag(value: u8) -> Result<PageType> {
        match value {
            0x02 => Ok(PageType::InteriorIndex),
            0x05 => Ok(PageType::InteriorTable),
            0x0A => Ok(PageType::LeafIndex),
            0x0D => Ok(PageType::LeafTable),
            other => Err(SqliteError::UnknownPageType(other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PageType::InteriorIndex => "an interior index page",
            PageType::InteriorTable => "an interior table page",
            PageType::LeafIndex => "a leaf index page",
            PageType::LeafTable => "a leaf table page",
        }
    }
}

// container for the common page header fields
#[derive(Debug, Clone)]
pub struct PageHeader {
    pub page_type: PageType,
    pub first_freeblock: u16,
    pub num_cells: u16,
    /// Start of the cell content area; the stored value 0 means 65536.
    pub cell_content_start: u32,
    pub fragmented_free_bytes: u8,
    /// Interior pages only.
    pub right_pointer: Option<u32>,
}

impl PageHeader {
    pub fn new(header_buffer: &[u8]) -> Result<PageHeader> {
        if header_buffer.len() < 8 {
            return Err(SqliteError::MissingBytes {
                offset: 0,
                length: 8,
            });
        }

        let page_type = PageType::from_tag(header_buffer[0])?;
        let first_freeblock = u16::from_be_bytes([header_buffer[1], header_buffer[2]]);
        let num_cells = u16::from_be_bytes([header_buffer[3], header_buffer[4]]);
        let cell_content_start =
            match u16::from_be_bytes([header_buffer[5], header_buffer[6]]) {
                0 => 65536_u32,
                n => n as u32,
            };
        let fragmented_free_bytes = header_buffer[7];
        let right_pointer = match page_type {
            PageType::InteriorTable | PageType::InteriorIndex => {
                if header_buffer.len() < 12 {
                    return Err(SqliteError::MissingBytes {
                        offset: 8,
                        length: 4,
                    });
                }
                Some(u32::from_be_bytes([
                    header_buffer[8],
                    header_buffer[9],
                    header_buffer[10],
                    header_buffer[11],
                ]))
            }
            _ => None,
        };

        Ok(PageHeader {
            page_type,
            first_freeblock,
            num_cells,
            cell_content_start,
            fragmented_free_bytes,
            right_pointer,
        })
    }

    pub fn len(&self) -> usize {
        match self.right_pointer {
            Some(_) => 12,
            None => 8,
        }
    }
}

/// A decoded b-tree page. Each kind carries only the fields valid for it.
#[derive(Debug, Clone)]
pub enum Page {
    InteriorIndex(InteriorIndexPage),
    InteriorTable(InteriorTablePage),
    LeafIndex(LeafIndexPage),
    LeafTable(LeafTablePage),
}

impl Page {
    /// Decode one page image. `data` is the full raw page,
    /// `usable_size` is the page size minus the reserved tail.
    pub fn decode(data: &[u8], page_number: u32, usable_size: usize) -> Result<Page> {
        let header_offset = btree_header_offset(page_number);
        let header = PageHeader::new(&data[header_offset..])?;
        tracing::trace!(
            page_number,
            num_cells = header.num_cells,
            "decoding {}",
            header.page_type.name()
        );

        match header.page_type {
            PageType::InteriorIndex => Ok(Page::InteriorIndex(InteriorIndexPage::decode(
                data,
                header_offset,
                header,
            )?)),
            PageType::InteriorTable => Ok(Page::InteriorTable(InteriorTablePage::decode(
                data,
                header_offset,
                header,
                page_number,
                usable_size,
            )?)),
            PageType::LeafIndex => Ok(Page::LeafIndex(LeafIndexPage::decode(
                data,
                header_offset,
                header,
            )?)),
            PageType::LeafTable => Ok(Page::LeafTable(LeafTablePage::decode(
                data,
                header_offset,
                header,
                page_number,
                usable_size,
            )?)),
        }
    }

    pub fn page_type(&self) -> PageType {
        self.header().page_type
    }

    pub fn header(&self) -> &PageHeader {
        match self {
            Page::InteriorIndex(page) => &page.header,
            Page::InteriorTable(page) => &page.header,
            Page::LeafIndex(page) => &page.header,
            Page::LeafTable(page) => &page.header,
        }
    }
}

// cell pointers sit right after the page header, 2 bytes each, big endian
fn read_cell_pointers(data: &[u8], header_offset: usize, header: &PageHeader) -> Result<Vec<u16>> {
    let start = header_offset + header.len();
    let end = start + 2 * header.num_cells as usize;
    if end > data.len() {
        return Err(SqliteError::MissingBytes {
            offset: start,
            length: end - start,
        });
    }

    let mut pointer_array: Vec<u16> = Vec::with_capacity(header.num_cells.into());
    for i in 0..header.num_cells as usize {
        let offset = start + 2 * i;
        pointer_array.push(u16::from_be_bytes([data[offset], data[offset + 1]]));
    }
    Ok(pointer_array)
}

#[derive(Debug, Clone)]
pub struct InteriorTablePage {
    pub header: PageHeader,
    pub cells: Vec<InteriorTableCell>,
}

impl InteriorTablePage {
    fn decode(
        data: &[u8],
        header_offset: usize,
        header: PageHeader,
        page_number: u32,
        usable_size: usize,
    ) -> Result<InteriorTablePage> {
        let mut pointer_array = read_cell_pointers(data, header_offset, &header)?;
        pointer_array.sort_unstable();

        let mut cells: Vec<InteriorTableCell> = Vec::with_capacity(pointer_array.len());
        for (i, pointer) in pointer_array.iter().enumerate() {
            let (cell, end) = InteriorTableCell::decode(data, *pointer as usize, page_number, i)?;

            // a cell must run exactly up to the next one, or to the usable
            // page end if it is the last
            let expected = match pointer_array.get(i + 1) {
                Some(next) => *next as usize,
                None => usable_size,
            };
            if end != expected {
                return Err(SqliteError::CellBoundaryViolation {
                    page: page_number,
                    cell: i,
                    expected,
                    actual: end,
                });
            }

            cells.push(cell);
        }

        Ok(InteriorTablePage { header, cells })
    }
}

#[derive(Debug, Clone)]
pub struct LeafTablePage {
    pub header: PageHeader,
    pub cells: Vec<LeafTableCell>,
}

impl LeafTablePage {
    fn decode(
        data: &[u8],
        header_offset: usize,
        header: PageHeader,
        page_number: u32,
        usable_size: usize,
    ) -> Result<LeafTablePage> {
        let mut pointer_array = read_cell_pointers(data, header_offset, &header)?;
        pointer_array.sort_unstable();

        let mut cells: Vec<LeafTableCell> = Vec::with_capacity(pointer_array.len());
        for (i, pointer) in pointer_array.iter().enumerate() {
            let cell_end = match pointer_array.get(i + 1) {
                Some(next) => *next as usize,
                None => usable_size,
            };
            let (cell, end) =
                LeafTableCell::decode(data, *pointer as usize, cell_end, page_number, i)?;
            if end != cell_end {
                return Err(SqliteError::CellBoundaryViolation {
                    page: page_number,
                    cell: i,
                    expected: cell_end,
                    actual: end,
                });
            }

            cells.push(cell);
        }

        Ok(LeafTablePage { header, cells })
    }
}

/// Index page cells are not decoded; only the header and the raw pointer
/// array are read. Index traversal is out of scope for this reader.
#[derive(Debug, Clone)]
pub struct InteriorIndexPage {
    pub header: PageHeader,
    pub cell_pointers: Vec<u16>,
}

impl InteriorIndexPage {
    fn decode(data: &[u8], header_offset: usize, header: PageHeader) -> Result<InteriorIndexPage> {
        let cell_pointers = read_cell_pointers(data, header_offset, &header)?;
        Ok(InteriorIndexPage {
            header,
            cell_pointers,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LeafIndexPage {
    pub header: PageHeader,
    pub cell_pointers: Vec<u16>,
}

impl LeafIndexPage {
    fn decode(data: &[u8], header_offset: usize, header: PageHeader) -> Result<LeafIndexPage> {
        let cell_pointers = read_cell_pointers(data, header_offset, &header)?;
        Ok(LeafIndexPage {
            header,
            cell_pointers,
        })
    }
}
