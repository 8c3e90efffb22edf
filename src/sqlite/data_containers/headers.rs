use crate::error::{Result, SqliteError};

pub const HEADER_SIZE: usize = 100;

const MAGIC: &[u8; 16] = b"SQLite format 3\0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl TryFrom<u32> for TextEncoding {
    type Error = SqliteError;
    fn try_from(decoded_value: u32) -> Result<TextEncoding> {
        match decoded_value {
            1 => Ok(TextEncoding::Utf8),
            2 => Ok(TextEncoding::Utf16Le),
            3 => Ok(TextEncoding::Utf16Be),
            other => Err(SqliteError::UnsupportedTextEncoding(other)),
        }
    }
}

// container for all the relevant database header attributes
#[derive(Debug, Clone)]
pub struct DatabaseHeader {
    /// Normalized: the raw value 1 means 65536.
    pub page_size: u32,
    pub write_version: u8,
    pub read_version: u8,
    /// Bytes reserved at the end of every page, usually 0.
    pub reserved_space: u8,
    pub max_payload_fraction: u8,
    pub min_payload_fraction: u8,
    pub leaf_payload_fraction: u8,
    pub change_count: u32,
    pub page_count: u32,
    pub schema_cookie: u32,
    pub schema_format: u32,
    pub text_encoding: TextEncoding,
    pub user_version: u32,
    pub vacuum_mode: u32,
    pub application_id: u32,
    pub version_valid_for: u32,
    pub sqlite_version_number: u32,
}

impl DatabaseHeader {
    /// Decode and validate the first 100 bytes of the file.
    ///
    /// Every check here is fatal for the whole file; a caller that sees an
    /// error must not read any further.
    pub fn new(buffer: &[u8]) -> Result<DatabaseHeader> {
        if buffer.len() < HEADER_SIZE {
            return Err(SqliteError::MissingBytes {
                offset: 0,
                length: HEADER_SIZE,
            });
        }

        if &buffer[0..16] != MAGIC {
            return Err(SqliteError::InvalidHeader);
        }

        let raw_page_size = u16::from_be_bytes([buffer[16], buffer[17]]);
        let page_size = match raw_page_size {
            1 => 65536_u32,
            n if n >= 512 && n.is_power_of_two() => n as u32,
            other => return Err(SqliteError::InvalidPageSize(other as u32)),
        };

        let write_version = buffer[18];
        let read_version = buffer[19];
        if write_version != 1 || read_version != 1 {
            return Err(SqliteError::WalNotSupported {
                write_version,
                read_version,
            });
        }

        let reserved_space = buffer[20];

        let max_payload_fraction = buffer[21];
        let min_payload_fraction = buffer[22];
        let leaf_payload_fraction = buffer[23];
        if (max_payload_fraction, min_payload_fraction, leaf_payload_fraction) != (64, 32, 32) {
            return Err(SqliteError::UnsupportedPayloadFraction {
                max: max_payload_fraction,
                min: min_payload_fraction,
                leaf: leaf_payload_fraction,
            });
        }

        let change_count = u32::from_be_bytes([buffer[24], buffer[25], buffer[26], buffer[27]]);
        let page_count = u32::from_be_bytes([buffer[28], buffer[29], buffer[30], buffer[31]]);
        let schema_cookie = u32::from_be_bytes([buffer[40], buffer[41], buffer[42], buffer[43]]);
        let schema_format = u32::from_be_bytes([buffer[44], buffer[45], buffer[46], buffer[47]]);

        let text_encoding =
            TextEncoding::try_from(u32::from_be_bytes([buffer[56], buffer[57], buffer[58], buffer[59]]))?;
        if text_encoding != TextEncoding::Utf8 {
            // the format allows UTF-16 but this reader only decodes UTF-8
            return Err(SqliteError::UnsupportedTextEncoding(match text_encoding {
                TextEncoding::Utf16Le => 2,
                TextEncoding::Utf16Be => 3,
                TextEncoding::Utf8 => 1,
            }));
        }

        let user_version = u32::from_be_bytes([buffer[60], buffer[61], buffer[62], buffer[63]]);
        let vacuum_mode = u32::from_be_bytes([buffer[64], buffer[65], buffer[66], buffer[67]]);
        let application_id = u32::from_be_bytes([buffer[68], buffer[69], buffer[70], buffer[71]]);

        if buffer[72..92].iter().any(|byte| *byte != 0) {
            return Err(SqliteError::ReservedRegionNotZero);
        }

        let version_valid_for = u32::from_be_bytes([buffer[92], buffer[93], buffer[94], buffer[95]]);
        let sqlite_version_number =
            u32::from_be_bytes([buffer[96], buffer[97], buffer[98], buffer[99]]);

        Ok(DatabaseHeader {
            page_size,
            write_version,
            read_version,
            reserved_space,
            max_payload_fraction,
            min_payload_fraction,
            leaf_payload_fraction,
            change_count,
            page_count,
            schema_cookie,
            schema_format,
            text_encoding,
            user_version,
            vacuum_mode,
            application_id,
            version_valid_for,
            sqlite_version_number,
        })
    }

    /// Page bytes usable for b-tree content, excluding the reserved tail.
    pub fn usable_size(&self) -> usize {
        self.page_size as usize - self.reserved_space as usize
    }
}
