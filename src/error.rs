use thiserror::Error;

/// Failure category a caller should handle an error as.
///
/// FormatViolation rejects the whole file. StructuralCorruption halts the
/// page or table being read, other tables may still decode. Unsupported
/// features are named rather than approximated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FormatViolation,
    StructuralCorruption,
    UnsupportedFeature,
    SchemaSyntax,
    NotFound,
    Io,
}

#[derive(Error, Debug)]
pub enum SqliteError {
    // header / whole-file rejections
    #[error("database header magic string mismatch")]
    InvalidHeader,

    #[error("page size {0} is not a power of two in 512..=32768 (or the literal 1)")]
    InvalidPageSize(u32),

    #[error("payload fractions must be 64/32/32, got {max}/{min}/{leaf}")]
    UnsupportedPayloadFraction { max: u8, min: u8, leaf: u8 },

    #[error("text encoding {0} is not supported, only UTF-8 (1) is")]
    UnsupportedTextEncoding(u32),

    #[error("reserved header region (bytes 72..92) contains nonzero bytes")]
    ReservedRegionNotZero,

    #[error("WAL journal mode is not supported (write version {write_version}, read version {read_version})")]
    WalNotSupported { write_version: u8, read_version: u8 },

    // structural decode failures
    #[error("varint at offset {offset} needs more bytes than its window holds")]
    MalformedVarint { offset: usize },

    #[error("page {page} is out of range, the database has {page_count} pages")]
    PageIndexOutOfRange { page: u32, page_count: u32 },

    #[error("unknown page type {0:#04x}")]
    UnknownPageType(u8),

    #[error("cell {cell} on page {page} ends at offset {actual}, expected {expected}")]
    CellBoundaryViolation {
        page: u32,
        cell: usize,
        expected: usize,
        actual: usize,
    },

    #[error("record header declares {declared} bytes of serial types but they consumed {consumed}")]
    RecordHeaderMismatch { declared: usize, consumed: usize },

    #[error("unknown serial type {0}")]
    UnknownSerialType(u64),

    #[error("serial type {0} is reserved for internal use")]
    InternalTypeAccess(u64),

    #[error("payload text at offset {offset} is not valid UTF-8")]
    InvalidTextPayload { offset: usize },

    #[error("page {page} links to invalid child page {child}")]
    CorruptPageLink { page: u32, child: u32 },

    #[error("expected a table b-tree page, page {page} is {found}")]
    UnexpectedPageType { page: u32, found: &'static str },

    #[error("the schema root page must be a table b-tree page")]
    InvalidRootPageType,

    #[error("schema row {row_id} does not have the 5 master table columns")]
    MalformedSchemaRow { row_id: i64 },

    // explicitly unsupported features
    #[error("serial type {0}: 48 and 64 bit integer payloads are not implemented")]
    UnimplementedWidth(u64),

    // schema text parsing
    #[error("expected one of [{}] at line {line}, column {column}", .expected.join(", "))]
    SchemaSyntax {
        line: usize,
        column: usize,
        expected: Vec<String>,
    },

    #[error("schema defines table {found:?}, expected {expected:?}")]
    TableNameMismatch { expected: String, found: String },

    #[error("table {0:?} not found")]
    TableNotFound(String),

    // byte source
    #[error("byte range {offset}..{} is not resident and no fetcher was supplied", .offset + .length)]
    MissingBytes { offset: usize, length: usize },

    #[error("fetcher returned {actual} bytes for a {requested} byte range")]
    ShortFetch { requested: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SqliteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidHeader
            | Self::InvalidPageSize(_)
            | Self::UnsupportedPayloadFraction { .. }
            | Self::ReservedRegionNotZero => ErrorKind::FormatViolation,

            Self::UnsupportedTextEncoding(_)
            | Self::WalNotSupported { .. }
            | Self::UnimplementedWidth(_) => ErrorKind::UnsupportedFeature,

            Self::MalformedVarint { .. }
            | Self::PageIndexOutOfRange { .. }
            | Self::UnknownPageType(_)
            | Self::CellBoundaryViolation { .. }
            | Self::RecordHeaderMismatch { .. }
            | Self::UnknownSerialType(_)
            | Self::InternalTypeAccess(_)
            | Self::InvalidTextPayload { .. }
            | Self::CorruptPageLink { .. }
            | Self::UnexpectedPageType { .. }
            | Self::InvalidRootPageType
            | Self::MalformedSchemaRow { .. }
            | Self::MissingBytes { .. }
            | Self::ShortFetch { .. } => ErrorKind::StructuralCorruption,

            Self::SchemaSyntax { .. } | Self::TableNameMismatch { .. } => ErrorKind::SchemaSyntax,

            Self::TableNotFound(_) => ErrorKind::NotFound,

            Self::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, SqliteError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(SqliteError::InvalidHeader.kind(), ErrorKind::FormatViolation);
        assert_eq!(
            SqliteError::WalNotSupported {
                write_version: 2,
                read_version: 2
            }
            .kind(),
            ErrorKind::UnsupportedFeature
        );
        assert_eq!(
            SqliteError::CorruptPageLink { page: 3, child: 0 }.kind(),
            ErrorKind::StructuralCorruption
        );
        assert_eq!(
            SqliteError::TableNotFound("missing".into()).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn syntax_error_lists_expected_tokens() {
        let err = SqliteError::SchemaSyntax {
            line: 2,
            column: 7,
            expected: vec!["TABLE".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("TABLE"));
        assert!(msg.contains("line 2"));
        assert!(msg.contains("column 7"));
    }
}
