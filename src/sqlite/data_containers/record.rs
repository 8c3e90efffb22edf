use super::serial_types::SerialType;
use crate::error::{Result, SqliteError};
use crate::sqlite::utils::{parse_sqlite_varint, SqliteVarint};
use std::fmt;

/// One decoded payload value. SQLite types individual values, not columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Blob(Vec<u8>),
}

/// Marks a value whose tail lives on an overflow page. Only the first-page
/// portion is stored; the chain is not followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverflowNote {
    /// Bytes actually present in the page.
    pub stored: usize,
    /// Byte length the serial type declared.
    pub declared: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayloadValue {
    pub value: Value,
    pub overflow: Option<OverflowNote>,
}

impl PayloadValue {
    fn full(value: Value) -> PayloadValue {
        PayloadValue {
            value,
            overflow: None,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.overflow.is_some()
    }
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.overflow) {
            (Value::Null, _) => write!(f, "NULL"),
            (Value::Int(v), _) => write!(f, "{v}"),
            (Value::Float(v), _) => write!(f, "{v}"),
            (Value::Bool(v), _) => write!(f, "{v}"),
            (Value::Text(v), None) => write!(f, "{v}"),
            (Value::Text(v), Some(note)) => {
                write!(f, "{v} ({}/{} bytes before overflow)", note.stored, note.declared)
            }
            (Value::Blob(v), None) => write!(f, "BLOB of {} bytes", v.len()),
            (Value::Blob(_), Some(note)) => {
                write!(f, "BLOB ({}/{} bytes before overflow)", note.stored, note.declared)
            }
        }
    }
}

/// Cell of an interior table page: a child subtree and its key ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteriorTableCell {
    pub left_child: u32,
    pub key: i64,
}

impl InteriorTableCell {
    /// Decode at `cell_pointer`, returning the cell and the offset one past
    /// its last byte.
    pub fn decode(
        data: &[u8],
        cell_pointer: usize,
        page: u32,
        cell_index: usize,
    ) -> Result<(InteriorTableCell, usize)> {
        if cell_pointer + 4 > data.len() {
            return Err(SqliteError::CellBoundaryViolation {
                page,
                cell: cell_index,
                expected: data.len(),
                actual: cell_pointer + 4,
            });
        }
        let left_child = u32::from_be_bytes([
            data[cell_pointer],
            data[cell_pointer + 1],
            data[cell_pointer + 2],
            data[cell_pointer + 3],
        ]);
        let key = parse_sqlite_varint(data, cell_pointer + 4)?;

        Ok((
            InteriorTableCell {
                left_child,
                key: key.signed(),
            },
            cell_pointer + 4 + key.byte_size,
        ))
    }
}

/// Cell of a leaf table page: one row.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafTableCell {
    pub row_id: i64,
    pub payload: Vec<PayloadValue>,
}

impl LeafTableCell {
    /// Decode the cell at `cell_pointer`. `cell_end` is the next sorted cell
    /// pointer, or the usable page end for the last cell; it bounds every
    /// read and is the payload-room reference for overflow detection.
    ///
    /// Returns the cell and the offset where it ends: one past its in-page
    /// bytes, which includes a 4 byte overflow page pointer when any value
    /// was truncated. The caller checks that offset against `cell_end`.
    pub fn decode(
        data: &[u8],
        cell_pointer: usize,
        cell_end: usize,
        page: u32,
        cell_index: usize,
    ) -> Result<(LeafTableCell, usize)> {
        let overrun = |actual: usize| SqliteError::CellBoundaryViolation {
            page,
            cell: cell_index,
            expected: cell_end,
            actual,
        };

        let mut offset = cell_pointer;

        // combined byte length of record header + payload, unused beyond
        // sanity because the boundary check is stricter
        let payload_length = parse_sqlite_varint(data, offset)?;
        offset += payload_length.byte_size;

        let row_id = parse_sqlite_varint(data, offset)?;
        offset += row_id.byte_size;

        let header_length = parse_sqlite_varint(data, offset)?;
        let Some(type_list_length) = (header_length.value as usize).checked_sub(header_length.byte_size)
        else {
            return Err(SqliteError::RecordHeaderMismatch {
                declared: header_length.value as usize,
                consumed: header_length.byte_size,
            });
        };
        offset += header_length.byte_size;

        let header_end = offset + type_list_length;
        if header_end > cell_end {
            return Err(overrun(header_end));
        }

        let mut serial_types: Vec<SerialType> = Vec::new();
        let type_list_start = offset;
        while offset < header_end {
            let SqliteVarint { value, byte_size } = parse_sqlite_varint(data, offset)?;
            offset += byte_size;
            serial_types.push(SerialType::new(value)?);
        }
        if offset != header_end {
            // the last serial type varint leaked past the declared header end
            return Err(SqliteError::RecordHeaderMismatch {
                declared: type_list_length,
                consumed: offset - type_list_start,
            });
        }

        let mut payload: Vec<PayloadValue> = Vec::with_capacity(serial_types.len());
        let mut truncated = false;
        for serial_type in serial_types {
            match serial_type {
                SerialType::Null => payload.push(PayloadValue::full(Value::Null)),
                SerialType::BoolFalse => payload.push(PayloadValue::full(Value::Bool(false))),
                SerialType::BoolTrue => payload.push(PayloadValue::full(Value::Bool(true))),
                SerialType::Int8 => {
                    if offset + 1 > cell_end {
                        return Err(overrun(offset + 1));
                    }
                    let v = i8::from_be_bytes([data[offset]]) as i64;
                    payload.push(PayloadValue::full(Value::Int(v)));
                    offset += 1;
                }
                SerialType::Int16 => {
                    if offset + 2 > cell_end {
                        return Err(overrun(offset + 2));
                    }
                    let v = i16::from_be_bytes([data[offset], data[offset + 1]]) as i64;
                    payload.push(PayloadValue::full(Value::Int(v)));
                    offset += 2;
                }
                SerialType::Int24 => {
                    if offset + 3 > cell_end {
                        return Err(overrun(offset + 3));
                    }
                    let raw = u32::from_be_bytes([
                        0,
                        data[offset],
                        data[offset + 1],
                        data[offset + 2],
                    ]);
                    // sign extend from bit 23
                    let v = (((raw << 8) as i32) >> 8) as i64;
                    payload.push(PayloadValue::full(Value::Int(v)));
                    offset += 3;
                }
                SerialType::Int32 => {
                    if offset + 4 > cell_end {
                        return Err(overrun(offset + 4));
                    }
                    let v = i32::from_be_bytes([
                        data[offset],
                        data[offset + 1],
                        data[offset + 2],
                        data[offset + 3],
                    ]) as i64;
                    payload.push(PayloadValue::full(Value::Int(v)));
                    offset += 4;
                }
                SerialType::Int48 => return Err(SqliteError::UnimplementedWidth(5)),
                SerialType::Int64 => return Err(SqliteError::UnimplementedWidth(6)),
                SerialType::Float64 => {
                    if offset + 8 > cell_end {
                        return Err(overrun(offset + 8));
                    }
                    let v = f64::from_be_bytes([
                        data[offset],
                        data[offset + 1],
                        data[offset + 2],
                        data[offset + 3],
                        data[offset + 4],
                        data[offset + 5],
                        data[offset + 6],
                        data[offset + 7],
                    ]);
                    payload.push(PayloadValue::full(Value::Float(v)));
                    offset += 8;
                }
                SerialType::Blob(declared) => {
                    let payload_room = cell_end - offset;
                    if declared > payload_room {
                        let Some(stored) = payload_room.checked_sub(4) else {
                            return Err(overrun(offset + declared));
                        };
                        let bytes = data[offset..offset + stored].to_vec();
                        offset += stored;
                        payload.push(PayloadValue {
                            value: Value::Blob(bytes),
                            overflow: Some(OverflowNote { stored, declared }),
                        });
                        truncated = true;
                        break;
                    }
                    let bytes = data[offset..offset + declared].to_vec();
                    offset += declared;
                    payload.push(PayloadValue::full(Value::Blob(bytes)));
                }
                SerialType::Text(declared) => {
                    let payload_room = cell_end - offset;
                    if declared > payload_room {
                        let Some(stored) = payload_room.checked_sub(4) else {
                            return Err(overrun(offset + declared));
                        };
                        // the cut can land mid code point, decode what survives
                        let text = String::from_utf8_lossy(&data[offset..offset + stored]).into_owned();
                        offset += stored;
                        payload.push(PayloadValue {
                            value: Value::Text(text),
                            overflow: Some(OverflowNote { stored, declared }),
                        });
                        truncated = true;
                        break;
                    }
                    let text = String::from_utf8(data[offset..offset + declared].to_vec())
                        .map_err(|_| SqliteError::InvalidTextPayload { offset })?;
                    offset += declared;
                    payload.push(PayloadValue::full(Value::Text(text)));
                }
            }
        }

        // remaining values of a truncated cell continue on overflow pages and
        // are not recoverable from this page; the trailing 4 bytes are the
        // first overflow page number
        let end = if truncated { offset + 4 } else { offset };

        Ok((
            LeafTableCell {
                row_id: row_id.signed(),
                payload,
            },
            end,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sqlite::utils::encode_sqlite_varint;

    // lay out a leaf table cell: [payload len][rowid][header len][types][values]
    fn build_cell(row_id: u64, types: &[u64], values: &[u8]) -> Vec<u8> {
        let mut type_bytes: Vec<u8> = Vec::new();
        for t in types {
            type_bytes.extend(encode_sqlite_varint(*t));
        }
        let header_length = type_bytes.len() + 1;
        let payload_length = header_length + values.len();

        let mut cell = Vec::new();
        cell.extend(encode_sqlite_varint(payload_length as u64));
        cell.extend(encode_sqlite_varint(row_id));
        cell.extend(encode_sqlite_varint(header_length as u64));
        cell.extend(&type_bytes);
        cell.extend(values);
        cell
    }

    #[test]
    fn decodes_a_row_of_mixed_values() {
        // TEXT "hi" (serial 17), NULL, INT8 7, TRUE
        let cell = build_cell(1, &[17, 0, 1, 9], &[b'h', b'i', 7]);
        let end = cell.len();
        let (decoded, cursor) = LeafTableCell::decode(&cell, 0, end, 2, 0).unwrap();

        assert_eq!(decoded.row_id, 1);
        assert_eq!(decoded.payload.len(), 4);
        assert_eq!(decoded.payload[0].value, Value::Text("hi".into()));
        assert_eq!(decoded.payload[1].value, Value::Null);
        assert_eq!(decoded.payload[2].value, Value::Int(7));
        assert_eq!(decoded.payload[3].value, Value::Bool(true));
        assert_eq!(cursor, end);
    }

    #[test]
    fn integers_are_sign_extended() {
        let cell = build_cell(
            9,
            &[1, 2, 3, 4],
            &[
                0xFF, // -1 as int8
                0xFF, 0xFE, // -2 as int16
                0xFF, 0xFF, 0xFD, // -3 as int24
                0xFF, 0xFF, 0xFF, 0xFC, // -4 as int32
            ],
        );
        let end = cell.len();
        let (decoded, _) = LeafTableCell::decode(&cell, 0, end, 2, 0).unwrap();
        assert_eq!(decoded.payload[0].value, Value::Int(-1));
        assert_eq!(decoded.payload[1].value, Value::Int(-2));
        assert_eq!(decoded.payload[2].value, Value::Int(-3));
        assert_eq!(decoded.payload[3].value, Value::Int(-4));
    }

    #[test]
    fn double_consumes_eight_bytes() {
        let mut values = 1.5_f64.to_be_bytes().to_vec();
        values.push(42);
        let cell = build_cell(3, &[7, 1], &values);
        let end = cell.len();
        let (decoded, cursor) = LeafTableCell::decode(&cell, 0, end, 2, 0).unwrap();
        assert_eq!(decoded.payload[0].value, Value::Float(1.5));
        assert_eq!(decoded.payload[1].value, Value::Int(42));
        assert_eq!(cursor, end);
    }

    #[test]
    fn wide_integers_are_named_unsupported() {
        let cell = build_cell(1, &[5], &[0, 0, 0, 0, 0, 1]);
        let err = LeafTableCell::decode(&cell, 0, cell.len(), 2, 0).unwrap_err();
        assert!(matches!(err, SqliteError::UnimplementedWidth(5)));

        let cell = build_cell(1, &[6], &[0, 0, 0, 0, 0, 0, 0, 1]);
        let err = LeafTableCell::decode(&cell, 0, cell.len(), 2, 0).unwrap_err();
        assert!(matches!(err, SqliteError::UnimplementedWidth(6)));
    }

    #[test]
    fn internal_serial_types_are_rejected() {
        let cell = build_cell(1, &[10], &[]);
        let err = LeafTableCell::decode(&cell, 0, cell.len(), 2, 0).unwrap_err();
        assert!(matches!(err, SqliteError::InternalTypeAccess(10)));
    }

    #[test]
    fn header_length_must_match_type_varints() {
        // header length declares 2 type bytes, but the second serial type
        // varint is 2 bytes long and leaks past the declared header end
        let cell = [
            6,    // payload length
            1,    // rowid
            3,    // header length: itself + 2 type bytes
            1,    // int8
            0x81, // two byte serial type varint
            0x00,
            0x2A, // int8 value
        ];
        let err = LeafTableCell::decode(&cell, 0, cell.len(), 2, 0).unwrap_err();
        assert!(matches!(
            err,
            SqliteError::RecordHeaderMismatch {
                declared: 2,
                consumed: 3
            }
        ));
    }

    #[test]
    fn text_that_exceeds_payload_room_is_truncated_not_fatal() {
        // declared 40 byte text, but the cell boundary leaves much less room
        let declared = 40_usize;
        let serial_bytes = encode_sqlite_varint((13 + 2 * declared) as u64);
        let stored_text = b"only-this-fits";

        let mut cell = Vec::new();
        cell.extend(encode_sqlite_varint((2 + declared) as u64)); // nominal payload length
        cell.extend(encode_sqlite_varint(1)); // rowid
        cell.extend(encode_sqlite_varint((1 + serial_bytes.len()) as u64)); // header length
        cell.extend(&serial_bytes);
        cell.extend(stored_text);
        cell.extend([0, 0, 0, 9]); // overflow page pointer
        let cell_end = cell.len();

        let (decoded, cursor) = LeafTableCell::decode(&cell, 0, cell_end, 2, 0).unwrap();
        let item = &decoded.payload[0];
        assert!(item.is_truncated());
        let note = item.overflow.unwrap();
        assert_eq!(note.declared, declared);
        // payload room minus the 4 byte overflow pointer
        assert_eq!(note.stored, stored_text.len());
        assert_eq!(item.value, Value::Text("only-this-fits".into()));
        assert_eq!(cursor, cell_end);
    }

    #[test]
    fn truncated_blob_reports_partial_length() {
        let declared = 100_usize;
        let serial = (12 + 2 * declared) as u64;
        let stored = [0xAB_u8; 10];
        let serial_bytes = encode_sqlite_varint(serial);

        let mut cell = Vec::new();
        cell.extend(encode_sqlite_varint((2 + declared) as u64));
        cell.extend(encode_sqlite_varint(7));
        cell.extend(encode_sqlite_varint((1 + serial_bytes.len()) as u64));
        cell.extend(&serial_bytes);
        cell.extend(stored);
        cell.extend([0, 0, 0, 3]); // overflow page pointer
        let cell_end = cell.len();

        let (decoded, cursor) = LeafTableCell::decode(&cell, 0, cell_end, 2, 0).unwrap();
        let note = decoded.payload[0].overflow.unwrap();
        assert_eq!(note.stored, 10);
        assert_eq!(note.declared, 100);
        assert_eq!(decoded.payload[0].value, Value::Blob(stored.to_vec()));
        assert_eq!(cursor, cell_end);
        assert_eq!(
            decoded.payload[0].to_string(),
            "BLOB (10/100 bytes before overflow)"
        );
    }

    #[test]
    fn interior_cell_reads_child_and_key() {
        let mut bytes = 7_u32.to_be_bytes().to_vec();
        bytes.extend(encode_sqlite_varint(300));
        let (cell, end) = InteriorTableCell::decode(&bytes, 0, 1, 0).unwrap();
        assert_eq!(cell.left_child, 7);
        assert_eq!(cell.key, 300);
        assert_eq!(end, bytes.len());
    }
}
