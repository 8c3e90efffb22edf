use super::record::{PayloadValue, Value};
use crate::error::{Result, SqliteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaObjectType {
    Table,
    Index,
}

/// One row of the master schema table on page 1.
#[derive(Debug, Clone)]
pub struct SchemaEntry {
    pub row_id: i64,
    pub object_type: SchemaObjectType,
    pub name: String,
    pub table_name: String,
    pub root_page: u32,
    pub sql: String,
}

impl SchemaEntry {
    /// Build an entry from a master table row.
    ///
    /// The master table has exactly 5 columns: type, name, tbl_name,
    /// rootpage, sql. Returns `Ok(None)` for object types that carry no
    /// b-tree of their own (views, triggers); rejecting those would make
    /// perfectly ordinary files unreadable.
    pub fn from_master_row(row_id: i64, values: &[PayloadValue]) -> Result<Option<SchemaEntry>> {
        let malformed = || SqliteError::MalformedSchemaRow { row_id };

        let [type_item, name_item, table_name_item, root_page_item, sql_item] = values else {
            return Err(malformed());
        };

        let Value::Text(ref object_type_str) = type_item.value else {
            return Err(malformed());
        };
        let object_type = match object_type_str.to_lowercase().as_str() {
            "table" => SchemaObjectType::Table,
            "index" => SchemaObjectType::Index,
            "view" | "trigger" => return Ok(None),
            _ => return Err(malformed()),
        };

        let Value::Text(ref name) = name_item.value else {
            return Err(malformed());
        };
        let Value::Text(ref table_name) = table_name_item.value else {
            return Err(malformed());
        };

        let Value::Int(root_page) = root_page_item.value else {
            return Err(malformed());
        };
        let Ok(root_page) = u32::try_from(root_page) else {
            return Err(malformed());
        };

        // auto indexes have no sql text
        let sql = match sql_item.value {
            Value::Text(ref sql) => sql.clone(),
            Value::Null => String::new(),
            _ => return Err(malformed()),
        };

        Ok(Some(SchemaEntry {
            row_id,
            object_type,
            name: name.clone(),
            table_name: table_name.clone(),
            root_page,
            sql,
        }))
    }
}
