use crate::error::{Result, SqliteError};

/// One column recovered from CREATE TABLE text. The file format stores no
/// binary column metadata, the SQL fragment is all there is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub declared_type: String,
}

/// Recover the column list of a CREATE TABLE statement.
///
/// `expected_table_name` must match the name in the statement, which
/// guards against handing the wrong schema row to the parser. Errors
/// carry the offending line and column plus the tokens that would have
/// been accepted there.
pub fn parse_create_table(sql: &str, expected_table_name: &str) -> Result<Vec<Column>> {
    Parser::new(sql, expected_table_name).run()
}

// data type keywords this parser recognizes; NVARCHAR and NUMERIC take a
// parenthesized size argument that becomes part of the declared type
const PLAIN_TYPES: [&str; 6] = ["TEXT", "DATETIME", "DOUBLE", "INTEGER", "TINYINT", "BLOB"];
const SIZED_TYPES: [&str; 2] = ["NVARCHAR", "NUMERIC"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Create,
    Table,
    TableName,
    ColumnsOpeningParenthesis,
    ColumnName,
    ColumnDataType,
    ColumnConstraints,
    ConstraintDefault,
    ConstraintName,
    ConstraintKind,
    Done,
}

struct Parser<'a> {
    sql: &'a str,
    bytes: &'a [u8],
    expected_table_name: &'a str,
    i: usize,
    state: State,
    table_name: String,
    table_name_quoted: bool,
    column_name: String,
    column_name_quoted: bool,
    // the column name waiting for its data type
    pending_name: Option<String>,
    constraint_name: String,
    columns: Vec<Column>,
}

impl<'a> Parser<'a> {
    fn new(sql: &'a str, expected_table_name: &'a str) -> Parser<'a> {
        Parser {
            sql,
            bytes: sql.as_bytes(),
            expected_table_name,
            i: 0,
            state: State::Create,
            table_name: String::new(),
            table_name_quoted: false,
            column_name: String::new(),
            column_name_quoted: false,
            pending_name: None,
            constraint_name: String::new(),
            columns: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Column>> {
        while self.i < self.bytes.len() {
            match self.state {
                State::Create => self.state_create()?,
                State::Table => self.state_table()?,
                State::TableName => self.state_table_name()?,
                State::ColumnsOpeningParenthesis => self.state_opening_parenthesis()?,
                State::ColumnName => self.state_column_name()?,
                State::ColumnDataType => self.state_column_data_type()?,
                State::ColumnConstraints => self.state_column_constraints()?,
                State::ConstraintDefault => self.state_constraint_default()?,
                State::ConstraintName => self.state_constraint_name()?,
                State::ConstraintKind => self.state_constraint_kind()?,
                State::Done => {
                    return Err(self.err(&["end of statement"]));
                }
            }
        }

        if self.state == State::Done {
            Ok(self.columns)
        } else {
            // ran out of text mid statement
            Err(self.err(&self.expected_here()))
        }
    }

    // ---- states ----

    fn state_create(&mut self) -> Result<()> {
        if self.skip_one_whitespace() {
            return Ok(());
        }
        if !self.eat_keyword("CREATE") {
            return Err(self.err(&["CREATE"]));
        }
        self.state = State::Table;
        Ok(())
    }

    fn state_table(&mut self) -> Result<()> {
        if self.skip_one_whitespace() {
            return Ok(());
        }
        if !self.eat_keyword("TABLE") {
            return Err(self.err(&["TABLE"]));
        }
        self.state = State::TableName;
        Ok(())
    }

    fn state_table_name(&mut self) -> Result<()> {
        let byte = self.bytes[self.i];

        if self.table_name_quoted {
            if byte == b']' {
                if self.table_name.is_empty() {
                    return Err(self.err(&["quoted table name"]));
                }
                self.check_table_name()?;
                self.i += 1;
                self.state = State::ColumnsOpeningParenthesis;
            } else {
                self.table_name.push(byte as char);
                self.i += 1;
            }
            return Ok(());
        }

        if is_whitespace(byte) {
            if self.table_name.is_empty() {
                self.i += 1;
            } else {
                self.check_table_name()?;
                self.i += 1;
                self.state = State::ColumnsOpeningParenthesis;
            }
            return Ok(());
        }

        if byte == b'[' {
            if !self.table_name.is_empty() {
                return Err(self.err(&["valid table name identifier character"]));
            }
            self.table_name_quoted = true;
            self.i += 1;
            return Ok(());
        }

        if byte == b'(' && !self.table_name.is_empty() {
            self.check_table_name()?;
            self.state = State::ColumnsOpeningParenthesis;
            return Ok(());
        }

        if is_identifier_byte(byte) {
            self.table_name.push(byte as char);
            self.i += 1;
            return Ok(());
        }

        Err(self.err(&["valid table name identifier character"]))
    }

    fn state_opening_parenthesis(&mut self) -> Result<()> {
        if self.skip_one_whitespace() {
            return Ok(());
        }
        if self.bytes[self.i] != b'(' {
            return Err(self.err(&["("]));
        }
        self.i += 1;
        self.state = State::ColumnName;
        Ok(())
    }

    fn state_column_name(&mut self) -> Result<()> {
        let byte = self.bytes[self.i];

        if self.column_name_quoted {
            if byte == b']' {
                if self.column_name.is_empty() {
                    return Err(self.err(&["quoted column name"]));
                }
                self.pending_name = Some(std::mem::take(&mut self.column_name));
                self.column_name_quoted = false;
                self.i += 1;
                self.state = State::ColumnDataType;
            } else {
                self.column_name.push(byte as char);
                self.i += 1;
            }
            return Ok(());
        }

        if is_whitespace(byte) {
            if self.column_name.is_empty() {
                self.i += 1;
            } else {
                self.pending_name = Some(std::mem::take(&mut self.column_name));
                self.i += 1;
                self.state = State::ColumnDataType;
            }
            return Ok(());
        }

        // table level constraints start where a column definition would
        if self.column_name.is_empty() {
            if self.eat_keyword("CONSTRAINT") {
                self.state = State::ConstraintName;
                return Ok(());
            }
            if self.eat_phrase(&["PRIMARY", "KEY"]) {
                self.expect_paren_group(&["("])?;
                self.state = State::ColumnConstraints;
                return Ok(());
            }
            if self.peek_keyword_then_parenthesis("UNIQUE") {
                let ate = self.eat_keyword("UNIQUE");
                debug_assert!(ate);
                self.expect_paren_group(&["("])?;
                self.state = State::ColumnConstraints;
                return Ok(());
            }
        }

        if byte == b'[' {
            if !self.column_name.is_empty() {
                return Err(self.err(&["valid column name identifier character"]));
            }
            self.column_name_quoted = true;
            self.i += 1;
            return Ok(());
        }

        if is_identifier_byte(byte) {
            self.column_name.push(byte as char);
            self.i += 1;
            return Ok(());
        }

        Err(self.err(&["column name", "CONSTRAINT", "PRIMARY KEY", "UNIQUE"]))
    }

    fn state_column_data_type(&mut self) -> Result<()> {
        if self.skip_one_whitespace() {
            return Ok(());
        }

        for keyword in PLAIN_TYPES {
            if self.eat_keyword(keyword) {
                self.push_column(keyword.to_string());
                self.state = State::ColumnConstraints;
                return Ok(());
            }
        }

        for keyword in SIZED_TYPES {
            if self.eat_keyword(keyword) {
                self.skip_whitespace_run();
                let group = self.expect_paren_group(&["("])?;
                self.push_column(format!("{keyword}{group}"));
                self.state = State::ColumnConstraints;
                return Ok(());
            }
        }

        Err(self.err(&[
            "TEXT",
            "DATETIME",
            "DOUBLE",
            "INTEGER",
            "TINYINT",
            "BLOB",
            "NVARCHAR(n)",
            "NUMERIC(p[,s])",
        ]))
    }

    fn state_column_constraints(&mut self) -> Result<()> {
        if self.skip_one_whitespace() {
            return Ok(());
        }

        if self.eat_phrase(&["NOT", "NULL"])
            || self.eat_phrase(&["PRIMARY", "KEY"])
            || self.eat_keyword("UNIQUE")
            || self.eat_keyword("ASC")
        {
            return Ok(());
        }

        if self.eat_keyword("DEFAULT") {
            self.state = State::ConstraintDefault;
            return Ok(());
        }

        if self.eat_keyword("ON") {
            self.skip_whitespace_run();
            if !self.eat_keyword("DELETE") && !self.eat_keyword("UPDATE") {
                return Err(self.err(&["DELETE", "UPDATE"]));
            }
            self.skip_whitespace_run();
            if !self.eat_phrase(&["NO", "ACTION"]) {
                return Err(self.err(&["NO ACTION"]));
            }
            return Ok(());
        }

        let byte = self.bytes[self.i];
        if byte == b',' {
            self.i += 1;
            self.state = State::ColumnName;
            return Ok(());
        }

        if byte == b')' {
            self.i += 1;
            if self.i != self.bytes.len() {
                // the closing parenthesis must end the statement
                return Err(self.err(&["end of statement"]));
            }
            self.state = State::Done;
            return Ok(());
        }

        Err(self.err(&[
            "NOT NULL",
            "PRIMARY KEY",
            "UNIQUE",
            "DEFAULT",
            "ASC",
            "ON",
            ",",
            ")",
        ]))
    }

    fn state_constraint_default(&mut self) -> Result<()> {
        if self.skip_one_whitespace() {
            return Ok(());
        }

        let byte = self.bytes[self.i];

        if byte == b'\'' {
            // string literal, scan to the closing quote
            let mut j = self.i + 1;
            while j < self.bytes.len() && self.bytes[j] != b'\'' {
                j += 1;
            }
            if j == self.bytes.len() {
                return Err(self.err(&["'"]));
            }
            self.i = j + 1;
            self.state = State::ColumnConstraints;
            return Ok(());
        }

        if byte == b'(' {
            self.expect_paren_group(&["("])?;
            self.state = State::ColumnConstraints;
            return Ok(());
        }

        if byte == b'+' || byte == b'-' || byte.is_ascii_digit() {
            self.i += 1;
            while self.i < self.bytes.len()
                && (self.bytes[self.i].is_ascii_digit() || self.bytes[self.i] == b'.')
            {
                self.i += 1;
            }
            self.state = State::ColumnConstraints;
            return Ok(());
        }

        if is_identifier_byte(byte) {
            // bare literal such as NULL or CURRENT_TIMESTAMP
            while self.i < self.bytes.len() && is_identifier_byte(self.bytes[self.i]) {
                self.i += 1;
            }
            self.state = State::ColumnConstraints;
            return Ok(());
        }

        Err(self.err(&["string literal", "numeric literal", "identifier", "("]))
    }

    fn state_constraint_name(&mut self) -> Result<()> {
        let byte = self.bytes[self.i];

        if is_whitespace(byte) {
            if self.constraint_name.is_empty() {
                self.i += 1;
            } else {
                self.constraint_name.clear();
                self.i += 1;
                self.state = State::ConstraintKind;
            }
            return Ok(());
        }

        if is_identifier_byte(byte) {
            self.constraint_name.push(byte as char);
            self.i += 1;
            return Ok(());
        }

        Err(self.err(&["valid constraint name identifier character"]))
    }

    fn state_constraint_kind(&mut self) -> Result<()> {
        if self.skip_one_whitespace() {
            return Ok(());
        }

        if self.eat_phrase(&["FOREIGN", "KEY"]) {
            self.skip_whitespace_run();
            self.expect_paren_group(&["("])?;
            self.skip_whitespace_run();
            if !self.eat_keyword("REFERENCES") {
                return Err(self.err(&["REFERENCES"]));
            }
            self.skip_whitespace_run();
            // referenced table name, optionally bracket quoted
            if self.i < self.bytes.len() && self.bytes[self.i] == b'[' {
                self.i += 1;
                while self.i < self.bytes.len() && self.bytes[self.i] != b']' {
                    self.i += 1;
                }
                if self.i == self.bytes.len() {
                    return Err(self.err(&["]"]));
                }
                self.i += 1;
            } else {
                let start = self.i;
                while self.i < self.bytes.len() && is_identifier_byte(self.bytes[self.i]) {
                    self.i += 1;
                }
                if self.i == start {
                    return Err(self.err(&["referenced table name"]));
                }
            }
            self.skip_whitespace_run();
            self.expect_paren_group(&["("])?;
            self.state = State::ColumnConstraints;
            return Ok(());
        }

        if self.eat_phrase(&["PRIMARY", "KEY"]) || self.eat_keyword("UNIQUE") {
            self.skip_whitespace_run();
            self.expect_paren_group(&["("])?;
            self.state = State::ColumnConstraints;
            return Ok(());
        }

        Err(self.err(&["FOREIGN KEY", "PRIMARY KEY", "UNIQUE"]))
    }

    // ---- helpers ----

    fn check_table_name(&self) -> Result<()> {
        if self.table_name != self.expected_table_name {
            return Err(SqliteError::TableNameMismatch {
                expected: self.expected_table_name.to_string(),
                found: self.table_name.clone(),
            });
        }
        Ok(())
    }

    fn push_column(&mut self, declared_type: String) {
        // a data type is only reachable with a pending column name
        let name = self.pending_name.take().unwrap_or_default();
        self.columns.push(Column {
            name,
            declared_type,
        });
    }

    /// Consume one whitespace byte; true if one was consumed.
    fn skip_one_whitespace(&mut self) -> bool {
        if self.i < self.bytes.len() && is_whitespace(self.bytes[self.i]) {
            self.i += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace_run(&mut self) {
        while self.i < self.bytes.len() && is_whitespace(self.bytes[self.i]) {
            self.i += 1;
        }
    }

    /// Match a keyword case insensitively at the cursor, requiring a word
    /// boundary after it. Consumes it on match.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let end = self.i + keyword.len();
        if end > self.bytes.len() {
            return false;
        }
        if !self.bytes[self.i..end].eq_ignore_ascii_case(keyword.as_bytes()) {
            return false;
        }
        if let Some(next) = self.bytes.get(end) {
            if is_identifier_byte(*next) {
                return false;
            }
        }
        self.i = end;
        true
    }

    /// Match whitespace separated words as one unit, e.g. NOT NULL.
    fn eat_phrase(&mut self, words: &[&str]) -> bool {
        let saved = self.i;
        for (index, word) in words.iter().enumerate() {
            if index > 0 {
                let before = self.i;
                self.skip_whitespace_run();
                if self.i == before {
                    self.i = saved;
                    return false;
                }
            }
            if !self.eat_keyword(word) {
                self.i = saved;
                return false;
            }
        }
        true
    }

    fn peek_keyword_then_parenthesis(&self, keyword: &str) -> bool {
        let end = self.i + keyword.len();
        if end > self.bytes.len() {
            return false;
        }
        if !self.bytes[self.i..end].eq_ignore_ascii_case(keyword.as_bytes()) {
            return false;
        }
        let mut j = end;
        while j < self.bytes.len() && is_whitespace(self.bytes[j]) {
            j += 1;
        }
        self.bytes.get(j) == Some(&b'(')
    }

    /// Consume a balanced parenthesis group starting at the cursor and
    /// return it verbatim, parentheses included. Nesting is respected so
    /// DEFAULT (f(x, (y))) and NUMERIC(10,2) stay balanced.
    fn expect_paren_group(&mut self, expected: &[&str]) -> Result<String> {
        self.skip_whitespace_run();
        if self.i >= self.bytes.len() || self.bytes[self.i] != b'(' {
            return Err(self.err(expected));
        }

        let start = self.i;
        let mut depth = 0_usize;
        while self.i < self.bytes.len() {
            match self.bytes[self.i] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        self.i += 1;
                        return Ok(self.sql[start..self.i].to_string());
                    }
                }
                _ => {}
            }
            self.i += 1;
        }

        Err(self.err(&[")"]))
    }

    fn expected_here(&self) -> Vec<&'static str> {
        match self.state {
            State::Create => vec!["CREATE"],
            State::Table => vec!["TABLE"],
            State::TableName => vec!["table name"],
            State::ColumnsOpeningParenthesis => vec!["("],
            State::ColumnName => vec!["column name"],
            State::ColumnDataType => vec!["data type"],
            State::ColumnConstraints => vec![",", ")"],
            State::ConstraintDefault => vec!["literal"],
            State::ConstraintName => vec!["constraint name"],
            State::ConstraintKind => vec!["FOREIGN KEY", "PRIMARY KEY", "UNIQUE"],
            State::Done => vec!["end of statement"],
        }
    }

    fn err(&self, expected: &[&str]) -> SqliteError {
        let consumed = &self.bytes[..self.i.min(self.bytes.len())];
        let line = consumed.iter().filter(|byte| **byte == b'\n').count() + 1;
        let line_start = consumed
            .iter()
            .rposition(|byte| *byte == b'\n')
            .map(|position| position + 1)
            .unwrap_or(0);
        SqliteError::SchemaSyntax {
            line,
            column: self.i - line_start + 1,
            expected: expected.iter().map(|token| token.to_string()).collect(),
        }
    }
}

fn is_whitespace(byte: u8) -> bool {
    byte == b' ' || byte == b'\n' || byte == b'\t'
}

fn is_identifier_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

#[cfg(test)]
mod test {
    use super::*;

    fn column(name: &str, declared_type: &str) -> Column {
        Column {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }

    #[test]
    fn bracket_quoted_round_trip() {
        let columns = parse_create_table("CREATE TABLE [T] ([A] INTEGER, [B] TEXT)", "T").unwrap();
        assert_eq!(columns, vec![column("A", "INTEGER"), column("B", "TEXT")]);
    }

    #[test]
    fn unquoted_names() {
        let columns =
            parse_create_table("CREATE TABLE albums (AlbumId INTEGER, Title TEXT)", "albums")
                .unwrap();
        assert_eq!(
            columns,
            vec![column("AlbumId", "INTEGER"), column("Title", "TEXT")]
        );
    }

    #[test]
    fn no_space_before_parenthesis() {
        let columns = parse_create_table("CREATE TABLE t(id INTEGER)", "t").unwrap();
        assert_eq!(columns, vec![column("id", "INTEGER")]);
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let columns = parse_create_table("create table t (id integer, name text)", "t").unwrap();
        assert_eq!(columns, vec![column("id", "INTEGER"), column("name", "TEXT")]);
    }

    #[test]
    fn mismatched_table_name() {
        let err = parse_create_table("CREATE TABLE [T] ([A] INTEGER)", "U").unwrap_err();
        assert!(matches!(
            err,
            SqliteError::TableNameMismatch { ref expected, ref found }
                if expected == "U" && found == "T"
        ));
    }

    #[test]
    fn column_constraints_are_accepted() {
        let sql = "CREATE TABLE t (id INTEGER NOT NULL PRIMARY KEY ASC, tag TEXT UNIQUE)";
        let columns = parse_create_table(sql, "t").unwrap();
        assert_eq!(columns, vec![column("id", "INTEGER"), column("tag", "TEXT")]);
    }

    #[test]
    fn default_literals() {
        let sql = "CREATE TABLE t (a TEXT DEFAULT '', b INTEGER DEFAULT 0, c TEXT DEFAULT NULL, d DOUBLE DEFAULT -1.5)";
        let columns = parse_create_table(sql, "t").unwrap();
        assert_eq!(columns.len(), 4);
    }

    #[test]
    fn default_with_nested_parentheses() {
        let sql = "CREATE TABLE t (stamp DATETIME DEFAULT (strftime('%s', (SELECT 'now'))))";
        let columns = parse_create_table(sql, "t").unwrap();
        assert_eq!(columns, vec![column("stamp", "DATETIME")]);
    }

    #[test]
    fn sized_types_keep_their_arguments() {
        let sql = "CREATE TABLE t (name NVARCHAR(80), price NUMERIC(10,2), small NUMERIC(5))";
        let columns = parse_create_table(sql, "t").unwrap();
        assert_eq!(
            columns,
            vec![
                column("name", "NVARCHAR(80)"),
                column("price", "NUMERIC(10,2)"),
                column("small", "NUMERIC(5)"),
            ]
        );
    }

    #[test]
    fn remaining_plain_types() {
        let sql = "CREATE TABLE t (a TINYINT, b BLOB, c DATETIME, d DOUBLE)";
        let columns = parse_create_table(sql, "t").unwrap();
        assert_eq!(columns.len(), 4);
        assert_eq!(columns[0].declared_type, "TINYINT");
        assert_eq!(columns[1].declared_type, "BLOB");
    }

    #[test]
    fn on_delete_and_update_no_action() {
        let sql = "CREATE TABLE t (a INTEGER ON DELETE NO ACTION ON UPDATE NO ACTION)";
        let columns = parse_create_table(sql, "t").unwrap();
        assert_eq!(columns, vec![column("a", "INTEGER")]);
    }

    #[test]
    fn named_foreign_key_constraint() {
        let sql = "CREATE TABLE [Track] ([Id] INTEGER, [AlbumId] INTEGER, \
                   CONSTRAINT FK_TrackAlbum FOREIGN KEY (AlbumId) REFERENCES [Album] (Id))";
        let columns = parse_create_table(sql, "Track").unwrap();
        assert_eq!(
            columns,
            vec![column("Id", "INTEGER"), column("AlbumId", "INTEGER")]
        );
    }

    #[test]
    fn table_level_primary_key_and_unique() {
        let sql = "CREATE TABLE t (a INTEGER, b TEXT, PRIMARY KEY (a, b), UNIQUE (b))";
        let columns = parse_create_table(sql, "t").unwrap();
        assert_eq!(columns, vec![column("a", "INTEGER"), column("b", "TEXT")]);
    }

    #[test]
    fn named_table_level_primary_key() {
        let sql = "CREATE TABLE t (a INTEGER, CONSTRAINT pk PRIMARY KEY (a))";
        let columns = parse_create_table(sql, "t").unwrap();
        assert_eq!(columns, vec![column("a", "INTEGER")]);
    }

    #[test]
    fn unknown_type_reports_position_and_expectations() {
        let err = parse_create_table("CREATE TABLE t (id FLOAT)", "t").unwrap_err();
        let SqliteError::SchemaSyntax {
            line,
            column,
            expected,
        } = err
        else {
            panic!("expected a syntax error, got {err:?}");
        };
        assert_eq!(line, 1);
        assert_eq!(column, 20);
        assert!(expected.iter().any(|token| token == "INTEGER"));
    }

    #[test]
    fn error_positions_track_newlines() {
        let err = parse_create_table("CREATE TABLE t (\n  id WIDGET)", "t").unwrap_err();
        let SqliteError::SchemaSyntax { line, column, .. } = err else {
            panic!("expected a syntax error");
        };
        assert_eq!(line, 2);
        assert_eq!(column, 6);
    }

    #[test]
    fn closing_parenthesis_must_end_the_statement() {
        let err = parse_create_table("CREATE TABLE t (id INTEGER) ", "t").unwrap_err();
        assert!(matches!(err, SqliteError::SchemaSyntax { .. }));
    }

    #[test]
    fn truncated_statement_fails_at_end_of_input() {
        let err = parse_create_table("CREATE TABLE t (id INTEGER", "t").unwrap_err();
        assert!(matches!(err, SqliteError::SchemaSyntax { .. }));
    }

    #[test]
    fn unbalanced_default_expression_fails() {
        let err = parse_create_table("CREATE TABLE t (a TEXT DEFAULT (f(x))", "t").unwrap_err();
        assert!(matches!(err, SqliteError::SchemaSyntax { .. }));
    }

    #[test]
    fn multiline_statement_parses() {
        let sql = "CREATE TABLE [Customer]\n(\n    [Id] INTEGER NOT NULL,\n    [Name] NVARCHAR(40) NOT NULL,\n    [Company] NVARCHAR(80),\n    PRIMARY KEY ([Id])\n)";
        let columns = parse_create_table(sql, "Customer").unwrap();
        assert_eq!(
            columns,
            vec![
                column("Id", "INTEGER"),
                column("Name", "NVARCHAR(40)"),
                column("Company", "NVARCHAR(80)"),
            ]
        );
    }
}
