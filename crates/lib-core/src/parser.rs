use std::io::Read;

use ahash::AHashSet;

use crate::buf::Buf;
use crate::db::Db;
use crate::errors::{ParseErrorKind, RecError, RecResult};
use crate::fields::{Comment, Field, FieldName};
use crate::record::Record;
use crate::rset::{RecordSet, descriptor};

/// Streaming decoder for the rec format.
///
/// Pull-based and single pass: one byte at a time with one byte of
/// pushback, O(one record) memory plus the record set under
/// construction. The current line number is maintained across pushback
/// (ungetting a newline decrements it), so errors point at the right
/// line.
pub struct Parser<R: Read> {
    reader: R,
    file: String,
    pushback: Option<u8>,
    line: usize,
    eof: bool,
    error: Option<ParseErrorKind>,
    prev_descriptor: Option<Record>,
}

const DEFAULT_FILE: &str = "<input>";

impl<R: Read> Parser<R> {
    pub fn new(reader: R) -> Self {
        Parser {
            reader,
            file: DEFAULT_FILE.to_owned(),
            pushback: None,
            line: 1,
            eof: false,
            error: None,
            prev_descriptor: None,
        }
    }

    /// Name the stream for diagnostics.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    pub fn eof(&self) -> bool {
        self.eof
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// Clear a sticky error and the EOF flag so parsing may resume on a
    /// fresh stream position.
    pub fn reset(&mut self) {
        self.eof = false;
        self.error = None;
    }

    /// Parse a complete database: record sets until end of input. An
    /// empty input is an empty database, not an error.
    pub fn parse_db(&mut self) -> RecResult<Db> {
        let mut db = Db::new();
        db.set_source(self.file.clone());
        let mut seen_types: AHashSet<String> = AHashSet::new();

        while let Some(rset) = self.parse_rset()? {
            if let Some(rec_type) = rset.rec_type()
                && !seen_types.insert(rec_type.to_owned())
            {
                return Err(RecError::DuplicatedRset(rec_type.to_owned()));
            }
            let position = db.size() as isize;
            db.insert_rset(rset, position);
        }

        Ok(db)
    }

    /// Parse the next record set, or `None` at end of input.
    pub fn parse_rset(&mut self) -> RecResult<Option<RecordSet>> {
        let mut rset = RecordSet::new();
        if let Some(descriptor) = self.prev_descriptor.take() {
            rset.set_descriptor(Some(descriptor));
        }

        loop {
            let Some(byte) = self.getc()? else {
                break;
            };

            match byte {
                // Blank lines and stray spaces between records.
                b'\n' | b' ' => {}
                b'#' => {
                    self.ungetc(b'#');
                    let comment = self.parse_comment()?;
                    // Comments before a record set has any content are
                    // "between record sets" and dropped.
                    if rset.descriptor().is_some() || rset.num_records() > 0 {
                        rset.append_comment(comment);
                    }
                }
                other => {
                    self.ungetc(other);
                    let record = self.parse_record()?;

                    if is_descriptor(&record) {
                        if rset.descriptor().is_none() && rset.num_records() == 0 {
                            rset.set_descriptor(Some(record));
                        } else {
                            // A new descriptor seeds the next record set.
                            self.prev_descriptor = Some(record);
                            break;
                        }
                    } else {
                        rset.append_record(record);
                    }
                }
            }
        }

        if rset.descriptor().is_some() || rset.num_records() > 0 {
            Ok(Some(rset))
        } else {
            Ok(None)
        }
    }

    /// Parse one record: a field, then fields and comments until a blank
    /// line or end of input.
    pub fn parse_record(&mut self) -> RecResult<Record> {
        let mut record = Record::new();
        record.set_source_line(self.line);

        let first = self.parse_field().map_err(|err| expected_field(err))?;
        record.append_field(first);

        loop {
            let Some(byte) = self.getc()? else {
                break;
            };
            match byte {
                b'#' => {
                    self.ungetc(b'#');
                    let comment = self.parse_comment()?;
                    record.append_comment(comment);
                }
                b'\n' => break,
                other => {
                    self.ungetc(other);
                    let field = self.parse_field().map_err(|err| expected_field(err))?;
                    record.append_field(field);
                }
            }
        }

        Ok(record)
    }

    /// Parse one field: a name, an optional single space, then the value
    /// up to an unescaped newline.
    pub fn parse_field(&mut self) -> RecResult<Field> {
        let line = self.line;
        let name = self.parse_field_name()?;
        let value = self.parse_field_value()?;
        let mut field = Field::new(name, value);
        field.set_source_line(line);
        Ok(field)
    }

    /// Parse a field name from the stream: 1-3 parts, each terminated by
    /// a consumed `:`. The single optional space before the value is
    /// consumed here; a newline is left for the value production so an
    /// empty value before a blank line or EOF parses cleanly.
    pub fn parse_field_name(&mut self) -> RecResult<FieldName> {
        let mut name = FieldName::new();
        loop {
            let part = self.parse_name_part()?;
            let index = name.size();
            name.set(index, &part)
                .map_err(|_| self.err(ParseErrorKind::TooManyNameParts))?;

            match self.getc()? {
                None => break,
                Some(b' ') => break,
                Some(b'\n') => {
                    self.ungetc(b'\n');
                    break;
                }
                Some(byte) if byte.is_ascii_alphabetic() || byte == b'%' => {
                    // Another name part follows.
                    self.ungetc(byte);
                }
                Some(byte) => {
                    self.ungetc(byte);
                    return Err(self.err(ParseErrorKind::ExpectedFieldName));
                }
            }
        }
        Ok(name)
    }

    /// Parse one comment line: `#` through the next newline (consumed) or
    /// end of input.
    pub fn parse_comment(&mut self) -> RecResult<Comment> {
        match self.getc()? {
            Some(b'#') => {}
            _ => return Err(self.err(ParseErrorKind::ExpectedComment)),
        }

        let mut buf = Buf::new();
        while let Some(byte) = self.getc()? {
            if byte == b'\n' {
                break;
            }
            buf.push(byte);
        }
        Ok(Comment::new(buf.into_string()?))
    }

    fn parse_name_part(&mut self) -> RecResult<String> {
        let mut buf = Buf::new();

        // [a-zA-Z%]
        match self.getc()? {
            Some(byte) if byte.is_ascii_alphabetic() || byte == b'%' => buf.push(byte),
            Some(_) | None => return Err(self.err(ParseErrorKind::ExpectedFieldName)),
        }

        // [a-zA-Z0-9_]* up to the consumed ':'.
        loop {
            match self.getc()? {
                Some(b':') => break,
                Some(byte) if byte.is_ascii_alphanumeric() || byte == b'_' => buf.push(byte),
                Some(_) | None => return Err(self.err(ParseErrorKind::ExpectedFieldName)),
            }
        }

        Ok(buf.into_string()?)
    }

    fn parse_field_value(&mut self) -> RecResult<String> {
        let mut buf = Buf::new();
        loop {
            match self.getc()? {
                None => break,
                Some(b'\\') => match self.getc()? {
                    // A backslash right before the newline elides it.
                    Some(b'\n') => {}
                    Some(other) => {
                        buf.push(b'\\');
                        self.ungetc(other);
                    }
                    None => {
                        buf.push(b'\\');
                        break;
                    }
                },
                Some(b'\n') => match self.getc()? {
                    // `\n+` and `\n+ ` both mean an embedded newline.
                    Some(b'+') => {
                        buf.push(b'\n');
                        match self.getc()? {
                            Some(b' ') | None => {}
                            Some(other) => self.ungetc(other),
                        }
                    }
                    Some(other) => {
                        self.ungetc(other);
                        break;
                    }
                    None => break,
                },
                Some(byte) => buf.push(byte),
            }
        }

        Ok(buf.into_string()?)
    }

    fn getc(&mut self) -> RecResult<Option<u8>> {
        if let Some(byte) = self.pushback.take() {
            if byte == b'\n' {
                self.line += 1;
            }
            return Ok(Some(byte));
        }

        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(None);
                }
                Ok(_) => {
                    if byte[0] == b'\n' {
                        self.line += 1;
                    }
                    return Ok(Some(byte[0]));
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(RecError::Io(err)),
            }
        }
    }

    fn ungetc(&mut self, byte: u8) {
        if byte == b'\n' {
            self.line -= 1;
        }
        debug_assert!(self.pushback.is_none(), "single byte of pushback");
        self.pushback = Some(byte);
    }

    fn err(&mut self, kind: ParseErrorKind) -> RecError {
        self.error = Some(kind);
        RecError::Parse {
            kind,
            file: self.file.clone(),
            line: self.line,
        }
    }
}

/// Inside a record every element must be a field or a comment, so a
/// malformed field name there reads as "expected a field". More specific
/// kinds pass through.
fn expected_field(err: RecError) -> RecError {
    match err {
        RecError::Parse {
            kind: ParseErrorKind::ExpectedFieldName,
            file,
            line,
        } => RecError::Parse {
            kind: ParseErrorKind::ExpectedField,
            file,
            line,
        },
        other => other,
    }
}

fn is_descriptor(record: &Record) -> bool {
    record
        .fields()
        .any(|f| f.name().size() == 1 && f.name().get(0) == Some(descriptor::REC))
}

/// Parse a standalone field name such as `Email` or `Contact:Home:Email`,
/// with or without the trailing colon.
pub fn parse_field_name_str(s: &str) -> RecResult<FieldName> {
    FieldName::parse(s)
}

/// Parse a complete database out of a string.
pub fn parse_db_str(s: &str) -> RecResult<Db> {
    Parser::new(s.as_bytes()).parse_db()
}

/// Parse a single record out of a string.
pub fn parse_record_str(s: &str) -> RecResult<Record> {
    Parser::new(s.as_bytes()).parse_record()
}
