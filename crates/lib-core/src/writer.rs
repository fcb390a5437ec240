use std::io::{self, Write};

use itertools::Itertools;

use crate::db::Db;
use crate::fex::Fex;
use crate::fields::{Comment, Field, FieldName};
use crate::record::{Record, RecordElem};
use crate::rset::{RecordSet, RsetElem};

/// Output dialect of the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Canonical rec syntax; what `parse` accepts.
    #[default]
    Normal,
    /// A lisp-ish debugging form for downstream sexp consumers.
    Sexp,
}

/// Encoder for the rec format over any byte sink.
///
/// In Normal mode every embedded newline of a field value is rendered as
/// `\n+ `, records inside a set are separated by single blank lines, and
/// so are record sets inside a database. No trailing blank line is ever
/// emitted, so output round-trips byte for byte.
pub struct Writer<W: Write> {
    out: W,
    mode: WriteMode,
}

impl<W: Write> Writer<W> {
    pub fn new(out: W) -> Self {
        Writer {
            out,
            mode: WriteMode::Normal,
        }
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Hand back the underlying sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn write_field_name(&mut self, name: &FieldName) -> io::Result<()> {
        self.out
            .write_all(field_name_to_string(name, self.mode).as_bytes())
    }

    pub fn write_field(&mut self, field: &Field) -> io::Result<()> {
        self.out
            .write_all(field_to_string(field, self.mode).as_bytes())
    }

    pub fn write_comment(&mut self, comment: &Comment) -> io::Result<()> {
        self.out
            .write_all(comment_to_string(comment, self.mode).as_bytes())
    }

    pub fn write_record(&mut self, record: &Record) -> io::Result<()> {
        self.out
            .write_all(record_to_string(record, self.mode).as_bytes())
    }

    pub fn write_rset(&mut self, rset: &RecordSet) -> io::Result<()> {
        self.out
            .write_all(rset_to_string(rset, self.mode).as_bytes())
    }

    pub fn write_db(&mut self, db: &Db) -> io::Result<()> {
        self.out.write_all(db_to_string(db, self.mode).as_bytes())
    }

    /// Write only the fields of `record` a fex selects, in fex order.
    /// With `values_only` just the values are printed, one per line, or
    /// space-separated on a single line when `row` is also set.
    pub fn write_record_fex(
        &mut self,
        record: &Record,
        fex: &Fex,
        values_only: bool,
        row: bool,
    ) -> io::Result<()> {
        let rendered = record_fex_to_string(record, fex, self.mode, values_only, row);
        self.out.write_all(rendered.as_bytes())
    }
}

pub fn field_name_to_string(name: &FieldName, mode: WriteMode) -> String {
    match mode {
        WriteMode::Normal => {
            let mut out = String::new();
            for part in name.parts() {
                out.push_str(part);
                out.push(':');
            }
            out
        }
        WriteMode::Sexp => {
            format!("({})", name.parts().map(|p| format!("\"{p}\"")).join(" "))
        }
    }
}

pub fn field_to_string(field: &Field, mode: WriteMode) -> String {
    match mode {
        WriteMode::Normal => {
            let mut out = field_name_to_string(field.name(), mode);
            out.push(' ');
            out.push_str(&field.value().replace('\n', "\n+ "));
            out.push('\n');
            out
        }
        WriteMode::Sexp => {
            format!(
                "(field {} \"{}\")\n",
                field_name_to_string(field.name(), mode),
                escape_sexp(field.value())
            )
        }
    }
}

pub fn comment_to_string(comment: &Comment, mode: WriteMode) -> String {
    match mode {
        WriteMode::Normal => {
            // One '#' per line keeps multi-line comment bodies framed.
            let mut out = String::new();
            for line in comment.text().split('\n') {
                out.push('#');
                out.push_str(line);
                out.push('\n');
            }
            out
        }
        WriteMode::Sexp => format!("(comment \"{}\")\n", escape_sexp(comment.text())),
    }
}

pub fn record_to_string(record: &Record, mode: WriteMode) -> String {
    match mode {
        WriteMode::Normal => {
            let mut out = String::new();
            for elem in record.elems().iter() {
                match elem {
                    RecordElem::Field(f) => out.push_str(&field_to_string(f, mode)),
                    RecordElem::Comment(c) => out.push_str(&comment_to_string(c, mode)),
                }
            }
            out
        }
        WriteMode::Sexp => {
            let mut out = String::from("(record\n");
            for elem in record.elems().iter() {
                let rendered = match elem {
                    RecordElem::Field(f) => field_to_string(f, mode),
                    RecordElem::Comment(c) => comment_to_string(c, mode),
                };
                out.push_str("  ");
                out.push_str(rendered.trim_end_matches('\n'));
                out.push('\n');
            }
            out.push_str(")\n");
            out
        }
    }
}

pub fn rset_to_string(rset: &RecordSet, mode: WriteMode) -> String {
    match mode {
        WriteMode::Normal => {
            let mut chunks = Vec::new();
            if let Some(descriptor) = rset.descriptor() {
                chunks.push(record_to_string(descriptor, mode));
            }
            for elem in rset.elems().iter() {
                match elem {
                    RsetElem::Record(r) => chunks.push(record_to_string(r, mode)),
                    RsetElem::Comment(c) => chunks.push(comment_to_string(c, mode)),
                }
            }
            chunks.join("\n")
        }
        WriteMode::Sexp => {
            let mut out = String::from("(rset\n");
            if let Some(descriptor) = rset.descriptor() {
                out.push_str("  (descriptor\n");
                out.push_str(&indent(&record_to_string(descriptor, mode), 4));
                out.push_str("  )\n");
            }
            for elem in rset.elems().iter() {
                let rendered = match elem {
                    RsetElem::Record(r) => record_to_string(r, mode),
                    RsetElem::Comment(c) => comment_to_string(c, mode),
                };
                out.push_str(&indent(&rendered, 2));
            }
            out.push_str(")\n");
            out
        }
    }
}

pub fn db_to_string(db: &Db, mode: WriteMode) -> String {
    match mode {
        WriteMode::Normal => db
            .rsets()
            .map(|rs| rset_to_string(rs, mode))
            .join("\n"),
        WriteMode::Sexp => {
            let mut out = String::from("(db\n");
            for rset in db.rsets() {
                out.push_str(&indent(&rset_to_string(rset, mode), 2));
            }
            out.push_str(")\n");
            out
        }
    }
}

pub fn record_fex_to_string(
    record: &Record,
    fex: &Fex,
    mode: WriteMode,
    values_only: bool,
    row: bool,
) -> String {
    let mut selected = Vec::new();
    for elem in fex.iter() {
        let mut occurrence = 0usize;
        for field in record.fields() {
            if field.name().equal_p(elem.name()) {
                if elem.selects(occurrence) {
                    selected.push(field);
                }
                occurrence += 1;
            }
        }
    }

    if values_only {
        if row {
            let mut out = selected.iter().map(|f| f.value()).join(" ");
            out.push('\n');
            out
        } else {
            selected
                .iter()
                .map(|f| format!("{}\n", f.value()))
                .collect()
        }
    } else {
        selected
            .iter()
            .map(|f| field_to_string(f, mode))
            .collect()
    }
}

fn escape_sexp(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

fn indent(s: &str, n: usize) -> String {
    let pad = " ".repeat(n);
    s.lines().map(|line| format!("{pad}{line}\n")).collect()
}
