use std::sync::Arc;

use crate::db::Db;
use crate::errors::{Diagnostic, RecError, RecResult, Severity, render_report};
use crate::fetch::Fetcher;
use crate::fex::{Fex, FexDialect};
use crate::fields::FieldName;
use crate::parser::Parser;
use crate::record::Record;
use crate::rset::{RecordSet, SizeBound, descriptor};
use crate::types::{Type, TypeKeyword, parse_type_descriptor};

/// Knobs for a database integrity run.
#[derive(Debug, Clone, Copy)]
pub struct IntegrityOptions {
    /// Validate record descriptors themselves before using them.
    pub check_descriptors: bool,
    /// Fetch and merge external descriptors named by `%rec: Type SOURCE`.
    pub use_remote: bool,
}

impl Default for IntegrityOptions {
    fn default() -> Self {
        IntegrityOptions {
            check_descriptors: true,
            use_remote: false,
        }
    }
}

/// Which records count as "the others" for key uniqueness.
enum KeyScope {
    /// Records before the one under check; parsing order dedups the
    /// report to the later duplicate.
    Previous(usize),
    /// Every record except the one being replaced, if any.
    AllExcept(Option<usize>),
}

/// Check a whole database. Diagnostics are accumulated, never
/// short-circuited (except that a broken descriptor suppresses the
/// checks that would use it); the return value is the number of
/// violations added, not counting warnings.
pub fn check_db(
    db: &mut Db,
    opts: &IntegrityOptions,
    fetcher: &dyn Fetcher,
    diagnostics: &mut Vec<Diagnostic>,
) -> usize {
    let before = count_errors(diagnostics);

    for index in 0..db.size() {
        let saved = if opts.use_remote {
            merge_remote_descriptor(db, index, fetcher, diagnostics)
        } else {
            None
        };

        {
            let rset = db.get_rset(index).expect("index is in range");
            check_rset(db, rset, opts, diagnostics);
        }

        if let Some(original) = saved {
            db.get_rset_mut(index)
                .expect("index is in range")
                .set_descriptor(original);
        }
    }

    count_errors(diagnostics) - before
}

/// Like [`check_db`] but folding the outcome into a single error.
pub fn check_db_or_error(
    db: &mut Db,
    opts: &IntegrityOptions,
    fetcher: &dyn Fetcher,
) -> RecResult<()> {
    let mut diagnostics = Vec::new();
    let count = check_db(db, opts, fetcher, &mut diagnostics);
    if count == 0 {
        Ok(())
    } else {
        Err(RecError::Integrity {
            count,
            report: render_report(&diagnostics),
        })
    }
}

/// Check a single record against a record set, as an editor validating a
/// proposed change would. `replacing` names the record the candidate
/// stands in for, so key uniqueness does not trip over the record's own
/// old copy.
pub fn check_record(
    db: &Db,
    rset: &RecordSet,
    replacing: Option<usize>,
    record: &Record,
    diagnostics: &mut Vec<Diagnostic>,
) -> usize {
    let before = count_errors(diagnostics);
    check_record_inner(
        db,
        rset,
        record,
        KeyScope::AllExcept(replacing),
        diagnostics,
    );
    count_errors(diagnostics) - before
}

fn check_rset(db: &Db, rset: &RecordSet, opts: &IntegrityOptions, diagnostics: &mut Vec<Diagnostic>) {
    if opts.check_descriptors && rset.descriptor().is_some() {
        let errors = check_descriptor(rset, diagnostics);
        if errors > 0 {
            // A broken descriptor makes the remaining checks noise.
            return;
        }
    }

    check_size(rset, diagnostics);

    for (position, record) in rset.records().enumerate() {
        check_record_inner(db, rset, record, KeyScope::Previous(position), diagnostics);
    }
}

fn check_descriptor(rset: &RecordSet, diagnostics: &mut Vec<Diagnostic>) -> usize {
    let record = rset.descriptor().expect("caller checked for a descriptor");
    let before = count_errors(diagnostics);
    let at = |diags: &mut Vec<Diagnostic>, msg: String| {
        push_error(diags, record.source_line(), msg);
    };

    let count_named = |name: &str| {
        let name = FieldName::parse(name).expect("reserved name parses");
        record.num_fields_by_name(&name)
    };

    match count_named(descriptor::REC) {
        0 => at(
            diagnostics,
            "missing %rec field in record descriptor".to_owned(),
        ),
        1 => {}
        _ => at(
            diagnostics,
            "too many %rec fields in record descriptor".to_owned(),
        ),
    }

    if let Some(rec_type) = rset.rec_type()
        && !FieldName::valid_part(rec_type)
    {
        at(diagnostics, format!("invalid record type {rec_type}"));
    }

    if count_named(descriptor::KEY) > 1 {
        at(
            diagnostics,
            "only one %key field is allowed in a record descriptor".to_owned(),
        );
    }
    if count_named(descriptor::SIZE) > 1 {
        at(
            diagnostics,
            "only one %size field is allowed in a record descriptor".to_owned(),
        );
    }

    let mut fex_indexes = [0usize; 6];
    for field in record.fields() {
        let Some(head) = field.name().get(0) else {
            continue;
        };
        match head {
            descriptor::TYPE => {
                if let Err(err) = parse_type_descriptor(field.value()) {
                    let message = match err {
                        RecError::InvalidFex(_) => {
                            "expected a comma-separated list of fields before the type \
                             specification"
                                .to_owned()
                        }
                        _ => "invalid type specification".to_owned(),
                    };
                    push_error(diagnostics, field.source_line().or(record.source_line()), message);
                }
            }
            descriptor::SIZE => {
                if SizeBound::parse(field.value()).is_none() {
                    push_error(
                        diagnostics,
                        field.source_line().or(record.source_line()),
                        "value for %size shall be a number optionally preceded by >, <, >= or <="
                            .to_owned(),
                    );
                }
            }
            descriptor::KEY
            | descriptor::MANDATORY
            | descriptor::UNIQUE
            | descriptor::PROHIBIT
            | descriptor::AUTO
            | descriptor::CONFIDENTIAL => {
                let slot = match head {
                    descriptor::KEY => 0,
                    descriptor::MANDATORY => 1,
                    descriptor::UNIQUE => 2,
                    descriptor::PROHIBIT => 3,
                    descriptor::AUTO => 4,
                    _ => 5,
                };
                let index = fex_indexes[slot];
                fex_indexes[slot] += 1;
                if Fex::parse(field.value(), FexDialect::Simple).is_err() {
                    push_error(
                        diagnostics,
                        field.source_line().or(record.source_line()),
                        format!("value for {head}[{index}] is not a list of field names"),
                    );
                }
            }
            _ => {}
        }
    }

    if let Some(auto) = rset.auto_fex() {
        for elem in auto.iter() {
            let keyword = rset.field_type(elem.name()).map(|ty| ty.keyword());
            if let Some(keyword) = keyword
                && !matches!(
                    keyword,
                    TypeKeyword::Int | TypeKeyword::Range | TypeKeyword::Date
                )
            {
                at(
                    diagnostics,
                    format!(
                        "auto-incremented field {} shall be of type int, range or date",
                        elem.source()
                    ),
                );
            }
        }
    }

    count_errors(diagnostics) - before
}

fn check_size(rset: &RecordSet, diagnostics: &mut Vec<Diagnostic>) {
    let records = rset.num_records();
    let min = rset.min_records();
    let max = rset.max_records();
    let rec_type = rset.rec_type().unwrap_or("record");

    if min == max && records != min {
        push_error(
            diagnostics,
            None,
            format!("the number of records of type {rec_type} shall be {min}"),
        );
    } else if records > max {
        push_error(
            diagnostics,
            None,
            format!("too many records of type {rec_type}. Maximum allowed are {max}"),
        );
    } else if records < min {
        push_error(
            diagnostics,
            None,
            format!("too few records of type {rec_type}. Minimum allowed are {min}"),
        );
    }
}

fn check_record_inner(
    db: &Db,
    rset: &RecordSet,
    record: &Record,
    key_scope: KeyScope,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let line = record.source_line();

    // Key: present exactly once in the record, unique across the set.
    if let Some(key) = rset.key_fex() {
        for elem in key.iter() {
            match record.num_fields_by_name(elem.name()) {
                0 => push_error(
                    diagnostics,
                    line,
                    format!("key field '{}' not found in record", elem.source()),
                ),
                1 => {
                    let value = record
                        .get_field_by_name(elem.name(), 0)
                        .expect("counted above")
                        .value();
                    if key_value_duplicated(rset, record, elem.name(), value, &key_scope) {
                        push_error(
                            diagnostics,
                            line,
                            format!(
                                "duplicated key value in field '{}' in record",
                                elem.source()
                            ),
                        );
                    }
                }
                _ => push_error(
                    diagnostics,
                    line,
                    format!("multiple key fields '{}' in record", elem.source()),
                ),
            }
        }
    }

    // Types, with referred-type precedence.
    for field in record.fields() {
        let Some(ty) = resolve_type(db, rset, field.name(), line, diagnostics) else {
            continue;
        };
        if let Err(reason) = ty.check(field.value()) {
            push_error(diagnostics, field.source_line().or(line), reason);
        }
    }

    if let Some(mandatory) = rset.mandatory_fex() {
        for elem in mandatory.iter() {
            if record.num_fields_by_name(elem.name()) == 0 {
                push_error(
                    diagnostics,
                    line,
                    format!("mandatory field '{}' not found in record", elem.source()),
                );
            }
        }
    }

    if let Some(unique) = rset.unique_fex() {
        for elem in unique.iter() {
            if record.num_fields_by_name(elem.name()) > 1 {
                push_error(
                    diagnostics,
                    line,
                    format!("field '{}' should be unique in this record", elem.source()),
                );
            }
        }
    }

    if let Some(prohibit) = rset.prohibit_fex() {
        for elem in prohibit.iter() {
            if record.num_fields_by_name(elem.name()) > 0 {
                push_error(
                    diagnostics,
                    line,
                    format!("prohibited field '{}' found in record", elem.source()),
                );
            }
        }
    }
}

fn key_value_duplicated(
    rset: &RecordSet,
    record: &Record,
    key: &FieldName,
    value: &str,
    scope: &KeyScope,
) -> bool {
    let occupies = |other: &Record| {
        other
            .get_field_by_name(key, 0)
            .is_some_and(|f| f.value() == value)
    };

    match scope {
        KeyScope::Previous(position) => rset.records().take(*position).any(occupies),
        KeyScope::AllExcept(replacing) => rset
            .records()
            .enumerate()
            .filter(|(i, _)| Some(*i) != *replacing)
            .any(|(_, other)| !std::ptr::eq(other, record) && occupies(other)),
    }
}

/// Resolve the type of a field, honouring the referred-type rule: a
/// compound name `A:B:C` may pick up the type registered for `C` in the
/// record set named `A`. When both that and the local registration exist
/// and disagree, the local one wins and a warning is emitted.
fn resolve_type<'a>(
    db: &'a Db,
    rset: &'a RecordSet,
    name: &FieldName,
    line: Option<usize>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<&'a Arc<Type>> {
    let referring = rset.field_type(name);

    let referred = (name.size() == 3)
        .then(|| {
            let referred_set = name.get(0).and_then(|t| db.get_rset_by_type(Some(t)))?;
            let role = FieldName::from_parts(&[name.role()]).ok()?;
            referred_set.field_type(&role)
        })
        .flatten();

    match (referring, referred) {
        (Some(local), Some(remote)) => {
            if local.as_ref() != remote.as_ref() {
                let message = format!(
                    "type {} collides with referred type {} in the rset {}",
                    local.source(),
                    remote.source(),
                    name.get(0).unwrap_or_default(),
                );
                log::warn!("{message}");
                diagnostics.push(Diagnostic {
                    file: None,
                    line,
                    severity: Severity::Warning,
                    message,
                });
            }
            Some(local)
        }
        (Some(local), None) => Some(local),
        (None, remote) => remote,
    }
}

/// Fetch, parse and splice in an external descriptor. Returns the
/// original descriptor to restore after this record set's checks, or
/// `None` when nothing was merged.
fn merge_remote_descriptor(
    db: &mut Db,
    index: usize,
    fetcher: &dyn Fetcher,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Option<Record>> {
    let (source, rec_type, line) = {
        let rset = db.get_rset(index)?;
        let source = rset.descriptor_source()?.to_owned();
        let rec_type = rset.rec_type()?.to_owned();
        let line = rset.descriptor().and_then(Record::source_line);
        (source, rec_type, line)
    };

    let bytes = match fetcher.fetch(&source) {
        Ok(bytes) => bytes,
        Err(err) => {
            push_error(
                diagnostics,
                line,
                format!("could not fetch remote descriptor from url {source}: {err}"),
            );
            return None;
        }
    };

    let foreign_db = match Parser::new(bytes.as_slice()).with_file(source.clone()).parse_db() {
        Ok(parsed) => parsed,
        Err(_) => {
            push_error(
                diagnostics,
                line,
                format!("{source} does not contain valid rec data"),
            );
            return None;
        }
    };

    let Some(foreign_descriptor) = foreign_db
        .get_rset_by_type(Some(rec_type.as_str()))
        .and_then(RecordSet::descriptor)
    else {
        push_error(
            diagnostics,
            line,
            format!("{source} does not contain information for type {rec_type}"),
        );
        return None;
    };

    let rset = db.get_rset_mut(index).expect("index is in range");
    let original = rset.descriptor().cloned();
    let mut merged = original.clone().unwrap_or_default();
    for field in foreign_descriptor.fields() {
        if field.name().get(0) != Some(descriptor::REC) {
            merged.append_field(field.clone());
        }
    }
    rset.set_descriptor(Some(merged));

    Some(original)
}

fn push_error(diagnostics: &mut Vec<Diagnostic>, line: Option<usize>, message: String) {
    diagnostics.push(Diagnostic {
        file: None,
        line,
        severity: Severity::Error,
        message,
    });
}

fn count_errors(diagnostics: &[Diagnostic]) -> usize {
    diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count()
}
