use crate::errors::{RecError, RecResult};
use crate::fex::{Fex, FexDialect};
use crate::record::Record;
use crate::writer::{WriteMode, field_to_string};

/// Resolve a field path against a record.
///
/// The path is a comma-separated list of `[/]name[\[i\]|\[i-j\]]`
/// elements. Each element emits its role-matching field occurrences in
/// record order: with the leading slash just the value followed by a
/// newline, without it the whole field in normal rec syntax. Elements
/// that match nothing emit nothing.
pub fn resolve(record: &Record, path: &str) -> RecResult<String> {
    let mut out = String::new();

    for part in path.split(',') {
        let (values_only, elem_str) = match part.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, part),
        };

        let fex = Fex::parse(elem_str, FexDialect::Subscripted)
            .map_err(|_| RecError::InvalidFex(path.to_owned()))?;
        let elem = fex.get(0).expect("a parsed fex has at least one element");

        let mut occurrence = 0usize;
        for field in record.fields() {
            if field.name().equal_p(elem.name()) {
                if elem.selects(occurrence) {
                    if values_only {
                        out.push_str(field.value());
                        out.push('\n');
                    } else {
                        out.push_str(&field_to_string(field, WriteMode::Normal));
                    }
                }
                occurrence += 1;
            }
        }
    }

    Ok(out)
}
