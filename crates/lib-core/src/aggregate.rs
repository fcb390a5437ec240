use recfile_helpers::{IndexMap, atod};

use crate::fields::FieldName;
use crate::record::Record;
use crate::rset::RecordSet;

/// An aggregate function: a pure function over a whole record set or a
/// single record, yielding a string. When `record` is given the
/// aggregation is restricted to it.
pub type AggregateFn =
    fn(rset: &RecordSet, record: Option<&Record>, field: &FieldName) -> String;

/// Registry of aggregate functions. Lookup is case-insensitive,
/// registration replaces, and there is no fixed capacity. This is a
/// value, not a process-wide table: every database user owns its own.
#[derive(Debug, Clone, Default)]
pub struct AggregateRegistry {
    functions: IndexMap<String, AggregateFn>,
}

impl AggregateRegistry {
    pub fn new() -> Self {
        AggregateRegistry::default()
    }

    /// A registry with the standard functions in place.
    pub fn standard() -> Self {
        let mut registry = AggregateRegistry::new();
        registry.add("Count", count);
        registry.add("Sum", sum);
        registry.add("Min", min);
        registry.add("Max", max);
        registry.add("Avg", avg);
        registry
    }

    pub fn add(&mut self, name: &str, function: AggregateFn) {
        self.functions.insert(name.to_lowercase(), function);
    }

    pub fn get(&self, name: &str) -> Option<AggregateFn> {
        self.functions.get(&name.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Whether `name` is one of the standard aggregate functions.
pub fn standard_p(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "count" | "sum" | "min" | "max" | "avg"
    )
}

fn count(rset: &RecordSet, record: Option<&Record>, field: &FieldName) -> String {
    let count: usize = match record {
        Some(record) => record.num_fields_by_name(field),
        None => rset.records().map(|r| r.num_fields_by_name(field)).sum(),
    };
    count.to_string()
}

fn sum(rset: &RecordSet, record: Option<&Record>, field: &FieldName) -> String {
    let total: f64 = numeric_values(rset, record, field).sum();
    format_number(total)
}

fn min(rset: &RecordSet, record: Option<&Record>, field: &FieldName) -> String {
    let result = numeric_values(rset, record, field).fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.min(v)))
    });
    format_number(result.unwrap_or(0.0))
}

fn max(rset: &RecordSet, record: Option<&Record>, field: &FieldName) -> String {
    let result = numeric_values(rset, record, field).fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.max(v)))
    });
    format_number(result.unwrap_or(0.0))
}

fn avg(rset: &RecordSet, record: Option<&Record>, field: &FieldName) -> String {
    let values: Vec<f64> = numeric_values(rset, record, field).collect();
    if values.is_empty() {
        return format_number(0.0);
    }
    format_number(values.iter().sum::<f64>() / values.len() as f64)
}

/// The numeric values of the matching fields. Values that do not parse
/// as numbers are skipped, not errors.
fn numeric_values<'a>(
    rset: &'a RecordSet,
    record: Option<&'a Record>,
    field: &'a FieldName,
) -> Box<dyn Iterator<Item = f64> + 'a> {
    let of_record = move |record: &'a Record| {
        record
            .fields()
            .filter(move |f| f.name().equal_p(field))
            .filter_map(|f| atod(f.value()))
    };

    match record {
        Some(record) => Box::new(of_record(record)),
        None => Box::new(rset.records().flat_map(of_record)),
    }
}

/// Integral results print as integers, everything else as fixed-point
/// with six decimals, C `printf` style.
fn format_number(n: f64) -> String {
    if n == n.floor() && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        format!("{n:.6}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fields::Field;

    fn rset() -> RecordSet {
        let mut rset = RecordSet::new();
        for price in ["10", "20", "15.5"] {
            let mut record = Record::new();
            record.append_field(Field::new(FieldName::parse("Price").unwrap(), price));
            rset.append_record(record);
        }
        rset
    }

    #[test]
    fn test_count_and_sum() {
        let rset = rset();
        let registry = AggregateRegistry::standard();
        let field = FieldName::parse("Price").unwrap();

        let count = registry.get("Count").unwrap();
        assert_eq!(count(&rset, None, &field), "3");

        let sum = registry.get("sum").unwrap();
        assert_eq!(sum(&rset, None, &field), "45.500000");
    }

    #[test]
    fn test_sum_integral_result_prints_as_integer() {
        let mut rset = rset();
        rset.remove_record_at(2);
        let field = FieldName::parse("Price").unwrap();
        assert_eq!(sum(&rset, None, &field), "30");
    }

    #[test]
    fn test_single_record_scope() {
        let rset = rset();
        let field = FieldName::parse("Price").unwrap();
        let record = rset.get_record(2).unwrap();
        assert_eq!(sum(&rset, Some(record), &field), "15.500000");
        assert_eq!(count(&rset, Some(record), &field), "1");
    }

    #[test]
    fn test_non_numeric_values_are_skipped() {
        let mut rset = rset();
        let mut record = Record::new();
        record.append_field(Field::new(FieldName::parse("Price").unwrap(), "free"));
        rset.append_record(record);

        let field = FieldName::parse("Price").unwrap();
        assert_eq!(sum(&rset, None, &field), "45.500000");
        // Count does not care about numericness.
        assert_eq!(count(&rset, None, &field), "4");
    }

    #[test]
    fn test_min_max_avg() {
        let rset = rset();
        let field = FieldName::parse("Price").unwrap();
        assert_eq!(min(&rset, None, &field), "10");
        assert_eq!(max(&rset, None, &field), "20");
        assert_eq!(avg(&rset, None, &field), "15.166667");
    }

    #[test]
    fn test_registry_case_insensitive_and_replacing() {
        let mut registry = AggregateRegistry::standard();
        assert!(registry.get("COUNT").is_some());
        assert!(registry.get("unknown").is_none());
        assert!(standard_p("sUm"));
        assert!(!standard_p("median"));

        fn zero(_: &RecordSet, _: Option<&Record>, _: &FieldName) -> String {
            "0".to_owned()
        }
        let before = registry.len();
        registry.add("Sum", zero);
        assert_eq!(registry.len(), before);
        let replaced = registry.get("sum").unwrap();
        assert_eq!(replaced(&rset(), None, &FieldName::parse("Price").unwrap()), "0");
    }
}
