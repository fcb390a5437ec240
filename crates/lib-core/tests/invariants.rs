use pretty_assertions::assert_eq;
use recfile_core::fetch::NoFetcher;
use recfile_core::fex::{Fex, FexDialect};
use recfile_core::fields::{Comment, Field, FieldName};
use recfile_core::integrity::{IntegrityOptions, check_db_or_error};
use recfile_core::mset::ANY;
use recfile_core::parser::{parse_db_str, parse_record_str};
use recfile_core::record::{Record, RecordElem};
use recfile_core::resolver::resolve;
use recfile_core::types::Type;
use recfile_core::writer::{WriteMode, record_to_string};

fn field(name: &str, value: &str) -> Field {
    Field::new(FieldName::parse(name).unwrap(), value)
}

#[test]
fn field_counts_by_name_match_a_manual_scan() {
    let mut record = Record::new();
    record.append_field(field("Email", "a@x.example"));
    record.append_field(field("Name", "Alice"));
    record.append_field(field("Contact:Home:Email", "b@x.example"));
    record.append_comment(Comment::new(" noise"));

    for probe in ["Email", "Name", "Phone"] {
        let name = FieldName::parse(probe).unwrap();
        let scanned = record
            .fields()
            .filter(|f| f.name().equal_p(&name))
            .count();
        assert_eq!(record.num_fields_by_name(&name), scanned, "for {probe}");
    }
}

#[test]
fn element_kind_counts_partition_the_total() {
    let record = parse_record_str("Name: Alice\n# one\nEmail: a@x.example\n# two\n").unwrap();
    let elems = record.elems();
    assert_eq!(
        elems.count(ANY),
        elems.count(RecordElem::FIELD) + elems.count(RecordElem::COMMENT)
    );
}

#[test]
fn record_write_then_parse_preserves_names_values_and_order() {
    let mut record = Record::new();
    record.append_field(field("Name", "Alice"));
    record.append_field(field("Desc", "two\nlines"));
    record.append_comment(Comment::new(" between"));
    record.append_field(field("Name", "again"));

    let rendered = record_to_string(&record, WriteMode::Normal);
    let reparsed = parse_record_str(&rendered).unwrap();

    assert_eq!(reparsed, record);
    let order: Vec<(&str, &str)> = reparsed
        .fields()
        .map(|f| (f.name().role(), f.value()))
        .collect();
    assert_eq!(
        order,
        vec![("Name", "Alice"), ("Desc", "two\nlines"), ("Name", "again")]
    );
}

#[test]
fn db_write_then_parse_is_structurally_identical() {
    let input = "\
%rec: Contact
%key: Id

Id: 1
Name: Alice

# a separator

Id: 2
Name: Bob

%rec: Task

Id: 7
Title: shopping
";
    let db = parse_db_str(input).unwrap();
    let rendered = recfile_core::writer::db_to_string(&db, WriteMode::Normal);
    let reparsed = parse_db_str(&rendered).unwrap();

    assert_eq!(db.size(), reparsed.size());
    for (a, b) in db.rsets().zip(reparsed.rsets()) {
        assert_eq!(a.rec_type(), b.rec_type());
        assert_eq!(a.num_records(), b.num_records());
        assert_eq!(a.num_comments(), b.num_comments());
        match (a.descriptor(), b.descriptor()) {
            (Some(da), Some(db_)) => assert_eq!(da, db_),
            (None, None) => {}
            other => panic!("descriptor mismatch: {other:?}"),
        }
        for (ra, rb) in a.records().zip(b.records()) {
            assert_eq!(ra, rb);
        }
    }
}

#[test]
fn fex_rendering_reparses_to_an_equivalent_fex() {
    let cases = [
        ("Name Email Phone", FexDialect::Simple),
        ("Name,Email,Phone", FexDialect::Csv),
        ("Name,Email[2],Phone[0-4]", FexDialect::Subscripted),
    ];
    for (source, dialect) in cases {
        let fex = Fex::parse(source, dialect).unwrap();
        let rendered = fex.to_string(dialect);
        let reparsed = Fex::parse(&rendered, dialect).unwrap();
        assert_eq!(fex, reparsed, "for {source}");
    }
}

#[test]
fn type_checks_always_explain_failures() {
    let types = [
        "int", "bool", "range 0..5", "real", "size 2", "line", "regexp /^a/", "date",
        "enum one two", "field", "email",
    ];
    let hostile = ["", " ", "!!!", "\n", "zzzz", "9999999999999999999999999999"];

    for expr in types {
        let ty = Type::parse(expr).unwrap();
        for value in hostile {
            if let Err(reason) = ty.check(value) {
                assert!(!reason.is_empty(), "empty reason for {expr} on {value:?}");
            }
        }
    }
}

#[test]
fn resolver_agrees_with_direct_lookup() {
    let record = parse_record_str("Id: 7\nTag: a\nTag: b\n").unwrap();
    assert_eq!(resolve(&record, "/Id,/Tag").unwrap(), "7\na\nb\n");
    assert_eq!(resolve(&record, "Tag[1]").unwrap(), "Tag: b\n");
}

#[test]
fn integrity_error_folding() {
    let mut db = parse_db_str("%rec: Contact\n%key: Id\n\nId: 1\n\nId: 1\n").unwrap();
    let err = check_db_or_error(&mut db, &IntegrityOptions::default(), &NoFetcher).unwrap_err();
    let text = err.to_string();
    assert!(text.contains("1 integrity violations"));
    assert!(text.contains("duplicated key value"));

    let mut db = parse_db_str("%rec: Contact\n%key: Id\n\nId: 1\n").unwrap();
    assert!(check_db_or_error(&mut db, &IntegrityOptions::default(), &NoFetcher).is_ok());
}

#[test]
fn record_to_comment_and_back() {
    let record = parse_record_str("Name: Alice\nAge: 30\n").unwrap();
    let comment = record.to_comment();
    assert_eq!(comment.text(), "Name: Alice\nAge: 30");

    // Written out, the comment-ized record reads as two comment lines.
    let rendered = recfile_core::writer::comment_to_string(&comment, WriteMode::Normal);
    assert_eq!(rendered, "#Name: Alice\n#Age: 30\n");
}
