use crate::errors::{RecError, RecResult};
use crate::fex::Fex;
use crate::fields::{Field, FieldName};
use crate::record::{Record, RecordElem};
use crate::rset::{RecordSet, RsetElem};
use crate::sex::Sex;

/// Picks records inside a record set.
#[derive(Debug, Clone, Default)]
pub enum RecordSelector {
    /// Every record.
    #[default]
    All,
    /// Records matching a selection expression. An evaluation failure is
    /// "no match" for queries and a hard error for mutations.
    Sex(Sex),
    /// Records at the given 0-based positions.
    Indexes(Vec<usize>),
}

/// What to do with the fields a fex selects inside the records a selector
/// picks.
#[derive(Debug, Clone)]
pub enum SetAction {
    /// Set the value of the selected fields.
    Set(String),
    /// Append a field with the given value for every fex element,
    /// regardless of existing occurrences.
    Add(String),
    /// Set the selected fields; add the field when no occurrence exists.
    SetOrAdd(String),
    /// Rename the selected fields.
    Rename(FieldName),
    /// Delete the selected fields.
    Delete,
    /// Turn the selected fields into comments.
    Comment,
}

/// An ordered sequence of record sets.
///
/// At most one record set per type: that invariant is enforced by the
/// reader and preserved by the mutation surface here.
#[derive(Debug, Clone, Default)]
pub struct Db {
    rsets: Vec<RecordSet>,
    source: Option<String>,
}

impl Db {
    pub fn new() -> Self {
        Db::default()
    }

    /// The name of the stream this database was read from, feeding
    /// diagnostics.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = Some(source.into());
    }

    pub fn size(&self) -> usize {
        self.rsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rsets.is_empty()
    }

    pub fn rsets(&self) -> impl Iterator<Item = &RecordSet> {
        self.rsets.iter()
    }

    pub fn rsets_mut(&mut self) -> impl Iterator<Item = &mut RecordSet> {
        self.rsets.iter_mut()
    }

    pub fn get_rset(&self, index: usize) -> Option<&RecordSet> {
        self.rsets.get(index)
    }

    pub fn get_rset_mut(&mut self, index: usize) -> Option<&mut RecordSet> {
        self.rsets.get_mut(index)
    }

    /// Insert at `position`; negative positions prepend, positions past
    /// the end append.
    pub fn insert_rset(&mut self, rset: RecordSet, position: isize) {
        let position = position.max(0) as usize;
        if position >= self.rsets.len() {
            self.rsets.push(rset);
        } else {
            self.rsets.insert(position, rset);
        }
    }

    pub fn remove_rset(&mut self, index: usize) -> Option<RecordSet> {
        (index < self.rsets.len()).then(|| self.rsets.remove(index))
    }

    pub fn type_p(&self, rec_type: &str) -> bool {
        self.get_rset_by_type(Some(rec_type)).is_some()
    }

    /// The record set of the given type; `None` asks for the anonymous
    /// (descriptor-less) set.
    pub fn get_rset_by_type(&self, rec_type: Option<&str>) -> Option<&RecordSet> {
        self.rsets
            .iter()
            .find(|rs| rs.rec_type() == rec_type)
    }

    pub fn get_rset_by_type_mut(&mut self, rec_type: Option<&str>) -> Option<&mut RecordSet> {
        self.rsets
            .iter_mut()
            .find(|rs| rs.rec_type() == rec_type)
    }

    /// Select records of a type. Matching records are cloned into a fresh
    /// record set carrying a clone of the source descriptor; when a fex is
    /// given each record is narrowed to the selected fields.
    pub fn query(
        &self,
        rec_type: Option<&str>,
        selector: &RecordSelector,
        fex: Option<&Fex>,
    ) -> RecResult<RecordSet> {
        let mut result = RecordSet::new();
        let Some(rset) = self.get_rset_by_type(rec_type) else {
            return Ok(result);
        };
        result.set_descriptor(rset.descriptor().cloned());

        for (position, record) in rset.records().enumerate() {
            if !selects(selector, record, position, false)? {
                continue;
            }
            let projected = match fex {
                None => record.clone(),
                Some(fex) => project(record, fex),
            };
            result.append_record(projected);
        }

        Ok(result)
    }

    /// Delete (or comment out) the selected records of a type. Returns
    /// how many records were affected. A failing selection expression
    /// aborts: silently skipping a record here would silently keep data.
    pub fn delete_records(
        &mut self,
        rec_type: Option<&str>,
        selector: &RecordSelector,
        comment_out: bool,
    ) -> RecResult<usize> {
        let Some(rset) = self.get_rset_by_type_mut(rec_type) else {
            return Ok(0);
        };

        // Work over absolute element positions so records and comments
        // interleave unchanged.
        let mut hits = Vec::new();
        let mut record_pos = 0usize;
        for (abs, elem) in rset.elems().iter().enumerate() {
            if let RsetElem::Record(record) = elem {
                if selects(selector, record, record_pos, true)? {
                    hits.push(abs);
                }
                record_pos += 1;
            }
        }

        for &abs in hits.iter().rev() {
            if comment_out {
                let comment = rset.elems().iter().nth(abs).and_then(RsetElem::as_record)
                    .expect("hit positions point at records")
                    .to_comment();
                rset.elems_mut().replace_at(abs, RsetElem::Comment(comment));
            } else {
                rset.elems_mut().remove_at(abs);
            }
        }

        Ok(hits.len())
    }

    /// Apply a field action to the fex-selected fields of the selected
    /// records. Returns how many records were touched.
    pub fn set_fields(
        &mut self,
        rec_type: Option<&str>,
        selector: &RecordSelector,
        fex: &Fex,
        action: &SetAction,
    ) -> RecResult<usize> {
        // Selection happens before mutation so a failing expression
        // leaves the database untouched.
        let selected: Vec<usize> = {
            let Some(rset) = self.get_rset_by_type(rec_type) else {
                return Ok(0);
            };
            let mut selected = Vec::new();
            for (position, record) in rset.records().enumerate() {
                if selects(selector, record, position, true)? {
                    selected.push(position);
                }
            }
            selected
        };

        let rset = self
            .get_rset_by_type_mut(rec_type)
            .expect("the record set was just found");
        let mut touched = 0usize;
        for position in selected {
            let record = rset
                .records_mut()
                .nth(position)
                .expect("selected positions are in range");
            if apply_action(record, fex, action) {
                touched += 1;
            }
        }

        Ok(touched)
    }
}

fn selects(
    selector: &RecordSelector,
    record: &Record,
    position: usize,
    strict: bool,
) -> RecResult<bool> {
    match selector {
        RecordSelector::All => Ok(true),
        RecordSelector::Indexes(indexes) => Ok(indexes.contains(&position)),
        RecordSelector::Sex(sex) => match sex.eval(record) {
            Ok(matched) => Ok(matched),
            Err(_) if !strict => Ok(false),
            Err(err) => Err(RecError::InvalidSex(err.to_string())),
        },
    }
}

/// Narrow a record to the fields a fex selects, preserving order of the
/// fex elements and of the occurrences inside each element.
fn project(record: &Record, fex: &Fex) -> Record {
    let mut projected = Record::new();
    if let Some(line) = record.source_line() {
        projected.set_source_line(line);
    }
    for elem in fex.iter() {
        let mut occurrence = 0usize;
        for field in record.fields() {
            if field.name().equal_p(elem.name()) {
                if elem.selects(occurrence) {
                    projected.append_field(field.clone());
                }
                occurrence += 1;
            }
        }
    }
    projected
}

fn apply_action(record: &mut Record, fex: &Fex, action: &SetAction) -> bool {
    let mut touched = false;

    for elem in fex.iter() {
        match action {
            SetAction::Add(value) => {
                record.append_field(Field::new(elem.name().clone(), value.clone()));
                touched = true;
            }
            SetAction::Set(value) | SetAction::SetOrAdd(value) => {
                let mut occurrence = 0usize;
                let mut any = false;
                for field in record.fields_mut() {
                    if field.name().equal_p(elem.name()) {
                        if elem.selects(occurrence) {
                            field.set_value(value.clone());
                            any = true;
                        }
                        occurrence += 1;
                    }
                }
                if !any && matches!(action, SetAction::SetOrAdd(_)) {
                    record.append_field(Field::new(elem.name().clone(), value.clone()));
                    any = true;
                }
                touched |= any;
            }
            SetAction::Rename(new_name) => {
                let mut occurrence = 0usize;
                for field in record.fields_mut() {
                    if field.name().equal_p(elem.name()) {
                        if elem.selects(occurrence) {
                            field.set_name(new_name.clone());
                            touched = true;
                        }
                        occurrence += 1;
                    }
                }
            }
            SetAction::Delete | SetAction::Comment => {
                // Collect absolute positions first: mutating while
                // counting occurrences would shift them.
                let mut occurrence = 0usize;
                let mut positions = Vec::new();
                for (abs, rec_elem) in record.elems().iter().enumerate() {
                    if let RecordElem::Field(field) = rec_elem {
                        if field.name().equal_p(elem.name()) {
                            if elem.selects(occurrence) {
                                positions.push(abs);
                            }
                            occurrence += 1;
                        }
                    }
                }
                for &abs in positions.iter().rev() {
                    if matches!(action, SetAction::Comment) {
                        let comment = record
                            .elems()
                            .iter()
                            .nth(abs)
                            .and_then(RecordElem::as_field)
                            .expect("positions point at fields")
                            .to_comment();
                        record
                            .elems_mut()
                            .replace_at(abs, RecordElem::Comment(comment));
                    } else {
                        record.elems_mut().remove_at(abs);
                    }
                    touched = true;
                }
            }
        }
    }

    touched
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fex::FexDialect;

    fn field(name: &str, value: &str) -> Field {
        Field::new(FieldName::parse(name).unwrap(), value)
    }

    fn contact(name: &str, age: &str) -> Record {
        let mut record = Record::new();
        record.append_field(field("Name", name));
        record.append_field(field("Age", age));
        record
    }

    fn contacts_db() -> Db {
        let mut rset = RecordSet::new();
        rset.set_rec_type("Contact");
        rset.append_record(contact("Alice", "30"));
        rset.append_record(contact("Bob", "17"));
        rset.append_record(contact("Carol", "45"));

        let mut db = Db::new();
        db.insert_rset(rset, 0);
        db
    }

    #[test]
    fn test_rset_lookup_by_type() {
        let db = contacts_db();
        assert!(db.type_p("Contact"));
        assert!(!db.type_p("Task"));
        assert_eq!(
            db.get_rset_by_type(Some("Contact")).unwrap().num_records(),
            3
        );
        assert!(db.get_rset_by_type(None).is_none());
    }

    #[test]
    fn test_insert_rset_clamps() {
        let mut db = contacts_db();
        let mut other = RecordSet::new();
        other.set_rec_type("Task");
        db.insert_rset(other, -3);
        assert_eq!(db.get_rset(0).unwrap().rec_type(), Some("Task"));

        let mut third = RecordSet::new();
        third.set_rec_type("Item");
        db.insert_rset(third, 99);
        assert_eq!(db.get_rset(2).unwrap().rec_type(), Some("Item"));
    }

    #[test]
    fn test_query_with_sex() {
        let db = contacts_db();
        let sex = Sex::compile("Age > 18", false).unwrap();
        let result = db
            .query(Some("Contact"), &RecordSelector::Sex(sex), None)
            .unwrap();
        assert_eq!(result.num_records(), 2);
        assert_eq!(result.rec_type(), Some("Contact"));
        let names: Vec<&str> = result
            .records()
            .map(|r| r.get_field(0).unwrap().value())
            .collect();
        assert_eq!(names, vec!["Alice", "Carol"]);
    }

    #[test]
    fn test_query_with_fex_projection() {
        let db = contacts_db();
        let fex = Fex::parse("Age", FexDialect::Simple).unwrap();
        let result = db
            .query(Some("Contact"), &RecordSelector::All, Some(&fex))
            .unwrap();
        assert_eq!(result.num_records(), 3);
        for record in result.records() {
            assert_eq!(record.num_fields(), 1);
            assert_eq!(record.get_field(0).unwrap().name().role(), "Age");
        }
    }

    #[test]
    fn test_query_by_index() {
        let db = contacts_db();
        let result = db
            .query(
                Some("Contact"),
                &RecordSelector::Indexes(vec![0, 2]),
                None,
            )
            .unwrap();
        assert_eq!(result.num_records(), 2);
    }

    #[test]
    fn test_delete_records() {
        let mut db = contacts_db();
        let sex = Sex::compile("Age < 18", false).unwrap();
        let deleted = db
            .delete_records(Some("Contact"), &RecordSelector::Sex(sex), false)
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(
            db.get_rset_by_type(Some("Contact")).unwrap().num_records(),
            2
        );
    }

    #[test]
    fn test_comment_out_records() {
        let mut db = contacts_db();
        let deleted = db
            .delete_records(
                Some("Contact"),
                &RecordSelector::Indexes(vec![1]),
                true,
            )
            .unwrap();
        assert_eq!(deleted, 1);

        let rset = db.get_rset_by_type(Some("Contact")).unwrap();
        assert_eq!(rset.num_records(), 2);
        assert_eq!(rset.num_comments(), 1);
        let comment = rset
            .elems()
            .iter()
            .find_map(RsetElem::as_comment)
            .unwrap();
        assert!(comment.text().contains("Name: Bob"));
    }

    #[test]
    fn test_set_fields_set_and_delete() {
        let mut db = contacts_db();
        let fex = Fex::parse("Age", FexDialect::Simple).unwrap();

        let touched = db
            .set_fields(
                Some("Contact"),
                &RecordSelector::All,
                &fex,
                &SetAction::Set("0".to_owned()),
            )
            .unwrap();
        assert_eq!(touched, 3);
        let rset = db.get_rset_by_type(Some("Contact")).unwrap();
        assert!(rset.records().all(|r| r.get_field(1).unwrap().value() == "0"));

        let touched = db
            .set_fields(
                Some("Contact"),
                &RecordSelector::Indexes(vec![0]),
                &fex,
                &SetAction::Delete,
            )
            .unwrap();
        assert_eq!(touched, 1);
        let rset = db.get_rset_by_type(Some("Contact")).unwrap();
        assert_eq!(rset.get_record(0).unwrap().num_fields(), 1);
        assert_eq!(rset.get_record(1).unwrap().num_fields(), 2);
    }

    #[test]
    fn test_set_fields_set_or_add() {
        let mut db = contacts_db();
        let fex = Fex::parse("Phone", FexDialect::Simple).unwrap();
        let touched = db
            .set_fields(
                Some("Contact"),
                &RecordSelector::All,
                &fex,
                &SetAction::SetOrAdd("555-0100".to_owned()),
            )
            .unwrap();
        assert_eq!(touched, 3);
        let rset = db.get_rset_by_type(Some("Contact")).unwrap();
        assert!(rset.records().all(|r| {
            r.get_field_by_name(&FieldName::parse("Phone").unwrap(), 0)
                .is_some()
        }));
    }

    #[test]
    fn test_failing_sex_aborts_mutations_but_not_queries() {
        let mut db = contacts_db();
        // Division by zero fails evaluation on every record.
        let sex = Sex::compile("Age / 0 > 1", false).unwrap();

        let result = db
            .query(Some("Contact"), &RecordSelector::Sex(sex.clone()), None)
            .unwrap();
        assert_eq!(result.num_records(), 0);

        let err = db.delete_records(Some("Contact"), &RecordSelector::Sex(sex), false);
        assert!(err.is_err());
        assert_eq!(
            db.get_rset_by_type(Some("Contact")).unwrap().num_records(),
            3
        );
    }
}
