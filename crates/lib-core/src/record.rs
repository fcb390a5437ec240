use crate::fields::{Comment, Field, FieldName};
use crate::mset::{ElemKind, Element, MSet};

/// An element of a record: a field or a comment.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordElem {
    Field(Field),
    Comment(Comment),
}

impl RecordElem {
    pub const FIELD: ElemKind = 1;
    pub const COMMENT: ElemKind = 2;

    pub fn as_field(&self) -> Option<&Field> {
        match self {
            RecordElem::Field(f) => Some(f),
            RecordElem::Comment(_) => None,
        }
    }

    pub fn as_field_mut(&mut self) -> Option<&mut Field> {
        match self {
            RecordElem::Field(f) => Some(f),
            RecordElem::Comment(_) => None,
        }
    }

    pub fn as_comment(&self) -> Option<&Comment> {
        match self {
            RecordElem::Field(_) => None,
            RecordElem::Comment(c) => Some(c),
        }
    }
}

impl Element for RecordElem {
    const KINDS: usize = 3;

    fn kind(&self) -> ElemKind {
        match self {
            RecordElem::Field(_) => RecordElem::FIELD,
            RecordElem::Comment(_) => RecordElem::COMMENT,
        }
    }
}

/// An ordered sequence of fields and comments, ending at a blank line in
/// the textual form. Fields may repeat by name; insertion order is
/// significant and preserved by the writer.
#[derive(Debug, Clone, Default)]
pub struct Record {
    elems: MSet<RecordElem>,
    source_line: Option<usize>,
}

/// Selects which occurrences of a name an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByName {
    /// Every field whose name role-matches.
    All,
    /// Only the n-th (0 based) role-matching field.
    Index(usize),
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn elems(&self) -> &MSet<RecordElem> {
        &self.elems
    }

    pub fn elems_mut(&mut self) -> &mut MSet<RecordElem> {
        &mut self.elems
    }

    /// 1-based line where this record started in its source, when parsed.
    pub fn source_line(&self) -> Option<usize> {
        self.source_line
    }

    pub fn set_source_line(&mut self, line: usize) {
        self.source_line = Some(line);
    }

    pub fn num_elems(&self) -> usize {
        self.elems.len()
    }

    pub fn num_fields(&self) -> usize {
        self.elems.count(RecordElem::FIELD)
    }

    pub fn num_comments(&self) -> usize {
        self.elems.count(RecordElem::COMMENT)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.elems.iter().filter_map(RecordElem::as_field)
    }

    pub fn fields_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.elems.iter_mut().filter_map(RecordElem::as_field_mut)
    }

    pub fn comments(&self) -> impl Iterator<Item = &Comment> {
        self.elems.iter().filter_map(RecordElem::as_comment)
    }

    pub fn get_field(&self, index: usize) -> Option<&Field> {
        self.elems
            .get(RecordElem::FIELD, index)
            .and_then(RecordElem::as_field)
    }

    pub fn get_field_mut(&mut self, index: usize) -> Option<&mut Field> {
        self.elems
            .get_mut(RecordElem::FIELD, index)
            .and_then(RecordElem::as_field_mut)
    }

    pub fn append_field(&mut self, field: Field) {
        self.elems.append(RecordElem::Field(field));
    }

    pub fn append_comment(&mut self, comment: Comment) {
        self.elems.append(RecordElem::Comment(comment));
    }

    /// Insert a field at the given position among the fields (not among
    /// all elements). Positions past the end append.
    pub fn insert_field_at(&mut self, field: Field, position: usize) {
        match self.elems.abs_index(RecordElem::FIELD, position) {
            Some(abs) => self.elems.insert_at(RecordElem::Field(field), abs as isize),
            None => self.elems.append(RecordElem::Field(field)),
        }
    }

    /// The n-th field whose name role-matches `name`.
    pub fn get_field_by_name(&self, name: &FieldName, n: usize) -> Option<&Field> {
        self.fields().filter(|f| f.name().equal_p(name)).nth(n)
    }

    pub fn get_field_by_name_mut(&mut self, name: &FieldName, n: usize) -> Option<&mut Field> {
        self.fields_mut().filter(|f| f.name().equal_p(name)).nth(n)
    }

    pub fn num_fields_by_name(&self, name: &FieldName) -> usize {
        self.fields().filter(|f| f.name().equal_p(name)).count()
    }

    pub fn field_p(&self, name: &FieldName) -> bool {
        self.fields().any(|f| f.name().equal_p(name))
    }

    /// Remove role-matching fields. Returns how many were removed.
    pub fn remove_field_by_name(&mut self, name: &FieldName, which: ByName) -> usize {
        let mut seen = 0usize;
        let mut removed = 0usize;
        self.elems.retain(|elem| match elem {
            RecordElem::Field(f) if f.name().equal_p(name) => {
                let matches = match which {
                    ByName::All => true,
                    ByName::Index(n) => seen == n,
                };
                seen += 1;
                if matches {
                    removed += 1;
                    false
                } else {
                    true
                }
            }
            _ => true,
        });
        removed
    }

    /// True when every element of `self` occurs (by name and value) in
    /// `other`.
    pub fn subset_p(&self, other: &Record) -> bool {
        self.elems
            .iter()
            .all(|e| other.elems.iter().any(|o| e == o))
    }

    /// Render this record in normal rec syntax and wrap it as a comment,
    /// stripping the trailing newline.
    pub fn to_comment(&self) -> Comment {
        let rendered = crate::writer::record_to_string(self, crate::writer::WriteMode::Normal);
        Comment::new(rendered.strip_suffix('\n').unwrap_or(&rendered))
    }
}

impl PartialEq for Record {
    /// Records are equal when each is a subset of the other under
    /// name-and-value element equality. Source locations never matter.
    fn eq(&self, other: &Self) -> bool {
        self.subset_p(other) && other.subset_p(self)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn field(name: &str, value: &str) -> Field {
        Field::new(FieldName::parse(name).unwrap(), value)
    }

    fn contact() -> Record {
        let mut record = Record::new();
        record.append_field(field("Name", "Alice"));
        record.append_comment(Comment::new(" home address below"));
        record.append_field(field("Email", "a@example.com"));
        record.append_field(field("Email", "alice@work.example"));
        record
    }

    #[test]
    fn test_counts() {
        let record = contact();
        assert_eq!(record.num_elems(), 4);
        assert_eq!(record.num_fields(), 3);
        assert_eq!(record.num_comments(), 1);
    }

    #[test]
    fn test_lookup_by_name_is_role_equal() {
        let mut record = contact();
        record.append_field(field("Contact:Home:Email", "third@example.com"));

        let email = FieldName::parse("Email").unwrap();
        assert_eq!(record.num_fields_by_name(&email), 3);
        assert_eq!(
            record.get_field_by_name(&email, 2).unwrap().value(),
            "third@example.com"
        );
        assert_eq!(record.get_field_by_name(&email, 3), None);
    }

    #[test]
    fn test_remove_field_by_name() {
        let email = FieldName::parse("Email").unwrap();

        let mut record = contact();
        assert_eq!(record.remove_field_by_name(&email, ByName::Index(0)), 1);
        assert_eq!(
            record.get_field_by_name(&email, 0).unwrap().value(),
            "alice@work.example"
        );

        let mut record = contact();
        assert_eq!(record.remove_field_by_name(&email, ByName::All), 2);
        assert!(!record.field_p(&email));
        // The comment and the other field survive.
        assert_eq!(record.num_elems(), 2);
    }

    #[test]
    fn test_record_equality_ignores_order() {
        let mut a = Record::new();
        a.append_field(field("X", "1"));
        a.append_field(field("Y", "2"));

        let mut b = Record::new();
        b.append_field(field("Y", "2"));
        b.append_field(field("X", "1"));

        assert_eq!(a, b);

        b.append_field(field("Z", "3"));
        assert_ne!(a, b);
        assert!(a.subset_p(&b));
        assert!(!b.subset_p(&a));
    }

    #[test]
    fn test_insert_field_at() {
        let mut record = contact();
        record.insert_field_at(field("First", "yes"), 0);
        assert_eq!(record.get_field(0).unwrap().value(), "yes");
        record.insert_field_at(field("Last", "yes"), 100);
        assert_eq!(record.get_field(4).unwrap().value(), "yes");
    }
}
