use std::sync::{Arc, LazyLock};

use fancy_regex::Regex;

use crate::fields::{Comment, Field, FieldName};
use crate::fex::{Fex, FexDialect};
use crate::mset::{ElemKind, Element, MSet};
use crate::record::Record;
use crate::types::{self, Type, TypeRegistry};

/// An element of a record set: a data record or a comment.
#[derive(Debug, Clone, PartialEq)]
pub enum RsetElem {
    Record(Record),
    Comment(Comment),
}

impl RsetElem {
    pub const RECORD: ElemKind = 1;
    pub const COMMENT: ElemKind = 2;

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            RsetElem::Record(r) => Some(r),
            RsetElem::Comment(_) => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            RsetElem::Record(r) => Some(r),
            RsetElem::Comment(_) => None,
        }
    }

    pub fn as_comment(&self) -> Option<&Comment> {
        match self {
            RsetElem::Record(_) => None,
            RsetElem::Comment(c) => Some(c),
        }
    }
}

impl Element for RsetElem {
    const KINDS: usize = 3;

    fn kind(&self) -> ElemKind {
        match self {
            RsetElem::Record(_) => RsetElem::RECORD,
            RsetElem::Comment(_) => RsetElem::COMMENT,
        }
    }
}

/// Names of the reserved fields a record descriptor may carry.
pub mod descriptor {
    pub const REC: &str = "%rec";
    pub const KEY: &str = "%key";
    pub const TYPE: &str = "%type";
    pub const MANDATORY: &str = "%mandatory";
    pub const UNIQUE: &str = "%unique";
    pub const PROHIBIT: &str = "%prohibit";
    pub const AUTO: &str = "%auto";
    pub const SIZE: &str = "%size";
    pub const CONFIDENTIAL: &str = "%confidential";
}

static SIZE_BOUND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(<=|>=|<|>|=)?\s*([0-9]+)$").unwrap());

/// The record count bound taken from a `%size:` descriptor field.
/// `min == max` means an exact count; max is unbounded by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBound {
    pub min: usize,
    pub max: usize,
}

impl Default for SizeBound {
    fn default() -> Self {
        SizeBound {
            min: 0,
            max: usize::MAX,
        }
    }
}

impl SizeBound {
    /// Parse `[<|<=|>|>=]? N`. Returns `None` on anything else.
    pub fn parse(s: &str) -> Option<SizeBound> {
        let captures = SIZE_BOUND_RE.captures(s.trim()).ok()??;
        let n: usize = captures.get(2)?.as_str().parse().ok()?;

        let bound = match captures.get(1).map(|m| m.as_str()) {
            None | Some("=") => SizeBound { min: n, max: n },
            Some("<") => SizeBound {
                min: 0,
                max: n.saturating_sub(1),
            },
            Some("<=") => SizeBound { min: 0, max: n },
            Some(">") => SizeBound {
                min: n.saturating_add(1),
                max: usize::MAX,
            },
            Some(">=") => SizeBound {
                min: n,
                max: usize::MAX,
            },
            Some(_) => return None,
        };
        Some(bound)
    }
}

/// An optional record descriptor followed by data records intermixed with
/// comments.
///
/// The descriptor is authoritative: every piece of derived state (the type
/// registry, the constraint fexes, the size bound) is rebuilt from it
/// whenever it changes, so the caches can never go stale.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    descriptor: Option<Record>,
    elems: MSet<RsetElem>,

    // Derived from the descriptor.
    types: TypeRegistry,
    size: SizeBound,
    key: Option<Fex>,
    mandatory: Option<Fex>,
    unique: Option<Fex>,
    prohibit: Option<Fex>,
    auto: Option<Fex>,
    confidential: Option<Fex>,
}

impl RecordSet {
    pub fn new() -> Self {
        RecordSet::default()
    }

    pub fn elems(&self) -> &MSet<RsetElem> {
        &self.elems
    }

    pub fn elems_mut(&mut self) -> &mut MSet<RsetElem> {
        &mut self.elems
    }

    pub fn num_records(&self) -> usize {
        self.elems.count(RsetElem::RECORD)
    }

    pub fn num_comments(&self) -> usize {
        self.elems.count(RsetElem::COMMENT)
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.elems.iter().filter_map(RsetElem::as_record)
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut Record> {
        self.elems.iter_mut().filter_map(RsetElem::as_record_mut)
    }

    pub fn get_record(&self, index: usize) -> Option<&Record> {
        self.elems
            .get(RsetElem::RECORD, index)
            .and_then(RsetElem::as_record)
    }

    pub fn append_record(&mut self, record: Record) {
        self.elems.append(RsetElem::Record(record));
    }

    pub fn append_comment(&mut self, comment: Comment) {
        self.elems.append(RsetElem::Comment(comment));
    }

    /// Insert a record at the given position among the records. Positions
    /// past the end append.
    pub fn insert_record_at(&mut self, record: Record, position: usize) {
        match self.elems.abs_index(RsetElem::RECORD, position) {
            Some(abs) => self
                .elems
                .insert_at(RsetElem::Record(record), abs as isize),
            None => self.elems.append(RsetElem::Record(record)),
        }
    }

    pub fn remove_record_at(&mut self, position: usize) -> Option<Record> {
        match self.elems.remove_kind_at(RsetElem::RECORD, position) {
            Some(RsetElem::Record(r)) => Some(r),
            _ => None,
        }
    }

    pub fn descriptor(&self) -> Option<&Record> {
        self.descriptor.as_ref()
    }

    /// Replace the descriptor and rebuild every derived cache before
    /// returning.
    pub fn set_descriptor(&mut self, descriptor: Option<Record>) {
        self.descriptor = descriptor;
        self.rebuild_caches();
    }

    /// The `%rec:` type name: the leading token of the field value, which
    /// may be followed by a URL or file reference.
    pub fn rec_type(&self) -> Option<&str> {
        let value = self.rec_field_value()?;
        let token = value.split_whitespace().next()?;
        Some(token)
    }

    /// The URL or file qualifier following the type token of `%rec:`,
    /// when present.
    pub fn descriptor_source(&self) -> Option<&str> {
        let value = self.rec_field_value()?;
        let mut words = value.split_whitespace();
        words.next()?;
        words.next()
    }

    /// Set the `%rec:` type, creating a descriptor when there is none.
    pub fn set_rec_type(&mut self, rec_type: &str) {
        let name = FieldName::parse(descriptor::REC).expect("reserved name parses");
        let mut descriptor = self.descriptor.take().unwrap_or_default();

        match descriptor.get_field_by_name_mut(&name, 0) {
            Some(field) => field.set_value(rec_type),
            None => descriptor.append_field(Field::new(name, rec_type)),
        }

        self.set_descriptor(Some(descriptor));
    }

    pub fn field_type(&self, name: &FieldName) -> Option<&Arc<Type>> {
        self.types.lookup(name)
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn min_records(&self) -> usize {
        self.size.min
    }

    pub fn max_records(&self) -> usize {
        self.size.max
    }

    pub fn key_fex(&self) -> Option<&Fex> {
        self.key.as_ref()
    }

    pub fn mandatory_fex(&self) -> Option<&Fex> {
        self.mandatory.as_ref()
    }

    pub fn unique_fex(&self) -> Option<&Fex> {
        self.unique.as_ref()
    }

    pub fn prohibit_fex(&self) -> Option<&Fex> {
        self.prohibit.as_ref()
    }

    pub fn auto_fex(&self) -> Option<&Fex> {
        self.auto.as_ref()
    }

    pub fn confidential_fex(&self) -> Option<&Fex> {
        self.confidential.as_ref()
    }

    fn rec_field_value(&self) -> Option<&str> {
        static REC_NAME: LazyLock<FieldName> =
            LazyLock::new(|| FieldName::parse(descriptor::REC).expect("reserved name parses"));
        let descriptor = self.descriptor.as_ref()?;
        let field = descriptor.get_field_by_name(&REC_NAME, 0)?;
        Some(field.value())
    }

    /// Re-derive the type registry, the constraint fexes and the size
    /// bound from the descriptor. Unparseable descriptor fields are
    /// skipped here; the integrity checker is the place that reports
    /// them.
    fn rebuild_caches(&mut self) {
        self.types = TypeRegistry::new();
        self.size = SizeBound::default();
        self.key = None;
        self.mandatory = None;
        self.unique = None;
        self.prohibit = None;
        self.auto = None;
        self.confidential = None;

        let Some(descriptor) = &self.descriptor else {
            return;
        };

        for field in descriptor.fields() {
            let Some(name) = field.name().get(0) else {
                continue;
            };
            match name {
                descriptor::TYPE => match types::parse_type_descriptor(field.value()) {
                    Ok((fex, ty)) => {
                        let ty = Arc::new(ty);
                        for elem in fex.iter() {
                            self.types.register(elem.name().clone(), Arc::clone(&ty));
                        }
                    }
                    Err(err) => log::debug!("skipping unparseable %type entry: {err}"),
                },
                descriptor::SIZE => match SizeBound::parse(field.value()) {
                    Some(bound) => self.size = bound,
                    None => log::debug!("skipping unparseable %size entry: {}", field.value()),
                },
                descriptor::KEY
                | descriptor::MANDATORY
                | descriptor::UNIQUE
                | descriptor::PROHIBIT
                | descriptor::AUTO
                | descriptor::CONFIDENTIAL => {
                    match Fex::parse(field.value(), FexDialect::Simple) {
                        Ok(fex) => {
                            let slot = match name {
                                descriptor::KEY => &mut self.key,
                                descriptor::MANDATORY => &mut self.mandatory,
                                descriptor::UNIQUE => &mut self.unique,
                                descriptor::PROHIBIT => &mut self.prohibit,
                                descriptor::AUTO => &mut self.auto,
                                _ => &mut self.confidential,
                            };
                            *slot = Some(fex);
                        }
                        Err(err) => {
                            log::debug!("skipping unparseable {name} entry: {err}");
                        }
                    }
                }
                _ => {}
            }
        }
    }
}
