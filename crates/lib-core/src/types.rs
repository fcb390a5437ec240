use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use fancy_regex::Regex;
use itertools::Itertools;
use recfile_helpers::atoi;
use strum_macros::{AsRefStr, EnumString};

use crate::errors::{RecError, RecResult};
use crate::fex::{Fex, FexDialect};
use crate::fields::FieldName;

/// The keyword introducing a type expression in a `%type:` descriptor
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum TypeKeyword {
    Int,
    Bool,
    Range,
    Real,
    Size,
    Line,
    Regexp,
    Date,
    Enum,
    Field,
    Email,
}

/// A parsed type with its parameters.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Int,
    Bool,
    Range { min: i64, max: i64 },
    Real,
    Size { max: usize },
    Line,
    Regexp { pattern: String, re: Arc<Regex> },
    Date,
    Enum { names: Vec<String> },
    Field,
    Email,
}

impl PartialEq for TypeKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeKind::Int, TypeKind::Int)
            | (TypeKind::Bool, TypeKind::Bool)
            | (TypeKind::Real, TypeKind::Real)
            | (TypeKind::Line, TypeKind::Line)
            | (TypeKind::Date, TypeKind::Date)
            | (TypeKind::Field, TypeKind::Field)
            | (TypeKind::Email, TypeKind::Email) => true,
            (
                TypeKind::Range { min: a, max: b },
                TypeKind::Range { min: c, max: d },
            ) => a == c && b == d,
            (TypeKind::Size { max: a }, TypeKind::Size { max: b }) => a == b,
            (TypeKind::Regexp { pattern: a, .. }, TypeKind::Regexp { pattern: b, .. }) => a == b,
            (TypeKind::Enum { names: a }, TypeKind::Enum { names: b }) => a == b,
            _ => false,
        }
    }
}

/// A field type: the parsed parameters plus the source text of the type
/// expression it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    kind: TypeKind,
    source: String,
}

static ENUM_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap());
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %B %Y", "%B %d, %Y", "%d/%m/%Y"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

impl Type {
    /// Parse a type expression such as `int`, `range 0 100`, `size 20`,
    /// `regexp /foo+/`, `enum red green blue` or `field`.
    pub fn parse(expr: &str) -> RecResult<Self> {
        let source = expr.trim();
        let invalid = || RecError::InvalidType(expr.to_owned());

        let keyword_end = source
            .find(|c: char| c.is_whitespace())
            .unwrap_or(source.len());
        let keyword =
            TypeKeyword::from_str(&source[..keyword_end]).map_err(|_| invalid())?;
        let rest = source[keyword_end..].trim_start();

        let kind = match keyword {
            TypeKeyword::Int => expect_no_args(rest, TypeKind::Int).ok_or_else(invalid)?,
            TypeKeyword::Bool => expect_no_args(rest, TypeKind::Bool).ok_or_else(invalid)?,
            TypeKeyword::Real => expect_no_args(rest, TypeKind::Real).ok_or_else(invalid)?,
            TypeKeyword::Line => expect_no_args(rest, TypeKind::Line).ok_or_else(invalid)?,
            TypeKeyword::Date => expect_no_args(rest, TypeKind::Date).ok_or_else(invalid)?,
            TypeKeyword::Email => expect_no_args(rest, TypeKind::Email).ok_or_else(invalid)?,
            TypeKeyword::Range => parse_range(rest).ok_or_else(invalid)?,
            TypeKeyword::Size => {
                let max = atoi(rest).filter(|n| *n >= 0).ok_or_else(invalid)?;
                TypeKind::Size { max: max as usize }
            }
            TypeKeyword::Regexp => parse_regexp(rest).ok_or_else(invalid)?,
            TypeKeyword::Enum => {
                let names: Vec<String> = rest.split_whitespace().map(str::to_owned).collect();
                if names.is_empty() {
                    return Err(invalid());
                }
                for name in &names {
                    if !ENUM_NAME_RE.is_match(name).unwrap_or(false) {
                        return Err(invalid());
                    }
                }
                TypeKind::Enum { names }
            }
            TypeKeyword::Field => {
                // A trailing field-name argument is tolerated and ignored.
                if !rest.is_empty() && FieldName::parse(rest).is_err() {
                    return Err(invalid());
                }
                TypeKind::Field
            }
        };

        Ok(Type {
            kind,
            source: source.to_owned(),
        })
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn keyword(&self) -> TypeKeyword {
        match self.kind {
            TypeKind::Int => TypeKeyword::Int,
            TypeKind::Bool => TypeKeyword::Bool,
            TypeKind::Range { .. } => TypeKeyword::Range,
            TypeKind::Real => TypeKeyword::Real,
            TypeKind::Size { .. } => TypeKeyword::Size,
            TypeKind::Line => TypeKeyword::Line,
            TypeKind::Regexp { .. } => TypeKeyword::Regexp,
            TypeKind::Date => TypeKeyword::Date,
            TypeKind::Enum { .. } => TypeKeyword::Enum,
            TypeKind::Field => TypeKeyword::Field,
            TypeKind::Email => TypeKeyword::Email,
        }
    }

    /// Check a field value against this type. The check is total: the
    /// value either passes or a non-empty reason comes back.
    pub fn check(&self, value: &str) -> Result<(), String> {
        match &self.kind {
            TypeKind::Int => atoi(value)
                .map(|_| ())
                .ok_or_else(|| "expected an integer".to_owned()),
            TypeKind::Bool => {
                match value.trim() {
                    "yes" | "no" | "true" | "false" | "0" | "1" => Ok(()),
                    _ => Err("expected a boolean (yes/no/true/false/0/1)".to_owned()),
                }
            }
            TypeKind::Range { min, max } => match atoi(value) {
                Some(n) if n >= *min && n <= *max => Ok(()),
                _ => Err(format!("expected an integer between {min} and {max}")),
            },
            TypeKind::Real => recfile_helpers::atod(value)
                .map(|_| ())
                .ok_or_else(|| "expected a real number".to_owned()),
            TypeKind::Size { max } => {
                if value.len() <= *max {
                    Ok(())
                } else {
                    Err(format!("value exceeds the maximum size of {max} bytes"))
                }
            }
            TypeKind::Line => {
                if value.contains('\n') {
                    Err("expected a single line".to_owned())
                } else {
                    Ok(())
                }
            }
            TypeKind::Regexp { pattern, re } => match re.is_match(value) {
                Ok(true) => Ok(()),
                _ => Err(format!("value does not match the regexp /{pattern}/")),
            },
            TypeKind::Date => {
                if check_date(value.trim()) {
                    Ok(())
                } else {
                    Err("expected a date".to_owned())
                }
            }
            TypeKind::Enum { names } => {
                let value = value.trim();
                if names.iter().any(|n| n == value) {
                    Ok(())
                } else {
                    Err(format!(
                        "expected one of {}",
                        names.iter().join(", ")
                    ))
                }
            }
            TypeKind::Field => FieldName::parse(value)
                .map(|_| ())
                .map_err(|_| "expected a field name".to_owned()),
            TypeKind::Email => match EMAIL_RE.is_match(value.trim()) {
                Ok(true) => Ok(()),
                _ => Err("expected an email address".to_owned()),
            },
        }
    }
}

fn expect_no_args(rest: &str, kind: TypeKind) -> Option<TypeKind> {
    rest.is_empty().then_some(kind)
}

fn parse_range(rest: &str) -> Option<TypeKind> {
    // Both `range MIN..MAX` and `range MIN MAX` are accepted.
    let (min_str, max_str) = match rest.split_once("..") {
        Some((lo, hi)) => (lo.trim(), hi.trim()),
        None => rest.split_whitespace().collect_tuple()?,
    };

    let min = atoi(min_str)?;
    let max = atoi(max_str)?;
    (min <= max).then_some(TypeKind::Range { min, max })
}

fn parse_regexp(rest: &str) -> Option<TypeKind> {
    // The delimiter is the first byte after the keyword and may be any
    // non-alphanumeric character; it must close the expression.
    let mut chars = rest.chars();
    let delim = chars.next()?;
    if delim.is_ascii_alphanumeric() {
        return None;
    }

    let body = chars.as_str();
    let end = body.rfind(delim)?;
    if !body[end + delim.len_utf8()..].trim().is_empty() {
        return None;
    }

    let pattern = body[..end].to_owned();
    let re = Regex::new(&pattern).ok()?;
    Some(TypeKind::Regexp {
        pattern,
        re: Arc::new(re),
    })
}

fn check_date(value: &str) -> bool {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

    if value.is_empty() {
        return false;
    }

    DateTime::parse_from_rfc3339(value).is_ok()
        || DateTime::parse_from_rfc2822(value).is_ok()
        || DATE_TIME_FORMATS
            .iter()
            .any(|f| NaiveDateTime::parse_from_str(value, f).is_ok())
        || DATE_FORMATS
            .iter()
            .any(|f| NaiveDate::parse_from_str(value, f).is_ok())
        || TIME_FORMATS
            .iter()
            .any(|f| NaiveTime::parse_from_str(value, f).is_ok())
}

/// Per record-set association between field names and types. Lookups are
/// role-equivalent, so a qualified and an unqualified spelling of a name
/// share the same slot; re-registering replaces.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    entries: Vec<(FieldName, Arc<Type>)>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    pub fn register(&mut self, name: FieldName, ty: Arc<Type>) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n.equal_p(&name)) {
            *entry = (name, ty);
        } else {
            self.entries.push((name, ty));
        }
    }

    pub fn lookup(&self, name: &FieldName) -> Option<&Arc<Type>> {
        self.entries
            .iter()
            .find(|(n, _)| n.equal_p(name))
            .map(|(_, t)| t)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &Arc<Type>)> {
        self.entries.iter().map(|(n, t)| (n, t))
    }
}

/// Parse the value of a `%type:` descriptor field: a CSV field expression
/// naming the affected fields, whitespace, then the type expression.
pub fn parse_type_descriptor(value: &str) -> RecResult<(Fex, Type)> {
    let value = value.trim_start();
    let split = value
        .find(|c: char| c.is_whitespace())
        .ok_or_else(|| RecError::InvalidType(value.to_owned()))?;

    let fex = Fex::parse(&value[..split], FexDialect::Csv)?;
    let ty = Type::parse(&value[split..])?;
    Ok((fex, ty))
}
