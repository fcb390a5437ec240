use crate::errors::{RecError, RecResult};
use crate::fields::FieldName;

/// How a field expression is written down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FexDialect {
    /// Names separated by whitespace; no subscripts.
    Simple,
    /// Names separated by commas; no subscripts.
    Csv,
    /// Names separated by commas; each may carry `[i]` or `[i-j]`.
    Subscripted,
}

/// One element of a field expression. `min == max == -1` means "all
/// occurrences"; `min >= 0, max == -1` selects a single occurrence; both
/// set selects the inclusive 0-based range.
#[derive(Debug, Clone, PartialEq)]
pub struct FexElem {
    source: String,
    name: FieldName,
    min: i64,
    max: i64,
}

impl FexElem {
    pub fn name(&self) -> &FieldName {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    /// Whether the 0-based occurrence `n` falls under this element.
    pub fn selects(&self, n: usize) -> bool {
        let n = n as i64;
        match (self.min, self.max) {
            (-1, _) => true,
            (min, -1) => n == min,
            (min, max) => n >= min && n <= max,
        }
    }
}

/// A parsed field expression: an ordered list of field references with
/// optional subscript ranges. The number of elements is unbounded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fex {
    elems: Vec<FexElem>,
}

impl Fex {
    /// Parse `s` under the given dialect. At least one element is
    /// required.
    pub fn parse(s: &str, dialect: FexDialect) -> RecResult<Self> {
        let mut fex = Fex::default();

        match dialect {
            FexDialect::Simple => {
                for part in s.split_whitespace() {
                    fex.push_simple(s, part)?;
                }
            }
            FexDialect::Csv => {
                for part in s.split(',') {
                    if !part.is_empty() {
                        fex.push_simple(s, part)?;
                    }
                }
            }
            FexDialect::Subscripted => {
                for part in s.split(',') {
                    if !part.is_empty() {
                        fex.push_subscripted(s, part)?;
                    }
                }
            }
        }

        if fex.elems.is_empty() {
            return Err(RecError::InvalidFex(s.to_owned()));
        }
        Ok(fex)
    }

    /// Whether `s` parses under the dialect.
    pub fn check(s: &str, dialect: FexDialect) -> bool {
        Fex::parse(s, dialect).is_ok()
    }

    pub fn size(&self) -> usize {
        self.elems.len()
    }

    pub fn get(&self, index: usize) -> Option<&FexElem> {
        self.elems.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FexElem> {
        self.elems.iter()
    }

    pub fn append(&mut self, name: FieldName, min: i64, max: i64) {
        let source = render_name(&name);
        self.elems.push(FexElem {
            source,
            name,
            min,
            max,
        });
    }

    /// Whether an element with a role-matching name and the given
    /// subscripts is present. `-1` on either subscript acts as a
    /// wildcard.
    pub fn member_p(&self, name: &FieldName, min: i64, max: i64) -> bool {
        self.elems.iter().any(|e| {
            e.name.equal_p(name)
                && (min == -1 || e.min == min)
                && (max == -1 || e.max == max)
        })
    }

    /// Stable sort by `(min, max)`, with -1 ("all occurrences") ordering
    /// before any concrete subscript.
    pub fn sort(&mut self) {
        self.elems.sort_by_key(|e| (e.min, e.max));
    }

    /// Render back to text in the given dialect. Subscripts only survive
    /// the subscripted dialect.
    pub fn to_string(&self, dialect: FexDialect) -> String {
        let separator = match dialect {
            FexDialect::Simple => ' ',
            FexDialect::Csv | FexDialect::Subscripted => ',',
        };

        let mut out = String::new();
        for (i, elem) in self.elems.iter().enumerate() {
            if i != 0 {
                out.push(separator);
            }
            out.push_str(&render_name(&elem.name));
            if dialect == FexDialect::Subscripted && (elem.min != -1 || elem.max != -1) {
                out.push('[');
                if elem.min != -1 {
                    out.push_str(&elem.min.to_string());
                }
                if elem.max != -1 {
                    out.push('-');
                    out.push_str(&elem.max.to_string());
                }
                out.push(']');
            }
        }
        out
    }

    fn push_simple(&mut self, whole: &str, part: &str) -> RecResult<()> {
        let name =
            FieldName::parse(part).map_err(|_| RecError::InvalidFex(whole.to_owned()))?;
        self.elems.push(FexElem {
            source: part.to_owned(),
            name,
            min: -1,
            max: -1,
        });
        Ok(())
    }

    fn push_subscripted(&mut self, whole: &str, part: &str) -> RecResult<()> {
        let invalid = || RecError::InvalidFex(whole.to_owned());

        let (name_str, min, max) = match part.find('[') {
            None => (part, -1, -1),
            Some(open) => {
                let inner = part[open + 1..]
                    .strip_suffix(']')
                    .ok_or_else(invalid)?;
                // Subscripts are plain non-negative decimal integers.
                let (min, max) = match inner.split_once('-') {
                    None => (parse_subscript(inner).ok_or_else(invalid)?, -1),
                    Some((lo, hi)) => (
                        parse_subscript(lo).ok_or_else(invalid)?,
                        parse_subscript(hi).ok_or_else(invalid)?,
                    ),
                };
                (&part[..open], min, max)
            }
        };

        let name =
            FieldName::parse(name_str).map_err(|_| RecError::InvalidFex(whole.to_owned()))?;
        self.elems.push(FexElem {
            source: part.to_owned(),
            name,
            min,
            max,
        });
        Ok(())
    }
}

fn parse_subscript(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<i64>().ok()
}

fn render_name(name: &FieldName) -> String {
    // People do not write the trailing ':' in fexes.
    let rendered = crate::writer::field_name_to_string(name, crate::writer::WriteMode::Normal);
    rendered.strip_suffix(':').unwrap_or(&rendered).to_owned()
}
