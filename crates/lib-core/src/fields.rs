use smol_str::SmolStr;

use crate::errors::{RecError, RecResult};

/// A field name holds up to three ordered parts. By convention the parts
/// are type, name and role; a one-part name is just a role.
pub const MAX_NAME_PARTS: usize = 3;

/// Ordered 1-3 part identifier, each part matching `[A-Za-z%][A-Za-z0-9_]*`.
///
/// Names come with two equality predicates: [`FieldName::eql`] is strict
/// componentwise equality (also the `PartialEq` impl), while
/// [`FieldName::equal_p`] additionally treats a bare role name as equal to
/// the role part of a fully qualified name. Lookups throughout the crate
/// use role equality, so a field referenced as `Email` matches a qualified
/// `Contact:Home:Email`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldName {
    parts: Vec<SmolStr>,
}

impl FieldName {
    pub fn new() -> Self {
        FieldName::default()
    }

    /// Build a name from literal parts, validating each one.
    pub fn from_parts(parts: &[&str]) -> RecResult<Self> {
        let mut name = FieldName::new();
        for (i, part) in parts.iter().enumerate() {
            name.set(i, part)?;
        }
        Ok(name)
    }

    /// Parse a textual name: parts separated by `:`, with an optional
    /// trailing `:` (people write both `Email` and `Email:`).
    pub fn parse(s: &str) -> RecResult<Self> {
        let trimmed = s.strip_suffix(':').unwrap_or(s);
        if trimmed.is_empty() {
            return Err(RecError::InvalidFieldName(s.to_owned()));
        }

        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() > MAX_NAME_PARTS {
            return Err(RecError::InvalidFieldName(s.to_owned()));
        }

        FieldName::from_parts(&parts).map_err(|_| RecError::InvalidFieldName(s.to_owned()))
    }

    /// Set part `index` (0..=2), growing the logical size to `index + 1`.
    pub fn set(&mut self, index: usize, part: &str) -> RecResult<()> {
        if index >= MAX_NAME_PARTS || !Self::valid_part(part) {
            return Err(RecError::InvalidFieldName(part.to_owned()));
        }

        if index < self.parts.len() {
            self.parts[index] = SmolStr::new(part);
            self.parts.truncate(index + 1);
        } else {
            while self.parts.len() < index {
                self.parts.push(SmolStr::default());
            }
            self.parts.push(SmolStr::new(part));
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.parts.get(index).map(SmolStr::as_str)
    }

    pub fn size(&self) -> usize {
        self.parts.len()
    }

    /// The role part: the last component of the name.
    pub fn role(&self) -> &str {
        self.parts.last().map(SmolStr::as_str).unwrap_or("")
    }

    /// Strict equality: same number of parts, componentwise equal.
    pub fn eql(&self, other: &FieldName) -> bool {
        self == other
    }

    /// Role equality: a 1-part name compares against the role part of a
    /// 3-part name; every other combination degenerates to [`FieldName::eql`].
    pub fn equal_p(&self, other: &FieldName) -> bool {
        match (self.size(), other.size()) {
            (1, 3) | (3, 1) => self.role() == other.role(),
            _ => self.eql(other),
        }
    }

    pub fn valid_part(part: &str) -> bool {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '%' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    pub(crate) fn parts(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(SmolStr::as_str)
    }
}

/// A (name, value) pair. The value may be empty and may contain embedded
/// newlines; the codec takes care of framing. The source line, when
/// known, feeds diagnostics only and takes no part in equality.
#[derive(Debug, Clone)]
pub struct Field {
    name: FieldName,
    value: String,
    source_line: Option<usize>,
}

impl Field {
    pub fn new(name: FieldName, value: impl Into<String>) -> Self {
        Field {
            name,
            value: value.into(),
            source_line: None,
        }
    }

    pub fn name(&self) -> &FieldName {
        &self.name
    }

    pub fn set_name(&mut self, name: FieldName) {
        self.name = name;
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn source_line(&self) -> Option<usize> {
        self.source_line
    }

    pub fn set_source_line(&mut self, line: usize) {
        self.source_line = Some(line);
    }

    /// Render this field in normal rec syntax and wrap the result as a
    /// comment, one `#` per line.
    pub fn to_comment(&self) -> Comment {
        let rendered = crate::writer::field_to_string(self, crate::writer::WriteMode::Normal);
        Comment::new(rendered.strip_suffix('\n').unwrap_or(&rendered))
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name.equal_p(&other.name) && self.value == other.value
    }
}

/// Free-form commentary: the text after `#` up to the end of the line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Comment {
    text: String,
}

impl Comment {
    pub fn new(text: impl Into<String>) -> Self {
        Comment { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_field_name_parse() {
        let name = FieldName::parse("Contact:Home:Email").unwrap();
        assert_eq!(name.size(), 3);
        assert_eq!(name.get(0), Some("Contact"));
        assert_eq!(name.get(2), Some("Email"));

        let trailing = FieldName::parse("%rec:").unwrap();
        assert_eq!(trailing.size(), 1);
        assert_eq!(trailing.get(0), Some("%rec"));

        assert!(FieldName::parse("").is_err());
        assert!(FieldName::parse("a:b:c:d").is_err());
        assert!(FieldName::parse("1bad").is_err());
        assert!(FieldName::parse("no space").is_err());
    }

    #[test]
    fn test_role_equality() {
        let short = FieldName::parse("Email").unwrap();
        let long = FieldName::parse("Contact:Home:Email").unwrap();
        let other = FieldName::parse("Contact:Home:Phone").unwrap();

        assert!(short.equal_p(&long));
        assert!(long.equal_p(&short));
        assert!(!short.equal_p(&other));
        assert!(!short.eql(&long));

        // Two-part names never role-match a shorter one.
        let two = FieldName::parse("Home:Email").unwrap();
        assert!(!short.equal_p(&two));
    }

    #[test]
    fn test_set_grows_and_truncates() {
        let mut name = FieldName::new();
        name.set(0, "A").unwrap();
        name.set(1, "B").unwrap();
        name.set(2, "C").unwrap();
        assert_eq!(name.size(), 3);

        // Re-setting an earlier part drops the later ones.
        name.set(0, "Z").unwrap();
        assert_eq!(name.size(), 1);
        assert_eq!(name.get(0), Some("Z"));

        assert!(name.set(3, "X").is_err());
    }

    #[test]
    fn test_field_equality_is_name_and_value() {
        let a = Field::new(FieldName::parse("Email").unwrap(), "a@example.com");
        let mut b = Field::new(
            FieldName::parse("Contact:Home:Email").unwrap(),
            "a@example.com",
        );
        b.set_source_line(42);
        assert_eq!(a, b);

        let c = Field::new(FieldName::parse("Email").unwrap(), "other");
        assert_ne!(a, c);
    }

    #[test]
    fn test_comment_set_text_mutates() {
        let mut comment = Comment::new("old");
        comment.set_text("new");
        assert_eq!(comment.text(), "new");
    }
}
