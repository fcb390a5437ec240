use std::hash::BuildHasherDefault;

pub type IndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<ahash::AHasher>>;
pub type IndexSet<V> = indexmap::IndexSet<V, BuildHasherDefault<ahash::AHasher>>;

pub trait Config: Sized {
    fn config(mut self, f: impl FnOnce(&mut Self)) -> Self {
        f(&mut self);
        self
    }
}

impl<T> Config for T {}

/// Parse the longest integer prefix of `s`, `strtol`-style: optional
/// leading whitespace, optional sign, then digits. Anything that does not
/// start with a number yields 0.
pub fn parse_int_prefix(s: &str) -> i64 {
    let s = s.trim_start();
    let mut chars = s.char_indices().peekable();
    let mut end = 0;
    let mut seen_digit = false;

    if let Some(&(_, c)) = chars.peek()
        && (c == '+' || c == '-')
    {
        chars.next();
        end = c.len_utf8();
    }

    for (i, c) in chars {
        if c.is_ascii_digit() {
            seen_digit = true;
            end = i + 1;
        } else {
            break;
        }
    }

    if !seen_digit {
        return 0;
    }

    s[..end].parse::<i64>().unwrap_or(0)
}

/// Parse a complete string as a signed decimal integer. Unlike
/// [`parse_int_prefix`] trailing garbage is rejected.
pub fn atoi(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<i64>().ok()
}

/// Parse a complete string as a floating point number. Infinities and NaN
/// are rejected: field values never legitimately hold them.
pub fn atod(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}
