use fancy_regex::RegexBuilder;
use recfile_helpers::parse_int_prefix;
use strum_macros::Display;
use thiserror::Error;

use crate::fields::FieldName;
use crate::record::Record;

/// Binary operators, in source spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinOp {
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "=")]
    Eql,
    #[strum(serialize = "!=")]
    Neq,
    #[strum(serialize = "~")]
    Match,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
}

/// A selection expression tree. There is no dangling sentinel node: an
/// expression either parses into a complete tree or not at all.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Int(i64),
    Str(String),
    /// The value of the first field with this name; `""` when absent.
    Name(FieldName),
    /// `#name`: how many fields with this name the record has.
    Count(FieldName),
    Not(Box<Ast>),
    Binary(BinOp, Box<Ast>, Box<Ast>),
}

/// Failures during evaluation. Callers decide whether a failing
/// expression means "record does not match" or a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid regular expression in match")]
    Regex,
    #[error("~ expects string operands")]
    MatchOperands,
}

/// An intermediate value: the two runtime types of the sublanguage.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    /// Numeric coercion: integers pass through, strings convert by their
    /// longest integer prefix and the empty string is 0.
    pub fn to_int(&self) -> i64 {
        match self {
            Value::Int(n) => *n,
            Value::Str(s) => parse_int_prefix(s),
        }
    }

    /// Top level truthiness: a non-zero integer or a non-empty string.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

pub(crate) fn eval(
    node: &Ast,
    record: &Record,
    case_insensitive: bool,
) -> Result<Value, EvalError> {
    match node {
        Ast::Int(n) => Ok(Value::Int(*n)),
        Ast::Str(s) => Ok(Value::Str(s.clone())),
        Ast::Name(name) => {
            let value = record
                .get_field_by_name(name, 0)
                .map(|f| f.value().to_owned())
                .unwrap_or_default();
            Ok(Value::Str(value))
        }
        Ast::Count(name) => Ok(Value::Int(record.num_fields_by_name(name) as i64)),
        Ast::Not(child) => {
            // Like the other logical operators, `!` coerces numerically.
            let value = eval(child, record, case_insensitive)?;
            Ok(Value::Int((value.to_int() == 0) as i64))
        }
        Ast::Binary(op, left, right) => {
            let lhs = eval(left, record, case_insensitive)?;
            let rhs = eval(right, record, case_insensitive)?;
            eval_binary(*op, lhs, rhs, case_insensitive)
        }
    }
}

fn eval_binary(
    op: BinOp,
    lhs: Value,
    rhs: Value,
    case_insensitive: bool,
) -> Result<Value, EvalError> {
    let int = |b: bool| Value::Int(b as i64);

    match op {
        BinOp::Or => Ok(int(lhs.to_int() != 0 || rhs.to_int() != 0)),
        BinOp::And => Ok(int(lhs.to_int() != 0 && rhs.to_int() != 0)),
        BinOp::Eql | BinOp::Neq => {
            // String comparison when both sides are strings; numeric
            // otherwise.
            let equal = match (&lhs, &rhs) {
                (Value::Str(a), Value::Str(b)) => a == b,
                _ => lhs.to_int() == rhs.to_int(),
            };
            Ok(int(if op == BinOp::Eql { equal } else { !equal }))
        }
        BinOp::Match => {
            let (Value::Str(subject), Value::Str(pattern)) = (&lhs, &rhs) else {
                return Err(EvalError::MatchOperands);
            };
            let re = RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|_| EvalError::Regex)?;
            Ok(int(re.is_match(subject).map_err(|_| EvalError::Regex)?))
        }
        BinOp::Lt => Ok(int(lhs.to_int() < rhs.to_int())),
        BinOp::Gt => Ok(int(lhs.to_int() > rhs.to_int())),
        BinOp::Le => Ok(int(lhs.to_int() <= rhs.to_int())),
        BinOp::Ge => Ok(int(lhs.to_int() >= rhs.to_int())),
        BinOp::Add => Ok(Value::Int(lhs.to_int().wrapping_add(rhs.to_int()))),
        BinOp::Sub => Ok(Value::Int(lhs.to_int().wrapping_sub(rhs.to_int()))),
        BinOp::Mul => Ok(Value::Int(lhs.to_int().wrapping_mul(rhs.to_int()))),
        BinOp::Div => {
            let divisor = rhs.to_int();
            if divisor == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Int(lhs.to_int().wrapping_div(divisor)))
        }
        BinOp::Mod => {
            let divisor = rhs.to_int();
            if divisor == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Int(lhs.to_int().wrapping_rem(divisor)))
        }
    }
}
