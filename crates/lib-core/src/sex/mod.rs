pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{Ast, BinOp, EvalError, Value};

use crate::errors::RecResult;
use crate::record::Record;

/// A compiled selection expression: a boolean predicate over a single
/// record.
///
/// Case sensitivity is fixed at compile time and affects the `~` match
/// operator only. Evaluation failures (division by zero, a broken regexp)
/// surface as [`EvalError`]; whether that means "no match" or a hard
/// error is the caller's policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Sex {
    ast: Ast,
    case_insensitive: bool,
}

impl Sex {
    pub fn compile(expr: &str, case_insensitive: bool) -> RecResult<Self> {
        let tokens = lexer::tokenize(expr)?;
        let ast = parser::Parser::new(expr, tokens).parse()?;
        Ok(Sex {
            ast,
            case_insensitive,
        })
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Evaluate against a record. The result is truthy for a non-zero
    /// integer or a non-empty string.
    pub fn eval(&self, record: &Record) -> Result<bool, EvalError> {
        let value = ast::eval(&self.ast, record, self.case_insensitive)?;
        Ok(value.truthy())
    }

    /// Evaluate to the raw value instead of a boolean.
    pub fn eval_value(&self, record: &Record) -> Result<Value, EvalError> {
        ast::eval(&self.ast, record, self.case_insensitive)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fields::{Field, FieldName};

    fn alice() -> Record {
        let mut record = Record::new();
        record.append_field(Field::new(FieldName::parse("Name").unwrap(), "Alice"));
        record.append_field(Field::new(FieldName::parse("Age").unwrap(), "30"));
        record
    }

    #[test]
    fn test_spec_examples() {
        let record = alice();

        let sex = Sex::compile("Age > 18 && Name ~ \"^A\"", false).unwrap();
        assert_eq!(sex.eval(&record), Ok(true));

        let sex = Sex::compile("Age > 99", false).unwrap();
        assert_eq!(sex.eval(&record), Ok(false));

        let sex = Sex::compile("#Phone", false).unwrap();
        assert_eq!(sex.eval(&record), Ok(false));
        assert_eq!(sex.eval_value(&record), Ok(Value::Int(0)));
    }

    #[test]
    fn test_arithmetic() {
        let record = alice();
        let sex = Sex::compile("Age + 5 = 35", false).unwrap();
        assert_eq!(sex.eval(&record), Ok(true));

        let sex = Sex::compile("Age % 7 = 2", false).unwrap();
        assert_eq!(sex.eval(&record), Ok(true));
    }

    #[test]
    fn test_string_truthiness() {
        let record = alice();
        // A bare name evaluates to the field value; non-empty is true.
        let sex = Sex::compile("Name", false).unwrap();
        assert_eq!(sex.eval(&record), Ok(true));
        let sex = Sex::compile("Missing", false).unwrap();
        assert_eq!(sex.eval(&record), Ok(false));
    }

    #[test]
    fn test_division_by_zero_is_an_eval_error() {
        let record = alice();
        let sex = Sex::compile("Age / 0", false).unwrap();
        assert_eq!(sex.eval(&record), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_case_insensitive_match() {
        let record = alice();
        let sex = Sex::compile("Name ~ \"^alice$\"", true).unwrap();
        assert_eq!(sex.eval(&record), Ok(true));
        let sex = Sex::compile("Name ~ \"^alice$\"", false).unwrap();
        assert_eq!(sex.eval(&record), Ok(false));
    }
}
