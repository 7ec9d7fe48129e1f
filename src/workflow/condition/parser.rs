// SPDX-License-Identifier: MIT

//! Condition expression parser
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr    := and ("or" and)*
//! and     := unary ("and" unary)*
//! unary   := "not" unary | "(" expr ")" | "true" | "false" | compare | path
//! compare := path op literal
//! ```

use super::ast::{CompareOp, Expression, Literal};
use crate::graph::error::GraphError;

/// Parse a condition expression string into an AST
pub fn parse(input: &str) -> Result<Expression, GraphError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(GraphError::Condition("empty condition".to_string()));
    }

    if let Some(pos) = find_keyword(input, "or") {
        let left = parse(&input[..pos])?;
        let right = parse(&input[pos + 2..])?;
        return Ok(Expression::Or(Box::new(left), Box::new(right)));
    }
    if let Some(pos) = find_keyword(input, "and") {
        let left = parse(&input[..pos])?;
        let right = parse(&input[pos + 3..])?;
        return Ok(Expression::And(Box::new(left), Box::new(right)));
    }

    if let Some(rest) = input.strip_prefix("not") {
        if rest.starts_with(|c: char| c.is_whitespace() || c == '(') {
            return Ok(Expression::Not(Box::new(parse(rest)?)));
        }
    }

    if let Some(inner) = strip_outer_parens(input) {
        return parse(inner);
    }

    match input {
        "true" => return Ok(Expression::True),
        "false" => return Ok(Expression::False),
        _ => {}
    }

    parse_comparison(input)
}

/// Tracks quoting and nesting while scanning an expression
struct Scanner {
    quote: Option<char>,
    depth: i32,
}

impl Scanner {
    fn new() -> Self {
        Self {
            quote: None,
            depth: 0,
        }
    }

    /// Feed one char; returns true when it sits at top level outside quotes
    fn feed(&mut self, c: char) -> bool {
        match self.quote {
            Some(q) => {
                if c == q {
                    self.quote = None;
                }
                false
            }
            None => match c {
                '\'' | '"' => {
                    self.quote = Some(c);
                    false
                }
                '(' => {
                    self.depth += 1;
                    false
                }
                ')' => {
                    self.depth -= 1;
                    false
                }
                _ => self.depth == 0,
            },
        }
    }
}

/// Byte offset of the first top-level occurrence of a whitespace-delimited keyword
fn find_keyword(input: &str, keyword: &str) -> Option<usize> {
    let mut scanner = Scanner::new();
    let mut prev_is_space = false;

    for (i, c) in input.char_indices() {
        let top = scanner.feed(c);
        if top && prev_is_space && input[i..].starts_with(keyword) {
            let after = &input[i + keyword.len()..];
            if after.starts_with(|c: char| c.is_whitespace() || c == '(') {
                return Some(i);
            }
        }
        prev_is_space = c.is_whitespace() || (c == ')' && scanner.depth == 0);
    }
    None
}

/// `(inner)` where the first paren closes at the very end
fn strip_outer_parens(input: &str) -> Option<&str> {
    if !input.starts_with('(') || !input.ends_with(')') {
        return None;
    }
    let mut scanner = Scanner::new();
    for (i, c) in input.char_indices() {
        scanner.feed(c);
        if scanner.depth == 0 && scanner.quote.is_none() {
            return (i == input.len() - 1).then(|| &input[1..i]);
        }
    }
    None
}

fn parse_comparison(input: &str) -> Result<Expression, GraphError> {
    // Longest operators first so ">=" is not read as ">"
    let operators = [
        ("!=", CompareOp::NotEq),
        (">=", CompareOp::Gte),
        ("<=", CompareOp::Lte),
        ("==", CompareOp::Eq),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
        (" contains ", CompareOp::Contains),
    ];

    for (symbol, op) in operators {
        if let Some(pos) = find_operator(input, symbol) {
            let path = input[..pos].trim();
            validate_path(path, input)?;
            let right = parse_literal(input[pos + symbol.len()..].trim())?;
            return Ok(Expression::Compare {
                path: path.to_string(),
                op,
                right,
            });
        }
    }

    validate_path(input, input)?;
    Ok(Expression::Truthy(input.to_string()))
}

fn find_operator(input: &str, op: &str) -> Option<usize> {
    let mut scanner = Scanner::new();
    input
        .char_indices()
        .find(|&(i, c)| scanner.feed(c) && input[i..].starts_with(op))
        .map(|(i, _)| i)
}

fn validate_path(path: &str, input: &str) -> Result<(), GraphError> {
    let valid = !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
    if valid {
        Ok(())
    } else {
        Err(GraphError::Condition(format!(
            "could not parse condition: {}",
            input
        )))
    }
}

fn parse_literal(input: &str) -> Result<Literal, GraphError> {
    match input {
        "null" => return Ok(Literal::Null),
        "true" => return Ok(Literal::Boolean(true)),
        "false" => return Ok(Literal::Boolean(false)),
        _ => {}
    }

    let quoted = input.len() >= 2
        && ((input.starts_with('\'') && input.ends_with('\''))
            || (input.starts_with('"') && input.ends_with('"')));
    if quoted {
        return Ok(Literal::String(input[1..input.len() - 1].to_string()));
    }

    input
        .parse::<f64>()
        .map(Literal::Number)
        .map_err(|_| GraphError::Condition(format!("could not parse literal: {}", input)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compare(path: &str, op: CompareOp, right: Literal) -> Expression {
        Expression::Compare {
            path: path.to_string(),
            op,
            right,
        }
    }

    #[test]
    fn test_parse_comparisons() {
        assert_eq!(
            parse("intent == 'search'").unwrap(),
            compare("intent", CompareOp::Eq, Literal::String("search".into()))
        );
        assert_eq!(
            parse("count > 0").unwrap(),
            compare("count", CompareOp::Gt, Literal::Number(0.0))
        );
        assert_eq!(
            parse("score >= 0.8").unwrap(),
            compare("score", CompareOp::Gte, Literal::Number(0.8))
        );
        assert_eq!(
            parse("error != null").unwrap(),
            compare("error", CompareOp::NotEq, Literal::Null)
        );
        assert_eq!(
            parse(r#"name == "hello""#).unwrap(),
            compare("name", CompareOp::Eq, Literal::String("hello".into()))
        );
        assert_eq!(
            parse("tags contains 'bug'").unwrap(),
            compare("tags", CompareOp::Contains, Literal::String("bug".into()))
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse("a == 1 or b == 2 and c == 3").unwrap();
        match expr {
            Expression::Or(left, right) => {
                assert_eq!(*left, compare("a", CompareOp::Eq, Literal::Number(1.0)));
                assert!(matches!(*right, Expression::And(_, _)));
            }
            other => panic!("expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_parentheses_and_not() {
        let expr = parse("not (stage == 'done' or retries > 3)").unwrap();
        match expr {
            Expression::Not(inner) => assert!(matches!(*inner, Expression::Or(_, _))),
            other => panic!("expected Not, got {:?}", other),
        }

        let expr = parse("(a == 1 or b == 2) and c == 3").unwrap();
        assert!(matches!(expr, Expression::And(_, _)));
    }

    #[test]
    fn test_keywords_inside_strings_are_ignored() {
        let expr = parse("title == 'salt and pepper'").unwrap();
        assert_eq!(
            expr,
            compare("title", CompareOp::Eq, Literal::String("salt and pepper".into()))
        );
    }

    #[test]
    fn test_non_ascii_literals() {
        let expr = parse("city == 'Zürich' and count > 0").unwrap();
        assert!(matches!(expr, Expression::And(_, _)));
    }

    #[test]
    fn test_bare_paths_and_literals() {
        assert_eq!(parse("true").unwrap(), Expression::True);
        assert_eq!(parse("false").unwrap(), Expression::False);
        assert_eq!(
            parse("result.approved").unwrap(),
            Expression::Truthy("result.approved".into())
        );
        // identifiers that merely start with a keyword
        assert_eq!(parse("notes").unwrap(), Expression::Truthy("notes".into()));
        assert_eq!(parse("order > 1").unwrap(), compare("order", CompareOp::Gt, Literal::Number(1.0)));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(parse("this is not valid"), Err(GraphError::Condition(_))));
        assert!(parse("").is_err());
        assert!(parse("count > abc").is_err());
        assert!(parse("== 3").is_err());
    }
}
