use std::{collections::HashMap, str::Chars};

use log::{debug, trace};

use crate::{
    ast::{ASTNode, Expression, Function, Prototype},
    lexer::{CharStream, LexError, Lexer, Token},
};

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ParserError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unknown token `{0}` when expecting an expression")]
    ExpectedExpression(Token),
    #[error("expected ')', found `{0}`")]
    ExpectedCloseParen(Token),
    #[error("expected ')' or ',' in argument list, found `{0}`")]
    ExpectedArgumentSeparator(Token),
    #[error("expected function name in prototype, found `{0}`")]
    ExpectedFunctionName(Token),
    #[error("expected '(' in prototype, found `{0}`")]
    ExpectedParameterList(Token),
    #[error("expected ')' in prototype, found `{0}`")]
    ExpectedParameterListEnd(Token),
}

pub type PartialParseResult = Result<Expression, ParserError>;

pub fn default_precedence() -> HashMap<char, u32> {
    let mut operator_precedence = HashMap::new();
    operator_precedence.insert('<', 10);
    operator_precedence.insert('+', 20);
    operator_precedence.insert('-', 20);
    operator_precedence.insert('*', 40);
    operator_precedence.insert('/', 40);
    operator_precedence
}

/// Recursive descent parser with one token of lookahead.
///
/// The cursor starts out as `Token::Undefined`; `parse_top_level` primes it, or
/// callers driving the productions directly call `next_token` first.
#[derive(Debug)]
pub struct Parser<I: CharStream> {
    lexer: Lexer<I>,
    current: Token,
    deferred: Option<ParserError>,
    pub operator_precedence: HashMap<char, u32>,
}

impl<'a> Parser<Chars<'a>> {
    pub fn from_source(source: &'a str) -> Self {
        Self::new(Lexer::new(source.chars()))
    }
}

impl<I: CharStream> Parser<I> {
    pub fn new(lexer: Lexer<I>) -> Self {
        Self::with_precedence(lexer, default_precedence())
    }

    pub fn with_precedence(lexer: Lexer<I>, operator_precedence: HashMap<char, u32>) -> Self {
        Self {
            lexer,
            current: Token::Undefined,
            deferred: None,
            operator_precedence,
        }
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    /// pull the next token into the cursor; a lexical error leaves it `Token::Undefined`
    pub fn next_token(&mut self) -> Result<&Token, ParserError> {
        match self.lexer.next_token() {
            Ok(token) => {
                self.current = token;
                Ok(&self.current)
            }
            Err(err) => {
                self.current = Token::Undefined;
                Err(err.into())
            }
        }
    }

    // numberexpr ::= number
    fn parse_number(&mut self, value: f64) -> PartialParseResult {
        self.next_token()?;
        Ok(Expression::Number(value))
    }

    // identifierexpr ::= identifier | identifier '(' expression* ')'
    fn parse_identifier(&mut self, name: String) -> PartialParseResult {
        self.next_token()?;

        if self.current != Token::LeftParen {
            return Ok(Expression::Variable(name));
        }
        self.next_token()?;

        let mut args = Vec::new();
        if self.current.as_char() != Some(')') {
            loop {
                args.push(self.parse_expression()?);

                match self.current.as_char() {
                    Some(')') => break,
                    Some(',') => {
                        self.next_token()?;
                    }
                    _ => {
                        return Err(ParserError::ExpectedArgumentSeparator(
                            self.current.clone(),
                        ))
                    }
                }
            }
        }
        self.next_token()?;

        Ok(Expression::Call(name, args))
    }

    // parenexpr ::= '(' expression ')'
    fn parse_nested(&mut self) -> PartialParseResult {
        self.next_token()?;
        let res = self.parse_expression()?;
        if self.current.as_char() != Some(')') {
            return Err(ParserError::ExpectedCloseParen(self.current.clone()));
        }
        self.next_token()?;
        Ok(res)
    }

    fn parse_primary(&mut self) -> PartialParseResult {
        trace!("parse_primary: current token = {:?}", self.current);
        match self.current.clone() {
            Token::Identifier(name) => self.parse_identifier(name),
            Token::Number(value) => self.parse_number(value),
            Token::LeftParen => self.parse_nested(),
            token => Err(ParserError::ExpectedExpression(token)),
        }
    }

    /// the current token as a binary operator, if the table knows it
    fn current_operator(&self) -> Option<(char, u32)> {
        match self.current {
            Token::Operator(op) => self
                .operator_precedence
                .get(&op)
                .map(|&precedence| (op, precedence)),
            _ => None,
        }
    }

    fn parse_rhs(&mut self, expr_precedence: u32, lhs: Expression) -> PartialParseResult {
        let mut result = lhs;

        loop {
            let (operator, precedence) = match self.current_operator() {
                Some((op, precedence)) if precedence >= expr_precedence => (op, precedence),
                _ => return Ok(result),
            };
            self.next_token()?;

            let mut rhs = self.parse_primary()?;

            if let Some((_, next_precedence)) = self.current_operator() {
                if precedence < next_precedence {
                    rhs = self.parse_rhs(precedence + 1, rhs)?;
                }
            }

            result = Expression::binary(operator, result, rhs);
        }
    }

    fn parse_expression(&mut self) -> PartialParseResult {
        trace!("parse_expression: current token = {:?}", self.current);
        let lhs = self.parse_primary()?;
        self.parse_rhs(0, lhs)
    }

    // prototype ::= id '(' id* ')'
    fn parse_prototype(&mut self) -> Result<Prototype, ParserError> {
        trace!("parse_prototype: current token = {:?}", self.current);
        let name = match &self.current {
            Token::Identifier(name) => name.clone(),
            token => return Err(ParserError::ExpectedFunctionName(token.clone())),
        };
        self.next_token()?;

        if self.current != Token::LeftParen {
            return Err(ParserError::ExpectedParameterList(self.current.clone()));
        }

        let mut params = Vec::new();
        loop {
            self.next_token()?;
            match &self.current {
                Token::Identifier(param) => params.push(param.clone()),
                _ => break,
            }
        }

        if self.current.as_char() != Some(')') {
            return Err(ParserError::ExpectedParameterListEnd(self.current.clone()));
        }
        self.next_token()?;

        Ok(Prototype::new(name, params))
    }

    fn definition(&mut self) -> Result<Function, ParserError> {
        self.next_token()?;
        let prototype = self.parse_prototype()?;
        let body = self.parse_expression()?;
        Ok(Function { prototype, body })
    }

    fn external(&mut self) -> Result<Prototype, ParserError> {
        self.next_token()?;
        self.parse_prototype()
    }

    fn top_level_expression(&mut self) -> Result<Function, ParserError> {
        let body = self.parse_expression()?;
        Ok(Function {
            prototype: Prototype::anonymous(),
            body,
        })
    }

    /// Skip exactly one token after a failed top-level production.
    ///
    /// A lexical error has already consumed its text and left the cursor
    /// `Undefined`, so the skip lands on the token after the bad text.
    fn recover<T>(&mut self, result: Result<T, ParserError>) -> Result<T, ParserError> {
        if let Err(err) = &result {
            debug!("{}: skipping `{}` to resynchronize", err, self.current);
            if let Err(skipped) = self.next_token() {
                self.deferred = Some(skipped);
            }
        }
        result
    }

    // definition ::= 'def' prototype expression
    pub fn parse_definition(&mut self) -> Result<Function, ParserError> {
        trace!("parse_definition: current token = {:?}", self.current);
        let result = self.definition();
        self.recover(result)
    }

    // external ::= 'extern' prototype
    pub fn parse_extern(&mut self) -> Result<Prototype, ParserError> {
        trace!("parse_extern: current token = {:?}", self.current);
        let result = self.external();
        self.recover(result)
    }

    // toplevelexpr ::= expression
    pub fn parse_top_level_expression(&mut self) -> Result<Function, ParserError> {
        trace!("parse_top_level_expression: current token = {:?}", self.current);
        let result = self.top_level_expression();
        self.recover(result)
    }

    /// Dispatch one top-level unit. `None` once the input is exhausted.
    ///
    /// A lexical error hit while resynchronizing after a failed unit is
    /// returned by the following call.
    pub fn parse_top_level(&mut self) -> Option<Result<ASTNode, ParserError>> {
        if let Some(err) = self.deferred.take() {
            return Some(Err(err));
        }

        loop {
            match self.current {
                Token::EndOfInput => return None,
                Token::Undefined | Token::Semicolon => {
                    if let Err(err) = self.next_token() {
                        return Some(Err(err));
                    }
                }
                Token::Def => return Some(self.parse_definition().map(ASTNode::Function)),
                Token::Extern => return Some(self.parse_extern().map(ASTNode::Extern)),
                _ => {
                    return Some(
                        self.parse_top_level_expression()
                            .map(ASTNode::TopLevel),
                    )
                }
            }
        }
    }
}

impl<I: CharStream> Iterator for Parser<I> {
    type Item = Result<ASTNode, ParserError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parse_top_level()
    }
}

/// parse a whole source string, stopping at the first error
pub fn parse_str(input: &str) -> Result<Vec<ASTNode>, ParserError> {
    Parser::from_source(input).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(value: f64) -> Expression {
        Expression::Number(value)
    }

    fn var(name: &str) -> Expression {
        Expression::Variable(name.to_string())
    }

    fn parse_expr(input: &str) -> PartialParseResult {
        let mut parser = Parser::from_source(input);
        parser.next_token()?;
        parser.parse_expression()
    }

    fn top_level(body: Expression) -> ASTNode {
        ASTNode::TopLevel(Function {
            prototype: Prototype::anonymous(),
            body,
        })
    }

    #[test]
    fn parse_expr_works() {
        let res = parse_expr("x + 1 * (2 - 3)").unwrap();
        let target = Expression::binary(
            '+',
            var("x"),
            Expression::binary('*', num(1.0), Expression::binary('-', num(2.0), num(3.0))),
        );
        assert_eq!(res, target);
    }

    #[test]
    fn multiplication_binds_tighter() {
        assert_eq!(
            parse_expr("1+2*3").unwrap(),
            Expression::binary('+', num(1.0), Expression::binary('*', num(2.0), num(3.0)))
        );
    }

    #[test]
    fn equal_precedence_is_left_associative() {
        assert_eq!(
            parse_expr("1-2-3").unwrap(),
            Expression::binary('-', Expression::binary('-', num(1.0), num(2.0)), num(3.0))
        );
    }

    #[test]
    fn higher_precedence_run_then_lower() {
        assert_eq!(
            parse_expr("1+2*3-4").unwrap(),
            Expression::binary(
                '-',
                Expression::binary(
                    '+',
                    num(1.0),
                    Expression::binary('*', num(2.0), num(3.0))
                ),
                num(4.0)
            )
        );
    }

    #[test]
    fn comparison_binds_loosest() {
        assert_eq!(
            parse_expr("a < b + c").unwrap(),
            Expression::binary('<', var("a"), Expression::binary('+', var("b"), var("c")))
        );
    }

    #[test]
    fn division_binds_like_multiplication() {
        assert_eq!(
            parse_expr("8/2*4").unwrap(),
            Expression::binary('*', Expression::binary('/', num(8.0), num(2.0)), num(4.0))
        );
        assert_eq!(
            parse_expr("1+6/3").unwrap(),
            Expression::binary('+', num(1.0), Expression::binary('/', num(6.0), num(3.0)))
        );
    }

    #[test]
    fn custom_precedence() {
        let mut operator_precedence = default_precedence();
        operator_precedence.insert('^', 60);
        let mut parser = Parser::with_precedence(Lexer::new("1+2^3".chars()), operator_precedence);
        parser.next_token().unwrap();
        assert_eq!(
            parser.parse_expression().unwrap(),
            Expression::binary('+', num(1.0), Expression::binary('^', num(2.0), num(3.0)))
        );
    }

    #[test]
    fn calls() {
        assert_eq!(
            parse_expr("foo(1, x+2, bar())").unwrap(),
            Expression::Call(
                "foo".to_string(),
                vec![
                    num(1.0),
                    Expression::binary('+', var("x"), num(2.0)),
                    Expression::Call("bar".to_string(), vec![]),
                ]
            )
        );
    }

    #[test]
    fn unclosed_call_is_error() {
        assert_eq!(
            parse_expr("foo(1,2"),
            Err(ParserError::ExpectedArgumentSeparator(Token::EndOfInput))
        );
        assert_eq!(
            parse_expr("foo(1 2)"),
            Err(ParserError::ExpectedArgumentSeparator(Token::Number(2.0)))
        );
        assert!(parse_str("foo(1,2").is_err());
    }

    #[test]
    fn unclosed_paren_is_error() {
        assert_eq!(
            parse_expr("(1+2"),
            Err(ParserError::ExpectedCloseParen(Token::EndOfInput))
        );
    }

    #[test]
    fn definition() {
        let ast = parse_str("def foo(a b) a+b").unwrap();
        assert_eq!(
            ast,
            vec![ASTNode::Function(Function {
                prototype: Prototype::new("foo", vec!["a".to_string(), "b".to_string()]),
                body: Expression::binary('+', var("a"), var("b")),
            })]
        );
    }

    #[test]
    fn extern_and_top_level() {
        let ast = parse_str("extern sin(x); sin(1);").unwrap();
        assert_eq!(
            ast,
            vec![
                ASTNode::Extern(Prototype::new("sin", vec!["x".to_string()])),
                top_level(Expression::Call("sin".to_string(), vec![num(1.0)])),
            ]
        );
    }

    #[test]
    fn prototype_errors() {
        assert_eq!(
            parse_str("def 1(x) x"),
            Err(ParserError::ExpectedFunctionName(Token::Number(1.0)))
        );
        assert_eq!(
            parse_str("def f x"),
            Err(ParserError::ExpectedParameterList(Token::Identifier("x".to_string())))
        );
        assert_eq!(
            parse_str("extern f(x, y)"),
            Err(ParserError::ExpectedParameterListEnd(Token::Operator(',')))
        );
    }

    #[test]
    fn failed_production_skips_one_token() {
        let mut parser = Parser::from_source("def (x) 1");
        parser.next_token().unwrap();
        assert_eq!(
            parser.parse_definition(),
            Err(ParserError::ExpectedFunctionName(Token::LeftParen))
        );
        assert_eq!(parser.current(), &Token::Identifier("x".to_string()));
    }

    #[test]
    fn top_level_resynchronizes() {
        let results = Parser::from_source("def 1(x) x; 4").collect::<Vec<_>>();
        assert_eq!(
            results,
            vec![
                Err(ParserError::ExpectedFunctionName(Token::Number(1.0))),
                Ok(top_level(var("x"))),
                Ok(top_level(var("x"))),
                Ok(top_level(num(4.0))),
            ]
        );
    }

    #[test]
    fn unknown_operator_ends_expression() {
        let results = Parser::from_source("1 ^ 2").collect::<Vec<_>>();
        assert_eq!(
            results,
            vec![
                Ok(top_level(num(1.0))),
                Err(ParserError::ExpectedExpression(Token::Operator('^'))),
                Ok(top_level(num(2.0))),
            ]
        );
    }

    #[test]
    fn lexical_errors_are_recoverable() {
        let results = Parser::from_source("1.2.3 + 4; 5").collect::<Vec<_>>();
        assert_eq!(
            results,
            vec![
                Err(ParserError::Lex(LexError::MultipleDecimalPoints(
                    "1.2.3".to_string()
                ))),
                Err(ParserError::ExpectedExpression(Token::Operator('+'))),
                Ok(top_level(num(4.0))),
                Ok(top_level(num(5.0))),
            ]
        );

        let results = Parser::from_source("1 + 2..3; 7").collect::<Vec<_>>();
        assert_eq!(
            results,
            vec![
                Err(ParserError::Lex(LexError::MultipleDecimalPoints(
                    "2..3".to_string()
                ))),
                Ok(top_level(num(7.0))),
            ]
        );
    }

    #[test]
    fn lexical_error_skip_keeps_following_token() {
        let results = Parser::from_source("1 + 2..3 4; 7").collect::<Vec<_>>();
        assert_eq!(
            results,
            vec![
                Err(ParserError::Lex(LexError::MultipleDecimalPoints(
                    "2..3".to_string()
                ))),
                Ok(top_level(num(4.0))),
                Ok(top_level(num(7.0))),
            ]
        );
    }

    #[test]
    fn lexical_error_while_resynchronizing_is_deferred() {
        let results = Parser::from_source("foo(1 2 3..4 5").collect::<Vec<_>>();
        assert_eq!(
            results,
            vec![
                Err(ParserError::ExpectedArgumentSeparator(Token::Number(2.0))),
                Err(ParserError::Lex(LexError::MultipleDecimalPoints(
                    "3..4".to_string()
                ))),
                Ok(top_level(num(5.0))),
            ]
        );
    }

    #[test]
    fn semicolons_only() {
        assert_eq!(parse_str(";;; # nothing here").unwrap(), vec![]);
    }
}
