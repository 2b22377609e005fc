use std::cell::RefCell;

use crate::{
    ast::{
        BinaryOperator, Case, Declaration, Expression, ExpressionKind, Function, Global, Literal,
        Source, Statement,
    },
    tokenizer::{Token, TokenKind},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at index {index} while parsing {context}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub index: usize,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("Expected \"{0}\"")]
    Expected(&'static str),
    #[error("Expected identifier")]
    ExpectedIdentifier,
    #[error("Expected expression")]
    ExpectedExpression,
    #[error("Expected a global or function declaration")]
    ExpectedDeclaration,
    #[error("SWITCH must end with a DEFAULT case")]
    MissingDefault,
    #[error("Invalid literal {0}")]
    InvalidLiteral(String),
}

type Parsed<'a, T> = Result<(T, &'a [Token]), ParseError>;

#[derive(Debug)]
struct ParseContext {
    stack: RefCell<Vec<&'static str>>,
    /// One past the last character of the last token, reported when input runs out.
    end: usize,
}

impl ParseContext {
    fn new(tokens: &[Token]) -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
            end: tokens.last().map_or(0, Token::end),
        }
    }

    fn push(&self, name: &'static str) -> ParseContextGuard<'_> {
        self.stack.borrow_mut().push(name);
        ParseContextGuard::new(self)
    }

    fn pop(&self) {
        self.stack.borrow_mut().pop();
    }

    fn error(&self, kind: ParseErrorKind, tokens: &[Token]) -> ParseError {
        ParseError {
            kind,
            index: tokens.first().map_or(self.end, |token| token.index),
            context: self.stack.borrow().join(" > "),
        }
    }
}

struct ParseContextGuard<'a> {
    context: &'a ParseContext,
}

impl<'a> ParseContextGuard<'a> {
    fn new(context: &'a ParseContext) -> Self {
        Self { context }
    }
}

impl<'a> Drop for ParseContextGuard<'a> {
    fn drop(&mut self) {
        self.context.pop();
    }
}

#[tracing::instrument(level = "debug", skip_all)]
pub fn source(tokens: &[Token]) -> Result<Source, ParseError> {
    let context = ParseContext::new(tokens);
    let _guard = context.push("source");
    let mut tokens = tokens;
    let mut source = Source::default();

    while peek_any(tokens, &["LIST", "VAR", "VAL"]) {
        let (global, rest) = global(&context, tokens)?;
        source.globals.push(global);
        tokens = rest;
    }

    while let Some(rest) = accept(tokens, "FUN") {
        let (function, rest) = function(&context, rest)?;
        source.functions.push(function);
        tokens = rest;
    }

    if !tokens.is_empty() {
        return Err(context.error(ParseErrorKind::ExpectedDeclaration, tokens));
    }

    tracing::debug!(
        globals = source.globals.len(),
        functions = source.functions.len(),
        "parsed source"
    );
    Ok(source)
}

fn global<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Global> {
    let _guard = context.push("global");
    let (global, tokens) = match tokens.first().map(|token| token.literal.as_str()) {
        Some("LIST") => list(context, &tokens[1..])?,
        Some("VAR") => mutable(context, &tokens[1..])?,
        Some("VAL") => immutable(context, &tokens[1..])?,
        _ => return Err(context.error(ParseErrorKind::ExpectedDeclaration, tokens)),
    };
    let tokens = consume(context, tokens, ";")?;
    Ok((global, tokens))
}

fn list<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Global> {
    let _guard = context.push("list");
    let (name, tokens) = match_identifier(context, tokens)?;
    let (type_name, tokens) = type_annotation(context, tokens)?;
    let tokens = consume(context, tokens, "=")?;
    let tokens = consume(context, tokens, "[")?;
    let (elements, tokens) = delimited(context, tokens, "]")?;
    Ok((
        Global {
            name,
            mutable: true,
            list: true,
            type_name,
            value: Some(Expression::new(ExpressionKind::List(elements))),
            variable: None,
        },
        tokens,
    ))
}

fn mutable<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Global> {
    let _guard = context.push("mutable");
    let (name, tokens) = match_identifier(context, tokens)?;
    let (type_name, tokens) = type_annotation(context, tokens)?;
    let (value, tokens) = match accept(tokens, "=") {
        Some(rest) => {
            let (value, rest) = expression(context, rest)?;
            (Some(value), rest)
        }
        None => (None, tokens),
    };
    Ok((
        Global {
            name,
            mutable: true,
            list: false,
            type_name,
            value,
            variable: None,
        },
        tokens,
    ))
}

fn immutable<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Global> {
    let _guard = context.push("immutable");
    let (name, tokens) = match_identifier(context, tokens)?;
    let (type_name, tokens) = type_annotation(context, tokens)?;
    let tokens = consume(context, tokens, "=")?;
    let (value, tokens) = expression(context, tokens)?;
    Ok((
        Global {
            name,
            mutable: false,
            list: false,
            type_name,
            value: Some(value),
            variable: None,
        },
        tokens,
    ))
}

fn function<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Function> {
    let _guard = context.push("function");
    let (name, tokens) = match_identifier(context, tokens)?;
    let mut tokens = consume(context, tokens, "(")?;
    let mut parameters = Vec::new();
    let mut parameter_type_names = Vec::new();

    if let Some(rest) = accept(tokens, ")") {
        tokens = rest;
    } else {
        loop {
            let (parameter, rest) = match_identifier(context, tokens)?;
            let (type_name, rest) = type_annotation(context, rest)?;
            parameters.push(parameter);
            parameter_type_names.push(type_name.unwrap_or_else(|| "Any".to_string()));

            if let Some(rest) = accept(rest, ",") {
                tokens = rest;
            } else {
                tokens = consume(context, rest, ")")?;
                break;
            }
        }
    }

    let (return_type_name, tokens) = type_annotation(context, tokens)?;
    let tokens = consume(context, tokens, "DO")?;
    let (statements, tokens) = block(context, tokens)?;
    let tokens = consume(context, tokens, "END")?;

    Ok((
        Function {
            name,
            parameters,
            parameter_type_names,
            return_type_name,
            statements,
            function: None,
        },
        tokens,
    ))
}

fn block<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Vec<Statement>> {
    let _guard = context.push("block");
    let mut statements = Vec::new();
    let mut tokens = tokens;

    while !tokens.is_empty() && !peek_any(tokens, &["END", "ELSE", "CASE", "DEFAULT"]) {
        let (statement, rest) = statement(context, tokens)?;
        statements.push(statement);
        tokens = rest;
    }

    Ok((statements, tokens))
}

fn statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("statement");
    match tokens.first().map(|token| token.literal.as_str()) {
        Some("LET") => declaration(context, &tokens[1..]),
        Some("SWITCH") => switch_statement(context, &tokens[1..]),
        Some("IF") => if_statement(context, &tokens[1..]),
        Some("WHILE") => while_statement(context, &tokens[1..]),
        Some("RETURN") => return_statement(context, &tokens[1..]),
        _ => expression_statement(context, tokens),
    }
}

fn declaration<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("declaration");
    let (name, tokens) = match_identifier(context, tokens)?;
    let (type_name, tokens) = type_annotation(context, tokens)?;
    let (value, tokens) = match accept(tokens, "=") {
        Some(rest) => {
            let (value, rest) = expression(context, rest)?;
            (Some(value), rest)
        }
        None => (None, tokens),
    };
    let tokens = consume(context, tokens, ";")?;
    Ok((
        Statement::Declaration(Declaration {
            name,
            type_name,
            value,
            variable: None,
        }),
        tokens,
    ))
}

fn if_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("if_statement");
    let (condition, tokens) = expression(context, tokens)?;
    let tokens = consume(context, tokens, "DO")?;
    let (then_statements, tokens) = block(context, tokens)?;
    let (else_statements, tokens) = match accept(tokens, "ELSE") {
        Some(rest) => block(context, rest)?,
        None => (Vec::new(), tokens),
    };
    let tokens = consume(context, tokens, "END")?;
    Ok((
        Statement::If {
            condition,
            then_statements,
            else_statements,
        },
        tokens,
    ))
}

fn switch_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("switch_statement");
    let (condition, mut tokens) = expression(context, tokens)?;
    let mut cases = Vec::new();

    while let Some(rest) = accept(tokens, "CASE") {
        let (value, rest) = expression(context, rest)?;
        let rest = consume(context, rest, ":")?;
        let (statements, rest) = block(context, rest)?;
        cases.push(Case {
            value: Some(value),
            statements,
        });
        tokens = rest;
    }

    let Some(rest) = accept(tokens, "DEFAULT") else {
        return Err(context.error(ParseErrorKind::MissingDefault, tokens));
    };
    let (statements, tokens) = block(context, rest)?;
    cases.push(Case {
        value: None,
        statements,
    });

    let tokens = consume(context, tokens, "END")?;
    Ok((Statement::Switch { condition, cases }, tokens))
}

fn while_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("while_statement");
    let (condition, tokens) = expression(context, tokens)?;
    let tokens = consume(context, tokens, "DO")?;
    let (statements, tokens) = block(context, tokens)?;
    let tokens = consume(context, tokens, "END")?;
    Ok((
        Statement::While {
            condition,
            statements,
        },
        tokens,
    ))
}

fn return_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("return_statement");
    let (value, tokens) = expression(context, tokens)?;
    let tokens = consume(context, tokens, ";")?;
    Ok((Statement::Return(value), tokens))
}

fn expression_statement<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Statement> {
    let _guard = context.push("expression_statement");
    let (expression, tokens) = expression(context, tokens)?;
    if let Some(rest) = accept(tokens, "=") {
        let (value, rest) = self::expression(context, rest)?;
        let rest = consume(context, rest, ";")?;
        return Ok((
            Statement::Assignment {
                receiver: expression,
                value,
            },
            rest,
        ));
    }
    let tokens = consume(context, tokens, ";")?;
    Ok((Statement::Expression(expression), tokens))
}

fn expression<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("expression");
    logical(context, tokens)
}

fn binary<'a>(
    context: &ParseContext,
    precedence: impl Fn(&ParseContext, &'a [Token]) -> Parsed<'a, Expression>,
    operators: &[&str],
    tokens: &'a [Token],
) -> Parsed<'a, Expression> {
    let (mut expr, mut tokens) = precedence(context, tokens)?;

    while let Some(token) = tokens.first() {
        if token.kind != TokenKind::Operator || !operators.contains(&token.literal.as_str()) {
            break;
        }
        let Some(operator) = BinaryOperator::from_symbol(&token.literal) else {
            break;
        };
        let (right, rest) = precedence(context, &tokens[1..])?;
        expr = Expression::binary(expr, operator, right);
        tokens = rest;
    }

    Ok((expr, tokens))
}

fn logical<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("logical");
    binary(context, comparison, &["&&", "||"], tokens)
}

fn comparison<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("comparison");
    binary(context, additive, &["<", ">", "==", "!="], tokens)
}

fn additive<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("additive");
    binary(context, multiplicative, &["+", "-"], tokens)
}

fn multiplicative<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("multiplicative");
    binary(context, primary, &["*", "/", "^"], tokens)
}

fn primary<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Expression> {
    let _guard = context.push("primary");
    let Some(token) = tokens.first() else {
        return Err(context.error(ParseErrorKind::ExpectedExpression, tokens));
    };
    let rest = &tokens[1..];

    let literal = match (token.kind, token.literal.as_str()) {
        (TokenKind::Identifier, "NIL") => Literal::Nil,
        (TokenKind::Identifier, "TRUE") => Literal::Boolean(true),
        (TokenKind::Identifier, "FALSE") => Literal::Boolean(false),
        (TokenKind::Integer, digits) => Literal::Integer(integer(digits)),
        (TokenKind::Decimal, digits) => Literal::Decimal(
            digits
                .parse()
                .map_err(|_| context.error(invalid_literal(token), tokens))?,
        ),
        (TokenKind::Character, quoted) => {
            let mut chars = unescape(&quoted[1..quoted.len() - 1]).into_iter();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Literal::Character(c),
                _ => return Err(context.error(invalid_literal(token), tokens)),
            }
        }
        (TokenKind::String, quoted) => {
            Literal::String(unescape(&quoted[1..quoted.len() - 1]).into_iter().collect())
        }
        (TokenKind::Operator, "(") => {
            let (inner, rest) = expression(context, rest)?;
            let rest = consume(context, rest, ")")?;
            return Ok((
                Expression::new(ExpressionKind::Group(Box::new(inner))),
                rest,
            ));
        }
        (TokenKind::Identifier, name) => return access_or_call(context, name, rest),
        _ => return Err(context.error(ParseErrorKind::ExpectedExpression, tokens)),
    };

    Ok((Expression::literal(literal), rest))
}

fn access_or_call<'a>(
    context: &ParseContext,
    name: &str,
    tokens: &'a [Token],
) -> Parsed<'a, Expression> {
    if let Some(rest) = accept(tokens, "(") {
        let (arguments, rest) = delimited(context, rest, ")")?;
        Ok((Expression::call(name, arguments), rest))
    } else if let Some(rest) = accept(tokens, "[") {
        let (offset, rest) = expression(context, rest)?;
        let rest = consume(context, rest, "]")?;
        Ok((Expression::access(name, Some(offset)), rest))
    } else {
        Ok((Expression::access(name, None), tokens))
    }
}

/// Comma separated expressions up to and including `close`.
fn delimited<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    close: &'static str,
) -> Parsed<'a, Vec<Expression>> {
    let mut expressions = Vec::new();
    if let Some(rest) = accept(tokens, close) {
        return Ok((expressions, rest));
    }

    let mut tokens = tokens;
    loop {
        let (expression, rest) = expression(context, tokens)?;
        expressions.push(expression);
        match accept(rest, ",") {
            Some(rest) => tokens = rest,
            None => return Ok((expressions, consume(context, rest, close)?)),
        }
    }
}

fn type_annotation<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, Option<String>> {
    match accept(tokens, ":") {
        Some(rest) => {
            let (type_name, rest) = match_identifier(context, rest)?;
            Ok((Some(type_name), rest))
        }
        None => Ok((None, tokens)),
    }
}

/// Out-of-range literals saturate; the analyzer rejects anything outside 32 bits.
fn integer(digits: &str) -> i64 {
    digits.parse().unwrap_or(if digits.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    })
}

fn unescape(raw: &str) -> Vec<char> {
    let mut chars = raw.chars();
    let mut unescaped = Vec::new();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('b') => unescaped.push('\u{8}'),
            Some('n') => unescaped.push('\n'),
            Some('t') => unescaped.push('\t'),
            Some('r') => unescaped.push('\r'),
            Some(escaped) => unescaped.push(escaped),
            None => unescaped.push('\\'),
        }
    }
    unescaped
}

fn invalid_literal(token: &Token) -> ParseErrorKind {
    ParseErrorKind::InvalidLiteral(token.literal.clone())
}

fn peek_any(tokens: &[Token], literals: &[&str]) -> bool {
    tokens
        .first()
        .is_some_and(|token| literals.contains(&token.literal.as_str()))
}

fn accept<'a>(tokens: &'a [Token], literal: &str) -> Option<&'a [Token]> {
    match tokens.first() {
        Some(token) if token.literal == literal => Some(&tokens[1..]),
        _ => None,
    }
}

fn consume<'a>(
    context: &ParseContext,
    tokens: &'a [Token],
    literal: &'static str,
) -> Result<&'a [Token], ParseError> {
    accept(tokens, literal).ok_or_else(|| context.error(ParseErrorKind::Expected(literal), tokens))
}

fn match_identifier<'a>(context: &ParseContext, tokens: &'a [Token]) -> Parsed<'a, String> {
    match tokens.first() {
        Some(token) if token.kind == TokenKind::Identifier => {
            Ok((token.literal.clone(), &tokens[1..]))
        }
        _ => Err(context.error(ParseErrorKind::ExpectedIdentifier, tokens)),
    }
}
