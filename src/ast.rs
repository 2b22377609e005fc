use std::fmt::Display;

use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Source {
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    pub mutable: bool,
    /// Declared with `LIST`; the value is a list of elements of the declared type.
    pub list: bool,
    pub type_name: Option<String>,
    pub value: Option<Expression>,
    pub variable: Option<Variable>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<String>,
    pub parameter_type_names: Vec<String>,
    pub return_type_name: Option<String>,
    pub statements: Vec<Statement>,
    pub function: Option<FunctionSignature>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expression),
    Declaration(Declaration),
    Assignment {
        receiver: Expression,
        value: Expression,
    },
    If {
        condition: Expression,
        then_statements: Vec<Statement>,
        else_statements: Vec<Statement>,
    },
    Switch {
        condition: Expression,
        cases: Vec<Case>,
    },
    While {
        condition: Expression,
        statements: Vec<Statement>,
    },
    Return(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub type_name: Option<String>,
    pub value: Option<Expression>,
    pub variable: Option<Variable>,
}

/// A `CASE value:` arm, or the `DEFAULT` arm when `value` is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub value: Option<Expression>,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    /// Filled in by the analyzer.
    pub ty: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Literal(Literal),
    Group(Box<Expression>),
    Binary(Box<Expression>, BinaryOperator, Box<Expression>),
    Access {
        name: String,
        offset: Option<Box<Expression>>,
        variable: Option<Variable>,
    },
    Call {
        name: String,
        arguments: Vec<Expression>,
        function: Option<FunctionSignature>,
    },
    List(Vec<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Boolean(bool),
    /// Kept wider than the runtime integer so out-of-range literals survive
    /// parsing and are rejected by the analyzer.
    Integer(i64),
    Decimal(f64),
    Character(char),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    And,
    Or,
    Less,
    Greater,
    Equal,
    NotEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

/// Resolved variable binding attached by the analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: Type,
    pub mutable: bool,
    pub list: bool,
}

/// Resolved function binding attached by the analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub parameter_types: Vec<Type>,
    pub return_type: Type,
}

impl Expression {
    pub fn new(kind: ExpressionKind) -> Self {
        Self { kind, ty: None }
    }

    pub fn literal(literal: Literal) -> Self {
        Self::new(ExpressionKind::Literal(literal))
    }

    pub fn binary(left: Expression, operator: BinaryOperator, right: Expression) -> Self {
        Self::new(ExpressionKind::Binary(
            Box::new(left),
            operator,
            Box::new(right),
        ))
    }

    pub fn access(name: impl Into<String>, offset: Option<Expression>) -> Self {
        Self::new(ExpressionKind::Access {
            name: name.into(),
            offset: offset.map(Box::new),
            variable: None,
        })
    }

    pub fn call(name: impl Into<String>, arguments: Vec<Expression>) -> Self {
        Self::new(ExpressionKind::Call {
            name: name.into(),
            arguments,
            function: None,
        })
    }
}

impl BinaryOperator {
    pub fn from_symbol(symbol: &str) -> Option<BinaryOperator> {
        match symbol {
            "&&" => Some(BinaryOperator::And),
            "||" => Some(BinaryOperator::Or),
            "<" => Some(BinaryOperator::Less),
            ">" => Some(BinaryOperator::Greater),
            "==" => Some(BinaryOperator::Equal),
            "!=" => Some(BinaryOperator::NotEqual),
            "+" => Some(BinaryOperator::Add),
            "-" => Some(BinaryOperator::Subtract),
            "*" => Some(BinaryOperator::Multiply),
            "/" => Some(BinaryOperator::Divide),
            "^" => Some(BinaryOperator::Power),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::Less => "<",
            BinaryOperator::Greater => ">",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for global in &self.globals {
            writeln!(f, "{}", global)?;
        }
        for function in &self.functions {
            writeln!(f, "{}", function)?;
        }
        Ok(())
    }
}

fn write_type_name(f: &mut std::fmt::Formatter<'_>, type_name: &Option<String>) -> std::fmt::Result {
    if let Some(type_name) = type_name {
        write!(f, ": {}", type_name)?;
    }
    Ok(())
}

fn write_block(
    f: &mut std::fmt::Formatter<'_>,
    statements: &[Statement],
    indent: usize,
) -> std::fmt::Result {
    for statement in statements {
        writeln!(f)?;
        write!(f, "{:width$}", "", width = indent * 4)?;
        statement.write_indented(f, indent)?;
    }
    writeln!(f)?;
    write!(f, "{:width$}", "", width = indent.saturating_sub(1) * 4)
}

impl Display for Global {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keyword = match (self.list, self.mutable) {
            (true, _) => "LIST",
            (false, true) => "VAR",
            (false, false) => "VAL",
        };
        write!(f, "{} {}", keyword, self.name)?;
        write_type_name(f, &self.type_name)?;
        if let Some(value) = &self.value {
            write!(f, " = {}", value)?;
        }
        write!(f, ";")
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FUN {}(", self.name)?;
        for (i, (parameter, type_name)) in self
            .parameters
            .iter()
            .zip(&self.parameter_type_names)
            .enumerate()
        {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", parameter, type_name)?;
        }
        write!(f, ")")?;
        write_type_name(f, &self.return_type_name)?;
        write!(f, " DO")?;
        write_block(f, &self.statements, 1)?;
        write!(f, "END")
    }
}

impl Statement {
    fn write_indented(&self, f: &mut std::fmt::Formatter<'_>, indent: usize) -> std::fmt::Result {
        match self {
            Statement::Expression(expression) => write!(f, "{};", expression),
            Statement::Declaration(declaration) => {
                write!(f, "LET {}", declaration.name)?;
                write_type_name(f, &declaration.type_name)?;
                if let Some(value) = &declaration.value {
                    write!(f, " = {}", value)?;
                }
                write!(f, ";")
            }
            Statement::Assignment { receiver, value } => write!(f, "{} = {};", receiver, value),
            Statement::If {
                condition,
                then_statements,
                else_statements,
            } => {
                write!(f, "IF {} DO", condition)?;
                write_block(f, then_statements, indent + 1)?;
                if !else_statements.is_empty() {
                    write!(f, "ELSE")?;
                    write_block(f, else_statements, indent + 1)?;
                }
                write!(f, "END")
            }
            Statement::Switch { condition, cases } => {
                write!(f, "SWITCH {}", condition)?;
                for case in cases {
                    writeln!(f)?;
                    write!(f, "{:width$}", "", width = (indent + 1) * 4)?;
                    match &case.value {
                        Some(value) => write!(f, "CASE {}:", value)?,
                        None => write!(f, "DEFAULT")?,
                    }
                    for statement in &case.statements {
                        writeln!(f)?;
                        write!(f, "{:width$}", "", width = (indent + 2) * 4)?;
                        statement.write_indented(f, indent + 2)?;
                    }
                }
                writeln!(f)?;
                write!(f, "{:width$}END", "", width = indent * 4)
            }
            Statement::While {
                condition,
                statements,
            } => {
                write!(f, "WHILE {} DO", condition)?;
                write_block(f, statements, indent + 1)?;
                write!(f, "END")
            }
            Statement::Return(value) => write!(f, "RETURN {};", value),
        }
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_indented(f, 0)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExpressionKind::Literal(literal) => write!(f, "{}", literal),
            ExpressionKind::Group(inner) => write!(f, "({})", inner),
            ExpressionKind::Binary(left, operator, right) => {
                write!(f, "{} {} {}", left, operator, right)
            }
            ExpressionKind::Access { name, offset, .. } => match offset {
                Some(offset) => write!(f, "{}[{}]", name, offset),
                None => write!(f, "{}", name),
            },
            ExpressionKind::Call {
                name, arguments, ..
            } => {
                write!(f, "{}(", name)?;
                write_list(f, arguments)?;
                write!(f, ")")
            }
            ExpressionKind::List(elements) => {
                write!(f, "[")?;
                write_list(f, elements)?;
                write!(f, "]")
            }
        }
    }
}

fn write_list(f: &mut std::fmt::Formatter<'_>, expressions: &[Expression]) -> std::fmt::Result {
    for (i, expression) in expressions.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", expression)?;
    }
    Ok(())
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Nil => write!(f, "NIL"),
            Literal::Boolean(true) => write!(f, "TRUE"),
            Literal::Boolean(false) => write!(f, "FALSE"),
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Decimal(n) => write!(f, "{:?}", n),
            Literal::Character(c) => write!(f, "{:?}", c),
            Literal::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
