mod callable;

use std::{
    cell::RefCell,
    cmp::Ordering,
    fmt::{Debug, Display},
    rc::Rc,
};

use crate::{
    ast::{BinaryOperator, Case, Expression, ExpressionKind, Literal, Source, Statement, Variable},
    environment::{Scope, ScopeError},
    types::Type,
};

pub use self::callable::Callable;

type RuntimeScope = Scope<Value, Callable>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i32),
    Decimal(f64),
    Character(char),
    String(String),
    List(Vec<Value>),
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "NIL"),
            Value::Boolean(true) => write!(f, "TRUE"),
            Value::Boolean(false) => write!(f, "FALSE"),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Decimal(n) if n.fract() == 0.0 => write!(f, "{:.1}", n),
            Value::Decimal(n) => write!(f, "{}", n),
            Value::Character(c) => write!(f, "{}", c),
            Value::String(s) => write!(f, "{}", s),
            Value::List(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Result of executing a statement: either fall through to the next one or
/// unwind to the enclosing call with a value.
#[derive(Debug, Clone, PartialEq)]
enum Completion {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    scope: Rc<RefCell<RuntimeScope>>,
    globals: Rc<RefCell<RuntimeScope>>,
    stdout: Rc<RefCell<dyn std::io::Write>>,
    frames: Vec<String>,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("scope", &self.scope)
            .field("frames", &self.frames)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{kind} (in {context})")]
pub struct ExecutionError {
    pub kind: ExecutionErrorKind,
    pub context: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionErrorKind {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow: {left} {operator} {right}")]
    IntegerOverflow {
        left: i32,
        operator: BinaryOperator,
        right: i32,
    },
    #[error("Decimal result is not finite: {0} {1} {2}")]
    NonFiniteDecimal(Value, BinaryOperator, Value),
    #[error("Negative exponent on an Integer: {0}")]
    NegativeExponent(i32),
    #[error("Invalid operands: {0} {1} {2}")]
    InvalidOperands(Value, BinaryOperator, Value),
    #[error("Expected a Boolean, found {0}")]
    ExpectedBoolean(Value),
    #[error("Expected an Integer index, found {0}")]
    InvalidIndex(Value),
    #[error("Index {index} out of bounds for list {name} of length {length}")]
    IndexOutOfBounds {
        name: String,
        index: i32,
        length: usize,
    },
    #[error("Variable {0} is not a list")]
    NotAList(String),
    #[error("Integer literal {0} does not fit in 32 bits")]
    IntegerOutOfRange(i64),
    #[error("Undeclared variable: {0}")]
    UndeclaredVariable(String),
    #[error("Undeclared function: {0}/{1}")]
    UndeclaredFunction(String, usize),
    #[error("Only variables can be assigned to")]
    InvalidAssignmentTarget,
    #[error("Missing main/0 function")]
    MissingMain,
    #[error("main must return an Integer, but returned {0}")]
    MainReturnedNonInteger(Value),
    #[error(transparent)]
    Scope(#[from] ScopeError),
}

/// Global scope holding only the builtins.
fn builtins() -> Rc<RefCell<RuntimeScope>> {
    RuntimeScope::root([(
        "print".to_string(),
        1,
        Callable::Builtin(callable::print, 1),
    )])
}

/// Starting value of a variable declared without an initializer.
fn zero_value(variable: Option<&Variable>) -> Value {
    match variable {
        Some(Variable { list: true, .. }) => Value::List(Vec::new()),
        Some(Variable { ty, .. }) => match ty {
            Type::Boolean => Value::Boolean(false),
            Type::Integer => Value::Integer(0),
            Type::Decimal => Value::Decimal(0.0),
            Type::Character => Value::Character('\0'),
            Type::String => Value::String(String::new()),
            Type::Any | Type::Comparable | Type::Nil => Value::Nil,
        },
        None => Value::Nil,
    }
}

impl Interpreter {
    pub fn new(stdout: Rc<RefCell<dyn std::io::Write>>) -> Self {
        let globals = builtins();
        Self {
            scope: globals.clone(),
            globals,
            stdout,
            frames: Vec::new(),
        }
    }

    /// Runs `source` against fresh globals and returns the Integer produced by
    /// `main`. Globals stay bound afterwards and can be read back with
    /// [`Interpreter::global`].
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn interpret(&mut self, source: &Source) -> Result<i32, ExecutionError> {
        self.globals = builtins();
        self.scope = self.globals.clone();
        self.frames.clear();
        self.run(source).map_err(|kind| ExecutionError {
            kind,
            context: self.context(),
        })
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals
            .borrow()
            .lookup_variable(name)
            .map(|binding| binding.value)
    }

    fn context(&self) -> String {
        if self.frames.is_empty() {
            "source".to_string()
        } else {
            self.frames.join(" > ")
        }
    }

    fn run(&mut self, source: &Source) -> Result<i32, ExecutionErrorKind> {
        for global in &source.globals {
            self.frames.push(global.name.clone());
            let value = match &global.value {
                Some(value) => self.evaluate(value)?,
                None => zero_value(global.variable.as_ref()),
            };
            tracing::trace!(name = %global.name, %value, "global");
            self.globals
                .borrow_mut()
                .define_variable(global.name.clone(), value, global.mutable)?;
            self.frames.pop();
        }

        for function in &source.functions {
            self.globals.borrow_mut().define_function(
                function.name.clone(),
                function.parameters.len(),
                Callable::Function(Rc::new(function.clone())),
            )?;
        }

        let main = self
            .globals
            .borrow()
            .lookup_function("main", 0)
            .ok_or(ExecutionErrorKind::MissingMain)?;
        match main.call(self, Vec::new())? {
            Value::Integer(result) => Ok(result),
            other => Err(ExecutionErrorKind::MainReturnedNonInteger(other)),
        }
    }

    fn execute_statements(
        &mut self,
        statements: &[Statement],
    ) -> Result<Completion, ExecutionErrorKind> {
        for statement in statements {
            if let Completion::Return(value) = self.execute(statement)? {
                return Ok(Completion::Return(value));
            }
        }
        Ok(Completion::Normal)
    }

    fn execute_block(&mut self, statements: &[Statement]) -> Result<Completion, ExecutionErrorKind> {
        self.execute_in_scope(Scope::boxed(Some(self.scope.clone())), |this| {
            this.execute_statements(statements)
        })
    }

    fn execute(&mut self, statement: &Statement) -> Result<Completion, ExecutionErrorKind> {
        match statement {
            Statement::Expression(expression) => {
                self.evaluate(expression)?;
            }
            Statement::Declaration(declaration) => {
                let value = match &declaration.value {
                    Some(value) => self.evaluate(value)?,
                    None => zero_value(declaration.variable.as_ref()),
                };
                self.scope
                    .borrow_mut()
                    .define_variable(declaration.name.clone(), value, true)?;
            }
            Statement::Assignment { receiver, value } => self.assign(receiver, value)?,
            Statement::If {
                condition,
                then_statements,
                else_statements,
            } => {
                return if self.condition(condition)? {
                    self.execute_block(then_statements)
                } else {
                    self.execute_block(else_statements)
                };
            }
            Statement::Switch { condition, cases } => return self.switch(condition, cases),
            Statement::While {
                condition,
                statements,
            } => {
                while self.condition(condition)? {
                    if let Completion::Return(value) = self.execute_block(statements)? {
                        return Ok(Completion::Return(value));
                    }
                }
            }
            Statement::Return(value) => return Ok(Completion::Return(self.evaluate(value)?)),
        }

        Ok(Completion::Normal)
    }

    fn assign(&mut self, receiver: &Expression, value: &Expression) -> Result<(), ExecutionErrorKind> {
        let ExpressionKind::Access { name, offset, .. } = &receiver.kind else {
            return Err(ExecutionErrorKind::InvalidAssignmentTarget);
        };

        let value = match offset {
            None => self.evaluate(value)?,
            Some(offset) => {
                let index = self.index(offset)?;
                let value = self.evaluate(value)?;
                let Value::List(mut elements) = self.lookup(name)? else {
                    return Err(ExecutionErrorKind::NotAList(name.clone()));
                };
                let length = elements.len();
                let slot = element_index(index, length)
                    .and_then(|i| elements.get_mut(i))
                    .ok_or_else(|| ExecutionErrorKind::IndexOutOfBounds {
                        name: name.clone(),
                        index,
                        length,
                    })?;
                *slot = value;
                Value::List(elements)
            }
        };

        self.scope.borrow_mut().assign_variable(name, value)?;
        Ok(())
    }

    fn switch(&mut self, condition: &Expression, cases: &[Case]) -> Result<Completion, ExecutionErrorKind> {
        let condition = self.evaluate(condition)?;
        for case in cases {
            let matched = match &case.value {
                Some(value) => self.evaluate(value)? == condition,
                None => true,
            };
            if matched {
                return self.execute_block(&case.statements);
            }
        }
        Ok(Completion::Normal)
    }

    /// Swaps in `scope` for the duration of `f`, restoring the previous scope
    /// on every exit path.
    fn execute_in_scope<T>(
        &mut self,
        scope: Rc<RefCell<RuntimeScope>>,
        f: impl FnOnce(&mut Self) -> Result<T, ExecutionErrorKind>,
    ) -> Result<T, ExecutionErrorKind> {
        let prev = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = prev;
        result
    }

    fn condition(&mut self, expression: &Expression) -> Result<bool, ExecutionErrorKind> {
        match self.evaluate(expression)? {
            Value::Boolean(b) => Ok(b),
            other => Err(ExecutionErrorKind::ExpectedBoolean(other)),
        }
    }

    fn index(&mut self, expression: &Expression) -> Result<i32, ExecutionErrorKind> {
        match self.evaluate(expression)? {
            Value::Integer(index) => Ok(index),
            other => Err(ExecutionErrorKind::InvalidIndex(other)),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, ExecutionErrorKind> {
        self.scope
            .borrow()
            .lookup_variable(name)
            .map(|binding| binding.value)
            .ok_or_else(|| ExecutionErrorKind::UndeclaredVariable(name.to_string()))
    }

    fn evaluate(&mut self, expression: &Expression) -> Result<Value, ExecutionErrorKind> {
        match &expression.kind {
            ExpressionKind::Literal(literal) => match literal {
                Literal::Nil => Ok(Value::Nil),
                Literal::Boolean(b) => Ok(Value::Boolean(*b)),
                Literal::Integer(n) => i32::try_from(*n)
                    .map(Value::Integer)
                    .map_err(|_| ExecutionErrorKind::IntegerOutOfRange(*n)),
                Literal::Decimal(n) => Ok(Value::Decimal(*n)),
                Literal::Character(c) => Ok(Value::Character(*c)),
                Literal::String(s) => Ok(Value::String(s.clone())),
            },
            ExpressionKind::Group(inner) => self.evaluate(inner),
            ExpressionKind::Binary(left, operator @ (BinaryOperator::And | BinaryOperator::Or), right) => {
                let left = self.condition(left)?;
                let short_circuit = match operator {
                    BinaryOperator::And => !left,
                    _ => left,
                };
                if short_circuit {
                    Ok(Value::Boolean(left))
                } else {
                    Ok(Value::Boolean(self.condition(right)?))
                }
            }
            ExpressionKind::Binary(left, operator, right) => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(*operator, left, right)
            }
            ExpressionKind::Access { name, offset, .. } => {
                let value = self.lookup(name)?;
                let Some(offset) = offset else {
                    return Ok(value);
                };
                let index = self.index(offset)?;
                let Value::List(mut elements) = value else {
                    return Err(ExecutionErrorKind::NotAList(name.clone()));
                };
                let length = elements.len();
                element_index(index, length)
                    .map(|i| elements.swap_remove(i))
                    .ok_or_else(|| ExecutionErrorKind::IndexOutOfBounds {
                        name: name.clone(),
                        index,
                        length,
                    })
            }
            ExpressionKind::Call { name, arguments, .. } => {
                let callable = self
                    .scope
                    .borrow()
                    .lookup_function(name, arguments.len())
                    .ok_or_else(|| ExecutionErrorKind::UndeclaredFunction(name.clone(), arguments.len()))?;
                let arguments = arguments
                    .iter()
                    .map(|argument| self.evaluate(argument))
                    .collect::<Result<Vec<_>, _>>()?;
                tracing::trace!(%callable, "call");
                callable.call(self, arguments)
            }
            ExpressionKind::List(elements) => Ok(Value::List(
                elements
                    .iter()
                    .map(|element| self.evaluate(element))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
        }
    }
}

fn element_index(index: i32, length: usize) -> Option<usize> {
    usize::try_from(index).ok().filter(|&i| i < length)
}

/// Applies a strict binary operator. The left operand's tag picks the rule and
/// the right operand is checked against it.
fn binary(operator: BinaryOperator, left: Value, right: Value) -> Result<Value, ExecutionErrorKind> {
    match (operator, left, right) {
        (BinaryOperator::Equal, left, right) => Ok(Value::Boolean(left == right)),
        (BinaryOperator::NotEqual, left, right) => Ok(Value::Boolean(left != right)),
        (BinaryOperator::Less, left, right) => {
            compare(operator, left, right).map(|o| Value::Boolean(o == Ordering::Less))
        }
        (BinaryOperator::Greater, left, right) => {
            compare(operator, left, right).map(|o| Value::Boolean(o == Ordering::Greater))
        }
        (BinaryOperator::And, Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a && b)),
        (BinaryOperator::Or, Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a || b)),
        (BinaryOperator::Add, Value::String(a), b) => Ok(Value::String(format!("{}{}", a, b))),
        (BinaryOperator::Add, a, Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
        (BinaryOperator::Power, Value::Integer(a), Value::Integer(b)) => {
            let exponent = u32::try_from(b).map_err(|_| ExecutionErrorKind::NegativeExponent(b))?;
            a.checked_pow(exponent)
                .map(Value::Integer)
                .ok_or(ExecutionErrorKind::IntegerOverflow {
                    left: a,
                    operator,
                    right: b,
                })
        }
        (BinaryOperator::Power, Value::Decimal(a), Value::Integer(b)) => {
            let result = a.powi(b);
            if result.is_finite() {
                Ok(Value::Decimal(result))
            } else {
                Err(ExecutionErrorKind::NonFiniteDecimal(
                    Value::Decimal(a),
                    operator,
                    Value::Integer(b),
                ))
            }
        }
        (_, Value::Integer(a), Value::Integer(b)) => integer(operator, a, b),
        (_, Value::Decimal(a), Value::Decimal(b)) => decimal(operator, a, b),
        (operator, left, right) => Err(ExecutionErrorKind::InvalidOperands(left, operator, right)),
    }
}

fn integer(operator: BinaryOperator, a: i32, b: i32) -> Result<Value, ExecutionErrorKind> {
    let result = match operator {
        BinaryOperator::Add => a.checked_add(b),
        BinaryOperator::Subtract => a.checked_sub(b),
        BinaryOperator::Multiply => a.checked_mul(b),
        BinaryOperator::Divide if b == 0 => return Err(ExecutionErrorKind::DivisionByZero),
        BinaryOperator::Divide => a.checked_div(b),
        _ => {
            return Err(ExecutionErrorKind::InvalidOperands(
                Value::Integer(a),
                operator,
                Value::Integer(b),
            ))
        }
    };

    result.map(Value::Integer).ok_or(ExecutionErrorKind::IntegerOverflow {
        left: a,
        operator,
        right: b,
    })
}

fn decimal(operator: BinaryOperator, a: f64, b: f64) -> Result<Value, ExecutionErrorKind> {
    let result = match operator {
        BinaryOperator::Add => a + b,
        BinaryOperator::Subtract => a - b,
        BinaryOperator::Multiply => a * b,
        BinaryOperator::Divide if b == 0.0 => return Err(ExecutionErrorKind::DivisionByZero),
        BinaryOperator::Divide => a / b,
        _ => {
            return Err(ExecutionErrorKind::InvalidOperands(
                Value::Decimal(a),
                operator,
                Value::Decimal(b),
            ))
        }
    };

    if result.is_finite() {
        Ok(Value::Decimal(result))
    } else {
        Err(ExecutionErrorKind::NonFiniteDecimal(
            Value::Decimal(a),
            operator,
            Value::Decimal(b),
        ))
    }
}

fn compare(operator: BinaryOperator, left: Value, right: Value) -> Result<Ordering, ExecutionErrorKind> {
    let ordering = match (&left, &right) {
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Decimal(a), Value::Decimal(b)) => a.partial_cmp(b),
        (Value::Character(a), Value::Character(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    ordering.ok_or(ExecutionErrorKind::InvalidOperands(left, operator, right))
}
