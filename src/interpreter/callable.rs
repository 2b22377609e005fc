use std::{fmt::Display, rc::Rc};

use crate::{ast::Function, environment::Scope};

use super::{Completion, ExecutionErrorKind, Interpreter, Value};

#[derive(Debug, Clone)]
pub enum Callable {
    Function(Rc<Function>),
    Builtin(
        fn(&mut Interpreter, &[Value]) -> Result<Value, ExecutionErrorKind>,
        usize,
    ),
}

impl Callable {
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, ExecutionErrorKind> {
        match self {
            Callable::Function(function) => call_function(function, interpreter, arguments),
            Callable::Builtin(f, _) => f(interpreter, &arguments),
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Callable::Function(function) => function.parameters.len(),
            Callable::Builtin(_, arity) => *arity,
        }
    }
}

/// Runs `function` in a fresh scope under the globals. Every parameter is
/// bound before the first statement executes.
fn call_function(
    function: &Function,
    interpreter: &mut Interpreter,
    arguments: Vec<Value>,
) -> Result<Value, ExecutionErrorKind> {
    tracing::debug!(name = %function.name, ?arguments, "calling function");
    interpreter.frames.push(function.name.clone());

    let scope = Scope::boxed(Some(interpreter.globals.clone()));
    let result = interpreter.execute_in_scope(scope, |interpreter| {
        for (name, value) in function.parameters.iter().zip(arguments) {
            interpreter
                .scope
                .borrow_mut()
                .define_variable(name.clone(), value, true)?;
        }
        match interpreter.execute_statements(&function.statements)? {
            Completion::Return(value) => Ok(value),
            Completion::Normal => Ok(Value::Nil),
        }
    })?;

    // Frames stay pushed on failure so the error can report where it happened.
    interpreter.frames.pop();
    tracing::trace!(name = %function.name, %result, "returned");
    Ok(result)
}

pub(super) fn print(
    interpreter: &mut Interpreter,
    arguments: &[Value],
) -> Result<Value, ExecutionErrorKind> {
    for argument in arguments {
        writeln!(interpreter.stdout.borrow_mut(), "{}", argument)?;
    }
    Ok(Value::Nil)
}

impl Display for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callable::Function(function) => {
                write!(f, "<function {}/{}>", function.name, self.arity())
            }
            Callable::Builtin(_, arity) => write!(f, "<builtin function {}>", arity),
        }
    }
}
