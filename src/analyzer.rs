use std::{cell::RefCell, rc::Rc};

use crate::{
    ast::{
        BinaryOperator, Case, Declaration, Expression, ExpressionKind, Function,
        FunctionSignature, Global, Literal, Source, Statement, Variable,
    },
    environment::{Binding, Scope, ScopeError},
    types::{assignable, Type},
};

/// What the analyzer knows about a variable besides its mutability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableType {
    pub ty: Type,
    pub list: bool,
}

pub type TypeScope = Scope<VariableType, FunctionSignature>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalyzeError {
    #[error("Unknown type: {0}")]
    UnknownType(String),
    #[error("Expected {expected}, found {actual}")]
    TypeMismatch { expected: Type, actual: Type },
    #[error("Operator {operator} cannot be applied to {left} and {right}")]
    InvalidOperands {
        operator: BinaryOperator,
        left: Type,
        right: Type,
    },
    #[error("Undeclared variable: {0}")]
    UndeclaredVariable(String),
    #[error("Undeclared function: {0}/{1}")]
    UndeclaredFunction(String, usize),
    #[error("{0} needs a declared type or an initial value")]
    MissingType(String),
    #[error("Comparable variable {0} needs an initial value")]
    MissingInitializer(String),
    #[error("Function {0} can end without returning a value")]
    MissingReturn(String),
    #[error("Integer literal {0} does not fit in 32 bits")]
    IntegerOutOfRange(i64),
    #[error("Decimal literal is not finite")]
    NonFiniteDecimal,
    #[error("Only function calls can be used as statements")]
    ExpressionStatement,
    #[error("Only variables can be assigned to")]
    InvalidAssignmentTarget,
    #[error("Cannot assign to immutable variable: {0}")]
    ImmutableAssignment(String),
    #[error("IF requires at least one statement in its DO block")]
    EmptyIf,
    #[error("DEFAULT must be the last case of a SWITCH")]
    MisplacedDefault,
    #[error("Only binary expressions can be grouped")]
    InvalidGroup,
    #[error("List {0} must be accessed with a subscript")]
    UnsubscriptedList(String),
    #[error("Variable {0} is not a list")]
    NotAList(String),
    #[error("LIST {0} must be initialized with a list literal")]
    ExpectedListLiteral(String),
    #[error("List literals can only initialize a LIST")]
    UnexpectedList,
    #[error("Cannot infer the element type of empty list {0}")]
    EmptyList(String),
    #[error("Missing main/0 function")]
    MissingMain,
    #[error("main must return Integer, but returns {0}")]
    InvalidMainReturn(Type),
    #[error(transparent)]
    Scope(#[from] ScopeError),
}

/// Immutable state threaded through the traversal. Entering a block derives a
/// new context with a child scope; the parent is untouched once the child drops.
#[derive(Debug, Clone)]
struct Context {
    scope: Rc<RefCell<TypeScope>>,
    return_type: Type,
}

impl Context {
    fn new(scope: Rc<RefCell<TypeScope>>) -> Self {
        Self {
            scope,
            return_type: Type::Nil,
        }
    }

    fn child(&self) -> Self {
        Self {
            scope: TypeScope::boxed(Some(self.scope.clone())),
            return_type: self.return_type,
        }
    }

    fn function(&self, return_type: Type) -> Self {
        Self {
            return_type,
            ..self.child()
        }
    }
}

pub struct Analyzer {
    scope: Rc<RefCell<TypeScope>>,
}

impl Analyzer {
    pub fn new() -> Self {
        let print = FunctionSignature {
            name: "print".to_string(),
            parameter_types: vec![Type::Any],
            return_type: Type::Nil,
        };
        Self {
            scope: TypeScope::root([("print".to_string(), 1, print)]),
        }
    }

    /// The root scope, holding globals and functions once analysis has run.
    pub fn scope(&self) -> &Rc<RefCell<TypeScope>> {
        &self.scope
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn analyze(&self, source: &mut Source) -> Result<(), AnalyzeError> {
        let context = Context::new(self.scope.clone());

        for global in &mut source.globals {
            self::global(&context, global)?;
        }

        let mut signatures = Vec::with_capacity(source.functions.len());
        for function in &source.functions {
            let signature = signature(function)?;
            context.scope.borrow_mut().define_function(
                function.name.clone(),
                signature.parameter_types.len(),
                signature.clone(),
            )?;
            signatures.push(signature);
        }

        for (function, signature) in source.functions.iter_mut().zip(signatures) {
            self::function(&context, function, &signature)?;
            function.function = Some(signature);
        }

        let main = context
            .scope
            .borrow()
            .lookup_function("main", 0)
            .ok_or(AnalyzeError::MissingMain)?;
        if !assignable(Type::Integer, main.return_type) {
            return Err(AnalyzeError::InvalidMainReturn(main.return_type));
        }

        Ok(())
    }
}

pub fn analyze(source: &mut Source) -> Result<(), AnalyzeError> {
    Analyzer::new().analyze(source)
}

fn resolve_type(name: &str) -> Result<Type, AnalyzeError> {
    Type::from_name(name).ok_or_else(|| AnalyzeError::UnknownType(name.to_string()))
}

fn resolve_optional_type(name: Option<&str>) -> Result<Option<Type>, AnalyzeError> {
    name.map(resolve_type).transpose()
}

fn require_assignable(target: Type, source: Type) -> Result<(), AnalyzeError> {
    if assignable(target, source) {
        Ok(())
    } else {
        Err(AnalyzeError::TypeMismatch {
            expected: target,
            actual: source,
        })
    }
}

fn require_exact(expected: Type, actual: Type) -> Result<(), AnalyzeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(AnalyzeError::TypeMismatch { expected, actual })
    }
}

fn global(context: &Context, global: &mut Global) -> Result<(), AnalyzeError> {
    let declared = resolve_optional_type(global.type_name.as_deref())?;
    let ty = if global.list {
        match global.value.as_mut() {
            Some(value) => list(context, &global.name, value, declared)?,
            None => declared.ok_or_else(|| AnalyzeError::MissingType(global.name.clone()))?,
        }
    } else {
        declared_type(context, &global.name, declared, global.value.as_mut())?
    };

    let variable = VariableType {
        ty,
        list: global.list,
    };
    context
        .scope
        .borrow_mut()
        .define_variable(global.name.clone(), variable, global.mutable)?;
    global.variable = Some(Variable {
        name: global.name.clone(),
        ty,
        mutable: global.mutable,
        list: global.list,
    });
    Ok(())
}

/// Type of a declared variable: the declared type if present (the initializer
/// must fit it), otherwise the initializer's own type. Without an initializer
/// the variable starts at its type's zero value, which Comparable lacks.
fn declared_type(
    context: &Context,
    name: &str,
    declared: Option<Type>,
    value: Option<&mut Expression>,
) -> Result<Type, AnalyzeError> {
    match (declared, value) {
        (Some(declared), Some(value)) => {
            let actual = expression(context, value)?;
            require_assignable(declared, actual)?;
            Ok(declared)
        }
        (Some(Type::Comparable), None) => Err(AnalyzeError::MissingInitializer(name.to_string())),
        (Some(declared), None) => Ok(declared),
        (None, Some(value)) => expression(context, value),
        (None, None) => Err(AnalyzeError::MissingType(name.to_string())),
    }
}

/// Checks a LIST initializer and returns its element type. Without a declared
/// type the first element decides.
fn list(
    context: &Context,
    name: &str,
    value: &mut Expression,
    declared: Option<Type>,
) -> Result<Type, AnalyzeError> {
    let ExpressionKind::List(elements) = &mut value.kind else {
        return Err(AnalyzeError::ExpectedListLiteral(name.to_string()));
    };

    let mut element_type = declared;
    for element in elements {
        let actual = expression(context, element)?;
        match element_type {
            Some(expected) => require_assignable(expected, actual)?,
            None => element_type = Some(actual),
        }
    }

    let ty = element_type.ok_or_else(|| AnalyzeError::EmptyList(name.to_string()))?;
    annotate(value, ty);
    Ok(ty)
}

fn signature(function: &Function) -> Result<FunctionSignature, AnalyzeError> {
    let parameter_types = function
        .parameter_type_names
        .iter()
        .map(|name| resolve_type(name))
        .collect::<Result<Vec<_>, _>>()?;
    let return_type =
        resolve_optional_type(function.return_type_name.as_deref())?.unwrap_or(Type::Nil);

    Ok(FunctionSignature {
        name: function.name.clone(),
        parameter_types,
        return_type,
    })
}

fn function(
    context: &Context,
    function: &mut Function,
    signature: &FunctionSignature,
) -> Result<(), AnalyzeError> {
    tracing::debug!(name = %function.name, arity = function.parameters.len(), "analyzing function");
    let context = context.function(signature.return_type);

    for (parameter, ty) in function.parameters.iter().zip(&signature.parameter_types) {
        context.scope.borrow_mut().define_variable(
            parameter.clone(),
            VariableType {
                ty: *ty,
                list: false,
            },
            true,
        )?;
    }

    statements(&context, &mut function.statements)?;

    if !assignable(signature.return_type, Type::Nil) && !returns(&function.statements) {
        return Err(AnalyzeError::MissingReturn(function.name.clone()));
    }
    Ok(())
}

/// Whether every path through `statements` ends in a RETURN. A WHILE body may
/// never run, so loops never count.
fn returns(statements: &[Statement]) -> bool {
    statements.iter().any(|statement| match statement {
        Statement::Return(_) => true,
        Statement::If {
            then_statements,
            else_statements,
            ..
        } => returns(then_statements) && returns(else_statements),
        Statement::Switch { cases, .. } => cases.iter().all(|case| returns(&case.statements)),
        _ => false,
    })
}

fn statements(context: &Context, statements: &mut [Statement]) -> Result<(), AnalyzeError> {
    for statement in statements {
        self::statement(context, statement)?;
    }
    Ok(())
}

fn statement(context: &Context, statement: &mut Statement) -> Result<(), AnalyzeError> {
    match statement {
        Statement::Expression(expression) => {
            if !matches!(expression.kind, ExpressionKind::Call { .. }) {
                return Err(AnalyzeError::ExpressionStatement);
            }
            self::expression(context, expression)?;
        }
        Statement::Declaration(declaration) => self::declaration(context, declaration)?,
        Statement::Assignment { receiver, value } => assignment(context, receiver, value)?,
        Statement::If {
            condition,
            then_statements,
            else_statements,
        } => {
            require_exact(Type::Boolean, expression(context, condition)?)?;
            if then_statements.is_empty() {
                return Err(AnalyzeError::EmptyIf);
            }
            statements(&context.child(), then_statements)?;
            statements(&context.child(), else_statements)?;
        }
        Statement::Switch { condition, cases } => switch(context, condition, cases)?,
        Statement::While {
            condition,
            statements: body,
        } => {
            require_exact(Type::Boolean, expression(context, condition)?)?;
            statements(&context.child(), body)?;
        }
        Statement::Return(value) => {
            let actual = expression(context, value)?;
            require_assignable(context.return_type, actual)?;
        }
    }
    Ok(())
}

fn declaration(context: &Context, declaration: &mut Declaration) -> Result<(), AnalyzeError> {
    let declared = resolve_optional_type(declaration.type_name.as_deref())?;
    let ty = declared_type(
        context,
        &declaration.name,
        declared,
        declaration.value.as_mut(),
    )?;

    context.scope.borrow_mut().define_variable(
        declaration.name.clone(),
        VariableType { ty, list: false },
        true,
    )?;
    declaration.variable = Some(Variable {
        name: declaration.name.clone(),
        ty,
        mutable: true,
        list: false,
    });
    Ok(())
}

fn assignment(
    context: &Context,
    receiver: &mut Expression,
    value: &mut Expression,
) -> Result<(), AnalyzeError> {
    if !matches!(receiver.kind, ExpressionKind::Access { .. }) {
        return Err(AnalyzeError::InvalidAssignmentTarget);
    }

    let target = expression(context, receiver)?;
    if let ExpressionKind::Access {
        variable: Some(variable),
        ..
    } = &receiver.kind
    {
        if !variable.mutable {
            return Err(AnalyzeError::ImmutableAssignment(variable.name.clone()));
        }
    }

    let actual = expression(context, value)?;
    require_assignable(target, actual)
}

fn switch(
    context: &Context,
    condition: &mut Expression,
    cases: &mut [Case],
) -> Result<(), AnalyzeError> {
    let condition_type = expression(context, condition)?;
    let last = cases.len().saturating_sub(1);

    for (i, case) in cases.iter_mut().enumerate() {
        match &mut case.value {
            Some(value) => {
                let actual = expression(context, value)?;
                require_assignable(condition_type, actual)?;
            }
            None if i != last => return Err(AnalyzeError::MisplacedDefault),
            None => {}
        }
        statements(&context.child(), &mut case.statements)?;
    }
    Ok(())
}

/// Resolves the type of `expression`, records it on the node and returns it.
fn expression(context: &Context, expression: &mut Expression) -> Result<Type, AnalyzeError> {
    let ty = match &mut expression.kind {
        ExpressionKind::Literal(literal) => self::literal(literal)?,
        ExpressionKind::Group(inner) => {
            if !matches!(inner.kind, ExpressionKind::Binary(..)) {
                return Err(AnalyzeError::InvalidGroup);
            }
            self::expression(context, inner)?
        }
        ExpressionKind::Binary(left, operator, right) => {
            let left = self::expression(context, left)?;
            let right = self::expression(context, right)?;
            binary(*operator, left, right)?
        }
        ExpressionKind::Access {
            name,
            offset,
            variable,
        } => {
            let binding = context
                .scope
                .borrow()
                .lookup_variable(name)
                .ok_or_else(|| AnalyzeError::UndeclaredVariable(name.clone()))?;
            access(context, name, offset.as_deref_mut(), &binding)?;
            *variable = Some(Variable {
                name: name.clone(),
                ty: binding.value.ty,
                mutable: binding.mutable,
                list: binding.value.list,
            });
            binding.value.ty
        }
        ExpressionKind::Call {
            name,
            arguments,
            function,
        } => {
            let signature = context
                .scope
                .borrow()
                .lookup_function(name, arguments.len())
                .ok_or_else(|| AnalyzeError::UndeclaredFunction(name.clone(), arguments.len()))?;
            for (argument, parameter_type) in arguments.iter_mut().zip(&signature.parameter_types)
            {
                let actual = self::expression(context, argument)?;
                require_assignable(*parameter_type, actual)?;
            }
            let return_type = signature.return_type;
            *function = Some(signature);
            return_type
        }
        ExpressionKind::List(_) => return Err(AnalyzeError::UnexpectedList),
    };

    annotate(expression, ty);
    Ok(ty)
}

fn annotate(expression: &mut Expression, ty: Type) {
    debug_assert!(expression.ty.is_none(), "expression analyzed twice");
    expression.ty = Some(ty);
}

fn literal(literal: &Literal) -> Result<Type, AnalyzeError> {
    match literal {
        Literal::Nil => Ok(Type::Nil),
        Literal::Boolean(_) => Ok(Type::Boolean),
        Literal::Integer(n) => {
            if i32::try_from(*n).is_ok() {
                Ok(Type::Integer)
            } else {
                Err(AnalyzeError::IntegerOutOfRange(*n))
            }
        }
        Literal::Decimal(n) => {
            if n.is_finite() {
                Ok(Type::Decimal)
            } else {
                Err(AnalyzeError::NonFiniteDecimal)
            }
        }
        Literal::Character(_) => Ok(Type::Character),
        Literal::String(_) => Ok(Type::String),
    }
}

fn access(
    context: &Context,
    name: &str,
    offset: Option<&mut Expression>,
    binding: &Binding<VariableType>,
) -> Result<(), AnalyzeError> {
    match offset {
        Some(offset) => {
            if !binding.value.list {
                return Err(AnalyzeError::NotAList(name.to_string()));
            }
            require_exact(Type::Integer, expression(context, offset)?)
        }
        None if binding.value.list => Err(AnalyzeError::UnsubscriptedList(name.to_string())),
        None => Ok(()),
    }
}

fn binary(operator: BinaryOperator, left: Type, right: Type) -> Result<Type, AnalyzeError> {
    let numeric = |ty: Type| matches!(ty, Type::Integer | Type::Decimal);
    let result = match operator {
        BinaryOperator::And | BinaryOperator::Or => {
            (left == Type::Boolean && right == Type::Boolean).then_some(Type::Boolean)
        }
        BinaryOperator::Less
        | BinaryOperator::Greater
        | BinaryOperator::Equal
        | BinaryOperator::NotEqual => {
            (left.is_comparable() && left == right).then_some(Type::Boolean)
        }
        BinaryOperator::Add if left == Type::String || right == Type::String => Some(Type::String),
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide => (numeric(left) && left == right).then_some(left),
        BinaryOperator::Power => (numeric(left) && right == Type::Integer).then_some(left),
    };

    result.ok_or(AnalyzeError::InvalidOperands {
        operator,
        left,
        right,
    })
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{parser, tokenizer};

    fn parse(source: &str) -> Source {
        let tokens = tokenizer::tokens(source).unwrap();
        parser::source(&tokens).unwrap()
    }

    fn check(source: &str) -> Result<Source, AnalyzeError> {
        let mut source = parse(source);
        analyze(&mut source)?;
        Ok(source)
    }

    /// Analyzes a single expression against a root scope holding `x: Integer`,
    /// `d: Decimal` and `s: String`.
    fn expression_type(source: &str) -> Result<Type, AnalyzeError> {
        let analyzer = Analyzer::new();
        for (name, ty) in [("x", Type::Integer), ("d", Type::Decimal), ("s", Type::String)] {
            analyzer
                .scope()
                .borrow_mut()
                .define_variable(name.to_string(), VariableType { ty, list: false }, true)
                .unwrap();
        }
        let mut source = parse(&format!("VAL result = {};", source));
        let context = Context::new(analyzer.scope().clone());
        let value = source.globals[0].value.as_mut().unwrap();
        let ty = expression(&context, value)?;
        assert_eq!(value.ty, Some(ty));
        Ok(ty)
    }

    fn mismatch(expected: Type, actual: Type) -> AnalyzeError {
        AnalyzeError::TypeMismatch { expected, actual }
    }

    #[test]
    fn test_global_and_main() {
        let source = check("VAL x = 5; FUN main(): Integer DO RETURN x + 3; END").unwrap();
        assert_eq!(
            source.globals[0].variable,
            Some(Variable {
                name: "x".to_string(),
                ty: Type::Integer,
                mutable: false,
                list: false,
            })
        );
        assert_eq!(
            source.functions[0].function,
            Some(FunctionSignature {
                name: "main".to_string(),
                parameter_types: vec![],
                return_type: Type::Integer,
            })
        );
        let Statement::Return(value) = &source.functions[0].statements[0] else {
            panic!("expected a return statement");
        };
        assert_eq!(value.ty, Some(Type::Integer));
    }

    #[test]
    fn test_missing_main() {
        assert_eq!(
            check("FUN notmain(): Integer DO RETURN 0; END").unwrap_err(),
            AnalyzeError::MissingMain
        );
        assert_eq!(
            check("FUN main(x: Integer): Integer DO RETURN x; END").unwrap_err(),
            AnalyzeError::MissingMain
        );
    }

    #[test]
    fn test_main_must_return_integer() {
        assert_eq!(
            check("FUN main() DO print(1); END").unwrap_err(),
            AnalyzeError::InvalidMainReturn(Type::Nil)
        );
    }

    #[test]
    fn test_integer_literal_bounds() {
        assert_eq!(expression_type("2147483647"), Ok(Type::Integer));
        assert_eq!(expression_type("-2147483648"), Ok(Type::Integer));
        assert_eq!(
            expression_type("2147483648"),
            Err(AnalyzeError::IntegerOutOfRange(2_147_483_648))
        );
        assert_eq!(
            expression_type("-2147483649"),
            Err(AnalyzeError::IntegerOutOfRange(-2_147_483_649))
        );
    }

    #[test]
    fn test_non_finite_decimal() {
        let digits = "9".repeat(400);
        assert_eq!(
            expression_type(&format!("{}.0", digits)),
            Err(AnalyzeError::NonFiniteDecimal)
        );
    }

    #[test]
    fn test_literal_types() {
        assert_eq!(expression_type("NIL"), Ok(Type::Nil));
        assert_eq!(expression_type("TRUE"), Ok(Type::Boolean));
        assert_eq!(expression_type("1.5"), Ok(Type::Decimal));
        assert_eq!(expression_type("'c'"), Ok(Type::Character));
        assert_eq!(expression_type("\"s\""), Ok(Type::String));
    }

    #[test]
    fn test_logical_operators() {
        assert_eq!(expression_type("TRUE && FALSE"), Ok(Type::Boolean));
        assert_eq!(expression_type("TRUE || x < 1"), Ok(Type::Boolean));
        assert!(matches!(
            expression_type("TRUE || 1"),
            Err(AnalyzeError::InvalidOperands { .. })
        ));
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(expression_type("x < 1"), Ok(Type::Boolean));
        assert_eq!(expression_type("s == \"a\""), Ok(Type::Boolean));
        assert_eq!(expression_type("'a' != 'b'"), Ok(Type::Boolean));
        assert_eq!(expression_type("d > 1.0"), Ok(Type::Boolean));
        assert!(expression_type("x < d").is_err());
        assert!(expression_type("NIL == NIL").is_err());
    }

    #[test]
    fn test_additive_operators() {
        assert_eq!(expression_type("x + 1"), Ok(Type::Integer));
        assert_eq!(expression_type("d + 1.0"), Ok(Type::Decimal));
        assert_eq!(expression_type("s + 1"), Ok(Type::String));
        assert_eq!(expression_type("1.5 + s"), Ok(Type::String));
        assert_eq!(
            expression_type("x + d"),
            Err(AnalyzeError::InvalidOperands {
                operator: BinaryOperator::Add,
                left: Type::Integer,
                right: Type::Decimal,
            })
        );
        assert!(expression_type("TRUE + FALSE").is_err());
    }

    #[test]
    fn test_arithmetic_operators() {
        assert_eq!(expression_type("x - 1 * 2 / 3"), Ok(Type::Integer));
        assert_eq!(expression_type("d / 2.0"), Ok(Type::Decimal));
        assert!(expression_type("s - s").is_err());
        assert!(expression_type("d * 2").is_err());
    }

    #[test]
    fn test_power_operator() {
        assert_eq!(expression_type("x ^ 2"), Ok(Type::Integer));
        assert_eq!(expression_type("d ^ 2"), Ok(Type::Decimal));
        assert!(expression_type("x ^ 2.0").is_err());
        assert!(expression_type("s ^ 2").is_err());
    }

    #[test]
    fn test_group_must_wrap_binary() {
        assert_eq!(expression_type("(x + 1)"), Ok(Type::Integer));
        assert_eq!(expression_type("(x)"), Err(AnalyzeError::InvalidGroup));
    }

    #[test]
    fn test_undeclared_names() {
        assert_eq!(
            expression_type("y"),
            Err(AnalyzeError::UndeclaredVariable("y".to_string()))
        );
        assert_eq!(
            expression_type("print(1, 2)"),
            Err(AnalyzeError::UndeclaredFunction("print".to_string(), 2))
        );
        assert_eq!(expression_type("print(x)"), Ok(Type::Nil));
    }

    #[test]
    fn test_globals_are_visited_in_order() {
        assert_eq!(
            check("VAL a = b; VAL b = 1; FUN main(): Integer DO RETURN a; END").unwrap_err(),
            AnalyzeError::UndeclaredVariable("b".to_string())
        );
        assert_eq!(
            check("VAL a = f(); FUN f(): Integer DO RETURN 1; END FUN main(): Integer DO RETURN a; END")
                .unwrap_err(),
            AnalyzeError::UndeclaredFunction("f".to_string(), 0)
        );
    }

    #[test]
    fn test_mutual_recursion() {
        check(
            "FUN even(n: Integer): Boolean DO
                IF n == 0 DO RETURN TRUE; END
                RETURN odd(n - 1);
            END
            FUN odd(n: Integer): Boolean DO
                IF n == 0 DO RETURN FALSE; END
                RETURN even(n - 1);
            END
            FUN main(): Integer DO RETURN 0; END",
        )
        .unwrap();
    }

    #[test]
    fn test_call_arguments_are_checked() {
        assert_eq!(
            check(
                "FUN f(n: Integer): Integer DO RETURN n; END
                FUN main(): Integer DO RETURN f(1.0); END"
            )
            .unwrap_err(),
            mismatch(Type::Integer, Type::Decimal)
        );
    }

    #[test]
    fn test_declarations() {
        assert_eq!(
            check("FUN main(): Integer DO LET y; RETURN 0; END").unwrap_err(),
            AnalyzeError::MissingType("y".to_string())
        );
        assert_eq!(
            check("FUN main(): Integer DO LET y: Integer = \"s\"; RETURN 0; END").unwrap_err(),
            mismatch(Type::Integer, Type::String)
        );
        check("FUN main(): Integer DO LET y: Comparable = 1; LET z = 2; RETURN z; END").unwrap();
    }

    #[test]
    fn test_assignments() {
        assert_eq!(
            check("VAL k = 1; FUN main(): Integer DO k = 2; RETURN k; END").unwrap_err(),
            AnalyzeError::ImmutableAssignment("k".to_string())
        );
        assert_eq!(
            check("VAR v = 1; FUN main(): Integer DO v = 2.0; RETURN v; END").unwrap_err(),
            mismatch(Type::Integer, Type::Decimal)
        );
        assert_eq!(
            check("FUN main(): Integer DO print(1) = 2; RETURN 0; END").unwrap_err(),
            AnalyzeError::InvalidAssignmentTarget
        );
    }

    #[test]
    fn test_expression_statement_must_be_call() {
        assert_eq!(
            check("FUN main(): Integer DO 1 + 2; RETURN 0; END").unwrap_err(),
            AnalyzeError::ExpressionStatement
        );
    }

    #[test]
    fn test_if_and_while_conditions() {
        assert_eq!(
            check("FUN main(): Integer DO IF 1 DO print(1); END RETURN 0; END").unwrap_err(),
            mismatch(Type::Boolean, Type::Integer)
        );
        assert_eq!(
            check("FUN main(): Integer DO IF TRUE DO ELSE print(1); END RETURN 0; END")
                .unwrap_err(),
            AnalyzeError::EmptyIf
        );
        assert_eq!(
            check("FUN main(): Integer DO WHILE NIL DO END RETURN 0; END").unwrap_err(),
            mismatch(Type::Boolean, Type::Nil)
        );
    }

    #[test]
    fn test_branch_scopes_do_not_leak() {
        assert_eq!(
            check(
                "FUN main(): Integer DO
                    IF TRUE DO LET y = 1; END
                    RETURN y;
                END"
            )
            .unwrap_err(),
            AnalyzeError::UndeclaredVariable("y".to_string())
        );
    }

    #[test]
    fn test_switch_cases() {
        check(
            "FUN main(): Integer DO
                SWITCH 'a' CASE 'a': print(1); CASE 'b': print(2); DEFAULT print(3); END
                RETURN 0;
            END",
        )
        .unwrap();
        assert_eq!(
            check(
                "FUN main(): Integer DO
                    SWITCH 1 CASE \"one\": print(1); DEFAULT print(3); END
                    RETURN 0;
                END"
            )
            .unwrap_err(),
            mismatch(Type::Integer, Type::String)
        );
    }

    #[test]
    fn test_misplaced_default() {
        let context = Context::new(Analyzer::new().scope().clone());
        let mut condition = Expression::literal(Literal::Integer(1));
        let mut cases = vec![
            Case {
                value: None,
                statements: vec![],
            },
            Case {
                value: Some(Expression::literal(Literal::Integer(1))),
                statements: vec![],
            },
        ];
        assert_eq!(
            switch(&context, &mut condition, &mut cases),
            Err(AnalyzeError::MisplacedDefault)
        );
    }

    #[test]
    fn test_return_type() {
        assert_eq!(
            check(
                "FUN f(): String DO RETURN 1; END
                FUN main(): Integer DO RETURN 0; END"
            )
            .unwrap_err(),
            mismatch(Type::String, Type::Integer)
        );
        assert_eq!(
            check(
                "FUN f() DO RETURN 1; END
                FUN main(): Integer DO RETURN 0; END"
            )
            .unwrap_err(),
            mismatch(Type::Nil, Type::Integer)
        );
    }

    #[test]
    fn test_typed_function_must_return() {
        assert_eq!(
            check(
                "FUN f(): Integer DO print(0); END
                FUN main(): Integer DO RETURN f() + 1; END"
            )
            .unwrap_err(),
            AnalyzeError::MissingReturn("f".to_string())
        );
        assert_eq!(
            check(
                "FUN f(n: Integer): Integer DO
                    WHILE n > 0 DO RETURN n; END
                END
                FUN main(): Integer DO RETURN 0; END"
            )
            .unwrap_err(),
            AnalyzeError::MissingReturn("f".to_string())
        );
        assert_eq!(
            check(
                "FUN f(n: Integer): Integer DO
                    IF n > 0 DO RETURN n; END
                END
                FUN main(): Integer DO RETURN 0; END"
            )
            .unwrap_err(),
            AnalyzeError::MissingReturn("f".to_string())
        );
        assert_eq!(
            check("FUN main(): Integer DO LET x = 1; END").unwrap_err(),
            AnalyzeError::MissingReturn("main".to_string())
        );
    }

    #[test]
    fn test_every_branch_returns() {
        check(
            "FUN sign(n: Integer): Integer DO
                IF n < 0 DO RETURN -1; ELSE RETURN 1; END
            END
            FUN name(c: Character): String DO
                SWITCH c CASE 'a': RETURN \"a\"; DEFAULT RETURN \"?\"; END
            END
            FUN log(x: Any): Any DO print(x); END
            FUN main(): Integer DO print(name('a')); RETURN sign(2); END",
        )
        .unwrap();
        assert_eq!(
            check(
                "FUN name(c: Character): String DO
                    SWITCH c CASE 'a': RETURN \"a\"; DEFAULT print(c); END
                END
                FUN main(): Integer DO RETURN 0; END"
            )
            .unwrap_err(),
            AnalyzeError::MissingReturn("name".to_string())
        );
    }

    #[test]
    fn test_uninitialized_variables() {
        let source = check("VAR v: Integer; FUN main(): Integer DO RETURN v + 1; END").unwrap();
        assert_eq!(source.globals[0].variable.as_ref().map(|v| v.ty), Some(Type::Integer));
        check("FUN main(): Integer DO LET s: String; print(s); RETURN 0; END").unwrap();
        assert_eq!(
            check("VAR c: Comparable; FUN main(): Integer DO RETURN 0; END").unwrap_err(),
            AnalyzeError::MissingInitializer("c".to_string())
        );
        assert_eq!(
            check("FUN main(): Integer DO LET c: Comparable; RETURN 0; END").unwrap_err(),
            AnalyzeError::MissingInitializer("c".to_string())
        );
    }

    #[test]
    fn test_lists() {
        let source = check(
            "LIST l: Integer = [1, 2, 3];
            FUN main(): Integer DO l[1] = 9; RETURN l[1]; END",
        )
        .unwrap();
        assert_eq!(
            source.globals[0].value.as_ref().and_then(|value| value.ty),
            Some(Type::Integer)
        );

        check("LIST l = [1, 2]; FUN main(): Integer DO RETURN l[0]; END").unwrap();

        assert_eq!(
            check("LIST l: Integer = [1, 2.0]; FUN main(): Integer DO RETURN 0; END").unwrap_err(),
            mismatch(Type::Integer, Type::Decimal)
        );
        assert_eq!(
            check("LIST l = []; FUN main(): Integer DO RETURN 0; END").unwrap_err(),
            AnalyzeError::EmptyList("l".to_string())
        );
        assert_eq!(
            check("LIST l = [1]; FUN main(): Integer DO RETURN l; END").unwrap_err(),
            AnalyzeError::UnsubscriptedList("l".to_string())
        );
        assert_eq!(
            check("VAR v = 1; FUN main(): Integer DO RETURN v[0]; END").unwrap_err(),
            AnalyzeError::NotAList("v".to_string())
        );
        assert_eq!(
            check("LIST l = [1]; FUN main(): Integer DO RETURN l[TRUE]; END").unwrap_err(),
            mismatch(Type::Integer, Type::Boolean)
        );
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(
            check("VAR v: Number = 1; FUN main(): Integer DO RETURN 0; END").unwrap_err(),
            AnalyzeError::UnknownType("Number".to_string())
        );
    }

    #[test]
    fn test_redeclaration() {
        assert_eq!(
            check("VAR v = 1; VAR v = 2; FUN main(): Integer DO RETURN 0; END").unwrap_err(),
            AnalyzeError::Scope(ScopeError::VariableRedeclaration("v".to_string()))
        );
    }
}
