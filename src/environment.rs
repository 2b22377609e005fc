use std::{cell::RefCell, collections::hash_map::Entry, fmt::Debug, rc::Rc};

use rustc_hash::FxHashMap;

/// A variable slot: the payload plus whether it may be reassigned.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding<V> {
    pub value: V,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("Variable {0} is already declared in this scope")]
    VariableRedeclaration(String),
    #[error("Function {0}/{1} is already declared in this scope")]
    FunctionRedeclaration(String, usize),
    #[error("Undeclared variable: {0}")]
    UndeclaredVariable(String),
    #[error("Cannot assign to immutable variable: {0}")]
    ImmutableAssignment(String),
}

/// One lexical frame. `V` is the variable payload and `F` the function payload,
/// so the analyzer can carry types where the interpreter carries values.
pub struct Scope<V, F> {
    variables: FxHashMap<String, Binding<V>>,
    functions: FxHashMap<(String, usize), F>,
    parent: Option<Rc<RefCell<Scope<V, F>>>>,
}

impl<V: Clone, F: Clone> Scope<V, F> {
    pub fn boxed(parent: Option<Rc<RefCell<Scope<V, F>>>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(parent)))
    }

    pub fn new(parent: Option<Rc<RefCell<Scope<V, F>>>>) -> Self {
        Self {
            variables: FxHashMap::default(),
            functions: FxHashMap::default(),
            parent,
        }
    }

    /// A parentless frame preloaded with `functions`, keyed by name and arity.
    pub fn root(functions: impl IntoIterator<Item = (String, usize, F)>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            variables: FxHashMap::default(),
            functions: functions
                .into_iter()
                .map(|(name, arity, function)| ((name, arity), function))
                .collect(),
            parent: None,
        }))
    }

    pub fn define_variable(&mut self, name: String, value: V, mutable: bool) -> Result<(), ScopeError> {
        match self.variables.entry(name) {
            Entry::Occupied(o) => Err(ScopeError::VariableRedeclaration(o.key().clone())),
            Entry::Vacant(v) => {
                v.insert(Binding { value, mutable });
                Ok(())
            }
        }
    }

    pub fn define_function(&mut self, name: String, arity: usize, function: F) -> Result<(), ScopeError> {
        match self.functions.entry((name, arity)) {
            Entry::Occupied(o) => {
                let (name, arity) = o.key().clone();
                Err(ScopeError::FunctionRedeclaration(name, arity))
            }
            Entry::Vacant(v) => {
                v.insert(function);
                Ok(())
            }
        }
    }

    /// Looks `name` up in this frame, then in each ancestor.
    pub fn lookup_variable(&self, name: &str) -> Option<Binding<V>> {
        if let Some(binding) = self.variables.get(name) {
            Some(binding.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().lookup_variable(name)
        } else {
            None
        }
    }

    pub fn lookup_function(&self, name: &str, arity: usize) -> Option<F> {
        if let Some(function) = self.functions.get(&(name.to_string(), arity)) {
            Some(function.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().lookup_function(name, arity)
        } else {
            None
        }
    }

    /// Rebinds the nearest visible `name`. Fails on unknown or immutable bindings.
    pub fn assign_variable(&mut self, name: &str, value: V) -> Result<(), ScopeError> {
        if let Some(binding) = self.variables.get_mut(name) {
            if !binding.mutable {
                return Err(ScopeError::ImmutableAssignment(name.to_string()));
            }
            binding.value = value;
            Ok(())
        } else if let Some(parent) = &self.parent {
            parent.borrow_mut().assign_variable(name, value)
        } else {
            Err(ScopeError::UndeclaredVariable(name.to_string()))
        }
    }
}

impl<V: Debug, F> Debug for Scope<V, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(format!("Scope<{:?}>", std::ptr::from_ref(self)).as_str())
            .field("variables", &self.variables)
            .field(
                "functions",
                &self.functions.keys().collect::<Vec<_>>(),
            )
            .field("parent", &self.parent.as_ref().map(|p| p.as_ptr()))
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    type TestScope = Scope<i32, &'static str>;

    #[test]
    fn test_lookup_walks_parents() {
        let root = TestScope::boxed(None);
        root.borrow_mut()
            .define_variable("x".to_string(), 1, true)
            .unwrap();
        let child = TestScope::boxed(Some(root.clone()));

        assert_eq!(
            child.borrow().lookup_variable("x"),
            Some(Binding {
                value: 1,
                mutable: true
            })
        );
        assert_eq!(child.borrow().lookup_variable("y"), None);
    }

    #[test]
    fn test_shadowing_in_child() {
        let root = TestScope::boxed(None);
        root.borrow_mut()
            .define_variable("x".to_string(), 1, true)
            .unwrap();
        let child = TestScope::boxed(Some(root.clone()));
        child
            .borrow_mut()
            .define_variable("x".to_string(), 2, true)
            .unwrap();

        assert_eq!(child.borrow().lookup_variable("x").unwrap().value, 2);
        assert_eq!(root.borrow().lookup_variable("x").unwrap().value, 1);
    }

    #[test]
    fn test_redeclaration_in_same_scope() {
        let mut scope = TestScope::new(None);
        scope.define_variable("x".to_string(), 1, true).unwrap();
        assert_eq!(
            scope.define_variable("x".to_string(), 2, true),
            Err(ScopeError::VariableRedeclaration("x".to_string()))
        );
    }

    #[test]
    fn test_functions_keyed_by_arity() {
        let mut scope = TestScope::new(None);
        scope.define_function("f".to_string(), 0, "f/0").unwrap();
        scope.define_function("f".to_string(), 1, "f/1").unwrap();

        assert_eq!(scope.lookup_function("f", 0), Some("f/0"));
        assert_eq!(scope.lookup_function("f", 1), Some("f/1"));
        assert_eq!(scope.lookup_function("f", 2), None);
        assert_eq!(
            scope.define_function("f".to_string(), 1, "again"),
            Err(ScopeError::FunctionRedeclaration("f".to_string(), 1))
        );
    }

    #[test]
    fn test_root_is_seeded_with_functions() {
        let root = TestScope::root([("print".to_string(), 1, "builtin")]);
        let child = TestScope::boxed(Some(root.clone()));

        assert_eq!(child.borrow().lookup_function("print", 1), Some("builtin"));
        assert_eq!(child.borrow().lookup_function("print", 0), None);
        assert_eq!(
            root.borrow_mut()
                .define_function("print".to_string(), 1, "again"),
            Err(ScopeError::FunctionRedeclaration("print".to_string(), 1))
        );
    }

    #[test]
    fn test_assign_reaches_defining_scope() {
        let root = TestScope::boxed(None);
        root.borrow_mut()
            .define_variable("x".to_string(), 1, true)
            .unwrap();
        root.borrow_mut()
            .define_variable("k".to_string(), 1, false)
            .unwrap();
        let child = TestScope::boxed(Some(root.clone()));

        child.borrow_mut().assign_variable("x", 5).unwrap();
        assert_eq!(root.borrow().lookup_variable("x").unwrap().value, 5);
        assert_eq!(
            child.borrow_mut().assign_variable("k", 5),
            Err(ScopeError::ImmutableAssignment("k".to_string()))
        );
        assert_eq!(
            child.borrow_mut().assign_variable("z", 5),
            Err(ScopeError::UndeclaredVariable("z".to_string()))
        );
    }
}
