use std::fmt::Display;

/// The closed type catalog. `Any` and `Comparable` only ever appear as
/// assignability targets; no value or expression has them as its concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Any,
    Comparable,
    Nil,
    Boolean,
    Integer,
    Decimal,
    Character,
    String,
}

impl Type {
    pub fn from_name(name: &str) -> Option<Type> {
        match name {
            "Any" => Some(Type::Any),
            "Comparable" => Some(Type::Comparable),
            "Nil" => Some(Type::Nil),
            "Boolean" => Some(Type::Boolean),
            "Integer" => Some(Type::Integer),
            "Decimal" => Some(Type::Decimal),
            "Character" => Some(Type::Character),
            "String" => Some(Type::String),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Type::Any => "Any",
            Type::Comparable => "Comparable",
            Type::Nil => "Nil",
            Type::Boolean => "Boolean",
            Type::Integer => "Integer",
            Type::Decimal => "Decimal",
            Type::Character => "Character",
            Type::String => "String",
        }
    }

    pub fn is_comparable(&self) -> bool {
        matches!(
            self,
            Type::Boolean | Type::Integer | Type::Decimal | Type::Character | Type::String
        )
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Whether a value of type `source` may flow into a slot of type `target`.
pub fn assignable(target: Type, source: Type) -> bool {
    match target {
        Type::Any => true,
        Type::Comparable => source.is_comparable(),
        _ => target == source,
    }
}
