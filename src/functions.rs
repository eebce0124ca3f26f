//! Static, versioned table of builtin function signatures.
//!
//! Every builtin takes exactly one argument. The type checker looks calls up
//! here; names missing from the table are rejected.

use crate::error;
use crate::types::{DataType, TypeClass};

/// Bumped whenever a signature is added, removed or changed
pub const BUILTINS_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: &'static str,
    pub param: TypeClass,
    pub result: DataType,
}

const fn sig(name: &'static str, param: TypeClass, result: DataType) -> FunctionSignature {
    FunctionSignature {
        name,
        param,
        result,
    }
}

pub static BUILTINS: &[FunctionSignature] = &[
    sig("abs", TypeClass::Number, DataType::Number),
    sig("bool", TypeClass::Primitive, DataType::Bool),
    sig("int", TypeClass::Primitive, DataType::Number),
    sig("float", TypeClass::Primitive, DataType::Number),
    sig("str", TypeClass::Primitive, DataType::String),
    sig("len", TypeClass::Collection, DataType::Number),
    sig("sum", TypeClass::Collection, DataType::Number),
    sig("prod", TypeClass::Collection, DataType::Number),
    sig("sqrt", TypeClass::Number, DataType::Number),
    sig("ceil", TypeClass::Number, DataType::Number),
    sig("floor", TypeClass::Number, DataType::Number),
    sig("log", TypeClass::Number, DataType::Number),
    sig("sin", TypeClass::Number, DataType::Number),
    sig("cos", TypeClass::Number, DataType::Number),
    sig("tan", TypeClass::Number, DataType::Number),
    sig("asin", TypeClass::Number, DataType::Number),
    sig("acos", TypeClass::Number, DataType::Number),
    sig("atan", TypeClass::Number, DataType::Number),
    sig("deg", TypeClass::Number, DataType::Number),
    sig("rad", TypeClass::Number, DataType::Number),
    sig("max", TypeClass::Collection, DataType::Number),
    sig("min", TypeClass::Collection, DataType::Number),
    sig("gcd", TypeClass::Collection, DataType::Number),
    // orientation of a quaternion message
    sig("roll", TypeClass::Message, DataType::Number),
    sig("pitch", TypeClass::Message, DataType::Number),
    sig("yaw", TypeClass::Message, DataType::Number),
];

pub fn lookup(name: &str) -> Option<&'static FunctionSignature> {
    BUILTINS.iter().find(|s| s.name == name)
}

/// Suggest similar builtin names for an unknown function
pub fn suggest_functions(name: &str) -> Option<String> {
    error::suggest(name, BUILTINS.iter().map(|s| s.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn test_names_are_unique() {
        assert_eq!(
            BUILTINS.iter().map(|s| s.name).unique().count(),
            BUILTINS.len()
        );
    }

    #[test]
    fn test_lookup() {
        let len = lookup("len").unwrap();
        assert_eq!(len.param, TypeClass::Collection);
        assert_eq!(len.result, DataType::Number);
        assert!(lookup("length").is_none());
    }

    #[test]
    fn test_suggestions() {
        let help = suggest_functions("sqr").unwrap();
        assert!(help.contains("sqrt"));
        assert!(suggest_functions("frobnicate").is_none());
    }
}
