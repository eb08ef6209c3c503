use std::{error::Error, fmt::Display};

use crate::parser::ast::TypeDesc;

use super::{ops::OpError, types::Type};

#[derive(Debug, Clone, PartialEq)]
pub enum TypeCheckError {
    UndefinedVariable(UndefinedVariable),
    UndefinedFunction(UndefinedFunction),
    NotCallable(NotCallable),
    ArgumentMismatch(ArgumentMismatch),
    ListElementMismatch(ListElementMismatch),
    EmptyList,
    NotSubscriptable(NotSubscriptable),
    UndefinedOperator(OpError),
    ReturnTypeMismatch(ReturnTypeMismatch),
    UndefinedType(UndefinedType),
    MissingReturnType(MissingReturnType),
}

impl Display for TypeCheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeCheckError::UndefinedVariable(e) => e.fmt(f),
            TypeCheckError::UndefinedFunction(e) => e.fmt(f),
            TypeCheckError::NotCallable(e) => e.fmt(f),
            TypeCheckError::ArgumentMismatch(e) => e.fmt(f),
            TypeCheckError::ListElementMismatch(e) => e.fmt(f),
            TypeCheckError::EmptyList => {
                f.write_str("Can not infer the element type of an empty list")
            }
            TypeCheckError::NotSubscriptable(e) => e.fmt(f),
            TypeCheckError::UndefinedOperator(e) => e.fmt(f),
            TypeCheckError::ReturnTypeMismatch(e) => e.fmt(f),
            TypeCheckError::UndefinedType(e) => e.fmt(f),
            TypeCheckError::MissingReturnType(e) => e.fmt(f),
        }
    }
}

impl Error for TypeCheckError {}

impl From<OpError> for TypeCheckError {
    fn from(value: OpError) -> Self {
        TypeCheckError::UndefinedOperator(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndefinedVariable {
    pub variable_name: String,
}

impl Display for UndefinedVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Variable '{}' not found in this context",
            self.variable_name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndefinedFunction {
    pub function_name: String,
}

impl Display for UndefinedFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Function '{}' not found in this context",
            self.function_name
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotCallable {
    pub name: String,
    pub actual: Type,
}

impl Display for NotCallable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' of type '{}' is not callable", self.name, self.actual)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentMismatch {
    pub name: String,
    pub expected: Vec<Type>,
    pub given: Vec<Type>,
}

impl Display for ArgumentMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let join = |types: &[Type]| {
            types
                .iter()
                .map(Type::describe)
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "'{}' expects arguments of type ({}) but got ({})",
            self.name,
            join(&self.expected),
            join(&self.given)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListElementMismatch {
    pub expected: Type,
    pub actual: Type,
}

impl Display for ListElementMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "List elements must share one type: expected '{}' but got '{}'",
            self.expected, self.actual
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotSubscriptable {
    pub name: String,
    pub actual: Type,
}

impl Display for NotSubscriptable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' of type '{}' is not subscriptable",
            self.name, self.actual
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnTypeMismatch {
    pub function_name: String,
    pub declared: Type,
    pub inferred: Type,
}

impl Display for ReturnTypeMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' declares return type '{}' but its body has type '{}'",
            self.function_name, self.declared, self.inferred
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndefinedType {
    pub type_desc: TypeDesc,
}

impl Display for UndefinedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown type: {}", self.type_desc)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingReturnType {
    pub function_name: String,
}

impl Display for MissingReturnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "extern '{}' requires an explicit return type",
            self.function_name
        )
    }
}
