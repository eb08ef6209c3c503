//! Semantic type model.
//!
//! Types are small immutable trees. Every type has a canonical mangled
//! string and two types are equal exactly when their manglings are equal,
//! which the derived structural equality reproduces.

use std::{error::Error, fmt::Display};

use crate::parser::ast::TypeDesc;

use super::error::{TypeCheckError, UndefinedType};

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Type {
    /// 64-bit IEEE 754 floating point primitive
    Real,
    /// 64-bit signed integer primitive
    Integer,
    /// Boolean truth value primitive
    Boolean,
    /// Homogeneous heap allocated sequence of one element type
    List(Box<Type>),
    /// Function signature with return type and ordered argument types
    Function { ret: Box<Type>, args: Vec<Type> },
}

impl Type {
    /// Human readable spelling, used in diagnostics. Matches the surface
    /// syntax of type annotations.
    pub fn describe(&self) -> String {
        match self {
            Type::Real => "real".into(),
            Type::Integer => "integer".into(),
            Type::Boolean => "boolean".into(),
            Type::List(elem) => format!("list<{}>", elem.describe()),
            Type::Function { ret, args } => {
                let mut parts = vec![ret.describe()];
                parts.extend(args.iter().map(Type::describe));
                format!("fun<{}>", parts.join(", "))
            }
        }
    }

    /// Canonical mangled form; the definition of type equality.
    pub fn mangled(&self) -> String {
        match self {
            Type::Real => "real".into(),
            Type::Integer => "integer".into(),
            Type::Boolean => "boolean".into(),
            Type::List(elem) => format!("__list_{}", elem.mangled()),
            Type::Function { ret, args } => {
                let args = args
                    .iter()
                    .map(Type::mangled)
                    .collect::<Vec<_>>()
                    .join("_");
                format!("__function__{args}___{}", ret.mangled())
            }
        }
    }

    /// The type a call of this value produces, if it is callable at all.
    pub fn return_type(&self) -> Option<&Type> {
        match self {
            Type::Function { ret, .. } => Some(ret),
            _ => None,
        }
    }

    /// The element type a subscript of this value produces.
    pub fn subscripted_type(&self) -> Option<&Type> {
        match self {
            Type::List(elem) => Some(elem),
            _ => None,
        }
    }

    /// Checks the given argument types against this function type and
    /// yields the return type on an exact element-wise match.
    pub fn callable(&self, given: &[Type]) -> Option<&Type> {
        match self {
            Type::Function { ret, args } if args.as_slice() == given => Some(ret),
            _ => None,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub type_desc: TypeDesc,
}

impl Display for TypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown type: {}", self.type_desc)
    }
}

impl Error for TypeError {}

impl From<TypeError> for TypeCheckError {
    fn from(value: TypeError) -> Self {
        TypeCheckError::UndefinedType(UndefinedType {
            type_desc: value.type_desc,
        })
    }
}

/// Builds a semantic type from a user written annotation. Recognised names
/// are `real`, `integer` and `boolean` (no template arguments), `list`
/// (one) and `fun` (return type first, then argument types).
impl TryFrom<&TypeDesc> for Type {
    type Error = TypeError;

    fn try_from(desc: &TypeDesc) -> Result<Self, Self::Error> {
        let err = || TypeError {
            type_desc: desc.clone(),
        };

        match desc.name.as_str() {
            "real" | "integer" | "boolean" => {
                if !desc.template_args.is_empty() {
                    return Err(err());
                }
                Ok(match desc.name.as_str() {
                    "real" => Type::Real,
                    "integer" => Type::Integer,
                    _ => Type::Boolean,
                })
            }
            "list" => {
                let [elem] = desc.template_args.as_slice() else {
                    return Err(err());
                };
                Ok(Type::List(Box::new(elem.try_into()?)))
            }
            "fun" => {
                let Some((ret, args)) = desc.template_args.split_first() else {
                    return Err(err());
                };
                Ok(Type::Function {
                    ret: Box::new(ret.try_into()?),
                    args: args
                        .iter()
                        .map(Type::try_from)
                        .collect::<Result<Vec<_>, _>>()?,
                })
            }
            _ => Err(err()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(elem: Type) -> Type {
        Type::List(Box::new(elem))
    }

    #[test]
    fn test_mangling() {
        assert_eq!("real", Type::Real.mangled());
        assert_eq!("integer", Type::Integer.mangled());
        assert_eq!("boolean", Type::Boolean.mangled());
        assert_eq!("__list_integer", list_of(Type::Integer).mangled());
        assert_eq!(
            "__list___list_real",
            list_of(list_of(Type::Real)).mangled()
        );
        assert_eq!(
            "__function__real_real___real",
            Type::Function {
                ret: Box::new(Type::Real),
                args: vec![Type::Real, Type::Real],
            }
            .mangled()
        );
    }

    #[test]
    fn test_equality_follows_mangling() {
        let samples = [
            Type::Real,
            Type::Integer,
            Type::Boolean,
            list_of(Type::Real),
            list_of(Type::Integer),
            Type::Function {
                ret: Box::new(Type::Integer),
                args: vec![Type::Integer],
            },
            Type::Function {
                ret: Box::new(Type::Integer),
                args: vec![],
            },
        ];

        for lhs in &samples {
            for rhs in &samples {
                assert_eq!(
                    lhs == rhs,
                    lhs.mangled() == rhs.mangled(),
                    "equality and mangling disagree for {lhs} vs {rhs}"
                );
            }
        }
    }

    #[test]
    fn test_build_primitives() {
        assert_eq!(Ok(Type::Real), (&TypeDesc::plain("real")).try_into());
        assert_eq!(Ok(Type::Integer), (&TypeDesc::plain("integer")).try_into());
        assert_eq!(Ok(Type::Boolean), (&TypeDesc::plain("boolean")).try_into());
    }

    #[test]
    fn test_build_list() {
        let desc = TypeDesc {
            name: "list".into(),
            template_args: vec![TypeDesc::plain("integer")],
        };
        assert_eq!(Ok(list_of(Type::Integer)), (&desc).try_into());
    }

    #[test]
    fn test_build_function() {
        let desc = TypeDesc {
            name: "fun".into(),
            template_args: vec![TypeDesc::plain("real"), TypeDesc::plain("integer")],
        };
        assert_eq!(
            Ok(Type::Function {
                ret: Box::new(Type::Real),
                args: vec![Type::Integer],
            }),
            (&desc).try_into()
        );
    }

    #[test]
    fn test_build_rejects_unknown_and_misparameterized() {
        assert!(Type::try_from(&TypeDesc::plain("quux")).is_err());
        // list needs exactly one template argument
        assert!(Type::try_from(&TypeDesc::plain("list")).is_err());
        // fun needs at least a return type
        assert!(Type::try_from(&TypeDesc::plain("fun")).is_err());
        // primitives take none
        assert!(Type::try_from(&TypeDesc {
            name: "real".into(),
            template_args: vec![TypeDesc::plain("real")],
        })
        .is_err());
    }

    #[test]
    fn test_capabilities() {
        let fun = Type::Function {
            ret: Box::new(Type::Real),
            args: vec![Type::Integer],
        };
        assert_eq!(Some(&Type::Real), fun.return_type());
        assert_eq!(Some(&Type::Real), fun.callable(&[Type::Integer]));
        assert_eq!(None, fun.callable(&[Type::Real]));
        assert_eq!(None, fun.subscripted_type());

        let list = list_of(Type::Boolean);
        assert_eq!(Some(&Type::Boolean), list.subscripted_type());
        assert_eq!(None, list.return_type());
        assert_eq!(None, Type::Real.subscripted_type());
    }
}
