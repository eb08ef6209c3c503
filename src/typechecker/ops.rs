//! Built-in operator registry.
//!
//! A process-wide immutable table mapping an operator key plus the exact
//! operand types to the operation's return type. Single-character keys are
//! surfaced through binary expressions, named keys (`if`, `and`, `or`)
//! through calls. Lookup never converts operands; a near miss is a miss.

use std::{error::Error, fmt::Display};

use once_cell::sync::Lazy;

use super::types::Type;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpKey {
    Op(char),
    Name(String),
}

impl OpKey {
    pub fn named(name: impl ToString) -> Self {
        OpKey::Name(name.to_string())
    }
}

impl Display for OpKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKey::Op(op) => write!(f, "{op}"),
            OpKey::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpInfo {
    pub key: OpKey,
    pub args: Vec<Type>,
    pub ret_type: Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpError(pub String);

impl Display for OpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for OpError {}

static OPS: Lazy<Vec<OpInfo>> = Lazy::new(|| {
    let real = || Type::Real;
    let integer = || Type::Integer;
    let boolean = || Type::Boolean;

    let mut ops = vec![];

    for op in ['+', '-', '*'] {
        ops.push(OpInfo {
            key: OpKey::Op(op),
            args: vec![real(), real()],
            ret_type: real(),
        });
        ops.push(OpInfo {
            key: OpKey::Op(op),
            args: vec![integer(), integer()],
            ret_type: integer(),
        });
    }

    for op in ['<', '>'] {
        ops.push(OpInfo {
            key: OpKey::Op(op),
            args: vec![real(), real()],
            ret_type: boolean(),
        });
        ops.push(OpInfo {
            key: OpKey::Op(op),
            args: vec![integer(), integer()],
            ret_type: boolean(),
        });
    }

    for name in ["or", "and"] {
        ops.push(OpInfo {
            key: OpKey::named(name),
            args: vec![boolean(), boolean()],
            ret_type: boolean(),
        });
    }

    for scalar in [real(), integer()] {
        ops.push(OpInfo {
            key: OpKey::named("if"),
            args: vec![boolean(), scalar.clone(), scalar.clone()],
            ret_type: scalar,
        });
    }

    ops
});

/// Finds the registered operation for `key` applied to exactly `operands`.
pub fn lookup(key: &OpKey, operands: &[Type]) -> Result<&'static OpInfo, OpError> {
    let mut key_seen = false;
    for op in OPS.iter() {
        if op.key != *key {
            continue;
        }
        key_seen = true;
        if op.args.as_slice() == operands {
            return Ok(op);
        }
    }

    if key_seen {
        let operands = operands
            .iter()
            .map(Type::describe)
            .collect::<Vec<_>>()
            .join(",");
        Err(OpError(format!(
            "Op not found: {key} with operands of type {operands}"
        )))
    } else {
        Err(OpError(format!("Op not found: {key}")))
    }
}

/// Canonical composite key of an operation, shared with the code
/// generator's IR builder table (e.g. `op+__realreal`, `if__booleanintegerinteger`).
pub fn composite_key(key: &OpKey, operands: &[Type]) -> String {
    let mut composed = match key {
        OpKey::Op(op) => format!("op{op}__"),
        OpKey::Name(name) => format!("{name}__"),
    };
    for operand in operands {
        composed.push_str(&operand.mangled());
    }
    composed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_arithmetic() {
        let info = lookup(&OpKey::Op('+'), &[Type::Real, Type::Real]).unwrap();
        assert_eq!(Type::Real, info.ret_type);

        let info = lookup(&OpKey::Op('*'), &[Type::Integer, Type::Integer]).unwrap();
        assert_eq!(Type::Integer, info.ret_type);
    }

    #[test]
    fn test_lookup_comparison_yields_boolean() {
        for op in ['<', '>'] {
            for ty in [Type::Real, Type::Integer] {
                let info = lookup(&OpKey::Op(op), &[ty.clone(), ty]).unwrap();
                assert_eq!(Type::Boolean, info.ret_type);
            }
        }
    }

    #[test]
    fn test_lookup_named_operators() {
        for name in ["and", "or"] {
            let info = lookup(&OpKey::named(name), &[Type::Boolean, Type::Boolean]).unwrap();
            assert_eq!(Type::Boolean, info.ret_type);
        }

        let info = lookup(
            &OpKey::named("if"),
            &[Type::Boolean, Type::Integer, Type::Integer],
        )
        .unwrap();
        assert_eq!(Type::Integer, info.ret_type);
    }

    #[test]
    fn test_lookup_requires_exact_types() {
        assert_eq!(
            Err(OpError(
                "Op not found: + with operands of type integer,real".into()
            )),
            lookup(&OpKey::Op('+'), &[Type::Integer, Type::Real])
        );
        assert_eq!(
            Err(OpError("Op not found: %".into())),
            lookup(&OpKey::Op('%'), &[Type::Real, Type::Real])
        );
        assert!(lookup(
            &OpKey::named("if"),
            &[Type::Boolean, Type::Boolean, Type::Boolean]
        )
        .is_err());
    }

    #[test]
    fn test_composite_keys() {
        assert_eq!(
            "op+__realreal",
            composite_key(&OpKey::Op('+'), &[Type::Real, Type::Real])
        );
        assert_eq!(
            "and__booleanboolean",
            composite_key(&OpKey::named("and"), &[Type::Boolean, Type::Boolean])
        );
        assert_eq!(
            "if__booleanintegerinteger",
            composite_key(
                &OpKey::named("if"),
                &[Type::Boolean, Type::Integer, Type::Integer]
            )
        );
    }
}
