//! AST model produced by the parser.
//!
//! Expressions are shared immutable values behind [`Rc`]; every node carries
//! a dense [`ExprId`] assigned in construction order, which is what the
//! later stages key their per-expression metadata on.

use std::{fmt::Display, rc::Rc};

/// Dense, per-parse identifier of an expression node.
pub type ExprId = i64;

/// Name given to the synthesized wrapper around a bare top level expression.
pub const ANON_FN_NAME: &str = "__anon_expr";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Real(f64),
    Integer(i64),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Var {
        name: String,
        subscript: Option<i64>,
    },
    List(Vec<Rc<Expr>>),
    Binary {
        op: char,
        lhs: Rc<Expr>,
        rhs: Rc<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Rc<Expr>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

/// A user written type annotation, e.g. `list<integer>`. Resolution into a
/// semantic type happens in the typechecker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDesc {
    pub name: String,
    pub template_args: Vec<TypeDesc>,
}

impl TypeDesc {
    pub fn plain(name: impl ToString) -> Self {
        TypeDesc {
            name: name.to_string(),
            template_args: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub type_desc: TypeDesc,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub args: Vec<Arg>,
    pub ret_type: Option<TypeDesc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub sig: Signature,
    pub body: Rc<Expr>,
}

impl Function {
    pub fn is_anonymous(&self) -> bool {
        self.sig.name == ANON_FN_NAME
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TopLevelUnit {
    Extern(Signature),
    Function(Function),
}

pub type TopLevel = Vec<TopLevelUnit>;

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Real(value) => write!(f, "{value:?}"),
            Literal::Integer(value) => write!(f, "{value}i"),
            Literal::Boolean(true) => f.write_str("True"),
            Literal::Boolean(false) => f.write_str("False"),
        }
    }
}

/// Prints the expression as parseable source. Binary expressions are fully
/// parenthesized, so precedence survives the trip through text.
impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExprKind::Literal(lit) => write!(f, "{lit}"),
            ExprKind::Var {
                name,
                subscript: None,
            } => f.write_str(name),
            ExprKind::Var {
                name,
                subscript: Some(index),
            } => write!(f, "{name}[{index}i]"),
            ExprKind::List(elems) => {
                f.write_str("[")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{elem}")?;
                }
                f.write_str("]")
            }
            ExprKind::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            ExprKind::Call { callee, args } => {
                write!(f, "{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl Display for TypeDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)?;
        if !self.template_args.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.template_args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", arg.type_desc, arg.name)?;
        }
        f.write_str(")")?;
        if let Some(ret_type) = &self.ret_type {
            write!(f, ": {ret_type}")?;
        }
        Ok(())
    }
}

impl Display for TopLevelUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopLevelUnit::Extern(sig) => write!(f, "extern {sig};"),
            TopLevelUnit::Function(fun) if fun.is_anonymous() => write!(f, "{};", fun.body),
            TopLevelUnit::Function(fun) => write!(f, "def {} {};", fun.sig, fun.body),
        }
    }
}
