//! Recursive descent parser for Conflake.
//!
//! The grammar is the classic precedence climbing shape: a `primary`
//! production for atoms and a right-folding binop loop driven by a fixed
//! precedence table. The word operators `and` and `or` participate in the
//! binop loop but lower to [`ExprKind::Call`] nodes, which is also how the
//! built-in operator table dispatches them later.
//!
//! The parser owns expression allocation: every node receives the next
//! value of a per-parse counter, so the IDs of a parsed top level are
//! exactly `0..n`.

pub mod ast;

use std::{error::Error, fmt::Display, rc::Rc};

use crate::lexer::{Keyword, Token};

use self::ast::{
    Arg, Expr, ExprId, ExprKind, Function, Literal, Signature, TopLevel, TopLevelUnit, TypeDesc,
    ANON_FN_NAME,
};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    fn new(message: impl ToString) -> Self {
        ParseError {
            message: message.to_string(),
        }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ParseError {}

type ParseResult<T> = Result<T, ParseError>;

/// Binding power of a token in binop position; -1 ends the expression.
fn precedence(token: &Token) -> i32 {
    match token {
        Token::Operator('<') | Token::Operator('>') => 10,
        Token::Operator('+') | Token::Operator('-') => 20,
        Token::Operator('*') => 40,
        Token::Identifier(word) if word == "and" || word == "or" => 5,
        _ => -1,
    }
}

pub fn parse(tokens: &[Token]) -> ParseResult<TopLevel> {
    Parser::new(tokens).parse_top_level()
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    next_id: ExprId,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            next_id: 0,
        }
    }

    fn current(&self) -> &Token {
        static EOF: Token = Token::Eof;
        self.tokens.get(self.pos).unwrap_or(&EOF)
    }

    fn eat(&mut self) {
        self.pos += 1;
    }

    fn expect_op(&mut self, op: char) -> ParseResult<()> {
        if !self.current().is_op(op) {
            return Err(ParseError::new(format!(
                "expected '{op}' but found {}",
                self.current()
            )));
        }
        self.eat();
        Ok(())
    }

    fn alloc(&mut self, kind: ExprKind) -> Rc<Expr> {
        let id = self.next_id;
        self.next_id += 1;
        Rc::new(Expr { id, kind })
    }

    /// top := (extern | definition | ';' | toplevel_expr)*
    fn parse_top_level(mut self) -> ParseResult<TopLevel> {
        let mut top_level = vec![];
        loop {
            match self.current() {
                Token::Eof => return Ok(top_level),
                Token::Keyword(Keyword::Def) => {
                    self.eat();
                    let sig = self.parse_prototype()?;
                    let body = self.parse_expression()?;
                    top_level.push(TopLevelUnit::Function(Function { sig, body }));
                }
                Token::Keyword(Keyword::Extern) => {
                    self.eat();
                    top_level.push(TopLevelUnit::Extern(self.parse_prototype()?));
                }
                Token::Operator(';') => self.eat(),
                _ => {
                    // A bare expression becomes the body of a synthesized
                    // anonymous zero-argument function.
                    let body = self.parse_expression()?;
                    let sig = Signature {
                        name: ANON_FN_NAME.into(),
                        args: vec![],
                        ret_type: None,
                    };
                    top_level.push(TopLevelUnit::Function(Function { sig, body }));
                }
            }
        }
    }

    /// expression := primary (binop primary)*
    fn parse_expression(&mut self) -> ParseResult<Rc<Expr>> {
        let lhs = self.parse_primary()?;
        self.parse_binop_rhs(0, lhs)
    }

    fn parse_binop_rhs(&mut self, expr_prec: i32, mut lhs: Rc<Expr>) -> ParseResult<Rc<Expr>> {
        loop {
            let tok_prec = precedence(self.current());
            if tok_prec < expr_prec {
                return Ok(lhs);
            }

            let op = self.current().clone();
            self.eat();

            let mut rhs = self.parse_primary()?;

            // Let a tighter-binding follow-up operator take the rhs first.
            let next_prec = precedence(self.current());
            if tok_prec < next_prec {
                rhs = self.parse_binop_rhs(tok_prec + 1, rhs)?;
            }

            lhs = match op {
                Token::Operator(op) => self.alloc(ExprKind::Binary { op, lhs, rhs }),
                Token::Identifier(word) => self.alloc(ExprKind::Call {
                    callee: word,
                    args: vec![lhs, rhs],
                }),
                _ => unreachable!("only operator tokens carry a precedence"),
            };
        }
    }

    /// primary := parenexpr | list | identifierexpr | literal
    fn parse_primary(&mut self) -> ParseResult<Rc<Expr>> {
        match self.current().clone() {
            Token::Operator('(') => {
                self.eat();
                let expr = self.parse_expression()?;
                self.expect_op(')')?;
                Ok(expr)
            }
            Token::Operator('[') => self.parse_list(),
            Token::Identifier(name) => {
                self.eat();
                self.parse_identifier_expr(name)
            }
            Token::RealLit(value) => {
                self.eat();
                Ok(self.alloc(ExprKind::Literal(Literal::Real(value))))
            }
            Token::IntegerLit(value) => {
                self.eat();
                Ok(self.alloc(ExprKind::Literal(Literal::Integer(value))))
            }
            Token::BooleanLit(value) => {
                self.eat();
                Ok(self.alloc(ExprKind::Literal(Literal::Boolean(value))))
            }
            token => Err(ParseError::new(format!(
                "unknown token when expecting an expression: {token}"
            ))),
        }
    }

    /// list := '[' expression* ']' -- elements carry no separator
    fn parse_list(&mut self) -> ParseResult<Rc<Expr>> {
        self.eat();
        let mut elems = vec![];
        while !self.current().is_op(']') {
            if *self.current() == Token::Eof {
                return Err(ParseError::new("expected ']' but found <eof>"));
            }
            elems.push(self.parse_expression()?);
        }
        self.eat();
        Ok(self.alloc(ExprKind::List(elems)))
    }

    /// identifierexpr := ident | ident '(' args ')' | ident '[' number ']'
    fn parse_identifier_expr(&mut self, name: String) -> ParseResult<Rc<Expr>> {
        if self.current().is_op('(') {
            self.eat();
            let mut args = vec![];
            if !self.current().is_op(')') {
                loop {
                    args.push(self.parse_expression()?);
                    if self.current().is_op(')') {
                        break;
                    }
                    if !self.current().is_op(',') {
                        return Err(ParseError::new(format!(
                            "Expected ')' or ',' in argument list, found {}",
                            self.current()
                        )));
                    }
                    self.eat();
                }
            }
            self.eat();
            return Ok(self.alloc(ExprKind::Call { callee: name, args }));
        }

        if self.current().is_op('[') {
            self.eat();
            let subscript = match self.current() {
                Token::IntegerLit(value) => *value,
                Token::RealLit(value) => *value as i64,
                token => {
                    return Err(ParseError::new(format!(
                        "Expected number in subscript, found {token}"
                    )))
                }
            };
            self.eat();
            self.expect_op(']')?;
            return Ok(self.alloc(ExprKind::Var {
                name,
                subscript: Some(subscript),
            }));
        }

        Ok(self.alloc(ExprKind::Var {
            name,
            subscript: None,
        }))
    }

    /// prototype := ident '(' [arg (',' arg)*] ')' [':' type]
    fn parse_prototype(&mut self) -> ParseResult<Signature> {
        let Token::Identifier(name) = self.current().clone() else {
            return Err(ParseError::new(format!(
                "Expected function name in prototype, found {}",
                self.current()
            )));
        };
        self.eat();

        if !self.current().is_op('(') {
            return Err(ParseError::new(format!(
                "Expected '(' in prototype, found {}",
                self.current()
            )));
        }
        self.eat();

        let mut args = vec![];
        if !self.current().is_op(')') {
            loop {
                let type_desc = self.parse_type()?;
                let Token::Identifier(arg_name) = self.current().clone() else {
                    return Err(ParseError::new(format!(
                        "Expected argument name in prototype, found {}",
                        self.current()
                    )));
                };
                self.eat();
                args.push(Arg {
                    type_desc,
                    name: arg_name,
                });

                if self.current().is_op(')') {
                    break;
                }
                if !self.current().is_op(',') {
                    return Err(ParseError::new(format!(
                        "Expected ')' or ',' in prototype, found {}",
                        self.current()
                    )));
                }
                self.eat();
            }
        }
        self.eat();

        let ret_type = if self.current().is_op(':') {
            self.eat();
            Some(self.parse_type()?)
        } else {
            None
        };

        Ok(Signature {
            name,
            args,
            ret_type,
        })
    }

    /// type := ident ['<' type (',' type)* '>']
    fn parse_type(&mut self) -> ParseResult<TypeDesc> {
        let Token::Identifier(name) = self.current().clone() else {
            return Err(ParseError::new(format!(
                "Expected type name, found {}",
                self.current()
            )));
        };
        self.eat();

        let mut template_args = vec![];
        if self.current().is_op('<') {
            self.eat();
            loop {
                template_args.push(self.parse_type()?);
                if self.current().is_op('>') {
                    break;
                }
                if !self.current().is_op(',') {
                    return Err(ParseError::new(format!(
                        "expected '>' or ',' in template argument list, found {}",
                        self.current()
                    )));
                }
                self.eat();
            }
            self.eat();
        }

        Ok(TypeDesc {
            name,
            template_args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_source(source: &str) -> ParseResult<TopLevel> {
        let tokens = Lexer::new(source).lex().expect("lexing should succeed");
        parse(&tokens)
    }

    fn collect_ids(expr: &Expr, ids: &mut Vec<ExprId>) {
        ids.push(expr.id);
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Var { .. } => {}
            ExprKind::List(elems) => elems.iter().for_each(|e| collect_ids(e, ids)),
            ExprKind::Binary { lhs, rhs, .. } => {
                collect_ids(lhs, ids);
                collect_ids(rhs, ids);
            }
            ExprKind::Call { args, .. } => args.iter().for_each(|a| collect_ids(a, ids)),
        }
    }

    #[test]
    fn test_parse_empty_source() {
        assert_eq!(Ok(vec![]), parse_source(""));
        assert_eq!(Ok(vec![]), parse_source(";;;"));
    }

    #[test]
    fn test_parse_top_level_expression_is_wrapped() {
        let top_level = parse_source("4.0 + 5.0;").unwrap();

        let [TopLevelUnit::Function(fun)] = top_level.as_slice() else {
            panic!("expected a single function, got {top_level:?}");
        };
        assert_eq!(ANON_FN_NAME, fun.sig.name);
        assert!(fun.sig.args.is_empty());
        assert_eq!(None, fun.sig.ret_type);
        assert!(matches!(fun.body.kind, ExprKind::Binary { op: '+', .. }));
    }

    #[test]
    fn test_parse_precedence() {
        let top_level = parse_source("1.0 + 2.0 * x;").unwrap();

        let [TopLevelUnit::Function(fun)] = top_level.as_slice() else {
            panic!("expected a single function");
        };
        let ExprKind::Binary { op: '+', rhs, .. } = &fun.body.kind else {
            panic!("expected '+' at the root, got {:?}", fun.body.kind);
        };
        assert!(matches!(rhs.kind, ExprKind::Binary { op: '*', .. }));
    }

    #[test]
    fn test_parse_left_associativity() {
        let top_level = parse_source("1i - 2i - 3i;").unwrap();

        let [TopLevelUnit::Function(fun)] = top_level.as_slice() else {
            panic!("expected a single function");
        };
        // (1i - 2i) - 3i
        let ExprKind::Binary { op: '-', lhs, rhs } = &fun.body.kind else {
            panic!("expected '-' at the root");
        };
        assert!(matches!(lhs.kind, ExprKind::Binary { op: '-', .. }));
        assert!(matches!(
            rhs.kind,
            ExprKind::Literal(Literal::Integer(3))
        ));
    }

    #[test]
    fn test_parse_word_operators_lower_to_calls() {
        let top_level = parse_source("True and (False or True);").unwrap();

        let [TopLevelUnit::Function(fun)] = top_level.as_slice() else {
            panic!("expected a single function");
        };
        let ExprKind::Call { callee, args } = &fun.body.kind else {
            panic!("expected a call, got {:?}", fun.body.kind);
        };
        assert_eq!("and", callee);
        assert_eq!(2, args.len());
        assert!(
            matches!(&args[1].kind, ExprKind::Call { callee, .. } if callee == "or"),
            "rhs should be the 'or' call"
        );
    }

    #[test]
    fn test_parse_prototype_with_types() {
        let top_level = parse_source("def foo(real a, list<integer> xs): real a;").unwrap();

        let [TopLevelUnit::Function(fun)] = top_level.as_slice() else {
            panic!("expected a single function");
        };
        assert_eq!("foo", fun.sig.name);
        assert_eq!(
            vec![
                Arg {
                    type_desc: TypeDesc::plain("real"),
                    name: "a".into()
                },
                Arg {
                    type_desc: TypeDesc {
                        name: "list".into(),
                        template_args: vec![TypeDesc::plain("integer")],
                    },
                    name: "xs".into()
                },
            ],
            fun.sig.args
        );
        assert_eq!(Some(TypeDesc::plain("real")), fun.sig.ret_type);
    }

    #[test]
    fn test_parse_extern() {
        let top_level = parse_source("extern cos(real x): real;").unwrap();

        assert_eq!(
            vec![TopLevelUnit::Extern(Signature {
                name: "cos".into(),
                args: vec![Arg {
                    type_desc: TypeDesc::plain("real"),
                    name: "x".into()
                }],
                ret_type: Some(TypeDesc::plain("real")),
            })],
            top_level
        );
    }

    #[test]
    fn test_parse_list_and_subscript() {
        let top_level = parse_source("def f(list<integer> xs): integer xs[1]; [1i 2i 3i];")
            .unwrap();

        let [TopLevelUnit::Function(f), TopLevelUnit::Function(anon)] = top_level.as_slice()
        else {
            panic!("expected two functions");
        };
        assert_eq!(
            ExprKind::Var {
                name: "xs".into(),
                subscript: Some(1),
            },
            f.body.kind
        );
        let ExprKind::List(elems) = &anon.body.kind else {
            panic!("expected a list literal");
        };
        assert_eq!(3, elems.len());
    }

    #[test]
    fn test_expression_ids_are_dense() {
        let top_level = parse_source("def sq(integer x):integer x*x; sq(3i)+sq(2i);").unwrap();

        let mut ids = vec![];
        for unit in &top_level {
            if let TopLevelUnit::Function(fun) = unit {
                collect_ids(&fun.body, &mut ids);
            }
        }

        ids.sort_unstable();
        let expected = (0..ids.len() as ExprId).collect::<Vec<_>>();
        assert_eq!(expected, ids, "IDs must be exactly 0..n with no gaps");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Err(ParseError::new("expected ')' but found <eof>")),
            parse_source("(1.0 + 2.0")
        );
        assert_eq!(
            Err(ParseError::new(
                "unknown token when expecting an expression: ','"
            )),
            parse_source(", 1.0")
        );
        assert_eq!(
            Err(ParseError::new(
                "Expected function name in prototype, found 3i"
            )),
            parse_source("def 3i()")
        );
        assert_eq!(
            Err(ParseError::new("Expected number in subscript, found foo")),
            parse_source("xs[foo]")
        );
        assert_eq!(
            Err(ParseError::new(
                "Expected ')' or ',' in argument list, found 2.0"
            )),
            parse_source("foo(1.0 2.0;")
        );
    }

    #[test]
    fn test_print_and_reparse_round_trip() {
        let sources = [
            "4.0 + 5.0;",
            "def foo(real a, real b): real a*a + 2.0*a*b + b*b;",
            "extern cos(real x): real; cos(1.234);",
            "def fib(integer n):integer if(n < 2i, n, fib(n-1i)+fib(n-2i)); fib(8i);",
            "True and (False or True);",
            "def second(list<integer> xs): integer xs[1]; second([1i 2i 3i]);",
        ];

        for source in sources {
            let first = parse_source(source).unwrap();
            let printed = first
                .iter()
                .map(|unit| unit.to_string())
                .collect::<Vec<_>>()
                .join("\n");
            let second = parse_source(&printed).unwrap();

            let reprinted = second
                .iter()
                .map(|unit| unit.to_string())
                .collect::<Vec<_>>()
                .join("\n");
            assert_eq!(printed, reprinted, "round trip diverged for {source:?}");
        }
    }
}
