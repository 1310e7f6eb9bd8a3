//! Recursive-descent parser producing the extended AST.
//!
//! Accepts a slightly larger language than the strict grammar, for
//! robustness at the REPL: semicolons between statements inside braced
//! blocks may be omitted when the boundary is unambiguous, which is what
//! makes relaxed macro-call statements (`name; arg; arg` or adjacent
//! operands inside `quote{…}`) parse.
//!
//! Quotation forms are encoded per `make_quote`: a unary expression whose
//! operator is the extended token and whose operand is a zero-parameter
//! function literal carrying the quoted block.


use crate::ast::{
    ArrayType, AssignStmt, BasicLit, BinaryExpr, BlockStmt, BranchStmt, CallExpr, CaseClause, ChanDir, ChanType,
    CommClause, CompositeLit, Decl, DeclStmt, DeferStmt, EllipsisExpr, EmptyStmt, Expr, Field, FieldList, File,
    ForStmt, FuncDecl, FuncLit, FuncType, GenDecl, GoStmt, Ident, IfStmt, ImportSpec, IncDecStmt, IndexExpr,
    InterfaceType, KeyValueExpr, LabeledStmt, MapType, Node, ParenExpr, RangeStmt, ReturnStmt, SelectStmt,
    SelectorExpr, SendStmt, SliceExpr, Spec, StarExpr, Stmt, StructType, SwitchStmt, TypeAssertExpr, TypeSpec,
    TypeSwitchStmt, UnaryExpr, ValueSpec,
};
use crate::error::EvalError;
use crate::lexer::{Lexeme, Lexer};
use crate::token::{Pos, Token, LOWEST_PREC};

type PResult<T> = Result<T, EvalError>;

/// Parses one REPL turn (or file) into a list of toplevel nodes.
/// `first_line` is the 1-based global line of the first source line.
pub fn parse(src: &str, first_line: u32) -> PResult<Vec<Node>> {
    let mut parser = Parser::new(src, first_line);
    let mut nodes = vec![];
    loop {
        while parser.cur.tok == Token::Semicolon {
            parser.bump();
        }
        if parser.cur.tok == Token::Eof {
            return Ok(nodes);
        }
        nodes.push(parser.parse_any()?);
    }
}

struct Parser<'a> {
    lex: Lexer<'a>,
    cur: Lexeme,
    peek: Lexeme,
    /// composite literals are suppressed while parsing a control-clause
    /// header, so `if x {` reads the brace as the body
    no_composite: bool,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, first_line: u32) -> Self {
        let mut lex = Lexer::new(src, first_line);
        let cur = lex.next();
        let peek = lex.next();
        Self {
            lex,
            cur,
            peek,
            no_composite: false,
        }
    }

    fn bump(&mut self) -> Lexeme {
        let next = self.lex.next();
        let prev = std::mem::replace(&mut self.cur, std::mem::replace(&mut self.peek, next));
        prev
    }

    fn expect(&mut self, tok: Token) -> PResult<Lexeme> {
        if self.cur.tok == tok {
            Ok(self.bump())
        } else {
            Err(self.err(format!("expecting {:?}, found {:?} {}", tok, self.cur.tok, self.cur.lit)))
        }
    }

    fn eat(&mut self, tok: Token) -> bool {
        if self.cur.tok == tok {
            self.bump();
            true
        } else {
            false
        }
    }

    fn err(&self, msg: String) -> EvalError {
        EvalError::syntax(msg).at(self.cur.pos)
    }

    fn skip_semis(&mut self) {
        while self.cur.tok == Token::Semicolon {
            self.bump();
        }
    }

    // ------------------------------------------------------------------
    // toplevel

    fn parse_any(&mut self) -> PResult<Node> {
        match self.cur.tok {
            Token::Package => {
                self.bump();
                let name = self.parse_ident()?;
                Ok(Node::File(File {
                    name: Some(name),
                    decls: vec![],
                }))
            }
            Token::Import | Token::Const | Token::Type | Token::Var => {
                Ok(Node::Decl(Decl::Gen(Box::new(self.parse_gen_decl()?))))
            }
            Token::Func | Token::Macro if self.peek.tok == Token::Ident => {
                Ok(Node::Decl(Decl::Func(Box::new(self.parse_func_decl()?))))
            }
            Token::Func if self.peek.tok == Token::Lparen => self.parse_func_ambiguous(),
            _ => {
                let stmt = self.parse_stmt()?;
                // unwrap bare expressions at toplevel
                Ok(match stmt {
                    Stmt::Expr(es) => Node::Expr(es.x),
                    other => Node::Stmt(other),
                })
            }
        }
    }

    /// `func (` at statement level: a method declaration when a name
    /// follows the first parenthesized group (which is then the
    /// receiver), a function literal otherwise.
    fn parse_func_ambiguous(&mut self) -> PResult<Node> {
        self.expect(Token::Func)?;
        let group = self.parse_param_list()?;
        if self.cur.tok == Token::Ident && self.peek.tok == Token::Lparen {
            if group.list.len() != 1 {
                return Err(self.err("method declaration needs exactly one receiver".into()));
            }
            let recv = group.list.into_iter().next().expect("len checked");
            let name = self.parse_ident()?;
            let ty = self.parse_func_type()?;
            let body = if self.cur.tok == Token::Lbrace {
                Some(self.parse_block()?)
            } else {
                None
            };
            return Ok(Node::Decl(Decl::Func(Box::new(FuncDecl {
                recv: Some(recv),
                name,
                ty,
                body,
                is_macro: false,
            }))));
        }
        let pos = group.pos;
        let results = self.parse_results(pos)?;
        let ty = FuncType {
            params: group,
            results,
            pos,
        };
        let expr = if self.cur.tok == Token::Lbrace {
            let body = self.parse_block()?;
            Expr::FuncLit(Box::new(FuncLit { ty, body }))
        } else {
            Expr::FuncType(Box::new(ty))
        };
        let expr = self.parse_postfix(expr)?;
        Ok(Node::Expr(expr))
    }

    fn parse_gen_decl(&mut self) -> PResult<GenDecl> {
        let tok = self.cur.tok;
        let pos = self.bump().pos;
        let mut specs = vec![];
        if self.eat(Token::Lparen) {
            while self.cur.tok != Token::Rparen && self.cur.tok != Token::Eof {
                specs.push(self.parse_spec(tok)?);
                self.skip_semis();
            }
            self.expect(Token::Rparen)?;
        } else {
            specs.push(self.parse_spec(tok)?);
        }
        Ok(GenDecl { tok, specs, pos })
    }

    fn parse_spec(&mut self, tok: Token) -> PResult<Spec> {
        match tok {
            Token::Import => {
                let name = if self.cur.tok == Token::Ident {
                    Some(self.parse_ident()?)
                } else {
                    None
                };
                let path = self.parse_basic_lit()?;
                Ok(Spec::Import(Box::new(ImportSpec { name, path })))
            }
            Token::Type => {
                let name = self.parse_ident()?;
                let ty = self.parse_type()?;
                Ok(Spec::Type(Box::new(TypeSpec { name, ty })))
            }
            _ => {
                let pos = self.cur.pos;
                let mut names = vec![self.parse_ident()?];
                while self.eat(Token::Comma) {
                    names.push(self.parse_ident()?);
                }
                let ty = if !matches!(self.cur.tok, Token::Assign | Token::Semicolon | Token::Rparen | Token::Eof) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                let values = if self.eat(Token::Assign) {
                    self.parse_expr_list()?
                } else {
                    vec![]
                };
                Ok(Spec::Value(Box::new(ValueSpec { names, ty, values, pos })))
            }
        }
    }

    /// `func name(...)` / `macro name(...)`; method declarations go
    /// through `parse_func_ambiguous`.
    fn parse_func_decl(&mut self) -> PResult<FuncDecl> {
        let is_macro = self.cur.tok == Token::Macro;
        self.bump();
        let name = self.parse_ident()?;
        let ty = self.parse_func_type()?;
        let body = if self.cur.tok == Token::Lbrace {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(FuncDecl {
            recv: None,
            name,
            ty,
            body,
            is_macro,
        })
    }

    // ------------------------------------------------------------------
    // statements

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        match self.cur.tok {
            Token::Var | Token::Const | Token::Type => {
                let decl = self.parse_gen_decl()?;
                Ok(Stmt::Decl(Box::new(DeclStmt {
                    decl: Decl::Gen(Box::new(decl)),
                })))
            }
            Token::Func | Token::Macro if self.peek.tok == Token::Ident => {
                let decl = self.parse_func_decl()?;
                Ok(Stmt::Decl(Box::new(DeclStmt {
                    decl: Decl::Func(Box::new(decl)),
                })))
            }
            Token::Func if self.peek.tok == Token::Lparen => match self.parse_func_ambiguous()? {
                Node::Decl(decl) => Ok(Stmt::Decl(Box::new(DeclStmt { decl }))),
                Node::Expr(x) => Ok(Stmt::expr(x)),
                other => Err(self.err(format!("unexpected func form: {other:?}"))),
            },
            Token::If => self.parse_if(),
            Token::For => self.parse_for(),
            Token::Switch => self.parse_switch(),
            Token::Select => self.parse_select(),
            Token::Go => {
                let pos = self.bump().pos;
                let call = self.parse_expr()?;
                Ok(Stmt::Go(Box::new(GoStmt { call, pos })))
            }
            Token::Defer => {
                let pos = self.bump().pos;
                let call = self.parse_expr()?;
                Ok(Stmt::Defer(Box::new(DeferStmt { call, pos })))
            }
            Token::Return => {
                let pos = self.bump().pos;
                let results = if matches!(
                    self.cur.tok,
                    Token::Semicolon | Token::Rbrace | Token::Case | Token::Default | Token::Eof
                ) {
                    vec![]
                } else {
                    self.parse_expr_list()?
                };
                Ok(Stmt::Return(Box::new(ReturnStmt { results, pos })))
            }
            Token::Break | Token::Continue | Token::Goto | Token::Fallthrough => {
                let tok = self.cur.tok;
                let pos = self.bump().pos;
                let label = if self.cur.tok == Token::Ident && tok != Token::Fallthrough {
                    Some(self.parse_ident()?)
                } else {
                    None
                };
                Ok(Stmt::Branch(Box::new(BranchStmt { tok, label, pos })))
            }
            Token::Lbrace => Ok(Stmt::Block(Box::new(self.parse_block()?))),
            Token::Semicolon => {
                let pos = self.bump().pos;
                Ok(Stmt::Empty(EmptyStmt { pos }))
            }
            Token::Ident if self.peek.tok == Token::Colon => {
                let label = self.parse_ident()?;
                self.expect(Token::Colon)?;
                let stmt = self.parse_stmt()?;
                Ok(Stmt::Labeled(Box::new(LabeledStmt { label, stmt })))
            }
            _ => self.parse_simple_stmt(),
        }
    }

    /// Expression statement, send, inc/dec, assignment or short decl.
    fn parse_simple_stmt(&mut self) -> PResult<Stmt> {
        let lhs = self.parse_expr_list()?;
        match self.cur.tok {
            Token::Define | Token::Assign => {
                let tok = self.cur.tok;
                let tok_pos = self.bump().pos;
                let rhs = self.parse_expr_list()?;
                Ok(Stmt::Assign(Box::new(AssignStmt { lhs, tok, tok_pos, rhs })))
            }
            t if t.is_op_assign() => {
                let tok = self.cur.tok;
                let tok_pos = self.bump().pos;
                let rhs = self.parse_expr_list()?;
                Ok(Stmt::Assign(Box::new(AssignStmt { lhs, tok, tok_pos, rhs })))
            }
            Token::Arrow if lhs.len() == 1 => {
                self.bump();
                let value = self.parse_expr()?;
                let chan = lhs.into_iter().next().expect("len checked");
                Ok(Stmt::Send(Box::new(SendStmt { chan, value })))
            }
            Token::Inc | Token::Dec if lhs.len() == 1 => {
                let tok = self.cur.tok;
                let pos = self.bump().pos;
                let x = lhs.into_iter().next().expect("len checked");
                Ok(Stmt::IncDec(Box::new(IncDecStmt { x, tok, pos })))
            }
            _ => {
                if lhs.len() != 1 {
                    return Err(self.err("expecting assignment after expression list".into()));
                }
                Ok(Stmt::expr(lhs.into_iter().next().expect("len checked")))
            }
        }
    }

    fn parse_block(&mut self) -> PResult<BlockStmt> {
        let lbrace = self.expect(Token::Lbrace)?.pos;
        let saved = std::mem::replace(&mut self.no_composite, false);
        let mut list = vec![];
        loop {
            self.skip_semis();
            if self.cur.tok == Token::Rbrace || self.cur.tok == Token::Eof {
                break;
            }
            list.push(self.parse_stmt()?);
            // relaxed separator rule: a missing semicolon between two
            // unambiguous statements is tolerated (macro-call syntax)
        }
        let rbrace = self.expect(Token::Rbrace)?.pos;
        self.no_composite = saved;
        Ok(BlockStmt::new(list, lbrace, rbrace))
    }

    fn parse_stmt_list_until_case(&mut self) -> PResult<Vec<Stmt>> {
        let mut list = vec![];
        loop {
            self.skip_semis();
            if matches!(self.cur.tok, Token::Case | Token::Default | Token::Rbrace | Token::Eof) {
                return Ok(list);
            }
            list.push(self.parse_stmt()?);
        }
    }

    fn parse_header_simple_stmt(&mut self) -> PResult<Stmt> {
        let saved = std::mem::replace(&mut self.no_composite, true);
        let stmt = self.parse_simple_stmt();
        self.no_composite = saved;
        stmt
    }

    fn parse_header_expr(&mut self) -> PResult<Expr> {
        let saved = std::mem::replace(&mut self.no_composite, true);
        let expr = self.parse_expr();
        self.no_composite = saved;
        expr
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::If)?.pos;
        let mut init = None;
        let first = self.parse_header_simple_stmt()?;
        let cond = if self.eat(Token::Semicolon) {
            init = Some(first);
            self.parse_header_expr()?
        } else {
            match first {
                Stmt::Expr(es) => es.x,
                other => return Err(self.err(format!("expecting condition, found {other:?}"))),
            }
        };
        let body = self.parse_block()?;
        let els = if self.eat(Token::Else) {
            Some(if self.cur.tok == Token::If {
                self.parse_if()?
            } else {
                Stmt::Block(Box::new(self.parse_block()?))
            })
        } else {
            None
        };
        Ok(Stmt::If(Box::new(IfStmt {
            init,
            cond,
            body,
            els,
            pos,
        })))
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::For)?.pos;
        if self.cur.tok == Token::Lbrace {
            let body = self.parse_block()?;
            return Ok(Stmt::For(Box::new(ForStmt {
                init: None,
                cond: None,
                post: None,
                body,
                pos,
            })));
        }
        if self.eat(Token::Range) {
            // for range x { }
            let x = self.parse_header_expr()?;
            let body = self.parse_block()?;
            return Ok(Stmt::Range(Box::new(RangeStmt {
                key: None,
                value: None,
                tok: Token::Illegal,
                x,
                body,
                pos,
            })));
        }

        let saved = std::mem::replace(&mut self.no_composite, true);
        let lhs = self.parse_expr_list()?;
        if matches!(self.cur.tok, Token::Define | Token::Assign) && self.peek.tok == Token::Range {
            let tok = self.bump().tok;
            self.expect(Token::Range)?;
            let x = self.parse_expr()?;
            self.no_composite = saved;
            let body = self.parse_block()?;
            let mut vars = lhs.into_iter();
            return Ok(Stmt::Range(Box::new(RangeStmt {
                key: vars.next(),
                value: vars.next(),
                tok,
                x,
                body,
                pos,
            })));
        }

        let first = self.finish_simple_stmt(lhs)?;
        let stmt = if self.cur.tok == Token::Lbrace {
            // condition-only loop
            let cond = match first {
                Stmt::Expr(es) => es.x,
                other => return Err(self.err(format!("expecting condition, found {other:?}"))),
            };
            self.no_composite = saved;
            let body = self.parse_block()?;
            Stmt::For(Box::new(ForStmt {
                init: None,
                cond: Some(cond),
                post: None,
                body,
                pos,
            }))
        } else {
            self.expect(Token::Semicolon)?;
            let cond = if self.cur.tok == Token::Semicolon {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect(Token::Semicolon)?;
            let post = if self.cur.tok == Token::Lbrace {
                None
            } else {
                Some(self.parse_simple_stmt()?)
            };
            self.no_composite = saved;
            let body = self.parse_block()?;
            Stmt::For(Box::new(ForStmt {
                init: Some(first),
                cond,
                post,
                body,
                pos,
            }))
        };
        self.no_composite = saved;
        Ok(stmt)
    }

    /// Completes a simple statement whose leading expression list is
    /// already parsed (used by `for` header parsing).
    fn finish_simple_stmt(&mut self, lhs: Vec<Expr>) -> PResult<Stmt> {
        match self.cur.tok {
            Token::Define | Token::Assign => {
                let tok = self.cur.tok;
                let tok_pos = self.bump().pos;
                let rhs = self.parse_expr_list()?;
                Ok(Stmt::Assign(Box::new(AssignStmt { lhs, tok, tok_pos, rhs })))
            }
            t if t.is_op_assign() => {
                let tok = self.cur.tok;
                let tok_pos = self.bump().pos;
                let rhs = self.parse_expr_list()?;
                Ok(Stmt::Assign(Box::new(AssignStmt { lhs, tok, tok_pos, rhs })))
            }
            Token::Inc | Token::Dec if lhs.len() == 1 => {
                let tok = self.cur.tok;
                let pos = self.bump().pos;
                let x = lhs.into_iter().next().expect("len checked");
                Ok(Stmt::IncDec(Box::new(IncDecStmt { x, tok, pos })))
            }
            _ => {
                if lhs.len() != 1 {
                    return Err(self.err("expecting assignment after expression list".into()));
                }
                Ok(Stmt::expr(lhs.into_iter().next().expect("len checked")))
            }
        }
    }

    fn parse_switch(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::Switch)?.pos;
        let mut init = None;
        let mut governing: Option<Stmt> = None;
        if self.cur.tok != Token::Lbrace {
            let first = self.parse_header_simple_stmt()?;
            if self.eat(Token::Semicolon) {
                init = Some(first);
                if self.cur.tok != Token::Lbrace {
                    governing = Some(self.parse_header_simple_stmt()?);
                }
            } else {
                governing = Some(first);
            }
        }

        let lbrace = self.expect(Token::Lbrace)?.pos;
        let mut clauses = vec![];
        loop {
            self.skip_semis();
            match self.cur.tok {
                Token::Case => {
                    let cpos = self.bump().pos;
                    let list = self.parse_expr_list()?;
                    self.expect(Token::Colon)?;
                    let body = self.parse_stmt_list_until_case()?;
                    clauses.push(Stmt::Case(Box::new(CaseClause { list, body, pos: cpos })));
                }
                Token::Default => {
                    let cpos = self.bump().pos;
                    self.expect(Token::Colon)?;
                    let body = self.parse_stmt_list_until_case()?;
                    clauses.push(Stmt::Case(Box::new(CaseClause {
                        list: vec![],
                        body,
                        pos: cpos,
                    })));
                }
                _ => break,
            }
        }
        let rbrace = self.expect(Token::Rbrace)?.pos;
        let body = BlockStmt::new(clauses, lbrace, rbrace);

        // a governing `x.(type)` or `v := x.(type)` makes it a type switch
        let is_type_switch = match &governing {
            Some(Stmt::Expr(es)) => matches!(&es.x, Expr::TypeAssert(t) if t.ty.is_none()),
            Some(Stmt::Assign(a)) => {
                a.rhs.len() == 1 && matches!(&a.rhs[0], Expr::TypeAssert(t) if t.ty.is_none())
            }
            _ => false,
        };
        if is_type_switch {
            Ok(Stmt::TypeSwitch(Box::new(TypeSwitchStmt {
                init,
                assign: governing.expect("checked above"),
                body,
                pos,
            })))
        } else {
            let tag = match governing {
                None => None,
                Some(Stmt::Expr(es)) => Some(es.x),
                Some(other) => return Err(self.err(format!("invalid switch header: {other:?}"))),
            };
            Ok(Stmt::Switch(Box::new(SwitchStmt { init, tag, body, pos })))
        }
    }

    fn parse_select(&mut self) -> PResult<Stmt> {
        let pos = self.expect(Token::Select)?.pos;
        let lbrace = self.expect(Token::Lbrace)?.pos;
        let mut clauses = vec![];
        loop {
            self.skip_semis();
            match self.cur.tok {
                Token::Case => {
                    let cpos = self.bump().pos;
                    let comm = Some(self.parse_simple_stmt()?);
                    self.expect(Token::Colon)?;
                    let body = self.parse_stmt_list_until_case()?;
                    clauses.push(Stmt::Comm(Box::new(CommClause { comm, body, pos: cpos })));
                }
                Token::Default => {
                    let cpos = self.bump().pos;
                    self.expect(Token::Colon)?;
                    let body = self.parse_stmt_list_until_case()?;
                    clauses.push(Stmt::Comm(Box::new(CommClause {
                        comm: None,
                        body,
                        pos: cpos,
                    })));
                }
                _ => break,
            }
        }
        let rbrace = self.expect(Token::Rbrace)?.pos;
        Ok(Stmt::Select(Box::new(SelectStmt {
            body: BlockStmt::new(clauses, lbrace, rbrace),
            pos,
        })))
    }

    // ------------------------------------------------------------------
    // expressions

    fn parse_expr_list(&mut self) -> PResult<Vec<Expr>> {
        let mut list = vec![self.parse_expr()?];
        while self.eat(Token::Comma) {
            list.push(self.parse_expr()?);
        }
        Ok(list)
    }

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_binary(LOWEST_PREC + 1)
    }

    fn parse_binary(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut x = self.parse_unary()?;
        loop {
            let prec = self.cur.tok.precedence();
            if prec < min_prec || prec == LOWEST_PREC {
                return Ok(x);
            }
            let op = self.cur.tok;
            let op_pos = self.bump().pos;
            let y = self.parse_binary(prec + 1)?;
            x = Expr::Binary(Box::new(BinaryExpr { x, op, op_pos, y }));
        }
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        match self.cur.tok {
            Token::Add | Token::Sub | Token::Not | Token::Xor | Token::And | Token::Arrow => {
                let op = self.cur.tok;
                let op_pos = self.bump().pos;
                if op == Token::Arrow && self.cur.tok == Token::Chan {
                    // <-chan T type expression
                    let pos = self.bump().pos;
                    let value = self.parse_type()?;
                    return Ok(Expr::ChanType(Box::new(ChanType {
                        dir: ChanDir::Recv,
                        value,
                        pos,
                    })));
                }
                let x = self.parse_unary()?;
                Ok(Expr::Unary(Box::new(UnaryExpr { op, op_pos, x })))
            }
            Token::Mul => {
                let pos = self.bump().pos;
                let x = self.parse_unary()?;
                Ok(Expr::Star(Box::new(StarExpr { x, pos })))
            }
            Token::Quote | Token::Quasiquote | Token::Unquote | Token::UnquoteSplice => self.parse_quote(),
            _ => self.parse_primary(),
        }
    }

    /// Quotation parsing: the operator must be followed by an identifier,
    /// a basic literal, another quote form, or a braced block.
    fn parse_quote(&mut self) -> PResult<Expr> {
        let op = self.cur.tok;
        let op_pos = self.bump().pos;
        let node: Option<Node> = match self.cur.tok {
            Token::Eof
            | Token::Rparen
            | Token::Rbrack
            | Token::Rbrace
            | Token::Comma
            | Token::Period
            | Token::Semicolon
            | Token::Colon => {
                // bare keyword: just the quotation name as an identifier
                return Ok(Expr::ident(op.to_string(), op_pos));
            }
            Token::Ident => Some(Node::Expr(Expr::Ident(self.parse_ident()?))),
            Token::Int | Token::Float | Token::Imag | Token::Char | Token::Str => {
                Some(Node::Expr(Expr::Basic(self.parse_basic_lit()?)))
            }
            Token::Quote | Token::Quasiquote | Token::Unquote => Some(Node::Expr(self.parse_quote()?)),
            Token::Lbrace => Some(Node::Stmt(Stmt::Block(Box::new(self.parse_block()?)))),
            _ => {
                return Err(self.err(format!(
                    "after {op} expecting one of: '{{', identifier, literal, quotation; found {:?}",
                    self.cur.tok
                )))
            }
        };
        make_quote(op, op_pos, node).map_err(|msg| EvalError::syntax(msg).at(op_pos))
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let x = self.parse_operand()?;
        self.parse_postfix(x)
    }

    /// Selector, call, index/slice, type-assertion and composite-literal
    /// suffixes.
    fn parse_postfix(&mut self, x: Expr) -> PResult<Expr> {
        let mut x = x;
        loop {
            match self.cur.tok {
                Token::Period => {
                    self.bump();
                    if self.eat(Token::Lparen) {
                        // type assertion x.(T) or x.(type)
                        let ty = if self.eat(Token::Type) {
                            None
                        } else {
                            Some(self.parse_type()?)
                        };
                        self.expect(Token::Rparen)?;
                        x = Expr::TypeAssert(Box::new(TypeAssertExpr { x, ty }));
                    } else {
                        let sel = self.parse_ident()?;
                        x = Expr::Selector(Box::new(SelectorExpr { x, sel }));
                    }
                }
                Token::Lparen => {
                    let pos = self.bump().pos;
                    let mut args = vec![];
                    let mut ellipsis = false;
                    let saved = std::mem::replace(&mut self.no_composite, false);
                    while self.cur.tok != Token::Rparen && self.cur.tok != Token::Eof {
                        args.push(self.parse_expr()?);
                        if self.eat(Token::Ellipsis) {
                            ellipsis = true;
                        }
                        if !self.eat(Token::Comma) {
                            break;
                        }
                    }
                    self.no_composite = saved;
                    self.expect(Token::Rparen)?;
                    x = Expr::Call(Box::new(CallExpr {
                        fun: x,
                        args,
                        ellipsis,
                        pos,
                    }));
                }
                Token::Lbrack => {
                    self.bump();
                    let saved = std::mem::replace(&mut self.no_composite, false);
                    let mut low = None;
                    let mut high = None;
                    let mut max = None;
                    let mut slice3 = false;
                    let mut is_slice = false;
                    if self.cur.tok != Token::Colon {
                        low = Some(self.parse_expr()?);
                    }
                    if self.eat(Token::Colon) {
                        is_slice = true;
                        if !matches!(self.cur.tok, Token::Colon | Token::Rbrack) {
                            high = Some(self.parse_expr()?);
                        }
                        if self.eat(Token::Colon) {
                            slice3 = true;
                            max = Some(self.parse_expr()?);
                        }
                    }
                    self.no_composite = saved;
                    self.expect(Token::Rbrack)?;
                    x = if is_slice {
                        Expr::Slice(Box::new(SliceExpr {
                            x,
                            low,
                            high,
                            max,
                            slice3,
                        }))
                    } else {
                        let index = low.ok_or_else(|| self.err("expecting index expression".into()))?;
                        Expr::Index(Box::new(IndexExpr { x, index }))
                    };
                }
                Token::Lbrace if !self.no_composite && is_type_expr(&x) => {
                    x = self.parse_composite_lit(Some(x))?;
                }
                _ => return Ok(x),
            }
        }
    }

    fn parse_operand(&mut self) -> PResult<Expr> {
        match self.cur.tok {
            Token::Int | Token::Float | Token::Imag | Token::Char | Token::Str => {
                Ok(Expr::Basic(self.parse_basic_lit()?))
            }
            Token::Ident => Ok(Expr::Ident(self.parse_ident()?)),
            Token::Lparen => {
                self.bump();
                let saved = std::mem::replace(&mut self.no_composite, false);
                let x = self.parse_expr()?;
                self.no_composite = saved;
                self.expect(Token::Rparen)?;
                Ok(Expr::Paren(Box::new(ParenExpr { x })))
            }
            Token::Func => {
                let ty = {
                    self.bump();
                    self.parse_func_type()?
                };
                if self.cur.tok == Token::Lbrace {
                    let saved = std::mem::replace(&mut self.no_composite, false);
                    let body = self.parse_block()?;
                    self.no_composite = saved;
                    Ok(Expr::FuncLit(Box::new(FuncLit { ty, body })))
                } else {
                    Ok(Expr::FuncType(Box::new(ty)))
                }
            }
            Token::Lbrack | Token::Map | Token::Chan | Token::Struct | Token::Interface => {
                let ty = self.parse_type()?;
                if self.cur.tok == Token::Lbrace && !self.no_composite {
                    self.parse_composite_lit(Some(ty))
                } else {
                    Ok(ty)
                }
            }
            Token::Macro => {
                // a block-in-expression: MACRO func() { body }
                let pos = self.bump().pos;
                let block = self.parse_block()?;
                make_quote(Token::Macro, pos, Some(Node::Stmt(Stmt::Block(Box::new(block)))))
                    .map_err(|msg| EvalError::syntax(msg).at(pos))
            }
            other => Err(self.err(format!("expecting expression, found {other:?} {}", self.cur.lit))),
        }
    }

    fn parse_composite_lit(&mut self, ty: Option<Expr>) -> PResult<Expr> {
        let lbrace = self.expect(Token::Lbrace)?.pos;
        let saved = std::mem::replace(&mut self.no_composite, false);
        let mut elts = vec![];
        while self.cur.tok != Token::Rbrace && self.cur.tok != Token::Eof {
            let elt = if self.cur.tok == Token::Lbrace {
                // nested literal with elided type
                self.parse_composite_lit(None)?
            } else {
                self.parse_expr()?
            };
            let elt = if self.eat(Token::Colon) {
                let value = if self.cur.tok == Token::Lbrace {
                    self.parse_composite_lit(None)?
                } else {
                    self.parse_expr()?
                };
                Expr::KeyValue(Box::new(KeyValueExpr { key: elt, value }))
            } else {
                elt
            };
            elts.push(elt);
            if !self.eat(Token::Comma) {
                break;
            }
        }
        self.no_composite = saved;
        let rbrace = self.expect(Token::Rbrace)?.pos;
        Ok(Expr::Composite(Box::new(CompositeLit {
            ty,
            elts,
            lbrace,
            rbrace,
        })))
    }

    // ------------------------------------------------------------------
    // types

    fn parse_type(&mut self) -> PResult<Expr> {
        match self.cur.tok {
            Token::Ident => {
                let mut x = Expr::Ident(self.parse_ident()?);
                if self.eat(Token::Period) {
                    let sel = self.parse_ident()?;
                    x = Expr::Selector(Box::new(SelectorExpr { x, sel }));
                }
                Ok(x)
            }
            Token::Lbrack => {
                let pos = self.bump().pos;
                let len = if self.cur.tok == Token::Rbrack {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(Token::Rbrack)?;
                let elt = self.parse_type()?;
                Ok(Expr::ArrayType(Box::new(ArrayType { len, elt, pos })))
            }
            Token::Map => {
                let pos = self.bump().pos;
                self.expect(Token::Lbrack)?;
                let key = self.parse_type()?;
                self.expect(Token::Rbrack)?;
                let value = self.parse_type()?;
                Ok(Expr::MapType(Box::new(MapType { key, value, pos })))
            }
            Token::Chan => {
                let pos = self.bump().pos;
                let dir = if self.eat(Token::Arrow) {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                let value = self.parse_type()?;
                Ok(Expr::ChanType(Box::new(ChanType { dir, value, pos })))
            }
            Token::Arrow => {
                let pos = self.bump().pos;
                self.expect(Token::Chan)?;
                let value = self.parse_type()?;
                Ok(Expr::ChanType(Box::new(ChanType {
                    dir: ChanDir::Recv,
                    value,
                    pos,
                })))
            }
            Token::Mul => {
                let pos = self.bump().pos;
                let x = self.parse_type()?;
                Ok(Expr::Star(Box::new(StarExpr { x, pos })))
            }
            Token::Func => {
                self.bump();
                let ty = self.parse_func_type()?;
                Ok(Expr::FuncType(Box::new(ty)))
            }
            Token::Interface => {
                let pos = self.bump().pos;
                self.expect(Token::Lbrace)?;
                let mut list = vec![];
                while self.cur.tok != Token::Rbrace && self.cur.tok != Token::Eof {
                    let name = self.parse_ident()?;
                    let ty = Expr::FuncType(Box::new(self.parse_func_type()?));
                    list.push(Field {
                        names: vec![name],
                        ty: Some(ty),
                    });
                    self.skip_semis();
                }
                self.expect(Token::Rbrace)?;
                Ok(Expr::InterfaceType(Box::new(InterfaceType {
                    methods: FieldList { list, pos },
                    pos,
                })))
            }
            Token::Struct => {
                let pos = self.bump().pos;
                self.expect(Token::Lbrace)?;
                let mut list = vec![];
                while self.cur.tok != Token::Rbrace && self.cur.tok != Token::Eof {
                    list.push(self.parse_field()?);
                    self.skip_semis();
                }
                self.expect(Token::Rbrace)?;
                Ok(Expr::StructType(Box::new(StructType {
                    fields: FieldList { list, pos },
                    pos,
                })))
            }
            Token::Lparen => {
                self.bump();
                let ty = self.parse_type()?;
                self.expect(Token::Rparen)?;
                Ok(Expr::Paren(Box::new(ParenExpr { x: ty })))
            }
            Token::Ellipsis => {
                let pos = self.bump().pos;
                let elt = Some(self.parse_type()?);
                Ok(Expr::Ellipsis(Box::new(EllipsisExpr { elt, pos })))
            }
            other => Err(self.err(format!("expecting type, found {other:?}"))),
        }
    }

    /// Parses the signature following `func` (the keyword is consumed by
    /// the caller).
    fn parse_func_type(&mut self) -> PResult<FuncType> {
        let pos = self.cur.pos;
        let params = self.parse_param_list()?;
        let results = self.parse_results(pos)?;
        Ok(FuncType { params, results, pos })
    }

    /// Result list: a parenthesized group, a single bare type, or
    /// nothing.
    fn parse_results(&mut self, pos: Pos) -> PResult<FieldList> {
        if self.cur.tok == Token::Lparen {
            self.parse_param_list()
        } else if can_start_type(self.cur.tok) {
            let ty = self.parse_type()?;
            Ok(FieldList {
                list: vec![Field {
                    names: vec![],
                    ty: Some(ty),
                }],
                pos,
            })
        } else {
            Ok(FieldList::empty(pos))
        }
    }

    /// Parameter/result list. `(int, string)`, `(a, b int)` and
    /// `(a int, xs ...T)` are disambiguated by deferring names: a bare
    /// identifier is a name if some later element of its group carries a
    /// type, an anonymous type otherwise.
    fn parse_param_list(&mut self) -> PResult<FieldList> {
        let pos = self.expect(Token::Lparen)?.pos;
        let mut list: Vec<Field> = vec![];
        let mut unknown: Vec<Expr> = vec![];
        while self.cur.tok != Token::Rparen && self.cur.tok != Token::Eof {
            let item = self.parse_type()?;
            if can_start_type(self.cur.tok) {
                // `item` is the last name of a group and its type follows
                let mut names = vec![];
                for expr in unknown.drain(..) {
                    match expr {
                        Expr::Ident(id) => names.push(id),
                        other => return Err(self.err(format!("expecting parameter name, found {other:?}"))),
                    }
                }
                match item {
                    Expr::Ident(id) => names.push(id),
                    other => return Err(self.err(format!("expecting parameter name, found {other:?}"))),
                }
                let ty = self.parse_type()?;
                list.push(Field { names, ty: Some(ty) });
            } else {
                unknown.push(item);
            }
            if !self.eat(Token::Comma) {
                break;
            }
        }
        self.expect(Token::Rparen)?;
        // leftovers are anonymous types, one field each
        for expr in unknown {
            list.push(Field {
                names: vec![],
                ty: Some(expr),
            });
        }
        Ok(FieldList { list, pos })
    }

    /// One field group: `a, b int`, `int`, or `xs ...T`.
    fn parse_field(&mut self) -> PResult<Field> {
        let mut names = vec![];
        if self.cur.tok == Token::Ident
            && (matches!(self.peek.tok, Token::Comma | Token::Ident) || can_start_type(self.peek.tok))
        {
            names.push(self.parse_ident()?);
            while self.eat(Token::Comma) {
                names.push(self.parse_ident()?);
            }
            let ty = self.parse_type()?;
            return Ok(Field { names, ty: Some(ty) });
        }
        let ty = self.parse_type()?;
        Ok(Field { names, ty: Some(ty) })
    }

    fn parse_ident(&mut self) -> PResult<Ident> {
        let lx = self.expect(Token::Ident)?;
        Ok(Ident::new(lx.lit, lx.pos))
    }

    fn parse_basic_lit(&mut self) -> PResult<BasicLit> {
        if !matches!(
            self.cur.tok,
            Token::Int | Token::Float | Token::Imag | Token::Char | Token::Str
        ) {
            return Err(self.err(format!("expecting literal, found {:?}", self.cur.tok)));
        }
        let lx = self.bump();
        Ok(BasicLit {
            kind: lx.tok,
            value: lx.lit,
            pos: lx.pos,
        })
    }
}

fn can_start_type(tok: Token) -> bool {
    matches!(
        tok,
        Token::Ident
            | Token::Lbrack
            | Token::Map
            | Token::Chan
            | Token::Mul
            | Token::Func
            | Token::Interface
            | Token::Struct
            | Token::Lparen
            | Token::Arrow
            | Token::Ellipsis
    )
}

/// Conservative "could be a composite-literal type" test: a name,
/// package-qualified name, or a type expression.
fn is_type_expr(x: &Expr) -> bool {
    match x {
        Expr::Ident(_) | Expr::ArrayType(_) | Expr::MapType(_) | Expr::StructType(_) => true,
        Expr::Selector(s) => matches!(&s.x, Expr::Ident(_)),
        _ => false,
    }
}

/// Builds the quotation encoding for `op` around `node`: a unary
/// expression whose operand is a zero-parameter function literal whose
/// body carries the quoted block. `node` may be a block, a statement, an
/// expression (wrapped as an expression statement), or nothing (empty
/// block).
pub fn make_quote(op: Token, pos: Pos, node: Option<Node>) -> Result<Expr, String> {
    let body = match node {
        None | Some(Node::None) => BlockStmt::new(vec![], pos, pos),
        Some(Node::Stmt(Stmt::Block(b))) => *b,
        Some(Node::Stmt(stmt)) => BlockStmt::new(vec![stmt], pos, pos),
        Some(Node::Expr(x)) => BlockStmt::new(vec![Stmt::expr(x)], pos, pos),
        Some(other) => return Err(format!("{op}: expecting statement or expression, found {other:?}")),
    };
    let ty = FuncType {
        params: FieldList::empty(pos),
        results: FieldList::empty(pos),
        pos,
    };
    Ok(Expr::Unary(Box::new(UnaryExpr {
        op,
        op_pos: pos,
        x: Expr::FuncLit(Box::new(FuncLit { ty, body })),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(src: &str) -> Node {
        let nodes = parse(src, 1).unwrap();
        assert_eq!(nodes.len(), 1, "expected one node from {src:?}");
        nodes.into_iter().next().unwrap()
    }

    #[test]
    fn parses_binary_precedence() {
        let node = parse_one("1 + 2*3");
        let Node::Expr(Expr::Binary(b)) = node else {
            panic!("expected binary expression")
        };
        assert_eq!(b.op, Token::Add);
        assert!(matches!(b.y, Expr::Binary(ref m) if m.op == Token::Mul));
    }

    #[test]
    fn parses_short_var_decl_and_multi_assign() {
        let node = parse_one("a, b := f(1), 2");
        let Node::Stmt(Stmt::Assign(a)) = node else {
            panic!("expected assignment")
        };
        assert_eq!(a.tok, Token::Define);
        assert_eq!(a.lhs.len(), 2);
        assert_eq!(a.rhs.len(), 2);
    }

    #[test]
    fn parses_composite_literals() {
        let node = parse_one(r#"map[string]int{"a": 1, "b": 2}"#);
        let Node::Expr(Expr::Composite(c)) = node else {
            panic!("expected composite literal")
        };
        assert_eq!(c.elts.len(), 2);
        assert!(matches!(c.ty, Some(Expr::MapType(_))));
    }

    #[test]
    fn if_header_brace_is_body_not_literal() {
        let node = parse_one("if x { y() }");
        assert!(matches!(node, Node::Stmt(Stmt::If(_))));
    }

    #[test]
    fn parses_for_range() {
        let node = parse_one("for k, v := range m { _ = k; _ = v }");
        let Node::Stmt(Stmt::Range(r)) = node else {
            panic!("expected range statement")
        };
        assert_eq!(r.tok, Token::Define);
        assert!(r.key.is_some() && r.value.is_some());
    }

    #[test]
    fn parses_type_switch() {
        let node = parse_one("switch x := v.(type) { case int: x; default: 0 }");
        assert!(matches!(node, Node::Stmt(Stmt::TypeSwitch(_))));
    }

    #[test]
    fn quote_encodes_as_unary_over_closure() {
        let node = parse_one("quote{x}");
        let Node::Expr(Expr::Unary(u)) = node else {
            panic!("expected unary quotation")
        };
        assert_eq!(u.op, Token::Quote);
        let Expr::FuncLit(fun) = &u.x else {
            panic!("expected function literal operand")
        };
        assert_eq!(fun.body.list.len(), 1);
    }

    #[test]
    fn quasiquote_sigils_nest() {
        let node = parse_one("~`{~,a * ~,a}");
        let Node::Expr(Expr::Unary(u)) = node else {
            panic!("expected unary quotation")
        };
        assert_eq!(u.op, Token::Quasiquote);
    }

    #[test]
    fn parses_macro_decl() {
        let node = parse_one("macro sqr(a interface{}) interface{} { ~`{~,a * ~,a} }");
        let Node::Decl(Decl::Func(f)) = node else {
            panic!("expected macro declaration")
        };
        assert!(f.is_macro);
        assert_eq!(f.ty.params.list.len(), 1);
    }

    #[test]
    fn parses_func_decl_with_multi_results() {
        let node = parse_one("func f(a, b int) (int, int) { return a+b, a-b }");
        let Node::Decl(Decl::Func(f)) = node else {
            panic!("expected function declaration")
        };
        assert!(!f.is_macro);
        assert_eq!(f.ty.params.list.len(), 1);
        assert_eq!(f.ty.results.list.len(), 2);
    }

    #[test]
    fn parses_defer_go_send_select() {
        assert!(matches!(parse_one("defer f(1)"), Node::Stmt(Stmt::Defer(_))));
        assert!(matches!(parse_one("go f(1)"), Node::Stmt(Stmt::Go(_))));
        assert!(matches!(parse_one("ch <- 3"), Node::Stmt(Stmt::Send(_))));
        assert!(matches!(
            parse_one("select { case v := <-ch: v; default: 0 }"),
            Node::Stmt(Stmt::Select(_))
        ));
    }

    #[test]
    fn relaxed_macro_call_statements() {
        let nodes = parse("quote{add3 1 2 3}", 1).unwrap();
        assert_eq!(nodes.len(), 1);
        let Node::Expr(Expr::Unary(u)) = &nodes[0] else {
            panic!("expected quotation")
        };
        let Expr::FuncLit(fun) = &u.x else { panic!() };
        assert_eq!(fun.body.list.len(), 4);
    }
}
