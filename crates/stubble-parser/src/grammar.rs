//! The line-oriented grammar driver.
//!
//! Tokenizes stub source and drives the [`Builder`] through the same event
//! interface an external front end would use: statements are parsed into
//! builder calls, blocks are tracked by indentation, and conditional
//! clauses hand their collected definitions back through `if_end`.

use stubble_core::ir::Alias;
use stubble_core::Type;

use crate::builder::{
    Builder, BodyStmt, ConstantValue, Def, ImportItem, KwargValue, ParentArg, TypeArg,
};
use crate::condition::{CmpOp, CondValue, Condition, Subscript};
use crate::error::ParseError;
use crate::signatures::ParamDecl;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Name(String),
    Str(String),
    Int(i64),
    Float,
    Arrow,
    Ellipsis,
    Colon,
    ColonAssign,
    Comma,
    Dot,
    At,
    Minus,
    Question,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Assign,
    Star,
    StarStar,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    /// A semantic `# type:` comment; the declared type's tokens follow.
    TypeComment,
}

#[derive(Debug)]
struct Line {
    number: u32,
    indent: usize,
    toks: Vec<Tok>,
    text: String,
}

fn tokenize(src: &str) -> Result<Vec<Line>, ParseError> {
    let mut lines = Vec::new();
    for (i, raw) in src.lines().enumerate() {
        let number = (i + 1) as u32;
        let indent = raw.len() - raw.trim_start_matches(' ').len();
        let toks = tokenize_line(raw, number)?;
        if toks.is_empty() {
            continue;
        }
        lines.push(Line {
            number,
            indent,
            toks,
            text: raw.to_string(),
        });
    }
    Ok(lines)
}

fn tokenize_line(raw: &str, number: u32) -> Result<Vec<Tok>, ParseError> {
    let mut toks = Vec::new();
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' => i += 1,
            '#' => {
                // Only `# type:` comments are semantic.
                let rest: String = chars[i + 1..].iter().collect();
                let trimmed = rest.trim_start();
                if let Some(after) = trimmed.strip_prefix("type:") {
                    toks.push(Tok::TypeComment);
                    let consumed = chars.len() - after.chars().count();
                    i = consumed;
                } else {
                    break;
                }
            }
            '`' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != '`' {
                    j += 1;
                }
                if j == chars.len() {
                    return Err(
                        ParseError::new("unterminated backtick name").with_location(number, None)
                    );
                }
                toks.push(Tok::Name(chars[start..j].iter().collect()));
                i = j + 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != quote {
                    j += 1;
                }
                if j == chars.len() {
                    return Err(ParseError::new("unterminated string").with_location(number, None));
                }
                toks.push(Tok::Str(chars[start..j].iter().collect()));
                i = j + 1;
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                // A single dot after digits makes a float literal, unless
                // it starts an ellipsis.
                if i + 1 < chars.len()
                    && chars[i] == '.'
                    && chars[i + 1].is_ascii_digit()
                {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    toks.push(Tok::Float);
                } else {
                    let text: String = chars[start..i].iter().collect();
                    let value = text.parse::<i64>().map_err(|_| {
                        ParseError::new(format!("bad integer literal: {text}"))
                            .with_location(number, None)
                    })?;
                    toks.push(Tok::Int(value));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                toks.push(Tok::Name(chars[start..i].iter().collect()));
            }
            '.' => {
                if chars.get(i + 1) == Some(&'.') && chars.get(i + 2) == Some(&'.') {
                    toks.push(Tok::Ellipsis);
                    i += 3;
                } else {
                    toks.push(Tok::Dot);
                    i += 1;
                }
            }
            '-' => {
                if chars.get(i + 1) == Some(&'>') {
                    toks.push(Tok::Arrow);
                    i += 2;
                } else {
                    toks.push(Tok::Minus);
                    i += 1;
                }
            }
            ':' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::ColonAssign);
                    i += 2;
                } else {
                    toks.push(Tok::Colon);
                    i += 1;
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::EqEq);
                    i += 2;
                } else {
                    toks.push(Tok::Assign);
                    i += 1;
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Ne);
                    i += 2;
                } else {
                    return Err(ParseError::new("unexpected '!'").with_location(number, None));
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Le);
                    i += 2;
                } else {
                    toks.push(Tok::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Ge);
                    i += 2;
                } else {
                    toks.push(Tok::Gt);
                    i += 1;
                }
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    toks.push(Tok::StarStar);
                    i += 2;
                } else {
                    toks.push(Tok::Star);
                    i += 1;
                }
            }
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '[' => {
                toks.push(Tok::LBracket);
                i += 1;
            }
            ']' => {
                toks.push(Tok::RBracket);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '@' => {
                toks.push(Tok::At);
                i += 1;
            }
            '?' => {
                toks.push(Tok::Question);
                i += 1;
            }
            other => {
                return Err(ParseError::new(format!("unexpected character '{other}'"))
                    .with_location(number, None));
            }
        }
    }
    Ok(toks)
}

/// A cursor over one line's tokens. Owns its token list so the driver can
/// keep handing out `&mut self` while a statement is in flight.
struct Cursor {
    toks: Vec<Tok>,
    pos: usize,
    number: u32,
    text: String,
}

impl Cursor {
    fn new(line: &Line) -> Self {
        Cursor {
            toks: line.toks.clone(),
            pos: 0,
            number: line.number,
            text: line.text.clone(),
        }
    }

    fn fail(&self, msg: impl Into<String>) -> ParseError {
        ParseError::new(msg)
            .with_location(self.number, Some(self.pos as u32 + 1))
            .with_text(&self.text)
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn peek2(&self) -> Option<&Tok> {
        self.toks.get(self.pos + 1)
    }

    fn next(&mut self) -> Option<&Tok> {
        let tok = self.toks.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok) -> Result<(), ParseError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.fail(format!("expected {tok:?}")))
        }
    }

    fn expect_name(&mut self) -> Result<String, ParseError> {
        match self.next() {
            Some(Tok::Name(n)) => Ok(n.clone()),
            _ => Err(self.fail("expected a name")),
        }
    }

    /// A dotted name: `a.b.c`.
    fn dotted_name(&mut self) -> Result<String, ParseError> {
        let mut name = self.expect_name()?;
        while self.eat(&Tok::Dot) {
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        Ok(name)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.fail("trailing tokens"))
        }
    }

    fn name_is(&self, value: &str) -> bool {
        matches!(self.peek(), Some(Tok::Name(n)) if n == value)
    }
}

pub struct Driver<'a> {
    lines: Vec<Line>,
    pos: usize,
    builder: Builder<'a>,
}

impl<'a> Driver<'a> {
    pub fn new(src: &str, builder: Builder<'a>) -> Result<Self, ParseError> {
        Ok(Driver {
            lines: tokenize(src)?,
            pos: 0,
            builder,
        })
    }

    /// Parse the whole module and assemble the unit.
    pub fn parse(mut self, src: &str) -> Result<stubble_core::Unit, ParseError> {
        let defs = self.parse_defs(0, false)?;
        if self.pos < self.lines.len() {
            let line = &self.lines[self.pos];
            return Err(ParseError::new("unexpected indent")
                .with_location(line.number, None)
                .with_text(&line.text));
        }
        self.builder.finish(defs, src)
    }

    fn enrich(&self, err: ParseError, line_ix: usize) -> ParseError {
        if err.line().is_some() {
            return err;
        }
        match self.lines.get(line_ix) {
            Some(line) => err
                .with_location(line.number, None)
                .with_text(&line.text),
            None => err,
        }
    }

    /// The indentation of the first line of the block following `indent`,
    /// if the next line is deeper.
    fn block_indent(&self, indent: usize) -> Option<usize> {
        self.lines
            .get(self.pos)
            .map(|l| l.indent)
            .filter(|i| *i > indent)
    }

    fn parse_defs(&mut self, indent: usize, in_class: bool) -> Result<Vec<Def>, ParseError> {
        let mut defs = Vec::new();
        while let Some(line) = self.lines.get(self.pos) {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(ParseError::new("unexpected indent")
                    .with_location(line.number, None)
                    .with_text(&line.text));
            }
            let line_ix = self.pos;
            self.statement(indent, in_class, &mut defs)
                .map_err(|e| self.enrich(e, line_ix))?;
        }
        Ok(defs)
    }

    fn statement(
        &mut self,
        indent: usize,
        in_class: bool,
        defs: &mut Vec<Def>,
    ) -> Result<(), ParseError> {
        let cur = Cursor::new(&self.lines[self.pos]);
        let first = cur.peek().cloned();
        let second_is_assign = cur.peek2() == Some(&Tok::Assign);
        match first {
            Some(Tok::Name(n)) => match n.as_str() {
                "import" | "from" => {
                    self.pos += 1;
                    self.import_statement(cur)
                }
                "if" => self.conditional(indent, in_class, defs),
                "class" => {
                    self.class_statement(indent)?;
                    Ok(())
                }
                "def" => {
                    let def = self.function_statement(indent, Vec::new())?;
                    defs.push(def);
                    Ok(())
                }
                "pass" => {
                    self.pos += 1;
                    Ok(())
                }
                _ if second_is_assign => {
                    self.pos += 1;
                    self.assignment(cur, in_class, defs)
                }
                other => Err(cur.fail(format!("unexpected statement: {other}"))),
            },
            Some(Tok::At) => {
                let decorators = self.decorators()?;
                let def = self.function_statement(indent, decorators)?;
                defs.push(def);
                Ok(())
            }
            Some(Tok::Str(_)) => {
                // Docstring.
                self.pos += 1;
                Ok(())
            }
            _ => Err(cur.fail("unexpected statement")),
        }
    }

    // ---- imports ------------------------------------------------------

    fn import_statement(&mut self, mut cur: Cursor) -> Result<(), ParseError> {
        let keyword = cur.expect_name()?;
        if keyword == "import" {
            let mut items = Vec::new();
            loop {
                let name = cur.dotted_name()?;
                if cur.name_is("as") {
                    cur.next();
                    let new_name = cur.expect_name()?;
                    items.push(ImportItem::Renamed(name, new_name));
                } else {
                    items.push(ImportItem::Plain(name));
                }
                if !cur.eat(&Tok::Comma) {
                    break;
                }
            }
            cur.expect_end()?;
            self.builder.add_import(None, items)
        } else {
            let package = cur.dotted_name()?;
            let import_kw = cur.expect_name()?;
            if import_kw != "import" {
                return Err(cur.fail("expected 'import'"));
            }
            let mut items = Vec::new();
            loop {
                if cur.eat(&Tok::Star) {
                    items.push(ImportItem::Plain("*".to_string()));
                } else {
                    let name = cur.expect_name()?;
                    if cur.name_is("as") {
                        cur.next();
                        let new_name = cur.expect_name()?;
                        items.push(ImportItem::Renamed(name, new_name));
                    } else {
                        items.push(ImportItem::Plain(name));
                    }
                }
                if !cur.eat(&Tok::Comma) {
                    break;
                }
            }
            cur.expect_end()?;
            self.builder.add_import(Some(&package), items)
        }
    }

    // ---- assignments --------------------------------------------------

    fn assignment(
        &mut self,
        mut cur: Cursor,
        in_class: bool,
        defs: &mut Vec<Def>,
    ) -> Result<(), ParseError> {
        let name = cur.expect_name()?;
        cur.expect(Tok::Assign)?;
        match cur.peek() {
            Some(Tok::Name(head)) if head == "TypeVar" && cur.peek2() == Some(&Tok::LParen) => {
                if in_class {
                    return Err(cur.fail("TypeVar must be declared at module level"));
                }
                self.type_var(&name, cur)
            }
            Some(Tok::Ellipsis) => {
                cur.next();
                let value = if cur.eat(&Tok::TypeComment) {
                    let ty = self.parse_type(&mut cur)?;
                    ConstantValue::Type(ty)
                } else {
                    ConstantValue::None
                };
                cur.expect_end()?;
                defs.push(Def::Constant(self.builder.new_constant(&name, value)?));
                Ok(())
            }
            Some(Tok::Int(value)) => {
                let value = *value;
                cur.next();
                cur.expect_end()?;
                defs.push(Def::Constant(
                    self.builder.new_constant(&name, ConstantValue::Int(value))?,
                ));
                Ok(())
            }
            _ => {
                let ty = self.parse_type(&mut cur)?;
                cur.expect_end()?;
                if in_class {
                    defs.push(Def::Alias(Alias { name, ty }));
                } else {
                    self.builder.add_alias_or_constant(&name, ty);
                }
                Ok(())
            }
        }
    }

    fn type_var(&mut self, name: &str, mut cur: Cursor) -> Result<(), ParseError> {
        cur.expect_name()?; // TypeVar
        cur.expect(Tok::LParen)?;
        let name_arg = match cur.next() {
            Some(Tok::Str(s)) => s.clone(),
            _ => return Err(cur.fail("TypeVar needs a string name argument")),
        };
        let mut constraints = Vec::new();
        let mut kwargs = Vec::new();
        while cur.eat(&Tok::Comma) {
            if cur.peek() == Some(&Tok::RParen) {
                break;
            }
            let is_kwarg = matches!(cur.peek(), Some(Tok::Name(_)))
                && cur.peek2() == Some(&Tok::Assign);
            if is_kwarg {
                let key = cur.expect_name()?;
                cur.expect(Tok::Assign)?;
                let value = match cur.peek() {
                    Some(Tok::Name(v)) if v == "True" || v == "False" => {
                        let b = v == "True";
                        cur.next();
                        KwargValue::Bool(b)
                    }
                    _ => KwargValue::Type(self.parse_type(&mut cur)?),
                };
                kwargs.push((key, value));
            } else {
                constraints.push(self.parse_type(&mut cur)?);
            }
        }
        cur.expect(Tok::RParen)?;
        cur.expect_end()?;
        self.builder.add_type_var(name, &name_arg, constraints, kwargs)
    }

    // ---- conditionals -------------------------------------------------

    fn conditional(
        &mut self,
        indent: usize,
        in_class: bool,
        defs: &mut Vec<Def>,
    ) -> Result<(), ParseError> {
        let line = &self.lines[self.pos];
        let mut cur = Cursor::new(line);
        cur.next(); // if
        let cond = self.parse_condition(&mut cur)?;
        cur.expect(Tok::Colon)?;
        cur.expect_end()?;
        self.pos += 1;

        let mut clauses = Vec::new();
        let active = self.builder.if_begin(&cond)?;
        let block_indent = self
            .block_indent(indent)
            .ok_or_else(|| ParseError::new("expected an indented block"))?;
        let block = self.parse_defs(block_indent, in_class)?;
        clauses.push((active, block));

        loop {
            let Some(line) = self.lines.get(self.pos) else {
                break;
            };
            if line.indent != indent {
                break;
            }
            let mut cur = Cursor::new(line);
            if cur.name_is("elif") {
                cur.next();
                let cond = self.parse_condition(&mut cur)?;
                cur.expect(Tok::Colon)?;
                cur.expect_end()?;
                self.pos += 1;
                let active = self.builder.if_elif(&cond)?;
                let block_indent = self
                    .block_indent(indent)
                    .ok_or_else(|| ParseError::new("expected an indented block"))?;
                let block = self.parse_defs(block_indent, in_class)?;
                clauses.push((active, block));
            } else if cur.name_is("else") {
                cur.next();
                cur.expect(Tok::Colon)?;
                cur.expect_end()?;
                self.pos += 1;
                let active = self.builder.if_else();
                let block_indent = self
                    .block_indent(indent)
                    .ok_or_else(|| ParseError::new("expected an indented block"))?;
                let block = self.parse_defs(block_indent, in_class)?;
                clauses.push((active, block));
            } else {
                break;
            }
        }

        defs.extend(self.builder.if_end(clauses));
        Ok(())
    }

    fn parse_condition(&mut self, cur: &mut Cursor) -> Result<Condition, ParseError> {
        let mut cond = self.parse_comparison(cur)?;
        while cur.name_is("or") {
            cur.next();
            let right = self.parse_comparison(cur)?;
            cond = Condition::Or(Box::new(cond), Box::new(right));
        }
        Ok(cond)
    }

    fn parse_int(&self, cur: &mut Cursor) -> Result<i64, ParseError> {
        let negative = cur.eat(&Tok::Minus);
        match cur.next() {
            Some(Tok::Int(v)) => Ok(if negative { -*v } else { *v }),
            _ => Err(cur.fail("expected an integer")),
        }
    }

    fn parse_comparison(&mut self, cur: &mut Cursor) -> Result<Condition, ParseError> {
        let target = cur.dotted_name()?;
        let subscript = if cur.eat(&Tok::LBracket) {
            let start_empty = cur.peek() == Some(&Tok::Colon);
            if start_empty {
                cur.next();
                let end = if cur.peek() == Some(&Tok::RBracket) {
                    None
                } else {
                    Some(self.parse_int(cur)?)
                };
                cur.expect(Tok::RBracket)?;
                Subscript::Slice(None, end)
            } else {
                let first = self.parse_int(cur)?;
                if cur.eat(&Tok::Colon) {
                    let end = if cur.peek() == Some(&Tok::RBracket) {
                        None
                    } else {
                        Some(self.parse_int(cur)?)
                    };
                    cur.expect(Tok::RBracket)?;
                    Subscript::Slice(Some(first), end)
                } else {
                    cur.expect(Tok::RBracket)?;
                    Subscript::Index(first)
                }
            }
        } else {
            Subscript::Full
        };
        let op = match cur.next() {
            Some(Tok::EqEq) => CmpOp::Eq,
            Some(Tok::Ne) => CmpOp::Ne,
            Some(Tok::Lt) => CmpOp::Lt,
            Some(Tok::Le) => CmpOp::Le,
            Some(Tok::Gt) => CmpOp::Gt,
            Some(Tok::Ge) => CmpOp::Ge,
            _ => return Err(cur.fail("expected a comparison operator")),
        };
        let value = match cur.peek() {
            Some(Tok::LParen) => {
                cur.next();
                let mut values = Vec::new();
                while cur.peek() != Some(&Tok::RParen) {
                    values.push(self.parse_int(cur)?);
                    if !cur.eat(&Tok::Comma) {
                        break;
                    }
                }
                cur.expect(Tok::RParen)?;
                CondValue::IntTuple(values)
            }
            Some(Tok::Str(s)) => {
                let s = s.clone();
                cur.next();
                CondValue::Str(s)
            }
            _ => CondValue::Int(self.parse_int(cur)?),
        };
        Ok(Condition::Compare {
            target,
            subscript,
            op,
            value,
        })
    }

    // ---- classes ------------------------------------------------------

    fn class_statement(&mut self, indent: usize) -> Result<(), ParseError> {
        let line_ix = self.pos;
        let line = &self.lines[self.pos];
        let mut cur = Cursor::new(line);
        cur.next(); // class
        let name = cur.expect_name()?;

        let mut parent_args = Vec::new();
        if cur.eat(&Tok::LParen) {
            while cur.peek() != Some(&Tok::RParen) {
                let is_keyword = matches!(cur.peek(), Some(Tok::Name(_)))
                    && cur.peek2() == Some(&Tok::Assign);
                if is_keyword {
                    let keyword = cur.expect_name()?;
                    cur.expect(Tok::Assign)?;
                    let value = self.parse_type(&mut cur)?;
                    parent_args.push(ParentArg::Keyword(keyword, value));
                } else {
                    let ty = self.parse_type(&mut cur)?;
                    parent_args.push(ParentArg::Type(ty));
                }
                if !cur.eat(&Tok::Comma) {
                    break;
                }
            }
            cur.expect(Tok::RParen)?;
        }
        cur.expect(Tok::Colon)?;

        self.builder.register_class_name(&name);

        let defs = if cur.at_end() {
            self.pos += 1;
            match self.block_indent(indent) {
                Some(block_indent) => self.parse_defs(block_indent, true)?,
                None => {
                    return Err(self
                        .enrich(ParseError::new("expected an indented class body"), line_ix))
                }
            }
        } else {
            // Inline body: `class C: ...` or `class C: pass`.
            if !(cur.eat(&Tok::Ellipsis) || (cur.name_is("pass") && cur.next().is_some())) {
                return Err(cur.fail("expected '...' or 'pass'"));
            }
            cur.expect_end()?;
            self.pos += 1;
            Vec::new()
        };

        self.builder
            .add_class(&name, parent_args, defs)
            .map_err(|e| self.enrich(e, line_ix))
    }

    // ---- functions ----------------------------------------------------

    fn decorators(&mut self) -> Result<Vec<String>, ParseError> {
        let mut decorators = Vec::new();
        while let Some(line) = self.lines.get(self.pos) {
            let mut cur = Cursor::new(line);
            if !cur.eat(&Tok::At) {
                break;
            }
            decorators.push(cur.dotted_name()?);
            cur.expect_end()?;
            self.pos += 1;
        }
        Ok(decorators)
    }

    fn function_statement(
        &mut self,
        indent: usize,
        decorators: Vec<String>,
    ) -> Result<Def, ParseError> {
        let line_ix = self.pos;
        let mut cur = Cursor::new(&self.lines[self.pos]);
        if !cur.name_is("def") {
            return Err(cur.fail("expected 'def' after decorators"));
        }
        cur.next();
        let name = cur.expect_name()?;

        if cur.name_is("PYTHONCODE") {
            cur.next();
            cur.expect_end()?;
            self.pos += 1;
            return Ok(Def::Function(self.builder.new_external_function(&name)));
        }

        cur.expect(Tok::LParen)?;
        let mut params = Vec::new();
        while cur.peek() != Some(&Tok::RParen) {
            params.push(self.parse_param(&mut cur)?);
            if !cur.eat(&Tok::Comma) {
                break;
            }
        }
        cur.expect(Tok::RParen)?;

        let return_type = if cur.eat(&Tok::Arrow) {
            self.parse_type(&mut cur)?
        } else {
            Type::Anything
        };
        cur.expect(Tok::Colon)?;

        let body = if cur.at_end() {
            self.pos += 1;
            match self.block_indent(indent) {
                Some(block_indent) => self.parse_body(block_indent)?,
                None => {
                    return Err(
                        self.enrich(ParseError::new("expected an indented body"), line_ix)
                    )
                }
            }
        } else {
            if !(cur.eat(&Tok::Ellipsis) || (cur.name_is("pass") && cur.next().is_some())) {
                return Err(cur.fail("expected '...' or 'pass'"));
            }
            cur.expect_end()?;
            self.pos += 1;
            Vec::new()
        };

        let sig = self
            .builder
            .new_function(decorators, &name, params, return_type, body)
            .map_err(|e| self.enrich(e, line_ix))?;
        Ok(Def::Function(sig))
    }

    fn parse_param(&mut self, cur: &mut Cursor) -> Result<ParamDecl, ParseError> {
        match cur.peek() {
            Some(Tok::Ellipsis) => {
                cur.next();
                Ok(ParamDecl::Ellipsis)
            }
            Some(Tok::Star) => {
                cur.next();
                let name = match cur.peek() {
                    Some(Tok::Name(_)) => format!("*{}", cur.expect_name()?),
                    _ => "*".to_string(),
                };
                let ty = if cur.eat(&Tok::Colon) {
                    Some(self.parse_type(cur)?)
                } else {
                    None
                };
                Ok(ParamDecl::Param {
                    name,
                    ty,
                    default: None,
                })
            }
            Some(Tok::StarStar) => {
                cur.next();
                let name = format!("**{}", cur.expect_name()?);
                let ty = if cur.eat(&Tok::Colon) {
                    Some(self.parse_type(cur)?)
                } else {
                    None
                };
                Ok(ParamDecl::Param {
                    name,
                    ty,
                    default: None,
                })
            }
            _ => {
                let name = cur.expect_name()?;
                let ty = if cur.eat(&Tok::Colon) {
                    Some(self.parse_type(cur)?)
                } else {
                    None
                };
                let default = if cur.eat(&Tok::Assign) {
                    Some(self.parse_default(cur)?)
                } else {
                    None
                };
                Ok(ParamDecl::Param { name, ty, default })
            }
        }
    }

    fn parse_default(
        &mut self,
        cur: &mut Cursor,
    ) -> Result<crate::signatures::DefaultValue, ParseError> {
        use crate::signatures::DefaultValue;
        match cur.next() {
            Some(Tok::Ellipsis) => Ok(DefaultValue::Ellipsis),
            Some(Tok::Int(_)) => Ok(DefaultValue::Int),
            Some(Tok::Float) => Ok(DefaultValue::Float),
            Some(Tok::Minus) => match cur.next() {
                Some(Tok::Int(_)) => Ok(DefaultValue::Int),
                Some(Tok::Float) => Ok(DefaultValue::Float),
                _ => Err(cur.fail("expected a number")),
            },
            Some(Tok::Name(n)) if n == "None" => Ok(DefaultValue::NoneLiteral),
            Some(Tok::Name(_)) | Some(Tok::Str(_)) => Ok(DefaultValue::Other),
            _ => Err(cur.fail("expected a default value")),
        }
    }

    fn parse_body(&mut self, indent: usize) -> Result<Vec<BodyStmt>, ParseError> {
        let mut body = Vec::new();
        while let Some(line) = self.lines.get(self.pos) {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(ParseError::new("unexpected indent")
                    .with_location(line.number, None)
                    .with_text(&line.text));
            }
            let mut cur = Cursor::new(line);
            match cur.peek() {
                Some(Tok::Ellipsis) => {
                    cur.next();
                }
                Some(Tok::Str(_)) => {
                    cur.next();
                }
                Some(Tok::Name(n)) if n == "pass" => {
                    cur.next();
                }
                Some(Tok::Name(n)) if n == "raise" => {
                    cur.next();
                    let ty = self.parse_type(&mut cur)?;
                    if cur.eat(&Tok::LParen) {
                        cur.expect(Tok::RParen)?;
                    }
                    body.push(BodyStmt::Raise(ty));
                }
                Some(Tok::Name(_)) if cur.peek2() == Some(&Tok::ColonAssign) => {
                    let name = cur.expect_name()?;
                    cur.expect(Tok::ColonAssign)?;
                    let ty = self.parse_type(&mut cur)?;
                    body.push(BodyStmt::Mutate(name, ty));
                }
                _ => return Err(cur.fail("unexpected statement in function body")),
            }
            cur.expect_end()
                .map_err(|e| self.enrich(e, self.pos))?;
            self.pos += 1;
        }
        Ok(body)
    }

    // ---- types --------------------------------------------------------

    fn parse_type(&mut self, cur: &mut Cursor) -> Result<Type, ParseError> {
        let mut options = vec![self.parse_type_atom(cur)?];
        while cur.name_is("or") {
            cur.next();
            options.push(self.parse_type_atom(cur)?);
        }
        if options.len() == 1 {
            Ok(options.pop().unwrap())
        } else {
            Ok(self.builder.new_union_type(options))
        }
    }

    fn parse_type_atom(&mut self, cur: &mut Cursor) -> Result<Type, ParseError> {
        match cur.peek() {
            Some(Tok::Question) => {
                cur.next();
                Ok(Type::Anything)
            }
            Some(Tok::Name(n)) if n == "nothing" => {
                cur.next();
                Ok(Type::Nothing)
            }
            Some(Tok::Name(n)) if n == "NamedTuple" && cur.peek2() == Some(&Tok::LParen) => {
                self.parse_named_tuple(cur)
            }
            Some(Tok::Str(s)) => {
                // Quoted forward reference.
                let name = s.clone();
                cur.next();
                self.builder.new_type(&name, None)
            }
            Some(Tok::Name(_)) => {
                let name = cur.dotted_name()?;
                let parameters = if cur.eat(&Tok::LBracket) {
                    if cur.peek() == Some(&Tok::LParen) && cur.peek2() == Some(&Tok::RParen) {
                        // `Tuple[()]`: an empty parameter list.
                        cur.next();
                        cur.next();
                        cur.expect(Tok::RBracket)?;
                        Some(Vec::new())
                    } else {
                        let mut args = Vec::new();
                        while cur.peek() != Some(&Tok::RBracket) {
                            args.push(self.parse_type_arg(cur)?);
                            if !cur.eat(&Tok::Comma) {
                                break;
                            }
                        }
                        cur.expect(Tok::RBracket)?;
                        Some(args)
                    }
                } else {
                    None
                };
                self.builder.new_type(&name, parameters)
            }
            _ => Err(cur.fail("expected a type")),
        }
    }

    fn parse_type_arg(&mut self, cur: &mut Cursor) -> Result<TypeArg, ParseError> {
        match cur.peek() {
            Some(Tok::Ellipsis) => {
                cur.next();
                Ok(TypeArg::Ellipsis)
            }
            Some(Tok::LBracket) => {
                // An argument list, e.g. the first argument of Callable:
                // parsed as a heterogeneous tuple.
                cur.next();
                let mut args = Vec::new();
                while cur.peek() != Some(&Tok::RBracket) {
                    args.push(self.parse_type_arg(cur)?);
                    if !cur.eat(&Tok::Comma) {
                        break;
                    }
                }
                cur.expect(Tok::RBracket)?;
                Ok(TypeArg::Type(self.builder.new_type("tuple", Some(args))?))
            }
            _ => Ok(TypeArg::Type(self.parse_type(cur)?)),
        }
    }

    fn parse_named_tuple(&mut self, cur: &mut Cursor) -> Result<Type, ParseError> {
        cur.next(); // NamedTuple
        cur.expect(Tok::LParen)?;
        let base_name = match cur.next() {
            Some(Tok::Str(s)) => s.clone(),
            _ => return Err(cur.fail("NamedTuple needs a string name argument")),
        };
        cur.expect(Tok::Comma)?;
        cur.expect(Tok::LBracket)?;
        let mut fields = Vec::new();
        while cur.peek() != Some(&Tok::RBracket) {
            cur.expect(Tok::LParen)?;
            let field = match cur.next() {
                Some(Tok::Str(s)) => s.clone(),
                _ => return Err(cur.fail("expected a field name string")),
            };
            cur.expect(Tok::Comma)?;
            let ty = self.parse_type(cur)?;
            cur.expect(Tok::RParen)?;
            fields.push((field, ty));
            if !cur.eat(&Tok::Comma) {
                break;
            }
        }
        cur.expect(Tok::RBracket)?;
        cur.eat(&Tok::Comma);
        cur.expect(Tok::RParen)?;
        self.builder.new_named_tuple(&base_name, fields)
    }
}
