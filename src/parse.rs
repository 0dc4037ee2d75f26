//! Análisis sintáctico.
//!
//! Descenso recursivo sobre la gramática de SNL. El resultado es un AST
//! tipado en el cual toda parte opcional ausente se representa con una
//! colección vacía, nunca por omisión. Las cadenas de operadores binarios
//! asocian a la izquierda. Las comparaciones solo pueden aparecer como
//! condición de `if` y `while`.

use std::{io::BufRead, iter::Peekable, marker::PhantomData};
use thiserror::Error;

use crate::{
    error::Diagnostics,
    lex::{Identifier, Keyword, Lexer, Token},
    source::{self, Located, Location},
};

#[derive(Debug)]
pub struct Program {
    pub name: Located<Identifier>,
    pub declarations: DeclarePart,
    pub body: Vec<Statement>,
}

/// Declaraciones de un programa o procedimiento, en orden de sección.
#[derive(Debug, Default)]
pub struct DeclarePart {
    pub types: Vec<TypeDec>,
    pub vars: Vec<VarDec>,
    pub procedures: Vec<ProcDec>,
}

#[derive(Debug)]
pub struct TypeDec {
    pub name: Located<Identifier>,
    pub of: Located<TypeName>,
}

/// Referencia sintáctica a un tipo.
#[derive(Debug)]
pub enum TypeName {
    Integer,
    Char,
    Array {
        low: Located<i32>,
        high: Located<i32>,
        of: Box<Located<TypeName>>,
    },
    Record(Vec<FieldDec>),
    Alias(Identifier),
}

#[derive(Debug)]
pub struct FieldDec {
    pub of: Located<TypeName>,
    pub names: Vec<Located<Identifier>>,
}

#[derive(Debug)]
pub struct VarDec {
    pub of: Located<TypeName>,
    pub names: Vec<Located<Identifier>>,
}

#[derive(Debug)]
pub struct ProcDec {
    pub name: Located<Identifier>,
    pub params: Vec<Param>,
    pub declarations: DeclarePart,
    pub body: Vec<Statement>,
}

/// Grupo de parámetros formales que comparten tipo y modo de paso.
#[derive(Debug)]
pub struct Param {
    pub passing: Passing,
    pub of: Located<TypeName>,
    pub names: Vec<Located<Identifier>>,
}

/// Modo de paso de un parámetro.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Passing {
    Value,
    Reference,
}

#[derive(Debug)]
pub enum Statement {
    Assign {
        target: Located<Variable>,
        value: Located<Expr>,
    },

    Call {
        procedure: Located<Identifier>,
        args: Vec<Located<Expr>>,
    },

    Conditional {
        condition: Located<Expr>,
        then: Vec<Statement>,
        otherwise: Vec<Statement>,
    },

    Loop {
        condition: Located<Expr>,
        body: Vec<Statement>,
    },

    Input(Located<Identifier>),
    Output(Located<Expr>),
    Return(Located<Expr>),
}

#[derive(Debug)]
pub enum Expr {
    Integer(i32),
    Char(char),
    Var(Variable),
    Binary(Box<Located<Expr>>, BinOp, Box<Located<Expr>>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Less,
    Equal,
}

/// Acceso a una variable, posiblemente a través de índices y campos.
#[derive(Debug)]
pub struct Variable {
    pub name: Located<Identifier>,
    pub path: Vec<Located<Accessor>>,
}

#[derive(Debug)]
pub enum Accessor {
    Index(Located<Expr>),
    Field(Located<Identifier>),
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected {0}, found {1} instead")]
    UnexpectedToken(Token, Token),

    #[error("Expected {0}, none was found instead")]
    MissingToken(Token),

    #[error("Expected identifier")]
    ExpectedId,

    #[error("Expected integer literal")]
    ExpectedInteger,

    #[error("Expected any of `if`, `while`, `read`, `write`, `return`, assignment or call")]
    ExpectedStatement,

    #[error("Expected any of `integer`, `char`, `array`, `record` or a type name")]
    ExpectedType,

    #[error("Record fields must be `integer`, `char` or arrays")]
    ExpectedFieldType,

    #[error("Expected an expression")]
    ExpectedExpr,

    #[error("Expected `<` or `=`")]
    ExpectedComparison,

    #[error("Unexpected tokens after end of program")]
    TrailingTokens,

    #[error("Abrupt end of program")]
    UnexpectedEof,
}

/// Construye el AST de un programa completo.
pub fn parse<'a, I>(tokens: I) -> Result<Program, Located<ParserError>>
where
    I: Iterator<Item = &'a Located<Token>> + Clone,
{
    let mut parser = Parser {
        tokens: tokens.peekable(),
        last_known: Location::default(),
        lifetime_hack: PhantomData,
    };

    parser.program().map_err(Failure::coerce)
}

/// Análisis léxico y sintáctico de un archivo de código fuente.
pub fn from_reader<R, S>(reader: R, name: S) -> Result<Program, Diagnostics>
where
    R: BufRead,
    S: Into<String>,
{
    let (start, chars) = source::consume(reader, name);
    let tokens = Lexer::new(start, chars).try_exhaustive()?;

    Ok(parse(tokens.iter())?)
}

#[derive(Clone)]
struct Parser<'a, I: Iterator<Item = &'a Located<Token>> + Clone> {
    tokens: Peekable<I>,
    last_known: Location,
    lifetime_hack: PhantomData<&'a ()>,
}

enum Failure {
    Weak(Located<ParserError>),
    Strict(Located<ParserError>),
}

impl Failure {
    fn weak(self) -> Self {
        Failure::Weak(self.coerce())
    }

    fn strict(self) -> Self {
        Failure::Strict(self.coerce())
    }

    fn coerce(self) -> Located<ParserError> {
        match self {
            Failure::Weak(error) => error,
            Failure::Strict(error) => error,
        }
    }
}

type Parse<T> = Result<T, Failure>;

impl<'a, I> Parser<'a, I>
where
    I: Iterator<Item = &'a Located<Token>> + Clone,
{
    fn program(&mut self) -> Parse<Program> {
        self.keyword(Keyword::Program)?;
        let name = self.id()?;

        let declarations = self.declare_part()?;
        let body = self.body()?;
        self.expect(Token::Period)?;

        if self.tokens.peek().is_some() {
            self.next()?;
            return self.fail(ParserError::TrailingTokens);
        }

        Ok(Program {
            name,
            declarations,
            body,
        })
    }

    fn declare_part(&mut self) -> Parse<DeclarePart> {
        let types = match self.optional(|s| s.keyword(Keyword::Type).map_err(Failure::weak))? {
            Some(()) => self.one_or_more(Parser::type_dec)?,
            None => Vec::new(),
        };

        let vars = match self.optional(|s| s.keyword(Keyword::Var).map_err(Failure::weak))? {
            Some(()) => self.one_or_more(Parser::var_dec)?,
            None => Vec::new(),
        };

        let mut procedures = Vec::new();
        while self.peek() == Some(Token::Keyword(Keyword::Procedure)) {
            procedures.push(self.procedure()?);
        }

        Ok(DeclarePart {
            types,
            vars,
            procedures,
        })
    }

    fn type_dec(&mut self) -> Parse<TypeDec> {
        let name = self.id().map_err(Failure::weak)?;
        self.expect(Token::Equal)?;

        let of = self.type_name().map_err(Failure::strict)?;
        self.expect(Token::Semicolon)?;

        Ok(TypeDec { name, of })
    }

    fn var_dec(&mut self) -> Parse<VarDec> {
        let of = self.type_name()?;
        let names = self.comma_separated(Parser::id, false)?;
        self.expect(Token::Semicolon)?;

        Ok(VarDec { of, names })
    }

    fn procedure(&mut self) -> Parse<ProcDec> {
        self.keyword(Keyword::Procedure)?;
        let name = self.id()?;

        self.expect(Token::OpenParen)?;
        let mut params = Vec::new();
        if self.peek() != Some(Token::CloseParen) {
            loop {
                params.push(self.param()?);
                match self.optional(|s| s.expect(Token::Semicolon).map_err(Failure::weak))? {
                    Some(()) => continue,
                    None => break,
                }
            }
        }

        self.expect(Token::CloseParen)?;
        self.expect(Token::Semicolon)?;

        let declarations = self.declare_part()?;
        let body = self.body()?;

        Ok(ProcDec {
            name,
            params,
            declarations,
            body,
        })
    }

    fn param(&mut self) -> Parse<Param> {
        let passing = match self.optional(|s| s.keyword(Keyword::Var).map_err(Failure::weak))? {
            Some(()) => Passing::Reference,
            None => Passing::Value,
        };

        let of = self.type_name().map_err(Failure::strict)?;
        let names = self.comma_separated(Parser::id, false)?;

        Ok(Param { passing, of, names })
    }

    fn type_name(&mut self) -> Parse<Located<TypeName>> {
        match self.peek() {
            Some(Token::Keyword(Keyword::Integer | Keyword::Char)) => self.base_type(),
            Some(Token::Keyword(Keyword::Array)) => self.array_type(),
            Some(Token::Keyword(Keyword::Record)) => self.record_type(),

            Some(Token::Id(_)) => {
                let id = self.id()?;
                Ok(id.map(TypeName::Alias))
            }

            _ => {
                self.next()?;
                self.fail(ParserError::ExpectedType).map_err(Failure::weak)
            }
        }
    }

    fn base_type(&mut self) -> Parse<Located<TypeName>> {
        let (location, token) = self.next()?.split();
        let typ = match token {
            Token::Keyword(Keyword::Integer) => TypeName::Integer,
            Token::Keyword(Keyword::Char) => TypeName::Char,
            _ => self.fail(ParserError::ExpectedType)?,
        };

        Ok(Located::at(typ, location))
    }

    fn array_type(&mut self) -> Parse<Located<TypeName>> {
        self.keyword(Keyword::Array)?;
        let start = self.last_known.clone();

        self.expect(Token::OpenSquare)?;
        let low = self.integer()?;
        self.expect(Token::Range)?;
        let high = self.integer()?;
        self.expect(Token::CloseSquare)?;
        self.keyword(Keyword::Of)?;

        let of = Box::new(self.base_type()?);
        let location = Location::span(start, &self.last_known);

        Ok(Located::at(TypeName::Array { low, high, of }, location))
    }

    fn record_type(&mut self) -> Parse<Located<TypeName>> {
        self.keyword(Keyword::Record)?;
        let start = self.last_known.clone();

        let fields = self.one_or_more(Parser::field_dec)?;
        self.keyword(Keyword::End)?;

        let location = Location::span(start, &self.last_known);
        Ok(Located::at(TypeName::Record(fields), location))
    }

    fn field_dec(&mut self) -> Parse<FieldDec> {
        let of = self.type_name()?;
        if let TypeName::Record(_) | TypeName::Alias(_) = of.as_ref() {
            return self.fail(ParserError::ExpectedFieldType);
        }

        let names = self.comma_separated(Parser::id, false)?;
        self.expect(Token::Semicolon)?;

        Ok(FieldDec { of, names })
    }

    fn body(&mut self) -> Parse<Vec<Statement>> {
        self.keyword(Keyword::Begin)?;
        let statements = self.statement_list()?;
        self.keyword(Keyword::End)?;

        Ok(statements)
    }

    fn statement_list(&mut self) -> Parse<Vec<Statement>> {
        let mut statements = vec![self.statement().map_err(Failure::strict)?];
        while self
            .optional(|s| s.expect(Token::Semicolon).map_err(Failure::weak))?
            .is_some()
        {
            // Se tolera un `;` antes del final del bloque
            match self.attempt(Parser::statement) {
                Ok(statement) => statements.push(statement),
                Err(Failure::Weak(_)) => break,
                Err(error) => return Err(error),
            }
        }

        Ok(statements)
    }

    fn statement(&mut self) -> Parse<Statement> {
        match self.peek() {
            Some(Token::Keyword(Keyword::If)) => self.conditional(),
            Some(Token::Keyword(Keyword::While)) => self.loop_statement(),

            Some(Token::Keyword(Keyword::Read)) => {
                self.next()?;
                self.expect(Token::OpenParen)?;
                let target = self.id()?;
                self.expect(Token::CloseParen)?;

                Ok(Statement::Input(target))
            }

            Some(Token::Keyword(Keyword::Write)) => {
                self.next()?;
                Ok(Statement::Output(self.parenthesized()?))
            }

            Some(Token::Keyword(Keyword::Return)) => {
                self.next()?;
                Ok(Statement::Return(self.parenthesized()?))
            }

            Some(Token::Id(_)) => self.assignment_or_call(),

            _ => {
                self.next()?;
                self.fail(ParserError::ExpectedStatement)
                    .map_err(Failure::weak)
            }
        }
    }

    fn conditional(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::If)?;
        let condition = self.condition()?;

        self.keyword(Keyword::Then)?;
        let then = self.statement_list()?;

        let otherwise =
            match self.optional(|s| s.keyword(Keyword::Else).map_err(Failure::weak))? {
                Some(()) => self.statement_list()?,
                None => Vec::new(),
            };

        self.keyword(Keyword::Fi)?;

        Ok(Statement::Conditional {
            condition,
            then,
            otherwise,
        })
    }

    fn loop_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::While)?;
        let condition = self.condition()?;

        self.keyword(Keyword::Do)?;
        let body = self.statement_list()?;
        self.keyword(Keyword::Endwh)?;

        Ok(Statement::Loop { condition, body })
    }

    fn assignment_or_call(&mut self) -> Parse<Statement> {
        if let Some(Token::OpenParen) = self.lookahead(|s| {
            s.next()?;
            Ok(s.peek())
        })? {
            let procedure = self.id()?;
            self.expect(Token::OpenParen)?;
            let args = self.comma_separated(Parser::expr, true)?;
            self.expect(Token::CloseParen)?;

            return Ok(Statement::Call { procedure, args });
        }

        let target = self.variable()?;
        self.expect(Token::Assign)?;
        let value = self.expr().map_err(Failure::strict)?;

        Ok(Statement::Assign { target, value })
    }

    fn parenthesized(&mut self) -> Parse<Located<Expr>> {
        self.expect(Token::OpenParen)?;
        let expr = self.expr().map_err(Failure::strict)?;
        self.expect(Token::CloseParen)?;

        Ok(expr)
    }

    fn condition(&mut self) -> Parse<Located<Expr>> {
        let lhs = self.expr().map_err(Failure::strict)?;
        let op = match self.next()?.into_inner() {
            Token::Less => BinOp::Less,
            Token::Equal => BinOp::Equal,
            _ => return self.fail(ParserError::ExpectedComparison),
        };

        let rhs = self.expr().map_err(Failure::strict)?;
        Ok(binary(lhs, op, rhs))
    }

    fn expr(&mut self) -> Parse<Located<Expr>> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break Ok(lhs),
            };

            self.next()?;
            let rhs = self.term().map_err(Failure::strict)?;
            lhs = binary(lhs, op, rhs);
        }
    }

    fn term(&mut self) -> Parse<Located<Expr>> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Times) => BinOp::Mul,
                Some(Token::Over) => BinOp::Div,
                _ => break Ok(lhs),
            };

            self.next()?;
            let rhs = self.factor().map_err(Failure::strict)?;
            lhs = binary(lhs, op, rhs);
        }
    }

    fn factor(&mut self) -> Parse<Located<Expr>> {
        match self.peek() {
            Some(Token::Id(_)) => {
                let (location, var) = self.variable()?.split();
                Ok(Located::at(Expr::Var(var), location))
            }

            Some(Token::OpenParen) => self.parenthesized(),

            _ => {
                let (location, token) = self.next()?.split();
                match token {
                    Token::IntLiteral(integer) => Ok(Located::at(Expr::Integer(integer), location)),
                    Token::CharLiteral(c) => Ok(Located::at(Expr::Char(c), location)),
                    _ => self.fail(ParserError::ExpectedExpr).map_err(Failure::weak),
                }
            }
        }
    }

    fn variable(&mut self) -> Parse<Located<Variable>> {
        let name = self.id()?;

        let mut path = Vec::new();
        loop {
            match self.attempt(Parser::accessor) {
                Err(Failure::Weak(_)) => break,
                accessor => path.push(accessor?),
            }
        }

        let id_location = name.location().clone();
        let location = match path.last() {
            Some(last) => Location::span(id_location, last.location()),
            None => id_location,
        };

        Ok(Located::at(Variable { name, path }, location))
    }

    fn accessor(&mut self) -> Parse<Located<Accessor>> {
        let (start, token) = self.next().map_err(Failure::weak)?.split();
        match token {
            Token::OpenSquare => {
                let index = self.expr().map_err(Failure::strict)?;
                self.expect(Token::CloseSquare)?;

                let location = Location::span(start, &self.last_known);
                Ok(Located::at(Accessor::Index(index), location))
            }

            // Un `.` que no precede a un identificador es el final del programa
            Token::Period => {
                let field = self.id().map_err(Failure::weak)?;
                let location = Location::span(start, field.location());

                Ok(Located::at(Accessor::Field(field), location))
            }

            _ => self.fail(ParserError::ExpectedExpr).map_err(Failure::weak),
        }
    }

    fn integer(&mut self) -> Parse<Located<i32>> {
        let (location, token) = self.next()?.split();
        match token {
            Token::IntLiteral(integer) => Ok(Located::at(integer, location)),
            _ => self.fail(ParserError::ExpectedInteger),
        }
    }

    /// Aplica una regla al menos una vez y luego mientras no falle débilmente.
    fn one_or_more<T, F>(&mut self, mut rule: F) -> Parse<Vec<T>>
    where
        F: FnMut(&mut Self) -> Parse<T>,
    {
        let mut items = vec![rule(self).map_err(Failure::strict)?];
        loop {
            match self.attempt(|s| rule(s)) {
                Err(Failure::Weak(_)) => break Ok(items),
                item => items.push(item?),
            }
        }
    }

    fn optional<T, F>(&mut self, rule: F) -> Parse<Option<T>>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        match self.attempt(rule) {
            Err(Failure::Weak(_)) => Ok(None),
            result => Ok(Some(result?)),
        }
    }

    fn attempt<T, F>(&mut self, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        let mut fork = self.clone();

        let result = rule(&mut fork);
        if result.is_ok() {
            *self = fork;
        }

        result
    }

    fn lookahead<T, F>(&mut self, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        rule(&mut self.clone())
    }

    fn comma_separated<T, F>(&mut self, mut rule: F, allow_empty: bool) -> Parse<Vec<T>>
    where
        F: FnMut(&mut Self) -> Parse<T>,
    {
        let mut items = match self.attempt(|s| rule(s)) {
            Err(Failure::Weak(_)) if allow_empty => return Ok(Vec::new()),
            item => vec![item.map_err(Failure::strict)?],
        };

        loop {
            match self.attempt(|s| s.expect(Token::Comma).map_err(Failure::weak)) {
                Err(Failure::Weak(_)) => break Ok(items),
                result => {
                    result?;
                    items.push(rule(self).map_err(Failure::strict)?);
                }
            }
        }
    }

    fn peek(&mut self) -> Option<Token> {
        self.tokens.peek().map(|token| token.as_ref().clone())
    }

    fn id(&mut self) -> Parse<Located<Identifier>> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Id(id) => Ok(Located::at(id, location)),
            _ => self.fail(ParserError::ExpectedId),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect(&mut self, token: Token) -> Parse<()> {
        match self.next().map(Located::into_inner) {
            Ok(found) if found == token => Ok(()),
            Ok(found) => self.fail(ParserError::UnexpectedToken(token, found)),
            Err(_) => self.fail(ParserError::MissingToken(token)),
        }
    }

    fn next(&mut self) -> Parse<Located<Token>> {
        match self.tokens.next() {
            Some(token) => {
                self.last_known = token.location().clone();
                Ok(token.clone())
            }

            None => self.fail(ParserError::UnexpectedEof),
        }
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Failure::Strict(Located::at(error, self.last_known.clone())))
    }
}

fn binary(lhs: Located<Expr>, op: BinOp, rhs: Located<Expr>) -> Located<Expr> {
    let location = Location::span(lhs.location().clone(), rhs.location());
    Located::at(Expr::Binary(Box::new(lhs), op, Box::new(rhs)), location)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(text: &str) -> Program {
        from_reader(text.as_bytes(), "test.snl").unwrap()
    }

    fn failure(text: &str) -> String {
        match from_reader(text.as_bytes(), "test.snl") {
            Ok(_) => panic!("program was accepted"),
            Err(diagnostics) => diagnostics.to_string(),
        }
    }

    #[test]
    fn declarations() {
        let program = program(
            "program p
             type t = array [1..5] of char;
                  r = record integer a, b; array [0..2] of integer c; end;
             var integer x, y; t z;
             procedure f(integer a; var r b);
             var integer local;
             begin local := a end
             begin x := 1 end.",
        );

        let declarations = &program.declarations;
        assert_eq!(program.name.as_ref().as_ref(), "p");
        assert_eq!(declarations.types.len(), 2);
        assert_eq!(declarations.vars.len(), 2);
        assert_eq!(declarations.vars[0].names.len(), 2);

        match declarations.types[0].of.as_ref() {
            TypeName::Array { low, high, .. } => {
                assert_eq!((*low.as_ref(), *high.as_ref()), (1, 5));
            }

            other => panic!("unexpected type {:?}", other),
        }

        let f = &declarations.procedures[0];
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.params[0].passing, Passing::Value);
        assert_eq!(f.params[1].passing, Passing::Reference);
        assert_eq!(f.declarations.vars.len(), 1);
    }

    #[test]
    fn left_associative_chains() {
        let program = program("program p var integer x; begin x := 8 - 2 - 1 * 3 end.");

        // ((8 - 2) - (1 * 3))
        let value = match &program.body[0] {
            Statement::Assign { value, .. } => value.as_ref(),
            other => panic!("unexpected statement {:?}", other),
        };

        match value {
            Expr::Binary(lhs, BinOp::Sub, rhs) => {
                assert!(matches!(lhs.as_ref().as_ref(), Expr::Binary(_, BinOp::Sub, _)));
                assert!(matches!(rhs.as_ref().as_ref(), Expr::Binary(_, BinOp::Mul, _)));
            }

            other => panic!("unexpected expression {:?}", other),
        }
    }

    #[test]
    fn statements() {
        let program = program(
            "program p
             var integer i; array [0..3] of integer a;
             begin
                read(i);
                while i < 4 do a[i] := i; i := i + 1 endwh;
                if a[0] = 0 then write(a[1]) else f(i, a) fi;
             end.",
        );

        assert_eq!(program.body.len(), 3);
        match &program.body[1] {
            Statement::Loop { body, .. } => assert_eq!(body.len(), 2),
            other => panic!("unexpected statement {:?}", other),
        }

        match &program.body[2] {
            Statement::Conditional { then, otherwise, .. } => {
                assert!(matches!(then[0], Statement::Output(_)));
                assert!(matches!(&otherwise[0], Statement::Call { args, .. } if args.len() == 2));
            }

            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn field_access_before_final_period() {
        let program = program(
            "program p var record integer a; end r; begin r.a := 1; write(r.a) end.",
        );

        match &program.body[0] {
            Statement::Assign { target, .. } => {
                assert!(matches!(target.as_ref().path[0].as_ref(), Accessor::Field(_)));
            }

            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn comparison_outside_condition() {
        let message = failure("program p var integer x; begin x := 1 < 2 end.");
        assert!(message.contains("Expected keyword `end`"), "{}", message);
    }

    #[test]
    fn missing_fi() {
        let message = failure("program p var integer x; begin if x < 1 then x := 1 end.");
        assert!(message.contains("keyword `fi`"), "{}", message);
    }
}
