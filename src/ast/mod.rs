//! Abstract syntax tree handed over by the front end.
//!
//! The parser and type checker live outside this crate. The tree arrives
//! already type checked; the only annotations the back end relies on are the
//! resolved record field slots ([`Var::Field`]) and the string-operand marker
//! on comparisons ([`Exp::Op`]). Escape flags start out `false` and are owned
//! by the node that introduces the variable.

pub mod build;

use std::fmt;

pub type Symbol = String;

/// Source position, 1-based. `Pos::default()` means "no location".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    pub fn is_known(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oper {
    Plus,
    Minus,
    Times,
    Divide,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Oper {
    pub fn is_comparison(self) -> bool {
        !matches!(self, Oper::Plus | Oper::Minus | Oper::Times | Oper::Divide)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Var {
    Simple {
        name: Symbol,
        pos: Pos,
    },
    Field {
        var: Box<Var>,
        field: Symbol,
        /// Zero-based slot of `field` in its record, resolved by the type checker.
        slot: Option<usize>,
        pos: Pos,
    },
    Subscript {
        var: Box<Var>,
        index: Box<Exp>,
        pos: Pos,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub name: Symbol,
    pub value: Exp,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Exp {
    Var(Var),
    Nil,
    Int(i64),
    String(String, Pos),
    Call {
        func: Symbol,
        args: Vec<Exp>,
        pos: Pos,
    },
    Op {
        left: Box<Exp>,
        oper: Oper,
        right: Box<Exp>,
        /// Set by the type checker when both operands are strings.
        strings: bool,
        pos: Pos,
    },
    /// Fields appear in the order of the record type declaration.
    Record {
        typ: Symbol,
        fields: Vec<RecordField>,
        pos: Pos,
    },
    Seq(Vec<Exp>),
    Assign {
        var: Var,
        exp: Box<Exp>,
        pos: Pos,
    },
    If {
        test: Box<Exp>,
        then: Box<Exp>,
        otherwise: Option<Box<Exp>>,
        pos: Pos,
    },
    While {
        test: Box<Exp>,
        body: Box<Exp>,
        pos: Pos,
    },
    For {
        var: Symbol,
        escape: bool,
        lo: Box<Exp>,
        hi: Box<Exp>,
        body: Box<Exp>,
        pos: Pos,
    },
    Break(Pos),
    Let {
        decs: Vec<Dec>,
        body: Box<Exp>,
        pos: Pos,
    },
    Array {
        typ: Symbol,
        size: Box<Exp>,
        init: Box<Exp>,
        pos: Pos,
    },
}

/// A formal parameter or record type field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: Symbol,
    pub escape: bool,
    pub typ: Symbol,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunDec {
    pub name: Symbol,
    pub params: Vec<Field>,
    pub result: Option<Symbol>,
    pub body: Exp,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Name(Symbol, Pos),
    Record(Vec<Field>),
    Array(Symbol, Pos),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDec {
    pub name: Symbol,
    pub ty: Ty,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dec {
    /// A group of adjacent, possibly mutually recursive functions.
    Function(Vec<FunDec>),
    Var {
        name: Symbol,
        escape: bool,
        typ: Option<Symbol>,
        init: Box<Exp>,
        pos: Pos,
    },
    Type(Vec<TypeDec>),
}
