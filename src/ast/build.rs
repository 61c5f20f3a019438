//! Terse constructors for AST nodes.
//!
//! The front end builds trees straight from source; tests and the `lowerdump`
//! tool build them with these helpers instead. Nodes get `Pos::default()`
//! unless an `_at` variant is used. Parameters and variables default to
//! the `int` type and every escape flag starts out `false`.

use super::*;

pub fn int(value: i64) -> Exp {
    Exp::Int(value)
}

pub fn nil() -> Exp {
    Exp::Nil
}

pub fn string(text: &str) -> Exp {
    Exp::String(text.to_string(), Pos::default())
}

pub fn simple(name: &str) -> Var {
    simple_at(name, Pos::default())
}

pub fn simple_at(name: &str, pos: Pos) -> Var {
    Var::Simple {
        name: name.to_string(),
        pos,
    }
}

pub fn field(var: Var, name: &str, slot: usize) -> Var {
    Var::Field {
        var: Box::new(var),
        field: name.to_string(),
        slot: Some(slot),
        pos: Pos::default(),
    }
}

/// Field access the type checker never resolved.
pub fn unresolved_field_at(var: Var, name: &str, pos: Pos) -> Var {
    Var::Field {
        var: Box::new(var),
        field: name.to_string(),
        slot: None,
        pos,
    }
}

pub fn subscript(var: Var, index: Exp) -> Var {
    Var::Subscript {
        var: Box::new(var),
        index: Box::new(index),
        pos: Pos::default(),
    }
}

pub fn var(name: &str) -> Exp {
    Exp::Var(simple(name))
}

pub fn var_at(name: &str, pos: Pos) -> Exp {
    Exp::Var(simple_at(name, pos))
}

pub fn lvalue(var: Var) -> Exp {
    Exp::Var(var)
}

pub fn call(func: &str, args: Vec<Exp>) -> Exp {
    call_at(func, args, Pos::default())
}

pub fn call_at(func: &str, args: Vec<Exp>, pos: Pos) -> Exp {
    Exp::Call {
        func: func.to_string(),
        args,
        pos,
    }
}

pub fn op(left: Exp, oper: Oper, right: Exp) -> Exp {
    Exp::Op {
        left: Box::new(left),
        oper,
        right: Box::new(right),
        strings: false,
        pos: Pos::default(),
    }
}

pub fn plus(left: Exp, right: Exp) -> Exp {
    op(left, Oper::Plus, right)
}

pub fn minus(left: Exp, right: Exp) -> Exp {
    op(left, Oper::Minus, right)
}

pub fn times(left: Exp, right: Exp) -> Exp {
    op(left, Oper::Times, right)
}

pub fn divide(left: Exp, right: Exp) -> Exp {
    op(left, Oper::Divide, right)
}

pub fn eq(left: Exp, right: Exp) -> Exp {
    op(left, Oper::Eq, right)
}

pub fn lt(left: Exp, right: Exp) -> Exp {
    op(left, Oper::Lt, right)
}

pub fn le(left: Exp, right: Exp) -> Exp {
    op(left, Oper::Le, right)
}

pub fn gt(left: Exp, right: Exp) -> Exp {
    op(left, Oper::Gt, right)
}

/// String comparison as annotated by the type checker.
pub fn string_cmp(left: Exp, oper: Oper, right: Exp) -> Exp {
    Exp::Op {
        left: Box::new(left),
        oper,
        right: Box::new(right),
        strings: true,
        pos: Pos::default(),
    }
}

pub fn record(typ: &str, fields: Vec<(&str, Exp)>) -> Exp {
    Exp::Record {
        typ: typ.to_string(),
        fields: fields
            .into_iter()
            .map(|(name, value)| RecordField {
                name: name.to_string(),
                value,
                pos: Pos::default(),
            })
            .collect(),
        pos: Pos::default(),
    }
}

pub fn array(typ: &str, size: Exp, init: Exp) -> Exp {
    Exp::Array {
        typ: typ.to_string(),
        size: Box::new(size),
        init: Box::new(init),
        pos: Pos::default(),
    }
}

pub fn seq(exps: Vec<Exp>) -> Exp {
    Exp::Seq(exps)
}

pub fn assign(var: Var, exp: Exp) -> Exp {
    Exp::Assign {
        var,
        exp: Box::new(exp),
        pos: Pos::default(),
    }
}

pub fn if_then(test: Exp, then: Exp) -> Exp {
    Exp::If {
        test: Box::new(test),
        then: Box::new(then),
        otherwise: None,
        pos: Pos::default(),
    }
}

pub fn if_else(test: Exp, then: Exp, otherwise: Exp) -> Exp {
    Exp::If {
        test: Box::new(test),
        then: Box::new(then),
        otherwise: Some(Box::new(otherwise)),
        pos: Pos::default(),
    }
}

pub fn while_loop(test: Exp, body: Exp) -> Exp {
    Exp::While {
        test: Box::new(test),
        body: Box::new(body),
        pos: Pos::default(),
    }
}

pub fn for_loop(name: &str, lo: Exp, hi: Exp, body: Exp) -> Exp {
    Exp::For {
        var: name.to_string(),
        escape: false,
        lo: Box::new(lo),
        hi: Box::new(hi),
        body: Box::new(body),
        pos: Pos::default(),
    }
}

pub fn brk() -> Exp {
    Exp::Break(Pos::default())
}

pub fn brk_at(pos: Pos) -> Exp {
    Exp::Break(pos)
}

pub fn let_in(decs: Vec<Dec>, body: Exp) -> Exp {
    Exp::Let {
        decs,
        body: Box::new(body),
        pos: Pos::default(),
    }
}

pub fn var_dec(name: &str, init: Exp) -> Dec {
    Dec::Var {
        name: name.to_string(),
        escape: false,
        typ: None,
        init: Box::new(init),
        pos: Pos::default(),
    }
}

pub fn typed_var_dec(name: &str, typ: &str, init: Exp) -> Dec {
    Dec::Var {
        name: name.to_string(),
        escape: false,
        typ: Some(typ.to_string()),
        init: Box::new(init),
        pos: Pos::default(),
    }
}

pub fn param(name: &str) -> Field {
    Field {
        name: name.to_string(),
        escape: false,
        typ: "int".to_string(),
        pos: Pos::default(),
    }
}

pub fn fundec(name: &str, params: &[&str], result: Option<&str>, body: Exp) -> FunDec {
    FunDec {
        name: name.to_string(),
        params: params.iter().map(|p| param(p)).collect(),
        result: result.map(str::to_string),
        body,
        pos: Pos::default(),
    }
}

pub fn fun_dec(fundec: FunDec) -> Dec {
    Dec::Function(vec![fundec])
}

pub fn fun_group(fundecs: Vec<FunDec>) -> Dec {
    Dec::Function(fundecs)
}

pub fn record_type(name: &str, fields: &[&str]) -> Dec {
    Dec::Type(vec![TypeDec {
        name: name.to_string(),
        ty: Ty::Record(fields.iter().map(|f| param(f)).collect()),
        pos: Pos::default(),
    }])
}

pub fn array_type(name: &str, element: &str) -> Dec {
    Dec::Type(vec![TypeDec {
        name: name.to_string(),
        ty: Ty::Array(element.to_string(), Pos::default()),
        pos: Pos::default(),
    }])
}
