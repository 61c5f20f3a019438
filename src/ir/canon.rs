//! Canonicalisation of IR trees.
//!
//! [`linearize`] rewrites a statement into a flat list in which
//! - no `ESeq` node remains,
//! - no `Seq` node remains (the list itself is the sequence),
//! - a `Call` only appears as `Move(Temp, Call(..))` or `Exp(Call(..))`,
//!   so call arguments never contain calls.
//!
//! Basic blocks and trace scheduling are not done here; every `CJump`
//! keeps both of its targets.

use super::{Exp, Stm};
use crate::core::temp::TempAuthority;

/// Flatten `stm` into a list of canonical statements.
pub fn linearize(stm: Stm, temps: &mut TempAuthority) -> Vec<Stm> {
    let mut out = Vec::new();
    flatten(do_stm(stm, temps), &mut out);
    out
}

fn flatten(stm: Stm, out: &mut Vec<Stm>) {
    match stm {
        Stm::Seq(a, b) => {
            flatten(*a, out);
            flatten(*b, out);
        }
        stm if stm.is_nop() => {}
        stm => out.push(stm),
    }
}

fn seq(a: Stm, b: Stm) -> Stm {
    if a.is_nop() {
        b
    } else if b.is_nop() {
        a
    } else {
        Stm::Seq(Box::new(a), Box::new(b))
    }
}

/// Conservative: only constants and labels are known to be unaffected by `stm`.
fn commutes(stm: &Stm, exp: &Exp) -> bool {
    stm.is_nop() || matches!(exp, Exp::Const(_) | Exp::Name(_))
}

/// Pull the side effects out of `exps`, preserving left-to-right evaluation.
fn reorder(exps: Vec<Exp>, temps: &mut TempAuthority) -> (Stm, Vec<Exp>) {
    let mut effects = Stm::nop();
    let mut values = Vec::with_capacity(exps.len());

    for exp in exps.into_iter().rev() {
        let exp = match exp {
            call @ Exp::Call(..) => {
                let t = temps.new_temp();
                Exp::eseq(Stm::mov(Exp::Temp(t), call), Exp::Temp(t))
            }
            other => other,
        };
        let (stm, value) = do_exp(exp, temps);
        if commutes(&effects, &value) {
            effects = seq(stm, effects);
            values.push(value);
        } else {
            let t = temps.new_temp();
            effects = seq(stm, seq(Stm::mov(Exp::Temp(t), value), effects));
            values.push(Exp::Temp(t));
        }
    }

    values.reverse();
    (effects, values)
}

fn reorder_one(exp: Exp, temps: &mut TempAuthority) -> (Stm, Exp) {
    let (stm, mut values) = reorder(vec![exp], temps);
    (stm, values.remove(0))
}

fn reorder_two(a: Exp, b: Exp, temps: &mut TempAuthority) -> (Stm, Exp, Exp) {
    let (stm, mut values) = reorder(vec![a, b], temps);
    let a = values.remove(0);
    let b = values.remove(0);
    (stm, a, b)
}

/// Reorder a call's function expression, static link and arguments together.
fn reorder_call(
    func: Exp,
    link: Option<Box<Exp>>,
    args: Vec<Exp>,
    temps: &mut TempAuthority,
) -> (Stm, Exp) {
    let linked = link.is_some();
    let mut exps = Vec::with_capacity(args.len() + 2);
    exps.push(func);
    exps.extend(link.map(|l| *l));
    exps.extend(args);
    let (stm, mut values) = reorder(exps, temps);
    let func = Box::new(values.remove(0));
    let link = if linked {
        Some(Box::new(values.remove(0)))
    } else {
        None
    };
    (stm, Exp::Call(func, link, values))
}

fn do_stm(stm: Stm, temps: &mut TempAuthority) -> Stm {
    match stm {
        Stm::Seq(a, b) => {
            let a = do_stm(*a, temps);
            let b = do_stm(*b, temps);
            seq(a, b)
        }
        Stm::Jump(target, labels) => {
            let (stm, target) = reorder_one(*target, temps);
            seq(stm, Stm::Jump(Box::new(target), labels))
        }
        Stm::CJump {
            op,
            left,
            right,
            t,
            f,
        } => {
            let (stm, left, right) = reorder_two(*left, *right, temps);
            seq(stm, Stm::cjump(op, left, right, t, f))
        }
        Stm::Move(dst, src) => match (*dst, *src) {
            (Exp::Temp(t), Exp::Call(func, link, args)) => {
                let (stm, call) = reorder_call(*func, link, args, temps);
                seq(stm, Stm::mov(Exp::Temp(t), call))
            }
            (Exp::Temp(t), src) => {
                let (stm, src) = reorder_one(src, temps);
                seq(stm, Stm::mov(Exp::Temp(t), src))
            }
            (Exp::Mem(addr), src) => {
                let (stm, addr, src) = reorder_two(*addr, src, temps);
                seq(stm, Stm::mov(Exp::mem(addr), src))
            }
            (Exp::ESeq(effect, dst), src) => {
                do_stm(Stm::Seq(effect, Box::new(Stm::Move(dst, Box::new(src)))), temps)
            }
            (dst, src) => {
                log::warn!("move into non-lvalue {}", dst);
                let (stm, src) = reorder_one(src, temps);
                seq(stm, Stm::mov(dst, src))
            }
        },
        Stm::Exp(exp) => match *exp {
            Exp::Call(func, link, args) => {
                let (stm, call) = reorder_call(*func, link, args, temps);
                seq(stm, Stm::exp(call))
            }
            exp => {
                let (stm, exp) = reorder_one(exp, temps);
                seq(stm, Stm::exp(exp))
            }
        },
        label @ Stm::Label(_) => label,
    }
}

fn do_exp(exp: Exp, temps: &mut TempAuthority) -> (Stm, Exp) {
    match exp {
        Exp::BinOp(op, left, right) => {
            let (stm, left, right) = reorder_two(*left, *right, temps);
            (stm, Exp::binop(op, left, right))
        }
        Exp::Mem(addr) => {
            let (stm, addr) = reorder_one(*addr, temps);
            (stm, Exp::mem(addr))
        }
        Exp::ESeq(stm, exp) => {
            let first = do_stm(*stm, temps);
            let (second, exp) = do_exp(*exp, temps);
            (seq(first, second), exp)
        }
        Exp::Call(func, link, args) => reorder_call(*func, link, args, temps),
        leaf => (Stm::nop(), leaf),
    }
}
