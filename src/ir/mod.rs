//! Target-independent tree IR.
//!
//! Produced by the translator, flattened by [`canon`] and consumed by the
//! instruction selector. Every node owns its children exclusively; trees are
//! built once and never mutated afterwards.

pub mod canon;

use crate::core::temp::{Label, Temp};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Plus,
    Minus,
    Mul,
    Div,
    And,
    Or,
    Xor,
    LShift,
    RShift,
    ArShift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl RelOp {
    /// The relation that holds exactly when `self` does not.
    pub fn negate(self) -> Self {
        match self {
            RelOp::Eq => RelOp::Ne,
            RelOp::Ne => RelOp::Eq,
            RelOp::Lt => RelOp::Ge,
            RelOp::Ge => RelOp::Lt,
            RelOp::Gt => RelOp::Le,
            RelOp::Le => RelOp::Gt,
            RelOp::Ult => RelOp::Uge,
            RelOp::Uge => RelOp::Ult,
            RelOp::Ugt => RelOp::Ule,
            RelOp::Ule => RelOp::Ugt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exp {
    Const(i64),
    Name(Label),
    Temp(Temp),
    BinOp(BinOp, Box<Exp>, Box<Exp>),
    Mem(Box<Exp>),
    /// Function, static link (nested functions only), arguments.
    Call(Box<Exp>, Option<Box<Exp>>, Vec<Exp>),
    ESeq(Box<Stm>, Box<Exp>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stm {
    Move(Box<Exp>, Box<Exp>),
    Exp(Box<Exp>),
    Jump(Box<Exp>, Vec<Label>),
    CJump {
        op: RelOp,
        left: Box<Exp>,
        right: Box<Exp>,
        t: Label,
        f: Label,
    },
    Seq(Box<Stm>, Box<Stm>),
    Label(Label),
}

impl Exp {
    pub fn binop(op: BinOp, left: Exp, right: Exp) -> Self {
        Exp::BinOp(op, Box::new(left), Box::new(right))
    }

    pub fn mem(addr: Exp) -> Self {
        Exp::Mem(Box::new(addr))
    }

    pub fn call(func: Exp, args: Vec<Exp>) -> Self {
        Exp::Call(Box::new(func), None, args)
    }

    /// Call passing `link` in the callee's static-link slot.
    pub fn linked_call(func: Exp, link: Exp, args: Vec<Exp>) -> Self {
        Exp::Call(Box::new(func), Some(Box::new(link)), args)
    }

    pub fn eseq(stm: Stm, exp: Exp) -> Self {
        Exp::ESeq(Box::new(stm), Box::new(exp))
    }

    /// Number of nodes in the tree, statements included.
    pub fn size(&self) -> usize {
        match self {
            Exp::Const(_) | Exp::Name(_) | Exp::Temp(_) => 1,
            Exp::BinOp(_, l, r) => 1 + l.size() + r.size(),
            Exp::Mem(e) => 1 + e.size(),
            Exp::Call(f, link, args) => {
                1 + f.size()
                    + link.as_ref().map_or(0, |l| l.size())
                    + args.iter().map(Exp::size).sum::<usize>()
            }
            Exp::ESeq(s, e) => 1 + s.size() + e.size(),
        }
    }
}

impl Stm {
    pub fn mov(dst: Exp, src: Exp) -> Self {
        Stm::Move(Box::new(dst), Box::new(src))
    }

    pub fn exp(exp: Exp) -> Self {
        Stm::Exp(Box::new(exp))
    }

    pub fn jump(label: Label) -> Self {
        Stm::Jump(Box::new(Exp::Name(label.clone())), vec![label])
    }

    pub fn cjump(op: RelOp, left: Exp, right: Exp, t: Label, f: Label) -> Self {
        Stm::CJump {
            op,
            left: Box::new(left),
            right: Box::new(right),
            t,
            f,
        }
    }

    /// Statement that does nothing.
    pub fn nop() -> Self {
        Stm::exp(Exp::Const(0))
    }

    pub fn is_nop(&self) -> bool {
        matches!(self, Stm::Exp(e) if matches!(**e, Exp::Const(_)))
    }

    /// Right-nested `Seq` of `stms`; an empty list becomes a no-op.
    pub fn seq(stms: Vec<Stm>) -> Self {
        let mut iter = stms.into_iter().rev();
        let Some(last) = iter.next() else {
            return Stm::nop();
        };
        iter.fold(last, |rest, stm| Stm::Seq(Box::new(stm), Box::new(rest)))
    }

    pub fn size(&self) -> usize {
        match self {
            Stm::Move(d, s) => 1 + d.size() + s.size(),
            Stm::Exp(e) => 1 + e.size(),
            Stm::Jump(e, _) => 1 + e.size(),
            Stm::CJump { left, right, .. } => 1 + left.size() + right.size(),
            Stm::Seq(a, b) => 1 + a.size() + b.size(),
            Stm::Label(_) => 1,
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinOp::Plus => "PLUS",
            BinOp::Minus => "MINUS",
            BinOp::Mul => "MUL",
            BinOp::Div => "DIV",
            BinOp::And => "AND",
            BinOp::Or => "OR",
            BinOp::Xor => "XOR",
            BinOp::LShift => "LSHIFT",
            BinOp::RShift => "RSHIFT",
            BinOp::ArShift => "ARSHIFT",
        };
        f.write_str(name)
    }
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelOp::Eq => "EQ",
            RelOp::Ne => "NE",
            RelOp::Lt => "LT",
            RelOp::Gt => "GT",
            RelOp::Le => "LE",
            RelOp::Ge => "GE",
            RelOp::Ult => "ULT",
            RelOp::Ule => "ULE",
            RelOp::Ugt => "UGT",
            RelOp::Uge => "UGE",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Exp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exp::Const(n) => write!(f, "CONST {}", n),
            Exp::Name(l) => write!(f, "NAME {}", l),
            Exp::Temp(t) => write!(f, "TEMP {}", t),
            Exp::BinOp(op, l, r) => write!(f, "BINOP({}, {}, {})", op, l, r),
            Exp::Mem(e) => write!(f, "MEM({})", e),
            Exp::Call(func, link, args) => {
                write!(f, "CALL({}", func)?;
                if let Some(link) = link {
                    write!(f, ", LINK {}", link)?;
                }
                for arg in args {
                    write!(f, ", {}", arg)?;
                }
                f.write_str(")")
            }
            Exp::ESeq(s, e) => write!(f, "ESEQ({}, {})", s, e),
        }
    }
}

impl fmt::Display for Stm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stm::Move(d, s) => write!(f, "MOVE({}, {})", d, s),
            Stm::Exp(e) => write!(f, "EXP({})", e),
            Stm::Jump(e, _) => write!(f, "JUMP({})", e),
            Stm::CJump {
                op,
                left,
                right,
                t,
                f: fl,
            } => write!(f, "CJUMP({}, {}, {}, {}, {})", op, left, right, t, fl),
            Stm::Seq(a, b) => write!(f, "SEQ({}, {})", a, b),
            Stm::Label(l) => write!(f, "LABEL {}", l),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::temp::TempAuthority;

    #[test]
    fn test_seq_of_nothing_is_nop() {
        assert!(Stm::seq(vec![]).is_nop());
    }

    #[test]
    fn test_seq_nests_to_the_right() {
        let mut temps = TempAuthority::new();
        let (a, b, c) = (temps.new_label(), temps.new_label(), temps.new_label());
        let stm = Stm::seq(vec![
            Stm::Label(a.clone()),
            Stm::Label(b.clone()),
            Stm::Label(c.clone()),
        ]);
        let expected = Stm::Seq(
            Box::new(Stm::Label(a)),
            Box::new(Stm::Seq(Box::new(Stm::Label(b)), Box::new(Stm::Label(c)))),
        );
        assert_eq!(stm, expected);
    }

    #[test]
    fn test_display_shows_tree_shape() {
        let mut temps = TempAuthority::new();
        let t = temps.new_temp();
        let exp = Exp::mem(Exp::binop(BinOp::Plus, Exp::Temp(t), Exp::Const(-8)));
        assert_eq!(exp.to_string(), "MEM(BINOP(PLUS, TEMP t0, CONST -8))");
        assert_eq!(exp.size(), 4);
    }

    #[test]
    fn test_negate_is_an_involution() {
        for op in [RelOp::Eq, RelOp::Lt, RelOp::Le, RelOp::Ult, RelOp::Uge] {
            assert_ne!(op.negate(), op);
            assert_eq!(op.negate().negate(), op);
        }
    }
}
