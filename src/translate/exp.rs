//! Translated expressions and the conversions between their three forms.

use crate::core::error::{CompileError, CompileResult};
use crate::core::temp::{Label, TempAuthority};
use crate::ir::{Exp, RelOp, Stm};

/// A comparison whose branch targets are not known yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cond {
    pub op: RelOp,
    pub left: Exp,
    pub right: Exp,
}

/// An AST expression after lowering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrExp {
    /// Produces a value.
    Ex(Exp),
    /// Produces no value.
    Nx(Stm),
    /// A condition, to be turned into a jump.
    Cx(Cond),
}

impl TrExp {
    pub fn cond(op: RelOp, left: Exp, right: Exp) -> Self {
        TrExp::Cx(Cond { op, left, right })
    }

    /// The value of the expression. A condition yields 1 or 0.
    pub fn un_ex(self, temps: &mut TempAuthority) -> Exp {
        match self {
            TrExp::Ex(exp) => exp,
            TrExp::Nx(stm) => Exp::eseq(stm, Exp::Const(0)),
            TrExp::Cx(cond) => {
                let r = temps.new_temp();
                let t = temps.new_label();
                let f = temps.new_label();
                Exp::eseq(
                    Stm::seq(vec![
                        Stm::mov(Exp::Temp(r), Exp::Const(1)),
                        Stm::cjump(cond.op, cond.left, cond.right, t.clone(), f.clone()),
                        Stm::Label(f),
                        Stm::mov(Exp::Temp(r), Exp::Const(0)),
                        Stm::Label(t),
                    ]),
                    Exp::Temp(r),
                )
            }
        }
    }

    /// The expression evaluated for its effects only.
    pub fn un_nx(self, temps: &mut TempAuthority) -> Stm {
        match self {
            TrExp::Ex(exp) => Stm::exp(exp),
            TrExp::Nx(stm) => stm,
            TrExp::Cx(cond) => {
                let join = temps.new_label();
                Stm::seq(vec![
                    Stm::cjump(cond.op, cond.left, cond.right, join.clone(), join.clone()),
                    Stm::Label(join),
                ])
            }
        }
    }

    /// A jump to `t` when the expression is true (non-zero), to `f` otherwise.
    ///
    /// A statement has no truth value; asking for one is a translator bug
    /// reported as `StatementAsCondition`.
    pub fn un_cx(self, t: Label, f: Label) -> CompileResult<Stm> {
        match self {
            TrExp::Cx(cond) => Ok(Stm::cjump(cond.op, cond.left, cond.right, t, f)),
            TrExp::Ex(Exp::Const(0)) => Ok(Stm::jump(f)),
            TrExp::Ex(Exp::Const(_)) => Ok(Stm::jump(t)),
            TrExp::Ex(exp) => Ok(Stm::cjump(RelOp::Ne, exp, Exp::Const(0), t, f)),
            TrExp::Nx(stm) => Err(CompileError::StatementAsCondition {
                stm: stm.to_string(),
            }),
        }
    }

    pub fn is_nx(&self) -> bool {
        matches!(self, TrExp::Nx(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_as_value_materialises_one_or_zero() {
        let mut temps = TempAuthority::new();
        let cx = TrExp::cond(RelOp::Lt, Exp::Const(1), Exp::Const(2));
        match cx.un_ex(&mut temps) {
            Exp::ESeq(stm, value) => {
                assert!(matches!(*value, Exp::Temp(_)));
                let stms = crate::ir::canon::linearize(*stm, &mut temps);
                assert_eq!(stms.len(), 5);
                assert!(matches!(stms[1], Stm::CJump { op: RelOp::Lt, .. }));
            }
            other => panic!("expected ESEQ, got {}", other),
        }
    }

    #[test]
    fn test_constant_conditions_become_plain_jumps() {
        let (t, f) = (Label::named("t"), Label::named("f"));
        assert_eq!(
            TrExp::Ex(Exp::Const(0)).un_cx(t.clone(), f.clone()),
            Ok(Stm::jump(f.clone()))
        );
        assert_eq!(
            TrExp::Ex(Exp::Const(7)).un_cx(t.clone(), f.clone()),
            Ok(Stm::jump(t.clone()))
        );
    }

    #[test]
    fn test_value_condition_compares_against_zero() {
        let mut temps = TempAuthority::new();
        let x = temps.new_temp();
        let (t, f) = (temps.new_label(), temps.new_label());
        let stm = TrExp::Ex(Exp::Temp(x)).un_cx(t.clone(), f.clone()).unwrap();
        assert_eq!(stm, Stm::cjump(RelOp::Ne, Exp::Temp(x), Exp::Const(0), t, f));
    }

    #[test]
    fn test_statement_as_condition_is_an_internal_error() {
        let mut temps = TempAuthority::new();
        let (t, f) = (temps.new_label(), temps.new_label());
        let nx = TrExp::Nx(Stm::Label(Label::named("done")));
        let err = nx.un_cx(t, f).unwrap_err();
        assert_eq!(
            err,
            CompileError::StatementAsCondition {
                stm: "LABEL done".to_string()
            }
        );
        assert_eq!(err.diagnostic().message, "internal error");
    }

    #[test]
    fn test_statement_value_is_zero() {
        let mut temps = TempAuthority::new();
        let l = temps.new_label();
        let exp = TrExp::Nx(Stm::Label(l.clone())).un_ex(&mut temps);
        assert_eq!(exp, Exp::eseq(Stm::Label(l), Exp::Const(0)));
    }
}
