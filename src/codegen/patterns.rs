// This module defines the data model of the pattern-driven instruction selector. A target's
// instruction set is a static table of Patterns; each Pattern pairs a tree Shape with the
// Templates emitted when the shape is chosen. Shapes are matched against IR trees node by
// node: interior shapes must agree on the node kind and operator, while leaf shapes either
// bind a subtree to a register operand (Reg), accept only an existing temporary (Temp),
// capture an immediate whose value lies in the pattern's ImmRange (the equivalent of an
// "encodeable_as_imm32_sext" condition), or capture a label (Name). Bindings are collected
// in pre-order, left to right, and templates refer to them by index: `s0/`d0 name source
// and destination registers, `i0 an immediate, `j0 a label and `c the condition-code suffix
// of the matched comparison. Among all patterns that match a tree, the one covering the most
// nodes wins; ties go to the pattern declared first.

//! Pattern tables for tree-covering instruction selection.

use crate::core::temp::{Label, Temp};
use crate::ir::{BinOp, Exp, RelOp, Stm};

/// Inclusive range of immediates an instruction field can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImmRange {
    pub min: i64,
    pub max: i64,
}

impl ImmRange {
    pub const ANY: ImmRange = ImmRange {
        min: i64::MIN,
        max: i64::MAX,
    };

    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(self, value: i64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Tree shape a pattern covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Any expression, evaluated into a register.
    Reg,
    /// An existing temporary, bound as a register without emitting code.
    Temp,
    /// A constant within the range, bound as an immediate.
    Imm(ImmRange),
    /// This exact constant; binds nothing.
    Const(i64),
    /// A label, bound as a jump operand.
    Name,
    BinOp(BinOp, &'static Shape, &'static Shape),
    Mem(&'static Shape),
    /// A call of the function shape; the static link and arguments are
    /// lowered by the selector.
    Call(&'static Shape),
    Move(&'static Shape, &'static Shape),
    Exp(&'static Shape),
    /// A jump; the statement's target list is bound after the child.
    Jump(&'static Shape),
    /// A conditional jump, optionally restricted to one relation. Binds the
    /// relation for `c, then both operands, then the true and false labels.
    CJump(Option<RelOp>, &'static Shape, &'static Shape),
}

pub const REG: &Shape = &Shape::Reg;
pub const TEMP: &Shape = &Shape::Temp;
pub const NAME: &Shape = &Shape::Name;
pub const IMM: &Shape = &Shape::Imm(ImmRange::ANY);

impl Shape {
    /// IR nodes covered by this shape. `Reg` covers nothing of its own.
    pub fn size(&self) -> usize {
        match self {
            Shape::Reg => 0,
            Shape::Temp | Shape::Imm(_) | Shape::Const(_) | Shape::Name => 1,
            Shape::BinOp(_, l, r) | Shape::Move(l, r) | Shape::CJump(_, l, r) => {
                1 + l.size() + r.size()
            }
            Shape::Mem(e) | Shape::Call(e) | Shape::Exp(e) | Shape::Jump(e) => 1 + e.size(),
        }
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            Shape::Move(..) | Shape::Exp(_) | Shape::Jump(_) | Shape::CJump(..)
        )
    }
}

/// Operand slot of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// The fresh temp holding the value of the covered expression.
    Result,
    /// The n-th register binding.
    Reg(usize),
    /// A physical register, by assembler name.
    Phys(&'static str),
}

pub const RESULT: Operand = Operand::Result;
pub const R0: Operand = Operand::Reg(0);
pub const R1: Operand = Operand::Reg(1);
pub const R2: Operand = Operand::Reg(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Oper,
    /// A register-to-register copy the allocator may coalesce.
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effects {
    None,
    /// Clobbers the caller-saved registers and reads the argument registers.
    Call,
}

/// One assembly instruction emitted for a chosen pattern.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub asm: &'static str,
    pub kind: TemplateKind,
    pub dst: &'static [Operand],
    pub src: &'static [Operand],
    /// Indices into the label bindings.
    pub jump: &'static [usize],
    /// Indices into the immediate bindings.
    pub imm: &'static [usize],
    pub effects: Effects,
}

impl Template {
    pub const fn oper(asm: &'static str) -> Self {
        Self {
            asm,
            kind: TemplateKind::Oper,
            dst: &[],
            src: &[],
            jump: &[],
            imm: &[],
            effects: Effects::None,
        }
    }

    pub const fn mov(asm: &'static str) -> Self {
        Self {
            kind: TemplateKind::Move,
            ..Self::oper(asm)
        }
    }

    pub const fn dst(self, dst: &'static [Operand]) -> Self {
        Self { dst, ..self }
    }

    pub const fn src(self, src: &'static [Operand]) -> Self {
        Self { src, ..self }
    }

    pub const fn jump(self, jump: &'static [usize]) -> Self {
        Self { jump, ..self }
    }

    pub const fn imm(self, imm: &'static [usize]) -> Self {
        Self { imm, ..self }
    }

    pub const fn call(self) -> Self {
        Self {
            effects: Effects::Call,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Pattern {
    pub name: &'static str,
    pub shape: Shape,
    pub emit: &'static [Template],
}

/// Templates used to place call arguments.
///
/// `Result` is the destination register in the `*_to_reg` templates. The
/// stack template reads the stack pointer as `Reg(0)`, the value as `Reg(1)`
/// and the byte offset as immediate 0. Constant arguments outside `imm` are
/// selected like any other expression.
#[derive(Debug, Clone, Copy)]
pub struct ArgLowering {
    pub imm: ImmRange,
    pub imm_to_reg: Template,
    pub label_to_reg: Template,
    pub reg_to_reg: Template,
    pub reg_to_stack: Template,
}

/// Everything the selector needs to know about one target's instructions.
#[derive(Debug)]
pub struct InstructionSet {
    pub name: &'static str,
    pub patterns: &'static [Pattern],
    pub args: ArgLowering,
    /// Assembler directive for a NUL-terminated string literal.
    pub string_directive: &'static str,
    /// Condition-code suffix substituted for `c.
    pub condition: fn(RelOp) -> &'static str,
}

/// Operands captured while matching one pattern.
#[derive(Debug, Default)]
pub struct Bindings<'t> {
    /// Subtrees to evaluate into registers, in binding order.
    pub regs: Vec<&'t Exp>,
    pub imms: Vec<i64>,
    pub labels: Vec<Label>,
    pub relop: Option<RelOp>,
    /// Arguments of a matched call, lowered after the register bindings.
    pub call_args: Option<&'t [Exp]>,
    pub call_link: Option<&'t Exp>,
}

pub fn match_exp<'t>(shape: &Shape, exp: &'t Exp, b: &mut Bindings<'t>) -> bool {
    match (shape, exp) {
        (Shape::Reg, _) => {
            b.regs.push(exp);
            true
        }
        (Shape::Temp, Exp::Temp(_)) => {
            b.regs.push(exp);
            true
        }
        (Shape::Imm(range), Exp::Const(value)) if range.contains(*value) => {
            b.imms.push(*value);
            true
        }
        (Shape::Const(expected), Exp::Const(value)) => expected == value,
        (Shape::Name, Exp::Name(label)) => {
            b.labels.push(label.clone());
            true
        }
        (Shape::BinOp(op, l, r), Exp::BinOp(actual, left, right)) => {
            op == actual && match_exp(l, left, b) && match_exp(r, right, b)
        }
        (Shape::Mem(addr), Exp::Mem(inner)) => match_exp(addr, inner, b),
        (Shape::Call(func), Exp::Call(f, link, args)) => {
            if !match_exp(func, f, b) {
                return false;
            }
            b.call_args = Some(args);
            b.call_link = link.as_deref();
            true
        }
        _ => false,
    }
}

pub fn match_stm<'t>(shape: &Shape, stm: &'t Stm, b: &mut Bindings<'t>) -> bool {
    match (shape, stm) {
        (Shape::Move(d, s), Stm::Move(dst, src)) => match_exp(d, dst, b) && match_exp(s, src, b),
        (Shape::Exp(e), Stm::Exp(exp)) => match_exp(e, exp, b),
        (Shape::Jump(e), Stm::Jump(target, labels)) => {
            if !match_exp(e, target, b) {
                return false;
            }
            b.labels.extend(labels.iter().cloned());
            true
        }
        (
            Shape::CJump(relop, l, r),
            Stm::CJump {
                op,
                left,
                right,
                t,
                f,
            },
        ) => {
            if relop.is_some_and(|expected| expected != *op) {
                return false;
            }
            b.relop = Some(*op);
            if !(match_exp(l, left, b) && match_exp(r, right, b)) {
                return false;
            }
            b.labels.push(t.clone());
            b.labels.push(f.clone());
            true
        }
        _ => false,
    }
}

/// Tree whose root a pattern must cover.
#[derive(Debug, Clone, Copy)]
pub enum Tree<'t> {
    Exp(&'t Exp),
    Stm(&'t Stm),
}

impl InstructionSet {
    /// The largest matching pattern for `tree`, with its bindings.
    ///
    /// Patterns are tried in declaration order and a later pattern only
    /// replaces the current best when it covers strictly more nodes.
    pub fn select<'t>(&self, tree: Tree<'t>) -> Option<(&'static Pattern, Bindings<'t>)> {
        let mut best: Option<(&'static Pattern, Bindings<'t>)> = None;
        for pattern in self.patterns {
            let mut bindings = Bindings::default();
            let matched = match tree {
                Tree::Exp(exp) => !pattern.shape.is_statement()
                    && match_exp(&pattern.shape, exp, &mut bindings),
                Tree::Stm(stm) => pattern.shape.is_statement()
                    && match_stm(&pattern.shape, stm, &mut bindings),
            };
            if !matched {
                continue;
            }
            let better = match &best {
                Some((current, _)) => pattern.shape.size() > current.shape.size(),
                None => true,
            };
            if better {
                best = Some((pattern, bindings));
            }
        }
        best
    }
}

/// Register operands after evaluation of the bindings.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'b> {
    pub regs: &'b [Temp],
    pub imms: &'b [i64],
    pub labels: &'b [Label],
    pub relop: Option<RelOp>,
    pub result: Option<Temp>,
}
