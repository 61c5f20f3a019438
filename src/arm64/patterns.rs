//! AArch64 instruction patterns.
//!
//! Frame accesses use the unscaled `ldur`/`stur` forms, whose signed 9-bit
//! offset covers every slot near the frame pointer. Constants that do not
//! fit a `mov` immediate are loaded from the literal pool.

use crate::codegen::patterns::{
    ArgLowering, ImmRange, InstructionSet, Operand, Pattern, Shape, Template, NAME, R0, R1, REG,
    RESULT, TEMP,
};
use crate::ir::{BinOp, RelOp};

const SIMM9: &Shape = &Shape::Imm(ImmRange { min: -256, max: 255 });
const UIMM12: &Shape = &Shape::Imm(ImmRange { min: 0, max: 4095 });
const UIMM16: &Shape = &Shape::Imm(ImmRange { min: 0, max: 65535 });
const SHIFT: &Shape = &Shape::Imm(ImmRange { min: 0, max: 63 });

const X0: Operand = Operand::Phys("x0");

fn condition(op: RelOp) -> &'static str {
    match op {
        RelOp::Eq => "eq",
        RelOp::Ne => "ne",
        RelOp::Lt => "lt",
        RelOp::Gt => "gt",
        RelOp::Le => "le",
        RelOp::Ge => "ge",
        RelOp::Ult => "lo",
        RelOp::Ule => "ls",
        RelOp::Ugt => "hi",
        RelOp::Uge => "hs",
    }
}

const fn three_reg(asm: &'static str) -> Template {
    Template::oper(asm).dst(&[RESULT]).src(&[R0, R1])
}

const fn reg_imm(asm: &'static str) -> Template {
    Template::oper(asm).dst(&[RESULT]).src(&[R0]).imm(&[0])
}

static PATTERNS: &[Pattern] = &[
    Pattern {
        name: "stur",
        shape: Shape::Move(&Shape::Mem(&Shape::BinOp(BinOp::Plus, REG, SIMM9)), REG),
        emit: &[Template::oper("stur `s1, [`s0, #`i0]").src(&[R0, R1]).imm(&[0])],
    },
    Pattern {
        name: "str",
        shape: Shape::Move(&Shape::Mem(REG), REG),
        emit: &[Template::oper("str `s1, [`s0]").src(&[R0, R1])],
    },
    Pattern {
        name: "ldur-into",
        shape: Shape::Move(TEMP, &Shape::Mem(&Shape::BinOp(BinOp::Plus, REG, SIMM9))),
        emit: &[Template::oper("ldur `d0, [`s0, #`i0]").dst(&[R0]).src(&[R1]).imm(&[0])],
    },
    Pattern {
        name: "ldr-into",
        shape: Shape::Move(TEMP, &Shape::Mem(REG)),
        emit: &[Template::oper("ldr `d0, [`s0]").dst(&[R0]).src(&[R1])],
    },
    Pattern {
        name: "mov-imm-into",
        shape: Shape::Move(TEMP, UIMM16),
        emit: &[Template::oper("mov `d0, #`i0").dst(&[R0]).imm(&[0])],
    },
    Pattern {
        name: "adr-into",
        shape: Shape::Move(TEMP, NAME),
        emit: &[Template::oper("adr `d0, `j0").dst(&[R0]).jump(&[0])],
    },
    Pattern {
        name: "bl-result",
        shape: Shape::Move(TEMP, &Shape::Call(NAME)),
        emit: &[
            Template::oper("bl `j0").jump(&[0]).call(),
            Template::mov("mov `d0, `s0").dst(&[R0]).src(&[X0]),
        ],
    },
    Pattern {
        name: "mov",
        shape: Shape::Move(TEMP, REG),
        emit: &[Template::mov("mov `d0, `s0").dst(&[R0]).src(&[R1])],
    },
    Pattern {
        name: "bl",
        shape: Shape::Exp(&Shape::Call(NAME)),
        emit: &[Template::oper("bl `j0").jump(&[0]).call()],
    },
    Pattern {
        name: "blr",
        shape: Shape::Exp(&Shape::Call(REG)),
        emit: &[Template::oper("blr `s0").src(&[R0]).call()],
    },
    Pattern {
        name: "discard",
        shape: Shape::Exp(REG),
        emit: &[],
    },
    Pattern {
        name: "b",
        shape: Shape::Jump(NAME),
        emit: &[Template::oper("b `j0").jump(&[0])],
    },
    Pattern {
        name: "cmp-imm",
        shape: Shape::CJump(None, REG, UIMM12),
        emit: &[
            Template::oper("cmp `s0, #`i0").src(&[R0]).imm(&[0]),
            Template::oper("b.`c `j0").jump(&[0]),
            Template::oper("b `j0").jump(&[1]),
        ],
    },
    Pattern {
        name: "cmp",
        shape: Shape::CJump(None, REG, REG),
        emit: &[
            Template::oper("cmp `s0, `s1").src(&[R0, R1]),
            Template::oper("b.`c `j0").jump(&[0]),
            Template::oper("b `j0").jump(&[1]),
        ],
    },
    Pattern {
        name: "ldur",
        shape: Shape::Mem(&Shape::BinOp(BinOp::Plus, REG, SIMM9)),
        emit: &[reg_imm("ldur `d0, [`s0, #`i0]")],
    },
    Pattern {
        name: "ldr",
        shape: Shape::Mem(REG),
        emit: &[Template::oper("ldr `d0, [`s0]").dst(&[RESULT]).src(&[R0])],
    },
    Pattern {
        name: "add-imm",
        shape: Shape::BinOp(BinOp::Plus, REG, UIMM12),
        emit: &[reg_imm("add `d0, `s0, #`i0")],
    },
    Pattern {
        name: "add",
        shape: Shape::BinOp(BinOp::Plus, REG, REG),
        emit: &[three_reg("add `d0, `s0, `s1")],
    },
    Pattern {
        name: "sub-imm",
        shape: Shape::BinOp(BinOp::Minus, REG, UIMM12),
        emit: &[reg_imm("sub `d0, `s0, #`i0")],
    },
    Pattern {
        name: "sub",
        shape: Shape::BinOp(BinOp::Minus, REG, REG),
        emit: &[three_reg("sub `d0, `s0, `s1")],
    },
    Pattern {
        name: "mul",
        shape: Shape::BinOp(BinOp::Mul, REG, REG),
        emit: &[three_reg("mul `d0, `s0, `s1")],
    },
    Pattern {
        name: "sdiv",
        shape: Shape::BinOp(BinOp::Div, REG, REG),
        emit: &[three_reg("sdiv `d0, `s0, `s1")],
    },
    Pattern {
        name: "and",
        shape: Shape::BinOp(BinOp::And, REG, REG),
        emit: &[three_reg("and `d0, `s0, `s1")],
    },
    Pattern {
        name: "orr",
        shape: Shape::BinOp(BinOp::Or, REG, REG),
        emit: &[three_reg("orr `d0, `s0, `s1")],
    },
    Pattern {
        name: "eor",
        shape: Shape::BinOp(BinOp::Xor, REG, REG),
        emit: &[three_reg("eor `d0, `s0, `s1")],
    },
    Pattern {
        name: "lsl-imm",
        shape: Shape::BinOp(BinOp::LShift, REG, SHIFT),
        emit: &[reg_imm("lsl `d0, `s0, #`i0")],
    },
    Pattern {
        name: "lsr-imm",
        shape: Shape::BinOp(BinOp::RShift, REG, SHIFT),
        emit: &[reg_imm("lsr `d0, `s0, #`i0")],
    },
    Pattern {
        name: "asr-imm",
        shape: Shape::BinOp(BinOp::ArShift, REG, SHIFT),
        emit: &[reg_imm("asr `d0, `s0, #`i0")],
    },
    Pattern {
        name: "lsl",
        shape: Shape::BinOp(BinOp::LShift, REG, REG),
        emit: &[three_reg("lsl `d0, `s0, `s1")],
    },
    Pattern {
        name: "lsr",
        shape: Shape::BinOp(BinOp::RShift, REG, REG),
        emit: &[three_reg("lsr `d0, `s0, `s1")],
    },
    Pattern {
        name: "asr",
        shape: Shape::BinOp(BinOp::ArShift, REG, REG),
        emit: &[three_reg("asr `d0, `s0, `s1")],
    },
    Pattern {
        name: "bl-value",
        shape: Shape::Call(NAME),
        emit: &[
            Template::oper("bl `j0").jump(&[0]).call(),
            Template::mov("mov `d0, `s0").dst(&[RESULT]).src(&[X0]),
        ],
    },
    Pattern {
        name: "blr-value",
        shape: Shape::Call(REG),
        emit: &[
            Template::oper("blr `s0").src(&[R0]).call(),
            Template::mov("mov `d0, `s0").dst(&[RESULT]).src(&[X0]),
        ],
    },
    Pattern {
        name: "mov-imm",
        shape: Shape::Imm(ImmRange { min: 0, max: 65535 }),
        emit: &[Template::oper("mov `d0, #`i0").dst(&[RESULT]).imm(&[0])],
    },
    Pattern {
        name: "ldr-literal",
        shape: Shape::Imm(ImmRange::ANY),
        emit: &[Template::oper("ldr `d0, =`i0").dst(&[RESULT]).imm(&[0])],
    },
    Pattern {
        name: "adr",
        shape: Shape::Name,
        emit: &[Template::oper("adr `d0, `j0").dst(&[RESULT]).jump(&[0])],
    },
];

/// AArch64 instruction set.
pub static ARM64_ISA: InstructionSet = InstructionSet {
    name: "arm64",
    patterns: PATTERNS,
    args: ArgLowering {
        imm: ImmRange::ANY,
        imm_to_reg: Template::oper("ldr `d0, =`i0").dst(&[RESULT]).imm(&[0]),
        label_to_reg: Template::oper("adr `d0, `j0").dst(&[RESULT]).jump(&[0]),
        reg_to_reg: Template::mov("mov `d0, `s0").dst(&[RESULT]).src(&[R0]),
        reg_to_stack: Template::oper("str `s1, [`s0, #`i0]").src(&[R0, R1]).imm(&[0]),
    },
    string_directive: ".asciz",
    condition,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm64::Aapcs64;
    use crate::codegen::select::Codegen;
    use crate::core::temp::{Label, TempAuthority};
    use crate::frame::CallingConvention;
    use crate::ir::{Exp, Stm};

    fn render(build: impl FnOnce(&Aapcs64) -> Stm) -> Vec<String> {
        let mut temps = TempAuthority::new();
        let cc = Aapcs64::new(&mut temps).unwrap();
        let stm = build(&cc);
        let instrs = {
            let mut gen = Codegen::new(&cc, &ARM64_ISA, &mut temps);
            gen.select(&stm).unwrap()
        };
        instrs.iter().map(|i| i.format(temps.names())).collect()
    }

    #[test]
    fn test_frame_store_uses_unscaled_offset() {
        let out = render(|cc| {
            let fp = Exp::Temp(cc.frame_pointer());
            let x19 = Exp::Temp(cc.register("x19").unwrap());
            Stm::mov(Exp::mem(Exp::binop(BinOp::Plus, fp, Exp::Const(-16))), x19)
        });
        assert_eq!(out, vec!["stur x19, [x29, #-16]"]);
    }

    #[test]
    fn test_branch_on_unsigned_comparison() {
        let out = render(|cc| {
            let x1 = Exp::Temp(cc.register("x1").unwrap());
            let x2 = Exp::Temp(cc.register("x2").unwrap());
            Stm::cjump(RelOp::Ult, x1, x2, Label::named("lt"), Label::named("ge"))
        });
        assert_eq!(out, vec!["cmp x1, x2", "b.lo lt", "b ge"]);
    }

    #[test]
    fn test_large_constant_comes_from_literal_pool() {
        let out = render(|cc| {
            let x9 = Exp::Temp(cc.register("x9").unwrap());
            Stm::mov(
                x9.clone(),
                Exp::binop(BinOp::Plus, x9, Exp::Const(1 << 20)),
            )
        });
        assert_eq!(out.len(), 3);
        assert!(out[0].starts_with("ldr "));
        assert!(out[0].ends_with(", =1048576"));
        assert!(out[1].starts_with("add "));
        assert!(out[2].starts_with("mov x9, "));
    }
}
