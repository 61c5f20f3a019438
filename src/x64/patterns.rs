//! x86-64 instruction patterns (Intel syntax).
//!
//! Two-address arithmetic copies the left operand into the result first.
//! Displacements and arithmetic immediates must be encodeable as a
//! sign-extended imm32; anything wider goes through `mov r64, imm64`.

use crate::codegen::patterns::{
    ArgLowering, ImmRange, InstructionSet, Operand, Pattern, Shape, Template, IMM, NAME, R0, R1,
    REG, RESULT, TEMP,
};
use crate::ir::{BinOp, RelOp};

const IMM32: &Shape = &Shape::Imm(ImmRange {
    min: i32::MIN as i64,
    max: i32::MAX as i64,
});
const SHIFT: &Shape = &Shape::Imm(ImmRange { min: 0, max: 63 });

const RAX: Operand = Operand::Phys("rax");
const RCX: Operand = Operand::Phys("rcx");
const RDX: Operand = Operand::Phys("rdx");

const COPY_LEFT: Template = Template::mov("mov `d0, `s0").dst(&[RESULT]).src(&[R0]);

fn condition(op: RelOp) -> &'static str {
    match op {
        RelOp::Eq => "e",
        RelOp::Ne => "ne",
        RelOp::Lt => "l",
        RelOp::Gt => "g",
        RelOp::Le => "le",
        RelOp::Ge => "ge",
        RelOp::Ult => "b",
        RelOp::Ule => "be",
        RelOp::Ugt => "a",
        RelOp::Uge => "ae",
    }
}

static PATTERNS: &[Pattern] = &[
    // Stores.
    Pattern {
        name: "store-base-disp",
        shape: Shape::Move(&Shape::Mem(&Shape::BinOp(BinOp::Plus, REG, IMM32)), REG),
        emit: &[Template::oper("mov qword ptr [`s0 + `i0], `s1").src(&[R0, R1]).imm(&[0])],
    },
    Pattern {
        name: "store-disp-base",
        shape: Shape::Move(&Shape::Mem(&Shape::BinOp(BinOp::Plus, IMM32, REG)), REG),
        emit: &[Template::oper("mov qword ptr [`s0 + `i0], `s1").src(&[R0, R1]).imm(&[0])],
    },
    Pattern {
        name: "store-imm-base-disp",
        shape: Shape::Move(&Shape::Mem(&Shape::BinOp(BinOp::Plus, REG, IMM32)), IMM32),
        emit: &[Template::oper("mov qword ptr [`s0 + `i0], `i1").src(&[R0]).imm(&[0, 1])],
    },
    Pattern {
        name: "store-base",
        shape: Shape::Move(&Shape::Mem(REG), REG),
        emit: &[Template::oper("mov qword ptr [`s0], `s1").src(&[R0, R1])],
    },
    // Moves into temporaries.
    Pattern {
        name: "load-base-disp",
        shape: Shape::Move(TEMP, &Shape::Mem(&Shape::BinOp(BinOp::Plus, REG, IMM32))),
        emit: &[Template::oper("mov `d0, qword ptr [`s0 + `i0]").dst(&[R0]).src(&[R1]).imm(&[0])],
    },
    Pattern {
        name: "load-base",
        shape: Shape::Move(TEMP, &Shape::Mem(REG)),
        emit: &[Template::oper("mov `d0, qword ptr [`s0]").dst(&[R0]).src(&[R1])],
    },
    Pattern {
        name: "move-imm",
        shape: Shape::Move(TEMP, IMM),
        emit: &[Template::oper("mov `d0, `i0").dst(&[R0]).imm(&[0])],
    },
    Pattern {
        name: "move-label",
        shape: Shape::Move(TEMP, NAME),
        emit: &[Template::oper("lea `d0, [rip + `j0]").dst(&[R0]).jump(&[0])],
    },
    Pattern {
        name: "call-result",
        shape: Shape::Move(TEMP, &Shape::Call(NAME)),
        emit: &[
            Template::oper("call `j0").jump(&[0]).call(),
            Template::mov("mov `d0, `s0").dst(&[R0]).src(&[RAX]),
        ],
    },
    Pattern {
        name: "move-reg",
        shape: Shape::Move(TEMP, REG),
        emit: &[Template::mov("mov `d0, `s0").dst(&[R0]).src(&[R1])],
    },
    // Statements.
    Pattern {
        name: "call",
        shape: Shape::Exp(&Shape::Call(NAME)),
        emit: &[Template::oper("call `j0").jump(&[0]).call()],
    },
    Pattern {
        name: "call-indirect",
        shape: Shape::Exp(&Shape::Call(REG)),
        emit: &[Template::oper("call `s0").src(&[R0]).call()],
    },
    Pattern {
        name: "discard",
        shape: Shape::Exp(REG),
        emit: &[],
    },
    Pattern {
        name: "jump",
        shape: Shape::Jump(NAME),
        emit: &[Template::oper("jmp `j0").jump(&[0])],
    },
    Pattern {
        name: "branch-imm",
        shape: Shape::CJump(None, REG, IMM32),
        emit: &[
            Template::oper("cmp `s0, `i0").src(&[R0]).imm(&[0]),
            Template::oper("j`c `j0").jump(&[0]),
            Template::oper("jmp `j0").jump(&[1]),
        ],
    },
    Pattern {
        name: "branch",
        shape: Shape::CJump(None, REG, REG),
        emit: &[
            Template::oper("cmp `s0, `s1").src(&[R0, R1]),
            Template::oper("j`c `j0").jump(&[0]),
            Template::oper("jmp `j0").jump(&[1]),
        ],
    },
    // Loads.
    Pattern {
        name: "load-base-disp",
        shape: Shape::Mem(&Shape::BinOp(BinOp::Plus, REG, IMM32)),
        emit: &[Template::oper("mov `d0, qword ptr [`s0 + `i0]").dst(&[RESULT]).src(&[R0]).imm(&[0])],
    },
    Pattern {
        name: "load-disp-base",
        shape: Shape::Mem(&Shape::BinOp(BinOp::Plus, IMM32, REG)),
        emit: &[Template::oper("mov `d0, qword ptr [`s0 + `i0]").dst(&[RESULT]).src(&[R0]).imm(&[0])],
    },
    Pattern {
        name: "load-base",
        shape: Shape::Mem(REG),
        emit: &[Template::oper("mov `d0, qword ptr [`s0]").dst(&[RESULT]).src(&[R0])],
    },
    // Arithmetic.
    Pattern {
        name: "add-imm",
        shape: Shape::BinOp(BinOp::Plus, REG, IMM32),
        emit: &[COPY_LEFT, Template::oper("add `d0, `i0").dst(&[RESULT]).src(&[RESULT]).imm(&[0])],
    },
    Pattern {
        name: "add",
        shape: Shape::BinOp(BinOp::Plus, REG, REG),
        emit: &[COPY_LEFT, Template::oper("add `d0, `s1").dst(&[RESULT]).src(&[RESULT, R1])],
    },
    Pattern {
        name: "sub-imm",
        shape: Shape::BinOp(BinOp::Minus, REG, IMM32),
        emit: &[COPY_LEFT, Template::oper("sub `d0, `i0").dst(&[RESULT]).src(&[RESULT]).imm(&[0])],
    },
    Pattern {
        name: "sub",
        shape: Shape::BinOp(BinOp::Minus, REG, REG),
        emit: &[COPY_LEFT, Template::oper("sub `d0, `s1").dst(&[RESULT]).src(&[RESULT, R1])],
    },
    Pattern {
        name: "imul-imm",
        shape: Shape::BinOp(BinOp::Mul, REG, IMM32),
        emit: &[Template::oper("imul `d0, `s0, `i0").dst(&[RESULT]).src(&[R0]).imm(&[0])],
    },
    Pattern {
        name: "imul",
        shape: Shape::BinOp(BinOp::Mul, REG, REG),
        emit: &[COPY_LEFT, Template::oper("imul `d0, `s1").dst(&[RESULT]).src(&[RESULT, R1])],
    },
    Pattern {
        name: "idiv",
        shape: Shape::BinOp(BinOp::Div, REG, REG),
        emit: &[
            Template::mov("mov `d0, `s0").dst(&[RAX]).src(&[R0]),
            Template::oper("cqo").dst(&[RDX]).src(&[RAX]),
            Template::oper("idiv `s0").dst(&[RAX, RDX]).src(&[R1, RAX, RDX]),
            Template::mov("mov `d0, `s0").dst(&[RESULT]).src(&[RAX]),
        ],
    },
    Pattern {
        name: "and-imm",
        shape: Shape::BinOp(BinOp::And, REG, IMM32),
        emit: &[COPY_LEFT, Template::oper("and `d0, `i0").dst(&[RESULT]).src(&[RESULT]).imm(&[0])],
    },
    Pattern {
        name: "and",
        shape: Shape::BinOp(BinOp::And, REG, REG),
        emit: &[COPY_LEFT, Template::oper("and `d0, `s1").dst(&[RESULT]).src(&[RESULT, R1])],
    },
    Pattern {
        name: "or",
        shape: Shape::BinOp(BinOp::Or, REG, REG),
        emit: &[COPY_LEFT, Template::oper("or `d0, `s1").dst(&[RESULT]).src(&[RESULT, R1])],
    },
    Pattern {
        name: "xor",
        shape: Shape::BinOp(BinOp::Xor, REG, REG),
        emit: &[COPY_LEFT, Template::oper("xor `d0, `s1").dst(&[RESULT]).src(&[RESULT, R1])],
    },
    Pattern {
        name: "shl-imm",
        shape: Shape::BinOp(BinOp::LShift, REG, SHIFT),
        emit: &[COPY_LEFT, Template::oper("shl `d0, `i0").dst(&[RESULT]).src(&[RESULT]).imm(&[0])],
    },
    Pattern {
        name: "shr-imm",
        shape: Shape::BinOp(BinOp::RShift, REG, SHIFT),
        emit: &[COPY_LEFT, Template::oper("shr `d0, `i0").dst(&[RESULT]).src(&[RESULT]).imm(&[0])],
    },
    Pattern {
        name: "sar-imm",
        shape: Shape::BinOp(BinOp::ArShift, REG, SHIFT),
        emit: &[COPY_LEFT, Template::oper("sar `d0, `i0").dst(&[RESULT]).src(&[RESULT]).imm(&[0])],
    },
    Pattern {
        name: "shl",
        shape: Shape::BinOp(BinOp::LShift, REG, REG),
        emit: &[
            Template::mov("mov `d0, `s0").dst(&[RCX]).src(&[R1]),
            COPY_LEFT,
            Template::oper("shl `d0, cl").dst(&[RESULT]).src(&[RESULT, RCX]),
        ],
    },
    Pattern {
        name: "shr",
        shape: Shape::BinOp(BinOp::RShift, REG, REG),
        emit: &[
            Template::mov("mov `d0, `s0").dst(&[RCX]).src(&[R1]),
            COPY_LEFT,
            Template::oper("shr `d0, cl").dst(&[RESULT]).src(&[RESULT, RCX]),
        ],
    },
    Pattern {
        name: "sar",
        shape: Shape::BinOp(BinOp::ArShift, REG, REG),
        emit: &[
            Template::mov("mov `d0, `s0").dst(&[RCX]).src(&[R1]),
            COPY_LEFT,
            Template::oper("sar `d0, cl").dst(&[RESULT]).src(&[RESULT, RCX]),
        ],
    },
    // Calls and leaves.
    Pattern {
        name: "call-value",
        shape: Shape::Call(NAME),
        emit: &[
            Template::oper("call `j0").jump(&[0]).call(),
            Template::mov("mov `d0, `s0").dst(&[RESULT]).src(&[RAX]),
        ],
    },
    Pattern {
        name: "call-value-indirect",
        shape: Shape::Call(REG),
        emit: &[
            Template::oper("call `s0").src(&[R0]).call(),
            Template::mov("mov `d0, `s0").dst(&[RESULT]).src(&[RAX]),
        ],
    },
    Pattern {
        name: "const",
        shape: Shape::Imm(ImmRange::ANY),
        emit: &[Template::oper("mov `d0, `i0").dst(&[RESULT]).imm(&[0])],
    },
    Pattern {
        name: "label-address",
        shape: Shape::Name,
        emit: &[Template::oper("lea `d0, [rip + `j0]").dst(&[RESULT]).jump(&[0])],
    },
];

/// x86-64 instruction set.
pub static X64_ISA: InstructionSet = InstructionSet {
    name: "x64",
    patterns: PATTERNS,
    args: ArgLowering {
        imm: ImmRange::ANY,
        imm_to_reg: Template::oper("mov `d0, `i0").dst(&[RESULT]).imm(&[0]),
        label_to_reg: Template::oper("lea `d0, [rip + `j0]").dst(&[RESULT]).jump(&[0]),
        reg_to_reg: Template::mov("mov `d0, `s0").dst(&[RESULT]).src(&[R0]),
        reg_to_stack: Template::oper("mov qword ptr [`s0 + `i0], `s1").src(&[R0, R1]).imm(&[0]),
    },
    string_directive: ".string",
    condition,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::select::Codegen;
    use crate::core::temp::{Label, TempAuthority};
    use crate::frame::CallingConvention;
    use crate::ir::{Exp, Stm};
    use crate::x64::SysV;

    fn render(stm: &Stm) -> Vec<String> {
        let mut temps = TempAuthority::new();
        let cc = SysV::new(&mut temps).unwrap();
        let instrs = {
            let mut gen = Codegen::new(&cc, &X64_ISA, &mut temps);
            gen.select(stm).unwrap()
        };
        instrs.iter().map(|i| i.format(temps.names())).collect()
    }

    fn rbp() -> Exp {
        // rbp is issued sixth by the register table
        let mut temps = TempAuthority::new();
        let cc = SysV::new(&mut temps).unwrap();
        Exp::Temp(cc.frame_pointer())
    }

    #[test]
    fn test_frame_store_uses_displacement() {
        let stm = Stm::mov(
            Exp::mem(Exp::binop(BinOp::Plus, rbp(), Exp::Const(-8))),
            Exp::Const(42),
        );
        assert_eq!(render(&stm), vec!["mov qword ptr [rbp - 8], 42"]);
    }

    #[test]
    fn test_frame_load_into_register() {
        let mut temps = TempAuthority::new();
        let cc = SysV::new(&mut temps).unwrap();
        let rbx = cc.register("rbx").unwrap();
        let stm = Stm::mov(
            Exp::Temp(rbx),
            Exp::mem(Exp::binop(BinOp::Plus, rbp(), Exp::Const(16))),
        );
        assert_eq!(render(&stm), vec!["mov rbx, qword ptr [rbp + 16]"]);
    }

    #[test]
    fn test_branch_uses_condition_suffix() {
        let mut temps = TempAuthority::new();
        let cc = SysV::new(&mut temps).unwrap();
        let rax = Exp::Temp(cc.return_value());
        let stm = Stm::cjump(
            RelOp::Le,
            rax,
            Exp::Const(10),
            Label::named("body"),
            Label::named("done"),
        );
        assert_eq!(
            render(&stm),
            vec!["cmp rax, 10", "jle body", "jmp done"]
        );
    }

    #[test]
    fn test_every_condition_has_a_suffix() {
        let codes: Vec<&str> = [
            RelOp::Eq,
            RelOp::Ne,
            RelOp::Lt,
            RelOp::Gt,
            RelOp::Le,
            RelOp::Ge,
            RelOp::Ult,
            RelOp::Ule,
            RelOp::Ugt,
            RelOp::Uge,
        ]
        .into_iter()
        .map(condition)
        .collect();
        assert_eq!(codes, ["e", "ne", "l", "g", "le", "ge", "b", "be", "a", "ae"]);
    }

    #[test]
    fn test_call_passes_arguments_in_sysv_registers() {
        let stm = Stm::exp(Exp::call(
            Exp::Name(Label::named("print")),
            vec![Exp::Name(Label::named("msg")), Exp::Const(3)],
        ));
        assert_eq!(
            render(&stm),
            vec!["lea rdi, [rip + msg]", "mov rsi, 3", "call print"]
        );
    }
}
