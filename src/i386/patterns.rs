//! 32-bit x86 instruction patterns (Intel syntax).

use crate::codegen::patterns::{
    ArgLowering, ImmRange, InstructionSet, Operand, Pattern, Shape, Template, NAME, R0, R1, REG,
    RESULT, TEMP,
};
use crate::ir::{BinOp, RelOp};

const IMM32_RANGE: ImmRange = ImmRange::new(i32::MIN as i64, i32::MAX as i64);
const IMM32: &Shape = &Shape::Imm(IMM32_RANGE);

const EAX: Operand = Operand::Phys("eax");
const EDX: Operand = Operand::Phys("edx");

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

const fn two_address(asm: &'static str) -> Template {
    Template::oper(asm).dst(&[RESULT]).src(&[RESULT, R1])
}

static PATTERNS: &[Pattern] = &[
    Pattern {
        name: "store-base-disp",
        shape: Shape::Move(&Shape::Mem(&Shape::BinOp(BinOp::Plus, REG, IMM32)), REG),
        emit: &[Template::oper("mov dword ptr [`s0 + `i0], `s1").src(&[R0, R1]).imm(&[0])],
    },
    Pattern {
        name: "store-base",
        shape: Shape::Move(&Shape::Mem(REG), REG),
        emit: &[Template::oper("mov dword ptr [`s0], `s1").src(&[R0, R1])],
    },
    Pattern {
        name: "load-base-disp",
        shape: Shape::Move(TEMP, &Shape::Mem(&Shape::BinOp(BinOp::Plus, REG, IMM32))),
        emit: &[Template::oper("mov `d0, dword ptr [`s0 + `i0]").dst(&[R0]).src(&[R1]).imm(&[0])],
    },
    Pattern {
        name: "move-imm",
        shape: Shape::Move(TEMP, IMM32),
        emit: &[Template::oper("mov `d0, `i0").dst(&[R0]).imm(&[0])],
    },
    Pattern {
        name: "call-result",
        shape: Shape::Move(TEMP, &Shape::Call(NAME)),
        emit: &[
            Template::oper("call `j0").jump(&[0]).call(),
            Template::mov("mov `d0, `s0").dst(&[R0]).src(&[EAX]),
        ],
    },
    Pattern {
        name: "move-reg",
        shape: Shape::Move(TEMP, REG),
        emit: &[Template::mov("mov `d0, `s0").dst(&[R0]).src(&[R1])],
    },
    Pattern {
        name: "call",
        shape: Shape::Exp(&Shape::Call(NAME)),
        emit: &[Template::oper("call `j0").jump(&[0]).call()],
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
    Pattern {
        name: "load-base-disp",
        shape: Shape::Mem(&Shape::BinOp(BinOp::Plus, REG, IMM32)),
        emit: &[Template::oper("mov `d0, dword ptr [`s0 + `i0]").dst(&[RESULT]).src(&[R0]).imm(&[0])],
    },
    Pattern {
        name: "load-base",
        shape: Shape::Mem(REG),
        emit: &[Template::oper("mov `d0, dword ptr [`s0]").dst(&[RESULT]).src(&[R0])],
    },
    Pattern {
        name: "add-imm",
        shape: Shape::BinOp(BinOp::Plus, REG, IMM32),
        emit: &[COPY_LEFT, Template::oper("add `d0, `i0").dst(&[RESULT]).src(&[RESULT]).imm(&[0])],
    },
    Pattern {
        name: "add",
        shape: Shape::BinOp(BinOp::Plus, REG, REG),
        emit: &[COPY_LEFT, two_address("add `d0, `s1")],
    },
    Pattern {
        name: "sub",
        shape: Shape::BinOp(BinOp::Minus, REG, REG),
        emit: &[COPY_LEFT, two_address("sub `d0, `s1")],
    },
    Pattern {
        name: "imul",
        shape: Shape::BinOp(BinOp::Mul, REG, REG),
        emit: &[COPY_LEFT, two_address("imul `d0, `s1")],
    },
    Pattern {
        name: "idiv",
        shape: Shape::BinOp(BinOp::Div, REG, REG),
        emit: &[
            Template::mov("mov `d0, `s0").dst(&[EAX]).src(&[R0]),
            Template::oper("cdq").dst(&[EDX]).src(&[EAX]),
            Template::oper("idiv `s0").dst(&[EAX, EDX]).src(&[R1, EAX, EDX]),
            Template::mov("mov `d0, `s0").dst(&[RESULT]).src(&[EAX]),
        ],
    },
    Pattern {
        name: "and",
        shape: Shape::BinOp(BinOp::And, REG, REG),
        emit: &[COPY_LEFT, two_address("and `d0, `s1")],
    },
    Pattern {
        name: "or",
        shape: Shape::BinOp(BinOp::Or, REG, REG),
        emit: &[COPY_LEFT, two_address("or `d0, `s1")],
    },
    Pattern {
        name: "xor",
        shape: Shape::BinOp(BinOp::Xor, REG, REG),
        emit: &[COPY_LEFT, two_address("xor `d0, `s1")],
    },
    Pattern {
        name: "call-value",
        shape: Shape::Call(NAME),
        emit: &[
            Template::oper("call `j0").jump(&[0]).call(),
            Template::mov("mov `d0, `s0").dst(&[RESULT]).src(&[EAX]),
        ],
    },
    Pattern {
        name: "const",
        shape: Shape::Imm(IMM32_RANGE),
        emit: &[Template::oper("mov `d0, `i0").dst(&[RESULT]).imm(&[0])],
    },
    Pattern {
        name: "label-address",
        shape: Shape::Name,
        emit: &[Template::oper("mov `d0, offset `j0").dst(&[RESULT]).jump(&[0])],
    },
];

/// 32-bit x86 instruction set.
pub static I386_ISA: InstructionSet = InstructionSet {
    name: "i386",
    patterns: PATTERNS,
    args: ArgLowering {
        imm: IMM32_RANGE,
        imm_to_reg: Template::oper("mov `d0, `i0").dst(&[RESULT]).imm(&[0]),
        label_to_reg: Template::oper("mov `d0, offset `j0").dst(&[RESULT]).jump(&[0]),
        reg_to_reg: Template::mov("mov `d0, `s0").dst(&[RESULT]).src(&[R0]),
        reg_to_stack: Template::oper("mov dword ptr [`s0 + `i0], `s1").src(&[R0, R1]).imm(&[0]),
    },
    string_directive: ".string",
    condition,
};
