//! Maximal-munch instruction selection over canonical IR.

use super::instr::{InstrKind, Instruction};
use super::patterns::{
    Bindings, Effects, InstructionSet, Operand, Pattern, Resolved, Template, TemplateKind, Tree,
};
use crate::core::error::{CompileError, CompileResult};
use crate::core::temp::{Label, Temp, TempAuthority};
use crate::frame::CallingConvention;
use crate::ir::{Exp, Stm};

/// Call argument after phase one of argument lowering.
#[derive(Debug, Clone)]
enum ArgValue {
    Imm(i64),
    Label(Label),
    Reg(Temp),
}

/// Instruction selector for one target.
pub struct Codegen<'a> {
    cc: &'a dyn CallingConvention,
    isa: &'a InstructionSet,
    temps: &'a mut TempAuthority,
    out: Vec<Instruction>,
}

impl<'a> Codegen<'a> {
    pub fn new(
        cc: &'a dyn CallingConvention,
        isa: &'a InstructionSet,
        temps: &'a mut TempAuthority,
    ) -> Self {
        Self {
            cc,
            isa,
            temps,
            out: Vec::new(),
        }
    }

    /// Instructions for one canonical statement.
    pub fn select(&mut self, stm: &Stm) -> CompileResult<Vec<Instruction>> {
        self.munch_stm(stm)?;
        Ok(std::mem::take(&mut self.out))
    }

    /// Instructions for a canonical statement list, in order.
    pub fn select_all(&mut self, stms: &[Stm]) -> CompileResult<Vec<Instruction>> {
        for stm in stms {
            self.munch_stm(stm)?;
        }
        Ok(std::mem::take(&mut self.out))
    }

    /// Place call arguments: leading ones in the argument registers, the
    /// rest in outgoing stack slots at `sp + index * word_size`.
    pub fn translate_args(&mut self, args: &[Exp]) -> CompileResult<Vec<Instruction>> {
        self.place_args(None, args)
    }

    /// Place the arguments of a call to a nested function. The static link
    /// goes to outgoing slot 0 and stack-passed arguments start at slot 1.
    pub fn translate_linked_args(
        &mut self,
        link: &Exp,
        args: &[Exp],
    ) -> CompileResult<Vec<Instruction>> {
        self.place_args(Some(link), args)
    }

    fn place_args(&mut self, link: Option<&Exp>, args: &[Exp]) -> CompileResult<Vec<Instruction>> {
        let pending = std::mem::take(&mut self.out);
        let result = self.munch_args(link, args);
        let placed = std::mem::replace(&mut self.out, pending);
        result.map(|()| placed)
    }

    /// Data-section label followed by the escaped literal.
    pub fn translate_string(&self, label: &Label, text: &str) -> Vec<Instruction> {
        vec![
            Instruction::label(label.clone()),
            Instruction::oper(
                format!("\t{} \"{}\"", self.isa.string_directive, escape_string(text)),
                Vec::new(),
                Vec::new(),
            ),
        ]
    }

    /// Append the sink that keeps the exit-live registers alive to the end.
    pub fn proc_entry_exit2(&self, instrs: &mut Vec<Instruction>) {
        instrs.push(Instruction::oper("", Vec::new(), self.cc.live_at_exit()));
    }

    fn munch_stm(&mut self, stm: &Stm) -> CompileResult<()> {
        match stm {
            Stm::Seq(a, b) => {
                self.munch_stm(a)?;
                self.munch_stm(b)
            }
            Stm::Label(label) => {
                self.out.push(Instruction::label(label.clone()));
                Ok(())
            }
            _ => {
                let (pattern, bindings) =
                    self.isa
                        .select(Tree::Stm(stm))
                        .ok_or_else(|| CompileError::NoPattern {
                            shape: stm.to_string(),
                        })?;
                log::trace!("{}: {} covers {}", self.isa.name, pattern.name, stm);
                self.emit_pattern(pattern, bindings, None)
            }
        }
    }

    fn munch_exp(&mut self, exp: &Exp) -> CompileResult<Temp> {
        match exp {
            Exp::Temp(t) => Ok(*t),
            Exp::ESeq(stm, value) => {
                self.munch_stm(stm)?;
                self.munch_exp(value)
            }
            _ => {
                let (pattern, bindings) =
                    self.isa
                        .select(Tree::Exp(exp))
                        .ok_or_else(|| CompileError::NoPattern {
                            shape: exp.to_string(),
                        })?;
                log::trace!("{}: {} covers {}", self.isa.name, pattern.name, exp);
                let result = self.temps.new_temp();
                self.emit_pattern(pattern, bindings, Some(result))?;
                Ok(result)
            }
        }
    }

    fn emit_pattern(
        &mut self,
        pattern: &Pattern,
        bindings: Bindings<'_>,
        result: Option<Temp>,
    ) -> CompileResult<()> {
        let regs = bindings
            .regs
            .iter()
            .map(|exp| self.munch_exp(exp))
            .collect::<CompileResult<Vec<Temp>>>()?;
        if let Some(args) = bindings.call_args {
            self.munch_args(bindings.call_link, args)?;
        }

        let resolved = Resolved {
            regs: &regs,
            imms: &bindings.imms,
            labels: &bindings.labels,
            relop: bindings.relop,
            result,
        };
        for template in pattern.emit {
            let instr = self.instantiate(template, resolved)?;
            self.out.push(instr);
        }
        Ok(())
    }

    fn operand(&self, op: Operand, resolved: Resolved<'_>) -> CompileResult<Temp> {
        match op {
            Operand::Result => resolved.result.ok_or_else(|| CompileError::PatternTable {
                reason: "result operand used by a statement pattern".to_string(),
            }),
            Operand::Reg(i) => {
                resolved
                    .regs
                    .get(i)
                    .copied()
                    .ok_or_else(|| CompileError::PatternTable {
                        reason: format!("register operand {} is not bound", i),
                    })
            }
            Operand::Phys(name) => {
                self.cc
                    .register(name)
                    .ok_or_else(|| CompileError::PatternTable {
                        reason: format!("{} has no register `{}`", self.cc.name(), name),
                    })
            }
        }
    }

    fn instantiate(&self, template: &Template, resolved: Resolved<'_>) -> CompileResult<Instruction> {
        let dst = template
            .dst
            .iter()
            .map(|&op| self.operand(op, resolved))
            .collect::<CompileResult<Vec<_>>>()?;
        let src = template
            .src
            .iter()
            .map(|&op| self.operand(op, resolved))
            .collect::<CompileResult<Vec<_>>>()?;
        let labels = template
            .jump
            .iter()
            .map(|&i| {
                resolved
                    .labels
                    .get(i)
                    .cloned()
                    .ok_or_else(|| CompileError::PatternTable {
                        reason: format!("label operand {} is not bound in `{}`", i, template.asm),
                    })
            })
            .collect::<CompileResult<Vec<_>>>()?;
        let imms = template
            .imm
            .iter()
            .map(|&i| {
                resolved
                    .imms
                    .get(i)
                    .copied()
                    .ok_or_else(|| CompileError::PatternTable {
                        reason: format!("immediate {} is not bound in `{}`", i, template.asm),
                    })
            })
            .collect::<CompileResult<Vec<_>>>()?;

        let asm = if template.asm.contains("`c") {
            let relop = resolved.relop.ok_or_else(|| CompileError::PatternTable {
                reason: format!("`{}` needs a condition but none is bound", template.asm),
            })?;
            template.asm.replace("`c", (self.isa.condition)(relop))
        } else {
            template.asm.to_string()
        };

        let (implicit_defs, implicit_uses) = match template.effects {
            Effects::None => (Vec::new(), Vec::new()),
            Effects::Call => {
                let mut defs = self.cc.caller_saved().to_vec();
                let rv = self.cc.return_value();
                if !defs.contains(&rv) {
                    defs.push(rv);
                }
                (defs, self.cc.argument_registers().to_vec())
            }
        };

        Ok(Instruction {
            kind: match template.kind {
                TemplateKind::Oper => InstrKind::Oper,
                TemplateKind::Move => InstrKind::Move,
            },
            asm,
            dst,
            src,
            labels,
            imms,
            implicit_defs,
            implicit_uses,
        })
    }

    fn munch_args(&mut self, link: Option<&Exp>, args: &[Exp]) -> CompileResult<()> {
        let cc = self.cc;
        let registers = cc.argument_registers();
        let on_stack = usize::from(link.is_some()) + args.len().saturating_sub(registers.len());
        if on_stack > cc.outgoing_slots() {
            return Err(CompileError::CallingConvention {
                reason: format!(
                    "call passes {} arguments on the stack but {} only reserves {} slots",
                    on_stack,
                    cc.name(),
                    cc.outgoing_slots()
                ),
            });
        }

        // Evaluate every argument before any argument register is written.
        let link = link.map(|exp| self.arg_value(exp)).transpose()?;
        let values = args
            .iter()
            .map(|arg| self.arg_value(arg))
            .collect::<CompileResult<Vec<ArgValue>>>()?;

        for (&reg, value) in registers.iter().zip(&values) {
            let instr = self.place_in_register(value, reg)?;
            self.out.push(instr);
        }

        // The static link, when present, takes outgoing slot 0.
        let stacked = link.iter().chain(values.iter().skip(registers.len()));
        for (slot, value) in stacked.enumerate() {
            self.store_outgoing(slot, value)?;
        }
        Ok(())
    }

    /// Phase one of argument lowering for a single argument.
    fn arg_value(&mut self, arg: &Exp) -> CompileResult<ArgValue> {
        match arg {
            Exp::Const(n) if self.isa.args.imm.contains(*n) => Ok(ArgValue::Imm(*n)),
            Exp::Name(label) => Ok(ArgValue::Label(label.clone())),
            Exp::Temp(t) => Ok(ArgValue::Reg(*t)),
            Exp::Const(_) | Exp::Mem(_) | Exp::BinOp(..) => Ok(ArgValue::Reg(self.munch_exp(arg)?)),
            Exp::Call(..) => Err(CompileError::UnsupportedArgument {
                kind: format!("nested call {}", arg),
            }),
            Exp::ESeq(..) => Err(CompileError::UnsupportedArgument {
                kind: format!("statement expression {}", arg),
            }),
        }
    }

    fn store_outgoing(&mut self, slot: usize, value: &ArgValue) -> CompileResult<()> {
        let reg = match value {
            ArgValue::Reg(t) => *t,
            other => {
                let t = self.temps.new_temp();
                let instr = self.place_in_register(other, t)?;
                self.out.push(instr);
                t
            }
        };
        let offset = slot as i64 * self.cc.word_size();
        let instr = self.instantiate(
            &self.isa.args.reg_to_stack,
            Resolved {
                regs: &[self.cc.stack_pointer(), reg],
                imms: &[offset],
                labels: &[],
                relop: None,
                result: None,
            },
        )?;
        self.out.push(instr);
        Ok(())
    }

    fn place_in_register(&self, value: &ArgValue, reg: Temp) -> CompileResult<Instruction> {
        let args = &self.isa.args;
        let (template, regs, imms, labels): (&Template, Vec<Temp>, Vec<i64>, Vec<Label>) =
            match value {
                ArgValue::Imm(n) => (&args.imm_to_reg, Vec::new(), vec![*n], Vec::new()),
                ArgValue::Label(l) => (&args.label_to_reg, Vec::new(), Vec::new(), vec![l.clone()]),
                ArgValue::Reg(t) => (&args.reg_to_reg, vec![*t], Vec::new(), Vec::new()),
            };
        self.instantiate(
            template,
            Resolved {
                regs: &regs,
                imms: &imms,
                labels: &labels,
                relop: None,
                result: Some(reg),
            },
        )
    }
}

fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_graphic() || c == ' ' => out.push(c),
            c => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("\\{:03o}", byte));
                }
            }
        }
    }
    out
}
