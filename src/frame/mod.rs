// This module defines the abstract activation-record model shared by every target. A Frame
// records, for one function, where each formal parameter lives (InReg for a virtual register,
// InFrame for a fixed offset from the frame pointer), the argument register each formal
// arrives in, how many frame slots the locals use so far, and how many argument registers
// the formals consumed. The CallingConvention trait is the per-architecture policy behind
// the frame: word size, the special registers, which registers carry arguments and which
// survive calls, and the provided methods that build frames, address frame-resident values,
// call runtime functions and synthesise the view shift on function entry. Concrete
// conventions (x64, arm64, i386) only describe their registers and word size; everything
// else is expressed once here against that description.
//
// Frame layout relative to the frame pointer (growing downwards):
//   fp + 2*ws + k*ws   k-th stack-passed formal (pushed by the caller)
//   fp + 2*ws          static link of a nested function (k = 0)
//   fp + ws            return address
//   fp                 saved frame pointer
//   fp - ws, ...       escaping formals and locals, one word each

//! Frames and calling conventions.

pub mod registers;

use crate::core::error::{CompileError, CompileResult};
use crate::core::temp::{Label, Temp, TempAuthority};
use crate::ir::{BinOp, Exp, Stm};

pub use registers::{MachineRegisters, RegisterSpec};

/// Where one variable lives relative to its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Memory at this offset from the frame pointer.
    InFrame(i64),
    /// A virtual register.
    InReg(Temp),
}

/// Layout of one function activation.
#[derive(Debug, Clone)]
pub struct Frame {
    name: Label,
    formals: Vec<Access>,
    /// Argument register each formal arrives in; `None` for stack-passed formals.
    incoming: Vec<Option<Temp>>,
    word_size: i64,
    /// Frame slots handed out below the frame pointer.
    slots: i64,
    registers_used: usize,
}

impl Frame {
    pub fn new(name: Label, word_size: i64) -> Self {
        Self {
            name,
            formals: Vec::new(),
            incoming: Vec::new(),
            word_size,
            slots: 0,
            registers_used: 0,
        }
    }

    pub fn name(&self) -> &Label {
        &self.name
    }

    /// Callee-side view of the formals, in declaration order.
    pub fn formals(&self) -> &[Access] {
        &self.formals
    }

    pub fn incoming(&self) -> &[Option<Temp>] {
        &self.incoming
    }

    pub fn word_size(&self) -> i64 {
        self.word_size
    }

    /// Argument registers committed to formals.
    pub fn registers_used(&self) -> usize {
        self.registers_used
    }

    /// Bytes of frame below the frame pointer used by escaping variables.
    pub fn locals_size(&self) -> i64 {
        self.slots * self.word_size
    }

    fn next_slot(&mut self) -> Access {
        self.slots += 1;
        Access::InFrame(-self.slots * self.word_size)
    }

    /// Register-passed formal; escaping ones get copied into the next frame slot.
    fn push_register_formal(&mut self, temps: &mut TempAuthority, reg: Temp, escapes: bool) {
        let access = if escapes {
            self.next_slot()
        } else {
            Access::InReg(temps.new_temp())
        };
        self.registers_used += 1;
        self.formals.push(access);
        self.incoming.push(Some(reg));
    }

    fn push_stack_formal(&mut self, offset: i64) {
        self.formals.push(Access::InFrame(offset));
        self.incoming.push(None);
    }

    /// Storage for a new local.
    ///
    /// Escaping locals get the next word-sized slot below the frame pointer.
    /// Every other local gets a fresh, unbounded virtual register: register
    /// pressure is left to the register allocator.
    pub fn allocate_local(&mut self, temps: &mut TempAuthority, escapes: bool) -> Access {
        let access = if escapes {
            self.next_slot()
        } else {
            Access::InReg(temps.new_temp())
        };
        log::trace!("{}: local {:?}", self.name, access);
        access
    }
}

/// Per-architecture calling convention.
///
/// Implementors describe their registers and word size; the provided methods
/// derive frame construction and entry/exit sequences from that description.
pub trait CallingConvention {
    /// Identifier of the target, e.g. `"x64"`.
    fn name(&self) -> &'static str;

    /// Size of a machine word (and of every frame slot) in bytes.
    fn word_size(&self) -> i64;

    fn registers(&self) -> &MachineRegisters;

    /// Words reserved at the bottom of each frame for stack-passed arguments.
    fn outgoing_slots(&self) -> usize;

    fn frame_pointer(&self) -> Temp {
        self.registers().frame_pointer()
    }

    fn stack_pointer(&self) -> Temp {
        self.registers().stack_pointer()
    }

    fn return_value(&self) -> Temp {
        self.registers().return_value()
    }

    fn argument_registers(&self) -> &[Temp] {
        self.registers().arguments()
    }

    fn caller_saved(&self) -> &[Temp] {
        self.registers().caller_saved()
    }

    fn callee_saved(&self) -> &[Temp] {
        self.registers().callee_saved()
    }

    /// Physical register by assembler name.
    fn register(&self, name: &str) -> Option<Temp> {
        self.registers().lookup(name)
    }

    /// Frame-pointer offset of the `index`-th stack-passed formal.
    fn incoming_offset(&self, index: usize) -> i64 {
        (2 + index as i64) * self.word_size()
    }

    /// Build the frame for a nested function whose formals escape as
    /// `escapes` says.
    ///
    /// The leading bit belongs to the static link. The caller passes it in
    /// outgoing slot 0, so the callee always finds it at `incoming_offset(0)`.
    /// The next `argument_registers().len()` formals arrive in registers and
    /// stay there unless they escape. The rest arrive in the stack slots
    /// after the static link and stay in memory whatever their escape bit.
    /// An empty list gives a frame with no formals.
    fn create_frame(
        &self,
        temps: &mut TempAuthority,
        name: Label,
        escapes: &[bool],
    ) -> CompileResult<Frame> {
        let registers = self.argument_registers();
        let Some((_, user)) = escapes.split_first() else {
            return Ok(Frame::new(name, self.word_size()));
        };
        let on_stack = 1 + user.len().saturating_sub(registers.len());
        if on_stack > self.outgoing_slots() {
            return Err(CompileError::CallingConvention {
                reason: format!(
                    "{} has {} stack-passed formals but {} only reserves {} argument slots",
                    name,
                    on_stack,
                    self.name(),
                    self.outgoing_slots()
                ),
            });
        }

        let mut frame = Frame::new(name, self.word_size());
        frame.push_stack_formal(self.incoming_offset(0));
        for (index, &escapes) in user.iter().enumerate() {
            match registers.get(index) {
                Some(&reg) => frame.push_register_formal(temps, reg, escapes),
                None => frame.push_stack_formal(self.incoming_offset(1 + index - registers.len())),
            }
        }
        log::debug!(
            "{} frame {}: formals {:?}",
            self.name(),
            frame.name(),
            frame.formals()
        );
        Ok(frame)
    }

    /// IR for the value at `access`, given the owning frame's frame pointer.
    fn access_frame(&self, access: Access, frame_pointer: Exp) -> Exp {
        match access {
            Access::InFrame(offset) => {
                Exp::mem(Exp::binop(BinOp::Plus, frame_pointer, Exp::Const(offset)))
            }
            Access::InReg(temp) => Exp::Temp(temp),
        }
    }

    /// Call into the runtime; no static link is passed.
    fn external_call(&self, name: &str, args: Vec<Exp>) -> Exp {
        Exp::call(Exp::Name(Label::named(name)), args)
    }

    /// Wrap a function body with the entry view shift and callee-saved
    /// register preservation.
    fn proc_entry_exit1(&self, temps: &mut TempAuthority, frame: &Frame, body: Stm) -> Stm {
        let fp = self.frame_pointer();
        let mut stms = Vec::new();

        for (access, incoming) in frame.formals().iter().zip(frame.incoming()) {
            if let Some(reg) = incoming {
                stms.push(Stm::mov(
                    self.access_frame(*access, Exp::Temp(fp)),
                    Exp::Temp(*reg),
                ));
            }
        }

        let saved: Vec<(Temp, Temp)> = self
            .callee_saved()
            .iter()
            .map(|&reg| (temps.new_temp(), reg))
            .collect();
        for &(copy, reg) in &saved {
            stms.push(Stm::mov(Exp::Temp(copy), Exp::Temp(reg)));
        }
        stms.push(body);
        for &(copy, reg) in &saved {
            stms.push(Stm::mov(Exp::Temp(reg), Exp::Temp(copy)));
        }

        Stm::seq(stms)
    }

    /// Registers whose values must survive to the end of every function.
    fn live_at_exit(&self) -> Vec<Temp> {
        let mut live = vec![
            self.return_value(),
            self.stack_pointer(),
            self.frame_pointer(),
        ];
        live.extend_from_slice(self.callee_saved());
        live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TOY: RegisterSpec = RegisterSpec {
        names: &["a0", "a1", "s0", "fp", "sp"],
        frame_pointer: "fp",
        stack_pointer: "sp",
        return_value: "a0",
        arguments: &["a0", "a1"],
        caller_saved: &["a0", "a1"],
        callee_saved: &["s0"],
    };

    struct Toy {
        regs: MachineRegisters,
    }

    impl CallingConvention for Toy {
        fn name(&self) -> &'static str {
            "toy"
        }

        fn word_size(&self) -> i64 {
            4
        }

        fn registers(&self) -> &MachineRegisters {
            &self.regs
        }

        fn outgoing_slots(&self) -> usize {
            2
        }
    }

    fn toy(temps: &mut TempAuthority) -> Toy {
        Toy {
            regs: MachineRegisters::issue(&TOY, temps).unwrap(),
        }
    }

    #[test]
    fn test_formals_follow_escape_and_register_count() {
        let mut temps = TempAuthority::new();
        let cc = toy(&mut temps);
        let frame = cc
            .create_frame(&mut temps, Label::named("f"), &[true, true, false, true])
            .unwrap();

        let formals = frame.formals();
        assert_eq!(formals[0], Access::InFrame(8));
        assert_eq!(formals[1], Access::InFrame(-4));
        assert!(matches!(formals[2], Access::InReg(_)));
        // Out of registers: memory regardless of escape.
        assert_eq!(formals[3], Access::InFrame(12));
        assert_eq!(frame.registers_used(), 2);
        assert_eq!(frame.incoming()[0], None);
        assert_eq!(frame.incoming()[1], Some(cc.argument_registers()[0]));
        assert_eq!(frame.incoming()[3], None);
    }

    #[test]
    fn test_static_link_leaves_every_argument_register_to_user_formals() {
        let mut temps = TempAuthority::new();
        let cc = toy(&mut temps);
        let frame = cc
            .create_frame(&mut temps, Label::named("f"), &[true, false, false])
            .unwrap();

        assert_eq!(frame.formals()[0], Access::InFrame(cc.incoming_offset(0)));
        assert!(frame.formals()[1..].iter().all(|a| matches!(a, Access::InReg(_))));
        let registers = cc.argument_registers();
        assert_eq!(&frame.incoming()[1..], &[Some(registers[0]), Some(registers[1])]);
        assert_eq!(frame.locals_size(), 0);
    }

    #[test]
    fn test_frame_without_formals_has_no_static_link() {
        let mut temps = TempAuthority::new();
        let cc = toy(&mut temps);
        let frame = cc.create_frame(&mut temps, Label::named("main"), &[]).unwrap();
        assert!(frame.formals().is_empty());
        assert_eq!(frame.registers_used(), 0);
    }

    #[test]
    fn test_too_many_stack_formals_is_a_convention_violation() {
        let mut temps = TempAuthority::new();
        let cc = toy(&mut temps);
        // static link plus two formals past the registers needs three slots
        let err = cc
            .create_frame(&mut temps, Label::named("g"), &[false; 5])
            .unwrap_err();
        assert!(matches!(err, CompileError::CallingConvention { .. }));
        assert!(cc.create_frame(&mut temps, Label::named("g"), &[false; 4]).is_ok());
    }

    #[test]
    fn test_escaping_locals_are_one_word_apart() {
        let mut temps = TempAuthority::new();
        let cc = toy(&mut temps);
        let mut frame = cc
            .create_frame(&mut temps, Label::named("h"), &[true])
            .unwrap();
        let a = frame.allocate_local(&mut temps, true);
        let b = frame.allocate_local(&mut temps, true);
        assert_eq!(a, Access::InFrame(-4));
        assert_eq!(b, Access::InFrame(-8));
        assert!(matches!(frame.allocate_local(&mut temps, false), Access::InReg(_)));
        assert_eq!(frame.locals_size(), 8);
    }

    #[test]
    fn test_access_frame_ignores_frame_pointer_for_registers() {
        let mut temps = TempAuthority::new();
        let cc = toy(&mut temps);
        let t = temps.new_temp();
        let fp = Exp::Temp(cc.frame_pointer());
        assert_eq!(cc.access_frame(Access::InReg(t), fp.clone()), Exp::Temp(t));
        assert_eq!(
            cc.access_frame(Access::InFrame(-4), fp.clone()),
            Exp::mem(Exp::binop(BinOp::Plus, fp, Exp::Const(-4)))
        );
    }

    #[test]
    fn test_view_shift_moves_register_formals_and_saves_callee_saved() {
        let mut temps = TempAuthority::new();
        let cc = toy(&mut temps);
        let frame = cc
            .create_frame(&mut temps, Label::named("k"), &[true, false, false])
            .unwrap();
        let body = Stm::Label(Label::named("body"));
        let stm = cc.proc_entry_exit1(&mut temps, &frame, body);
        let stms = crate::ir::canon::linearize(stm, &mut temps);
        // two view-shift moves, one save, the body, one restore
        assert_eq!(stms.len(), 5);
        assert_eq!(stms[3], Stm::Label(Label::named("body")));
        let saved_copy = match &stms[2] {
            Stm::Move(dst, _) => (**dst).clone(),
            other => panic!("expected callee-saved copy, got {}", other),
        };
        assert_eq!(
            stms[4],
            Stm::mov(Exp::Temp(cc.callee_saved()[0]), saved_copy)
        );
    }
}
