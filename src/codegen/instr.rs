//! Selected instructions.
//!
//! Instructions keep their operands symbolic: the assembly text carries
//! placeholders (`` `d0``, `` `s1``, `` `j0``, `` `i0``) that [`Instruction::format`]
//! replaces with register names, labels and immediates.

use crate::core::temp::{Label, Temp, TempMap};
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrKind {
    Oper,
    Move,
    Label,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub kind: InstrKind,
    pub asm: String,
    pub dst: Vec<Temp>,
    pub src: Vec<Temp>,
    /// Jump targets for `Oper`, the defined label for `Label`.
    pub labels: Vec<Label>,
    pub imms: Vec<i64>,
    /// Registers written without appearing in the text (call clobbers).
    pub implicit_defs: Vec<Temp>,
    /// Registers read without appearing in the text (argument registers).
    pub implicit_uses: Vec<Temp>,
}

impl Instruction {
    pub fn label(label: Label) -> Self {
        Self {
            kind: InstrKind::Label,
            asm: "`j0:".to_string(),
            dst: Vec::new(),
            src: Vec::new(),
            labels: vec![label],
            imms: Vec::new(),
            implicit_defs: Vec::new(),
            implicit_uses: Vec::new(),
        }
    }

    pub fn oper(asm: impl Into<String>, dst: Vec<Temp>, src: Vec<Temp>) -> Self {
        Self {
            kind: InstrKind::Oper,
            asm: asm.into(),
            dst,
            src,
            labels: Vec::new(),
            imms: Vec::new(),
            implicit_defs: Vec::new(),
            implicit_uses: Vec::new(),
        }
    }

    /// Every register this instruction writes.
    pub fn defs(&self) -> impl Iterator<Item = Temp> + '_ {
        self.dst.iter().chain(&self.implicit_defs).copied()
    }

    /// Every register this instruction reads.
    pub fn uses(&self) -> impl Iterator<Item = Temp> + '_ {
        self.src.iter().chain(&self.implicit_uses).copied()
    }

    pub fn is_move(&self) -> bool {
        self.kind == InstrKind::Move
    }

    /// Render the assembly text, naming temps through `names`.
    ///
    /// A negative immediate directly after `+ ` is printed as a subtraction.
    pub fn format(&self, names: &TempMap<'_>) -> String {
        let mut out = String::with_capacity(self.asm.len() + 16);
        let mut chars = self.asm.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '`' {
                out.push(c);
                continue;
            }
            let Some(kind) = chars.next() else {
                out.push('`');
                break;
            };
            let mut index = 0usize;
            let mut digits = 0;
            while let Some(d) = chars.peek().and_then(|d| d.to_digit(10)) {
                index = index * 10 + d as usize;
                digits += 1;
                chars.next();
            }
            if digits == 0 {
                out.push('`');
                out.push(kind);
                continue;
            }
            match kind {
                'd' => self.write_temp(&mut out, self.dst.get(index), names),
                's' => self.write_temp(&mut out, self.src.get(index), names),
                'j' => match self.labels.get(index) {
                    Some(label) => out.push_str(label.as_str()),
                    None => out.push_str("<?>"),
                },
                'i' => match self.imms.get(index) {
                    Some(&value) if value < 0 && out.ends_with("+ ") => {
                        out.truncate(out.len() - 2);
                        let _ = write!(out, "- {}", value.unsigned_abs());
                    }
                    Some(value) => {
                        let _ = write!(out, "{}", value);
                    }
                    None => out.push_str("<?>"),
                },
                other => {
                    out.push('`');
                    out.push(other);
                    let _ = write!(out, "{}", index);
                }
            }
        }
        out
    }

    fn write_temp(&self, out: &mut String, temp: Option<&Temp>, names: &TempMap<'_>) {
        match temp {
            Some(&t) => out.push_str(&names.name(t)),
            None => out.push_str("<?>"),
        }
    }
}
