// This module provides the compilation session that drives one program through the back end.
// CompilationSession owns the temp/label authority and the selected target for its whole
// lifetime, so every temp, label and machine register handed out while compiling belongs to
// one counter space and one name map. compile() runs the stages in order: escape analysis
// mutates the AST in place, the translator lowers it into procedure and string fragments,
// each procedure body is canonicalised into a flat statement list, and the instruction
// selector turns that list into abstract instructions with the exit sink appended. Frames
// are moved into the returned CompiledUnit together with the code generated against them.
// Any stage failure aborts the unit and is returned as a CompileError. SessionStats tracks
// compilation metrics like function count, fragments, escaping variables, IR statements and
// an instruction breakdown by mnemonic, and accumulates across compile() calls.

//! Compilation session management.

use crate::ast;
use crate::codegen::{Codegen, InstrKind, Instruction};
use crate::config::Config;
use crate::core::error::{CompileError, CompileResult};
use crate::core::temp::{Label, TempAuthority, TempMap};
use crate::escape;
use crate::frame::{CallingConvention, Frame};
use crate::ir::{canon, Stm};
use crate::target::Target;
use crate::translate::{Fragment, Level, Translator};
use hashbrown::HashMap;
use std::fmt;

/// One procedure after instruction selection.
#[derive(Debug, Clone)]
pub struct CompiledProc {
    pub name: Label,
    pub level: Level,
    /// Canonical statement list the instructions were selected from.
    pub ir: Vec<Stm>,
    pub instructions: Vec<Instruction>,
}

/// One string literal with its data directive.
#[derive(Debug, Clone)]
pub struct CompiledString {
    pub label: Label,
    pub text: String,
    pub instructions: Vec<Instruction>,
}

/// Everything produced for one program.
#[derive(Debug)]
pub struct CompiledUnit {
    /// Frames indexed by [`Level::index`].
    pub frames: Vec<Frame>,
    /// Procedures in fragment order; the program body comes last.
    pub procs: Vec<CompiledProc>,
    pub strings: Vec<CompiledString>,
}

impl CompiledUnit {
    pub fn frame(&self, proc: &CompiledProc) -> Option<&Frame> {
        self.frames.get(proc.level.index())
    }

    pub fn proc(&self, name: &str) -> Option<&CompiledProc> {
        self.procs.iter().find(|p| p.name.as_str() == name)
    }

    /// Assembly-like listing of the whole unit.
    pub fn listing(&self, names: &TempMap<'_>) -> String {
        let mut out = String::new();
        for string in &self.strings {
            for instr in &string.instructions {
                push_line(&mut out, instr, names);
            }
        }
        for proc in &self.procs {
            for instr in &proc.instructions {
                push_line(&mut out, instr, names);
            }
        }
        out
    }
}

fn push_line(out: &mut String, instr: &Instruction, names: &TempMap<'_>) {
    if instr.kind != InstrKind::Label {
        out.push_str("    ");
    }
    out.push_str(&instr.format(names));
    out.push('\n');
}

/// Compilation session for one target.
pub struct CompilationSession {
    config: Config,
    temps: TempAuthority,
    target: Target,
    stats: SessionStats,
}

impl CompilationSession {
    /// Create a session, issuing the target's machine registers.
    pub fn new(config: Config) -> CompileResult<Self> {
        let mut temps = TempAuthority::new();
        let target = config.arch.target(&mut temps)?;
        log::info!("session for {} (entry `{}`)", config.arch, config.entry);
        Ok(Self {
            config,
            temps,
            target,
            stats: SessionStats::default(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn convention(&self) -> &dyn CallingConvention {
        self.target.convention()
    }

    /// Names of every temp issued so far, machine registers included.
    pub fn names(&self) -> &TempMap<'static> {
        self.temps.names()
    }

    pub fn temps(&self) -> &TempAuthority {
        &self.temps
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Run every stage over `program`.
    pub fn compile(&mut self, program: &mut ast::Exp) -> CompileResult<CompiledUnit> {
        escape::analyse(program)?;
        let escaping = escape::escape_flags(program)
            .iter()
            .filter(|(_, escapes)| *escapes)
            .count();
        self.stats.record_escaping_variables(escaping);

        let cc = self.target.convention.as_ref();
        let isa = self.target.isa;
        let translation = {
            let mut translator = Translator::new(cc, &mut self.temps, &self.config.entry)?;
            translator.translate_program(program)?;
            translator.finish()
        };

        let mut procs = Vec::new();
        let mut strings = Vec::new();
        for fragment in translation.fragments {
            self.stats.record_fragment();
            match fragment {
                Fragment::Proc { level, body } => {
                    let name = translation
                        .frames
                        .get(level.index())
                        .map(|frame| frame.name().clone())
                        .ok_or(CompileError::UnknownLevel {
                            level: level.index(),
                        })?;
                    let ir = canon::linearize(body, &mut self.temps);
                    let mut codegen = Codegen::new(cc, isa, &mut self.temps);
                    let mut instructions = vec![Instruction::label(name.clone())];
                    instructions.extend(codegen.select_all(&ir)?);
                    codegen.proc_entry_exit2(&mut instructions);

                    log::debug!(
                        "{}: {} statements, {} instructions",
                        name,
                        ir.len(),
                        instructions.len()
                    );
                    self.stats.record_function_compiled(&name, ir.len(), &instructions);
                    procs.push(CompiledProc {
                        name,
                        level,
                        ir,
                        instructions,
                    });
                }
                Fragment::Str { label, text } => {
                    let instructions =
                        Codegen::new(cc, isa, &mut self.temps).translate_string(&label, &text);
                    self.stats.record_string();
                    strings.push(CompiledString {
                        label,
                        text,
                        instructions,
                    });
                }
            }
        }

        Ok(CompiledUnit {
            frames: translation.frames,
            procs,
            strings,
        })
    }
}

/// Compilation session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Number of procedures compiled.
    pub functions_compiled: usize,

    /// Fragments produced by the translator.
    pub fragments: usize,

    /// String literals emitted.
    pub strings: usize,

    /// Variables and formals marked as escaping.
    pub escaping_variables: usize,

    /// Canonical IR statements selected from.
    pub ir_statements: usize,

    /// Instructions emitted, labels excluded.
    pub instructions_emitted: usize,

    /// Count of each mnemonic emitted.
    pub instruction_counts: HashMap<String, usize>,

    /// Largest procedure compiled, in instructions.
    pub largest_function_size: usize,

    /// Name of largest procedure.
    pub largest_function_name: String,
}

impl SessionStats {
    pub fn record_function_compiled(&mut self, name: &Label, statements: usize, instrs: &[Instruction]) {
        self.functions_compiled += 1;
        self.ir_statements += statements;

        let mut size = 0;
        for instr in instrs.iter().filter(|i| i.kind != InstrKind::Label) {
            // the exit sink has no text
            let Some(mnemonic) = instr.asm.split_whitespace().next() else {
                continue;
            };
            size += 1;
            *self
                .instruction_counts
                .entry(mnemonic.to_string())
                .or_insert(0) += 1;
        }
        self.instructions_emitted += size;

        if self.largest_function_size < size {
            self.largest_function_size = size;
            self.largest_function_name = name.to_string();
        }
    }

    pub fn record_fragment(&mut self) {
        self.fragments += 1;
    }

    pub fn record_string(&mut self) {
        self.strings += 1;
    }

    pub fn record_escaping_variables(&mut self, count: usize) {
        self.escaping_variables += count;
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Session Statistics:")?;
        writeln!(f, "  Functions compiled: {}", self.functions_compiled)?;
        writeln!(f, "  Fragments: {}", self.fragments)?;
        writeln!(f, "  String literals: {}", self.strings)?;
        writeln!(f, "  Escaping variables: {}", self.escaping_variables)?;
        writeln!(f, "  IR statements: {}", self.ir_statements)?;
        writeln!(f, "  Instructions emitted: {}", self.instructions_emitted)?;

        if !self.largest_function_name.is_empty() {
            writeln!(
                f,
                "  Largest function: {} ({} instructions)",
                self.largest_function_name, self.largest_function_size
            )?;
        }

        if !self.instruction_counts.is_empty() {
            writeln!(f, "  Instruction breakdown:")?;
            let mut sorted: Vec<_> = self.instruction_counts.iter().collect();
            sorted.sort_by(|(a, x), (b, y)| y.cmp(x).then_with(|| a.cmp(b)));

            for (mnemonic, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {}: {}", mnemonic, count)?;
            }
        }

        Ok(())
    }
}
