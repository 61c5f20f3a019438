// This module lowers a type-checked, escape-analysed AST to tree IR. It owns the nesting
// structure of functions: every function gets a Level that records its Frame and the Level it
// is lexically nested in, and the outermost Level hosts the program body. Levels are indices
// into a vector owned by the Translator, so parent links never form reference cycles. Each
// non-outermost Level's first formal is the static link, always escaping, through which the
// body of a nested function reaches variables of enclosing functions: following the link k
// times from the current frame pointer yields the frame pointer of the k-th enclosing level.
// The translator accumulates fragments (one per function body plus one per string literal)
// and hands them to the caller, which canonicalises the procedure bodies and runs instruction
// selection over them.

//! AST to IR lowering.

mod exp;
mod lower;

pub use exp::{Cond, TrExp};

use crate::core::error::{CompileError, CompileResult};
use crate::core::temp::{Label, TempAuthority};
use crate::frame::{Access, CallingConvention, Frame};
use crate::ir::{Exp, Stm};
use hashbrown::HashMap;

/// Handle of one function nesting level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Level(usize);

impl Level {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct LevelEntry {
    frame: Frame,
    parent: Option<Level>,
}

/// A unit of output: a function body or a string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Proc { level: Level, body: Stm },
    Str { label: Label, text: String },
}

/// Everything produced by translating one program.
#[derive(Debug)]
pub struct Translation {
    /// Frames indexed by [`Level::index`].
    pub frames: Vec<Frame>,
    /// Fragments in the order they were completed; the program body comes last.
    pub fragments: Vec<Fragment>,
}

impl Translation {
    pub fn frame(&self, level: Level) -> Option<&Frame> {
        self.frames.get(level.0)
    }
}

/// What a name is bound to while lowering.
#[derive(Debug, Clone)]
enum Entry {
    Var { level: Level, access: Access },
    Fun { level: Level, label: Label },
}

/// Runtime functions callable without a declaration. They take no static link.
pub const RUNTIME_FUNCTIONS: &[&str] = &[
    "print",
    "flush",
    "getchar",
    "ord",
    "chr",
    "size",
    "substring",
    "concat",
    "not",
    "exit",
];

/// Lowers one program for one calling convention.
pub struct Translator<'a> {
    cc: &'a dyn CallingConvention,
    temps: &'a mut TempAuthority,
    levels: Vec<LevelEntry>,
    fragments: Vec<Fragment>,
    scopes: Vec<HashMap<String, Entry>>,
    /// Exit labels of the enclosing loops of the current function, innermost last.
    loop_exits: Vec<Label>,
}

impl<'a> Translator<'a> {
    /// Start a translation whose outermost level is named `entry`.
    pub fn new(
        cc: &'a dyn CallingConvention,
        temps: &'a mut TempAuthority,
        entry: &str,
    ) -> CompileResult<Self> {
        let frame = cc.create_frame(temps, Label::named(entry), &[])?;
        Ok(Self {
            cc,
            temps,
            levels: vec![LevelEntry {
                frame,
                parent: None,
            }],
            fragments: Vec::new(),
            scopes: vec![HashMap::new()],
            loop_exits: Vec::new(),
        })
    }

    pub fn outermost(&self) -> Level {
        Level(0)
    }

    fn entry(&self, level: Level) -> CompileResult<&LevelEntry> {
        self.levels
            .get(level.0)
            .ok_or(CompileError::UnknownLevel { level: level.0 })
    }

    /// A level nested in `parent` for a function with the given formals.
    ///
    /// A static link is prepended to `escapes`; it always escapes and never
    /// takes one of the argument registers.
    pub fn new_level(
        &mut self,
        parent: Level,
        name: Label,
        escapes: &[bool],
    ) -> CompileResult<Level> {
        self.entry(parent)?;
        let mut with_link = Vec::with_capacity(escapes.len() + 1);
        with_link.push(true);
        with_link.extend_from_slice(escapes);

        let frame = self.cc.create_frame(self.temps, name, &with_link)?;
        let level = Level(self.levels.len());
        self.levels.push(LevelEntry {
            frame,
            parent: Some(parent),
        });
        Ok(level)
    }

    /// Formals of `level`, static link first.
    pub fn formals(&self, level: Level) -> CompileResult<&[Access]> {
        Ok(self.entry(level)?.frame.formals())
    }

    pub fn frame(&self, level: Level) -> CompileResult<&Frame> {
        Ok(&self.entry(level)?.frame)
    }

    pub fn parent(&self, level: Level) -> CompileResult<Option<Level>> {
        Ok(self.entry(level)?.parent)
    }

    /// Storage for a new local of `level`, paired with the level that owns it.
    pub fn allocate_local(&mut self, level: Level, escapes: bool) -> CompileResult<(Level, Access)> {
        let entry = self
            .levels
            .get_mut(level.0)
            .ok_or(CompileError::UnknownLevel { level: level.0 })?;
        Ok((level, entry.frame.allocate_local(self.temps, escapes)))
    }

    /// Frame pointer of `target` as seen from code running in `from`.
    ///
    /// `target` must be `from` or one of its ancestors; each step up the
    /// chain loads the static link stored in the current frame.
    pub fn frame_address(&self, from: Level, target: Level) -> CompileResult<Exp> {
        let mut fp = Exp::Temp(self.cc.frame_pointer());
        let mut current = from;
        while current != target {
            let entry = self.entry(current)?;
            let (Some(&link), Some(parent)) = (entry.frame.formals().first(), entry.parent) else {
                return Err(CompileError::UnknownLevel { level: target.0 });
            };
            fp = self.cc.access_frame(link, fp);
            current = parent;
        }
        Ok(fp)
    }

    /// IR for a variable declared in `declared` at `access`, used from `used`.
    pub fn simple_var(&self, access: Access, declared: Level, used: Level) -> CompileResult<Exp> {
        let fp = self.frame_address(used, declared)?;
        Ok(self.cc.access_frame(access, fp))
    }

    /// Wrap `body` with the entry and exit sequence of `level` and record it.
    pub fn proc_entry_exit(&mut self, level: Level, body: Stm) -> CompileResult<()> {
        let entry = self
            .levels
            .get(level.0)
            .ok_or(CompileError::UnknownLevel { level: level.0 })?;
        let body = self.cc.proc_entry_exit1(self.temps, &entry.frame, body);
        log::debug!("fragment {} ({} IR nodes)", entry.frame.name(), body.size());
        self.fragments.push(Fragment::Proc { level, body });
        Ok(())
    }

    /// Lower the whole program into the outermost level.
    pub fn translate_program(&mut self, program: &crate::ast::Exp) -> CompileResult<()> {
        let outermost = self.outermost();
        let body = self.exp(outermost, program)?;
        let body = body.un_nx(self.temps);
        self.proc_entry_exit(outermost, body)
    }

    pub fn finish(self) -> Translation {
        Translation {
            frames: self.levels.into_iter().map(|entry| entry.frame).collect(),
            fragments: self.fragments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BinOp;
    use crate::x64::SysV;

    #[test]
    fn test_new_level_prepends_escaping_static_link() {
        let mut temps = TempAuthority::new();
        let cc = SysV::new(&mut temps).unwrap();
        let mut tr = Translator::new(&cc, &mut temps, "tigermain").unwrap();
        let outer = tr.outermost();
        assert!(tr.formals(outer).unwrap().is_empty());

        let f = tr.new_level(outer, Label::named("f"), &[false, true]).unwrap();
        let formals = tr.formals(f).unwrap().to_vec();
        assert_eq!(formals.len(), 3);
        assert_eq!(formals[0], Access::InFrame(16));
        assert!(matches!(formals[1], Access::InReg(_)));
        assert_eq!(formals[2], Access::InFrame(-8));
        assert_eq!(tr.parent(f).unwrap(), Some(outer));
    }

    #[test]
    fn test_all_six_user_formals_get_registers() {
        let mut temps = TempAuthority::new();
        let cc = SysV::new(&mut temps).unwrap();
        let mut tr = Translator::new(&cc, &mut temps, "tigermain").unwrap();
        let outer = tr.outermost();

        let f = tr.new_level(outer, Label::named("f"), &[false; 6]).unwrap();
        let formals = tr.formals(f).unwrap();
        for (n, access) in formals[1..].iter().enumerate() {
            assert!(matches!(access, Access::InReg(_)), "user formal {} is {:?}", n + 1, access);
        }
        assert_eq!(tr.frame(f).unwrap().registers_used(), 6);

        let g = tr.new_level(outer, Label::named("g"), &[false; 7]).unwrap();
        assert_eq!(tr.formals(g).unwrap()[7], Access::InFrame(24));
    }

    #[test]
    fn test_allocate_local_reports_owning_level() {
        let mut temps = TempAuthority::new();
        let cc = SysV::new(&mut temps).unwrap();
        let mut tr = Translator::new(&cc, &mut temps, "tigermain").unwrap();
        let outer = tr.outermost();
        let f = tr.new_level(outer, Label::named("f"), &[]).unwrap();

        let (level, access) = tr.allocate_local(f, true).unwrap();
        assert_eq!(level, f);
        assert_eq!(access, Access::InFrame(-8));
        let (level, access) = tr.allocate_local(outer, false).unwrap();
        assert_eq!(level, outer);
        assert!(matches!(access, Access::InReg(_)));
        assert!(matches!(
            tr.allocate_local(Level(9), true),
            Err(CompileError::UnknownLevel { level: 9 })
        ));
    }

    #[test]
    fn test_frame_address_follows_static_links() {
        let mut temps = TempAuthority::new();
        let cc = SysV::new(&mut temps).unwrap();
        let fp = Exp::Temp(cc.frame_pointer());
        let mut tr = Translator::new(&cc, &mut temps, "tigermain").unwrap();
        let outer = tr.outermost();
        let f = tr.new_level(outer, Label::named("f"), &[]).unwrap();
        let g = tr.new_level(f, Label::named("g"), &[]).unwrap();

        assert_eq!(tr.frame_address(g, g).unwrap(), fp);
        let one_up = Exp::mem(Exp::binop(BinOp::Plus, fp.clone(), Exp::Const(16)));
        assert_eq!(tr.frame_address(g, f).unwrap(), one_up);
        let two_up = Exp::mem(Exp::binop(BinOp::Plus, one_up, Exp::Const(16)));
        assert_eq!(tr.frame_address(g, outer).unwrap(), two_up);
    }

    #[test]
    fn test_frame_address_rejects_non_ancestor() {
        let mut temps = TempAuthority::new();
        let cc = SysV::new(&mut temps).unwrap();
        let mut tr = Translator::new(&cc, &mut temps, "tigermain").unwrap();
        let outer = tr.outermost();
        let f = tr.new_level(outer, Label::named("f"), &[]).unwrap();
        let g = tr.new_level(outer, Label::named("g"), &[]).unwrap();
        assert!(matches!(
            tr.frame_address(f, g),
            Err(CompileError::UnknownLevel { .. })
        ));
        assert!(matches!(
            tr.new_level(Level(42), Label::named("h"), &[]),
            Err(CompileError::UnknownLevel { level: 42 })
        ));
    }
}
