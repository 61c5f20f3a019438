//! Lowering of individual AST constructs.

use super::{Entry, Fragment, Level, TrExp, Translator, RUNTIME_FUNCTIONS};
use crate::ast::{self, Dec, FunDec, Oper, Pos, Var};
use crate::core::error::{CompileError, CompileResult};
use crate::core::temp::Label;
use crate::frame::CallingConvention;
use crate::ir::{BinOp, Exp, RelOp, Stm};
use hashbrown::HashMap;

enum Callee {
    Tiger { level: Level, label: Label },
    Runtime,
}

impl<'a> Translator<'a> {
    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: &str, entry: Entry) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), entry);
        }
    }

    fn lookup(&self, name: &str) -> Option<&Entry> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn fp(&self) -> Exp {
        Exp::Temp(self.cc.frame_pointer())
    }

    fn word(&self, count: i64) -> Exp {
        Exp::Const(count * self.cc.word_size())
    }

    pub(super) fn exp(&mut self, level: Level, exp: &ast::Exp) -> CompileResult<TrExp> {
        match exp {
            ast::Exp::Nil => Ok(TrExp::Ex(Exp::Const(0))),
            ast::Exp::Int(value) => Ok(TrExp::Ex(Exp::Const(*value))),
            ast::Exp::String(text, _) => {
                let label = self.temps.new_label();
                self.fragments.push(Fragment::Str {
                    label: label.clone(),
                    text: text.clone(),
                });
                Ok(TrExp::Ex(Exp::Name(label)))
            }
            ast::Exp::Var(var) => Ok(TrExp::Ex(self.var(level, var)?)),
            ast::Exp::Call { func, args, pos } => self.call(level, func, args, *pos),
            ast::Exp::Op {
                left,
                oper,
                right,
                strings,
                ..
            } => self.op(level, left, *oper, right, *strings),
            ast::Exp::Record { fields, .. } => self.record(level, fields),
            ast::Exp::Seq(exps) => self.seq(level, exps),
            ast::Exp::Assign { var, exp, .. } => {
                let dst = self.var(level, var)?;
                let src = self.exp(level, exp)?.un_ex(self.temps);
                Ok(TrExp::Nx(Stm::mov(dst, src)))
            }
            ast::Exp::If {
                test,
                then,
                otherwise,
                ..
            } => self.if_exp(level, test, then, otherwise.as_deref()),
            ast::Exp::While { test, body, .. } => self.while_loop(level, test, body),
            ast::Exp::For {
                var,
                escape,
                lo,
                hi,
                body,
                ..
            } => self.for_loop(level, var, *escape, lo, hi, body),
            ast::Exp::Break(pos) => match self.loop_exits.last() {
                Some(done) => Ok(TrExp::Nx(Stm::jump(done.clone()))),
                None => Err(CompileError::BreakOutsideLoop { pos: *pos }),
            },
            ast::Exp::Let { decs, body, .. } => self.let_exp(level, decs, body),
            ast::Exp::Array { size, init, .. } => {
                let size = self.exp(level, size)?.un_ex(self.temps);
                let init = self.exp(level, init)?.un_ex(self.temps);
                Ok(TrExp::Ex(self.cc.external_call("initArray", vec![size, init])))
            }
        }
    }

    fn var(&mut self, level: Level, var: &Var) -> CompileResult<Exp> {
        match var {
            Var::Simple { name, pos } => match self.lookup(name) {
                Some(&Entry::Var {
                    level: declared,
                    access,
                }) => self.simple_var(access, declared, level),
                _ => Err(CompileError::UnboundVariable {
                    name: name.clone(),
                    pos: *pos,
                }),
            },
            Var::Field {
                var,
                field,
                slot,
                pos,
            } => {
                let slot = slot.ok_or_else(|| CompileError::MissingFieldSlot {
                    field: field.clone(),
                    pos: *pos,
                })?;
                let base = self.var(level, var)?;
                Ok(Exp::mem(Exp::binop(
                    BinOp::Plus,
                    base,
                    self.word(slot as i64),
                )))
            }
            Var::Subscript { var, index, .. } => {
                let base = self.var(level, var)?;
                let index = self.exp(level, index)?.un_ex(self.temps);
                let offset = Exp::binop(BinOp::Mul, index, self.word(1));
                Ok(Exp::mem(Exp::binop(BinOp::Plus, base, offset)))
            }
        }
    }

    fn callee(&self, func: &str, pos: Pos) -> CompileResult<Callee> {
        match self.lookup(func) {
            Some(Entry::Fun { level, label }) => Ok(Callee::Tiger {
                level: *level,
                label: label.clone(),
            }),
            Some(Entry::Var { .. }) => Err(CompileError::UnboundFunction {
                name: func.to_string(),
                pos,
            }),
            None if RUNTIME_FUNCTIONS.contains(&func) => Ok(Callee::Runtime),
            None => Err(CompileError::UnboundFunction {
                name: func.to_string(),
                pos,
            }),
        }
    }

    fn call(
        &mut self,
        level: Level,
        func: &str,
        args: &[ast::Exp],
        pos: Pos,
    ) -> CompileResult<TrExp> {
        let callee = self.callee(func, pos)?;

        // The callee's static link is the frame of the level it is declared in.
        let link = match &callee {
            Callee::Tiger { level: target, .. } => {
                let declared_in = self
                    .parent(*target)?
                    .ok_or(CompileError::UnknownLevel { level: target.index() })?;
                Some(self.frame_address(level, declared_in)?)
            }
            Callee::Runtime => None,
        };
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.exp(level, arg)?.un_ex(self.temps);
            values.push(value);
        }

        Ok(TrExp::Ex(match (callee, link) {
            (Callee::Tiger { label, .. }, Some(link)) => {
                Exp::linked_call(Exp::Name(label), link, values)
            }
            _ => self.cc.external_call(func, values),
        }))
    }

    fn op(
        &mut self,
        level: Level,
        left: &ast::Exp,
        oper: Oper,
        right: &ast::Exp,
        strings: bool,
    ) -> CompileResult<TrExp> {
        let left = self.exp(level, left)?.un_ex(self.temps);
        let right = self.exp(level, right)?.un_ex(self.temps);

        let relop = match oper {
            Oper::Plus => return Ok(TrExp::Ex(Exp::binop(BinOp::Plus, left, right))),
            Oper::Minus => return Ok(TrExp::Ex(Exp::binop(BinOp::Minus, left, right))),
            Oper::Times => return Ok(TrExp::Ex(Exp::binop(BinOp::Mul, left, right))),
            Oper::Divide => return Ok(TrExp::Ex(Exp::binop(BinOp::Div, left, right))),
            Oper::Eq => RelOp::Eq,
            Oper::Neq => RelOp::Ne,
            Oper::Lt => RelOp::Lt,
            Oper::Le => RelOp::Le,
            Oper::Gt => RelOp::Gt,
            Oper::Ge => RelOp::Ge,
        };

        if strings {
            let compared = self.cc.external_call("stringCompare", vec![left, right]);
            Ok(TrExp::cond(relop, compared, Exp::Const(0)))
        } else {
            Ok(TrExp::cond(relop, left, right))
        }
    }

    fn record(&mut self, level: Level, fields: &[ast::RecordField]) -> CompileResult<TrExp> {
        let r = self.temps.new_temp();
        let size = self.word(fields.len() as i64);
        let mut stms = vec![Stm::mov(
            Exp::Temp(r),
            self.cc.external_call("allocRecord", vec![size]),
        )];
        for (slot, field) in fields.iter().enumerate() {
            let value = self.exp(level, &field.value)?.un_ex(self.temps);
            let addr = Exp::binop(BinOp::Plus, Exp::Temp(r), self.word(slot as i64));
            stms.push(Stm::mov(Exp::mem(addr), value));
        }
        Ok(TrExp::Ex(Exp::eseq(Stm::seq(stms), Exp::Temp(r))))
    }

    fn seq(&mut self, level: Level, exps: &[ast::Exp]) -> CompileResult<TrExp> {
        let Some((last, init)) = exps.split_last() else {
            return Ok(TrExp::Nx(Stm::nop()));
        };
        let mut stms = Vec::with_capacity(init.len());
        for exp in init {
            let stm = self.exp(level, exp)?.un_nx(self.temps);
            stms.push(stm);
        }
        let last = self.exp(level, last)?;
        Ok(self.prefix(stms, last))
    }

    /// Run `stms` before `value`, keeping the kind of `value` where possible.
    fn prefix(&mut self, mut stms: Vec<Stm>, value: TrExp) -> TrExp {
        if stms.is_empty() {
            return value;
        }
        match value {
            TrExp::Nx(stm) => {
                stms.push(stm);
                TrExp::Nx(Stm::seq(stms))
            }
            value => {
                let exp = value.un_ex(self.temps);
                TrExp::Ex(Exp::eseq(Stm::seq(stms), exp))
            }
        }
    }

    fn if_exp(
        &mut self,
        level: Level,
        test: &ast::Exp,
        then: &ast::Exp,
        otherwise: Option<&ast::Exp>,
    ) -> CompileResult<TrExp> {
        let test = self.exp(level, test)?;
        let then = self.exp(level, then)?;
        let t = self.temps.new_label();
        let f = self.temps.new_label();

        let Some(otherwise) = otherwise else {
            let then = then.un_nx(self.temps);
            return Ok(TrExp::Nx(Stm::seq(vec![
                test.un_cx(t.clone(), f.clone())?,
                Stm::Label(t),
                then,
                Stm::Label(f),
            ])));
        };

        let otherwise = self.exp(level, otherwise)?;
        let join = self.temps.new_label();
        if then.is_nx() && otherwise.is_nx() {
            let then = then.un_nx(self.temps);
            let otherwise = otherwise.un_nx(self.temps);
            return Ok(TrExp::Nx(Stm::seq(vec![
                test.un_cx(t.clone(), f.clone())?,
                Stm::Label(t),
                then,
                Stm::jump(join.clone()),
                Stm::Label(f),
                otherwise,
                Stm::Label(join),
            ])));
        }

        let r = self.temps.new_temp();
        let then = then.un_ex(self.temps);
        let otherwise = otherwise.un_ex(self.temps);
        Ok(TrExp::Ex(Exp::eseq(
            Stm::seq(vec![
                test.un_cx(t.clone(), f.clone())?,
                Stm::Label(t),
                Stm::mov(Exp::Temp(r), then),
                Stm::jump(join.clone()),
                Stm::Label(f),
                Stm::mov(Exp::Temp(r), otherwise),
                Stm::Label(join),
            ]),
            Exp::Temp(r),
        )))
    }

    fn while_loop(&mut self, level: Level, test: &ast::Exp, body: &ast::Exp) -> CompileResult<TrExp> {
        let test_label = self.temps.new_label();
        let body_label = self.temps.new_label();
        let done = self.temps.new_label();

        let test = self.exp(level, test)?;
        self.loop_exits.push(done.clone());
        let body = self.exp(level, body);
        self.loop_exits.pop();
        let body = body?.un_nx(self.temps);

        Ok(TrExp::Nx(Stm::seq(vec![
            Stm::Label(test_label.clone()),
            test.un_cx(body_label.clone(), done.clone())?,
            Stm::Label(body_label),
            body,
            Stm::jump(test_label),
            Stm::Label(done),
        ])))
    }

    /// `for i := lo to hi do body`, testing `i < hi` before the increment so
    /// that `hi = maxint` cannot overflow.
    fn for_loop(
        &mut self,
        level: Level,
        name: &str,
        escape: bool,
        lo: &ast::Exp,
        hi: &ast::Exp,
        body: &ast::Exp,
    ) -> CompileResult<TrExp> {
        let lo = self.exp(level, lo)?.un_ex(self.temps);
        let hi = self.exp(level, hi)?.un_ex(self.temps);

        let (owner, access) = self.allocate_local(level, escape)?;
        let i = self.cc.access_frame(access, self.fp());
        let limit = Exp::Temp(self.temps.new_temp());
        let body_label = self.temps.new_label();
        let incr = self.temps.new_label();
        let done = self.temps.new_label();

        self.push_scope();
        self.bind(name, Entry::Var { level: owner, access });
        self.loop_exits.push(done.clone());
        let body = self.exp(level, body);
        self.loop_exits.pop();
        self.pop_scope();
        let body = body?.un_nx(self.temps);

        Ok(TrExp::Nx(Stm::seq(vec![
            Stm::mov(i.clone(), lo),
            Stm::mov(limit.clone(), hi),
            Stm::cjump(
                RelOp::Le,
                i.clone(),
                limit.clone(),
                body_label.clone(),
                done.clone(),
            ),
            Stm::Label(body_label.clone()),
            body,
            Stm::cjump(RelOp::Lt, i.clone(), limit, incr.clone(), done.clone()),
            Stm::Label(incr),
            Stm::mov(
                i.clone(),
                Exp::binop(BinOp::Plus, i, Exp::Const(1)),
            ),
            Stm::jump(body_label),
            Stm::Label(done),
        ])))
    }

    fn let_exp(&mut self, level: Level, decs: &[Dec], body: &ast::Exp) -> CompileResult<TrExp> {
        self.push_scope();
        let result = self.let_body(level, decs, body);
        self.pop_scope();
        result
    }

    fn let_body(&mut self, level: Level, decs: &[Dec], body: &ast::Exp) -> CompileResult<TrExp> {
        let mut stms = Vec::new();
        for dec in decs {
            if let Some(stm) = self.dec(level, dec)? {
                stms.push(stm);
            }
        }
        let body = self.exp(level, body)?;
        Ok(self.prefix(stms, body))
    }

    fn dec(&mut self, level: Level, dec: &Dec) -> CompileResult<Option<Stm>> {
        match dec {
            Dec::Var {
                name, escape, init, ..
            } => {
                // The initialiser cannot see the variable it initialises.
                let value = self.exp(level, init)?.un_ex(self.temps);
                let (owner, access) = self.allocate_local(level, *escape)?;
                self.bind(name, Entry::Var { level: owner, access });
                let dst = self.cc.access_frame(access, self.fp());
                Ok(Some(Stm::mov(dst, value)))
            }
            Dec::Type(_) => Ok(None),
            Dec::Function(group) => {
                self.function_group(level, group)?;
                Ok(None)
            }
        }
    }

    /// Declare every function of a group before lowering any body, so the
    /// members may call each other.
    fn function_group(&mut self, level: Level, group: &[FunDec]) -> CompileResult<()> {
        let mut levels = Vec::with_capacity(group.len());
        for fundec in group {
            let label = self.temps.new_label_for(&fundec.name);
            let escapes: Vec<bool> = fundec.params.iter().map(|p| p.escape).collect();
            let fun_level = self.new_level(level, label.clone(), &escapes)?;
            self.bind(
                &fundec.name,
                Entry::Fun {
                    level: fun_level,
                    label,
                },
            );
            levels.push(fun_level);
        }

        for (fundec, &fun_level) in group.iter().zip(&levels) {
            self.function_body(fun_level, fundec)?;
        }
        Ok(())
    }

    fn function_body(&mut self, level: Level, fundec: &FunDec) -> CompileResult<()> {
        let formals = self.formals(level)?.to_vec();
        self.push_scope();
        for (param, &access) in fundec.params.iter().zip(formals.iter().skip(1)) {
            self.bind(&param.name, Entry::Var { level, access });
        }

        // Loops of the enclosing function are not visible inside this one.
        let outer_loops = std::mem::take(&mut self.loop_exits);
        let body = self.exp(level, &fundec.body);
        self.loop_exits = outer_loops;
        self.pop_scope();
        let body = body?;

        let body = if fundec.result.is_some() {
            let value = body.un_ex(self.temps);
            Stm::mov(Exp::Temp(self.cc.return_value()), value)
        } else {
            body.un_nx(self.temps)
        };
        self.proc_entry_exit(level, body)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::build::*;
    use crate::ast::Pos;
    use crate::core::error::CompileError;
    use crate::core::temp::TempAuthority;
    use crate::frame::{Access, CallingConvention};
    use crate::ir::{BinOp, Exp, Stm};
    use crate::translate::{Fragment, Translation, Translator};
    use crate::x64::SysV;

    fn translate(program: &mut crate::ast::Exp) -> Result<(Translation, SysV), CompileError> {
        crate::escape::analyse(program)?;
        let mut temps = TempAuthority::new();
        let cc = SysV::new(&mut temps)?;
        let translation = {
            let mut tr = Translator::new(&cc, &mut temps, "tigermain")?;
            tr.translate_program(program)?;
            tr.finish()
        };
        Ok((translation, cc))
    }

    fn contains_exp(stm: &Stm, wanted: &Exp) -> bool {
        fn in_exp(exp: &Exp, wanted: &Exp) -> bool {
            exp == wanted
                || match exp {
                    Exp::BinOp(_, l, r) => in_exp(l, wanted) || in_exp(r, wanted),
                    Exp::Mem(e) => in_exp(e, wanted),
                    Exp::Call(f, link, args) => {
                        in_exp(f, wanted)
                            || link.as_deref().is_some_and(|l| in_exp(l, wanted))
                            || args.iter().any(|a| in_exp(a, wanted))
                    }
                    Exp::ESeq(s, e) => contains_exp(s, wanted) || in_exp(e, wanted),
                    _ => false,
                }
        }
        match stm {
            Stm::Move(d, s) => in_exp(d, wanted) || in_exp(s, wanted),
            Stm::Exp(e) | Stm::Jump(e, _) => in_exp(e, wanted),
            Stm::CJump { left, right, .. } => in_exp(left, wanted) || in_exp(right, wanted),
            Stm::Seq(a, b) => contains_exp(a, wanted) || contains_exp(b, wanted),
            Stm::Label(_) => false,
        }
    }

    fn proc_body<'t>(translation: &'t Translation, name_prefix: &str) -> &'t Stm {
        translation
            .fragments
            .iter()
            .find_map(|fragment| match fragment {
                Fragment::Proc { level, body }
                    if translation
                        .frame(*level)
                        .is_some_and(|f| f.name().as_str().starts_with(name_prefix)) =>
                {
                    Some(body)
                }
                _ => None,
            })
            .expect("no such procedure")
    }

    #[test]
    fn test_escaping_variable_lives_in_frame() {
        // let var x := 1 function f() : int = x in f() end
        let mut program = let_in(
            vec![
                var_dec("x", int(1)),
                fun_dec(fundec("f", &[], Some("int"), var("x"))),
            ],
            call("f", vec![]),
        );
        let (translation, cc) = translate(&mut program).unwrap();
        let fp = Exp::Temp(cc.frame_pointer());

        // x is the first local of the outermost frame.
        let x_in_main = Exp::mem(Exp::binop(BinOp::Plus, fp.clone(), Exp::Const(-8)));
        assert!(contains_exp(proc_body(&translation, "tigermain"), &x_in_main));

        // Inside f, x is reached through f's static link.
        let link = Exp::mem(Exp::binop(BinOp::Plus, fp, Exp::Const(16)));
        let x_in_f = Exp::mem(Exp::binop(BinOp::Plus, link, Exp::Const(-8)));
        assert!(contains_exp(proc_body(&translation, "f."), &x_in_f));
    }

    #[test]
    fn test_local_variable_stays_in_register() {
        let mut program = let_in(vec![var_dec("y", int(2))], plus(var("y"), int(1)));
        let (translation, _) = translate(&mut program).unwrap();
        assert_eq!(translation.frames[0].locals_size(), 0);
    }

    #[test]
    fn test_call_passes_static_link() {
        let mut program = let_in(
            vec![fun_dec(fundec("g", &["a"], Some("int"), var("a")))],
            call("g", vec![int(5)]),
        );
        let (translation, cc) = translate(&mut program).unwrap();
        let main = proc_body(&translation, "tigermain");
        let g_frame = translation.frames.iter().find(|f| f.name().as_str().starts_with("g.")).unwrap();
        let call = Exp::linked_call(
            Exp::Name(g_frame.name().clone()),
            Exp::Temp(cc.frame_pointer()),
            vec![Exp::Const(5)],
        );
        assert!(contains_exp(main, &call));
        assert_eq!(g_frame.formals()[0], Access::InFrame(16));
        assert_eq!(g_frame.incoming()[1], Some(cc.argument_registers()[0]));
    }

    #[test]
    fn test_runtime_call_has_no_static_link() {
        let mut program = call("print", vec![string("hi")]);
        let (translation, _) = translate(&mut program).unwrap();
        let label = translation
            .fragments
            .iter()
            .find_map(|f| match f {
                Fragment::Str { label, text } if text == "hi" => Some(label.clone()),
                _ => None,
            })
            .unwrap();
        let expected = Exp::call(
            Exp::Name(crate::core::temp::Label::named("print")),
            vec![Exp::Name(label)],
        );
        assert!(contains_exp(proc_body(&translation, "tigermain"), &expected));
    }

    #[test]
    fn test_assignment_used_as_loop_condition_is_rejected() {
        // let var a := 0 in while (a := 1) do () end
        let mut program = let_in(
            vec![var_dec("a", int(0))],
            while_loop(assign(simple("a"), int(1)), seq(vec![])),
        );
        assert!(matches!(
            translate(&mut program),
            Err(CompileError::StatementAsCondition { .. })
        ));
    }

    #[test]
    fn test_break_outside_loop_is_reported() {
        let mut program = seq(vec![int(1), brk_at(Pos::new(4, 2))]);
        let err = translate(&mut program).unwrap_err();
        assert_eq!(err, CompileError::BreakOutsideLoop { pos: Pos::new(4, 2) });
    }

    #[test]
    fn test_break_inside_function_does_not_see_outer_loop() {
        // while 1 do let function f() = break in f() end
        let mut program = while_loop(
            int(1),
            let_in(vec![fun_dec(fundec("f", &[], None, brk()))], call("f", vec![])),
        );
        assert!(matches!(
            translate(&mut program),
            Err(CompileError::BreakOutsideLoop { .. })
        ));
    }

    #[test]
    fn test_missing_field_slot_is_reported() {
        let mut program = let_in(
            vec![
                record_type("point", &["x", "y"]),
                var_dec("p", record("point", vec![("x", int(1)), ("y", int(2))])),
            ],
            lvalue(unresolved_field_at(simple("p"), "y", Pos::new(2, 9))),
        );
        match translate(&mut program) {
            Err(CompileError::MissingFieldSlot { field, pos }) => {
                assert_eq!(field, "y");
                assert_eq!(pos, Pos::new(2, 9));
            }
            other => panic!("expected MissingFieldSlot, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_field_access_uses_slot_offset() {
        let mut program = let_in(
            vec![
                record_type("point", &["x", "y"]),
                var_dec("p", record("point", vec![("x", int(1)), ("y", int(2))])),
            ],
            lvalue(field(simple("p"), "y", 1)),
        );
        let (translation, _) = translate(&mut program).unwrap();
        let main = proc_body(&translation, "tigermain");
        assert!(contains_exp(main, &Exp::Const(8)));
        assert!(contains_exp(
            main,
            &Exp::call(
                Exp::Name(crate::core::temp::Label::named("allocRecord")),
                vec![Exp::Const(16)]
            )
        ));
    }

    #[test]
    fn test_mutually_recursive_functions() {
        let mut program = let_in(
            vec![fun_group(vec![
                fundec("even", &["n"], Some("int"), call("odd", vec![var("n")])),
                fundec("odd", &["n"], Some("int"), call("even", vec![var("n")])),
            ])],
            call("even", vec![int(4)]),
        );
        let (translation, _) = translate(&mut program).unwrap();
        let procs = translation
            .fragments
            .iter()
            .filter(|f| matches!(f, Fragment::Proc { .. }))
            .count();
        assert_eq!(procs, 3);
    }

    #[test]
    fn test_unknown_function_is_reported() {
        let mut program = call_at("nosuch", vec![], Pos::new(1, 1));
        assert!(matches!(
            translate(&mut program),
            Err(CompileError::UnboundFunction { .. })
        ));
    }
}
