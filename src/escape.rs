// This module implements escape analysis: a single depth-first pass over the AST that decides,
// for every variable declaration, formal parameter and for-loop induction variable, whether the
// variable is referenced from a function nested inside the function that declares it. Such a
// variable "escapes" and must live in the frame rather than in a register, because the nested
// function reaches it through the static link chain. The flag lives on the AST node that
// introduces the variable and is flipped in place; the translator reads it exactly once when
// it allocates the variable's storage. The environment is a stack of scopes, each tagged with
// the function-nesting depth it belongs to, so nested let blocks inside one function never
// cause a spurious escape.

//! Escape analysis over the AST.

use crate::ast::{Dec, Exp, Field, FunDec, Pos, Var};
use crate::core::error::{CompileError, CompileResult};
use hashbrown::HashMap;

/// One lexical scope: a function body, a let block or a for loop.
struct Scope<'a> {
    /// Function-nesting depth the scope belongs to.
    depth: usize,
    vars: HashMap<&'a str, &'a mut bool>,
}

/// Walks an AST and marks escaping variables.
pub struct EscapeAnalyser<'a> {
    scopes: Vec<Scope<'a>>,
    depth: usize,
}

/// Mark every variable in `exp` that is referenced from a nested function.
///
/// Flags only ever move from `false` to `true`; a flag that is already set
/// stays set. Running the analysis twice over the same tree yields the
/// same result.
pub fn analyse(exp: &mut Exp) -> CompileResult<()> {
    EscapeAnalyser::new().walk_exp(exp)
}

impl<'a> EscapeAnalyser<'a> {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            depth: 0,
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(Scope {
            depth: self.depth,
            vars: HashMap::new(),
        });
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn bind(&mut self, name: &'a str, flag: &'a mut bool) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.vars.insert(name, flag);
        }
    }

    fn reference(&mut self, name: &str, pos: Pos) -> CompileResult<()> {
        let depth = self.depth;
        for scope in self.scopes.iter_mut().rev() {
            if let Some(flag) = scope.vars.get_mut(name) {
                if scope.depth < depth && !**flag {
                    log::trace!("`{}` escapes (declared at depth {}, used at {})", name, scope.depth, depth);
                    **flag = true;
                }
                return Ok(());
            }
        }
        Err(CompileError::UnboundVariable {
            name: name.to_string(),
            pos,
        })
    }

    pub fn walk_exp(&mut self, exp: &'a mut Exp) -> CompileResult<()> {
        match exp {
            Exp::Var(var) => self.walk_var(var),
            Exp::Nil | Exp::Int(_) | Exp::String(..) | Exp::Break(_) => Ok(()),
            Exp::Call { args, .. } => {
                for arg in args.iter_mut() {
                    self.walk_exp(arg)?;
                }
                Ok(())
            }
            Exp::Op { left, right, .. } => {
                self.walk_exp(left)?;
                self.walk_exp(right)
            }
            Exp::Record { fields, .. } => {
                for field in fields.iter_mut() {
                    self.walk_exp(&mut field.value)?;
                }
                Ok(())
            }
            Exp::Seq(exps) => {
                for exp in exps.iter_mut() {
                    self.walk_exp(exp)?;
                }
                Ok(())
            }
            Exp::Assign { var, exp, .. } => {
                self.walk_var(var)?;
                self.walk_exp(exp)
            }
            Exp::If {
                test,
                then,
                otherwise,
                ..
            } => {
                self.walk_exp(test)?;
                self.walk_exp(then)?;
                if let Some(otherwise) = otherwise {
                    self.walk_exp(otherwise)?;
                }
                Ok(())
            }
            Exp::While { test, body, .. } => {
                self.walk_exp(test)?;
                self.walk_exp(body)
            }
            Exp::For {
                var,
                escape,
                lo,
                hi,
                body,
                ..
            } => {
                self.walk_exp(lo)?;
                self.walk_exp(hi)?;
                let var: &'a String = var;
                self.push_scope();
                self.bind(var, escape);
                let result = self.walk_exp(body);
                self.pop_scope();
                result
            }
            Exp::Let { decs, body, .. } => {
                self.push_scope();
                let result = self.walk_let(decs, body);
                self.pop_scope();
                result
            }
            Exp::Array { size, init, .. } => {
                self.walk_exp(size)?;
                self.walk_exp(init)
            }
        }
    }

    fn walk_let(&mut self, decs: &'a mut Vec<Dec>, body: &'a mut Exp) -> CompileResult<()> {
        for dec in decs.iter_mut() {
            match dec {
                Dec::Function(fundecs) => {
                    for fundec in fundecs.iter_mut() {
                        let FunDec { params, body: fun_body, .. } = fundec;
                        self.depth += 1;
                        self.push_scope();
                        for param in params.iter_mut() {
                            let Field { name, escape, .. } = param;
                            let name: &'a String = name;
                            self.bind(name, escape);
                        }
                        let result = self.walk_exp(fun_body);
                        self.pop_scope();
                        self.depth -= 1;
                        result?;
                    }
                }
                Dec::Var {
                    name, escape, init, ..
                } => {
                    self.walk_exp(init)?;
                    let name: &'a String = name;
                    self.bind(name, escape);
                }
                Dec::Type(_) => {}
            }
        }
        self.walk_exp(body)
    }

    fn walk_var(&mut self, var: &'a mut Var) -> CompileResult<()> {
        match var {
            Var::Simple { name, pos } => self.reference(name, *pos),
            Var::Field { var, .. } => self.walk_var(var),
            Var::Subscript { var, index, .. } => {
                self.walk_var(var)?;
                self.walk_exp(index)
            }
        }
    }
}

impl Default for EscapeAnalyser<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Every variable-introducing node in source order with its escape flag.
pub fn escape_flags(exp: &Exp) -> Vec<(String, bool)> {
    let mut flags = Vec::new();
    collect_exp(exp, &mut flags);
    flags
}

fn collect_exp(exp: &Exp, out: &mut Vec<(String, bool)>) {
    match exp {
        Exp::Var(var) => collect_var(var, out),
        Exp::Nil | Exp::Int(_) | Exp::String(..) | Exp::Break(_) => {}
        Exp::Call { args, .. } => args.iter().for_each(|a| collect_exp(a, out)),
        Exp::Op { left, right, .. } => {
            collect_exp(left, out);
            collect_exp(right, out);
        }
        Exp::Record { fields, .. } => fields.iter().for_each(|f| collect_exp(&f.value, out)),
        Exp::Seq(exps) => exps.iter().for_each(|e| collect_exp(e, out)),
        Exp::Assign { var, exp, .. } => {
            collect_var(var, out);
            collect_exp(exp, out);
        }
        Exp::If {
            test,
            then,
            otherwise,
            ..
        } => {
            collect_exp(test, out);
            collect_exp(then, out);
            if let Some(otherwise) = otherwise {
                collect_exp(otherwise, out);
            }
        }
        Exp::While { test, body, .. } => {
            collect_exp(test, out);
            collect_exp(body, out);
        }
        Exp::For {
            var,
            escape,
            lo,
            hi,
            body,
            ..
        } => {
            collect_exp(lo, out);
            collect_exp(hi, out);
            out.push((var.clone(), *escape));
            collect_exp(body, out);
        }
        Exp::Let { decs, body, .. } => {
            for dec in decs {
                match dec {
                    Dec::Function(fundecs) => {
                        for fundec in fundecs {
                            for param in &fundec.params {
                                out.push((param.name.clone(), param.escape));
                            }
                            collect_exp(&fundec.body, out);
                        }
                    }
                    Dec::Var {
                        name, escape, init, ..
                    } => {
                        collect_exp(init, out);
                        out.push((name.clone(), *escape));
                    }
                    Dec::Type(_) => {}
                }
            }
            collect_exp(body, out);
        }
        Exp::Array { size, init, .. } => {
            collect_exp(size, out);
            collect_exp(init, out);
        }
    }
}

fn collect_var(var: &Var, out: &mut Vec<(String, bool)>) {
    match var {
        Var::Simple { .. } => {}
        Var::Field { var, .. } => collect_var(var, out),
        Var::Subscript { var, index, .. } => {
            collect_var(var, out);
            collect_exp(index, out);
        }
    }
}
