//! Developer tool: compile a built-in sample program and dump the result.
//!
//! Prints the canonical IR (with `--ir`) and the selected instructions of
//! every procedure. Failures are reported as `file(line,column): message:
//! detail` followed by the offending source line and a caret.

use clap::Parser as ClapParser;
use std::process;

use tiger_backend::ast::build::*;
use tiger_backend::ast::{self, Pos};
use tiger_backend::{CompilationSession, CompileError, Config};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Target architecture
    #[arg(long, default_value = "x64", help = "x64, arm64 or i386")]
    arch: String,

    /// Sample program to compile
    #[arg(long, default_value = "factorial", help = "Name of a built-in sample")]
    sample: String,

    /// Also print the canonical IR of each procedure
    #[arg(long, help = "Dump canonical IR before the instructions")]
    ir: bool,

    /// Print session statistics at the end
    #[arg(long)]
    stats: bool,
}

struct Sample {
    name: &'static str,
    /// Tiger source the tree stands for, used to render diagnostics.
    source: &'static str,
    build: fn() -> ast::Exp,
}

const SAMPLES: &[Sample] = &[
    Sample {
        name: "hello",
        source: "print(\"hello\\n\")",
        build: || call("print", vec![string("hello\n")]),
    },
    Sample {
        name: "factorial",
        source: "let function fact(n: int): int = if n = 0 then 1 else n * fact(n - 1) in fact(10) end",
        build: || {
            let_in(
                vec![fun_dec(fundec(
                    "fact",
                    &["n"],
                    Some("int"),
                    if_else(
                        eq(var("n"), int(0)),
                        int(1),
                        times(var("n"), call("fact", vec![minus(var("n"), int(1))])),
                    ),
                ))],
                call("fact", vec![int(10)]),
            )
        },
    },
    Sample {
        name: "nested",
        source: "let var total := 0 function add(k: int) = total := total + k in for i := 1 to 10 do add(i) end",
        build: || {
            let_in(
                vec![
                    var_dec("total", int(0)),
                    fun_dec(fundec(
                        "add",
                        &["k"],
                        None,
                        assign(simple("total"), plus(var("total"), var("k"))),
                    )),
                ],
                for_loop("i", int(1), int(10), call("add", vec![var("i")])),
            )
        },
    },
    Sample {
        name: "records",
        source: "let type point = {x: int, y: int} var p := point{x = 1, y = 2} in p.y := p.x + 40 end",
        build: || {
            let_in(
                vec![
                    record_type("point", &["x", "y"]),
                    var_dec("p", record("point", vec![("x", int(1)), ("y", int(2))])),
                ],
                assign(
                    field(simple("p"), "y", 1),
                    plus(lvalue(field(simple("p"), "x", 0)), int(40)),
                ),
            )
        },
    },
    Sample {
        name: "many-args",
        source: "let function sum8(a, b, c, d, e, f, g, h: int): int = a + h in sum8(1, 2, 3, 4, 5, 6, 7, 8) end",
        build: || {
            let params = ["a", "b", "c", "d", "e", "f", "g", "h"];
            let_in(
                vec![fun_dec(fundec(
                    "sum8",
                    &params,
                    Some("int"),
                    plus(var("a"), var("h")),
                ))],
                call("sum8", (1..=8).map(int).collect()),
            )
        },
    },
    Sample {
        name: "broken",
        source: "(print(\"x\"); break)",
        build: || seq(vec![call("print", vec![string("x")]), brk_at(Pos::new(1, 14))]),
    },
];

fn report(file: &str, source: &str, err: &CompileError) {
    let diag = err.diagnostic();
    eprintln!(
        "{}({},{}): {}: {}",
        file, diag.pos.line, diag.pos.column, diag.message, diag.detail
    );
    if !diag.pos.is_known() {
        return;
    }
    if let Some(line) = source.lines().nth(diag.pos.line as usize - 1) {
        eprintln!("{}", line);
        eprintln!("{}^", " ".repeat(diag.pos.column.saturating_sub(1) as usize));
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let Some(sample) = SAMPLES.iter().find(|s| s.name == cli.sample) else {
        let names: Vec<&str> = SAMPLES.iter().map(|s| s.name).collect();
        eprintln!("unknown sample '{}'; available: {}", cli.sample, names.join(", "));
        process::exit(2);
    };
    let file = format!("{}.tig", sample.name);

    let mut session = match Config::new(&cli.arch).and_then(CompilationSession::new) {
        Ok(session) => session,
        Err(err) => {
            report(&file, sample.source, &err);
            process::exit(1);
        }
    };

    let mut program = (sample.build)();
    let unit = match session.compile(&mut program) {
        Ok(unit) => unit,
        Err(err) => {
            report(&file, sample.source, &err);
            process::exit(1);
        }
    };

    let names = session.names();
    for string in &unit.strings {
        for instr in &string.instructions {
            println!("{}", instr.format(names));
        }
    }
    for proc in &unit.procs {
        println!();
        if let Some(frame) = unit.frame(proc) {
            println!(
                "# {}: {} formals, {} bytes of locals",
                proc.name,
                frame.formals().len(),
                frame.locals_size()
            );
        }
        if cli.ir {
            for stm in &proc.ir {
                println!("#   {}", stm);
            }
        }
        for instr in &proc.instructions {
            let text = instr.format(names);
            if instr.kind == tiger_backend::codegen::InstrKind::Label {
                println!("{}", text);
            } else {
                println!("    {}", text);
            }
        }
    }

    if cli.stats {
        println!();
        print!("{}", session.stats());
    }
}
