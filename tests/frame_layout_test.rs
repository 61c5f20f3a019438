//! Test frame layout: storage classes, static links and local offsets on every target.

use tiger_backend::ast::build::*;
use tiger_backend::escape::escape_flags;
use tiger_backend::{
    Access, Arch, CallingConvention, CompilationSession, CompiledUnit, Config, Frame, Label,
    TempAuthority,
};

fn compile(arch: Arch, program: &mut tiger_backend::ast::Exp) -> (CompilationSession, CompiledUnit) {
    let mut session = CompilationSession::new(Config::for_arch(arch)).unwrap();
    let unit = session.compile(program).unwrap();
    (session, unit)
}

fn word_size(arch: Arch) -> i64 {
    match arch {
        Arch::X64 | Arch::Arm64 => 8,
        Arch::I386 => 4,
    }
}

fn frame_named<'u>(unit: &'u CompiledUnit, prefix: &str) -> &'u Frame {
    unit.frames
        .iter()
        .find(|f| f.name().as_str().starts_with(prefix))
        .unwrap_or_else(|| panic!("no frame named {}*", prefix))
}

#[test]
fn test_variable_read_by_nested_function_escapes() {
    for arch in Arch::ALL {
        let mut program = let_in(
            vec![
                var_dec("a", int(0)),
                fun_dec(fundec("f", &[], Some("int"), var("a"))),
            ],
            call("f", vec![]),
        );
        let (_, unit) = compile(arch, &mut program);

        assert_eq!(escape_flags(&program), vec![("a".to_string(), true)]);
        // a is the only local of the outermost frame
        assert_eq!(unit.frames[0].locals_size(), word_size(arch), "{}", arch);
    }
    println!("✅ escaping variables live in the frame on every target");
}

#[test]
fn test_variable_used_locally_stays_in_a_register() {
    for arch in Arch::ALL {
        let mut program = let_in(
            vec![var_dec("a", int(0))],
            assign(simple("a"), plus(var("a"), int(1))),
        );
        let (_, unit) = compile(arch, &mut program);

        assert_eq!(escape_flags(&program), vec![("a".to_string(), false)]);
        assert_eq!(unit.frames[0].locals_size(), 0, "{}", arch);
    }
}

#[test]
fn test_static_link_is_the_first_formal() {
    for arch in Arch::ALL {
        let mut program = let_in(
            vec![fun_dec(fundec("f", &["x"], Some("int"), var("x")))],
            call("f", vec![int(1)]),
        );
        let (_, unit) = compile(arch, &mut program);
        let f = frame_named(&unit, "f.");
        let ws = word_size(arch);

        assert_eq!(f.formals().len(), 2);
        // stored by the caller in its first outgoing slot, above the
        // return address and saved fp
        assert_eq!(f.formals()[0], Access::InFrame(2 * ws), "{}", arch);
        assert_eq!(f.incoming()[0], None, "{}", arch);
    }
    println!("✅ static link injected on every target");
}

#[test]
fn test_caller_passes_its_frame_pointer_as_static_link() {
    let cases = [
        (Arch::X64, "mov qword ptr [rsp + 0], rbp", "mov rdi, 1"),
        (Arch::Arm64, "str x29, [sp, #0]", "ldr x0, =1"),
        (Arch::I386, "mov dword ptr [esp + 0], ebp", "mov dword ptr [esp + 4], "),
    ];
    for (arch, link_store, first_arg) in cases {
        let mut program = let_in(
            vec![fun_dec(fundec("f", &["x"], Some("int"), var("x")))],
            call("f", vec![int(1)]),
        );
        let (session, unit) = compile(arch, &mut program);
        let listing = unit.listing(session.names());
        assert!(listing.contains(link_store), "{}:\n{}", arch, listing);
        assert!(listing.contains(first_arg), "{}:\n{}", arch, listing);
    }
}

#[test]
fn test_every_argument_register_goes_to_a_user_formal() {
    for arch in [Arch::X64, Arch::Arm64] {
        let mut temps = TempAuthority::new();
        let target = arch.target(&mut temps).unwrap();
        let cc = target.convention();
        let n = cc.argument_registers().len();
        let first_user_stack_slot = cc.incoming_offset(1);

        let names: Vec<String> = (0..=n).map(|k| format!("p{}", k)).collect();
        let params: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut program = let_in(
            vec![
                fun_dec(fundec("fits", &params[..n], Some("int"), var("p0"))),
                fun_dec(fundec("spills", &params, Some("int"), var("p0"))),
            ],
            plus(
                call("fits", (0..n as i64).map(int).collect()),
                call("spills", (0..=n as i64).map(int).collect()),
            ),
        );
        let (session, unit) = compile(arch, &mut program);

        let fits = frame_named(&unit, "fits.");
        assert_eq!(fits.formals().len(), n + 1);
        assert_eq!(fits.registers_used(), n, "{}", arch);
        for (k, access) in fits.formals()[1..].iter().enumerate() {
            assert!(matches!(access, Access::InReg(_)), "{}: user formal {} is {:?}", arch, k + 1, access);
        }

        let spills = frame_named(&unit, "spills.");
        assert_eq!(spills.registers_used(), n, "{}", arch);
        assert!(matches!(spills.formals()[n], Access::InReg(_)), "{}", arch);
        assert_eq!(spills.formals()[n + 1], Access::InFrame(first_user_stack_slot), "{}", arch);

        // the caller stores the extra argument right after the static link
        let ws = word_size(arch);
        let store = match arch {
            Arch::Arm64 => format!("[sp, #{}]", ws),
            _ => format!("[rsp + {}]", ws),
        };
        let listing = unit.listing(session.names());
        assert!(listing.contains(&store), "{}:\n{}", arch, listing);
    }
    println!("✅ argument registers reserved for user formals");
}

#[test]
fn test_escaping_locals_are_one_word_apart() {
    for arch in Arch::ALL {
        let mut temps = TempAuthority::new();
        let target = arch.target(&mut temps).unwrap();
        let cc = target.convention();
        let ws = cc.word_size();

        let mut frame = cc
            .create_frame(&mut temps, Label::named("f"), &[true])
            .unwrap();
        let locals: Vec<Access> = (0..3).map(|_| frame.allocate_local(&mut temps, true)).collect();

        let first = match locals[0] {
            Access::InFrame(offset) => offset,
            other => panic!("{}: expected a frame slot, got {:?}", arch, other),
        };
        assert_eq!(locals[1], Access::InFrame(first - ws));
        assert_eq!(locals[2], Access::InFrame(first - 2 * ws));
        assert!(first < 0);
    }
}

#[test]
fn test_non_escaping_locals_get_distinct_temps() {
    let mut temps = TempAuthority::new();
    let target = Arch::X64.target(&mut temps).unwrap();
    let mut frame = target
        .convention()
        .create_frame(&mut temps, Label::named("g"), &[])
        .unwrap();

    let a = frame.allocate_local(&mut temps, false);
    let b = frame.allocate_local(&mut temps, false);
    assert!(matches!(a, Access::InReg(_)));
    assert!(matches!(b, Access::InReg(_)));
    assert_ne!(a, b);
    assert_eq!(frame.locals_size(), 0);
}

#[test]
fn test_loop_variable_captured_by_nested_function() {
    // for i := 0 to 3 do let function show() = print(chr(i)) in show() end
    let mut program = for_loop(
        "i",
        int(0),
        int(3),
        let_in(
            vec![fun_dec(fundec(
                "show",
                &[],
                None,
                call("print", vec![call("chr", vec![var("i")])]),
            ))],
            call("show", vec![]),
        ),
    );
    let (_, unit) = compile(Arch::Arm64, &mut program);
    assert_eq!(escape_flags(&program), vec![("i".to_string(), true)]);
    assert_eq!(unit.frames[0].locals_size(), 8);
}
