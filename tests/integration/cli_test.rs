use std::process::{Command, Output};

fn wordsum(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wordsum"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute wordsum")
}

#[test]
fn test_solve_prints_solution() {
    let output = wordsum(&["solve", "send", "more", "money", "--strategy", "bottom-up"]);
    assert!(
        output.status.success(),
        "Command failed with status: {:?}",
        output.status
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Solution: d:7 e:5 m:1 n:6 o:0 r:8 s:9 y:2"));
    assert!(stdout.contains("Check: true"));
    assert!(stdout.contains("  = money == 10652"));
}

#[test]
fn test_solve_all_with_opcode_backend() {
    let output = wordsum(&[
        "solve",
        "to",
        "go",
        "out",
        "--backend",
        "opcode",
        "--all",
        "--verified",
        "--verbose",
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("Solution: ").count(), 1);
    assert!(stdout.contains("Solution: g:8 o:1 t:2 u:0"));
    assert!(stdout.contains("Steps: "));
    assert!(stdout.contains("Results: "));
}

#[test]
fn test_solve_trace_and_dump() {
    let output = wordsum(&["solve", "to", "go", "out", "--trace", "--dump"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Trace:"));
    assert!(stdout.contains("0000> "));
}

#[test]
fn test_unsolvable_exits_nonzero() {
    let output = wordsum(&[
        "solve",
        "aa",
        "bb",
        "ccc",
        "--all",
        "--strategy",
        "bottom-up",
        "--verified",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No solution found."));
}

#[test]
fn test_setup_error_is_reported() {
    let output = wordsum(&["solve", "a", "b", "cdef"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: [S001]"), "{stderr}");
}

#[test]
fn test_dump_lists_program() {
    for (backend, halt) in [("steps", "exit"), ("opcode", "HALT")] {
        let output = wordsum(&["dump", "to", "go", "out", "--backend", backend]);
        assert!(output.status.success(), "{backend}");
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.lines().count() > 10, "{backend}");
        assert!(stdout.contains(halt), "{backend}: {stdout}");
        assert!(stdout.contains(":finish"), "{backend}: {stdout}");
    }
}

#[test]
fn test_rejects_unknown_strategy() {
    let output = wordsum(&["solve", "to", "go", "out", "--strategy", "sideways"]);
    assert!(!output.status.success());
}
