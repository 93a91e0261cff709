use std::time::Duration;

use blockpress_script::{ExecutionReport, Level, Limits, LogEntry, Outcome, evaluate};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn transcript(report: &ExecutionReport) -> String {
    let mut out = String::new();
    for entry in &report.entries {
        out.push_str(&format!("[{}] {}\n", entry.level, entry.message));
    }
    if let Some(value) = &report.value {
        out.push_str(&format!("=> {value}\n"));
    }
    out.push_str(&format!("{:?}", report.outcome));
    out
}

#[test]
fn console_output_and_completion_value() {
    let report = evaluate(r#"console.log("hi"); 42"#, &Limits::default());

    assert_eq!(report.entries, vec![LogEntry::new(Level::Log, "hi")]);
    assert_eq!(report.value.as_deref(), Some("42"));
    assert_eq!(report.outcome, Outcome::Completed);
}

#[test]
fn uncaught_error_becomes_an_error_entry() {
    let report = evaluate(r#"throw new Error("boom")"#, &Limits::default());

    assert_eq!(report.outcome, Outcome::Failed);
    assert_eq!(report.entries, vec![LogEntry::new(Level::Error, "Error: boom")]);
    assert_eq!(report.value, None);
}

#[test]
fn output_before_a_failure_is_kept() {
    let source = r#"
        console.info("starting")
        console.warn("careful")
        const data = { items: [1, 2, 3] }
        console.log("total", data.items.reduce((a, b) => a + b, 0))
        data.missing.length
    "#;
    insta::assert_snapshot!(transcript(&evaluate(source, &Limits::default())), @r#"
    [info] starting
    [warn] careful
    [log] total 6
    [error] TypeError: Cannot read properties of undefined (reading 'length')
    Failed
    "#);
}

#[test]
fn a_realistic_snippet() {
    let source = r#"
        function fib(n) {
            return n < 2 ? n : fib(n - 1) + fib(n - 2)
        }
        const results = []
        for (let i = 0; i < 10; i++) {
            results.push(fib(i))
        }
        console.log(`first ten: ${results.join(", ")}`)
        const byParity = { even: [], odd: [] }
        for (const n of results) {
            (n % 2 === 0 ? byParity.even : byParity.odd).push(n)
        }
        byParity
    "#;
    insta::assert_snapshot!(transcript(&evaluate(source, &Limits::default())), @r"
    [log] first ten: 0, 1, 1, 2, 3, 5, 8, 13, 21, 34
    => { even: [0, 2, 8, 34], odd: [1, 1, 3, 5, 13, 21] }
    Completed
    ");
}

#[rstest]
#[case::dom("document.body.innerHTML = 'x'", "ReferenceError: document is not defined")]
#[case::network("fetch('https://example.com')", "ReferenceError: fetch is not defined")]
#[case::window("window.alert(1)", "ReferenceError: window is not defined")]
#[case::timers("setTimeout(() => 1, 10)", "ReferenceError: setTimeout is not defined")]
#[case::modules("require('fs')", "ReferenceError: require is not defined")]
fn host_capabilities_are_absent(#[case] source: &str, #[case] message: &str) {
    let report = evaluate(source, &Limits::default());
    assert_eq!(report.failure().map(|e| e.message.as_str()), Some(message));
}

#[test]
fn caught_errors_do_not_fail_the_run() {
    let report = evaluate(
        "try { null.x } catch (e) { console.error(e.message) }\n'recovered'",
        &Limits::default(),
    );
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.entries[0].level, Level::Error);
    assert_eq!(report.value.as_deref(), Some("\"recovered\""));
}

#[test]
fn step_limit_stops_infinite_loops() {
    let limits = Limits {
        max_steps: 50_000,
        ..Limits::default()
    };
    let report = evaluate("let i = 0; while (true) { i++ }", &limits);
    assert_eq!(report.outcome, Outcome::Failed);
    assert!(report.failure().unwrap().message.contains("step limit of 50000"));
}

#[test]
fn timeout_stops_long_runs() {
    let limits = Limits {
        max_steps: u64::MAX,
        timeout: Duration::from_millis(50),
        ..Limits::default()
    };
    let report = evaluate("for (;;) {}", &limits);
    assert_eq!(
        report.failure().map(|e| e.message.as_str()),
        Some("execution timed out after 50ms")
    );
}

#[test]
fn deep_recursion_is_bounded_by_call_depth() {
    let report = evaluate(
        "function down(n) { return n === 0 ? 0 : down(n - 1) }\ndown(100000)",
        &Limits::default(),
    );
    assert!(
        report
            .failure()
            .unwrap()
            .message
            .contains("Maximum call stack size exceeded")
    );
}

#[test]
fn oversized_call_depth_is_clamped() {
    let limits = Limits {
        max_call_depth: usize::MAX,
        ..Limits::default()
    };
    let report = evaluate("function f() { return f() }\nf()", &limits);
    assert_eq!(
        report.failure().map(|e| e.message.as_str()),
        Some("RangeError: Maximum call stack size exceeded (limit 1024)")
    );
}

#[test]
fn recursion_within_the_limit_completes() {
    let report = evaluate(
        "function down(n) { return n === 0 ? 'done' : down(n - 1) }\ndown(100)",
        &Limits::default(),
    );
    assert_eq!(report.value.as_deref(), Some("\"done\""));
}

#[test]
fn console_flood_is_capped() {
    let limits = Limits {
        max_log_entries: 3,
        ..Limits::default()
    };
    let report = evaluate("for (let i = 0; i < 10; i++) console.log(i)", &limits);
    let messages: Vec<&str> = report.entries.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["0", "1", "2", "7 further console entries omitted"]
    );
}

#[test]
fn each_evaluation_starts_from_fresh_globals() {
    let first = evaluate("Math.answer = 42; Math.answer", &Limits::default());
    let second = evaluate("Math.answer", &Limits::default());
    assert_eq!(first.value.as_deref(), Some("42"));
    assert_eq!(second.value, None);
}

#[test]
fn self_containing_arrays_convert_to_strings() {
    let source = r#"
        const a = [1]
        a.push(a)
        console.log(a.join('-'))
        console.log(String(a))
        const e = new Error('x')
        e.message = [e]
        console.log(String(e))
        a == '1,'
    "#;
    insta::assert_snapshot!(transcript(&evaluate(source, &Limits::default())), @r"
    [log] 1-
    [log] 1,
    [log] Error
    => true
    Completed
    ");
}

#[test]
fn flattening_a_self_containing_array() {
    let report = evaluate(
        "const a = [1]; a.push(a); a.flat(2).length",
        &Limits::default(),
    );
    assert_eq!(report.value.as_deref(), Some("4"));

    let report = evaluate(
        "const a = [1]; a.push(a); a.flat(Infinity)",
        &Limits::default(),
    );
    assert_eq!(
        report.failure().map(|e| e.message.as_str()),
        Some("RangeError: Maximum call stack size exceeded")
    );
}

#[test]
fn flattening_shared_arrays_is_bounded_by_steps() {
    let limits = Limits {
        max_steps: 100_000,
        ..Limits::default()
    };
    let source = "let a = [1]; for (let i = 0; i < 40; i++) a = [a, a]; a.flat(Infinity)";
    let report = evaluate(source, &limits);
    assert!(report.failure().unwrap().message.contains("step limit"));
}

#[test]
fn deeply_nested_arrays_compare_and_drop() {
    let source = r#"
        let a = []
        for (let i = 0; i < 100000; i++) a = [a]
        console.log(String(a).length)
        a == 'x'
    "#;
    insta::assert_snapshot!(transcript(&evaluate(source, &Limits::default())), @r"
    [log] 0
    => false
    Completed
    ");
}

#[test]
fn retained_large_strings_hit_the_allocation_budget() {
    let limits = Limits {
        max_alloc_bytes: 64 << 20,
        ..Limits::default()
    };
    let source = r#"
        const xs = []
        for (let i = 0; i < 400; i++) xs.push('x'.repeat(16000000))
        xs.length
    "#;
    let report = evaluate(source, &limits);
    assert_eq!(
        report.failure().map(|e| e.message.as_str()),
        Some("RangeError: execution allocated more than 67108864 bytes")
    );
}

#[test]
fn ordinary_snippets_stay_within_the_default_budget() {
    let source = r#"
        let s = ''
        for (let i = 0; i < 10000; i++) s += 'x'
        const rows = []
        for (let i = 0; i < 10000; i++) rows.push([i, String(i)])
        `${s.length} ${rows.length}`
    "#;
    let report = evaluate(source, &Limits::default());
    assert_eq!(report.value.as_deref(), Some("\"10000 10000\""));
}
