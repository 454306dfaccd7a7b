use std::cell::RefCell;
use std::rc::Rc;

use wordsum::log::LogSink;
use wordsum::runnable::StepGen;
use wordsum::watch::{DebugWatcher, MetricWatcher, ResultWatcher, TraceWatcher, Watchers};
use wordsum::word::{
    solution_mapping, Generator, LogGen, MultiGen, Plan, PlanProblem, Solution, Watcher,
};
use wordsum::{plan, solve, Backend, PlanOptions, Problem, Strategy};

fn capture() -> (LogSink, Rc<RefCell<Vec<String>>>) {
    let lines = Rc::new(RefCell::new(Vec::new()));
    let inner = lines.clone();
    let sink: LogSink = Rc::new(move |s: &str| inner.borrow_mut().push(s.to_string()));
    (sink, lines)
}

fn to_go_out(backend: Backend, annotated: bool) -> Box<dyn Plan> {
    let problem = Problem::setup("to", "go", "out").unwrap();
    let opts = PlanOptions::default().with_annotated(annotated);
    plan(&problem, Strategy::TopDown, backend, &opts).unwrap()
}

#[test]
fn test_metrics_match_search_statistics() {
    for backend in Backend::ALL {
        let plan = to_go_out(backend, false);
        let mut metrics = MetricWatcher::new();
        let solved = solve(plan.as_ref(), true, Some(&mut metrics)).unwrap();
        let stats = &solved.report.statistics;
        assert_eq!(metrics.steps, stats.steps, "{backend}");
        assert_eq!(metrics.results, stats.results, "{backend}");
        assert_eq!(metrics.forks, stats.forks, "{backend}");
        assert_eq!(metrics.emits, stats.states, "{backend}");
        assert_eq!(metrics.successes(), 1, "{backend}");
        assert_eq!(metrics.failures, solved.failures, "{backend}");
    }
}

#[test]
fn test_traced_results() {
    for backend in Backend::ALL {
        let plan = to_go_out(backend, false);
        let mut tracer = TraceWatcher::new();
        let mut traces = Vec::new();
        let mut res = |sol: &dyn Solution| {
            if sol.check().is_ok() {
                traces.push((solution_mapping(sol), sol.trace().to_vec()));
            }
            false
        };
        plan.run_watched(&mut res, Some(&mut tracer)).unwrap();

        assert_eq!(traces.len(), 1, "{backend}");
        let (mapping, trace) = &traces[0];
        assert_eq!(mapping, "g:8 o:1 t:2 u:0");
        assert!(trace[0].starts_with("0000> "), "{backend}: {}", trace[0]);
        assert!(trace.iter().any(|l| l.contains("* FORK : ")), "{backend}");
        for (i, line) in trace.iter().enumerate() {
            assert!(line.starts_with(&format!("{i:04}")), "{backend}: {line}");
        }
    }
}

#[test]
fn test_debug_watcher_logs_lineage() {
    let plan = to_go_out(Backend::Steps, true);
    let (sink, lines) = capture();
    let mut debugger = DebugWatcher::with_sink(sink).with_plan(plan.as_ref());
    let solved = solve(plan.as_ref(), true, Some(&mut debugger)).unwrap();
    assert_eq!(solved.solutions.len(), 1);
    assert_eq!(debugger.live(), 0);

    let lines = lines.borrow();
    assert!(lines[0].starts_with("+++ 1:0:1 "), "{}", lines[0]);
    assert!(lines.iter().any(|l| l.starts_with("--> 1:0:1 ")));
    assert!(lines.iter().any(|l| l.starts_with("<-- 1:0:1 ")));
    assert!(lines.iter().any(|l| l.starts_with("+++ 1:1:")));
    assert!(lines.iter().any(|l| l.starts_with("=== ")));
}

#[test]
fn test_composed_watchers_and_early_stop() {
    let plan = to_go_out(Backend::Opcode, false);
    let mut metrics = MetricWatcher::new();
    let mut tracer = TraceWatcher::new();
    let mut stop_first = ResultWatcher::new(|_: &dyn Solution| true);
    let mut watchers = Watchers::new()
        .with(&mut metrics)
        .with(&mut tracer)
        .with(&mut stop_first);

    let mut delivered = Vec::new();
    let mut res = |sol: &dyn Solution| {
        delivered.push(sol.trace().len());
        false
    };
    let report = plan
        .run_watched(&mut res, Some(&mut watchers as &mut dyn Watcher))
        .unwrap();
    drop(watchers);

    assert_eq!(report.statistics.results, 1);
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0] > 0);
    assert_eq!(metrics.results, 1);
}

#[test]
fn test_log_gen_narrates_plan() {
    let problem = Problem::setup("to", "go", "out").unwrap();
    let (sink, lines) = capture();
    let mut prob = PlanProblem::new(&problem, false);
    let mut gen = MultiGen::new(vec![
        Box::new(StepGen::new(false)) as Box<dyn Generator>,
        Box::new(LogGen::with_sink(sink)),
    ]);
    let plan = Strategy::BottomUp
        .plan(&mut prob, &mut gen as &mut dyn Generator, false)
        .unwrap()
        .unwrap();

    let lines = lines.borrow();
    assert!(lines.iter().any(|l| l == "// Problem:"));
    assert!(lines.iter().any(|l| l == "// base: 10"));
    assert!(lines.iter().any(|l| l == "// letters: [g o t u]"));
    assert!(lines.iter().any(|l| l.starts_with("// step[1]: ")));
    assert!(lines.last().unwrap().starts_with("// Total Branches: "));

    let mut found = Vec::new();
    let mut res = |sol: &dyn Solution| {
        if sol.check().is_ok() {
            found.push(solution_mapping(sol));
        }
        false
    };
    plan.run(&mut res).unwrap();
    assert_eq!(found, vec!["g:8 o:1 t:2 u:0"]);
}
