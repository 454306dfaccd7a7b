use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use wordsum::search::{SearchConfig, SearchOutcome};
use wordsum::word::{solution_check, solution_mapping, solution_numbers, ChoicePolicy, Solution};
use wordsum::{plan, solve, Backend, PlanOptions, Problem, SearchError, Strategy};

const SEND_MORE_MONEY: &str = "d:7 e:5 m:1 n:6 o:0 r:8 s:9 y:2";

fn send_more_money() -> Problem {
    Problem::setup("send", "more", "money").unwrap()
}

fn solutions(
    problem: &Problem,
    strategy: Strategy,
    backend: Backend,
    opts: &PlanOptions,
) -> Vec<String> {
    let plan = plan(problem, strategy, backend, opts).unwrap();
    let solved = solve(plan.as_ref(), true, None).unwrap();
    assert_eq!(solved.report.outcome, SearchOutcome::Exhausted);
    solved.solutions.iter().map(|s| solution_mapping(s)).collect()
}

#[test]
fn test_send_more_money_bottom_up() {
    let problem = send_more_money();
    let found = solutions(&problem, Strategy::BottomUp, Backend::Steps, &PlanOptions::default());
    assert_eq!(found, vec![SEND_MORE_MONEY]);
}

#[test]
fn test_send_more_money_numbers() {
    let problem = send_more_money();
    let plan = plan(&problem, Strategy::BottomUp, Backend::Steps, &PlanOptions::default()).unwrap();
    let solved = solve(plan.as_ref(), false, None).unwrap();
    assert_eq!(solved.solutions.len(), 1);
    assert_eq!(solved.report.outcome, SearchOutcome::Stopped);

    let sol = &solved.solutions[0];
    assert_eq!(solution_numbers(sol), [9567, 1085, 10652]);
    let mut lines = Vec::new();
    assert!(solution_check(sol, &mut |l| lines.push(l.to_string())));
    assert_eq!(
        lines,
        vec![
            "Check: true",
            "     send ==  9567",
            "  +  more ==  1085",
            "  = money == 10652",
        ]
    );
}

#[test]
fn test_send_more_money_pruned_brute() {
    let problem = send_more_money();
    let found = solutions(&problem, Strategy::PrunedBrute, Backend::Steps, &PlanOptions::default());
    assert_eq!(found, vec![SEND_MORE_MONEY]);
}

#[test]
fn test_send_more_money_top_down() {
    let problem = send_more_money();
    let found = solutions(&problem, Strategy::TopDown, Backend::Steps, &PlanOptions::default());
    assert_eq!(found, vec![SEND_MORE_MONEY]);
}

#[test]
fn test_send_more_money_verified_both_backends() {
    let problem = send_more_money();
    let opts = PlanOptions::default().with_verified(true);
    for backend in Backend::ALL {
        for strategy in [Strategy::BottomUp, Strategy::TopDown] {
            let plan = plan(&problem, strategy, backend, &opts).unwrap();
            let solved = solve(plan.as_ref(), true, None).unwrap();
            let found: Vec<String> = solved.solutions.iter().map(|s| solution_mapping(s)).collect();
            assert_eq!(found, vec![SEND_MORE_MONEY], "{strategy} {backend}");
            for sol in &solved.solutions {
                assert_eq!(sol.check(), Ok(()));
            }
        }
    }
}

#[test]
fn test_backends_agree() {
    let problems = [
        Problem::setup("to", "go", "out").unwrap(),
        Problem::setup("send", "more", "money").unwrap(),
        Problem::setup("a", "a", "b").unwrap(),
    ];
    let opts = PlanOptions::default().with_verified(true);
    for problem in &problems {
        for strategy in [Strategy::PrunedBrute, Strategy::BottomUp, Strategy::TopDown] {
            let mut steps = solutions(problem, strategy, Backend::Steps, &opts);
            let mut opcode = solutions(problem, strategy, Backend::Opcode, &opts);
            steps.sort();
            opcode.sort();
            assert_eq!(steps, opcode, "{strategy} on {:?}", problem.words());
        }
    }
}

#[test]
fn test_naive_brute_small_problem() {
    let problem = Problem::setup("to", "go", "out").unwrap();
    for backend in Backend::ALL {
        let found = solutions(&problem, Strategy::NaiveBrute, backend, &PlanOptions::default());
        assert_eq!(found, vec!["g:8 o:1 t:2 u:0"], "{backend}");
    }
}

#[test]
fn test_best_choice_policy() {
    let problem = send_more_money();
    let opts = PlanOptions::default().with_choice(ChoicePolicy::Best);
    for backend in Backend::ALL {
        let found = solutions(&problem, Strategy::BottomUp, backend, &opts);
        assert_eq!(found, vec![SEND_MORE_MONEY], "{backend}");
    }
}

#[test]
fn test_other_bases() {
    let opts = PlanOptions::default().with_verified(true);
    for (base, count) in [(10, 4), (16, 7)] {
        let problem = Problem::setup_with_base("a", "a", "b", base).unwrap();
        for backend in Backend::ALL {
            let found = solutions(&problem, Strategy::BottomUp, backend, &opts);
            assert_eq!(found.len(), count, "base {base} {backend}: {found:?}");
        }
    }
}

#[test]
fn test_unsolvable_problem() {
    let problem = Problem::setup("aa", "bb", "ccc").unwrap();
    let opts = PlanOptions::default().with_verified(true);
    for backend in Backend::ALL {
        for strategy in [Strategy::PrunedBrute, Strategy::BottomUp] {
            let plan = plan(&problem, strategy, backend, &opts).unwrap();
            let solved = solve(plan.as_ref(), true, None).unwrap();
            assert!(solved.solutions.is_empty(), "{strategy} {backend}");
            assert!(solved.failures > 0);
        }
    }
}

#[test]
fn test_budget_exhaustion() {
    let problem = send_more_money();
    let opts = PlanOptions::default().with_search(SearchConfig::default().with_max_steps(10));
    for backend in Backend::ALL {
        let plan = plan(&problem, Strategy::BottomUp, backend, &opts).unwrap();
        let err = solve(plan.as_ref(), true, None).unwrap_err();
        assert!(
            matches!(err, SearchError::BudgetExhausted { limit: 10, .. }),
            "{backend}: {err}"
        );
    }
}

#[test]
fn test_logged_planning_still_solves() {
    let problem = Problem::setup("to", "go", "out").unwrap();
    let opts = PlanOptions::default().with_logged(true).with_annotated(true);
    for backend in Backend::ALL {
        let found = solutions(&problem, Strategy::TopDown, backend, &opts);
        assert_eq!(found, vec!["g:8 o:1 t:2 u:0"], "{backend}");
    }
}

/// Spells `n` with `letters[d]` for each digit `d`.
fn spell(n: u32, letters: &[u8]) -> String {
    n.to_string()
        .bytes()
        .map(|d| char::from(letters[usize::from(d - b'0')]))
        .collect()
}

#[test]
fn test_random_sums_are_found() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    let opts = PlanOptions::default().with_verified(true);
    for _ in 0..8 {
        let mut letters: Vec<u8> = (b'a'..=b'j').collect();
        letters.shuffle(&mut rng);
        let n1: u32 = rng.random_range(10..1000);
        let n2: u32 = rng.random_range(10..1000);
        let words = [spell(n1, &letters), spell(n2, &letters), spell(n1 + n2, &letters)];
        let problem = Problem::setup(&words[0], &words[1], &words[2]).unwrap();

        let mut expected: Vec<(u8, usize)> = problem
            .sorted_letters()
            .into_iter()
            .map(|c| (c, letters.iter().position(|&l| l == c).unwrap()))
            .collect();
        expected.sort();
        let expected = expected
            .iter()
            .map(|&(c, d)| format!("{}:{}", char::from(c), d))
            .collect::<Vec<_>>()
            .join(" ");

        let mut steps = solutions(&problem, Strategy::BottomUp, Backend::Steps, &opts);
        let mut opcode = solutions(&problem, Strategy::BottomUp, Backend::Opcode, &opts);
        steps.sort();
        opcode.sort();
        assert!(steps.contains(&expected), "{words:?}: {expected} not in {steps:?}");
        assert_eq!(steps, opcode, "{words:?}");
    }
}

/// Every mapping of distinct digits to the problem's letters that makes the
/// sum hold, by exhaustive assignment.
fn brute_force(problem: &Problem) -> Vec<String> {
    fn number(word: &[u8], values: &[Option<u8>; 256], base: i64) -> i64 {
        word.iter().fold(0, |n, &c| {
            n * base + i64::from(values[usize::from(c)].unwrap())
        })
    }

    fn assign(
        problem: &Problem,
        letters: &[u8],
        values: &mut [Option<u8>; 256],
        used: &mut Vec<bool>,
        out: &mut Vec<String>,
    ) {
        let Some((&c, rest)) = letters.split_first() else {
            let base = i64::from(problem.base);
            let [n1, n2, n3] = problem.words.clone().map(|w| number(&w, values, base));
            if n1 + n2 == n3 {
                let mapping = problem
                    .sorted_letters()
                    .iter()
                    .map(|&l| format!("{}:{}", char::from(l), values[usize::from(l)].unwrap()))
                    .collect::<Vec<_>>()
                    .join(" ");
                out.push(mapping);
            }
            return;
        };
        let min = u8::from(problem.is_initial_letter(c));
        for v in min..problem.base {
            if used[usize::from(v)] {
                continue;
            }
            used[usize::from(v)] = true;
            values[usize::from(c)] = Some(v);
            assign(problem, rest, values, used, out);
            values[usize::from(c)] = None;
            used[usize::from(v)] = false;
        }
    }

    let letters = problem.sorted_letters();
    let mut values = [None; 256];
    let mut used = vec![false; usize::from(problem.base)];
    let mut out = Vec::new();
    assign(problem, &letters, &mut values, &mut used, &mut out);
    out.sort();
    out
}

#[test]
fn test_brute_force_helper() {
    let problem = Problem::setup("to", "go", "out").unwrap();
    assert_eq!(brute_force(&problem), vec!["g:8 o:1 t:2 u:0"]);
}

#[test]
fn test_leading_carry_is_checked_without_verify() {
    // c + f = ad only holds when the sum carries into a, which is then 1
    let problem = Problem::setup("c", "f", "ad").unwrap();
    let expected = brute_force(&problem);
    assert_eq!(expected.len(), 30);
    for backend in Backend::ALL {
        let mut found = solutions(&problem, Strategy::BottomUp, backend, &PlanOptions::default());
        found.sort();
        assert_eq!(found, expected, "{backend}");
    }
}

#[test]
fn test_top_down_forks_carry_into_known_column() {
    // 535 + 352 = 887: the middle column is fully known before its carry in
    let problem = Problem::setup("djd", "jdi", "bbc").unwrap();
    let expected = brute_force(&problem);
    assert!(expected.contains(&"b:8 c:7 d:5 i:2 j:3".to_string()));
    for backend in Backend::ALL {
        let mut found = solutions(&problem, Strategy::TopDown, backend, &PlanOptions::default());
        found.sort();
        assert_eq!(found, expected, "{backend}");
    }
}

#[test]
fn test_unverified_strategies_match_brute_force() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xc0ffee);
    let opts = PlanOptions::default();
    for _ in 0..16 {
        let mut letters: Vec<u8> = (b'a'..=b'j').collect();
        letters.shuffle(&mut rng);
        let n1: u32 = rng.random_range(1..100);
        let n2: u32 = rng.random_range(1..100);
        let words = [spell(n1, &letters), spell(n2, &letters), spell(n1 + n2, &letters)];
        let problem = Problem::setup(&words[0], &words[1], &words[2]).unwrap();
        let expected = brute_force(&problem);
        assert!(!expected.is_empty(), "{words:?}");

        for strategy in Strategy::ALL {
            // naive brute force branches over every letter
            if strategy == Strategy::NaiveBrute && problem.sorted_letters().len() > 5 {
                continue;
            }
            for backend in Backend::ALL {
                let mut found = solutions(&problem, strategy, backend, &opts);
                found.sort();
                assert_eq!(found, expected, "{strategy} {backend} on {words:?}");
            }
        }
    }
}
