use proptest::prelude::*;

use wordsum::opcode::{
    decode_all, decode_op, encode_all, run_all, Arg, Assembler, ByteOrder, CodeGen, Machine, Op,
    OpCode, RegisterAllocator, TinyMachine,
};
use wordsum::search::SearchConfig;
use wordsum::word::{solution_mapping, Plan, PlanProblem, Solution, StateId};
use wordsum::Strategy as PlanStrategy;
use wordsum::Problem;

const BO: ByteOrder = ByteOrder::Little;

fn r1() -> Arg {
    Arg::register(1)
}

fn imm(v: u16) -> Arg {
    Arg::immediate(v)
}

/// Assembles the counting loop with patched references; the loop forks a
/// child that stores the current count for every value below nine.
fn counting_loop(bo: ByteOrder) -> Assembler {
    let mut asm = Assembler::new(bo);
    asm.write_op(Op::mov(r1(), imm(0))).unwrap();
    let fork = asm.write_op_ref(Op::fork(0)).unwrap();
    asm.write_op(Op::add(r1(), imm(1))).unwrap();
    asm.write_op(Op::lt(r1(), imm(9))).unwrap();
    let back = asm.write_op_ref(Op::jumpt(0)).unwrap();
    let store = asm.len();
    asm.write_op(Op::movl(Arg::location(1), r1())).unwrap();
    asm.write_op(Op::halt()).unwrap();
    back.write_offset(&mut asm, fork.offset()).unwrap();
    fork.write_offset(&mut asm, store).unwrap();
    asm
}

#[test]
fn test_assembler_patches_references() {
    let asm = counting_loop(BO);
    assert_eq!(asm.op_count(), 7);
    assert_eq!(&asm.bytes()[..5], &[2, 0x01, 0x80, 0, 0]);
    let expected = encode_all(
        BO,
        &[
            Op::mov(r1(), imm(0)),
            Op::fork(14),
            Op::add(r1(), imm(1)),
            Op::lt(r1(), imm(9)),
            Op::jumpt(-18),
            Op::movl(Arg::location(1), r1()),
            Op::halt(),
        ],
    );
    assert_eq!(asm.bytes(), expected.as_slice());

    let ops = decode_all(BO, asm.bytes()).unwrap();
    assert_eq!(ops.len(), 7);
    assert_eq!(ops[1], (5, Op::fork(14)));
    assert_eq!(ops[4].1.to_string(), "JUMPT -0012");
}

#[test]
fn test_counting_loop_stores_every_value() {
    for bo in [ByteOrder::Little, ByteOrder::Big] {
        let asm = counting_loop(bo);
        let mach = TinyMachine::with_program(bo, asm.into_bytes(), false).unwrap();

        let mut values = Vec::new();
        let mut collect = |_id: StateId, m: &dyn Machine| {
            assert_eq!(m.check(), Ok(()));
            let mut buf = [0u8; 2];
            m.copy_memory(0, &mut buf);
            values.push(buf[1]);
            false
        };
        let report = run_all(mach, SearchConfig::default(), 10_000, &mut collect).unwrap();
        assert_eq!(report.statistics.results, 10);
        assert_eq!(report.statistics.forks, 9);

        values.sort();
        assert_eq!(values, (0..=9).collect::<Vec<u8>>());
    }
}

#[test]
fn test_run_all_stops_when_asked() {
    let mach = TinyMachine::with_program(BO, counting_loop(BO).into_bytes(), false).unwrap();
    let mut seen = 0;
    let mut first = |_id: StateId, _m: &dyn Machine| {
        seen += 1;
        true
    };
    let report = run_all(mach, SearchConfig::default(), 10_000, &mut first).unwrap();
    assert_eq!(report.statistics.results, 1);
    assert_eq!(seen, 1);
}

#[test]
fn test_register_allocator_reuses_freed() {
    let mut regs = RegisterAllocator::new(5);
    let a = regs.take("a");
    let b = regs.take("b");
    assert_ne!(a, b);
    assert_eq!(regs.free("a"), Some(a));
    let c = regs.take("c");
    assert_eq!(c, a);
    assert_eq!(regs.get("b"), Some(b));
    assert_eq!(regs.label_of(c), Some("c"));
}

#[test]
fn test_register_allocator_steals_oldest() {
    let mut regs = RegisterAllocator::new(2);
    let a = regs.take("a");
    let b = regs.take("b");
    let c = regs.take("c");
    assert_eq!(c, a);
    assert_eq!(regs.get("a"), None);
    assert_eq!(regs.get("b"), Some(b));
}

fn opcode_plan(
    problem: &Problem,
    strategy: PlanStrategy,
    bo: ByteOrder,
    verified: bool,
) -> Vec<String> {
    let mut prob = PlanProblem::new(problem, false);
    let mut gen = CodeGen::with_byte_order(problem, false, bo).unwrap();
    let plan = strategy.plan(&mut prob, &mut gen, verified).unwrap().unwrap();
    let mut found = Vec::new();
    let mut res = |sol: &dyn Solution| {
        if sol.check().is_ok() {
            found.push(solution_mapping(sol));
        }
        false
    };
    plan.run(&mut res).unwrap();
    found
}

#[test]
fn test_opcode_send_more_money() {
    let problem = Problem::setup("send", "more", "money").unwrap();
    for bo in [ByteOrder::Little, ByteOrder::Big] {
        for verified in [false, true] {
            let found = opcode_plan(&problem, PlanStrategy::BottomUp, bo, verified);
            assert_eq!(
                found,
                vec!["d:7 e:5 m:1 n:6 o:0 r:8 s:9 y:2"],
                "{bo:?} verified={verified}"
            );
        }
    }
}

#[test]
fn test_opcode_program_decodes() {
    let problem = Problem::setup("send", "more", "money").unwrap();
    let mut prob = PlanProblem::new(&problem, true);
    let mut gen = CodeGen::new(&problem, true).unwrap();
    PlanStrategy::TopDown.plan(&mut prob, &mut gen, true).unwrap().unwrap();
    let mut lines = Vec::new();
    gen.dump(&mut |line| lines.push(line.to_string()));
    assert!(lines[0].contains("OPLIM"));
    assert!(lines.iter().any(|l| l.contains("FORK") || l.contains("BRANCH")));
    assert!(lines.iter().rev().any(|l| l.contains("HALT")));
}

fn arb_arg() -> impl Strategy<Value = Arg> {
    prop_oneof![
        Just(Arg::NONE),
        (1u8..=5).prop_map(Arg::register),
        any::<u16>().prop_map(Arg::immediate),
        (1u8..=5).prop_map(Arg::indirect),
        any::<u16>().prop_map(Arg::location),
        (any::<u16>(), 1u8..=5).prop_map(|(addr, reg)| Arg::indexed(addr, reg)),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    (0u8..=25, arb_arg(), arb_arg())
        .prop_map(|(code, a1, a2)| Op::new(OpCode(code), a1, a2))
        .prop_filter("op must validate", |op| op.validate().is_ok())
}

proptest! {
    #[test]
    fn prop_valid_ops_round_trip(op in arb_op(), big in any::<bool>()) {
        let bo = if big { ByteOrder::Big } else { ByteOrder::Little };
        let buf = encode_all(bo, &[op]);
        prop_assert_eq!(buf.len(), op.encoded_size());
        prop_assert_eq!(decode_op(bo, &buf, 0), Ok((op, buf.len())));
    }

    #[test]
    fn prop_take_is_stable(keys in proptest::collection::vec("[a-h]", 1..20)) {
        let mut regs = RegisterAllocator::new(5);
        for key in &keys {
            let r = regs.take(key);
            prop_assert!((1..=5).contains(&r));
            prop_assert_eq!(regs.take(key), r);
            prop_assert_eq!(regs.label_of(r), Some(key.as_str()));
        }
    }
}
