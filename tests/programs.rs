use acu_ensemble::asm::{assemble, assemble_lossy, AsmErrKind};
use acu_ensemble::ast::sim::SimInstr;
use acu_ensemble::err::report;
use acu_ensemble::sim::observer::SimEvent;
use acu_ensemble::sim::{SimErr, SimState, Simulator};

fn run(src: &str) -> Simulator {
    let obj = assemble(src).unwrap_or_else(|e| panic!("assembly failed: {e}"));
    let mut sim = Simulator::new(Default::default());
    sim.load_obj_file(&obj).unwrap();
    sim.run_with_limit(10_000).unwrap();
    assert_eq!(sim.state(), &SimState::Halted, "program should halt");
    sim
}

#[test]
fn triangular_number() {
    let src = "
        .data 100
        N: 5
        SUM: 0

        .code 0
        LOOP: CPA N     ; stop once N hits 0
        BRZ END
        ADD SUM
        STO SUM
        DEC N           ; N is past 99, so this takes two cells
        BRA LOOP
        END: HLT
    ";
    let sim = run(src);
    let sym = sim.symbol_table();
    assert_eq!(sym.lookup_label("END"), Some(7));

    assert_eq!(sim.mem[100], 0);
    assert_eq!(sim.mem[101], 15);
    assert_eq!(sim.reg_file.acu, 0);
    assert_eq!(sim.pc, 7);
}

#[test]
fn pointer_walk() {
    let src = "
        .data 50
        ARR: 3
        4
        5
        PTR: 50
        CNT: 3
        TOTAL: 0

        .code 0
        LOOP: CPA TOTAL
        ADD [PTR]
        STO TOTAL
        INC PTR
        DEC CNT
        CPA CNT
        BRZ DONE
        BRA LOOP
        DONE: HLT
    ";
    let sim = run(src);
    let sym = sim.symbol_table();
    let at = |label| sim.mem[sym.lookup_label(label).unwrap()];

    assert_eq!(at("TOTAL"), 12);
    assert_eq!(at("PTR"), 53);
    assert_eq!(at("CNT"), 0);
}

#[test]
fn wide_and_negative_operands() {
    let src = "
        CPA $-20
        MUL $1000
        ADD $-5
        BRN NEG
        HLT
        NEG: STO 999
        HLT
    ";
    let sim = run(src);
    assert_eq!(sim.reg_file.acu, -20_005);
    assert_eq!(sim.mem[999], -20_005);
}

#[test]
fn explicit_cells_and_start() {
    let src = "
        .code 200
        CPA 10
        ADD 11
        HLT
        10 40
        2
    ";
    let sim = run(src);
    assert_eq!(sim.start_cell(), 200);
    assert_eq!(sim.reg_file.acu, 42);
    assert_eq!(sim.current_line(), Some(5));
}

#[test]
fn program_decodes_to_source() {
    let src = "
        CPA $12
        STO [7]
        INC 150
        SUB 3
        BRZ 1234
        HLT
    ";
    let obj = assemble(src).unwrap();
    let cells: Vec<i32> = obj.addr_iter().map(|(_, v)| v).collect();

    let mut listing = vec![];
    let mut pc = 0;
    while pc < cells.len() {
        let (instr, width) = SimInstr::decode(cells[pc], || {
            cells.get(pc + 1).copied().ok_or(SimErr::OutOfRange(pc as i64 + 1))
        }).unwrap();
        listing.push(instr.to_string());
        pc += width.cells();
    }

    assert_eq!(listing, ["CPA $12", "STO [7]", "INC 150", "SUB 3", "BRZ 1234", "HLT"]);
}

#[test]
fn every_error_reported() {
    let src = "
        CPA $1
        JMP 4
        INC $2
        ADD LOST
        HLT
    ";
    let errs = assemble(src).unwrap_err();
    let kinds: Vec<_> = errs.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, [AsmErrKind::UnknownMnemonic, AsmErrKind::InvalidAddressingMode, AsmErrKind::MalformedOperand]);

    let msg = report(&errs[1], src);
    assert!(msg.starts_with("line 4: "), "{msg}");
    assert!(msg.contains("INC $2"), "{msg}");
    assert!(msg.contains("help:"), "{msg}");

    // the lossy image still runs
    let (obj, _) = assemble_lossy(src);
    let mut sim = Simulator::new(Default::default());
    sim.load_obj_file(&obj).unwrap();
    sim.run().unwrap();
    assert!(sim.hit_halt());
}

#[test]
fn runaway_program_faults() {
    let obj = assemble(".code 990\nCPA $1\nADD $1").unwrap();
    let mut sim = Simulator::new(Default::default());
    sim.load_obj_file(&obj).unwrap();
    sim.mem.as_slice_mut()[992..].fill(9111);

    let err = sim.run().unwrap_err();
    assert_eq!(err, SimErr::OutOfRange(1000));
    assert_eq!(sim.state(), &SimState::Faulted(SimErr::OutOfRange(1000)));
    assert!(!sim.hit_halt());
}

#[test]
fn events_across_threads() {
    let obj = assemble("LOOP: INC 20\nCPA 20\nSUB $3\nBRZ END\nBRA LOOP\nEND: HLT").unwrap();
    let mut sim = Simulator::new(Default::default());
    let rx = sim.subscribe();

    let listener = std::thread::spawn(move || {
        let mut changed = vec![];
        // channel closes when the simulator is dropped
        for event in rx {
            if let SimEvent::MemoryChanged(cells) = event {
                changed.extend(cells);
            }
        }
        changed
    });

    sim.load_obj_file(&obj).unwrap();
    sim.run().unwrap();
    assert!(sim.hit_halt());
    assert_eq!(sim.mem[20], 3);
    drop(sim);

    let changed = listener.join().unwrap();
    assert!(changed.contains(&20));
}
