use std::time::Duration;

use acesim_lite::axi::{AxiAttributes, BridgeError, BurstType, BwCall, Command, Phase, Resp, SharedTxn, Transaction};
use acesim_lite::bench::{BusOp, ReadBurst, Testbench, WriteBurst};
use acesim_lite::{load_config_file, BenchConfig, BridgeConfig, ReadyPattern};

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn bench_with(f: impl FnOnce(&mut BenchConfig)) -> Testbench {
    init_log();
    let mut config = BenchConfig::default();
    f(&mut config);
    Testbench::new(config).expect("valid configuration")
}

fn bench(bus_width: u32) -> Testbench {
    bench_with(|c| c.bridge.bus_width = bus_width)
}

#[test]
fn aligned_four_beat_write() {
    let mut tb = bench(32);
    let data = (1..=16).collect::<Vec<u8>>();
    tb.push(BusOp::Write(WriteBurst::new(1, 0x100, 4, 4, data.clone()))).unwrap();
    tb.run(200).expect("write completes");

    let log = tb.phase_log().unwrap();
    let phases = log.iter().map(|r| r.phase).collect::<Vec<_>>();
    assert_eq!(
        phases,
        vec![
            Phase::BeginPartialReq,
            Phase::BeginPartialReq,
            Phase::BeginPartialReq,
            Phase::BeginReq,
            Phase::EndResp
        ]
    );
    let begin_req = log.iter().find(|r| r.phase == Phase::BeginReq).unwrap();
    assert_eq!(begin_req.data_len, 16);

    let trace = tb.beat_trace().unwrap();
    assert_eq!(trace.iter().map(|b| b.beat).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    assert_eq!(trace.iter().map(|b| b.bytes).sum::<u32>(), 16);
    assert_eq!(trace.iter().filter(|b| b.last).count(), 1);
    assert!(trace[3].last);

    assert_eq!(tb.peek(0x100, 16).unwrap(), data);
    let done = tb.completions().unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].command, Command::Write);
    assert_eq!(done[0].resp, Resp::Okay);

    let stats = tb.stats().unwrap();
    assert_eq!(stats.write_bursts, 1);
    assert_eq!(stats.write_beats, 4);
    assert_eq!(stats.completed, 1);
}

#[test]
fn unaligned_single_beat_read() {
    let mut tb = bench(64);
    tb.poke(0x100, (0..16).collect());
    tb.push(BusOp::Read(ReadBurst::new(7, 0x103, 1, 4))).unwrap();
    tb.run(200).expect("read completes");

    let done = tb.completions().unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, 7);
    assert_eq!(done[0].data, vec![3, 4, 5, 6]);

    let trace = tb.beat_trace().unwrap();
    assert_eq!(trace.len(), 1);
    assert_eq!(trace[0].bytes, 4);
    assert!(trace[0].last);

    let phases = tb.phase_log().unwrap().iter().map(|r| r.phase).collect::<Vec<_>>();
    assert_eq!(phases, vec![Phase::BeginReq, Phase::EndResp]);
}

#[test]
fn multi_beat_read_uses_partial_responses() {
    let mut tb = bench(64);
    let pattern = (0..32).map(|i| i as u8 ^ 0x5a).collect::<Vec<u8>>();
    tb.poke(0x400, pattern.clone());
    tb.push(BusOp::Read(ReadBurst::new(2, 0x400, 4, 8))).unwrap();
    tb.run(200).expect("read completes");

    assert_eq!(tb.completions().unwrap()[0].data, pattern);
    let phases = tb.phase_log().unwrap().iter().map(|r| r.phase).collect::<Vec<_>>();
    assert_eq!(
        phases,
        vec![
            Phase::BeginReq,
            Phase::EndPartialResp,
            Phase::EndPartialResp,
            Phase::EndPartialResp,
            Phase::EndResp
        ]
    );
    let trace = tb.beat_trace().unwrap();
    assert_eq!(trace.iter().map(|b| b.beat).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
}

#[test]
fn write_then_read_back_round_trip() {
    let mut tb = bench(64);
    // unaligned start, the burst covers 13 bytes
    let data = (0..13).map(|i| 0xa0 + i as u8).collect::<Vec<u8>>();
    tb.push(BusOp::Write(WriteBurst::new(1, 0x203, 2, 8, data.clone()))).unwrap();
    tb.run(200).expect("write completes");
    assert_eq!(tb.peek(0x203, 13).unwrap(), data);
    // neighbours are untouched
    assert_eq!(tb.peek(0x202, 1).unwrap(), vec![0]);
    assert_eq!(tb.peek(0x210, 1).unwrap(), vec![0]);

    tb.push(BusOp::Read(ReadBurst::new(2, 0x203, 2, 8))).unwrap();
    tb.run(200).expect("read completes");
    let done = tb.completions().unwrap();
    assert_eq!(done.len(), 2);
    assert_eq!(done[1].command, Command::Read);
    assert_eq!(done[1].data, data);
}

#[test]
fn toggling_ready_does_not_double_fire() {
    let mut tb = bench_with(|c| c.ready = ReadyPattern::Toggle);
    let data = (0..32).collect::<Vec<u8>>();
    tb.push(BusOp::Write(WriteBurst::new(1, 0x0, 4, 8, data.clone()))).unwrap();
    tb.run(300).expect("write completes");
    tb.push(BusOp::Read(ReadBurst::new(1, 0x0, 4, 8))).unwrap();
    tb.run(300).expect("read completes");

    let done = tb.completions().unwrap();
    assert_eq!(done.len(), 2);
    assert_eq!(done[1].data, data);
    let stats = tb.stats().unwrap();
    assert_eq!(stats.read_beats, 4);
    assert_eq!(stats.write_beats, 4);
    assert_eq!(stats.completed, 2);
}

#[test]
fn asynchronous_acceptance() {
    let mut tb = bench_with(|c| c.accept_delay_ns = 15);
    let data = (0..16).map(|i| 0xf0 - i as u8).collect::<Vec<u8>>();
    tb.push(BusOp::Write(WriteBurst::new(3, 0x80, 2, 8, data.clone()))).unwrap();
    tb.run(300).expect("write completes");
    tb.push(BusOp::Read(ReadBurst::new(4, 0x80, 2, 8))).unwrap();
    tb.run(300).expect("read completes");
    assert_eq!(tb.completions().unwrap()[1].data, data);
}

#[test]
fn write_data_ahead_of_address() {
    let mut tb = bench(32);
    let data = vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
    let mut burst = WriteBurst::new(5, 0x40, 2, 4, data.clone());
    burst.aw_delay = 3;
    tb.push(BusOp::Write(burst)).unwrap();
    tb.run(200).expect("write completes");
    assert_eq!(tb.peek(0x40, 8).unwrap(), data);
    assert_eq!(tb.stats().unwrap().write_beats, 2);
}

#[test]
fn back_to_back_writes_keep_their_order() {
    let mut tb = bench_with(|c| c.bridge.pending_depth = 1);
    for id in 0..3u32 {
        let data = vec![id as u8 + 1; 8];
        tb.push(BusOp::Write(WriteBurst::new(id, 0x1000 + 0x100 * u64::from(id), 1, 8, data))).unwrap();
    }
    tb.run(300).expect("writes complete");
    for id in 0..3u64 {
        assert_eq!(tb.peek(0x1000 + 0x100 * id, 8).unwrap(), vec![id as u8 + 1; 8]);
    }
    let ids = tb.completions().unwrap().iter().map(|c| c.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn wrapping_read() {
    let mut tb = bench(32);
    tb.poke(0x100, (0..16).collect());
    let mut burst = ReadBurst::new(1, 0x108, 4, 4);
    burst.burst = BurstType::Wrap;
    tb.push(BusOp::Read(burst)).unwrap();
    tb.run(200).expect("read completes");
    let expected = (8..16).chain(0..8).collect::<Vec<u8>>();
    assert_eq!(tb.completions().unwrap()[0].data, expected);
}

#[test]
fn exclusive_access_gets_exokay() {
    let mut tb = bench(64);
    let mut burst = ReadBurst::new(9, 0x0, 1, 8);
    burst.exclusive = true;
    tb.push(BusOp::Read(burst)).unwrap();
    tb.run(200).expect("read completes");
    assert_eq!(tb.completions().unwrap()[0].resp, Resp::ExOkay);
}

#[test]
fn illegal_phase_halts_the_bridge() {
    let mut tb = bench(64);
    tb.push(BusOp::Read(ReadBurst::new(1, 0x0, 8, 8))).unwrap();
    for _ in 0..5 {
        tb.cycle();
    }
    let beats = tb.beat_trace().unwrap().len();
    assert!(beats > 0);

    let stray = SharedTxn::new(Transaction::new(Command::Read, 0x0, AxiAttributes::default()));
    tb.inject_bw(BwCall {
        txn: stray,
        phase: Phase::EndResp,
        delay: Duration::ZERO,
    });
    assert!(matches!(
        tb.fault().unwrap(),
        Some(BridgeError::IllegalPhase { phase: Phase::EndResp, .. })
    ));
    assert!(matches!(tb.run(50), Err(BridgeError::IllegalPhase { .. })));

    for _ in 0..10 {
        tb.cycle();
    }
    assert_eq!(tb.beat_trace().unwrap().len(), beats);
    assert!(tb.completions().unwrap().is_empty());
}

#[test]
fn unknown_transaction_is_fatal() {
    let mut tb = bench(64);
    let stray = SharedTxn::new(Transaction::new(Command::Write, 0x0, AxiAttributes::default()));
    tb.inject_bw(BwCall {
        txn: stray,
        phase: Phase::EndReq,
        delay: Duration::ZERO,
    });
    assert!(matches!(tb.fault().unwrap(), Some(BridgeError::UnknownTransaction(_))));
}

#[test]
fn oversized_beat_is_fatal() {
    let mut tb = bench(32);
    tb.push(BusOp::Read(ReadBurst::new(1, 0x0, 1, 8))).unwrap();
    assert!(matches!(
        tb.run(20),
        Err(BridgeError::InvalidEncoding { field: "size", .. })
    ));
}

#[test]
fn short_write_data_leaves_trailing_beats_empty() {
    let mut tb = bench(32);
    tb.push(BusOp::Write(WriteBurst::new(1, 0x100, 4, 4, vec![1; 8]))).unwrap();
    tb.run(200).expect("write completes");

    let trace = tb.beat_trace().unwrap();
    assert_eq!(trace.iter().map(|b| b.bytes).collect::<Vec<_>>(), vec![4, 4, 0, 0]);
    let begin_req = tb.phase_log().unwrap().into_iter().find(|r| r.phase == Phase::BeginReq).unwrap();
    assert_eq!(begin_req.data_len, 8);

    let mut expected = vec![1; 8];
    expected.extend([0; 8]);
    assert_eq!(tb.peek(0x100, 16).unwrap(), expected);
}

#[test]
fn scattered_strobes_are_truncated_to_the_written_count() {
    let mut tb = bench(64);
    let mut burst = WriteBurst::new(1, 0x100, 1, 8, (1..=8).collect());
    burst.byte_enable = Some(vec![true, true, false, true, true, false, true, true]);
    tb.push(BusOp::Write(burst)).unwrap();
    tb.run(200).expect("write completes");

    let trace = tb.beat_trace().unwrap();
    assert_eq!(trace.len(), 1);
    assert_eq!(trace[0].bytes, 6);
    let begin_req = tb.phase_log().unwrap().into_iter().find(|r| r.phase == Phase::BeginReq).unwrap();
    assert_eq!(begin_req.data_len, 6);
    // only the first six buffer bytes survive, holes stay disabled
    assert_eq!(tb.peek(0x100, 8).unwrap(), vec![1, 2, 0, 4, 5, 0, 0, 0]);
}

#[test]
fn delayed_synchronous_completion() {
    let mut tb = bench_with(|c| {
        c.bridge.bus_width = 32;
        c.update_delay_ns = 3;
    });
    let data = (0..16).map(|i| 0x30 + i as u8).collect::<Vec<u8>>();
    tb.push(BusOp::Write(WriteBurst::new(1, 0x100, 4, 4, data.clone()))).unwrap();
    tb.run(300).expect("write completes");
    tb.push(BusOp::Read(ReadBurst::new(2, 0x100, 4, 4))).unwrap();
    tb.run(300).expect("read completes");

    let done = tb.completions().unwrap();
    assert_eq!(done.len(), 2);
    assert_eq!(done[1].data, data);
    let stats = tb.stats().unwrap();
    assert_eq!(stats.write_beats, 4);
    assert_eq!(stats.read_beats, 4);
    assert_eq!(stats.completed, 2);
}

#[test]
fn end_of_response_carries_time_to_next_edge() {
    let mut tb = bench(64);
    let config = tb.config().clone();
    tb.push(BusOp::Write(WriteBurst::new(1, 0x400, 2, 8, vec![7; 16]))).unwrap();
    tb.push(BusOp::Read(ReadBurst::new(2, 0x400, 4, 8))).unwrap();
    tb.run(300).expect("bursts complete");

    let to_edge = config.clock_period() - config.sample_delay();
    let log = tb.phase_log().unwrap();
    let ends = log
        .iter()
        .filter(|r| matches!(r.phase, Phase::EndPartialResp | Phase::EndResp))
        .collect::<Vec<_>>();
    assert_eq!(ends.len(), 5);
    assert!(ends.iter().all(|r| r.delay == to_edge), "{:?}", ends);
    assert!(log
        .iter()
        .filter(|r| matches!(r.phase, Phase::BeginReq | Phase::BeginPartialReq))
        .all(|r| r.delay == Duration::ZERO));
}

#[test]
fn write_beat_past_burst_length_is_fatal() {
    let mut tb = bench(64);
    let mut open = WriteBurst::new(1, 0x100, 2, 8, vec![1; 16]);
    open.wlast = false;
    tb.push(BusOp::Write(open)).unwrap();
    tb.push(BusOp::Write(WriteBurst::new(2, 0x200, 1, 8, vec![2; 8]))).unwrap();
    assert!(matches!(
        tb.run(100),
        Err(BridgeError::BeatOverrun { beat: 2, beats: 2, .. })
    ));
    assert_eq!(tb.stats().unwrap().write_beats, 2);
    assert!(tb.completions().unwrap().is_empty());
}

#[test]
fn partial_response_may_not_claim_the_last_beat() {
    let mut tb = bench_with(|c| c.response_delay_ns = 1000);
    tb.push(BusOp::Read(ReadBurst::new(1, 0x0, 1, 8))).unwrap();
    for _ in 0..5 {
        tb.cycle();
    }
    let requests = tb.requests().unwrap();
    assert_eq!(requests.len(), 1);

    tb.inject_bw(BwCall {
        txn: requests[0].clone(),
        phase: Phase::BeginPartialResp,
        delay: Duration::ZERO,
    });
    assert!(matches!(
        tb.fault().unwrap(),
        Some(BridgeError::BeatOverrun { beat: 0, beats: 1, .. })
    ));
    assert!(tb.beat_trace().unwrap().is_empty());
}

#[test]
fn response_ends_a_pending_request() {
    let mut tb = bench_with(|c| c.accept_delay_ns = 2000);
    tb.push(BusOp::Read(ReadBurst::new(4, 0x40, 1, 8))).unwrap();
    for _ in 0..5 {
        tb.cycle();
    }
    let requests = tb.requests().unwrap();
    assert_eq!(requests.len(), 1);
    // the request is still waiting for its end, the address stays unacknowledged
    assert!(!tb.is_done().unwrap());

    let data = vec![0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04];
    requests[0].lock().data_mut().copy_from_slice(&data);
    tb.inject_bw(BwCall {
        txn: requests[0].clone(),
        phase: Phase::BeginResp,
        delay: Duration::from_nanos(5),
    });
    tb.run(20).expect("read completes before the memory ends the request");

    assert_eq!(tb.fault().unwrap(), None);
    let done = tb.completions().unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, 4);
    assert_eq!(done[0].data, data);
    assert_eq!(tb.stats().unwrap().completed, 1);
    assert!(tb.requests().unwrap().is_empty());
}

#[test]
fn unencodable_bursts_are_refused() {
    let mut tb = bench(64);
    assert!(matches!(
        tb.push(BusOp::Read(ReadBurst::new(1, 0x0, 0, 8))),
        Err(BridgeError::InvalidEncoding { field: "len", value: 0 })
    ));
    assert!(matches!(
        tb.push(BusOp::Write(WriteBurst::new(2, 0x0, 257, 1, vec![0; 257]))),
        Err(BridgeError::InvalidEncoding { field: "len", value: 257 })
    ));
    assert!(matches!(
        tb.push(BusOp::Read(ReadBurst::new(3, 0x0, 1, 3))),
        Err(BridgeError::InvalidEncoding { field: "size", value: 3 })
    ));
    tb.push(BusOp::Read(ReadBurst::new(4, 0x0, 256, 1))).unwrap();
    tb.run(2000).expect("longest burst completes");
    let done = tb.completions().unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, 4);
}

#[test]
fn trace_and_phase_log_are_bounded() {
    let mut tb = bench_with(|c| {
        c.bridge.bus_width = 32;
        c.bridge.trace_depth = 2;
        c.phase_log_depth = 3;
    });
    tb.push(BusOp::Write(WriteBurst::new(1, 0x100, 4, 4, vec![9; 16]))).unwrap();
    tb.run(200).expect("write completes");

    let beats = tb.beat_trace().unwrap().iter().map(|b| b.beat).collect::<Vec<_>>();
    assert_eq!(beats, vec![2, 3]);
    let phases = tb.phase_log().unwrap().iter().map(|r| r.phase).collect::<Vec<_>>();
    assert_eq!(phases, vec![Phase::BeginPartialReq, Phase::BeginReq, Phase::EndResp]);

    assert_eq!(tb.take_beat_trace().unwrap().len(), 2);
    assert!(tb.beat_trace().unwrap().is_empty());
    assert_eq!(tb.take_phase_log().unwrap().len(), 3);
    assert!(tb.phase_log().unwrap().is_empty());

    // recording carries on after a drain
    tb.push(BusOp::Read(ReadBurst::new(2, 0x100, 1, 4))).unwrap();
    tb.run(200).expect("read completes");
    assert_eq!(tb.take_beat_trace().unwrap().len(), 1);
}

#[test]
fn configuration_is_validated() {
    let bad_width = BridgeConfig {
        bus_width: 48,
        ..BridgeConfig::default()
    };
    assert!(matches!(bad_width.validate(), Err(BridgeError::Config(_))));
    let coherent = BridgeConfig {
        coherent: true,
        ..BridgeConfig::default()
    };
    assert!(matches!(coherent.validate(), Err(BridgeError::Config(_))));

    let bench = BenchConfig {
        sample_delay_ns: 0,
        ..BenchConfig::default()
    };
    assert!(Testbench::new(bench).is_err());
}

#[test]
fn configuration_from_toml() {
    let path = std::env::temp_dir().join(format!("acesim-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        "clock_period_ns = 20\nready = \"toggle\"\n\n[bridge]\nbus_width = 128\n",
    )
    .unwrap();
    let config = load_config_file(&path).expect("valid file");
    std::fs::remove_file(&path).ok();

    assert_eq!(config.clock_period_ns, 20);
    assert_eq!(config.ready, ReadyPattern::Toggle);
    assert_eq!(config.bridge.bus_width, 128);
    assert_eq!(config.bridge.pending_depth, BridgeConfig::default().pending_depth);
    assert_eq!(config.sample_delay_ns, BenchConfig::default().sample_delay_ns);

    let missing = std::env::temp_dir().join("acesim-does-not-exist.toml");
    assert!(matches!(load_config_file(&missing), Err(BridgeError::ConfigLoad { .. })));
}
