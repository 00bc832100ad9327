//! Clocked testbench: a pin-level initiator in front of the bridge and a
//! transaction-level memory behind it.

use asynchronix::simulation::{Address, Mailbox, SimInit, Simulation};
use asynchronix::time::MonotonicTime;
use log::{debug, info};

use crate::axi::{AceLiteTarget, BeatRecord, BridgeError, BridgeStats, BwCall, SharedTxn};
use crate::config::BenchConfig;

mod initiator;
mod memory;

pub use initiator::{BusOp, Completion, PinInitiator, ReadBurst, WriteBurst};
pub use memory::{MemoryTarget, MemoryTiming, PhaseRecord};

pub struct Testbench {
    sim: Simulation,
    initiator: Address<PinInitiator>,
    bridge: Address<AceLiteTarget>,
    memory: Address<MemoryTarget>,
    config: BenchConfig,
    cycles: u64,
}

impl Testbench {
    pub fn new(config: BenchConfig) -> Result<Self, BridgeError> {
        config.validate()?;

        // create models
        let mut initiator = PinInitiator::new(config.bridge.bus_bytes(), config.ready);
        let mut bridge = AceLiteTarget::new(config.bridge.clone(), config.clock_period())?;
        let timing = MemoryTiming {
            accept: config.accept_delay(),
            update: config.update_delay(),
            response: config.response_delay(),
        };
        let mut memory = MemoryTarget::new(timing, config.phase_log_depth);

        // create mailboxes
        let initiator_mbox = Mailbox::<PinInitiator>::new();
        let bridge_mbox = Mailbox::<AceLiteTarget>::new();
        let memory_mbox = Mailbox::<MemoryTarget>::new();

        // addresses
        let initiator_addr = initiator_mbox.address();
        let bridge_addr = bridge_mbox.address();
        let memory_addr = memory_mbox.address();

        // connect models
        initiator.o_ar.connect(AceLiteTarget::on_ar, &bridge_mbox);
        initiator.o_aw.connect(AceLiteTarget::on_aw, &bridge_mbox);
        initiator.o_w.connect(AceLiteTarget::on_w, &bridge_mbox);
        initiator.o_r_ready.connect(AceLiteTarget::on_r_ready, &bridge_mbox);
        initiator.o_b_ready.connect(AceLiteTarget::on_b_ready, &bridge_mbox);
        bridge.o_ar_ready.connect(PinInitiator::on_ar_ready, &initiator_mbox);
        bridge.o_aw_ready.connect(PinInitiator::on_aw_ready, &initiator_mbox);
        bridge.o_w_ready.connect(PinInitiator::on_w_ready, &initiator_mbox);
        bridge.o_r.connect(PinInitiator::on_r, &initiator_mbox);
        bridge.o_b.connect(PinInitiator::on_b, &initiator_mbox);
        bridge.isckt.connect(MemoryTarget::nb_transport_fw, &memory_mbox);
        memory.o_bw.connect(AceLiteTarget::nb_transport_bw, &bridge_mbox);

        // initialize simulation
        let sim = SimInit::new()
            .add_model(initiator, initiator_mbox)
            .add_model(bridge, bridge_mbox)
            .add_model(memory, memory_mbox)
            .init(MonotonicTime::EPOCH);
        debug!("testbench up, {}", describe(&config));

        Ok(Testbench {
            sim,
            initiator: initiator_addr,
            bridge: bridge_addr,
            memory: memory_addr,
            config,
            cycles: 0,
        })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Queues a burst on the initiator. Bursts that AxLEN or AxSIZE cannot
    /// encode are refused.
    pub fn push(&mut self, op: BusOp) -> Result<(), BridgeError> {
        op.check()?;
        self.sim.send_event(PinInitiator::push, op, &self.initiator);
        Ok(())
    }

    pub fn poke(&mut self, addr: u64, bytes: Vec<u8>) {
        self.sim.send_event(MemoryTarget::poke, (addr, bytes), &self.memory);
    }

    /// Delivers a backward call to the bridge as if the memory had made it.
    pub fn inject_bw(&mut self, call: BwCall) {
        self.sim.send_event(AceLiteTarget::nb_transport_bw, call, &self.bridge);
    }

    /// One clock period: rising edge, sampling point, then up to the next edge.
    pub fn cycle(&mut self) {
        let sample = self.config.sample_delay();
        self.sim.send_event(PinInitiator::on_clock_edge, (), &self.initiator);
        self.sim.send_event(AceLiteTarget::on_clock_edge, (), &self.bridge);
        self.sim.step_by(sample);
        self.sim.send_event(AceLiteTarget::on_sample, (), &self.bridge);
        self.sim.step_by(self.config.clock_period() - sample);
        self.cycles += 1;
    }

    /// Clocks until every pushed operation has completed. Returns the cycle
    /// count, or the fatal error that halted the bridge.
    pub fn run(&mut self, max_cycles: u64) -> Result<u64, BridgeError> {
        for _ in 0..max_cycles {
            self.cycle();
            if let Some(e) = self.fault()? {
                return Err(e);
            }
            if self.is_done()? {
                info!("all operations done after {} cycles", self.cycles);
                return Ok(self.cycles);
            }
        }
        Err(BridgeError::Timeout(max_cycles))
    }

    // queries

    pub fn is_done(&mut self) -> Result<bool, BridgeError> {
        let initiator = self
            .sim
            .send_query(PinInitiator::is_done, (), &self.initiator)
            .map_err(query_err)?;
        let bridge = self
            .sim
            .send_query(AceLiteTarget::is_idle, (), &self.bridge)
            .map_err(query_err)?;
        Ok(initiator && bridge)
    }

    pub fn fault(&mut self) -> Result<Option<BridgeError>, BridgeError> {
        self.sim
            .send_query(AceLiteTarget::fault, (), &self.bridge)
            .map_err(query_err)
    }

    pub fn completions(&mut self) -> Result<Vec<Completion>, BridgeError> {
        self.sim
            .send_query(PinInitiator::completions, (), &self.initiator)
            .map_err(query_err)
    }

    pub fn peek(&mut self, addr: u64, len: usize) -> Result<Vec<u8>, BridgeError> {
        self.sim
            .send_query(MemoryTarget::peek, (addr, len), &self.memory)
            .map_err(query_err)
    }

    pub fn phase_log(&mut self) -> Result<Vec<PhaseRecord>, BridgeError> {
        self.sim
            .send_query(MemoryTarget::phase_log, (), &self.memory)
            .map_err(query_err)
    }

    /// Transactions the memory has received and not yet finished.
    pub fn requests(&mut self) -> Result<Vec<SharedTxn>, BridgeError> {
        self.sim
            .send_query(MemoryTarget::requests, (), &self.memory)
            .map_err(query_err)
    }

    pub fn take_phase_log(&mut self) -> Result<Vec<PhaseRecord>, BridgeError> {
        self.sim
            .send_query(MemoryTarget::take_phase_log, (), &self.memory)
            .map_err(query_err)
    }

    pub fn beat_trace(&mut self) -> Result<Vec<BeatRecord>, BridgeError> {
        self.sim
            .send_query(AceLiteTarget::beat_trace, (), &self.bridge)
            .map_err(query_err)
    }

    pub fn take_beat_trace(&mut self) -> Result<Vec<BeatRecord>, BridgeError> {
        self.sim
            .send_query(AceLiteTarget::take_beat_trace, (), &self.bridge)
            .map_err(query_err)
    }

    pub fn stats(&mut self) -> Result<BridgeStats, BridgeError> {
        self.sim
            .send_query(AceLiteTarget::stats, (), &self.bridge)
            .map_err(query_err)
    }
}

fn query_err<E: std::fmt::Debug>(e: E) -> BridgeError {
    BridgeError::Query(format!("{:?}", e))
}

fn describe(config: &BenchConfig) -> String {
    format!(
        "{} bit bus, {}ns clock, accept after {}ns (update {}ns), respond after {}ns",
        config.bridge.bus_width,
        config.clock_period_ns,
        config.accept_delay_ns,
        config.update_delay_ns,
        config.response_delay_ns
    )
}
