use std::path::PathBuf;

use acesim_lite::bench::{BusOp, ReadBurst, WriteBurst};
use acesim_lite::{load_config_file, BenchConfig, BridgeError, Testbench};
use clap::Parser;
use env_logger::Env;
use log::info;

/// acesim - ACE-Lite pin to transaction bridge simulation
#[derive(Parser, Debug)]
#[command(name = "acesim")]
#[command(version)]
#[command(about = "Drives a write and a read-back through the ACE-Lite bridge", long_about = None)]
struct Args {
    /// TOML testbench configuration
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Give up after this many clock cycles
    #[arg(long, default_value_t = 1000)]
    cycles: u64,

    /// Data bus width in bits, overrides the configuration file
    #[arg(long, value_name = "BITS")]
    bus_width: Option<u32>,
}

fn main() -> Result<(), BridgeError> {
    // logging
    let env = Env::default()
        .filter_or("ACESIM_LOG", "info")
        .write_style_or("ACESIM_LOG_STYLE", "auto");
    env_logger::init_from_env(env);

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => load_config_file(path)?,
        None => BenchConfig::default(),
    };
    if let Some(width) = args.bus_width {
        config.bridge.bus_width = width;
    }

    let mut bench = Testbench::new(config)?;
    let size = bench.config().bridge.bus_bytes() as u32;

    // a full-width four beat write, an unaligned one and the read-backs
    let pattern = (0..4 * size).map(|i| i as u8).collect::<Vec<_>>();
    bench.push(BusOp::Write(WriteBurst::new(1, 0x100, 4, size, pattern)))?;
    bench.push(BusOp::Write(WriteBurst::new(2, 0x203, 2, size, vec![0xa5; (2 * size - 3) as usize])))?;
    bench.push(BusOp::Read(ReadBurst::new(3, 0x100, 4, size)))?;
    bench.push(BusOp::Read(ReadBurst::new(4, 0x203, 2, size)))?;

    let cycles = bench.run(args.cycles)?;

    for c in bench.completions()? {
        info!("{} id {} at {:#x}: {:?} {:02x?}", c.command, c.id, c.address, c.resp, c.data);
    }
    let stats = bench.stats()?;
    info!(
        "{} read bursts ({} beats), {} write bursts ({} beats), {} completed",
        stats.read_bursts, stats.read_beats, stats.write_bursts, stats.write_beats, stats.completed
    );

    println!("finished simulation in {} cycles", cycles);
    Ok(())
}
