use clap::Parser;
use log::info;
use std::error::Error;
use std::path::PathBuf;

use stm32_gpio::family::{Family, PortConfig, PortName, ResetTable};
use stm32_gpio::port::{Port, PortState};
use stm32_gpio::script::{self, Runner};

/// Plays a scripted scenario against an emulated STM32 GPIO port and prints
/// everything that the port reports.
#[derive(Parser)]
#[clap(name = "gpio-sim")]
struct Args {
    /// Chip family, e.g. "f4" or "l4p".
    #[clap(long, default_value = "f4")]
    family: Family,

    /// Port letter, "a" to "k".
    #[clap(long, default_value = "a")]
    port: PortName,

    /// Number of pins that the port has.
    #[clap(long, default_value_t = 16)]
    pins: usize,

    /// JSON file with additional reset values. Its rows override the built-in
    /// ones.
    #[clap(long)]
    reset_table: Option<PathBuf>,

    /// Port state to start from, as saved by --snapshot-out.
    #[clap(long)]
    snapshot_in: Option<PathBuf>,

    /// Where to save the port state after the script finishes.
    #[clap(long)]
    snapshot_out: Option<PathBuf>,

    /// Log more; repeat for even more.
    #[clap(short, long, parse(from_occurrences))]
    verbose: usize,

    /// JSON file with the list of steps.
    script: PathBuf,
}

fn init_logger(verbose: usize) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn load_reset_table(path: &Option<PathBuf>) -> Result<ResetTable, Box<dyn Error>> {
    let mut table = ResetTable::builtin();
    if let Some(path) = path {
        table.extend(ResetTable::from_json(&std::fs::read_to_string(path)?)?);
        info!("Loaded reset values from {}", path.display());
    }
    Ok(table)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logger(args.verbose);

    let reset_table = load_reset_table(&args.reset_table)?;
    let config = PortConfig::new(args.family, args.port).with_pin_count(args.pins);
    let mut port = Port::new(config, &reset_table)?;
    info!("Emulating GPIO{} of {}, {} pins", args.port, args.family, args.pins);

    if let Some(path) = &args.snapshot_in {
        port.import_state(PortState::from_json(&std::fs::read_to_string(path)?)?)?;
        info!("Restored the port state from {}", path.display());
    }

    let steps = script::parse(&std::fs::read_to_string(&args.script)?)?;
    let mut runner = Runner::new(port);
    for (index, step) in steps.iter().enumerate() {
        for record in runner.step(step)? {
            println!("{:>4}: {}", index, record);
        }
    }

    if let Some(path) = &args.snapshot_out {
        let state = runner.port().export_state();
        std::fs::write(path, state.to_json()?)?;
        info!("Saved the port state to {}", path.display());
    }
    Ok(())
}
