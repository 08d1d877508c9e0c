//! # TSN Sender
//!
//! Controller-side demo of the cyclic data plane: one RT thread publishes
//! the control setpoints at the cycle's transmit slot, a second RT thread
//! collects axis feedback in the receive slot, and the main thread drives
//! a jog profile through the shared plant state while reporting positions.
//!
//! Send outranks receive (SCHED_FIFO 80 vs 75): a late control frame is a
//! harder failure than a late feedback update.

mod state;

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use tsn_common::config::DataPlaneConfig;
use tsn_common::consts::{RT_PRIORITY_RECV, RT_PRIORITY_SEND};
use tsn_cyclic::executor::{RecvExecutor, SendExecutor};
use tsn_cyclic::net::UdpTransport;
use tsn_cyclic::rt::init_rt_thread;
use tsn_cyclic::{CycleSchedule, TaiClock};
use tsn_pubsub::PacketPool;

use state::{shared_plant, PlantSink, PlantSource, SharedPlant};

/// TSN Sender — cyclic machine-control publisher
#[derive(Parser, Debug)]
#[command(name = "tsn_sender")]
#[command(version)]
#[command(about = "Publishes control setpoints and collects axis feedback on a TSN cycle grid")]
struct Args {
    /// Path to the data plane configuration TOML.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Cycle interval in microseconds (overrides config).
    #[arg(short = 't', long)]
    interval_us: Option<u64>,

    /// Cycle base time as a Unix timestamp (overrides config).
    #[arg(short = 'b', long)]
    base_time: Option<f64>,

    /// Local address for inbound axis feedback (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Remote address control frames are sent to (overrides config).
    #[arg(long)]
    dest: Option<String>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("TSN Sender v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("TSN Sender shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => DataPlaneConfig::load(path)?,
        None => DataPlaneConfig::default(),
    };
    if let Some(us) = args.interval_us {
        config.cycle.interval_ns = us * 1_000;
    }
    if let Some(base) = args.base_time {
        config.cycle.base_time_s = base;
    }
    if let Some(listen) = &args.listen {
        config.net.listen = listen.clone();
    }
    if let Some(dest) = &args.dest {
        config.net.dest = dest.clone();
    }
    config.cycle.validate()?;
    info!(
        interval_ns = config.cycle.interval_ns,
        send_offset_ns = config.cycle.send_offset_ns,
        recv_offset_ns = config.cycle.recv_offset_ns,
        "config OK"
    );

    let schedule = CycleSchedule::new(&config.cycle);
    let plant = shared_plant();
    let shutdown = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        flag.store(true, Ordering::SeqCst);
    })?;

    // Control frames go out on an ephemeral port; feedback comes back on
    // the configured listen address.
    let tx_transport = UdpTransport::bind("0.0.0.0:0", &config.net.dest)?;
    let rx_transport = UdpTransport::bind(&config.net.listen, &config.net.dest)?;

    let mut send_exec = SendExecutor::new(
        TaiClock,
        tx_transport,
        PlantSource::new(Arc::clone(&plant)),
        schedule,
        PacketPool::new(4),
        config.net.publisher_id,
    );
    let mut recv_exec = RecvExecutor::new(
        TaiClock,
        rx_transport,
        PlantSink::new(Arc::clone(&plant)),
        schedule,
        PacketPool::new(4),
    );

    let send_shutdown = Arc::clone(&shutdown);
    let send_thread = std::thread::Builder::new()
        .name("tsn-send".into())
        .spawn(move || {
            if let Err(e) = init_rt_thread(RT_PRIORITY_SEND) {
                warn!("send thread RT setup failed: {e}, continuing unprivileged");
            }
            send_exec.run(&send_shutdown);
        })?;

    let recv_shutdown = Arc::clone(&shutdown);
    let recv_thread = std::thread::Builder::new()
        .name("tsn-recv".into())
        .spawn(move || {
            if let Err(e) = init_rt_thread(RT_PRIORITY_RECV) {
                warn!("recv thread RT setup failed: {e}, continuing unprivileged");
            }
            recv_exec.run(&recv_shutdown);
        })?;

    jog_profile(&plant, &shutdown);

    send_thread
        .join()
        .map_err(|_| "send thread panicked".to_string())?;
    recv_thread
        .join()
        .map_err(|_| "recv thread panicked".to_string())?;
    Ok(())
}

/// Operator stand-in: jogs the X axis back and forth and reports the
/// feedback positions once per second. Runs on the non-RT main thread.
fn jog_profile(plant: &SharedPlant, shutdown: &AtomicBool) {
    let mut velocity = 20.0;

    while !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_secs(1));

        match plant.lock() {
            Ok(mut s) => {
                // Reverse at the soft travel bounds.
                let x_pos = s.feedback[0].value;
                if (x_pos > 250.0 && velocity > 0.0) || (x_pos < 50.0 && velocity < 0.0) {
                    velocity = -velocity;
                }
                s.control.machine_status = true;
                s.control.x_set.value = velocity;
                s.control.x_set.switch = true;
                s.control.s_set.value = 5.0;
                s.control.s_set.switch = true;

                info!(
                    x = s.feedback[0].value,
                    y = s.feedback[1].value,
                    z = s.feedback[2].value,
                    spindle = s.feedback[3].value,
                    "axis positions"
                );
            }
            Err(e) => {
                error!("plant state lost: {e}");
                return;
            }
        }
    }
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
