//! # TSN Drive
//!
//! Drive-side demo of the cyclic data plane: a single cyclic thread
//! receives the control frame in its receive slot, steps the simulated
//! axes, and answers with one position frame per axis in staggered
//! transmit slots.
//!
//! Mirrors the controller's cycle grid: the enable switches are applied
//! before the simulation step, the new velocity setpoints after the
//! feedback went out, so the reported position always belongs to the
//! previous cycle's command.

mod axis;

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use tsn_common::axis::AxisId;
use tsn_common::config::DataPlaneConfig;
use tsn_common::consts::{NUM_AXES, RT_PRIORITY_SEND};
use tsn_common::time::TaiTime;
use tsn_cyclic::executor::{CycleCounters, Transport, TransportError};
use tsn_cyclic::net::UdpTransport;
use tsn_cyclic::rt::init_rt_thread;
use tsn_cyclic::{Clock, CycleSchedule, TaiClock};
use tsn_pubsub::error::CodecError;
use tsn_pubsub::wire::{decode_control, encode_axis, encode_header};
use tsn_pubsub::{DatasetKind, PacketPool};

use axis::{build_axes, AxisSim};

/// TSN Drive — cyclic drive simulation
#[derive(Parser, Debug)]
#[command(name = "tsn_drive")]
#[command(version)]
#[command(about = "Receives control setpoints and answers with simulated axis positions")]
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

    /// Sending offset, start of cycle to sending slot [ns].
    #[arg(short = 'o', long)]
    send_offset: Option<u64>,

    /// Receiving offset, start of cycle to end of receive slot [ns].
    #[arg(short = 'r', long)]
    recv_offset: Option<u64>,

    /// Receive window duration in which a control frame is expected [ns].
    #[arg(short = 'w', long)]
    recv_window: Option<u64>,

    /// Send window duration between two axis frames [ns].
    #[arg(short = 's', long)]
    send_window: Option<u64>,

    /// Number of simulated axes.
    #[arg(short = 'n', long, default_value_t = 4)]
    num_axes: usize,

    /// Index of the first simulated axis (x = 0, y = 1, z = 2, spindle = 3).
    #[arg(short = 'a', long, default_value_t = 0)]
    first_axis: u8,

    /// Local address for inbound control frames (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Remote address feedback frames are sent to (overrides config).
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

    info!("TSN Drive v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("TSN Drive shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let first_axis = AxisId::from_u8(args.first_axis)
        .ok_or_else(|| format!("axis index {} too high, maximum 3", args.first_axis))?;
    if args.num_axes == 0 || args.num_axes > NUM_AXES {
        return Err(format!("number of axes {} outside 1..=4", args.num_axes).into());
    }
    if first_axis.index() + args.num_axes > NUM_AXES {
        return Err("combination of first axis and axis count exceeds the cell".into());
    }

    let mut config = match &args.config {
        Some(path) => DataPlaneConfig::load(path)?,
        None => {
            // Stand-alone default: mirror the sender's endpoints.
            let mut cfg = DataPlaneConfig::default();
            cfg.net.listen = "0.0.0.0:14551".to_string();
            cfg.net.dest = "127.0.0.1:14550".to_string();
            cfg.net.publisher_id = 2;
            cfg
        }
    };
    if let Some(us) = args.interval_us {
        config.cycle.interval_ns = us * 1_000;
    }
    if let Some(base) = args.base_time {
        config.cycle.base_time_s = base;
    }
    if let Some(ns) = args.send_offset {
        config.cycle.send_offset_ns = ns;
    }
    if let Some(ns) = args.recv_offset {
        config.cycle.recv_offset_ns = ns;
    }
    if let Some(ns) = args.recv_window {
        config.cycle.recv_window_ns = ns;
    }
    if let Some(ns) = args.send_window {
        config.cycle.send_window_ns = ns;
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
        num_axes = args.num_axes,
        first_axis = ?first_axis,
        "config OK"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        flag.store(true, Ordering::SeqCst);
    })?;

    let transport = UdpTransport::bind(&config.net.listen, &config.net.dest)?;
    if let Err(e) = init_rt_thread(RT_PRIORITY_SEND) {
        warn!("RT setup failed: {e}, continuing unprivileged");
    }

    let mut drive = Drive {
        clock: TaiClock,
        transport,
        schedule: CycleSchedule::new(&config.cycle),
        pool: PacketPool::new(6),
        axes: build_axes(first_axis, args.num_axes),
        seq_no: [0u16; NUM_AXES],
        publisher_id: config.net.publisher_id,
        cycle_dt: config.cycle.interval_ns as f64 / 1e9,
        counters: CycleCounters::default(),
    };
    drive.run(&shutdown);
    Ok(())
}

struct Drive<T> {
    clock: TaiClock,
    transport: T,
    schedule: CycleSchedule,
    pool: PacketPool,
    axes: Vec<AxisSim>,
    seq_no: [u16; NUM_AXES],
    publisher_id: u16,
    cycle_dt: f64,
    counters: CycleCounters,
}

impl<T: Transport> Drive<T> {
    fn run(&mut self, shutdown: &AtomicBool) {
        let mut est = self.schedule.epoch_start(self.clock.now());
        let mut first_tx = self.schedule.tx_time(est);
        let mut recv_wakeup = self.schedule.recv_wakeup(est);

        // The feedback answering a control frame can only go out at a
        // transmit slot after the receive wakeup; report the lag.
        let mut delayed = 0u32;
        while first_tx < recv_wakeup {
            first_tx = self.schedule.advance(first_tx);
            delayed += 1;
        }
        if delayed > 0 {
            warn!(
                cycles = delayed,
                "transmit slot precedes receive wakeup, answers delayed; \
                 adjust the network schedule or reduce stack budgets"
            );
        }
        info!(epoch_start = %est, "drive loop aligned to cycle grid");

        self.clock.sleep_until(recv_wakeup);
        while !shutdown.load(Ordering::Relaxed) {
            self.run_cycle(est, first_tx);

            est = self.schedule.advance(est);
            first_tx = self.schedule.advance(first_tx);
            recv_wakeup = self.schedule.advance(recv_wakeup);
            self.clock.sleep_until(recv_wakeup);
        }
        self.counters.log_summary("drive");
    }

    fn run_cycle(&mut self, est: TaiTime, first_tx: TaiTime) {
        self.counters.cycles += 1;
        if self.counters.cycles % 1024 == 0 {
            for axis in &self.axes {
                debug!(
                    axis = ?axis.axis(),
                    pos = axis.position(),
                    vel = axis.velocity(),
                    enabled = axis.is_enabled(),
                    "axis state"
                );
            }
        }

        let control = self.receive_control(est);
        if let Some(info) = &control {
            for axis in &mut self.axes {
                axis.apply_enable(info);
            }
        }

        for i in 0..self.axes.len() {
            self.axes[i].fine_step(self.cycle_dt);
            self.send_feedback(i, first_tx);
        }

        // New setpoints take effect only after this cycle's positions
        // went out.
        if let Some(info) = &control {
            for axis in &mut self.axes {
                axis.apply_setpoint(info);
            }
        }
    }

    /// One receive window's worth of waiting for the control frame.
    fn receive_control(&mut self, est: TaiTime) -> Option<tsn_common::axis::ControlInfo> {
        let deadline = self.schedule.recv_deadline(est);
        let now = self.clock.now();
        if now >= deadline {
            self.counters.deadlines_missed += 1;
            warn!("woke past the receive deadline, skipping receive");
            return None;
        }
        let timeout_ns = (deadline.as_nanos() - now.as_nanos()) as u64;

        let mut buf = match self.pool.acquire() {
            Ok(buf) => buf,
            Err(e) => {
                self.counters.pool_exhausted += 1;
                warn!(error = %e, "skipping receive");
                return None;
            }
        };

        let control = match self.transport.recv(&mut buf, timeout_ns) {
            Ok(_) => match decode_control(buf.as_slice()) {
                Ok((info, _seq_no)) => Some(info),
                Err(e) => {
                    self.counters.protocol_violations += 1;
                    warn!(error = %e, "inbound frame discarded");
                    None
                }
            },
            Err(TransportError::Timeout) => {
                self.counters.recv_timeouts += 1;
                debug!("receive window closed without a control frame");
                None
            }
            Err(e) => {
                self.counters.transport_failures += 1;
                warn!(error = %e, "receive failed");
                None
            }
        };

        if let Err(e) = self.pool.release(buf) {
            warn!(error = %e, "buffer release rejected");
        }
        control
    }

    /// Publish one axis' position in its staggered slot.
    fn send_feedback(&mut self, idx: usize, first_tx: TaiTime) {
        let feedback = self.axes[idx].feedback();
        let axis = feedback.axis;
        let slot = self.schedule.axis_slot(first_tx, axis);

        let mut buf = match self.pool.acquire() {
            Ok(buf) => buf,
            Err(e) => {
                self.counters.pool_exhausted += 1;
                warn!(error = %e, axis = ?axis, "skipping feedback frame");
                return;
            }
        };

        let encoded = encode_header(&mut buf, 1, DatasetKind::Axis, self.publisher_id).and_then(
            |()| encode_axis(&mut buf, &feedback, self.seq_no[axis.index()], self.clock.now()),
        );
        match encoded {
            Ok(()) => match self.transport.send(buf.as_slice(), axis.multicast_mac(), slot) {
                Ok(()) => {
                    self.seq_no[axis.index()] = self.seq_no[axis.index()].wrapping_add(1);
                }
                Err(e) => {
                    self.counters.transport_failures += 1;
                    warn!(error = %e, axis = ?axis, "feedback send failed");
                }
            },
            Err(CodecError::Overflow(value)) => {
                self.counters.overflows += 1;
                warn!(value, axis = ?axis, "position exceeds fixed-point range, frame dropped");
            }
            Err(e) => {
                self.counters.protocol_violations += 1;
                warn!(error = %e, axis = ?axis, "feedback encode failed");
            }
        }

        if let Err(e) = self.pool.release(buf) {
            warn!(error = %e, "buffer release rejected");
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
