//! The cyclic send and receive role loops.
//!
//! Each loop owns one RT thread's whole cycle: sleep to the wakeup
//! instant, perform the cycle's work against its deadlines, advance the
//! grid. Degraded cycles (missed deadline, exhausted pool, violating
//! frame, failed send) are counted and logged but never shift the next
//! wakeup — the grid is authoritative, not the work.
//!
//! The loops talk to the world exclusively through the collaborator
//! traits below; sockets, clocks and shared memory are injected.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info, warn};

use tsn_common::axis::{AxisInfo, ControlInfo, MacAddr};
use tsn_common::time::TaiTime;
use tsn_pubsub::error::CodecError;
use tsn_pubsub::pool::{PacketBuffer, PacketPool};
use tsn_pubsub::wire::{decode_axis_all, encode_control, encode_header};
use tsn_pubsub::DatasetKind;

use crate::clock::Clock;
use crate::exchange::ExchangeError;
use crate::schedule::CycleSchedule;

/// Transport failure. `Timeout` is an expected steady-state outcome of a
/// receive window; everything else is counted as a transport failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No frame arrived within the receive window.
    #[error("receive window elapsed without a frame")]
    Timeout,

    /// Endpoint address could not be parsed.
    #[error("invalid endpoint address '{0}'")]
    Addr(String),

    /// Underlying socket error.
    #[error("transport I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Frame transmit/receive, injected into the executors.
pub trait Transport {
    /// Send one frame. `dest` and `tx_time` are hints for transports with
    /// hardware launch-time support; a plain transport sends immediately.
    fn send(&mut self, frame: &[u8], dest: MacAddr, tx_time: TaiTime)
        -> Result<(), TransportError>;

    /// Receive one frame into `buf`, waiting at most `timeout_ns`. On
    /// success the buffer's logical length is set to the frame length.
    fn recv(&mut self, buf: &mut PacketBuffer, timeout_ns: u64) -> Result<usize, TransportError>;
}

/// Deadline-bound view of the shared setpoint state, read each send cycle.
pub trait SetpointSource {
    fn read(&mut self, deadline: TaiTime) -> Result<ControlInfo, ExchangeError>;
}

/// Deadline-bound view of the shared feedback state, written each receive
/// cycle.
pub trait FeedbackSink {
    fn write(&mut self, info: &AxisInfo, deadline: TaiTime) -> Result<(), ExchangeError>;
}

/// Per-loop degradation tally. Everything that goes wrong in steady state
/// lands here instead of aborting the loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleCounters {
    /// Cycles entered.
    pub cycles: u64,
    /// Inbound frames discarded for violating the protocol subset.
    pub protocol_violations: u64,
    /// Outbound frames dropped for fixed-point overflow.
    pub overflows: u64,
    /// Cycles whose I/O was skipped for want of a free buffer.
    pub pool_exhausted: u64,
    /// Deadline-bound operations that ran out of time.
    pub deadlines_missed: u64,
    /// Receive windows that closed without a frame.
    pub recv_timeouts: u64,
    /// Failed sends and receive errors other than a timeout.
    pub transport_failures: u64,
    /// Shared-state accesses that found the lock poisoned.
    pub exchange_faults: u64,
}

impl CycleCounters {
    /// Emit the tally as one structured log line.
    pub fn log_summary(&self, role: &str) {
        info!(
            role,
            cycles = self.cycles,
            protocol_violations = self.protocol_violations,
            overflows = self.overflows,
            pool_exhausted = self.pool_exhausted,
            deadlines_missed = self.deadlines_missed,
            recv_timeouts = self.recv_timeouts,
            transport_failures = self.transport_failures,
            exchange_faults = self.exchange_faults,
            "cycle loop stopped"
        );
    }
}

// ─── Send Loop ──────────────────────────────────────────────────────

/// Publishes one control frame per cycle at its transmit slot.
pub struct SendExecutor<C, T, S> {
    clock: C,
    transport: T,
    source: S,
    schedule: CycleSchedule,
    pool: PacketPool,
    publisher_id: u16,
    seq_no: u16,
    cached: ControlInfo,
    counters: CycleCounters,
}

impl<C, T, S> SendExecutor<C, T, S>
where
    C: Clock,
    T: Transport,
    S: SetpointSource,
{
    pub fn new(
        clock: C,
        transport: T,
        source: S,
        schedule: CycleSchedule,
        pool: PacketPool,
        publisher_id: u16,
    ) -> Self {
        Self {
            clock,
            transport,
            source,
            schedule,
            pool,
            publisher_id,
            seq_no: 0,
            cached: ControlInfo::default(),
            counters: CycleCounters::default(),
        }
    }

    /// Degradation tally so far.
    pub fn counters(&self) -> &CycleCounters {
        &self.counters
    }

    /// Sequence number of the next control frame.
    pub fn seq_no(&self) -> u16 {
        self.seq_no
    }

    /// Run until `shutdown` is set. The flag is checked once per cycle
    /// boundary; a cycle's I/O is never interrupted.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        let mut est = self.schedule.epoch_start(self.clock.now());
        info!(epoch_start = %est, "send loop aligned to cycle grid");

        while !shutdown.load(Ordering::Relaxed) {
            let tx = self.schedule.tx_time(est);
            self.clock.sleep_until(self.schedule.send_wakeup(tx));
            self.run_cycle(tx);
            est = self.schedule.advance(est);
        }
        self.counters.log_summary("send");
    }

    fn run_cycle(&mut self, tx: TaiTime) {
        self.counters.cycles += 1;

        // A missed read is not fatal: the previous cycle's setpoints
        // stay valid until fresher ones arrive.
        match self.source.read(tx) {
            Ok(info) => self.cached = info,
            Err(ExchangeError::TimedOut) => {
                self.counters.deadlines_missed += 1;
                debug!("setpoint read missed its deadline, reusing cached values");
            }
            Err(ExchangeError::Fault) => {
                self.counters.exchange_faults += 1;
                warn!("setpoint state poisoned, reusing cached values");
            }
        }

        let mut buf = match self.pool.acquire() {
            Ok(buf) => buf,
            Err(e) => {
                self.counters.pool_exhausted += 1;
                warn!(error = %e, "skipping send cycle");
                return;
            }
        };

        let encoded = encode_header(&mut buf, 1, DatasetKind::Control, self.publisher_id)
            .and_then(|()| encode_control(&mut buf, &self.cached, self.seq_no, self.clock.now()));
        match encoded {
            Ok(()) => match self.transport.send(buf.as_slice(), MacAddr::CONTROL, tx) {
                Ok(()) => self.seq_no = self.seq_no.wrapping_add(1),
                Err(e) => {
                    self.counters.transport_failures += 1;
                    warn!(error = %e, "control frame send failed");
                }
            },
            Err(CodecError::Overflow(value)) => {
                self.counters.overflows += 1;
                warn!(value, "setpoint exceeds fixed-point range, frame dropped");
            }
            Err(e) => {
                self.counters.protocol_violations += 1;
                warn!(error = %e, "control frame encode failed");
            }
        }

        if let Err(e) = self.pool.release(buf) {
            warn!(error = %e, "buffer release rejected");
        }
    }
}

// ─── Receive Loop ───────────────────────────────────────────────────

/// Consumes axis feedback frames, one receive window per cycle.
pub struct RecvExecutor<C, T, F> {
    clock: C,
    transport: T,
    sink: F,
    schedule: CycleSchedule,
    pool: PacketPool,
    counters: CycleCounters,
}

impl<C, T, F> RecvExecutor<C, T, F>
where
    C: Clock,
    T: Transport,
    F: FeedbackSink,
{
    pub fn new(clock: C, transport: T, sink: F, schedule: CycleSchedule, pool: PacketPool) -> Self {
        Self {
            clock,
            transport,
            sink,
            schedule,
            pool,
            counters: CycleCounters::default(),
        }
    }

    /// Degradation tally so far.
    pub fn counters(&self) -> &CycleCounters {
        &self.counters
    }

    /// Run until `shutdown` is set, checked once per cycle boundary.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        let mut est = self.schedule.epoch_start(self.clock.now());
        info!(epoch_start = %est, "receive loop aligned to cycle grid");

        while !shutdown.load(Ordering::Relaxed) {
            self.clock.sleep_until(self.schedule.recv_wakeup(est));
            self.run_cycle(est);
            est = self.schedule.advance(est);
        }
        self.counters.log_summary("recv");
    }

    fn run_cycle(&mut self, est: TaiTime) {
        self.counters.cycles += 1;

        let deadline = self.schedule.recv_deadline(est);
        let now = self.clock.now();
        if now >= deadline {
            self.counters.deadlines_missed += 1;
            warn!("woke past the receive deadline, skipping cycle");
            return;
        }
        let timeout_ns = (deadline.as_nanos() - now.as_nanos()) as u64;

        let mut buf = match self.pool.acquire() {
            Ok(buf) => buf,
            Err(e) => {
                self.counters.pool_exhausted += 1;
                warn!(error = %e, "skipping receive cycle");
                return;
            }
        };

        match self.transport.recv(&mut buf, timeout_ns) {
            // Feedback must land in the shared state before the cycle
            // ends; the next epoch start is the write deadline.
            Ok(_) => self.consume(&buf, self.schedule.advance(est)),
            Err(TransportError::Timeout) => {
                self.counters.recv_timeouts += 1;
                debug!("receive window closed without a frame");
            }
            Err(e) => {
                self.counters.transport_failures += 1;
                warn!(error = %e, "receive failed");
            }
        }

        if let Err(e) = self.pool.release(buf) {
            warn!(error = %e, "buffer release rejected");
        }
    }

    fn consume(&mut self, buf: &PacketBuffer, write_deadline: TaiTime) {
        match decode_axis_all(buf.as_slice()) {
            Ok((infos, _seq_no)) => {
                for info in &infos {
                    match self.sink.write(info, write_deadline) {
                        Ok(()) => {}
                        Err(ExchangeError::TimedOut) => {
                            self.counters.deadlines_missed += 1;
                            debug!(axis = ?info.axis, "feedback write missed its deadline");
                            break;
                        }
                        Err(ExchangeError::Fault) => {
                            self.counters.exchange_faults += 1;
                            warn!("feedback state poisoned");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                self.counters.protocol_violations += 1;
                warn!(error = %e, "inbound frame discarded");
            }
        }
    }
}
