//! This module includes everything needed to read output from the HX711: the
//! two-pin wire protocol, a background watcher thread that keeps polling the
//! device for fresh conversions, and the single-slot mailbox consumers read
//! through [`Hx711::get_value`].

use std::mem;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, trace};

use crate::error::{Error, Result};
use crate::gpio::Port;

/// A sign-extended 24-bit conversion result.
pub type Value = i32;

/// Lowest value the 24-bit two's-complement output can encode. A conversion
/// pinned here is saturated and never published.
pub const SATURATION_MIN: Value = -0x80_0000;

/// Highest value the 24-bit two's-complement output can encode.
pub const SATURATION_MAX: Value = 0x7F_FFFF;

const BYTES_PER_CONVERSION: usize = 3;

/// Hold time around each clock edge. The datasheet lower bounds (T2-T4) sit
/// between 0.1 us and 0.2 us; one microsecond keeps a margin on hosts where
/// the pin write itself is fast.
const EDGE_HOLD: Duration = Duration::from_micros(1);

/// PD_SCK held high longer than this puts the chip into power-down mode.
const POWER_DOWN_HOLD: Duration = Duration::from_micros(60);

/// Interval between two readiness polls of a blocking wait.
const READY_POLL: Duration = Duration::from_millis(1);

/// Crossover between spinning and sleeping. Below this, a scheduler sleep
/// cannot be trusted to wake anywhere near the requested time, so the delay
/// spins on the monotonic clock instead.
const SPIN_SLEEP_THRESHOLD: Duration = Duration::from_micros(100);

fn precise_delay(duration: Duration) {
    if duration >= SPIN_SLEEP_THRESHOLD {
        thread::sleep(duration);
        return;
    }
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

/// Widens a 24-bit two's-complement pattern into an i32.
fn sign_extend(pattern: u32) -> Value {
    let pattern = (pattern & 0xFF_FFFF) as i32;
    -(pattern & 0x80_0000) + (pattern & 0x7F_FFFF)
}

/// True when `value` sits at either representable extreme of the converter,
/// which marks an out-of-range input or an invalid read.
pub fn is_saturated(value: Value) -> bool {
    value == SATURATION_MIN || value == SATURATION_MAX
}

/// Input multiplexer channel of the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    A,
    B,
}

/// Amplifier gain. Channel A runs at 128 or 64, channel B only at 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gain {
    G128,
    G64,
    G32,
}

/// Ordering of bits within a byte, or of bytes within a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Msb,
    Lsb,
}

/// A validated channel/gain pair. Invalid pairings cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GainConfig {
    channel: Channel,
    gain: Gain,
}

impl GainConfig {
    pub fn new(channel: Channel, gain: Gain) -> Result<Self> {
        match (channel, gain) {
            (Channel::A, Gain::G128) | (Channel::A, Gain::G64) | (Channel::B, Gain::G32) => {
                Ok(Self { channel, gain })
            }
            _ => Err(Error::InvalidArgument("unsupported channel/gain pairing")),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn gain(&self) -> Gain {
        self.gain
    }

    /// Total clock pulses of one conversion period at this gain. The pulse
    /// count is what selects the gain of the next conversion.
    fn pulses(&self) -> u8 {
        match self.gain {
            Gain::G128 => 25,
            Gain::G64 => 26,
            Gain::G32 => 27,
        }
    }
}

impl Default for GainConfig {
    /// Channel A at gain 128, the state the chip falls back to after any
    /// reset or power cycle.
    fn default() -> Self {
        Self {
            channel: Channel::A,
            gain: Gain::G128,
        }
    }
}

/// Lifecycle of the background watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Uninitialized,
    Paused,
    Active,
    Terminated,
}

/// The three pauses that pace the watcher loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoffs {
    /// Pause between readiness polls while the device has no data.
    pub not_ready: Duration,
    /// Pause after a saturated conversion was dropped.
    pub saturated: Duration,
    /// Pause after a publish before polling again.
    pub poll: Duration,
}

impl Default for Backoffs {
    fn default() -> Self {
        Self {
            not_ready: Duration::from_millis(10),
            saturated: Duration::from_millis(100),
            poll: Duration::from_millis(1),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WatchConfig {
    state: WatchState,
    backoffs: Backoffs,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            state: WatchState::Uninitialized,
            backoffs: Backoffs::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Timeouts {
    /// Bounded wait of `get_value`.
    max_wait: Duration,
    /// Readiness deadline of one transaction.
    transaction: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(1),
            transaction: Duration::from_secs(1),
        }
    }
}

/// Single-slot mailbox holding the latest good conversion. Publishes
/// overwrite in place and wake every waiter; there is no history and no
/// per-consumer delivery.
struct SampleSlot {
    inner: Mutex<SlotState>,
    published: Condvar,
}

#[derive(Default)]
struct SlotState {
    value: Value,
    /// Advances on every publish so waiters can tell a publication from a
    /// spurious wakeup.
    generation: u64,
}

impl SampleSlot {
    fn new() -> Self {
        Self {
            inner: Mutex::new(SlotState::default()),
            published: Condvar::new(),
        }
    }

    fn publish(&self, value: Value) {
        let mut state = self.inner.lock().unwrap();
        state.value = value;
        state.generation = state.generation.wrapping_add(1);
        self.published.notify_all();
    }

    /// Blocks until the next publish, up to `timeout`.
    fn wait_next(&self, timeout: Duration) -> Result<Value> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.lock().unwrap();
        let seen = state.generation;
        while state.generation == seen {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout(timeout));
            }
            let (guard, _) = self.published.wait_timeout(state, remaining).unwrap();
            state = guard;
        }
        Ok(state.value)
    }
}

/// Everything that talks on the two lines, guarded by one mutex so bit
/// sequences of concurrent transactions can never interleave.
struct Wire<P> {
    port: P,
    dout: u8,
    pd_sck: u8,
    bit_format: Format,
    byte_format: Format,
    config: GainConfig,
}

impl<P: Port> Wire<P> {
    /// One-shot readiness test: the device pulls DOUT low when a conversion
    /// can be shifted out. Blocking waits poll this externally.
    fn is_ready(&mut self) -> bool {
        !self.port.read_level(self.dout)
    }

    /// Clocks one bit off the data line.
    fn read_bit(&mut self) -> bool {
        self.port.write_level(self.pd_sck, true);
        precise_delay(EDGE_HOLD);
        let bit = self.port.read_level(self.dout);
        precise_delay(EDGE_HOLD);
        self.port.write_level(self.pd_sck, false);
        precise_delay(EDGE_HOLD);
        bit
    }

    fn read_byte(&mut self) -> u8 {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = match self.bit_format {
                Format::Msb => (byte << 1) | self.read_bit() as u8,
                Format::Lsb => (byte >> 1) | ((self.read_bit() as u8) << 7),
            };
        }
        byte
    }

    /// Shifts one full conversion out of the device. The caller must have
    /// seen the device report ready; this does not wait.
    fn read_raw(&mut self) -> Value {
        // DOUT falling to the first PD_SCK rising edge: T1, at least 0.1 us.
        precise_delay(EDGE_HOLD);

        let mut bytes = [0u8; BYTES_PER_CONVERSION];
        for byte in bytes.iter_mut() {
            *byte = self.read_byte();
        }

        // Top the 24 data pulses up to the total that selects the gain of
        // the next conversion.
        let extra = self.config.pulses() - 8 * BYTES_PER_CONVERSION as u8;
        for _ in 0..extra {
            self.read_bit();
        }

        // The device shifts bytes out most-significant-first.
        if self.byte_format == Format::Lsb {
            bytes.swap(0, 2);
        }

        let pattern =
            u32::from(bytes[0]) << 16 | u32::from(bytes[1]) << 8 | u32::from(bytes[2]);
        sign_extend(pattern)
    }
}

struct Shared<P> {
    wire: Mutex<Wire<P>>,
    slot: SampleSlot,
    watch: Mutex<WatchConfig>,
    timeouts: Mutex<Timeouts>,
}

impl<P: Port> Shared<P> {
    fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while !self.wire.lock().unwrap().is_ready() {
            if Instant::now() >= deadline {
                return Err(Error::Timeout(timeout));
            }
            thread::sleep(READY_POLL);
        }
        Ok(())
    }

    /// Drives one transaction as soon as the device reports ready, failing
    /// with [`Error::Timeout`] if that never happens within `timeout`.
    fn wait_and_read(&self, timeout: Duration) -> Result<Value> {
        self.wait_ready(timeout)?;
        Ok(self.wire.lock().unwrap().read_raw())
    }
}

fn watch_loop<P: Port>(shared: Arc<Shared<P>>) {
    info!("acquisition watcher started");
    loop {
        let cfg = *shared.watch.lock().unwrap();
        match cfg.state {
            WatchState::Uninitialized | WatchState::Terminated => break,
            WatchState::Paused => thread::yield_now(),
            WatchState::Active => {
                if !shared.wire.lock().unwrap().is_ready() {
                    thread::sleep(cfg.backoffs.not_ready);
                    continue;
                }
                let value = shared.wire.lock().unwrap().read_raw();
                if is_saturated(value) {
                    debug!("dropped saturated conversion ({value})");
                    thread::sleep(cfg.backoffs.saturated);
                    continue;
                }
                trace!("published {value}");
                shared.slot.publish(value);
                thread::sleep(cfg.backoffs.poll);
            }
        }
    }
    info!("acquisition watcher stopped");
}

/// Wall-clock marks of one conversion cycle, recorded by
/// [`Hx711::probe_timing`] for offline analysis of how the device actually
/// paces its output.
#[derive(Debug, Clone, Copy)]
pub struct CycleTiming {
    /// When the probe started waiting on the device.
    pub wait_start: Instant,
    /// When the device reported a conversion ready.
    pub ready: Instant,
    /// When the transaction finished shifting it out.
    pub transaction_end: Instant,
    /// When the following conversion became ready.
    pub next_ready: Instant,
}

/// Driver for one HX711 wired to a data line (`dout`) and a clock line
/// (`pd_sck`). Construction claims both lines, power-cycles the chip and
/// starts the acquisition watcher; drop stops the watcher and hands the
/// lines back.
pub struct Hx711<P: Port> {
    shared: Arc<Shared<P>>,
    watcher: Option<JoinHandle<()>>,
}

impl<P: Port + Send + 'static> Hx711<P> {
    pub fn new(mut port: P, dout: u8, pd_sck: u8) -> Result<Self> {
        port.claim_input(dout)?;
        if let Err(e) = port.claim_output(pd_sck, false) {
            port.release(dout);
            return Err(e);
        }

        let shared = Arc::new(Shared {
            wire: Mutex::new(Wire {
                port,
                dout,
                pd_sck,
                bit_format: Format::Msb,
                byte_format: Format::Msb,
                config: GainConfig::default(),
            }),
            slot: SampleSlot::new(),
            watch: Mutex::new(WatchConfig::default()),
            timeouts: Mutex::new(Timeouts::default()),
        });

        let mut device = Self {
            shared,
            watcher: None,
        };

        // A power cycle leaves the chip awake in its post-reset state; the
        // chip only adopts a gain after a completed conversion, so one
        // committing transaction follows.
        device.power_down();
        device.power_up()?;
        let default = GainConfig::default();
        device.set_config(default.channel(), default.gain())?;

        device.set_watch_state(WatchState::Active);
        let shared = Arc::clone(&device.shared);
        device.watcher = Some(thread::spawn(move || watch_loop(shared)));

        Ok(device)
    }
}

impl<P: Port> Hx711<P> {
    /// The next sample the watcher publishes, waiting up to the configured
    /// maximum. Concurrent callers each observe the slot independently; a
    /// fast poller may see the same value twice and a slow one may skip
    /// values.
    pub fn get_value(&self) -> Result<Value> {
        let max_wait = self.shared.timeouts.lock().unwrap().max_wait;
        self.shared.slot.wait_next(max_wait)
    }

    /// One-shot, non-blocking readiness test of the data line.
    pub fn is_ready(&self) -> bool {
        self.shared.wire.lock().unwrap().is_ready()
    }

    /// Commits a new channel/gain pair. The device only adopts the pair
    /// after one completed conversion, so a verifying transaction runs
    /// here; if it times out the previous pair is restored and the timeout
    /// re-raised.
    pub fn set_config(&self, channel: Channel, gain: Gain) -> Result<()> {
        let next = GainConfig::new(channel, gain)?;
        let timeout = self.shared.timeouts.lock().unwrap().transaction;
        let previous = {
            let mut wire = self.shared.wire.lock().unwrap();
            mem::replace(&mut wire.config, next)
        };
        match self.shared.wait_and_read(timeout) {
            Ok(_) => {
                info!("committed {:?}/{:?}", channel, gain);
                Ok(())
            }
            Err(e) => {
                self.shared.wire.lock().unwrap().config = previous;
                Err(e)
            }
        }
    }

    /// The active channel/gain pair.
    pub fn config(&self) -> GainConfig {
        self.shared.wire.lock().unwrap().config
    }

    /// Puts the chip into power-down mode. The watcher is paused first so
    /// it stops contending for the wire.
    pub fn power_down(&self) {
        self.set_watch_state(WatchState::Paused);
        let mut wire = self.shared.wire.lock().unwrap();
        let pd_sck = wire.pd_sck;
        wire.port.write_level(pd_sck, false);
        wire.port.write_level(pd_sck, true);
        // The clock stays high from here on; the chip powers down once the
        // hold exceeds 60 us.
        precise_delay(POWER_DOWN_HOLD);
    }

    /// Wakes the chip. Power-down resets it to channel A at gain 128, so a
    /// differing configuration is committed again.
    pub fn power_up(&self) -> Result<()> {
        self.set_watch_state(WatchState::Active);
        {
            let mut wire = self.shared.wire.lock().unwrap();
            let pd_sck = wire.pd_sck;
            wire.port.write_level(pd_sck, false);
        }
        let config = self.config();
        if config != GainConfig::default() {
            self.set_config(config.channel(), config.gain())?;
        }
        Ok(())
    }

    pub fn set_bit_format(&self, format: Format) {
        self.shared.wire.lock().unwrap().bit_format = format;
    }

    pub fn bit_format(&self) -> Format {
        self.shared.wire.lock().unwrap().bit_format
    }

    pub fn set_byte_format(&self, format: Format) {
        self.shared.wire.lock().unwrap().byte_format = format;
    }

    pub fn byte_format(&self) -> Format {
        self.shared.wire.lock().unwrap().byte_format
    }

    pub fn set_backoffs(&self, backoffs: Backoffs) {
        self.shared.watch.lock().unwrap().backoffs = backoffs;
    }

    pub fn backoffs(&self) -> Backoffs {
        self.shared.watch.lock().unwrap().backoffs
    }

    /// Maximum duration a `get_value` call waits for a publication.
    pub fn set_max_wait(&self, max_wait: Duration) {
        self.shared.timeouts.lock().unwrap().max_wait = max_wait;
    }

    pub fn max_wait(&self) -> Duration {
        self.shared.timeouts.lock().unwrap().max_wait
    }

    /// Deadline for the device to report ready within one transaction.
    pub fn set_transaction_timeout(&self, timeout: Duration) {
        self.shared.timeouts.lock().unwrap().transaction = timeout;
    }

    pub fn transaction_timeout(&self) -> Duration {
        self.shared.timeouts.lock().unwrap().transaction
    }

    /// Samples `cycles` consecutive conversions and records when each phase
    /// of the cycle happened. Acquisition is paused for the duration so the
    /// watcher does not steal conversions from the probe, and restored
    /// afterwards.
    pub fn probe_timing(&self, cycles: usize) -> Result<Vec<CycleTiming>> {
        let resumed = {
            let mut watch = self.shared.watch.lock().unwrap();
            mem::replace(&mut watch.state, WatchState::Paused)
        };
        let result = self.probe_cycles(cycles);
        self.shared.watch.lock().unwrap().state = resumed;
        result
    }

    fn probe_cycles(&self, cycles: usize) -> Result<Vec<CycleTiming>> {
        let timeout = self.transaction_timeout();
        let mut records = Vec::with_capacity(cycles);
        for _ in 0..cycles {
            let wait_start = Instant::now();
            self.shared.wait_ready(timeout)?;
            let ready = Instant::now();
            self.shared.wire.lock().unwrap().read_raw();
            let transaction_end = Instant::now();
            self.shared.wait_ready(timeout)?;
            let next_ready = Instant::now();
            records.push(CycleTiming {
                wait_start,
                ready,
                transaction_end,
                next_ready,
            });
        }
        Ok(records)
    }

    fn set_watch_state(&self, state: WatchState) {
        self.shared.watch.lock().unwrap().state = state;
    }
}

impl<P: Port> Drop for Hx711<P> {
    /// Signals the watcher to terminate, waits for it, then hands both
    /// lines back to the chip.
    fn drop(&mut self) {
        self.set_watch_state(WatchState::Terminated);
        if let Some(handle) = self.watcher.take() {
            let _ = handle.join();
        }
        let mut wire = self.shared.wire.lock().unwrap();
        let (dout, pd_sck) = (wire.dout, wire.pd_sck);
        wire.port.release(dout);
        wire.port.release(pd_sck);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    const DOUT: u8 = 5;
    const PD_SCK: u8 = 6;

    #[derive(Default)]
    struct MockState {
        /// 24-bit patterns waiting to be shifted out, oldest first.
        queue: VecDeque<u32>,
        /// Rising edges seen in the current transaction.
        edges: u8,
        clock: bool,
        rose_at: Option<Instant>,
        /// Pulse count of every finished transaction.
        completed: Vec<u8>,
        power_cycles: usize,
    }

    /// Scripted stand-in for the chip: presents queued patterns on the data
    /// line MSB-first as the clock edges arrive, reports readiness from its
    /// queue and detects power cycles by timing the clock-high hold.
    #[derive(Clone, Default)]
    struct MockPort(Arc<Mutex<MockState>>);

    impl MockPort {
        fn with_samples(samples: &[u32]) -> Self {
            let port = Self::default();
            port.0.lock().unwrap().queue.extend(samples.iter().copied());
            port
        }

        fn push(&self, sample: u32) {
            self.0.lock().unwrap().queue.push_back(sample);
        }

        fn completed(&self) -> Vec<u8> {
            self.0.lock().unwrap().completed.clone()
        }

        fn power_cycles(&self) -> usize {
            self.0.lock().unwrap().power_cycles
        }
    }

    impl Port for MockPort {
        fn claim_input(&mut self, _pin: u8) -> Result<()> {
            Ok(())
        }

        fn claim_output(&mut self, _pin: u8, _high: bool) -> Result<()> {
            Ok(())
        }

        fn read_level(&mut self, pin: u8) -> bool {
            assert_eq!(pin, DOUT);
            let mut state = self.0.lock().unwrap();
            if state.clock {
                // Mid-transaction: the bit selected by the latest rising
                // edge, MSB first. Pulses past the 24th carry no data.
                let edge = state.edges;
                match state.queue.front() {
                    Some(&sample) if (1..=24).contains(&edge) => {
                        sample >> (24 - edge) & 1 == 1
                    }
                    _ => false,
                }
            } else {
                // Readiness probe; a finished transaction is settled here
                // before answering.
                if state.edges > 0 {
                    let edges = state.edges;
                    state.completed.push(edges);
                    state.queue.pop_front();
                    state.edges = 0;
                }
                // DOUT low (false) signals ready.
                state.queue.is_empty()
            }
        }

        fn write_level(&mut self, pin: u8, high: bool) {
            assert_eq!(pin, PD_SCK);
            let mut state = self.0.lock().unwrap();
            if high && !state.clock {
                state.edges += 1;
                state.rose_at = Some(Instant::now());
            }
            if !high && state.clock {
                if let Some(rose_at) = state.rose_at.take() {
                    if rose_at.elapsed() >= POWER_DOWN_HOLD {
                        // A long high hold resets the chip; the aborted
                        // transaction leaves no trace.
                        state.edges = 0;
                        state.power_cycles += 1;
                    }
                }
            }
            state.clock = high;
        }

        fn release(&mut self, _pin: u8) {}
    }

    fn wire(port: MockPort) -> Wire<MockPort> {
        Wire {
            port,
            dout: DOUT,
            pd_sck: PD_SCK,
            bit_format: Format::Msb,
            byte_format: Format::Msb,
            config: GainConfig::default(),
        }
    }

    fn device(port: MockPort) -> Hx711<MockPort> {
        Hx711::new(port, DOUT, PD_SCK).unwrap()
    }

    /// Parks the watcher and lets any iteration that already read the
    /// active state drain before the test touches the wire.
    fn quiesce(dev: &Hx711<MockPort>) {
        dev.set_watch_state(WatchState::Paused);
        thread::sleep(Duration::from_millis(20));
    }

    #[test]
    fn sign_extension_matches_twos_complement() {
        assert_eq!(sign_extend(0x00_0000), 0);
        assert_eq!(sign_extend(0x7F_FFFF), 8_388_607);
        assert_eq!(sign_extend(0x80_0000), -8_388_608);
        assert_eq!(sign_extend(0xFF_FFFF), -1);
    }

    #[test]
    fn saturation_is_exactly_the_two_rails() {
        assert!(is_saturated(SATURATION_MIN));
        assert!(is_saturated(SATURATION_MAX));
        assert!(!is_saturated(SATURATION_MIN + 1));
        assert!(!is_saturated(SATURATION_MAX - 1));
        assert!(!is_saturated(0));
    }

    #[test]
    fn channel_gain_pairing_is_validated() {
        assert!(GainConfig::new(Channel::A, Gain::G128).is_ok());
        assert!(GainConfig::new(Channel::A, Gain::G64).is_ok());
        assert!(GainConfig::new(Channel::B, Gain::G32).is_ok());
        assert!(GainConfig::new(Channel::A, Gain::G32).is_err());
        assert!(GainConfig::new(Channel::B, Gain::G64).is_err());
        assert!(GainConfig::new(Channel::B, Gain::G128).is_err());
    }

    #[test]
    fn transaction_shifts_out_a_conversion_msb_first() {
        let port = MockPort::with_samples(&[0x2A_2A2A]);
        let mut wire = wire(port.clone());
        assert!(wire.is_ready());
        assert_eq!(wire.read_raw(), 0x2A_2A2A);
        assert!(!wire.is_ready());
        assert_eq!(port.completed(), vec![25]);
    }

    #[test]
    fn negative_conversions_sign_extend_on_the_wire() {
        let port = MockPort::with_samples(&[0xFF_FFFE]);
        let mut wire = wire(port);
        assert_eq!(wire.read_raw(), -2);
    }

    #[test]
    fn lsb_bit_format_reverses_each_byte() {
        let port = MockPort::with_samples(&[0x2A_2A2A]);
        let mut wire = wire(port);
        wire.bit_format = Format::Lsb;
        // 0x2A reversed bitwise is 0x54.
        assert_eq!(wire.read_raw(), 0x54_5454);
    }

    #[test]
    fn lsb_byte_format_swaps_the_outer_bytes() {
        let port = MockPort::with_samples(&[0x01_0203]);
        let mut wire = wire(port);
        wire.byte_format = Format::Lsb;
        assert_eq!(wire.read_raw(), 0x03_0201);
    }

    #[test]
    fn pulse_count_follows_the_gain() {
        let port = MockPort::with_samples(&[0, 0, 0]);
        let mut wire = wire(port.clone());
        wire.read_raw();
        wire.is_ready();
        wire.config = GainConfig::new(Channel::A, Gain::G64).unwrap();
        wire.read_raw();
        wire.is_ready();
        wire.config = GainConfig::new(Channel::B, Gain::G32).unwrap();
        wire.read_raw();
        wire.is_ready();
        assert_eq!(port.completed(), vec![25, 26, 27]);
    }

    #[test]
    fn initialization_power_cycles_and_commits_the_default() {
        let port = MockPort::with_samples(&[0]);
        let dev = device(port.clone());
        assert_eq!(port.power_cycles(), 1);
        assert_eq!(dev.config(), GainConfig::default());
    }

    #[test]
    fn watcher_publishes_valid_samples() {
        let port = MockPort::with_samples(&[0]);
        let dev = device(port.clone());
        for _ in 0..10 {
            port.push(0x00_0100);
        }
        assert_eq!(dev.get_value().unwrap(), 256);
    }

    #[test]
    fn get_value_times_out_without_a_publication() {
        let port = MockPort::with_samples(&[0]);
        let dev = device(port);
        dev.set_max_wait(Duration::from_millis(50));
        assert!(matches!(dev.get_value(), Err(Error::Timeout(_))));
    }

    #[test]
    fn saturated_conversions_are_never_published() {
        let port = MockPort::with_samples(&[0]);
        let dev = device(port.clone());
        port.push(0x7F_FFFF);
        for _ in 0..10 {
            port.push(0x00_002A);
        }
        assert_eq!(dev.get_value().unwrap(), 42);
    }

    #[test]
    fn set_config_drives_the_committing_pulse_count() {
        let port = MockPort::with_samples(&[0]);
        let dev = device(port.clone());
        quiesce(&dev);
        port.push(0);
        dev.set_config(Channel::A, Gain::G64).unwrap();
        assert_eq!(dev.config().gain(), Gain::G64);
        port.push(0);
        dev.set_config(Channel::B, Gain::G32).unwrap();
        // Settle the last transaction.
        dev.is_ready();
        assert_eq!(port.completed(), vec![25, 26, 27]);
    }

    #[test]
    fn failed_config_commit_rolls_back_channel_and_gain() {
        let port = MockPort::with_samples(&[0]);
        let dev = device(port);
        quiesce(&dev);
        dev.set_transaction_timeout(Duration::from_millis(50));
        // Queue exhausted: the device never reports ready again.
        let err = dev.set_config(Channel::A, Gain::G64).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(dev.config(), GainConfig::default());
    }

    #[test]
    fn invalid_pairing_is_rejected_before_touching_the_wire() {
        let port = MockPort::with_samples(&[0]);
        let dev = device(port.clone());
        quiesce(&dev);
        let before = port.completed().len();
        assert!(matches!(
            dev.set_config(Channel::B, Gain::G128),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(dev.config(), GainConfig::default());
        assert_eq!(port.completed().len(), before);
    }

    #[test]
    fn power_cycle_holds_the_clock_past_the_threshold() {
        let port = MockPort::with_samples(&[0]);
        let dev = device(port.clone());
        dev.power_down();
        dev.power_up().unwrap();
        assert_eq!(port.power_cycles(), 2);
    }

    #[test]
    fn power_up_recommits_a_non_default_gain() {
        let port = MockPort::with_samples(&[0]);
        let dev = device(port.clone());
        quiesce(&dev);
        port.push(0);
        dev.set_config(Channel::A, Gain::G64).unwrap();
        dev.power_down();
        for _ in 0..20 {
            port.push(0);
        }
        dev.power_up().unwrap();
        assert_eq!(dev.config().gain(), Gain::G64);
        assert_eq!(port.power_cycles(), 2);
    }

    #[test]
    fn timing_probe_records_each_phase_in_order() {
        let port = MockPort::with_samples(&[0]);
        let dev = device(port.clone());
        for _ in 0..8 {
            port.push(0);
        }
        let cycles = dev.probe_timing(2).unwrap();
        assert_eq!(cycles.len(), 2);
        for cycle in &cycles {
            assert!(cycle.wait_start <= cycle.ready);
            assert!(cycle.ready <= cycle.transaction_end);
            assert!(cycle.transaction_end <= cycle.next_ready);
        }
    }
}
