//! The flashing engine: a single-threaded, cooperative hierarchical state
//! machine driven entirely by the closed [`Event`] set. No state handler
//! blocks; every wait is expressed as "arm a timeout, return".

pub mod bootloader;
pub mod reset;
pub mod v1;
pub mod v3;

use crate::codec::FramedDecoder;
use crate::device::DeviceKind;
use crate::gcf::GcfFile;
use crate::platform::Platform;

/// What the user asked the engine to do; selected once at startup and
/// immutable for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Reset,
    Program,
    Connect,
    ListDevices,
}

/// Top-level state. `Reset` and the V1/V3 programmers carry their own
/// substates, tracked in [`Engine::substate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateId {
    Init,
    Reset,
    Program,
    BootloaderConnect,
    BootloaderQuery,
    V1ProgramSync,
    V1ProgramWriteHeader,
    V1ProgramUpload,
    V1ProgramValidate,
    V3ProgramSyncDelay,
    V3ProgramSync,
    V3ProgramUpload,
    Connect,
    Connected,
    ListDevices,
    Done,
}

/// Substates of [`StateId::Reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubState {
    Void,
    UartReset,
    FtdiReset,
    GpioReset,
    Settle,
}

/// How a run concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    DeadlineExceeded,
    Failed(String),
}

/// The closed event set driving the engine.
#[derive(Debug, Clone)]
pub enum Event {
    PlatformStarted,
    Timeout,
    /// Synthetic "you just entered this state" event, posted by a
    /// transition to let the new state run its entry logic synchronously.
    Action,
    Disconnected,
    /// A byte (or run of bytes) was appended to the ASCII scratch buffer.
    RxAscii,
    /// The application firmware acknowledged an in-band UART reset command.
    PkgUartReset,
    /// A complete, CRC-valid framed bootloader packet, magic byte included.
    RxBtlPacket(Vec<u8>),
}

/// Bound on the ASCII scratch buffer; on overflow it is reset rather than
/// grown, per the engine's fixed-footprint design.
const ASCII_BUF_CAP: usize = 512;

/// Maximum consecutive 10ms sync-wait extensions before giving up on a
/// V1 bootloader that keeps sending partial, non-matching ASCII.
pub(crate) const V1_SYNC_MAX_EXTENSIONS: u32 = 50;

pub struct Engine<P: Platform> {
    platform: P,
    task: Task,
    state: StateId,
    substate: SubState,
    device_path: String,
    device_kind: DeviceKind,
    file: Option<GcfFile>,
    ascii_buf: Vec<u8>,
    codec: FramedDecoder,
    start_time_ms: u64,
    max_time_ms: u64,
    retry_count: u32,
    v1_sync_extensions: u32,
    outcome: Option<RunOutcome>,
    /// A configured reset mechanism to try before the normal fallback
    /// sequence, consulted only on the very first attempt; any retry after
    /// that runs the full `UartReset`-first sequence.
    preferred_reset: Option<SubState>,
    reset_hint_used: bool,
}

impl<P: Platform> Engine<P> {
    pub fn new(
        platform: P,
        task: Task,
        device_path: String,
        file: Option<GcfFile>,
        max_time_secs: u64,
        preferred_reset: Option<SubState>,
    ) -> Self {
        let device_kind = DeviceKind::from_path(&device_path);
        let device_kind = match &file {
            Some(f) => device_kind.refine_with_fw_version(f.fw_version()),
            None => device_kind,
        };
        let start_time_ms = platform.time_ms();
        Self {
            max_time_ms: start_time_ms + max_time_secs * 1000,
            platform,
            task,
            state: StateId::Init,
            substate: SubState::Void,
            device_path,
            device_kind,
            file,
            ascii_buf: Vec::with_capacity(ASCII_BUF_CAP),
            codec: FramedDecoder::new(),
            start_time_ms,
            retry_count: 0,
            v1_sync_extensions: 0,
            outcome: None,
            preferred_reset,
            reset_hint_used: false,
        }
    }

    pub fn start(&mut self) {
        self.handle_event(Event::PlatformStarted);
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Feeds raw RX bytes to the engine. Mirrors into the ASCII buffer while
    /// in an ASCII-consuming state, and always feeds the framed codec; both
    /// dispatch paths are live simultaneously.
    pub fn on_bytes_received(&mut self, bytes: &[u8]) {
        if self.state.consumes_ascii() {
            for &byte in bytes {
                if self.ascii_buf.len() >= ASCII_BUF_CAP {
                    log::debug!("ascii buffer overflow, resetting");
                    self.ascii_buf.clear();
                }
                self.ascii_buf.push(byte);
            }
            self.handle_event(Event::RxAscii);
        }

        let mut packets = Vec::new();
        self.codec.push(bytes, |p| packets.push(p.to_vec()));
        for packet in packets {
            // The running application firmware acknowledges an in-band reset
            // with its own framed packet (magic 0x0B), distinct from the
            // bootloader's 0x81-magic protocol; both travel over the same
            // flag-delimited, CRC16-checked wire framing.
            if is_uart_reset_ack(&packet) {
                self.handle_event(Event::PkgUartReset);
            } else {
                self.handle_event(Event::RxBtlPacket(packet));
            }
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match self.state {
            StateId::Init => self.handle_init(event),
            StateId::Reset => reset::handle(self, event),
            StateId::Program => self.handle_program(event),
            StateId::BootloaderConnect | StateId::BootloaderQuery => bootloader::handle(self, event),
            StateId::V1ProgramSync
            | StateId::V1ProgramWriteHeader
            | StateId::V1ProgramUpload
            | StateId::V1ProgramValidate => v1::handle(self, event),
            StateId::V3ProgramSyncDelay | StateId::V3ProgramSync | StateId::V3ProgramUpload => {
                v3::handle(self, event)
            }
            StateId::Connect | StateId::Connected => self.handle_connect(event),
            StateId::ListDevices => self.handle_list(event),
            StateId::Done => {}
        }
    }

    fn handle_init(&mut self, event: Event) {
        match event {
            Event::PlatformStarted | Event::Timeout => {
                self.ascii_buf.clear();
                self.retry_count = 0;
                self.v1_sync_extensions = 0;
                self.state = match self.task {
                    Task::Reset | Task::Program => StateId::Reset,
                    Task::Connect => StateId::Connect,
                    Task::ListDevices => StateId::ListDevices,
                };
                self.substate = if !self.reset_hint_used {
                    self.reset_hint_used = true;
                    self.preferred_reset.unwrap_or(SubState::UartReset)
                } else {
                    SubState::UartReset
                };
                self.handle_event(Event::Action);
            }
            _ => {}
        }
    }

    fn handle_program(&mut self, event: Event) {
        if let Event::Action = event {
            self.state = StateId::BootloaderConnect;
            self.handle_event(Event::Action);
        }
    }

    fn handle_connect(&mut self, event: Event) {
        match (self.state, event) {
            (StateId::Connect, Event::Action) | (StateId::Connect, Event::Timeout) => {
                match self.platform.connect(&self.device_path) {
                    Ok(()) => {
                        self.state = StateId::Connected;
                        log::info!("connected to {}", self.device_path);
                    }
                    Err(_) => self.platform.set_timeout(500),
                }
            }
            (StateId::Connected, Event::RxAscii) => {
                log::info!("rx ascii: {} bytes buffered", self.ascii_buf.len());
            }
            (StateId::Connected, Event::RxBtlPacket(pkt)) => {
                log::info!("rx packet: {} bytes", pkt.len());
            }
            (StateId::Connected, Event::Disconnected) => self.finish(RunOutcome::Completed),
            _ => {}
        }
    }

    fn handle_list(&mut self, event: Event) {
        if let Event::Action = event {
            for device in self.platform.enumerate_devices() {
                log::info!("{}  {}", device.path, device.name);
            }
            self.finish(RunOutcome::Completed);
        }
    }

    /// Restarts the whole pipeline from `Init` if the deadline has not
    /// passed, else requests shutdown. Never extends `max_time_ms`.
    pub(crate) fn retry(&mut self) {
        if self.platform.time_ms() < self.max_time_ms {
            self.platform.disconnect();
            self.state = StateId::Init;
            self.substate = SubState::Void;
            self.platform.set_timeout(250);
        } else {
            self.finish(RunOutcome::DeadlineExceeded);
        }
    }

    pub(crate) fn finish(&mut self, outcome: RunOutcome) {
        self.platform.clear_timeout();
        self.state = StateId::Done;
        self.outcome = Some(outcome);
    }

    pub(crate) fn platform(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Gives the run loop driving this engine direct access to the
    /// transport, to poll for incoming bytes and expired timers.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub(crate) fn task(&self) -> Task {
        self.task
    }

    pub(crate) fn device_path(&self) -> &str {
        &self.device_path
    }

    pub(crate) fn device_kind(&self) -> DeviceKind {
        self.device_kind
    }

    pub(crate) fn file(&self) -> &GcfFile {
        self.file
            .as_ref()
            .expect("programming states are only reachable when a file was loaded")
    }

    pub(crate) fn ascii_buf(&self) -> &[u8] {
        &self.ascii_buf
    }

    pub(crate) fn clear_ascii(&mut self) {
        self.ascii_buf.clear();
    }

    pub(crate) fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub(crate) fn set_retry_count(&mut self, count: u32) {
        self.retry_count = count;
    }

    pub(crate) fn v1_sync_extensions(&self) -> u32 {
        self.v1_sync_extensions
    }

    pub(crate) fn set_v1_sync_extensions(&mut self, count: u32) {
        self.v1_sync_extensions = count;
    }
}

impl StateId {
    fn consumes_ascii(self) -> bool {
        matches!(
            self,
            StateId::BootloaderQuery
                | StateId::V1ProgramSync
                | StateId::V1ProgramWriteHeader
                | StateId::V1ProgramUpload
                | StateId::V1ProgramValidate
        )
    }
}

pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

pub(crate) use contains as ascii_contains;

/// The running application firmware's in-band reset acknowledgement uses a
/// distinct packet (magic `0x0B`, ack byte at offset 7) within the same
/// flag-delimited, CRC16-checked wire framing as the bootloader protocol, so
/// this classifies an already-decoded packet rather than raw wire bytes.
fn is_uart_reset_ack(bytes: &[u8]) -> bool {
    bytes.len() >= 8 && bytes[0] == 0x0B && bytes[7] == 0x26
}
