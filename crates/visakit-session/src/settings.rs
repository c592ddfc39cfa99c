use serde::{Deserialize, Serialize};

/// Session-specific configuration, copied into the session at construction.
/// Never shared between sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Channel timeout in milliseconds for all blocking I/O.
    pub visa_timeout_ms: u32,

    /// Timeout budget in milliseconds for operation-complete-synchronized
    /// commands.
    pub opc_timeout_ms: u32,

    /// Termination character for reading. Default is LF.
    pub term_char: u8,

    /// If true, each read must end with the termination character; a short
    /// read that does not gets one corrective follow-up.
    /// If false (default), a read can end on any byte.
    pub assure_response_end_with_tc: bool,

    /// Maximum read/write segment size when talking to the instrument.
    pub io_segment_size: usize,

    /// If > 0, status-byte polling temporarily drops the channel timeout to
    /// this value to avoid long waits on slow instruments.
    pub read_stb_timeout_ms: i32,

    /// Delay in milliseconds before each write.
    pub write_delay_ms: u64,

    /// Delay in milliseconds before each read.
    pub read_delay_ms: u64,

    /// Starting VXI capability; coerced to false for session kinds that
    /// cannot do VXI-style transfers.
    pub vxi_capable: bool,

    /// If true, `*STB?` queries are suppressed and report an empty status
    /// byte without touching the transport.
    pub disable_stb_query: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            visa_timeout_ms: 10_000,
            opc_timeout_ms: 30_000,
            term_char: b'\n',
            assure_response_end_with_tc: false,
            io_segment_size: 10_000_000,
            read_stb_timeout_ms: -1,
            write_delay_ms: 0,
            read_delay_ms: 0,
            vxi_capable: false,
            disable_stb_query: false,
        }
    }
}
