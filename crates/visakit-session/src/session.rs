use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};
use visakit_frame::{read_bounded, read_unbounded, trim_term_chars, ReadOptions};
use visakit_transport::{Attr, AttrValue, Transport, TransportError};

use crate::error::{Result, SessionError};
use crate::events::SrqDispatcher;
use crate::kind::SessionKind;
use crate::lock;
use crate::manager::ResourceManager;
use crate::settings::Settings;

/// Fixed capacity of the per-session receive working buffer.
pub const WORKING_BUFFER_SIZE: usize = 1_000_000;

/// Upper bound on one error-queue drain, against instruments that never
/// report "no error".
pub const MAX_ERROR_QUEUE_DRAIN: usize = 50;

/// Probe size for the first segment of an unknown-length read.
const FIRST_READ_LEN: usize = 1024;

/// Segment size for the bulk phase of an unknown-length read.
const NEXT_READ_CHUNK_LEN: usize = 65_536;

/// Mutable per-session configuration, mirrored from [`Settings`] and the
/// kind-specific defaults applied at construction.
pub(crate) struct SessionConfig {
    pub term_char: u8,
    pub term_char_enabled: bool,
    pub assure_end: bool,
    pub io_segment_size: usize,
    pub opc_timeout_ms: u32,
    pub read_stb_timeout_ms: i32,
    pub write_delay_ms: u64,
    pub read_delay_ms: u64,
    pub vxi_capable: bool,
    pub disable_stb_query: bool,
}

/// The stable, long-lived handle applications hold for one instrument.
///
/// Owns exactly one transport channel. All calls block on the caller's
/// thread; concurrent reads from multiple threads serialize on the working
/// buffer, writes only on the channel itself. Closing is idempotent.
pub struct Session {
    pub(crate) resource: String,
    pub(crate) kind: SessionKind,
    pub(crate) transport: Arc<Mutex<Box<dyn Transport>>>,
    pub(crate) read_buffer: Mutex<Vec<u8>>,
    pub(crate) cached_timeout_ms: Mutex<Option<u32>>,
    pub(crate) config: Mutex<SessionConfig>,
    pub(crate) srq: Arc<SrqDispatcher>,
    pub(crate) closed: AtomicBool,
}

impl Session {
    /// Open a session against `resource` through the manager's backend.
    ///
    /// Classifies the session kind once, applies kind-specific defaults and
    /// the given settings, then issues the device reset sequence (clear +
    /// `*CLS`). If anything fails after the channel opened, the channel is
    /// closed before the error propagates.
    pub fn open(manager: &ResourceManager, resource: &str, settings: Settings) -> Result<Session> {
        if settings.visa_timeout_ms < 1 {
            return Err(SessionError::failure(
                resource,
                "open session",
                "timeout must be at least 1 ms",
            ));
        }
        if settings.opc_timeout_ms < 1 {
            return Err(SessionError::failure(
                resource,
                "open session",
                "OPC timeout must be at least 1 ms",
            ));
        }

        let mut transport = manager
            .backend()
            .open(resource)
            .map_err(|err| SessionError::from_transport(resource, "open session", err))?;

        let configured = Self::configure(transport.as_mut(), resource, &settings);
        let (kind, vxi_capable, term_char_enabled) = match configured {
            Ok(v) => v,
            Err(err) => {
                let _ = transport.close();
                return Err(err);
            }
        };

        info!(resource, %kind, "opened instrument session");

        Ok(Session {
            resource: resource.to_string(),
            kind,
            transport: Arc::new(Mutex::new(transport)),
            read_buffer: Mutex::new(vec![0u8; WORKING_BUFFER_SIZE]),
            cached_timeout_ms: Mutex::new(Some(settings.visa_timeout_ms)),
            config: Mutex::new(SessionConfig {
                term_char: settings.term_char,
                term_char_enabled,
                assure_end: settings.assure_response_end_with_tc,
                io_segment_size: settings.io_segment_size,
                opc_timeout_ms: settings.opc_timeout_ms,
                read_stb_timeout_ms: settings.read_stb_timeout_ms,
                write_delay_ms: settings.write_delay_ms,
                read_delay_ms: settings.read_delay_ms,
                vxi_capable,
                disable_stb_query: settings.disable_stb_query,
            }),
            srq: Arc::new(SrqDispatcher::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Kind detection and per-kind defaults; runs exactly once, before the
    /// transport is shared.
    fn configure(
        transport: &mut dyn Transport,
        resource: &str,
        settings: &Settings,
    ) -> Result<(SessionKind, bool, bool)> {
        let interface_type = Self::transport_attr_int(transport, resource, Attr::InterfaceType)?;
        let resource_class =
            Self::transport_attr_str(transport, resource, Attr::ResourceClass)?;

        // Best-effort capability probe: a backend without the attribute is
        // simply not HiSLIP.
        let is_hislip = if SessionKind::is_tcpip(interface_type) && resource_class != "SOCKET" {
            match transport.get_attribute(Attr::TcpipIsHislip) {
                Ok(value) => value.as_int() == Some(1),
                Err(TransportError::UnsupportedAttribute { .. }) => false,
                Err(err) => {
                    return Err(SessionError::from_transport(resource, "probe hislip", err))
                }
            }
        } else {
            false
        };

        let kind = SessionKind::classify(interface_type, &resource_class, is_hislip);
        debug!(resource, %kind, interface_type, resource_class = %resource_class, "classified session");

        let mut vxi_capable = settings.vxi_capable;
        let mut term_char_enabled = false;
        match kind {
            SessionKind::Serial => {
                Self::transport_set_int(
                    transport,
                    resource,
                    Attr::TermChar,
                    u32::from(settings.term_char),
                )?;
                Self::transport_set_int(transport, resource, Attr::TermCharEnabled, 1)?;
                Self::transport_set_int(transport, resource, Attr::SerialEndIn, 0)?;
                Self::transport_set_int(transport, resource, Attr::SerialEndOut, 0)?;
                vxi_capable = false;
                term_char_enabled = true;
            }
            SessionKind::Socket => {
                Self::transport_set_int(
                    transport,
                    resource,
                    Attr::TermChar,
                    u32::from(settings.term_char),
                )?;
                Self::transport_set_int(transport, resource, Attr::TermCharEnabled, 1)?;
                vxi_capable = false;
                term_char_enabled = true;
            }
            _ => {}
        }

        Self::transport_set_int(
            transport,
            resource,
            Attr::TimeoutValue,
            settings.visa_timeout_ms,
        )?;

        transport
            .clear()
            .map_err(|err| SessionError::from_transport(resource, "device clear", err))?;
        transport
            .send(b"*CLS")
            .map_err(|err| SessionError::from_transport(resource, "write", err))?;

        Ok((kind, vxi_capable, term_char_enabled))
    }

    /// The resource name this session was opened against.
    pub fn resource_name(&self) -> &str {
        &self.resource
    }

    /// The session kind derived at construction.
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Write text to the instrument. No terminator is appended; the caller
    /// supplies whatever the device protocol expects.
    pub fn write(&self, text: &str) -> Result<()> {
        self.write_bytes(text.as_bytes())
    }

    /// Write a binary buffer to the instrument.
    pub fn write_bytes(&self, data: &[u8]) -> Result<()> {
        self.ensure_open("write")?;
        let delay = lock(&self.config).write_delay_ms;
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }
        let mut transport = lock(&self.transport);
        transport
            .send(data)
            .map_err(|err| SessionError::from_transport(&self.resource, "write", err))?;
        Ok(())
    }

    /// Read up to `max_len` bytes. Returns the bytes and whether more
    /// response data is pending. `max_len` must fit the session's working
    /// buffer; an oversized request is rejected before any transport call.
    pub fn read(&self, max_len: usize, assure_end: bool) -> Result<(Vec<u8>, bool)> {
        self.ensure_open("read")?;
        let (term_char, delay) = {
            let config = lock(&self.config);
            (config.term_char, config.read_delay_ms)
        };
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }

        let mut buffer = lock(&self.read_buffer);
        if max_len > buffer.len() {
            return Err(SessionError::failure(
                &self.resource,
                "read",
                format!(
                    "attempting to read with maximum count bigger than the working buffer \
                     size: {max_len} > {}",
                    buffer.len()
                ),
            ));
        }

        let opts = ReadOptions {
            term_char,
            assure_end,
        };
        let mut transport = lock(&self.transport);
        let read = read_bounded(&mut **transport, &mut buffer[..max_len], &opts)
            .map_err(|err| SessionError::from_frame(&self.resource, "read", err))?;

        Ok((buffer[..read.count].to_vec(), read.more_available))
    }

    /// Read up to `max_len` bytes decoded as text.
    pub fn read_string(&self, max_len: usize, assure_end: bool) -> Result<(String, bool)> {
        let (bytes, more_available) = self.read(max_len, assure_end)?;
        Ok((
            String::from_utf8_lossy(&bytes).into_owned(),
            more_available,
        ))
    }

    /// Read a response of unknown length as text, with all trailing
    /// termination characters stripped.
    pub fn read_string_unknown_length(&self) -> Result<String> {
        let term_char = lock(&self.config).term_char;
        let bytes = self.read_unknown_length(false, "read")?;
        let trimmed = trim_term_chars(&bytes, term_char);
        Ok(String::from_utf8_lossy(trimmed).into_owned())
    }

    /// Read a binary response of unknown length.
    ///
    /// Stream-oriented kinds cannot do this while termination-on-read is
    /// enabled: the terminator may occur inside the binary data.
    pub fn read_bytes_unknown_length(&self) -> Result<Vec<u8>> {
        self.read_unknown_length(true, "read binary")
    }

    fn read_unknown_length(&self, binary: bool, operation: &'static str) -> Result<Vec<u8>> {
        self.ensure_open(operation)?;
        let (opts, first_len, next_len, delay, guard_violated) = {
            let config = lock(&self.config);
            (
                ReadOptions {
                    term_char: config.term_char,
                    assure_end: config.assure_end,
                },
                config.io_segment_size.min(FIRST_READ_LEN),
                config.io_segment_size.min(NEXT_READ_CHUNK_LEN),
                config.read_delay_ms,
                binary && !config.vxi_capable && config.term_char_enabled,
            )
        };
        if guard_violated {
            return Err(SessionError::failure(
                &self.resource,
                operation,
                format!(
                    "{} interface does not support reading binary data of unknown length",
                    self.kind
                ),
            ));
        }
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }

        let mut buffer = lock(&self.read_buffer);
        let mut transport = lock(&self.transport);
        let message = read_unbounded(
            &mut **transport,
            buffer.as_mut_slice(),
            first_len,
            next_len,
            &opts,
        )
            .map_err(|err| SessionError::from_frame(&self.resource, operation, err))?;
        Ok(message.to_vec())
    }

    /// Write `cmd`, then read the complete response.
    pub fn query(&self, cmd: &str) -> Result<String> {
        self.write(cmd)?;
        self.read_string_unknown_length()
    }

    /// Bounded query for responses that must stay short. Fails when the
    /// response would exceed `limit` bytes instead of silently truncating.
    pub fn query_short(&self, cmd: &str, limit: usize) -> Result<String> {
        self.write(cmd)?;
        let assure_end = lock(&self.config).assure_end;
        let (text, more_available) = self.read_string(limit, assure_end)?;
        if more_available {
            return Err(SessionError::failure(
                &self.resource,
                "query short",
                format!("more than {limit} bytes of data was returned for '{cmd}'"),
            ));
        }
        Ok(text)
    }

    /// One `SYST:ERR?` round trip. Returns `None` when the instrument
    /// reports "no error" (a leading `0,` or `+0,`), else the raw error text.
    pub fn query_system_error(&self) -> Result<Option<String>> {
        self.write("SYST:ERR?")?;
        let response = self.read_string_unknown_length()?;
        if response.starts_with("0,") || response.starts_with("+0,") {
            Ok(None)
        } else {
            Ok(Some(response))
        }
    }

    /// Drain the instrument's error queue, up to [`MAX_ERROR_QUEUE_DRAIN`]
    /// entries.
    pub fn query_system_error_all(&self) -> Result<Vec<String>> {
        let mut errors = Vec::new();
        for _ in 0..MAX_ERROR_QUEUE_DRAIN {
            match self.query_system_error()? {
                Some(error) if !error.is_empty() => errors.push(error),
                _ => break,
            }
        }
        Ok(errors)
    }

    /// Channel timeout in milliseconds. Fetched from the transport on first
    /// access, cached thereafter.
    pub fn timeout(&self) -> Result<u32> {
        if let Some(cached) = *lock(&self.cached_timeout_ms) {
            return Ok(cached);
        }
        let value = self.attr_int(Attr::TimeoutValue, "get timeout")?;
        *lock(&self.cached_timeout_ms) = Some(value);
        Ok(value)
    }

    /// Set the channel timeout. A write equal to the cached value is
    /// skipped; values below 1 ms are rejected before any transport call.
    pub fn set_timeout(&self, timeout_ms: u32) -> Result<()> {
        if timeout_ms < 1 {
            return Err(SessionError::failure(
                &self.resource,
                "set timeout",
                "timeout must be at least 1 ms",
            ));
        }
        let cached = *lock(&self.cached_timeout_ms);
        if cached != Some(timeout_ms) {
            self.set_attr_int(Attr::TimeoutValue, timeout_ms, "set timeout")?;
        }
        *lock(&self.cached_timeout_ms) = Some(timeout_ms);
        Ok(())
    }

    /// Maximum read/write segment size.
    pub fn io_segment_size(&self) -> usize {
        lock(&self.config).io_segment_size
    }

    /// Set the maximum read/write segment size. Zero is rejected.
    pub fn set_io_segment_size(&self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(SessionError::failure(
                &self.resource,
                "set segment size",
                "segment size must be at least 1 byte",
            ));
        }
        lock(&self.config).io_segment_size = size;
        Ok(())
    }

    /// Whether every read must end with the termination character.
    pub fn assure_response_end_with_tc(&self) -> bool {
        lock(&self.config).assure_end
    }

    /// Timeout budget for operation-complete-synchronized commands.
    pub fn opc_timeout(&self) -> u32 {
        lock(&self.config).opc_timeout_ms
    }

    /// Set the OPC timeout budget. Values below 1 ms are rejected.
    pub fn set_opc_timeout(&self, timeout_ms: u32) -> Result<()> {
        if timeout_ms < 1 {
            return Err(SessionError::failure(
                &self.resource,
                "set OPC timeout",
                "OPC timeout must be at least 1 ms",
            ));
        }
        lock(&self.config).opc_timeout_ms = timeout_ms;
        Ok(())
    }

    /// The termination character, as the transport reports it.
    pub fn term_char(&self) -> Result<u8> {
        let value = self.attr_int(Attr::TermChar, "get termination character")?;
        u8::try_from(value).map_err(|_| {
            SessionError::failure(
                &self.resource,
                "get termination character",
                format!("termination character {value} does not fit in one byte"),
            )
        })
    }

    /// Set the termination character for subsequent reads.
    pub fn set_term_char(&self, term_char: u8) -> Result<()> {
        self.set_attr_int(
            Attr::TermChar,
            u32::from(term_char),
            "set termination character",
        )?;
        lock(&self.config).term_char = term_char;
        Ok(())
    }

    /// Whether reads stop at the termination character.
    pub fn term_char_enabled(&self) -> Result<bool> {
        Ok(self.attr_int(Attr::TermCharEnabled, "get termination enable")? != 0)
    }

    /// Enable or disable termination-on-read.
    pub fn set_term_char_enabled(&self, enabled: bool) -> Result<()> {
        self.set_attr_int(
            Attr::TermCharEnabled,
            u32::from(enabled),
            "set termination enable",
        )?;
        lock(&self.config).term_char_enabled = enabled;
        Ok(())
    }

    /// Device clear.
    pub fn clear(&self) -> Result<()> {
        self.ensure_open("device clear")?;
        let mut transport = lock(&self.transport);
        transport
            .clear()
            .map_err(|err| SessionError::from_transport(&self.resource, "device clear", err))
    }

    /// Release the channel. The second and any later call is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.srq.invalidate();
        let mut transport = lock(&self.transport);
        let _ = transport.close();
        debug!(resource = %self.resource, "closed instrument session");
        Ok(())
    }

    pub(crate) fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::failure(
                &self.resource,
                operation,
                "session is closed",
            ));
        }
        Ok(())
    }

    pub(crate) fn attr_int(&self, attr: Attr, operation: &'static str) -> Result<u32> {
        self.ensure_open(operation)?;
        let mut transport = lock(&self.transport);
        let value = transport
            .get_attribute(attr)
            .map_err(|err| SessionError::from_transport(&self.resource, operation, err))?;
        value.as_int().ok_or_else(|| {
            SessionError::failure(
                &self.resource,
                operation,
                format!("attribute {attr:?} returned a non-integer value"),
            )
        })
    }

    pub(crate) fn set_attr_int(
        &self,
        attr: Attr,
        value: u32,
        operation: &'static str,
    ) -> Result<()> {
        self.ensure_open(operation)?;
        let mut transport = lock(&self.transport);
        transport
            .set_attribute(attr, AttrValue::Int(value))
            .map_err(|err| SessionError::from_transport(&self.resource, operation, err))
    }

    fn transport_attr_int(
        transport: &mut dyn Transport,
        resource: &str,
        attr: Attr,
    ) -> Result<u32> {
        let value = transport
            .get_attribute(attr)
            .map_err(|err| SessionError::from_transport(resource, "get attribute", err))?;
        value.as_int().ok_or_else(|| {
            SessionError::failure(
                resource,
                "get attribute",
                format!("attribute {attr:?} returned a non-integer value"),
            )
        })
    }

    fn transport_attr_str(
        transport: &mut dyn Transport,
        resource: &str,
        attr: Attr,
    ) -> Result<String> {
        let value = transport
            .get_attribute(attr)
            .map_err(|err| SessionError::from_transport(resource, "get attribute", err))?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                SessionError::failure(
                    resource,
                    "get attribute",
                    format!("attribute {attr:?} returned a non-string value"),
                )
            })
    }

    fn transport_set_int(
        transport: &mut dyn Transport,
        resource: &str,
        attr: Attr,
        value: u32,
    ) -> Result<()> {
        transport
            .set_attribute(attr, AttrValue::Int(value))
            .map_err(|err| SessionError::from_transport(resource, "set attribute", err))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("resource", &self.resource)
            .field("kind", &self.kind)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}
