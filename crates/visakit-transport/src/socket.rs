use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::attr::{Attr, AttrValue};
use crate::error::{Result, TransportError};
use crate::registry::{Handle, HandleRegistry};
use crate::resource::SocketResource;
use crate::traits::{RxStatus, SrqCallback, Transport, TransportBackend};

/// Channel timeout applied at open, before the session pushes its own.
pub const DEFAULT_TIMEOUT_MS: u32 = 10_000;

const DEFAULT_TERM_CHAR: u8 = b'\n';

/// Direct socket I/O backend.
///
/// Emulates the message-based transport primitives over a raw TCP connection
/// for instruments exposing an SCPI socket (commonly port 5025). Recognizes
/// only the `TCPIP::<host>::<port>::SOCKET` resource form; discovery is not
/// available on this backend.
pub struct SocketBackend {
    channels: Arc<HandleRegistry<SocketChannel>>,
}

impl SocketBackend {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(HandleRegistry::new()),
        }
    }

    /// Number of channels currently open through this backend.
    pub fn live_channels(&self) -> usize {
        self.channels.len()
    }
}

impl Default for SocketBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportBackend for SocketBackend {
    fn name(&self) -> &'static str {
        "socket-io"
    }

    fn open(&self, resource: &str) -> Result<Box<dyn Transport>> {
        let peer = SocketResource::parse(resource)?;
        let stream = TcpStream::connect((peer.host.as_str(), peer.port)).map_err(|err| {
            TransportError::Failure {
                detail: format!(
                    "socket I/O {} port {}: establishing the connection to the instrument \
                     failed: {err}",
                    peer.host, peer.port
                ),
            }
        })?;

        let mut channel = SocketChannel {
            stream,
            peer,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            term_char: DEFAULT_TERM_CHAR,
            term_char_enabled: true,
        };
        channel.apply_timeout(DEFAULT_TIMEOUT_MS)?;

        let handle = self.channels.insert(channel);
        info!(resource, %handle, "opened direct socket channel");

        Ok(Box::new(SocketTransport {
            resource: resource.to_string(),
            handle,
            channels: Arc::clone(&self.channels),
            closed: false,
        }))
    }

    fn find(&self, pattern: &str) -> Result<Vec<String>> {
        debug!(pattern, "direct socket backend cannot enumerate resources");
        Ok(Vec::new())
    }
}

/// Connection state shared through the backend's handle registry.
struct SocketChannel {
    stream: TcpStream,
    peer: SocketResource,
    timeout_ms: u32,
    term_char: u8,
    term_char_enabled: bool,
}

impl SocketChannel {
    fn apply_timeout(&mut self, ms: u32) -> Result<()> {
        let d = Duration::from_millis(u64::from(ms.max(1)));
        self.stream.set_read_timeout(Some(d))?;
        self.stream.set_write_timeout(Some(d))?;
        self.timeout_ms = ms;
        Ok(())
    }

    fn map_io(&self, err: std::io::Error, during: &str) -> TransportError {
        if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) {
            TransportError::Timeout {
                timeout_ms: self.timeout_ms,
            }
        } else {
            TransportError::Failure {
                detail: format!(
                    "socket I/O {} port {}: error during {during}: {err}",
                    self.peer.host, self.peer.port
                ),
            }
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        self.stream
            .write_all(data)
            .map_err(|err| self.map_io(err, "write"))?;
        Ok(data.len())
    }

    /// Receive until the termination character arrives (when enabled) or the
    /// caller's buffer fills up. With termination disabled the read only ends
    /// on a full buffer, so an undersized response surfaces as a timeout.
    fn receive(&mut self, buf: &mut [u8]) -> Result<(usize, RxStatus)> {
        let mut filled = 0usize;
        let mut terminated = false;

        while filled < buf.len() {
            let n = match self.stream.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(TransportError::ConnectionLost {
                        detail: format!(
                            "socket I/O {} port {}: connection closed by the instrument",
                            self.peer.host, self.peer.port
                        ),
                    })
                }
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.map_io(err, "read")),
            };

            if self.term_char_enabled {
                if let Some(ix) = buf[filled..filled + n]
                    .iter()
                    .position(|&b| b == self.term_char)
                {
                    // Anything past the terminator in this chunk belongs to
                    // no message and is discarded.
                    filled += ix + 1;
                    terminated = true;
                    break;
                }
            }
            filled += n;
        }

        let more = filled >= buf.len() && (!self.term_char_enabled || !terminated);
        let status = if more {
            RxStatus::MoreData
        } else {
            RxStatus::Complete
        };
        Ok((filled, status))
    }
}

/// One open direct-socket channel, as seen by a session.
pub struct SocketTransport {
    resource: String,
    handle: Handle,
    channels: Arc<HandleRegistry<SocketChannel>>,
    closed: bool,
}

impl SocketTransport {
    fn channel(&self) -> Result<Arc<Mutex<SocketChannel>>> {
        if self.closed {
            return Err(TransportError::ConnectionLost {
                detail: format!("channel to '{}' is closed", self.resource),
            });
        }
        self.channels
            .get(self.handle)
            .ok_or_else(|| TransportError::ConnectionLost {
                detail: format!("no open channel for {}", self.handle),
            })
    }

    fn expect_int(attr: Attr, value: AttrValue) -> Result<u32> {
        value.as_int().ok_or_else(|| TransportError::Failure {
            detail: format!("attribute {attr:?} expects an integer value"),
        })
    }
}

impl Transport for SocketTransport {
    fn resource_name(&self) -> &str {
        &self.resource
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        let slot = self.channel()?;
        let mut channel = slot.lock().unwrap_or_else(|e| e.into_inner());
        channel.send(data)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<(usize, RxStatus)> {
        let slot = self.channel()?;
        let mut channel = slot.lock().unwrap_or_else(|e| e.into_inner());
        channel.receive(buf)
    }

    fn get_attribute(&mut self, attr: Attr) -> Result<AttrValue> {
        let slot = self.channel()?;
        let channel = slot.lock().unwrap_or_else(|e| e.into_inner());
        match attr {
            Attr::SendEndEnabled => Ok(AttrValue::Int(1)),
            Attr::TermChar => Ok(AttrValue::Int(u32::from(channel.term_char))),
            Attr::TimeoutValue => Ok(AttrValue::Int(channel.timeout_ms)),
            Attr::TermCharEnabled => Ok(AttrValue::from(channel.term_char_enabled)),
            Attr::InterfaceType => Ok(AttrValue::Int(6)),
            Attr::ResourceClass => Ok(AttrValue::from("SOCKET")),
            Attr::ManufacturerName => Ok(AttrValue::from("3leaps (direct socket I/O)")),
            _ => Err(TransportError::UnsupportedAttribute { attr }),
        }
    }

    fn set_attribute(&mut self, attr: Attr, value: AttrValue) -> Result<()> {
        let slot = self.channel()?;
        let mut channel = slot.lock().unwrap_or_else(|e| e.into_inner());
        match attr {
            // Accepted for compatibility; END has no meaning on a raw socket.
            Attr::SendEndEnabled => {
                Self::expect_int(attr, value)?;
                Ok(())
            }
            Attr::TermChar => {
                let v = Self::expect_int(attr, value)?;
                channel.term_char =
                    u8::try_from(v).map_err(|_| TransportError::Failure {
                        detail: format!("termination character {v} does not fit in one byte"),
                    })?;
                Ok(())
            }
            Attr::TimeoutValue => {
                let v = Self::expect_int(attr, value)?;
                channel.apply_timeout(v)
            }
            Attr::TermCharEnabled => {
                let v = Self::expect_int(attr, value)?;
                channel.term_char_enabled = v > 0;
                Ok(())
            }
            _ => Err(TransportError::UnsupportedAttribute { attr }),
        }
    }

    fn read_status_byte(&mut self) -> Result<u8> {
        Err(TransportError::Unsupported {
            operation: "read status byte",
        })
    }

    fn install_srq_handler(&mut self, _handler: SrqCallback) -> Result<()> {
        Err(TransportError::Unsupported {
            operation: "install service request handler",
        })
    }

    fn uninstall_srq_handler(&mut self) -> Result<()> {
        Err(TransportError::Unsupported {
            operation: "uninstall service request handler",
        })
    }

    fn clear(&mut self) -> Result<()> {
        // Raw sockets have no device-clear primitive; the call succeeds so
        // the common clear-on-open sequence works across backends.
        self.channel().map(|_| ())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(slot) = self.channels.remove(self.handle) {
            let channel = slot.lock().unwrap_or_else(|e| e.into_inner());
            let _ = channel.stream.shutdown(Shutdown::Both);
            debug!(resource = %self.resource, handle = %self.handle, "closed direct socket channel");
        }
        Ok(())
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
