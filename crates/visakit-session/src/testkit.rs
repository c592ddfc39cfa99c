//! Shared instrument double for session-layer tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use visakit_transport::{
    Attr, AttrValue, RxStatus, SrqCallback, Transport, TransportBackend, TransportError,
};

use crate::manager::ResourceManager;
use crate::session::Session;
use crate::settings::Settings;

pub(crate) const MOCK_RESOURCE: &str = "TCPIP::10.0.0.5::5025::SOCKET";

/// Observable state of the fake instrument.
#[derive(Default)]
pub(crate) struct MockState {
    /// Bytes queued for the session to read.
    pub pending: VecDeque<u8>,
    /// Everything the session wrote, send by send.
    pub writes: Vec<Vec<u8>>,
    /// Backing store for attributes outside the dedicated fields below.
    pub attrs: HashMap<u32, AttrValue>,
    pub term_char: u8,
    pub term_enabled: bool,
    pub timeout_ms: u32,
    /// Every timeout value pushed through set_attribute, in order.
    pub timeout_sets: Vec<u32>,
    pub stb: u8,
    pub stb_supported: bool,
    pub receive_calls: usize,
    pub get_calls: usize,
    pub stb_calls: usize,
    pub clears: usize,
    pub closes: usize,
    pub installs: usize,
    pub uninstalls: usize,
    /// Attribute whose get fails hard, for construction-failure tests.
    pub fail_get: Option<Attr>,
}

/// Handle the test keeps; the opened transport shares the same state.
#[derive(Clone)]
pub(crate) struct MockInstrument {
    pub state: Arc<Mutex<MockState>>,
    pub handler: Arc<Mutex<Option<SrqCallback>>>,
}

impl MockInstrument {
    pub fn socket() -> Self {
        Self::with_interface(6, "SOCKET")
    }

    pub fn with_interface(interface_type: u32, resource_class: &str) -> Self {
        let mut attrs = HashMap::new();
        attrs.insert(Attr::InterfaceType.id(), AttrValue::Int(interface_type));
        attrs.insert(Attr::ResourceClass.id(), AttrValue::from(resource_class));
        Self {
            state: Arc::new(Mutex::new(MockState {
                attrs,
                term_char: b'\n',
                timeout_ms: 10_000,
                stb_supported: true,
                ..MockState::default()
            })),
            handler: Arc::new(Mutex::new(None)),
        }
    }

    pub fn manager(&self) -> ResourceManager {
        ResourceManager::new(Arc::new(MockBackend {
            state: Arc::clone(&self.state),
            handler: Arc::clone(&self.handler),
        }))
    }

    pub fn open(&self, settings: Settings) -> crate::error::Result<Session> {
        Session::open(&self.manager(), MOCK_RESOURCE, settings)
    }

    pub fn push_response(&self, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .pending
            .extend(bytes.iter().copied());
    }

    pub fn writes(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    pub fn set_attr(&self, attr: Attr, value: AttrValue) {
        self.state.lock().unwrap().attrs.insert(attr.id(), value);
    }

    /// Deliver a service request to whatever handler is installed.
    pub fn fire_srq(&self) {
        let mut slot = self.handler.lock().unwrap();
        if let Some(handler) = slot.as_mut() {
            handler();
        }
    }
}

struct MockBackend {
    state: Arc<Mutex<MockState>>,
    handler: Arc<Mutex<Option<SrqCallback>>>,
}

impl TransportBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock-instrument"
    }

    fn open(&self, resource: &str) -> visakit_transport::Result<Box<dyn Transport>> {
        Ok(Box::new(MockTransport {
            resource: resource.to_string(),
            state: Arc::clone(&self.state),
            handler: Arc::clone(&self.handler),
        }))
    }

    fn find(&self, _pattern: &str) -> visakit_transport::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

struct MockTransport {
    resource: String,
    state: Arc<Mutex<MockState>>,
    handler: Arc<Mutex<Option<SrqCallback>>>,
}

impl Transport for MockTransport {
    fn resource_name(&self) -> &str {
        &self.resource
    }

    fn send(&mut self, data: &[u8]) -> visakit_transport::Result<usize> {
        let mut state = self.state.lock().unwrap();
        state.writes.push(data.to_vec());
        Ok(data.len())
    }

    /// Serves queued bytes with socket-like termination semantics: stop at
    /// the terminator, report MoreData on a full buffer, time out when the
    /// queue cannot satisfy the read.
    fn receive(&mut self, buf: &mut [u8]) -> visakit_transport::Result<(usize, RxStatus)> {
        let mut state = self.state.lock().unwrap();
        state.receive_calls += 1;

        let window = buf.len().min(state.pending.len());
        if state.term_enabled {
            let term = state.term_char;
            if let Some(ix) = state.pending.iter().take(window).position(|&b| b == term) {
                let n = ix + 1;
                for slot in buf.iter_mut().take(n) {
                    *slot = state.pending.pop_front().unwrap();
                }
                return Ok((n, RxStatus::Complete));
            }
        }
        if state.pending.len() >= buf.len() && !buf.is_empty() {
            for slot in buf.iter_mut() {
                *slot = state.pending.pop_front().unwrap();
            }
            return Ok((buf.len(), RxStatus::MoreData));
        }
        // Message-based transports report END on a short read; only a
        // stream with termination enabled has to keep waiting.
        if !state.term_enabled && !state.pending.is_empty() {
            let n = state.pending.len();
            for slot in buf.iter_mut().take(n) {
                *slot = state.pending.pop_front().unwrap();
            }
            return Ok((n, RxStatus::Complete));
        }
        Err(TransportError::Timeout {
            timeout_ms: state.timeout_ms,
        })
    }

    fn get_attribute(&mut self, attr: Attr) -> visakit_transport::Result<AttrValue> {
        let mut state = self.state.lock().unwrap();
        state.get_calls += 1;
        if state.fail_get == Some(attr) {
            return Err(TransportError::Failure {
                detail: "simulated attribute fault".to_string(),
            });
        }
        match attr {
            Attr::TermChar => Ok(AttrValue::Int(u32::from(state.term_char))),
            Attr::TermCharEnabled => Ok(AttrValue::from(state.term_enabled)),
            Attr::TimeoutValue => Ok(AttrValue::Int(state.timeout_ms)),
            _ => state
                .attrs
                .get(&attr.id())
                .cloned()
                .ok_or(TransportError::UnsupportedAttribute { attr }),
        }
    }

    fn set_attribute(&mut self, attr: Attr, value: AttrValue) -> visakit_transport::Result<()> {
        let mut state = self.state.lock().unwrap();
        let int = value.as_int();
        match attr {
            Attr::TermChar => {
                state.term_char = int.unwrap_or(u32::from(b'\n')) as u8;
            }
            Attr::TermCharEnabled => {
                state.term_enabled = int.unwrap_or(0) > 0;
            }
            Attr::TimeoutValue => {
                let v = int.unwrap_or(0);
                state.timeout_ms = v;
                state.timeout_sets.push(v);
            }
            _ => {
                state.attrs.insert(attr.id(), value);
            }
        }
        Ok(())
    }

    fn read_status_byte(&mut self) -> visakit_transport::Result<u8> {
        let mut state = self.state.lock().unwrap();
        if !state.stb_supported {
            return Err(TransportError::Unsupported {
                operation: "read status byte",
            });
        }
        state.stb_calls += 1;
        Ok(state.stb)
    }

    fn install_srq_handler(&mut self, handler: SrqCallback) -> visakit_transport::Result<()> {
        self.state.lock().unwrap().installs += 1;
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    fn uninstall_srq_handler(&mut self) -> visakit_transport::Result<()> {
        self.state.lock().unwrap().uninstalls += 1;
        *self.handler.lock().unwrap() = None;
        Ok(())
    }

    fn clear(&mut self) -> visakit_transport::Result<()> {
        self.state.lock().unwrap().clears += 1;
        Ok(())
    }

    fn close(&mut self) -> visakit_transport::Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}
