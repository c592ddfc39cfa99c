//! Status polling and device-initiated signal (service request) handling.

use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};
use visakit_transport::SrqCallback;

use crate::error::{Result, SessionError};
use crate::lock;
use crate::session::Session;
use crate::status::StatusByte;

/// Snapshot delivered to a service-request handler.
#[derive(Debug, Clone)]
pub struct SrqEvent {
    /// Resource name of the session that raised the event.
    pub resource: String,
    /// Status byte re-read at delivery time.
    pub status: StatusByte,
}

/// Application callback for service requests.
pub type SrqHandler = Arc<dyn Fn(&SrqEvent) + Send + Sync>;

/// Single registered consumer for device-initiated signals.
///
/// The transport fires one adapter; the dispatcher fans the event out to the
/// installed application handler and to at most one in-flight wait. Install
/// and uninstall mutate the slots under the lock; dropping the waiter's
/// sender invalidates an in-flight wait.
pub(crate) struct SrqDispatcher {
    state: Mutex<DispatchState>,
}

struct DispatchState {
    user: Option<SrqHandler>,
    waiter: Option<SyncSender<()>>,
    adapter_installed: bool,
}

impl SrqDispatcher {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(DispatchState {
                user: None,
                waiter: None,
                adapter_installed: false,
            }),
        }
    }

    /// Drop both consumers; any in-flight wait observes the hangup.
    pub(crate) fn invalidate(&self) {
        let mut state = lock(&self.state);
        state.user = None;
        state.waiter = None;
    }
}

impl Session {
    /// Read the device status byte through the dedicated transport
    /// primitive.
    ///
    /// When a fast poll timeout is configured and `ignore_fast_poll_timeout`
    /// is false, the session timeout is swapped to the fast value for the
    /// duration of this single call and restored on every exit path.
    pub fn read_status_byte_polled(&self, ignore_fast_poll_timeout: bool) -> Result<StatusByte> {
        self.ensure_open("read status byte")?;
        let fast = lock(&self.config).read_stb_timeout_ms;
        if ignore_fast_poll_timeout || fast <= 0 {
            return self.read_stb_raw();
        }

        let previous = self.timeout()?;
        self.set_timeout(fast as u32)?;
        let result = self.read_stb_raw();
        let restore = self.set_timeout(previous);
        match (result, restore) {
            (Err(err), _) => Err(err),
            (Ok(_), Err(err)) => Err(err),
            (Ok(status), Ok(())) => Ok(status),
        }
    }

    fn read_stb_raw(&self) -> Result<StatusByte> {
        let mut transport = lock(&self.transport);
        transport
            .read_status_byte()
            .map(StatusByte::from_bits)
            .map_err(|err| SessionError::from_transport(&self.resource, "read status byte", err))
    }

    /// Install a service-request handler. A session holds at most one;
    /// installing replaces any previous handler. The handler receives a
    /// status-byte snapshot re-read at delivery time plus the resource name.
    pub fn install_srq_handler<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&SrqEvent) + Send + Sync + 'static,
    {
        self.ensure_open("install service request handler")?;
        {
            let mut state = lock(&self.srq.state);
            state.user = Some(Arc::new(handler));
        }
        self.ensure_adapter_installed("install service request handler")
    }

    /// Remove the installed handler and invalidate any in-flight wait.
    pub fn uninstall_srq_handler(&self) -> Result<()> {
        {
            let mut state = lock(&self.srq.state);
            state.user = None;
            // Dropping the sender wakes a blocked wait_for_srq.
            state.waiter = None;
        }
        self.remove_adapter("uninstall service request handler")
    }

    /// Block until a service request arrives or `timeout_ms` elapses.
    ///
    /// A timeout is an ordinary outcome, reported as `Ok(true)` — never an
    /// error. With `disable_afterward` the event mechanism is torn down
    /// regardless of outcome (an installed application handler stays live).
    pub fn wait_for_srq(&self, timeout_ms: u32, disable_afterward: bool) -> Result<bool> {
        self.ensure_open("wait on service request")?;

        let (tx, rx) = mpsc::sync_channel(1);
        {
            let mut state = lock(&self.srq.state);
            state.waiter = Some(tx);
        }
        if let Err(err) = self.ensure_adapter_installed("wait on service request") {
            lock(&self.srq.state).waiter = None;
            return Err(err);
        }

        let timed_out = match rx.recv_timeout(Duration::from_millis(u64::from(timeout_ms))) {
            Ok(()) => false,
            Err(RecvTimeoutError::Timeout) => true,
            // Uninstalled mid-wait; the wait is void.
            Err(RecvTimeoutError::Disconnected) => true,
        };

        lock(&self.srq.state).waiter = None;
        if disable_afterward {
            let user_installed = lock(&self.srq.state).user.is_some();
            if !user_installed {
                self.remove_adapter("wait on service request")?;
            }
        }
        Ok(timed_out)
    }

    /// Status byte via `*STB?`, honoring the `disable_stb_query` setting —
    /// when set, reports an empty status byte without any transport call.
    pub fn query_stb(&self) -> Result<StatusByte> {
        if lock(&self.config).disable_stb_query {
            return Ok(StatusByte::NONE);
        }
        let text = self.query_short("*STB?", 64)?;
        let raw = text.trim().trim_start_matches('+');
        let value: u16 = raw.parse().map_err(|_| {
            SessionError::failure(
                &self.resource,
                "query status byte",
                format!("response '{}' is not a status byte value", text.trim()),
            )
        })?;
        Ok(StatusByte::from_bits((value & 0xFF) as u8))
    }

    /// True when the instrument's error queue has at least one entry.
    pub fn error_queue_is_not_empty(&self) -> Result<bool> {
        Ok(self
            .query_stb()?
            .contains(StatusByte::ERROR_QUEUE_NOT_EMPTY))
    }

    /// Install the transport-level adapter that feeds the dispatcher, once.
    fn ensure_adapter_installed(&self, operation: &'static str) -> Result<()> {
        let mut state = lock(&self.srq.state);
        if state.adapter_installed {
            return Ok(());
        }

        let dispatcher = Arc::clone(&self.srq);
        let transport = Arc::clone(&self.transport);
        let resource = self.resource.clone();
        let adapter: SrqCallback = Box::new(move || {
            let status = {
                let mut transport = lock(&transport);
                match transport.read_status_byte() {
                    Ok(bits) => StatusByte::from_bits(bits),
                    Err(err) => {
                        warn!(resource = %resource, error = %err,
                              "status byte unavailable during service request delivery");
                        StatusByte::NONE
                    }
                }
            };
            let event = SrqEvent {
                resource: resource.clone(),
                status,
            };
            let (user, waiter) = {
                let state = lock(&dispatcher.state);
                (state.user.clone(), state.waiter.clone())
            };
            if let Some(tx) = waiter {
                let _ = tx.try_send(());
            }
            if let Some(handler) = user {
                handler(&event);
            }
        });

        let mut transport = lock(&self.transport);
        transport
            .install_srq_handler(adapter)
            .map_err(|err| SessionError::from_transport(&self.resource, operation, err))?;
        state.adapter_installed = true;
        debug!(resource = %self.resource, "installed service request adapter");
        Ok(())
    }

    fn remove_adapter(&self, operation: &'static str) -> Result<()> {
        let mut state = lock(&self.srq.state);
        if !state.adapter_installed {
            return Ok(());
        }
        let mut transport = lock(&self.transport);
        transport
            .uninstall_srq_handler()
            .map_err(|err| SessionError::from_transport(&self.resource, operation, err))?;
        state.adapter_installed = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use crate::settings::Settings;
    use crate::testkit::{MockInstrument, MOCK_RESOURCE};

    use super::*;

    #[test]
    fn direct_status_poll_reads_the_register() {
        let instrument = MockInstrument::socket();
        let session = instrument.open(Settings::default()).unwrap();
        instrument.state.lock().unwrap().stb = 0x44;

        let status = session.read_status_byte_polled(false).unwrap();
        assert!(status.contains(StatusByte::ERROR_QUEUE_NOT_EMPTY));
        assert!(status.contains(StatusByte::REQUEST_SERVICE));
        assert_eq!(instrument.state.lock().unwrap().stb_calls, 1);
    }

    #[test]
    fn fast_poll_swaps_timeout_and_restores_it() {
        let instrument = MockInstrument::socket();
        let session = instrument
            .open(Settings {
                read_stb_timeout_ms: 50,
                ..Settings::default()
            })
            .unwrap();

        session.read_status_byte_polled(false).unwrap();
        assert_eq!(
            instrument.state.lock().unwrap().timeout_sets,
            vec![10_000, 50, 10_000]
        );

        // Respecting the caller's timeout leaves the channel alone.
        session.read_status_byte_polled(true).unwrap();
        assert_eq!(
            instrument.state.lock().unwrap().timeout_sets,
            vec![10_000, 50, 10_000]
        );
    }

    #[test]
    fn fast_poll_restores_timeout_when_the_read_fails() {
        let instrument = MockInstrument::socket();
        let session = instrument
            .open(Settings {
                read_stb_timeout_ms: 50,
                ..Settings::default()
            })
            .unwrap();
        instrument.state.lock().unwrap().stb_supported = false;

        let err = session.read_status_byte_polled(false).unwrap_err();
        assert!(matches!(err, SessionError::TransportFailure { .. }));
        let sets = instrument.state.lock().unwrap().timeout_sets.clone();
        assert_eq!(sets, vec![10_000, 50, 10_000], "timeout restored on failure");
    }

    #[test]
    fn installed_handler_gets_a_status_snapshot() {
        let instrument = MockInstrument::socket();
        let session = instrument.open(Settings::default()).unwrap();
        instrument.state.lock().unwrap().stb = 0x40;

        let (tx, rx) = mpsc::channel();
        session
            .install_srq_handler(move |event: &SrqEvent| {
                tx.send((event.resource.clone(), event.status)).unwrap();
            })
            .unwrap();
        instrument.fire_srq();

        let (resource, status) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(resource, MOCK_RESOURCE);
        assert!(status.contains(StatusByte::REQUEST_SERVICE));
        assert_eq!(instrument.state.lock().unwrap().installs, 1);
    }

    #[test]
    fn reinstalling_replaces_the_previous_handler() {
        let instrument = MockInstrument::socket();
        let session = instrument.open(Settings::default()).unwrap();

        let (tx_old, rx_old) = mpsc::channel();
        session
            .install_srq_handler(move |_: &SrqEvent| {
                tx_old.send("old").unwrap();
            })
            .unwrap();

        let (tx_new, rx_new) = mpsc::channel();
        session
            .install_srq_handler(move |_: &SrqEvent| {
                tx_new.send("new").unwrap();
            })
            .unwrap();

        instrument.fire_srq();
        assert_eq!(rx_new.recv_timeout(Duration::from_secs(1)).unwrap(), "new");
        assert!(rx_old.try_recv().is_err(), "old handler must be gone");
        // One transport-level adapter serves both installs.
        assert_eq!(instrument.state.lock().unwrap().installs, 1);
    }

    #[test]
    fn uninstall_removes_the_adapter() {
        let instrument = MockInstrument::socket();
        let session = instrument.open(Settings::default()).unwrap();

        session.install_srq_handler(|_: &SrqEvent| {}).unwrap();
        session.uninstall_srq_handler().unwrap();
        assert_eq!(instrument.state.lock().unwrap().uninstalls, 1);
        assert!(instrument.handler.lock().unwrap().is_none());
    }

    #[test]
    fn wait_observes_a_service_request() {
        let instrument = MockInstrument::socket();
        let session = instrument.open(Settings::default()).unwrap();

        let trigger = instrument.clone();
        let firer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            trigger.fire_srq();
        });

        let timed_out = session.wait_for_srq(2000, false).unwrap();
        assert!(!timed_out);
        firer.join().unwrap();
    }

    #[test]
    fn wait_reports_timeout_as_a_boolean() {
        let instrument = MockInstrument::socket();
        let session = instrument.open(Settings::default()).unwrap();

        let timed_out = session.wait_for_srq(30, false).unwrap();
        assert!(timed_out);
    }

    #[test]
    fn wait_can_disable_the_mechanism_afterward() {
        let instrument = MockInstrument::socket();
        let session = instrument.open(Settings::default()).unwrap();

        session.wait_for_srq(30, true).unwrap();
        let state = instrument.state.lock().unwrap();
        assert_eq!(state.installs, 1);
        assert_eq!(state.uninstalls, 1);
    }

    #[test]
    fn uninstall_invalidates_an_inflight_wait() {
        let instrument = MockInstrument::socket();
        let session = Arc::new(instrument.open(Settings::default()).unwrap());

        let waiter = Arc::clone(&session);
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            waiter.uninstall_srq_handler().unwrap();
        });

        let timed_out = session.wait_for_srq(5000, false).unwrap();
        assert!(timed_out, "a voided wait reads as a timeout");
        canceller.join().unwrap();
    }

    #[test]
    fn stb_query_parses_the_status_byte() {
        let instrument = MockInstrument::socket();
        let session = instrument.open(Settings::default()).unwrap();

        instrument.push_response(b"4\n");
        assert!(session.error_queue_is_not_empty().unwrap());

        instrument.push_response(b"+32\n");
        let status = session.query_stb().unwrap();
        assert!(status.contains(StatusByte::EVENT_STATUS_BYTE));
        assert!(!status.contains(StatusByte::ERROR_QUEUE_NOT_EMPTY));

        instrument.push_response(b"garbled\n");
        let err = session.query_stb().unwrap_err();
        assert!(err.to_string().contains("not a status byte value"));
    }

    #[test]
    fn disabled_stb_query_never_touches_the_transport() {
        let instrument = MockInstrument::socket();
        let session = instrument
            .open(Settings {
                disable_stb_query: true,
                ..Settings::default()
            })
            .unwrap();
        instrument.state.lock().unwrap().stb = 0xFF;

        let writes_before = instrument.writes().len();
        let receives_before = instrument.state.lock().unwrap().receive_calls;

        assert!(!session.error_queue_is_not_empty().unwrap());
        assert_eq!(session.query_stb().unwrap(), StatusByte::NONE);

        assert_eq!(instrument.writes().len(), writes_before);
        assert_eq!(
            instrument.state.lock().unwrap().receive_calls,
            receives_before
        );
    }
}
