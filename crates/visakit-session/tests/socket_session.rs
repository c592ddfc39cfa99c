//! End-to-end session tests against a fake SCPI instrument on a local TCP
//! socket.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use visakit_session::{ResourceManager, Session, SessionError, SessionKind, Settings};

/// Minimal instrument: answers `*IDN?` once, swallows everything else,
/// serves until the client hangs up.
fn spawn_instrument() -> (String, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut seen = Vec::new();
        let mut answered = false;
        let mut buf = [0u8; 256];
        loop {
            let n = match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            seen.extend_from_slice(&buf[..n]);
            if !answered
                && seen
                    .windows(5)
                    .any(|window| window == b"*IDN?")
            {
                stream
                    .write_all(b"ACME Instruments,SG-1000,903517,1.04\n")
                    .unwrap();
                answered = true;
            }
        }
    });

    (format!("TCPIP::127.0.0.1::{port}::SOCKET"), handle)
}

#[test]
fn socket_session_opens_clears_and_queries() {
    let (resource, server) = spawn_instrument();
    let manager = ResourceManager::socket_io();

    let session = Session::open(&manager, &resource, Settings::default()).unwrap();
    assert_eq!(session.kind(), SessionKind::Socket);
    assert!(session.term_char_enabled().unwrap());

    session.write("*CLS").unwrap();
    let idn = session.query("*IDN?").unwrap();
    assert_eq!(idn, "ACME Instruments,SG-1000,903517,1.04");

    session.close().unwrap();
    session.close().unwrap();
    server.join().unwrap();
}

#[test]
fn silent_instrument_times_out_with_configured_value() {
    let (resource, server) = spawn_instrument();
    let manager = ResourceManager::socket_io();

    let session = Session::open(&manager, &resource, Settings::default()).unwrap();
    session.set_timeout(150).unwrap();

    let err = session.query("SYST:ERR?").unwrap_err();
    assert!(matches!(err, SessionError::Timeout { .. }));
    assert!(err.to_string().contains("150"));
    assert!(err.to_string().contains(&resource));

    session.close().unwrap();
    server.join().unwrap();
}

#[test]
fn non_socket_resource_forms_are_rejected() {
    let manager = ResourceManager::socket_io();
    let err = Session::open(&manager, "GPIB0::29::INSTR", Settings::default()).unwrap_err();
    assert!(matches!(err, SessionError::InvalidResourceName { .. }));
    assert!(err.to_string().contains("GPIB0::29::INSTR"));
}
