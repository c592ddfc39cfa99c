use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, TransportError};

/// Supported form for direct socket I/O, e.g. `TCPIP::192.168.1.1::5025::SOCKET`.
static SOCKET_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^TCPIP::([^:]+)::(\d+)::SOCKET$").expect("socket resource pattern")
});

/// A parsed `TCPIP::<host>::<port>::SOCKET` resource name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketResource {
    pub host: String,
    pub port: u16,
}

impl SocketResource {
    /// Parse a resource name in the direct-socket form.
    ///
    /// Every other resource form is rejected with `InvalidResourceName`; the
    /// socket backend has no way to reach GPIB, serial, USB or VXI-11
    /// endpoints.
    pub fn parse(resource: &str) -> Result<Self> {
        let caps = SOCKET_FORM.captures(resource.trim()).ok_or_else(|| {
            TransportError::InvalidResourceName {
                resource: resource.to_string(),
                reason: "not valid for a direct socket I/O session, \
                         supported format: 'TCPIP::192.168.1.1::5025::SOCKET'"
                    .to_string(),
            }
        })?;

        let host = caps[1].to_string();
        let port: u16 =
            caps[2]
                .parse()
                .map_err(|_| TransportError::InvalidResourceName {
                    resource: resource.to_string(),
                    reason: format!("port '{}' is out of range", &caps[2]),
                })?;

        Ok(SocketResource { host, port })
    }
}

impl std::fmt::Display for SocketResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TCPIP::{}::{}::SOCKET", self.host, self.port)
    }
}
