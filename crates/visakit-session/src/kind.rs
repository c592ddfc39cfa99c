/// Interface classification of a session, derived once at construction from
/// the transport's interface-type and resource-class attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Unsupported,
    Gpib,
    Serial,
    Vxi11,
    Hislip,
    Socket,
    Usb,
}

/// Interface-type attribute values, per the VISA numbering.
const INTF_GPIB: u32 = 1;
const INTF_GPIB_VXI: u32 = 3;
const INTF_SERIAL: u32 = 4;
const INTF_TCPIP: u32 = 6;
const INTF_USB: u32 = 7;

impl SessionKind {
    /// Classify from the interface type, the resource-class string and the
    /// result of the HiSLIP capability probe.
    pub fn classify(interface_type: u32, resource_class: &str, is_hislip: bool) -> Self {
        match interface_type {
            INTF_GPIB | INTF_GPIB_VXI => SessionKind::Gpib,
            INTF_SERIAL => SessionKind::Serial,
            INTF_TCPIP => {
                if resource_class == "SOCKET" {
                    SessionKind::Socket
                } else if is_hislip {
                    SessionKind::Hislip
                } else {
                    SessionKind::Vxi11
                }
            }
            INTF_USB => SessionKind::Usb,
            _ => SessionKind::Unsupported,
        }
    }

    /// True for the TCPIP interface, where the HiSLIP probe is meaningful.
    pub fn is_tcpip(interface_type: u32) -> bool {
        interface_type == INTF_TCPIP
    }

    /// Stream-oriented kinds force termination-on-read; there is no other
    /// end-of-message signal on the wire.
    pub fn forces_read_termination(self) -> bool {
        matches!(self, SessionKind::Serial | SessionKind::Socket)
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionKind::Unsupported => "Unsupported",
            SessionKind::Gpib => "GPIB",
            SessionKind::Serial => "Serial",
            SessionKind::Vxi11 => "VXI-11",
            SessionKind::Hislip => "HiSLIP",
            SessionKind::Socket => "Socket",
            SessionKind::Usb => "USB",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_table() {
        assert_eq!(SessionKind::classify(1, "INSTR", false), SessionKind::Gpib);
        assert_eq!(SessionKind::classify(3, "INSTR", false), SessionKind::Gpib);
        assert_eq!(
            SessionKind::classify(4, "INSTR", false),
            SessionKind::Serial
        );
        assert_eq!(
            SessionKind::classify(6, "SOCKET", false),
            SessionKind::Socket
        );
        assert_eq!(
            SessionKind::classify(6, "INSTR", false),
            SessionKind::Vxi11
        );
        assert_eq!(
            SessionKind::classify(6, "INSTR", true),
            SessionKind::Hislip
        );
        assert_eq!(SessionKind::classify(7, "INSTR", false), SessionKind::Usb);
        assert_eq!(
            SessionKind::classify(99, "INSTR", false),
            SessionKind::Unsupported
        );
    }

    #[test]
    fn socket_class_wins_over_hislip_probe() {
        assert_eq!(
            SessionKind::classify(6, "SOCKET", true),
            SessionKind::Socket
        );
    }

    #[test]
    fn stream_kinds_force_termination() {
        assert!(SessionKind::Serial.forces_read_termination());
        assert!(SessionKind::Socket.forces_read_termination());
        assert!(!SessionKind::Gpib.forces_read_termination());
        assert!(!SessionKind::Hislip.forces_read_termination());
    }
}
