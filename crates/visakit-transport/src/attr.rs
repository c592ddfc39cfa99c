//! Channel attribute identifiers.
//!
//! The numeric discriminants follow the de-facto VISA attribute numbering so
//! that vendor-library backends can pass them straight through.

/// Attributes a [`Transport`](crate::Transport) may get or set.
///
/// Backends implement the subset that makes sense for their channel and
/// answer everything else with `UnsupportedAttribute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Attr {
    /// I/O timeout in milliseconds.
    TimeoutValue = 0x3FFF_001A,
    /// Termination character for reads.
    TermChar = 0x3FFF_0018,
    /// Whether reads stop at the termination character.
    TermCharEnabled = 0x3FFF_0038,
    /// Whether writes assert END on the last byte.
    SendEndEnabled = 0x3FFF_0016,
    /// Numeric interface type of the channel.
    InterfaceType = 0x3FFF_0171,
    /// Resource class string ("INSTR", "SOCKET", ...).
    ResourceClass = 0xBFFF_0001,
    /// Implementation manufacturer string.
    ManufacturerName = 0xBFFF_0174,
    /// Whether a TCPIP channel speaks HiSLIP.
    TcpipIsHislip = 0x3FFF_0303,
    /// Serial line: END indicator handling on reads.
    SerialEndIn = 0x3FFF_00B3,
    /// Serial line: END indicator handling on writes.
    SerialEndOut = 0x3FFF_00B4,
    /// Serial line: baud rate.
    SerialBaud = 0x3FFF_0021,
    /// Serial line: data bits per frame.
    SerialDataBits = 0x3FFF_0022,
    /// Serial line: parity scheme.
    SerialParity = 0x3FFF_0023,
    /// Serial line: stop bit count.
    SerialStopBits = 0x3FFF_0024,
    /// Serial line: flow control mode.
    SerialFlowControl = 0x3FFF_0025,
}

impl Attr {
    /// The raw attribute identifier.
    pub fn id(self) -> u32 {
        self as u32
    }
}

/// Value carried by an attribute — integer or string, per attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Int(u32),
    Str(String),
}

impl AttrValue {
    /// The integer value, if this attribute is integer-typed.
    pub fn as_int(&self) -> Option<u32> {
        match self {
            AttrValue::Int(v) => Some(*v),
            AttrValue::Str(_) => None,
        }
    }

    /// The string value, if this attribute is string-typed.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Int(_) => None,
            AttrValue::Str(s) => Some(s),
        }
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        AttrValue::Int(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Int(u32::from(v))
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}
