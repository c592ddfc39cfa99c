use visakit_transport::Attr;

use crate::error::{Result, SessionError};
use crate::kind::SessionKind;
use crate::manager::ResourceManager;
use crate::session::Session;
use crate::settings::Settings;

/// Parity scheme of a serial line, with the VISA ASRL values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SerialParity {
    None = 0,
    Odd = 1,
    Even = 2,
    Mark = 3,
    Space = 4,
}

/// Stop-bit count of a serial line, with the VISA ASRL values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SerialStopBits {
    One = 10,
    OneAndHalf = 15,
    Two = 20,
}

/// Flow-control mode of a serial line, with the VISA ASRL values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SerialFlowControl {
    None = 0,
    XonXoff = 1,
    RtsCts = 2,
    DtrDsr = 4,
}

/// A session over a serial line, with typed access to the line parameters.
#[derive(Debug)]
pub struct SerialSession {
    session: Session,
}

impl SerialSession {
    /// Open a serial session. Fails when the resource does not classify as a
    /// serial interface.
    pub fn open(
        manager: &ResourceManager,
        resource: &str,
        settings: Settings,
    ) -> Result<SerialSession> {
        let session = Session::open(manager, resource, settings)?;
        if session.kind() != SessionKind::Serial {
            let kind = session.kind();
            let err = SessionError::failure(
                session.resource_name(),
                "open serial session",
                format!("resource classified as {kind}, not a serial interface"),
            );
            let _ = session.close();
            return Err(err);
        }
        Ok(SerialSession { session })
    }

    pub fn baud_rate(&self) -> Result<u32> {
        self.session.attr_int(Attr::SerialBaud, "get baud rate")
    }

    pub fn set_baud_rate(&self, baud: u32) -> Result<()> {
        self.session
            .set_attr_int(Attr::SerialBaud, baud, "set baud rate")
    }

    pub fn data_bits(&self) -> Result<u32> {
        self.session.attr_int(Attr::SerialDataBits, "get data bits")
    }

    pub fn set_data_bits(&self, bits: u32) -> Result<()> {
        self.session
            .set_attr_int(Attr::SerialDataBits, bits, "set data bits")
    }

    pub fn parity(&self) -> Result<SerialParity> {
        let value = self.session.attr_int(Attr::SerialParity, "get parity")?;
        match value {
            0 => Ok(SerialParity::None),
            1 => Ok(SerialParity::Odd),
            2 => Ok(SerialParity::Even),
            3 => Ok(SerialParity::Mark),
            4 => Ok(SerialParity::Space),
            other => Err(SessionError::failure(
                self.session.resource_name(),
                "get parity",
                format!("unknown parity value {other}"),
            )),
        }
    }

    pub fn set_parity(&self, parity: SerialParity) -> Result<()> {
        self.session
            .set_attr_int(Attr::SerialParity, parity as u32, "set parity")
    }

    pub fn stop_bits(&self) -> Result<SerialStopBits> {
        let value = self.session.attr_int(Attr::SerialStopBits, "get stop bits")?;
        match value {
            10 => Ok(SerialStopBits::One),
            15 => Ok(SerialStopBits::OneAndHalf),
            20 => Ok(SerialStopBits::Two),
            other => Err(SessionError::failure(
                self.session.resource_name(),
                "get stop bits",
                format!("unknown stop bits value {other}"),
            )),
        }
    }

    pub fn set_stop_bits(&self, stop_bits: SerialStopBits) -> Result<()> {
        self.session
            .set_attr_int(Attr::SerialStopBits, stop_bits as u32, "set stop bits")
    }

    pub fn flow_control(&self) -> Result<SerialFlowControl> {
        let value = self
            .session
            .attr_int(Attr::SerialFlowControl, "get flow control")?;
        match value {
            0 => Ok(SerialFlowControl::None),
            1 => Ok(SerialFlowControl::XonXoff),
            2 => Ok(SerialFlowControl::RtsCts),
            4 => Ok(SerialFlowControl::DtrDsr),
            other => Err(SessionError::failure(
                self.session.resource_name(),
                "get flow control",
                format!("unknown flow control value {other}"),
            )),
        }
    }

    pub fn set_flow_control(&self, flow: SerialFlowControl) -> Result<()> {
        self.session
            .set_attr_int(Attr::SerialFlowControl, flow as u32, "set flow control")
    }

    /// The underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Give up the typed wrapper, keeping the session open.
    pub fn into_session(self) -> Session {
        self.session
    }
}

impl std::ops::Deref for SerialSession {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}
