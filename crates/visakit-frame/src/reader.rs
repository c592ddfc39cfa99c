use bytes::BytesMut;
use tracing::debug;
use visakit_transport::Transport;

use crate::error::{FrameError, Result};

/// Framing parameters for a read, snapshotted from the owning session.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Sentinel byte marking logical end of a message.
    pub term_char: u8,
    /// Require the response to end with the termination character; a short
    /// receive that does not is given exactly one corrective follow-up.
    pub assure_end: bool,
}

impl ReadOptions {
    /// Same framing with the corrective follow-up disabled, for the bulk
    /// segments of an unknown-length read.
    fn without_assure(self) -> Self {
        Self {
            assure_end: false,
            ..self
        }
    }
}

/// Result of one bounded read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedRead {
    /// Bytes placed at the front of the caller's buffer.
    pub count: usize,
    /// True iff the final receive filled the requested capacity without the
    /// transport reporting end-of-message, or the transport signalled that
    /// more bytes remain queued.
    pub more_available: bool,
}

/// One bounded receive into the caller's buffer, with an optional single
/// corrective follow-up.
///
/// Some transports can return a response up to the socket-read boundary
/// before the termination byte has arrived. When `assure_end` is set and the
/// receive came up short of capacity without ending on the terminator, one
/// more receive is issued into the remaining capacity and `more_available`
/// is recomputed from it. This is a best-effort, single-retry safeguard —
/// never a loop; callers needing full-message semantics use
/// [`read_unbounded`].
pub fn read_bounded(
    transport: &mut dyn Transport,
    buf: &mut [u8],
    opts: &ReadOptions,
) -> Result<BoundedRead> {
    let (first, status) = transport.receive(buf)?;
    let mut count = first;
    let mut more_available = status.more_data();

    if opts.assure_end && count > 0 && count < buf.len() && buf[count - 1] != opts.term_char {
        let (extra, status) = transport.receive(&mut buf[count..])?;
        count += extra;
        more_available = status.more_data();
        // Still unterminated with the buffer now full: report the remainder
        // as pending rather than retrying again.
        if !more_available && count == buf.len() && buf[count - 1] != opts.term_char {
            more_available = true;
        }
    }

    Ok(BoundedRead {
        count,
        more_available,
    })
}

/// Assemble a message of unknown length from bounded receives.
///
/// The first probe of `first_len` bytes goes through `scratch` and is
/// returned directly when nothing more is pending — short responses never
/// touch the staging buffer. Otherwise `next_len`-sized segments are
/// appended until a receive comes up short or stops reporting pending data.
/// The two sizes trade memory against latency: a small probe for the common
/// short response, large follow-up segments to keep round trips down on bulk
/// transfers.
///
/// A zero-byte first probe with nothing pending yields an empty message.
pub fn read_unbounded(
    transport: &mut dyn Transport,
    scratch: &mut [u8],
    first_len: usize,
    next_len: usize,
    opts: &ReadOptions,
) -> Result<BytesMut> {
    let largest = first_len.max(next_len);
    if largest > scratch.len() {
        return Err(FrameError::RequestTooLarge {
            requested: largest,
            capacity: scratch.len(),
        });
    }

    let first = read_bounded(transport, &mut scratch[..first_len], opts)?;
    let mut message = BytesMut::from(&scratch[..first.count]);
    if !first.more_available {
        return Ok(message);
    }

    let segment_opts = opts.without_assure();
    let mut segments = 1usize;
    loop {
        let read = read_bounded(transport, &mut scratch[..next_len], &segment_opts)?;
        message.extend_from_slice(&scratch[..read.count]);
        segments += 1;
        if !read.more_available || read.count < next_len {
            break;
        }
    }
    debug!(segments, total = message.len(), "assembled segmented response");

    Ok(message)
}

/// Strip all trailing occurrences of the termination character.
pub fn trim_term_chars(data: &[u8], term_char: u8) -> &[u8] {
    let mut end = data.len();
    while end > 0 && data[end - 1] == term_char {
        end -= 1;
    }
    &data[..end]
}
