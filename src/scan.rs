use std::io;
use std::time::{Duration, Instant};

use crate::error::ChannelError;
use crate::port::Channel;

/// Default cap on bytes buffered while hunting for a delimiter. Generous
/// for both frame kinds: telemetry records are tens of bytes, camera
/// frames a few hundred kB.
pub const DEFAULT_MAX_FRAME: usize = 1 << 20;

/// Limits applied to a single delimiter scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanLimits {
    /// Bytes buffered before the scan is abandoned.
    pub max_frame: usize,
    /// Overall deadline for the delimiter to appear. `None` waits forever.
    pub deadline: Option<Duration>,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_frame: DEFAULT_MAX_FRAME,
            deadline: None,
        }
    }
}

/// Read from `channel` until the buffered bytes end with `delimiter`,
/// then return everything read, split at the delimiter boundary.
///
/// Reads one byte at a time so the scan never consumes past the
/// delimiter; at radio baud rates the transport is the bottleneck, not
/// the per-byte read. Driver poll timeouts are retried until `limits`
/// says otherwise.
pub fn scan_until(
    channel: &mut dyn Channel,
    delimiter: &[u8],
    limits: ScanLimits,
) -> Result<(Vec<u8>, Vec<u8>), ChannelError> {
    debug_assert!(!delimiter.is_empty(), "empty delimiter never matches");
    if delimiter.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let started = Instant::now();
    let mut buf: Vec<u8> = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        if buf.len() >= delimiter.len() && buf[buf.len() - delimiter.len()..] == *delimiter {
            let tail = buf.split_off(buf.len() - delimiter.len());
            return Ok((buf, tail));
        }
        if buf.len() >= limits.max_frame {
            return Err(ChannelError::FrameTooLarge {
                limit: limits.max_frame,
            });
        }
        if let Some(deadline) = limits.deadline
            && started.elapsed() >= deadline
        {
            return Err(ChannelError::Timeout(deadline));
        }

        match channel.read(&mut byte) {
            Ok(0) => return Err(ChannelError::Closed),
            Ok(_) => buf.push(byte[0]),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut
                        | io::ErrorKind::WouldBlock
                        | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(ChannelError::Io(e)),
        }
    }
}
