//! Scripted in-memory channel standing in for the radio in tests.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::port::Channel;

pub enum Step {
    /// Serve these bytes across however many reads the caller makes.
    Feed(Vec<u8>),
    /// One driver-style poll timeout.
    TimedOut,
    /// Park the reader until the test signals.
    WaitFor(Receiver<()>),
}

/// What `read` does once the script runs out.
#[derive(Clone, Copy)]
pub enum OnEmpty {
    /// Pretend the channel closed.
    Eof,
    /// Keep returning poll timeouts, like a silent but healthy radio.
    TimedOut,
}

/// Clones share the same script and write log, so a test can hand one
/// clone to the session and keep another to inspect.
#[derive(Clone)]
pub struct ScriptChannel {
    shared: Arc<Shared>,
}

struct Shared {
    steps: Mutex<VecDeque<Step>>,
    writes: Mutex<Vec<u8>>,
    on_empty: OnEmpty,
}

impl ScriptChannel {
    pub fn steps(steps: Vec<Step>) -> Self {
        Self::with_on_empty(steps, OnEmpty::Eof)
    }

    /// One contiguous byte stream, then EOF.
    pub fn feed(stream: &[u8]) -> Self {
        Self::steps(vec![Step::Feed(stream.to_vec())])
    }

    /// Separately delivered chunks, then EOF.
    pub fn chunks(chunks: &[&[u8]]) -> Self {
        Self::steps(chunks.iter().map(|c| Step::Feed(c.to_vec())).collect())
    }

    /// A channel that never delivers anything but never closes either.
    pub fn silent() -> Self {
        Self::with_on_empty(Vec::new(), OnEmpty::TimedOut)
    }

    pub fn with_on_empty(steps: Vec<Step>, on_empty: OnEmpty) -> Self {
        Self {
            shared: Arc::new(Shared {
                steps: Mutex::new(steps.into()),
                writes: Mutex::new(Vec::new()),
                on_empty,
            }),
        }
    }

    /// Everything written to the channel so far, in order.
    pub fn written(&self) -> Vec<u8> {
        self.shared.writes.lock().clone()
    }
}

impl Channel for ScriptChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let step = self.shared.steps.lock().pop_front();
            match step {
                None => {
                    return match self.shared.on_empty {
                        OnEmpty::Eof => Ok(0),
                        OnEmpty::TimedOut => {
                            Err(io::Error::new(io::ErrorKind::TimedOut, "script exhausted"))
                        }
                    };
                }
                Some(Step::Feed(mut bytes)) => {
                    if bytes.is_empty() {
                        continue;
                    }
                    let n = bytes.len().min(buf.len());
                    let rest = bytes.split_off(n);
                    buf[..n].copy_from_slice(&bytes);
                    if !rest.is_empty() {
                        self.shared.steps.lock().push_front(Step::Feed(rest));
                    }
                    return Ok(n);
                }
                Some(Step::TimedOut) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "poll timeout"));
                }
                Some(Step::WaitFor(gate)) => {
                    let _ = gate.recv();
                }
            }
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.shared.writes.lock().extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A decodable 1x1 JPEG, markers included, for image-path tests.
pub fn tiny_jpeg() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(1, 1, image::Rgb([180, 40, 40]));
    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new(&mut out);
    encoder
        .encode(img.as_raw(), 1, 1, image::ExtendedColorType::Rgb8)
        .expect("in-memory jpeg encode");
    out
}
