//! Sample source adapters (A7): turn a recorded file or a live TCP
//! byte stream into the `Vec<Complex64>` blocks the tracking core
//! consumes. Modeled on `recording.rs` (`IQFileType`, buffered file
//! reads) and `network.rs` (`RtlSdrTcp`'s background reader thread over
//! an `Arc<Mutex<VecDeque<..>>>`), stripped of the rtl-sdr hardware
//! control handshake, which is out of scope here.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read as IoRead, Seek, SeekFrom};
use std::net::TcpStream;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;

use num_complex::Complex64;

use crate::error::{Result, TrackingError};

/// On-disk sample encodings, matching `IQFileType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IqSampleFormat {
    PairFloat32,
    PairInt16,
    OneInt8Real,
}

impl IqSampleFormat {
    fn sample_size_bytes(self) -> usize {
        match self {
            IqSampleFormat::PairFloat32 => 2 * 4,
            IqSampleFormat::PairInt16 => 2 * 2,
            IqSampleFormat::OneInt8Real => 1,
        }
    }
}

impl FromStr for IqSampleFormat {
    type Err = TrackingError;
    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        match input {
            "2xf32" => Ok(IqSampleFormat::PairFloat32),
            "2xi16" => Ok(IqSampleFormat::PairInt16),
            "i8" => Ok(IqSampleFormat::OneInt8Real),
            other => Err(TrackingError::ConfigInvalid(format!(
                "unknown sample format {other}"
            ))),
        }
    }
}

impl fmt::Display for IqSampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IqSampleFormat::PairFloat32 => write!(f, "2xf32"),
            IqSampleFormat::PairInt16 => write!(f, "2xi16"),
            IqSampleFormat::OneInt8Real => write!(f, "i8"),
        }
    }
}

/// Blocking pull-based source of complex baseband samples.
pub trait SampleSource {
    /// Read exactly `num_samples` complex samples, advancing the
    /// source's internal cursor. Errs at end-of-stream.
    fn read(&mut self, num_samples: usize) -> Result<Vec<Complex64>>;
}

/// File-backed source, re-opening and seeking per read like the
/// teacher's `IQRecording::read_iq_file` rather than keeping a live
/// file handle across calls.
pub struct FileSampleSource {
    path: PathBuf,
    format: IqSampleFormat,
    cursor_samples: usize,
}

impl FileSampleSource {
    pub fn new(path: PathBuf, format: IqSampleFormat) -> Self {
        Self {
            path,
            format,
            cursor_samples: 0,
        }
    }
}

impl SampleSource for FileSampleSource {
    fn read(&mut self, num_samples: usize) -> Result<Vec<Complex64>> {
        let file = File::open(&self.path)?;
        let sample_size = self.format.sample_size_bytes();
        let mut reader = BufReader::with_capacity(sample_size * num_samples, &file);
        reader.seek(SeekFrom::Start((self.cursor_samples * sample_size) as u64))?;

        let mut out = Vec::with_capacity(num_samples);
        while out.len() < num_samples {
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                return Err(TrackingError::AllocationFailed(
                    "end of sample file reached before filling block".to_string(),
                ));
            }
            let mut consumed = 0;
            for chunk in buf.chunks_exact(sample_size) {
                out.push(decode_sample(self.format, chunk));
                consumed += sample_size;
                if out.len() == num_samples {
                    break;
                }
            }
            reader.consume(consumed);
        }

        self.cursor_samples += num_samples;
        Ok(out)
    }
}

fn decode_sample(format: IqSampleFormat, chunk: &[u8]) -> Complex64 {
    match format {
        IqSampleFormat::PairFloat32 => {
            let i = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let q = f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
            Complex64::new(i as f64, q as f64)
        }
        IqSampleFormat::PairInt16 => {
            let i = i16::from_le_bytes([chunk[0], chunk[1]]);
            let q = i16::from_le_bytes([chunk[2], chunk[3]]);
            Complex64::new(i as f64 / i16::MAX as f64, q as f64 / i16::MAX as f64)
        }
        IqSampleFormat::OneInt8Real => Complex64::new(chunk[0] as i8 as f64 / i8::MAX as f64, 0.0),
    }
}

/// Live TCP source: a background thread drains the socket into a
/// shared deque; `read` blocks (with a short poll sleep) until enough
/// samples have accumulated.
pub struct TcpSampleSource {
    queue: Arc<Mutex<VecDeque<Complex64>>>,
    available: Arc<Mutex<usize>>,
    exit_req: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
}

impl TcpSampleSource {
    pub fn connect(addr: &str) -> Result<Self> {
        let mut socket = TcpStream::connect(addr)
            .map_err(|e| TrackingError::AllocationFailed(format!("tcp connect to {addr}: {e}")))?;

        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let available = Arc::new(Mutex::new(0));
        let exit_req = Arc::new(AtomicBool::new(false));

        let q = queue.clone();
        let avail = available.clone();
        let exit = exit_req.clone();
        let reader_thread = thread::spawn(move || {
            let mut buf = [0u8; 2 * 4096];
            loop {
                if exit.load(Ordering::SeqCst) {
                    break;
                }
                if socket.read_exact(&mut buf).is_err() {
                    log::warn!("tcp sample source: connection lost");
                    exit.store(true, Ordering::SeqCst);
                    break;
                }
                let mut locked = q.lock().unwrap();
                for pair in buf.chunks_exact(2) {
                    let re = (pair[0] as f64 - 127.5) / 128.0;
                    let im = (pair[1] as f64 - 127.5) / 128.0;
                    locked.push_back(Complex64::new(re, im));
                }
                *avail.lock().unwrap() = locked.len();
            }
        });

        Ok(Self {
            queue,
            available,
            exit_req,
            reader_thread: Some(reader_thread),
        })
    }
}

impl SampleSource for TcpSampleSource {
    fn read(&mut self, num_samples: usize) -> Result<Vec<Complex64>> {
        loop {
            if self.exit_req.load(Ordering::SeqCst) {
                return Err(TrackingError::AllocationFailed(
                    "tcp sample source disconnected".to_string(),
                ));
            }
            if *self.available.lock().unwrap() >= num_samples {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(1));
        }
        let mut queue = self.queue.lock().unwrap();
        let out: Vec<Complex64> = queue.drain(0..num_samples).collect();
        *self.available.lock().unwrap() = queue.len();
        Ok(out)
    }
}

impl Drop for TcpSampleSource {
    fn drop(&mut self) {
        self.exit_req.store(true, Ordering::SeqCst);
        if let Some(th) = self.reader_thread.take() {
            let _ = th.join();
        }
    }
}
