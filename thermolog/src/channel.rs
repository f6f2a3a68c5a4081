//! Measurement channel: fixed-size frames over a point-to-point transport.
//!
//! The producer and the ingest worker exchange [`Record`]s as fixed-size
//! binary frames. The transport here is a Unix domain socket: the daemon
//! binds a named endpoint and accepts exactly one producer; the producer
//! connects and writes one frame per measurement. Any point-to-point byte
//! stream works, which is why workers consume the [`Channel`] trait rather
//! than a concrete socket.
//!
//! Reads are blocking. A read timeout can be armed so the ingest worker can
//! poll its shutdown token; a timeout never desynchronizes framing because
//! partially read frames are carried across calls.

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ChannelError;
use crate::record::Record;

/// Serialized frame size: `f32` temperature, `f32` feels-like, `i64`
/// timestamp, all little-endian.
pub const FRAME_SIZE: usize = 16;

/// Blocking, message-framed duplex channel carrying records.
pub trait Channel {
    /// Reads exactly one record, blocking until a full frame arrives.
    ///
    /// # Errors
    ///
    /// [`ChannelError::Closed`] when the peer hangs up,
    /// [`ChannelError::Timeout`] when a read timeout is armed and expires
    /// (retryable), and [`ChannelError::Read`] for everything else.
    fn read(&mut self) -> Result<Record, ChannelError>;

    /// Writes one record as a single frame, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Write`] if the frame cannot be written in
    /// full.
    fn write(&mut self, record: &Record) -> Result<usize, ChannelError>;
}

/// Encodes a record into its wire frame.
pub fn encode_frame(record: &Record) -> [u8; FRAME_SIZE] {
    let mut frame = [0u8; FRAME_SIZE];
    frame[0..4].copy_from_slice(&record.temperature.to_le_bytes());
    frame[4..8].copy_from_slice(&record.feels_like.to_le_bytes());
    frame[8..16].copy_from_slice(&record.timestamp.to_le_bytes());
    frame
}

/// Decodes a wire frame into a record.
pub fn decode_frame(frame: &[u8; FRAME_SIZE]) -> Record {
    let mut f32_bytes = [0u8; 4];
    let mut i64_bytes = [0u8; 8];

    f32_bytes.copy_from_slice(&frame[0..4]);
    let temperature = f32::from_le_bytes(f32_bytes);
    f32_bytes.copy_from_slice(&frame[4..8]);
    let feels_like = f32::from_le_bytes(f32_bytes);
    i64_bytes.copy_from_slice(&frame[8..16]);
    let timestamp = i64::from_le_bytes(i64_bytes);

    Record::new(temperature, feels_like, timestamp)
}

/// One endpoint of a Unix-domain-socket channel.
#[derive(Debug)]
pub struct SocketChannel {
    stream: UnixStream,
    /// Partial frame carried across timed-out reads.
    buf: [u8; FRAME_SIZE],
    filled: usize,
}

impl SocketChannel {
    /// Connects to a bound channel endpoint (producer side).
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Connect`] if the endpoint cannot be reached.
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<Self, ChannelError> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|e| ChannelError::Connect {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Self::from_stream(stream))
    }

    /// Wraps an already-connected stream (e.g. an accepted connection or one
    /// half of a socket pair).
    pub fn from_stream(stream: UnixStream) -> Self {
        Self {
            stream,
            buf: [0u8; FRAME_SIZE],
            filled: 0,
        }
    }

    /// Arms or clears a read timeout.
    ///
    /// With a timeout armed, [`Channel::read`] returns
    /// [`ChannelError::Timeout`] instead of blocking forever; the ingest
    /// worker uses this as its cancellation poll point.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Read`] if the socket option cannot be set.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), ChannelError> {
        self.stream
            .set_read_timeout(timeout)
            .map_err(|e| ChannelError::Read { source: e })
    }
}

impl Channel for SocketChannel {
    fn read(&mut self) -> Result<Record, ChannelError> {
        while self.filled < FRAME_SIZE {
            match self.stream.read(&mut self.buf[self.filled..]) {
                Ok(0) => return Err(ChannelError::Closed),
                Ok(n) => self.filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    return Err(ChannelError::Timeout);
                }
                Err(e) => return Err(ChannelError::Read { source: e }),
            }
        }
        self.filled = 0;
        Ok(decode_frame(&self.buf))
    }

    fn write(&mut self, record: &Record) -> Result<usize, ChannelError> {
        self.stream
            .write_all(&encode_frame(record))
            .map_err(|e| ChannelError::Write { source: e })?;
        Ok(FRAME_SIZE)
    }
}

/// Bound endpoint the daemon listens on for its producer.
#[derive(Debug)]
pub struct ChannelListener {
    listener: UnixListener,
    path: PathBuf,
}

impl ChannelListener {
    /// Binds the named endpoint, replacing a stale socket file from a
    /// previous run.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Bind`] if the endpoint cannot be bound.
    pub fn bind<P: AsRef<Path>>(path: P) -> Result<Self, ChannelError> {
        let path = path.as_ref().to_path_buf();
        // A leftover socket file would make bind fail with AddrInUse.
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).map_err(|e| ChannelError::Bind {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Self { listener, path })
    }

    /// Blocks until the producer connects.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Accept`] if accepting fails.
    pub fn accept(&self) -> Result<SocketChannel, ChannelError> {
        let (stream, _) = self
            .listener
            .accept()
            .map_err(|e| ChannelError::Accept { source: e })?;
        Ok(SocketChannel::from_stream(stream))
    }

    /// The filesystem path of the bound endpoint.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ChannelListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trip() {
        let record = Record::new(-2.69, -8.93, 1_737_001_061);
        let decoded = decode_frame(&encode_frame(&record));
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_socket_pair_transfer() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut producer = SocketChannel::from_stream(a);
        let mut consumer = SocketChannel::from_stream(b);

        let record = Record::new(21.5, 19.0, 1_700_000_000);
        assert_eq!(producer.write(&record).unwrap(), FRAME_SIZE);
        assert_eq!(consumer.read().unwrap(), record);
    }

    #[test]
    fn test_read_reports_closed_on_hangup() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut consumer = SocketChannel::from_stream(b);
        drop(a);

        assert!(matches!(consumer.read(), Err(ChannelError::Closed)));
    }

    #[test]
    fn test_timeout_preserves_partial_frame() {
        let (a, b) = UnixStream::pair().unwrap();
        let mut producer = a;
        let mut consumer = SocketChannel::from_stream(b);
        consumer
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();

        // Half a frame, then a timeout, then the rest.
        let record = Record::new(3.5, 1.0, 42);
        let frame = encode_frame(&record);
        producer.write_all(&frame[..7]).unwrap();

        assert!(matches!(consumer.read(), Err(ChannelError::Timeout)));

        producer.write_all(&frame[7..]).unwrap();
        assert_eq!(consumer.read().unwrap(), record);
    }

    #[test]
    fn test_listener_accept_and_connect() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("thermolog.sock");

        let listener = ChannelListener::bind(&socket_path).unwrap();
        let record = Record::new(1.0, 2.0, 3);

        let path = socket_path.clone();
        let producer = std::thread::spawn(move || {
            let mut channel = SocketChannel::connect(&path).unwrap();
            channel.write(&record).unwrap();
        });

        let mut consumer = listener.accept().unwrap();
        assert_eq!(consumer.read().unwrap(), record);
        producer.join().unwrap();
    }
}
