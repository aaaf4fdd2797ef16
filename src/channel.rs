//! Synchronous control channel carrying the fixed-size job records
//!
//! The channel is a blocking Unix domain socket with exactly one
//! outstanding request at a time. Records are written and read whole; a
//! short transfer means the peer died and the channel reports a fatal
//! transport error. The only non-fatal condition is end of stream on a
//! record boundary, which the worker treats as a clean shutdown.

use std::{
    io::{Read, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::{Path, PathBuf},
};

use crate::{
    error::{Result, ShuttleError},
    protocol::{JobRequest, JobResponse, JOB_REQUEST_SIZE, JOB_RESPONSE_SIZE},
};

/// Host-side listener for the control socket
///
/// The host binds before spawning the worker so the worker's connect
/// cannot race the listener.
#[derive(Debug)]
pub struct ControlListener {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlListener {
    /// Bind the control socket at `name`
    pub fn bind(name: impl AsRef<Path>) -> Result<Self> {
        let path = name.as_ref().to_path_buf();
        let listener = UnixListener::bind(&path).map_err(|e| {
            ShuttleError::transport(format!(
                "failed to bind control socket {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self { listener, path })
    }

    /// Block until the worker connects
    pub fn accept(&self) -> Result<ControlChannel> {
        let (stream, _) = self
            .listener
            .accept()
            .map_err(|e| ShuttleError::transport(format!("control accept failed: {}", e)))?;
        Ok(ControlChannel::from_stream(stream))
    }

    /// Socket path the listener is bound to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ControlListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// One connected end of the control channel
#[derive(Debug)]
pub struct ControlChannel {
    stream: UnixStream,
}

impl ControlChannel {
    /// Worker-side connect to the host's control socket
    pub fn connect(name: impl AsRef<Path>) -> Result<Self> {
        let path = name.as_ref();
        let stream = UnixStream::connect(path).map_err(|e| {
            ShuttleError::transport(format!(
                "failed to connect control socket {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: UnixStream) -> Self {
        Self { stream }
    }

    /// Host side: write one request record
    pub fn send_request(&mut self, request: &JobRequest) -> Result<()> {
        self.write_record(&request.to_bytes(), "request")
    }

    /// Host side: block for the matching response record
    pub fn receive_response(&mut self) -> Result<JobResponse> {
        let mut buf = [0u8; JOB_RESPONSE_SIZE];
        self.read_record(&mut buf, "response")?;
        JobResponse::from_bytes(&buf)
    }

    /// Worker side: block for the next request record
    ///
    /// Returns `None` when the host closed the channel between records.
    pub fn receive_request(&mut self) -> Result<Option<JobRequest>> {
        let mut buf = [0u8; JOB_REQUEST_SIZE];
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(ShuttleError::transport(format!(
                        "short request read: {} of {} bytes",
                        filled, JOB_REQUEST_SIZE
                    )))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(ShuttleError::transport(format!(
                        "request read failed: {}",
                        e
                    )))
                }
            }
        }
        JobRequest::from_bytes(&buf).map(Some)
    }

    /// Worker side: write one response record
    pub fn send_response(&mut self, response: &JobResponse) -> Result<()> {
        self.write_record(&response.to_bytes(), "response")
    }

    fn write_record(&mut self, bytes: &[u8], kind: &str) -> Result<()> {
        self.stream.write_all(bytes).map_err(|e| {
            ShuttleError::transport(format!("{} write failed ({} bytes): {}", kind, bytes.len(), e))
        })
    }

    fn read_record(&mut self, buf: &mut [u8], kind: &str) -> Result<()> {
        self.stream.read_exact(buf).map_err(|e| {
            ShuttleError::transport(format!("{} read failed ({} bytes): {}", kind, buf.len(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JobStatus;
    use tempfile::TempDir;

    fn pair() -> (ControlChannel, ControlChannel) {
        let (a, b) = UnixStream::pair().unwrap();
        (ControlChannel::from_stream(a), ControlChannel::from_stream(b))
    }

    #[test]
    fn test_request_and_response_cross_the_channel_intact() {
        let (mut host, mut worker) = pair();

        let request = JobRequest {
            input_len: 640,
            max_side: 2048,
            target_format: 1,
            quality: 0.5,
            encode_target: 0,
            thread_count: 2,
        };
        host.send_request(&request).unwrap();

        let received = worker.receive_request().unwrap().unwrap();
        assert_eq!(received, request);
        assert_eq!(received.to_bytes(), request.to_bytes());

        let response = JobResponse {
            status: JobStatus::Success,
            output_len: 64,
            width: 4,
            height: 4,
        };
        worker.send_response(&response).unwrap();
        assert_eq!(host.receive_response().unwrap(), response);
    }

    #[test]
    fn test_clean_close_between_records() {
        let (host, mut worker) = pair();
        drop(host);
        assert!(worker.receive_request().unwrap().is_none());
    }

    #[test]
    fn test_partial_record_is_fatal() {
        let (host, mut worker) = pair();

        // Write half a record and hang up
        let mut raw = host.stream;
        raw.write_all(&[0u8; JOB_REQUEST_SIZE / 2]).unwrap();
        drop(raw);

        let err = worker.receive_request().unwrap_err();
        assert!(matches!(err, ShuttleError::Transport { .. }));
    }

    #[test]
    fn test_response_read_fails_when_peer_dies() {
        let (mut host, worker) = pair();
        drop(worker);

        let err = host.receive_response().unwrap_err();
        assert!(matches!(err, ShuttleError::Transport { .. }));
    }

    #[test]
    fn test_socket_path_connect_accept() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("control.sock");

        let listener = ControlListener::bind(&socket).unwrap();
        let connector = {
            let socket = socket.clone();
            std::thread::spawn(move || ControlChannel::connect(&socket).unwrap())
        };

        let mut host = listener.accept().unwrap();
        let mut worker = connector.join().unwrap();

        let request = JobRequest {
            input_len: 1,
            max_side: 0,
            target_format: 0,
            quality: 1.0,
            encode_target: 0,
            thread_count: 0,
        };
        host.send_request(&request).unwrap();
        assert_eq!(worker.receive_request().unwrap().unwrap(), request);
    }

    #[test]
    fn test_listener_unlinks_socket_on_drop() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("gone.sock");
        {
            let _listener = ControlListener::bind(&socket).unwrap();
            assert!(socket.exists());
        }
        assert!(!socket.exists());
    }
}
