use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, info, trace};

use crate::error::{Result, TransportError};
use crate::traits::{check_report_size, HidDevice, DEFAULT_REPORT_SIZE};

/// Report id prepended to every output report. FIDO devices use unnumbered reports.
const OUTPUT_REPORT_ID: u8 = 0x00;

/// Linux hidraw transport.
///
/// Wraps an open `/dev/hidrawN` node. Output reports are written with a
/// leading report id byte; input reports are read one per `read(2)` after
/// `poll(2)` signals readiness, so the read timeout is honored without
/// putting the descriptor in non-blocking mode.
pub struct HidrawDevice {
    file: File,
    path: PathBuf,
    report_size: usize,
    write_buf: Vec<u8>,
}

impl HidrawDevice {
    /// Open a hidraw node with the default 64-byte report size.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_report_size(path, DEFAULT_REPORT_SIZE)
    }

    /// Open a hidraw node with an explicit report size.
    pub fn open_with_report_size(path: impl AsRef<Path>, report_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| TransportError::Open {
                path: path.clone(),
                source: e,
            })?;

        info!(?path, report_size, "opened hidraw device");
        Ok(Self::from_file(file, path, report_size))
    }

    pub(crate) fn from_file(file: File, path: PathBuf, report_size: usize) -> Self {
        Self {
            file,
            path,
            report_size,
            write_buf: Vec::with_capacity(report_size + 1),
        }
    }

    /// The device node path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait until the descriptor is readable. Returns `Ok(false)` on timeout.
    ///
    /// A single wait is capped at `u16::MAX` milliseconds.
    fn wait_readable(&self, timeout: Duration) -> Result<bool> {
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);

        loop {
            let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
            let ready = match poll(&mut fds, PollTimeout::from(millis)) {
                Ok(ready) => ready,
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(TransportError::Io(std::io::Error::from(errno))),
            };
            if ready == 0 {
                return Ok(false);
            }

            let revents = fds[0].revents().unwrap_or_else(PollFlags::empty);
            if revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL)
                && !revents.contains(PollFlags::POLLIN)
            {
                return Err(TransportError::Disconnected);
            }
            return Ok(true);
        }
    }
}

impl HidDevice for HidrawDevice {
    fn report_size(&self) -> usize {
        self.report_size
    }

    fn write_report(&mut self, report: &[u8]) -> Result<()> {
        check_report_size(self.report_size, report)?;

        self.write_buf.clear();
        self.write_buf.push(OUTPUT_REPORT_ID);
        self.write_buf.extend_from_slice(report);

        loop {
            match self.file.write(&self.write_buf) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) if n == self.write_buf.len() => break,
                Ok(n) => {
                    // hidraw writes are all-or-nothing; a short write means a broken node.
                    return Err(TransportError::Io(std::io::Error::new(
                        ErrorKind::WriteZero,
                        format!("short hidraw write: {n} of {}", self.write_buf.len()),
                    )));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(map_io_error(err)),
            }
        }

        trace!(path = ?self.path, "wrote report");
        Ok(())
    }

    fn read_report(&mut self, timeout: Duration) -> Result<Bytes> {
        if !self.wait_readable(timeout)? {
            return Err(TransportError::Timeout(timeout));
        }

        let mut buf = vec![0u8; self.report_size];
        let read = loop {
            match self.file.read(&mut buf) {
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(map_io_error(err)),
            }
        };

        if read == 0 {
            debug!(path = ?self.path, "hidraw read returned EOF");
            return Err(TransportError::Disconnected);
        }
        if read != self.report_size {
            return Err(TransportError::ReportSize {
                expected: self.report_size,
                actual: read,
            });
        }

        trace!(path = ?self.path, "read report");
        Ok(Bytes::from(buf))
    }

    fn description(&self) -> String {
        format!("hidraw {}", self.path.display())
    }
}

impl std::fmt::Debug for HidrawDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HidrawDevice")
            .field("path", &self.path)
            .field("report_size", &self.report_size)
            .finish()
    }
}

fn map_io_error(err: std::io::Error) -> TransportError {
    if err.raw_os_error() == Some(libc::ENODEV) {
        TransportError::Disconnected
    } else {
        TransportError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use std::os::fd::OwnedFd;
    use std::os::unix::net::UnixStream;

    use super::*;

    fn socket_device(report_size: usize) -> (HidrawDevice, UnixStream) {
        let (left, right) = UnixStream::pair().unwrap();
        let file = File::from(OwnedFd::from(left));
        let device = HidrawDevice::from_file(file, PathBuf::from("/dev/hidraw-test"), report_size);
        (device, right)
    }

    #[test]
    fn open_missing_node_fails() {
        let result = HidrawDevice::open("/dev/hidraw-does-not-exist-u2fhid");
        assert!(matches!(result, Err(TransportError::Open { .. })));
    }

    #[test]
    fn write_prefixes_report_id() {
        let (mut device, mut peer) = socket_device(8);
        device.write_report(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        let mut buf = [0u8; 9];
        peer.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn write_rejects_wrong_size() {
        let (mut device, _peer) = socket_device(8);
        let err = device.write_report(&[0u8; 7]).unwrap_err();
        assert!(matches!(err, TransportError::ReportSize { .. }));
    }

    #[test]
    fn read_returns_one_report() {
        let (mut device, mut peer) = socket_device(8);
        peer.write_all(&[9u8; 8]).unwrap();

        let report = device.read_report(Duration::from_secs(1)).unwrap();
        assert_eq!(report.as_ref(), &[9u8; 8]);
    }

    #[test]
    fn read_waits_for_late_report() {
        let (mut device, mut peer) = socket_device(8);
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            peer.write_all(&[3u8; 8]).unwrap();
            peer
        });

        let report = device.read_report(Duration::from_secs(2)).unwrap();
        assert_eq!(report.as_ref(), &[3u8; 8]);
        writer.join().unwrap();
    }

    #[test]
    fn huge_timeout_is_clamped() {
        let (mut device, mut peer) = socket_device(8);
        peer.write_all(&[4u8; 8]).unwrap();

        let report = device.read_report(Duration::MAX).unwrap();
        assert_eq!(report.as_ref(), &[4u8; 8]);
    }

    #[test]
    fn read_times_out_without_input() {
        let (mut device, _peer) = socket_device(8);
        let err = device.read_report(Duration::from_millis(20)).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn read_after_peer_closed_reports_disconnect() {
        let (mut device, peer) = socket_device(8);
        drop(peer);
        let err = device.read_report(Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, TransportError::Disconnected));
    }

    #[test]
    fn description_names_path() {
        let (device, _peer) = socket_device(64);
        assert_eq!(device.description(), "hidraw /dev/hidraw-test");
        assert_eq!(device.report_size(), 64);
    }
}
