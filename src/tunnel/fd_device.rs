//! Unix [`TunDevice`] over an established interface descriptor.
//!
//! Follows the fd-handoff model of mobile VPN stacks: the platform performs
//! interface establishment, addressing, and routing, then hands the process
//! a file descriptor. Reads poll with a timeout so the filter loop suspends
//! while no data is pending instead of busy-looping.

use std::io;
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::time::Duration;

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::unistd;

use super::{PacketRead, TunDevice};

pub struct FdTunDevice {
    fd: OwnedFd,
}

impl FdTunDevice {
    /// Wrap an established interface descriptor. The descriptor is owned:
    /// dropping the device closes it, which is the release the platform
    /// expects when the engine stops.
    pub fn new(fd: OwnedFd) -> Self {
        Self { fd }
    }
}

impl TunDevice for FdTunDevice {
    fn read_packet(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<PacketRead> {
        let timeout = PollTimeout::try_from(timeout).unwrap_or(PollTimeout::MAX);
        let mut fds = [PollFd::new(self.fd.as_fd(), PollFlags::POLLIN)];
        let ready = match poll(&mut fds, timeout) {
            Ok(n) => n,
            Err(nix::errno::Errno::EINTR) => return Ok(PacketRead::TimedOut),
            Err(e) => return Err(io::Error::from(e)),
        };
        if ready == 0 {
            return Ok(PacketRead::TimedOut);
        }

        match unistd::read(self.fd.as_raw_fd(), buf) {
            Ok(0) => Ok(PacketRead::Closed),
            Ok(n) => Ok(PacketRead::Packet(n)),
            Err(nix::errno::Errno::EINTR) => Ok(PacketRead::TimedOut),
            Err(e) => Err(io::Error::from(e)),
        }
    }

    fn write_packet(&mut self, packet: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < packet.len() {
            match unistd::write(self.fd.as_fd(), &packet[written..]) {
                Ok(n) => written += n,
                Err(nix::errno::Errno::EINTR) => continue,
                Err(e) => return Err(io::Error::from(e)),
            }
        }
        Ok(())
    }
}
