//! VISCA over TCP.
//!
//! PTZOptics-style controllers accept raw VISCA packets on a TCP port
//! (5678 by default). Every packet starts with `0x80 | address` and ends with
//! `0xFF`. The camera answers each command with an ACK (`90 4y FF`) and a
//! completion (`90 5y FF`), or an error (`90 6y ee FF`).
//!
//! Replies are drained before every send so the socket buffer never fills.
//! With `await_ack` the sender also waits for the ACK and surfaces error
//! replies as `CameraError::Rejected`.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use super::{CameraCommandSink, CameraError, CameraResult, Command, Direction};

pub const DEFAULT_PORT: u16 = 5678;

const PAN_SPEED_MAX: u8 = 0x18;
const TILT_SPEED_MAX: u8 = 0x14;
const ZOOM_MAX: u16 = 0x4000;

/// Connection settings for a VISCA camera.
#[derive(Clone, Debug)]
pub struct ViscaConfig {
    pub host: String,
    pub port: u16,
    /// Camera address on the VISCA bus (1..=7).
    pub address: u8,
    /// Connect and ACK timeout.
    pub timeout: Duration,
    pub await_ack: bool,
}

impl Default for ViscaConfig {
    fn default() -> Self {
        Self {
            host: "192.168.100.88".to_string(),
            port: DEFAULT_PORT,
            address: 1,
            timeout: Duration::from_millis(500),
            await_ack: false,
        }
    }
}

/// Parsed camera reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reply {
    Ack,
    Completion,
    Error(u8),
    Other,
}

pub struct ViscaCamera {
    config: ViscaConfig,
    addr: SocketAddr,
    stream: Option<TcpStream>,
    pending: Vec<u8>,
}

impl ViscaCamera {
    /// Connect and initialize the camera (address set + interface clear).
    pub fn connect(config: ViscaConfig) -> Result<Self, CameraError> {
        let addr = (config.host.as_str(), config.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                CameraError::Protocol(format!("no address for {}:{}", config.host, config.port))
            })?;
        let mut camera = Self {
            config,
            addr,
            stream: None,
            pending: Vec::new(),
        };
        camera.reconnect()?;
        camera.init()?;
        log::info!("camera control connected to {}", camera.addr);
        Ok(camera)
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn reconnect(&mut self) -> Result<(), CameraError> {
        let stream = TcpStream::connect_timeout(&self.addr, self.config.timeout)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(self.config.timeout))?;
        self.stream = Some(stream);
        self.pending.clear();
        Ok(())
    }

    fn init(&mut self) -> CameraResult {
        self.write_packet(&address_set_packet())?;
        self.write_packet(&if_clear_packet())?;
        Ok(())
    }

    fn write_packet(&mut self, packet: &[u8]) -> CameraResult {
        if self.stream.is_none() {
            self.reconnect()?;
            // a restarted camera has forgotten its address
            self.init()?;
        }
        let stream = self.stream.as_mut().ok_or(CameraError::NotConnected)?;
        if let Err(err) = stream.write_all(packet) {
            self.stream = None;
            return Err(err.into());
        }
        Ok(())
    }

    /// Read whatever replies are already buffered, without blocking. A dropped
    /// connection is forgotten so the next write reconnects.
    fn drain_replies(&mut self) -> CameraResult {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };
        stream.set_nonblocking(true)?;
        let mut buf = [0u8; 256];
        let alive = loop {
            match stream.read(&mut buf) {
                Ok(0) => break false,
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(err) if err.kind() == ErrorKind::WouldBlock => break true,
                Err(_) => break false,
            }
        };
        if alive {
            stream.set_nonblocking(false)?;
        } else {
            log::debug!("camera control connection to {} dropped", self.addr);
            self.stream = None;
        }
        for reply in split_replies(&mut self.pending) {
            if let Reply::Error(code) = parse_reply(&reply) {
                log::debug!("camera reported error {:#04x} for an earlier command", code);
            }
        }
        Ok(())
    }

    /// Block until the ACK (or an error reply) for the last command arrives.
    fn wait_for_ack(&mut self) -> CameraResult {
        let deadline = Instant::now() + self.config.timeout;
        let mut buf = [0u8; 64];
        loop {
            for reply in split_replies(&mut self.pending) {
                match parse_reply(&reply) {
                    Reply::Ack | Reply::Completion => return Ok(()),
                    Reply::Error(code) => return Err(CameraError::Rejected { code }),
                    Reply::Other => {}
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(CameraError::Io(std::io::Error::new(
                    ErrorKind::TimedOut,
                    "no ACK from camera",
                )));
            }
            let stream = self.stream.as_mut().ok_or(CameraError::NotConnected)?;
            stream.set_read_timeout(Some(remaining))?;
            match stream.read(&mut buf) {
                Ok(0) => {
                    self.stream = None;
                    return Err(CameraError::NotConnected);
                }
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(err) => {
                    self.stream = None;
                    return Err(err.into());
                }
            }
        }
    }
}

impl CameraCommandSink for ViscaCamera {
    fn send(&mut self, command: Command) -> CameraResult {
        self.drain_replies()?;
        let packet = encode(command, self.config.address);
        log::trace!("visca -> {:02x?}", packet);
        self.write_packet(&packet)?;
        if self.config.await_ack {
            self.wait_for_ack()?;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Packet encoding
// ----------------------------------------------------------------------------

fn header(address: u8) -> u8 {
    0x80 | (address & 0x07)
}

fn address_set_packet() -> [u8; 4] {
    [0x88, 0x30, 0x01, 0xFF]
}

fn if_clear_packet() -> [u8; 5] {
    [0x88, 0x01, 0x00, 0x01, 0xFF]
}

/// Pan (`Y`) and tilt (`Z`) drive codes: 1 = left/up, 2 = right/down, 3 = stop.
fn drive_codes(direction: Direction) -> (u8, u8) {
    match direction {
        Direction::Up => (0x03, 0x01),
        Direction::Down => (0x03, 0x02),
        Direction::Left => (0x01, 0x03),
        Direction::Right => (0x02, 0x03),
        Direction::LeftUp => (0x01, 0x01),
        Direction::RightUp => (0x02, 0x01),
        Direction::LeftDown => (0x01, 0x02),
        Direction::RightDown => (0x02, 0x02),
    }
}

fn nibbles(value: u16) -> [u8; 4] {
    [
        ((value >> 12) & 0x0F) as u8,
        ((value >> 8) & 0x0F) as u8,
        ((value >> 4) & 0x0F) as u8,
        (value & 0x0F) as u8,
    ]
}

/// Encode a command as a VISCA packet for the camera at `address`.
pub fn encode(command: Command, address: u8) -> Vec<u8> {
    let h = header(address);
    match command {
        Command::Stop => vec![h, 0x01, 0x06, 0x01, 0x01, 0x01, 0x03, 0x03, 0xFF],
        Command::Home => vec![h, 0x01, 0x06, 0x04, 0xFF],
        Command::ZoomTo(level) => {
            let [p, q, r, s] = nibbles(level.min(ZOOM_MAX));
            vec![h, 0x01, 0x04, 0x47, p, q, r, s, 0xFF]
        }
        Command::PanTilt {
            direction,
            pan_speed,
            tilt_speed,
        } => {
            let (y, z) = drive_codes(direction);
            vec![
                h,
                0x01,
                0x06,
                0x01,
                pan_speed.clamp(1, PAN_SPEED_MAX),
                tilt_speed.clamp(1, TILT_SPEED_MAX),
                y,
                z,
                0xFF,
            ]
        }
        Command::IncrementalMove {
            pan_delta,
            tilt_delta,
            speed,
        } => {
            let mut packet = vec![
                h,
                0x01,
                0x06,
                0x03,
                speed.clamp(1, PAN_SPEED_MAX),
                speed.clamp(1, TILT_SPEED_MAX),
            ];
            packet.extend_from_slice(&nibbles(pan_delta as u16));
            packet.extend_from_slice(&nibbles(tilt_delta as u16));
            packet.push(0xFF);
            packet
        }
        Command::Autofocus => vec![h, 0x01, 0x04, 0x38, 0x02, 0xFF],
        Command::FocusLock(locked) => {
            vec![h, 0x0A, 0x04, 0x68, if locked { 0x02 } else { 0x03 }, 0xFF]
        }
    }
}

/// Split complete `0xFF`-terminated replies off the front of `pending`.
fn split_replies(pending: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let mut replies = Vec::new();
    while let Some(end) = pending.iter().position(|&b| b == 0xFF) {
        replies.push(pending.drain(..=end).collect());
    }
    replies
}

pub fn parse_reply(reply: &[u8]) -> Reply {
    match reply {
        [_, kind, rest @ ..] if kind & 0xF0 == 0x60 => {
            Reply::Error(rest.first().copied().filter(|&b| b != 0xFF).unwrap_or(0))
        }
        [_, kind, ..] if kind & 0xF0 == 0x40 => Reply::Ack,
        [_, kind, ..] if kind & 0xF0 == 0x50 => Reply::Completion,
        _ => Reply::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_drive_commands() {
        let up = encode(
            Command::PanTilt {
                direction: Direction::Up,
                pan_speed: 2,
                tilt_speed: 2,
            },
            1,
        );
        assert_eq!(up, vec![0x81, 0x01, 0x06, 0x01, 0x02, 0x02, 0x03, 0x01, 0xFF]);

        let right_down = encode(
            Command::PanTilt {
                direction: Direction::RightDown,
                pan_speed: 0x30,
                tilt_speed: 0,
            },
            1,
        );
        assert_eq!(
            right_down,
            vec![0x81, 0x01, 0x06, 0x01, 0x18, 0x01, 0x02, 0x02, 0xFF]
        );
    }

    #[test]
    fn encodes_zoom_and_relative_move() {
        assert_eq!(
            encode(Command::ZoomTo(0x1234), 1),
            vec![0x81, 0x01, 0x04, 0x47, 0x01, 0x02, 0x03, 0x04, 0xFF]
        );
        assert_eq!(
            encode(
                Command::IncrementalMove {
                    pan_delta: -25,
                    tilt_delta: 0,
                    speed: 5
                },
                1
            ),
            vec![
                0x81, 0x01, 0x06, 0x03, 0x05, 0x05, 0x0F, 0x0F, 0x0E, 0x07, 0x00, 0x00, 0x00,
                0x00, 0xFF
            ]
        );
    }

    #[test]
    fn encodes_fixed_commands() {
        assert_eq!(encode(Command::Home, 2), vec![0x82, 0x01, 0x06, 0x04, 0xFF]);
        assert_eq!(
            encode(Command::Stop, 1),
            vec![0x81, 0x01, 0x06, 0x01, 0x01, 0x01, 0x03, 0x03, 0xFF]
        );
        assert_eq!(
            encode(Command::FocusLock(false), 1),
            vec![0x81, 0x0A, 0x04, 0x68, 0x03, 0xFF]
        );
    }

    #[test]
    fn parses_replies() {
        assert_eq!(parse_reply(&[0x90, 0x41, 0xFF]), Reply::Ack);
        assert_eq!(parse_reply(&[0x90, 0x51, 0xFF]), Reply::Completion);
        assert_eq!(parse_reply(&[0x90, 0x61, 0x41, 0xFF]), Reply::Error(0x41));
        assert_eq!(parse_reply(&[0x88, 0x30, 0x02, 0xFF]), Reply::Other);
    }

    #[test]
    fn splits_partial_reply_streams() {
        let mut pending = vec![0x90, 0x41, 0xFF, 0x90, 0x51];
        let replies = split_replies(&mut pending);
        assert_eq!(replies, vec![vec![0x90, 0x41, 0xFF]]);
        assert_eq!(pending, vec![0x90, 0x51]);
    }
}
