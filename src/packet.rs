//! EKT1059 report frame decoding.
//!
//! A report is 14 bytes. Byte 1 carries the finger count in its top two bits,
//! each finger is a 12-bit X/Y pair split over a low nibble and a full byte,
//! and byte 13 must hold the `0x01` signature whenever fingers are present.
//!
//! ```text
//! byte:  0  1     2    3   4  5    6   7  8    9   10 11   12  13
//!           cnt   X0hi X0lo   Y0hi Y0lo   X1hi X1lo   Y1hi Y1lo sig
//! ```

use thiserror::Error;

use crate::sample::{MAX_FINGERS, RawPoint, RawSample};

pub const PACKET_LEN: usize = 14;

const COUNT_BYTE: usize = 1;
const SIGNATURE_BYTE: usize = 13;
const SIGNATURE: u8 = 0x01;
/// (x high, x low, y high, y low) byte offsets per finger.
const FINGER_OFFSETS: [(usize, usize, usize, usize); MAX_FINGERS] = [(2, 3, 5, 6), (8, 9, 11, 12)];

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    #[error("short report: expected 14 bytes, got {0}")]
    Length(usize),
    #[error("bad report signature {0:#04x}")]
    Signature(u8),
    #[error("report claims {0} fingers")]
    TooManyFingers(u8),
}

pub fn parse(buf: &[u8]) -> Result<RawSample, PacketError> {
    if buf.len() < PACKET_LEN {
        return Err(PacketError::Length(buf.len()));
    }

    let count = (buf[COUNT_BYTE] & 0xC0) >> 6;
    if count as usize > MAX_FINGERS {
        return Err(PacketError::TooManyFingers(count));
    }

    let mut sample = RawSample {
        count,
        ..RawSample::default()
    };
    if count == 0 {
        return Ok(sample);
    }
    if buf[SIGNATURE_BYTE] != SIGNATURE {
        return Err(PacketError::Signature(buf[SIGNATURE_BYTE]));
    }

    for (finger, &(xh, xl, yh, yl)) in sample
        .fingers
        .iter_mut()
        .zip(FINGER_OFFSETS.iter())
        .take(count as usize)
    {
        *finger = RawPoint::new(coord(buf[xh], buf[xl]), coord(buf[yh], buf[yl]));
    }
    Ok(sample)
}

fn coord(high: u8, low: u8) -> i32 {
    (((high & 0x0F) as i32) << 8) | low as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(count: u8, fingers: &[(u16, u16)]) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        buf[COUNT_BYTE] = count << 6;
        buf[SIGNATURE_BYTE] = SIGNATURE;
        for (&(x, y), &(xh, xl, yh, yl)) in fingers.iter().zip(FINGER_OFFSETS.iter()) {
            // upper nibbles carry unrelated status bits on real hardware
            buf[xh] = 0xA0 | (x >> 8) as u8;
            buf[xl] = x as u8;
            buf[yh] = 0x50 | (y >> 8) as u8;
            buf[yl] = y as u8;
        }
        buf
    }

    #[test]
    fn parses_two_fingers() {
        let s = parse(&frame(2, &[(0x123, 0x0FF), (4095, 7)])).expect("valid frame");
        assert_eq!(s.count, 2);
        assert_eq!(s.fingers[0], RawPoint::new(0x123, 0x0FF));
        assert_eq!(s.fingers[1], RawPoint::new(4095, 7));
    }

    #[test]
    fn single_finger_ignores_second_slot() {
        let mut buf = frame(1, &[(10, 20)]);
        buf[9] = 0xFF;
        let s = parse(&buf).expect("valid frame");
        assert_eq!(s.count, 1);
        assert_eq!(s.fingers[1], RawPoint::default());
    }

    #[test]
    fn release_frame_needs_no_signature() {
        let mut buf = frame(0, &[]);
        buf[SIGNATURE_BYTE] = 0;
        assert_eq!(parse(&buf), Ok(RawSample::empty()));
    }

    #[test]
    fn rejects_malformed_frames() {
        assert_eq!(parse(&[0u8; 5]), Err(PacketError::Length(5)));

        let mut buf = frame(1, &[(1, 1)]);
        buf[SIGNATURE_BYTE] = 0x02;
        assert_eq!(parse(&buf), Err(PacketError::Signature(0x02)));

        assert_eq!(parse(&frame(3, &[])), Err(PacketError::TooManyFingers(3)));
    }
}
