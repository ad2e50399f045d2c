//! Command framing: XMODEM CRC-16 plus carriage-return terminator.

use crc::{Crc, CRC_16_XMODEM};

use crate::constants::TERMINATOR;

const XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC-16/XMODEM (poly 0x1021, init 0, no reflection)
pub fn crc16_xmodem(data: &[u8]) -> u16 {
    XMODEM.checksum(data)
}

/// Build the wire frame for a command: bytes, CRC high byte, CRC low byte, `\r`.
pub fn frame(command: &str) -> Vec<u8> {
    let bytes = command.as_bytes();
    let mut frame = Vec::with_capacity(bytes.len() + 3);
    frame.extend_from_slice(bytes);
    frame.extend_from_slice(&crc16_xmodem(bytes).to_be_bytes());
    frame.push(TERMINATOR);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value_matches_catalog() {
        assert_eq!(crc16_xmodem(b"123456789"), 0x31C3);
    }

    #[test]
    fn qpi_matches_vendor_frame() {
        assert_eq!(frame("QPI"), vec![0x51, 0x50, 0x49, 0xBE, 0xAC, 0x0D]);
    }

    #[test]
    fn known_inquiry_checksums() {
        for (command, crc) in [
            ("QID", [0xD6u8, 0xEA]),
            ("QVFW", [0x62, 0x99]),
            ("QPIGS", [0xB7, 0xA9]),
            ("QPIWS", [0xB4, 0xDA]),
        ] {
            let framed = frame(command);
            let n = framed.len();
            assert_eq!(&framed[..n - 3], command.as_bytes());
            assert_eq!(&framed[n - 3..n - 1], &crc, "{}", command);
            assert_eq!(framed[n - 1], 0x0D);
        }
    }

    #[test]
    fn frame_always_ends_with_single_terminator_after_crc() {
        for command in ["Q", "QMOD", "QPIRI", "QFLAG", "POP02"] {
            let framed = frame(command);
            let n = framed.len();
            assert_eq!(framed[n - 1], TERMINATOR);
            let crc = u16::from_be_bytes([framed[n - 3], framed[n - 2]]);
            assert_eq!(crc, crc16_xmodem(command.as_bytes()));
        }
    }
}
