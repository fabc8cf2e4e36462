use std::net::Ipv4Addr;

use crate::constants::PASV_SCAN_WINDOW;

use super::error::ProtocolError;

/// Fixed literal prefix a 227 reply must carry for the address block
/// to be extracted.
const PASV_PREFIX: &str = "227 Entering Passive Mode (";

/// Parses the advertised data-channel endpoint out of a full
/// `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` response line.
/// The port is `p1 * 256 + p2`.
pub fn parse_pasv_line(line: &str) -> Result<(Ipv4Addr, u16), ProtocolError> {
    let rest = line
        .strip_prefix(PASV_PREFIX)
        .ok_or(ProtocolError::InvalidPassiveResponse)?;
    let fields = parse_pasv_fields(rest)?;

    let host = Ipv4Addr::new(fields[0], fields[1], fields[2], fields[3]);
    let port = u16::from(fields[4]) * 256 + u16::from(fields[5]);
    Ok((host, port))
}

/// Scans `h1,h2,h3,h4,p1,p2)`: six comma-separated byte values closed
/// by a parenthesis, all within a bounded window. Digits accumulate
/// left to right per field; a comma advances to the next of the six
/// slots.
fn parse_pasv_fields(input: &str) -> Result<[u8; 6], ProtocolError> {
    let mut fields = [0u32; 6];
    let mut index = 0usize;
    let mut closed = false;

    for (k, c) in input.chars().enumerate() {
        if k >= PASV_SCAN_WINDOW {
            break;
        }
        if c == ')' {
            closed = true;
            break;
        }
        if let Some(digit) = c.to_digit(10) {
            fields[index] = fields[index] * 10 + digit;
            if fields[index] > 255 {
                return Err(ProtocolError::PasvNumberOutOfRange(fields[index]));
            }
            continue;
        }
        if c == ',' {
            index += 1;
            if index >= 6 {
                return Err(ProtocolError::PasvTooManyNumbers);
            }
            continue;
        }
        return Err(ProtocolError::PasvInvalidCharacter(c));
    }

    if !closed {
        return Err(ProtocolError::PasvInputTooLong);
    }
    if index != 5 {
        return Err(ProtocolError::PasvInsufficientNumbers);
    }

    Ok(fields.map(|field| field as u8))
}
