//! length framing for DNS messages carried over TCP (RFC 1035 4.2.2)

use std::io::{Error, ErrorKind, Read, Result, Write};

pub fn read_packet_length<R: Read>(stream: &mut R) -> Result<u16> {
    let mut len_buffer = [0; 2];
    stream.read_exact(&mut len_buffer)?;

    Ok(((len_buffer[0] as u16) << 8) | (len_buffer[1] as u16))
}

pub fn write_packet_length<W: Write>(stream: &mut W, len: usize) -> Result<()> {
    if len > u16::MAX as usize {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("message of {} bytes does not fit a TCP frame", len),
        ));
    }

    let mut len_buffer = [0; 2];
    len_buffer[0] = (len >> 8) as u8;
    len_buffer[1] = (len & 0xFF) as u8;
    stream.write_all(&len_buffer)?;

    Ok(())
}

/// Reads one length-prefixed message
pub fn read_framed<R: Read>(stream: &mut R) -> Result<Vec<u8>> {
    let len = read_packet_length(stream)?;

    let mut message = vec![0; len as usize];
    stream.read_exact(&mut message)?;

    Ok(message)
}

/// Writes one length-prefixed message and flushes the stream
pub fn write_framed<W: Write>(stream: &mut W, message: &[u8]) -> Result<()> {
    write_packet_length(stream, message.len())?;
    stream.write_all(message)?;
    stream.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_framing() {
        let mut wire = Vec::new();
        write_framed(&mut wire, &[1, 2, 3]).unwrap();
        write_framed(&mut wire, &[]).unwrap();
        assert_eq!(vec![0, 3, 1, 2, 3, 0, 0], wire);

        let mut cursor = Cursor::new(wire);
        assert_eq!(vec![1, 2, 3], read_framed(&mut cursor).unwrap());
        assert!(read_framed(&mut cursor).unwrap().is_empty());
        assert!(read_framed(&mut cursor).is_err());
    }

    #[test]
    fn test_oversized_frame() {
        let mut wire = Vec::new();
        let message = vec![0; 70_000];
        assert!(write_framed(&mut wire, &message).is_err());
    }
}
