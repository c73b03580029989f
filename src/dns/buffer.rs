//! buffers for use when writing and reading dns packets

use derive_more::{Display, Error, From};

#[derive(Debug, Display, From, Error)]
pub enum BufferError {
    Io(std::io::Error),
    EndOfBuffer,
    #[display(fmt = "label longer than 63 bytes")]
    LabelTooLong,
    #[display(fmt = "name longer than 255 bytes")]
    NameTooLong,
    #[display(fmt = "empty label in name")]
    EmptyLabel,
    #[display(fmt = "too many compression jumps")]
    TooManyJumps,
}

type Result<T> = std::result::Result<T, BufferError>;

/// Maximum number of compression pointers followed while reading a single name
const MAX_JUMPS: usize = 5;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;

pub trait PacketBuffer {
    fn read(&mut self) -> Result<u8>;
    fn get(&mut self, pos: usize) -> Result<u8>;
    fn get_range(&mut self, start: usize, len: usize) -> Result<&[u8]>;
    fn write(&mut self, val: u8) -> Result<()>;
    fn set(&mut self, pos: usize, val: u8) -> Result<()>;
    fn pos(&self) -> usize;
    fn seek(&mut self, pos: usize) -> Result<()>;
    fn step(&mut self, steps: usize) -> Result<()>;

    fn write_u8(&mut self, val: u8) -> Result<()> {
        self.write(val)?;

        Ok(())
    }

    fn set_u16(&mut self, pos: usize, val: u16) -> Result<()> {
        self.set(pos, (val >> 8) as u8)?;
        self.set(pos + 1, (val & 0xFF) as u8)?;

        Ok(())
    }

    fn write_u16(&mut self, val: u16) -> Result<()> {
        self.write((val >> 8) as u8)?;
        self.write((val & 0xFF) as u8)?;

        Ok(())
    }

    fn write_u32(&mut self, val: u32) -> Result<()> {
        self.write(((val >> 24) & 0xFF) as u8)?;
        self.write(((val >> 16) & 0xFF) as u8)?;
        self.write(((val >> 8) & 0xFF) as u8)?;
        self.write((val & 0xFF) as u8)?;

        Ok(())
    }

    /// Writes the low 48 bits of `val`, as used by the TSIG time field
    fn write_u48(&mut self, val: u64) -> Result<()> {
        self.write_u16(((val >> 32) & 0xFFFF) as u16)?;
        self.write_u32((val & 0xFFFF_FFFF) as u32)?;

        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        for b in bytes {
            self.write(*b)?;
        }

        Ok(())
    }

    /// Writes `qname` as a sequence of length-prefixed labels.
    ///
    /// Names are never compressed. A single trailing dot is accepted and the
    /// empty string (or ".") encodes the root.
    fn write_qname(&mut self, qname: &str) -> Result<()> {
        let name = qname.strip_suffix('.').unwrap_or(qname);

        if !name.is_empty() {
            let mut total = 1;
            for label in name.split('.') {
                let len = label.len();
                if len == 0 {
                    return Err(BufferError::EmptyLabel);
                }
                if len > MAX_LABEL_LEN {
                    return Err(BufferError::LabelTooLong);
                }

                total += len + 1;
                if total > MAX_NAME_LEN {
                    return Err(BufferError::NameTooLong);
                }

                self.write_u8(len as u8)?;
                self.write_bytes(label.as_bytes())?;
            }
        }

        self.write_u8(0)?;

        Ok(())
    }

    fn read_u16(&mut self) -> Result<u16> {
        let res = ((self.read()? as u16) << 8) | (self.read()? as u16);

        Ok(res)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let res = ((self.read()? as u32) << 24)
            | ((self.read()? as u32) << 16)
            | ((self.read()? as u32) << 8)
            | (self.read()? as u32);

        Ok(res)
    }

    fn read_u48(&mut self) -> Result<u64> {
        let high = self.read_u16()? as u64;
        let low = self.read_u32()? as u64;

        Ok((high << 32) | low)
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let start = self.pos();
        let bytes = self.get_range(start, len)?.to_vec();
        self.step(len)?;

        Ok(bytes)
    }

    /// Reads a name into `outstr`, following compression pointers.
    ///
    /// The result has no trailing dot; the root name reads as "".
    fn read_qname(&mut self, outstr: &mut String) -> Result<()> {
        let mut pos = self.pos();
        let mut jumped = false;
        let mut jumps = 0;

        let mut delim = "";
        loop {
            let len = self.get(pos)?;

            // A two byte sequence, where the two highest bits of the first byte is
            // set, represents a offset relative to the start of the buffer.
            if (len & 0xC0) == 0xC0 {
                jumps += 1;
                if jumps > MAX_JUMPS {
                    return Err(BufferError::TooManyJumps);
                }

                // When a jump is performed, we only modify the shared buffer
                // position once, and avoid making the change later on.
                if !jumped {
                    self.seek(pos + 2)?;
                }

                let b2 = self.get(pos + 1)? as u16;
                let offset = (((len as u16) ^ 0xC0) << 8) | b2;
                pos = offset as usize;
                jumped = true;
                continue;
            }

            pos += 1;

            // Names are terminated by an empty label of length 0
            if len == 0 {
                break;
            }

            if len as usize > MAX_LABEL_LEN {
                return Err(BufferError::LabelTooLong);
            }

            outstr.push_str(delim);

            let str_buffer = self.get_range(pos, len as usize)?;
            outstr.push_str(&String::from_utf8_lossy(str_buffer));

            delim = ".";

            pos += len as usize;
        }

        if !jumped {
            self.seek(pos)?;
        }

        Ok(())
    }
}

/// Growable buffer backed by a `Vec`, used for every message this crate
/// encodes or decodes.
#[derive(Default, Clone, Debug)]
pub struct VectorPacketBuffer {
    pub buffer: Vec<u8>,
    pub pos: usize,
}

impl VectorPacketBuffer {
    pub fn new() -> VectorPacketBuffer {
        VectorPacketBuffer {
            buffer: Vec::new(),
            pos: 0,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> VectorPacketBuffer {
        VectorPacketBuffer {
            buffer: bytes.to_vec(),
            pos: 0,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

impl PacketBuffer for VectorPacketBuffer {
    fn read(&mut self) -> Result<u8> {
        let res = *self.buffer.get(self.pos).ok_or(BufferError::EndOfBuffer)?;
        self.pos += 1;

        Ok(res)
    }

    fn get(&mut self, pos: usize) -> Result<u8> {
        self.buffer.get(pos).copied().ok_or(BufferError::EndOfBuffer)
    }

    fn get_range(&mut self, start: usize, len: usize) -> Result<&[u8]> {
        let end = start.checked_add(len).ok_or(BufferError::EndOfBuffer)?;
        self.buffer.get(start..end).ok_or(BufferError::EndOfBuffer)
    }

    fn write(&mut self, val: u8) -> Result<()> {
        if self.pos < self.buffer.len() {
            self.buffer[self.pos] = val;
        } else {
            self.buffer.push(val);
        }
        self.pos += 1;

        Ok(())
    }

    fn set(&mut self, pos: usize, val: u8) -> Result<()> {
        let slot = self.buffer.get_mut(pos).ok_or(BufferError::EndOfBuffer)?;
        *slot = val;

        Ok(())
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buffer.len() {
            return Err(BufferError::EndOfBuffer);
        }
        self.pos = pos;

        Ok(())
    }

    fn step(&mut self, steps: usize) -> Result<()> {
        let pos = self.pos.checked_add(steps).ok_or(BufferError::EndOfBuffer)?;
        self.seek(pos)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_qname() {
        let mut buffer = VectorPacketBuffer::new();

        let instr1 = "a.google.com".to_string();
        let instr2 = "b.google.com.".to_string();

        // First write the standard string
        buffer.write_qname(&instr1).unwrap();
        let after_first = buffer.pos();

        // Write the second one; names are not compressed so the full length is used
        buffer.write_qname(&instr2).unwrap();
        assert_eq!(after_first * 2, buffer.pos());

        // Read back both strings
        buffer.seek(0).unwrap();

        let mut outstr1 = String::new();
        buffer.read_qname(&mut outstr1).unwrap();
        assert_eq!(instr1, outstr1);

        let mut outstr2 = String::new();
        buffer.read_qname(&mut outstr2).unwrap();
        assert_eq!("b.google.com", outstr2);

        assert_eq!(buffer.pos, buffer.buffer.len());
    }

    #[test]
    fn test_read_compressed_qname() {
        // "example.com" at offset 0, then "www" followed by a pointer to offset 0
        let mut bytes = vec![7];
        bytes.extend_from_slice(b"example");
        bytes.push(3);
        bytes.extend_from_slice(b"com");
        bytes.push(0);
        bytes.push(3);
        bytes.extend_from_slice(b"www");
        bytes.extend_from_slice(&[0xC0, 0x00]);
        bytes.push(0xAB);

        let mut buffer = VectorPacketBuffer::from_bytes(&bytes);
        buffer.seek(13).unwrap();

        let mut name = String::new();
        buffer.read_qname(&mut name).unwrap();
        assert_eq!("www.example.com", name);

        // Position continues right after the pointer
        assert_eq!(0xAB, buffer.read().unwrap());
    }

    #[test]
    fn test_compression_loop_is_rejected() {
        let mut buffer = VectorPacketBuffer::from_bytes(&[0xC0, 0x00]);

        let mut name = String::new();
        match buffer.read_qname(&mut name) {
            Err(BufferError::TooManyJumps) => {}
            other => panic!("expected TooManyJumps, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_names() {
        let mut buffer = VectorPacketBuffer::new();

        let long_label = "a".repeat(64);
        assert!(matches!(
            buffer.write_qname(&long_label),
            Err(BufferError::LabelTooLong)
        ));
        assert!(matches!(
            buffer.write_qname("a..b"),
            Err(BufferError::EmptyLabel)
        ));

        let long_name = vec!["abcdefghi"; 30].join(".");
        assert!(matches!(
            buffer.write_qname(&long_name),
            Err(BufferError::NameTooLong)
        ));
    }

    #[test]
    fn test_root_name() {
        let mut buffer = VectorPacketBuffer::new();
        buffer.write_qname(".").unwrap();
        buffer.write_qname("").unwrap();
        assert_eq!(vec![0, 0], buffer.buffer);

        buffer.seek(0).unwrap();
        let mut name = String::new();
        buffer.read_qname(&mut name).unwrap();
        assert_eq!("", name);
    }

    #[test]
    fn test_u48() {
        let mut buffer = VectorPacketBuffer::new();
        buffer.write_u48(0x0000_1234_5678_9ABC).unwrap();
        assert_eq!(6, buffer.pos());

        buffer.seek(0).unwrap();
        assert_eq!(0x1234_5678_9ABC, buffer.read_u48().unwrap());
    }
}
