//! Compact binary form of the stream protocol.
//!
//! Every element start, element end and attribute is introduced by one header byte. The top two
//! bits give the kind, the low six bits the [`ElementId`] or [`AttributeId`]:
//!
//! | Header bits | Meaning                          |
//! |-------------|----------------------------------|
//! | `01iiiiii`  | start of element `i`             |
//! | `10iiiiii`  | end of element `i`               |
//! | `11iiiiii`  | attribute `i`, a value follows   |
//!
//! An attribute value starts with a type byte: the high nibble is the type (`4` unsigned
//! integer, `7` string), the low nibble the number of bytes in the integer that follows. Integers
//! are stored most significant group first in 7-bit groups, each byte with its top bit set so
//! that it can never be mistaken for a header. A string is its byte length as such an integer,
//! followed by the UTF-8 bytes.

use crate::{
    encoding::{AttributeId, AttributeValue, Element, ElementId, MAX_DEPTH},
    Result,
};

const HEADER_MASK: u8 = 0xC0;
const ID_MASK: u8 = 0x3F;
const ELEMENT_START: u8 = 0x40;
const ELEMENT_END: u8 = 0x80;
const ATTRIBUTE: u8 = 0xC0;

const TYPE_MASK: u8 = 0xF0;
const LENGTH_MASK: u8 = 0x0F;
const TYPE_UNSIGNED: u8 = 0x40;
const TYPE_STRING: u8 = 0x70;

const RAWDATA_MARKER: u8 = 0x80;
const RAWDATA_BITS: u32 = 7;
const RAWDATA_MASK: u64 = 0x7F;
const MAX_INTEGER_BYTES: u8 = 10;

/// Serialize an element tree
pub fn encode(root: &Element) -> Vec<u8> {
    let mut out = Vec::new();
    write_element(&mut out, root);
    out
}

fn write_element(out: &mut Vec<u8>, elem: &Element) {
    let id = elem.id() as u8;
    out.push(ELEMENT_START | id);

    for (attr, value) in elem.attributes() {
        out.push(ATTRIBUTE | *attr as u8);
        match value {
            AttributeValue::Unsigned(value) => write_integer(out, TYPE_UNSIGNED, *value),
            AttributeValue::String(text) => {
                write_integer(out, TYPE_STRING, text.len() as u64);
                out.extend_from_slice(text.as_bytes());
            }
        }
    }

    for child in elem.children() {
        write_element(out, child);
    }
    out.push(ELEMENT_END | id);
}

fn write_integer(out: &mut Vec<u8>, type_code: u8, value: u64) {
    let groups = (u64::BITS - value.leading_zeros()).div_ceil(RAWDATA_BITS).max(1);
    out.push(type_code | groups as u8);
    for group in (0..groups).rev() {
        out.push(RAWDATA_MARKER | ((value >> (group * RAWDATA_BITS)) & RAWDATA_MASK) as u8);
    }
}

/// Parse an element tree from its binary form.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for truncated input, unknown ids, mismatched element
/// ends, nesting deeper than 64 levels or trailing bytes after the root element.
pub fn decode(data: &[u8]) -> Result<Element> {
    let mut reader = PackedReader { data, pos: 0 };
    let root = reader.read_element(0)?;

    if reader.pos != data.len() {
        return Err(malformed_error!(
            "{} trailing bytes after root element",
            data.len() - reader.pos
        ));
    }
    Ok(root)
}

struct PackedReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl PackedReader<'_> {
    fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| malformed_error!("Stream truncated at offset {}", self.pos))
    }

    fn next_byte(&mut self) -> Result<u8> {
        let byte = self.peek_byte()?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| malformed_error!("Stream truncated at offset {}", self.pos))?;

        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_element(&mut self, depth: usize) -> Result<Element> {
        if depth >= MAX_DEPTH {
            return Err(malformed_error!("Elements nested deeper than {}", MAX_DEPTH));
        }

        let header = self.next_byte()?;
        if header & HEADER_MASK != ELEMENT_START {
            return Err(malformed_error!(
                "Expected element start at offset {}, found {:#04x}",
                self.pos - 1,
                header
            ));
        }
        let id = ElementId::from_repr(header & ID_MASK)
            .ok_or_else(|| malformed_error!("Unknown element id {}", header & ID_MASK))?;

        let mut elem = Element::new(id);
        loop {
            let header = self.peek_byte()?;
            match header & HEADER_MASK {
                ATTRIBUTE => {
                    self.pos += 1;
                    let attr = AttributeId::from_repr(header & ID_MASK).ok_or_else(|| {
                        malformed_error!("Unknown attribute id {}", header & ID_MASK)
                    })?;
                    let value = self.read_value()?;
                    elem.push_attribute(attr, value);
                }
                ELEMENT_START => elem.push_child(self.read_element(depth + 1)?),
                ELEMENT_END => {
                    self.pos += 1;
                    if header & ID_MASK != id as u8 {
                        return Err(malformed_error!(
                            "Element <{}> closed by end of id {}",
                            id,
                            header & ID_MASK
                        ));
                    }
                    return Ok(elem);
                }
                _ => {
                    return Err(malformed_error!(
                        "Unexpected byte {:#04x} at offset {}",
                        header,
                        self.pos
                    ));
                }
            }
        }
    }

    fn read_value(&mut self) -> Result<AttributeValue> {
        let type_byte = self.next_byte()?;
        let len = type_byte & LENGTH_MASK;

        match type_byte & TYPE_MASK {
            TYPE_UNSIGNED => Ok(AttributeValue::Unsigned(self.read_integer(len)?)),
            TYPE_STRING => {
                let size = self.read_integer(len)?;
                let size = usize::try_from(size)
                    .map_err(|_| malformed_error!("String length {:#x} is too large", size))?;
                let bytes = self.take(size)?;
                let text = std::str::from_utf8(bytes)
                    .map_err(|err| malformed_error!("String is not valid UTF-8 - {}", err))?;
                Ok(AttributeValue::String(text.to_string()))
            }
            other => Err(malformed_error!("Unknown value type {:#04x}", other)),
        }
    }

    fn read_integer(&mut self, groups: u8) -> Result<u64> {
        if groups == 0 || groups > MAX_INTEGER_BYTES {
            return Err(malformed_error!("Invalid integer length {}", groups));
        }

        let mut value = 0u64;
        for _ in 0..groups {
            let byte = self.next_byte()?;
            if byte & RAWDATA_MARKER == 0 {
                return Err(malformed_error!("Integer byte without marker at offset {}", self.pos - 1));
            }
            if value >> (u64::BITS - RAWDATA_BITS) != 0 {
                return Err(malformed_error!("Integer overflows 64 bits"));
            }
            value = (value << RAWDATA_BITS) | (u64::from(byte) & RAWDATA_MASK);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn layout() {
        let elem = Element::new(ElementId::Set).with_unsigned(AttributeId::Val, 0x81);
        assert_eq!(
            encode(&elem),
            vec![0x44, 0xC5, 0x42, 0x81, 0x81, 0x84]
        );
    }

    #[test]
    fn zero_and_max() {
        let elem = Element::new(ElementId::Set)
            .with_unsigned(AttributeId::Offset, 0)
            .with_unsigned(AttributeId::Val, u64::MAX);

        let bytes = encode(&elem);
        assert_eq!(&bytes[1..4], &[0xC2, 0x41, 0x80]);

        let back = decode(&bytes).unwrap();
        assert_eq!(back, elem);
    }

    #[test]
    fn nested_strings() {
        let root = Element::new(ElementId::ContextPoints).with_child(
            Element::new(ElementId::ContextPointset)
                .with_string(AttributeId::Space, "ram")
                .with_unsigned(AttributeId::Offset, 0x1000)
                .with_child(Element::new(ElementId::Set).with_string(AttributeId::Name, "")),
        );

        assert_eq!(decode(&encode(&root)).unwrap(), root);
    }

    #[test]
    fn truncated() {
        let bytes = encode(&Element::new(ElementId::Set).with_string(AttributeId::Name, "mode"));
        for len in 0..bytes.len() {
            assert!(matches!(
                decode(&bytes[..len]),
                Err(Error::Malformed { .. })
            ));
        }
    }

    #[test]
    fn mismatched_end() {
        assert!(decode(&[0x41, 0x82]).is_err());
    }

    #[test]
    fn trailing_bytes() {
        assert!(decode(&[0x44, 0x84, 0x00]).is_err());
    }

    #[test]
    fn unknown_ids() {
        assert!(decode(&[0x7F, 0xBF]).is_err());
        assert!(decode(&[0x44, 0xFF, 0x41, 0x80, 0x84]).is_err());
    }

    #[test]
    fn overflowing_integer() {
        let mut bytes = vec![0x44, 0xC5, 0x4A];
        bytes.extend([0xFF; 10]);
        bytes.push(0x84);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn deep_nesting() {
        let nested = |levels: usize| {
            let mut bytes = vec![0x41; levels];
            bytes.extend(vec![0x81; levels]);
            bytes
        };

        assert!(decode(&nested(MAX_DEPTH)).is_ok());
        assert!(matches!(
            decode(&nested(MAX_DEPTH + 1)),
            Err(Error::Malformed { .. })
        ));
        assert!(decode(&nested(100)).is_err());
    }
}
