//! AMF0 value model and decoder for FLV script-data tags.
//!
//! SPEC_FULL.md treats the AMF0 decoder as an external collaborator with a
//! fixed interface (consume bytes, return a value plus how much was
//! consumed); this module supplies a concrete conformant-enough
//! implementation so the demuxer's script path is testable end to end.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    Number(f64),
    Boolean(bool),
    String(String),
    Object(Vec<(String, Amf0Value)>),
    Null,
    Undefined,
    EcmaArray(Vec<(String, Amf0Value)>),
    StrictArray(Vec<Amf0Value>),
}

impl Amf0Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Amf0Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, Amf0Value)]> {
        match self {
            Amf0Value::Object(pairs) | Amf0Value::EcmaArray(pairs) => Some(pairs),
            _ => None,
        }
    }

    pub fn get_property(&self, key: &str) -> Option<&Amf0Value> {
        self.as_object()
            .and_then(|pairs| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v))
    }
}

impl fmt::Display for Amf0Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amf0Value::Number(n) => write!(f, "{n}"),
            Amf0Value::Boolean(b) => write!(f, "{b}"),
            Amf0Value::String(s) => write!(f, "\"{s}\""),
            Amf0Value::Object(pairs) | Amf0Value::EcmaArray(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Amf0Value::Null => write!(f, "null"),
            Amf0Value::Undefined => write!(f, "undefined"),
            Amf0Value::StrictArray(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Decodes a sequence of AMF0 values from a byte slice, tracking how many
/// bytes were consumed so the FLV script-data path can report `consumed`
/// to its own caller per SPEC_FULL.md §9.
pub struct Amf0Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Amf0Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn decode(&mut self) -> Option<Amf0Value> {
        if self.pos >= self.data.len() {
            return None;
        }
        let marker = self.data[self.pos];
        self.pos += 1;
        match marker {
            0x00 => self.read_number(),
            0x01 => self.read_boolean(),
            0x02 => self.read_string(),
            0x03 => self.read_object(),
            0x05 => Some(Amf0Value::Null),
            0x06 => Some(Amf0Value::Undefined),
            0x08 => self.read_ecma_array(),
            0x0A => self.read_strict_array(),
            0x0C => self.read_long_string(),
            _ => None,
        }
    }

    pub fn decode_all(&mut self) -> Vec<Amf0Value> {
        let mut values = Vec::new();
        while let Some(val) = self.decode() {
            values.push(val);
        }
        values
    }

    fn read_number(&mut self) -> Option<Amf0Value> {
        if self.pos + 8 > self.data.len() {
            return None;
        }
        let bytes: [u8; 8] = self.data[self.pos..self.pos + 8].try_into().ok()?;
        self.pos += 8;
        Some(Amf0Value::Number(f64::from_be_bytes(bytes)))
    }

    fn read_boolean(&mut self) -> Option<Amf0Value> {
        if self.pos >= self.data.len() {
            return None;
        }
        let val = self.data[self.pos] != 0;
        self.pos += 1;
        Some(Amf0Value::Boolean(val))
    }

    fn read_utf8(&mut self) -> Option<String> {
        if self.pos + 2 > self.data.len() {
            return None;
        }
        let len = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]) as usize;
        self.pos += 2;
        if self.pos + len > self.data.len() {
            return None;
        }
        let s = String::from_utf8_lossy(&self.data[self.pos..self.pos + len]).into_owned();
        self.pos += len;
        Some(s)
    }

    fn read_string(&mut self) -> Option<Amf0Value> {
        self.read_utf8().map(Amf0Value::String)
    }

    fn read_long_string(&mut self) -> Option<Amf0Value> {
        if self.pos + 4 > self.data.len() {
            return None;
        }
        let len = u32::from_be_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?) as usize;
        self.pos += 4;
        if self.pos + len > self.data.len() {
            return None;
        }
        let s = String::from_utf8_lossy(&self.data[self.pos..self.pos + len]).into_owned();
        self.pos += len;
        Some(Amf0Value::String(s))
    }

    fn read_object_properties(&mut self) -> Option<Vec<(String, Amf0Value)>> {
        let mut pairs = Vec::new();
        loop {
            if self.pos + 3 <= self.data.len()
                && self.data[self.pos] == 0x00
                && self.data[self.pos + 1] == 0x00
                && self.data[self.pos + 2] == 0x09
            {
                self.pos += 3;
                break;
            }
            let key = self.read_utf8()?;
            if key.is_empty() && self.pos < self.data.len() && self.data[self.pos] == 0x09 {
                self.pos += 1;
                break;
            }
            let value = self.decode()?;
            pairs.push((key, value));
        }
        Some(pairs)
    }

    fn read_object(&mut self) -> Option<Amf0Value> {
        self.read_object_properties().map(Amf0Value::Object)
    }

    fn read_ecma_array(&mut self) -> Option<Amf0Value> {
        if self.pos + 4 > self.data.len() {
            return None;
        }
        self.pos += 4; // approximate element count; not authoritative
        self.read_object_properties().map(Amf0Value::EcmaArray)
    }

    fn read_strict_array(&mut self) -> Option<Amf0Value> {
        if self.pos + 4 > self.data.len() {
            return None;
        }
        let count = u32::from_be_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?) as usize;
        self.pos += 4;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            match self.decode() {
                Some(v) => items.push(v),
                None => break,
            }
        }
        Some(Amf0Value::StrictArray(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_string(s: &str) -> Vec<u8> {
        let mut out = vec![0x02];
        out.extend((s.len() as u16).to_be_bytes());
        out.extend_from_slice(s.as_bytes());
        out
    }

    fn encode_number(n: f64) -> Vec<u8> {
        let mut out = vec![0x00];
        out.extend(n.to_be_bytes());
        out
    }

    #[test]
    fn decodes_number_and_string() {
        let mut data = encode_string("onMetaData");
        data.extend(encode_number(42.0));
        let mut decoder = Amf0Decoder::new(&data);
        let values = decoder.decode_all();
        assert_eq!(values[0], Amf0Value::String("onMetaData".into()));
        assert_eq!(values[1], Amf0Value::Number(42.0));
        assert_eq!(decoder.consumed(), data.len());
    }

    #[test]
    fn decodes_on_metadata_object() {
        let mut obj = vec![0x03];
        for (key, val) in [("width", 1280.0), ("height", 720.0), ("framerate", 30.0)] {
            obj.extend((key.len() as u16).to_be_bytes());
            obj.extend_from_slice(key.as_bytes());
            obj.extend(encode_number(val));
        }
        obj.extend([0x00, 0x00, 0x09]);

        let mut decoder = Amf0Decoder::new(&obj);
        let value = decoder.decode().unwrap();
        assert_eq!(value.get_property("width").and_then(|v| v.as_f64()), Some(1280.0));
        assert_eq!(value.get_property("height").and_then(|v| v.as_f64()), Some(720.0));
        assert_eq!(
            value.get_property("framerate").and_then(|v| v.as_f64()),
            Some(30.0)
        );
    }

    #[test]
    fn truncated_number_returns_none() {
        let data = [0x00, 0x01, 0x02];
        let mut decoder = Amf0Decoder::new(&data);
        assert!(decoder.decode().is_none());
    }

    #[test]
    fn unknown_marker_stops_decoding() {
        let data = [0xFF];
        let mut decoder = Amf0Decoder::new(&data);
        assert!(decoder.decode().is_none());
    }
}
