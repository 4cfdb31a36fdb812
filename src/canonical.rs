/*
    Canonical JSON encoding used for block hashing.

    The byte layout is the one produced by `json.dumps(value, sort_keys=True)`
    in other ledger implementations, so block hashes agree across them:
    - object keys appear in the order the struct fields are declared,
      which for every hashed type is alphabetical
    - ", " separates items and ": " separates keys from values
    - every character above '~' (DEL and all non-ASCII) is written as a `\uXXXX` escape
      (UTF-16 code units, lowercase hex)
    - floats use the shortest round-trip representation (`1.5`, `2.0`)
*/

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use std::io::{self, Write};

#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        // control characters never reach this point, serde_json escapes them itself
        if fragment.bytes().all(|b| b <= b'~') {
            return writer.write_all(fragment.as_bytes());
        }

        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if c <= '~' {
                writer.write_all(&[c as u8])?;
                continue;
            }

            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
        }

        Ok(())
    }
}

/// Encodes `value` with the canonical formatter.
pub fn to_canonical_vec<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(128);
    let mut ser = Serializer::with_formatter(&mut buf, CanonicalFormatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}
