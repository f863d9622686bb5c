//! JSON serialization for heartbeat payloads.
//!
//! Clients match on the exact text `{"cmd": "ACCOUNT"}`, which keeps a single
//! space after every `:` and `,`. `serde_json::to_string` emits no spaces at
//! all, so payloads go through [`SpacedFormatter`] instead.

use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;

use pulse_core::AppResult;

/// Compact JSON formatter using `", "` and `": "` as separators.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Serialize a value to its on-the-wire bytes.
pub fn to_wire<T>(value: &T) -> AppResult<Vec<u8>>
where
    T: ?Sized + Serialize,
{
    let mut buf = Vec::with_capacity(32);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}
