//! Codec Module
//!
//! Turns items into bytes and back. Structured values (maps, records) use a
//! tagged JSON text format, everything else uses bincode.
//!
//! Every blob written here starts with a one-byte format tag. Blobs without
//! a tag are decoded with a best-effort heuristic: a payload delimited by
//! `{}` or `[]` is text, anything else is binary.

use tracing::trace;

use crate::error::{CacheError, Result};
use crate::store::Item;

/// Tag byte prefixed to binary blobs.
pub const TAG_BINARY: u8 = 0xF5;
/// Tag byte prefixed to text blobs.
pub const TAG_TEXT: u8 = 0xF6;

// == Format ==
/// Wire format of an encoded item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Compact bincode encoding
    Binary,
    /// Self-describing JSON encoding
    Text,
}

impl Format {
    /// Picks the format an item is written in.
    pub fn for_item(item: &Item) -> Self {
        if item.object.is_structured() {
            Format::Text
        } else {
            Format::Binary
        }
    }

    /// Detects the format of `buf`, returning the format and the body
    /// without its tag byte.
    pub fn detect(buf: &[u8]) -> Result<(Self, &[u8])> {
        match buf {
            [] => Err(CacheError::Decode("empty payload".to_string())),
            [TAG_BINARY, body @ ..] => Ok((Format::Binary, body)),
            [TAG_TEXT, body @ ..] => Ok((Format::Text, body)),
            _ if looks_like_json(buf) => Ok((Format::Text, buf)),
            _ => Ok((Format::Binary, buf)),
        }
    }

    fn tag(self) -> u8 {
        match self {
            Format::Binary => TAG_BINARY,
            Format::Text => TAG_TEXT,
        }
    }
}

/// True if the buffer can carry the codec's tag, i.e. was written by `encode`.
pub fn is_tagged(buf: &[u8]) -> bool {
    matches!(buf.first(), Some(&TAG_BINARY) | Some(&TAG_TEXT))
}

fn looks_like_json(buf: &[u8]) -> bool {
    matches!(
        (buf.first(), buf.last()),
        (Some(b'{'), Some(b'}')) | (Some(b'['), Some(b']'))
    )
}

// == Encode ==
/// Serializes an item, prefixed with its format tag.
///
/// Fails with `Encode` on non-finite floats in a text-format value, which
/// JSON would otherwise write as `null`.
pub fn encode(item: &Item) -> Result<Vec<u8>> {
    let format = Format::for_item(item);
    let mut buf = vec![format.tag()];

    match format {
        Format::Text => {
            item.object.to_json()?;
            serde_json::to_writer(&mut buf, item)
                .map_err(|e| CacheError::Encode(e.to_string()))?
        }
        Format::Binary => bincode::serialize_into(&mut buf, item)
            .map_err(|e| CacheError::Encode(e.to_string()))?,
    }

    trace!(?format, len = buf.len(), "Encoded item");
    Ok(buf)
}

// == Decode ==
/// Deserializes an item, detecting its format.
pub fn decode(buf: &[u8]) -> Result<Item> {
    let (format, body) = Format::detect(buf)?;

    match format {
        Format::Text => {
            serde_json::from_slice(body).map_err(|e| CacheError::Decode(e.to_string()))
        }
        Format::Binary => {
            bincode::deserialize(body).map_err(|e| CacheError::Decode(e.to_string()))
        }
    }
}
