//! Context-sensitive escaping for line protocol text.

use crate::buffer::GrowableBuffer;
use crate::error::Result;

/// Where in a line a piece of text lands, which decides what gets escaped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscapeContext {
    /// Measurement name: `,` and space.
    Measurement,
    /// Tag key, tag value or field key: `,`, `=` and space.
    Key,
    /// String field value (inside quotes): `"` only.
    StringValue,
}

impl EscapeContext {
    /// Bytes that must be preceded by a backslash in this context.
    pub fn escape_set(self) -> &'static [u8] {
        match self {
            EscapeContext::Measurement => b", ",
            EscapeContext::Key => b",= ",
            EscapeContext::StringValue => b"\"",
        }
    }
}

/// Append `src` to `buf`, putting a backslash before every byte of the
/// context's escape set.
///
/// Unescaped runs are copied in one append each. Backslashes already in
/// `src` are copied verbatim.
pub fn escaped_append(buf: &mut GrowableBuffer, src: &str, context: EscapeContext) -> Result<()> {
    let set = context.escape_set();
    let mut rest = src.as_bytes();

    while let Some(pos) = rest.iter().position(|b| set.contains(b)) {
        if pos > 0 {
            buf.append(&rest[..pos])?;
        }
        buf.append(&[b'\\', rest[pos]])?;
        rest = &rest[pos + 1..];
    }
    if !rest.is_empty() {
        buf.append(rest)?;
    }
    Ok(())
}
