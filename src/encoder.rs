//! Line protocol encoder.
//!
//! The encoder is a small state machine: it remembers the kind of the last
//! accepted token, rejects any token that may not follow it, and picks the
//! separator to emit before each tag or field.
//!
//! ```text
//! foo,k=v,k2=v2 s="string",f=28.39 1512722735522840439
//! bar i=1048576i,b=t
//! ```

use std::fmt::Write;

use tracing::trace;

use crate::buffer::GrowableBuffer;
use crate::error::{Error, Result};
use crate::escape::{EscapeContext, escaped_append};
use crate::token::{Token, TokenKind};

/// Streaming encoder for one [`crate::TokenSequence`].
///
/// On any error the encoder is dropped by its caller together with the
/// partial output; only [`LineEncoder::finish`] hands bytes out.
#[derive(Debug)]
pub struct LineEncoder {
    buf: GrowableBuffer,
    last: TokenKind,
    position: usize,
}

impl LineEncoder {
    /// Create an encoder with a fresh output buffer.
    pub fn new() -> Result<Self> {
        Ok(Self {
            buf: GrowableBuffer::new()?,
            last: TokenKind::None,
            position: 0,
        })
    }

    /// Kind of the last accepted token.
    pub fn last_kind(&self) -> TokenKind {
        self.last
    }

    /// Returns true once the end marker has been accepted.
    pub fn is_finished(&self) -> bool {
        self.last == TokenKind::End
    }

    /// Validate `token` against the last accepted one and append it.
    pub fn push(&mut self, token: &Token) -> Result<()> {
        let kind = token.kind();
        if !self.allows(kind) {
            return Err(Error::Grammar {
                position: self.position,
                token: kind,
                previous: self.last,
            });
        }
        if let Token::FieldFloat { key, value, .. } = token {
            if !value.into_inner().is_finite() {
                return Err(Error::NonFiniteFloat { key: key.clone() });
            }
        }

        if let Some(key) = token.key() {
            let crossing = matches!(self.last, TokenKind::Measurement | TokenKind::Tag);
            self.buf
                .push(if crossing && kind.is_field() { b' ' } else { b',' })?;
            escaped_append(&mut self.buf, key, EscapeContext::Key)?;
            self.buf.push(b'=')?;
        }

        match token {
            Token::Measurement(name) => {
                if self.last != TokenKind::None {
                    self.buf.push(b'\n')?;
                }
                escaped_append(&mut self.buf, name, EscapeContext::Measurement)?;
            }
            Token::Tag { value, .. } => {
                escaped_append(&mut self.buf, value, EscapeContext::Key)?;
            }
            Token::FieldString { value, .. } => {
                self.buf.push(b'"')?;
                escaped_append(&mut self.buf, value, EscapeContext::StringValue)?;
                self.buf.push(b'"')?;
            }
            Token::FieldFloat {
                value, precision, ..
            } => {
                let precision = usize::from(*precision);
                self.render(format_args!("{:.*}", precision, value.into_inner()))?;
            }
            Token::FieldInteger { value, .. } => {
                self.render(format_args!("{}i", value))?;
            }
            Token::FieldBoolean { value, .. } => {
                self.buf.push(if *value { b't' } else { b'f' })?;
            }
            Token::Timestamp(ts) => {
                self.render(format_args!(" {}", ts))?;
            }
            Token::End => {}
        }

        self.last = kind;
        self.position += 1;
        Ok(())
    }

    /// Take the encoded bytes. Fails unless the end marker was accepted.
    pub fn finish(self) -> Result<Vec<u8>> {
        if !self.is_finished() {
            return Err(Error::Unterminated {
                position: self.position,
            });
        }
        trace!(bytes = self.buf.len(), "Encoded line protocol.");
        Ok(self.buf.into_bytes())
    }

    fn allows(&self, kind: TokenKind) -> bool {
        let last = self.last;
        match kind {
            TokenKind::Measurement => {
                last == TokenKind::None || last.is_field() || last == TokenKind::Timestamp
            }
            TokenKind::Tag => matches!(last, TokenKind::Measurement | TokenKind::Tag),
            k if k.is_field() => {
                matches!(last, TokenKind::Measurement | TokenKind::Tag) || last.is_field()
            }
            TokenKind::Timestamp => last.is_field(),
            TokenKind::End => last.is_field() || last == TokenKind::Timestamp,
            _ => false,
        }
    }

    fn render(&mut self, args: std::fmt::Arguments<'_>) -> Result<()> {
        self.buf.write_fmt(args).map_err(|_| Error::Alloc)
    }
}

/// Encode a token sequence into line protocol.
///
/// Encoding stops at the first [`Token::End`]; anything after it is ignored.
/// Nothing is returned unless the whole sequence up to the end marker is
/// valid.
pub fn encode_line(tokens: impl AsRef<[Token]>) -> Result<Vec<u8>> {
    let mut encoder = LineEncoder::new()?;
    for token in tokens.as_ref() {
        encoder.push(token)?;
        if encoder.is_finished() {
            break;
        }
    }
    encoder.finish()
}

/// Encode a single point: `measurement` followed by `tokens`.
///
/// The end marker is appended when `tokens` does not carry one.
pub fn encode_point(measurement: &str, tokens: impl AsRef<[Token]>) -> Result<Vec<u8>> {
    let mut encoder = LineEncoder::new()?;
    encoder.push(&Token::measurement(measurement))?;
    for token in tokens.as_ref() {
        encoder.push(token)?;
        if encoder.is_finished() {
            break;
        }
    }
    if !encoder.is_finished() {
        encoder.push(&Token::End)?;
    }
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenSequence;

    fn encode(tokens: Vec<Token>) -> Result<String> {
        encode_line(&tokens).map(|b| String::from_utf8(b).unwrap())
    }

    fn ok(tokens: Vec<Token>) -> String {
        encode(tokens).expect("sequence should encode")
    }

    fn grammar_error(tokens: Vec<Token>) {
        match encode(tokens) {
            Err(Error::Grammar { .. }) | Err(Error::Unterminated { .. }) => {}
            other => panic!("expected grammar error, got {:?}", other),
        }
    }

    fn m(name: &str) -> Token {
        Token::measurement(name)
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    #[test]
    fn test_tags_and_fields() {
        let line = ok(vec![
            m("foo"),
            Token::tag("k", "v"),
            Token::tag("k2", "v2"),
            Token::field_str("s", "string"),
            Token::field_float("f", 28.39, 2),
            Token::End,
        ]);
        assert_eq!(line, "foo,k=v,k2=v2 s=\"string\",f=28.39");
    }

    #[test]
    fn test_fields_and_timestamp() {
        let line = ok(vec![
            m("foo"),
            Token::field_float("f", 28.39, 2),
            Token::field_float("f2", 28.39, 1),
            Token::timestamp(1512722735522840439),
            Token::End,
        ]);
        assert_eq!(line, "foo f=28.39,f2=28.4 1512722735522840439");
    }

    #[test]
    fn test_every_field_type() {
        let line = ok(vec![
            m("test"),
            Token::tag("k", "v"),
            Token::field_str("s", "string"),
            Token::field_float("f", 28.0, 0),
            Token::field_int("i", 1048576),
            Token::field_bool("b", true),
            Token::field_bool("n", false),
            Token::timestamp(1512722735522840439),
            Token::End,
        ]);
        assert_eq!(
            line,
            "test,k=v s=\"string\",f=28,i=1048576i,b=t,n=f 1512722735522840439"
        );
    }

    #[test]
    fn test_float_precision_is_fixed_point() {
        assert_eq!(ok(vec![m("foo"), Token::field_float("f", 28.39, 0), Token::End]), "foo f=28");
        assert_eq!(
            ok(vec![m("foo"), Token::field_float("f", 1e21, 1), Token::End]),
            "foo f=1000000000000000000000.0"
        );
        assert_eq!(
            ok(vec![m("foo"), Token::field_float("f", 0.000001, 3), Token::End]),
            "foo f=0.000"
        );
        assert_eq!(
            ok(vec![m("foo"), Token::field_float("f", -2.5, 3), Token::End]),
            "foo f=-2.500"
        );
    }

    #[test]
    fn test_negative_integer_and_timestamp() {
        assert_eq!(
            ok(vec![m("foo"), Token::field_int("i", -7), Token::timestamp(-1), Token::End]),
            "foo i=-7i -1"
        );
    }

    #[test]
    fn test_escaping_per_position() {
        let line = ok(vec![
            m("my meas,x=y"),
            Token::tag("t k", "a=b,c"),
            Token::field_str("f=1", "say \"hi\", ok"),
            Token::End,
        ]);
        assert_eq!(
            line,
            "my\\ meas\\,x=y,t\\ k=a\\=b\\,c f\\=1=\"say \\\"hi\\\", ok\""
        );
    }

    #[test]
    fn test_long_values_grow_buffer() {
        let value = "x".repeat(1000);
        let line = ok(vec![m("foo"), Token::field_str("s", value.clone()), Token::End]);
        assert_eq!(line, format!("foo s=\"{}\"", value));
    }

    // =========================================================================
    // Multiple measurements
    // =========================================================================

    #[test]
    fn test_two_lines() {
        let line = ok(vec![
            m("foo"),
            Token::tag("k", "v"),
            Token::tag("k2", "v2"),
            Token::field_str("s", "string"),
            Token::field_float("f", 28.39, 2),
            m("bar"),
            Token::field_int("i", 1048576),
            Token::field_bool("b", true),
            Token::timestamp(1512722735522840439),
            Token::End,
        ]);
        assert_eq!(
            line,
            "foo,k=v,k2=v2 s=\"string\",f=28.39\nbar i=1048576i,b=t 1512722735522840439"
        );
    }

    #[test]
    fn test_new_line_after_each_field_kind() {
        for field in [
            Token::field_str("s", "string"),
            Token::field_float("f", 28.39, 0),
            Token::field_int("i", 1048576),
            Token::field_bool("b", true),
        ] {
            let first = ok(vec![m("foo"), field.clone(), Token::End]);
            let both = ok(vec![m("foo"), field, m("bar"), Token::field_float("f", 0.0, 0), Token::End]);
            assert_eq!(both, format!("{}\nbar f=0", first));
        }
    }

    #[test]
    fn test_n_groups_have_n_minus_one_separators() {
        let group = |i: i64| {
            vec![
                m("cpu"),
                Token::tag("host", format!("h{}", i)),
                Token::field_int("n", i),
                Token::timestamp(i),
            ]
        };

        let mut tokens = Vec::new();
        let mut expected = Vec::new();
        for i in 0..5 {
            let mut single = group(i);
            single.push(Token::End);
            expected.push(ok(single));
            tokens.extend(group(i));
        }
        tokens.push(Token::End);

        let out = ok(tokens);
        assert_eq!(out.matches('\n').count(), 4);
        assert_eq!(out.split('\n').collect::<Vec<_>>(), expected);
    }

    // =========================================================================
    // Grammar
    // =========================================================================

    #[test]
    fn test_must_start_with_measurement() {
        grammar_error(vec![Token::tag("k", "v"), Token::End]);
        grammar_error(vec![Token::field_str("k", "v"), Token::End]);
        grammar_error(vec![Token::field_float("f", 28.39, 2), Token::End]);
        grammar_error(vec![Token::field_int("i", 1048576), Token::End]);
        grammar_error(vec![Token::field_bool("b", true), Token::End]);
        grammar_error(vec![Token::timestamp(1512722735522840439), Token::End]);
        grammar_error(vec![Token::End]);
    }

    #[test]
    fn test_invalid_after_measurement() {
        grammar_error(vec![m("foo"), Token::End]);
        grammar_error(vec![m("foo"), m("bar"), Token::field_int("i", 1), Token::End]);
        grammar_error(vec![m("foo"), Token::timestamp(1), Token::End]);
    }

    #[test]
    fn test_invalid_after_tag() {
        grammar_error(vec![m("foo"), Token::tag("k", "v"), Token::End]);
        grammar_error(vec![m("foo"), Token::tag("k", "v"), m("bar")]);
        grammar_error(vec![m("foo"), Token::tag("k", "v"), Token::timestamp(1), Token::End]);
    }

    #[test]
    fn test_tag_after_field_is_rejected() {
        for field in [
            Token::field_str("s", "string"),
            Token::field_float("f", 1.0, 1),
            Token::field_int("i", 1),
            Token::field_bool("b", false),
        ] {
            grammar_error(vec![m("foo"), field, Token::tag("k", "v"), Token::End]);
        }
    }

    #[test]
    fn test_invalid_after_timestamp() {
        let after_ts = |t: Token| {
            grammar_error(vec![m("foo"), Token::field_int("i", 1), Token::timestamp(1), t, Token::End]);
        };
        after_ts(Token::tag("k", "v"));
        after_ts(Token::field_str("s", "x"));
        after_ts(Token::field_float("f", 1.0, 1));
        after_ts(Token::field_int("i", 2));
        after_ts(Token::field_bool("b", true));
        after_ts(Token::timestamp(2));
    }

    #[test]
    fn test_second_line_must_be_complete() {
        grammar_error(vec![m("foo"), Token::field_int("i", 1), m("bar"), Token::End]);
        grammar_error(vec![
            m("foo"),
            Token::field_int("i", 1),
            m("bar"),
            Token::tag("k", "v"),
            Token::End,
        ]);
    }

    #[test]
    fn test_grammar_error_reports_position() {
        let err = encode(vec![m("foo"), Token::tag("k", "v"), Token::timestamp(1)]).unwrap_err();
        match err {
            Error::Grammar {
                position,
                token,
                previous,
            } => {
                assert_eq!(position, 2);
                assert_eq!(token, TokenKind::Timestamp);
                assert_eq!(previous, TokenKind::Tag);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_end_is_rejected() {
        let err = encode(vec![m("foo"), Token::field_int("i", 1)]).unwrap_err();
        assert!(matches!(err, Error::Unterminated { position: 2 }));
        assert_eq!(err.code(), -1);
    }

    #[test]
    fn test_tokens_after_end_are_ignored() {
        let line = ok(vec![m("foo"), Token::field_int("i", 1), Token::End, Token::tag("k", "v")]);
        assert_eq!(line, "foo i=1i");
    }

    #[test]
    fn test_push_after_end_is_rejected() {
        let mut encoder = LineEncoder::new().unwrap();
        encoder.push(&m("foo")).unwrap();
        encoder.push(&Token::field_int("i", 1)).unwrap();
        encoder.push(&Token::End).unwrap();
        assert!(matches!(encoder.push(&m("bar")), Err(Error::Grammar { .. })));
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = encode(vec![m("foo"), Token::field_float("f", value, 2), Token::End]).unwrap_err();
            assert!(matches!(err, Error::NonFiniteFloat { ref key } if key == "f"));
        }
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    #[test]
    fn test_encode_point_adds_measurement_and_end() {
        let out = encode_point("foo", [Token::tag("k", "v"), Token::field_float("f", 28.39, 1)]).unwrap();
        assert_eq!(out, b"foo,k=v f=28.4");

        let out = encode_point("foo", [Token::field_int("i", 1), Token::End]).unwrap();
        assert_eq!(out, b"foo i=1i");
    }

    #[test]
    fn test_encode_point_rejects_empty_point() {
        assert!(matches!(encode_point("foo", Vec::<Token>::new()), Err(Error::Grammar { .. })));
    }

    #[test]
    fn test_encode_builder_sequence() {
        let seq = TokenSequence::builder()
            .measurement("foo")
            .tag("k", "v")
            .field_bool("b", false)
            .timestamp(10)
            .measurement("bar")
            .field_int("i", 3)
            .build();
        assert_eq!(encode_line(&seq).unwrap(), b"foo,k=v b=f 10\nbar i=3i");
    }
}
