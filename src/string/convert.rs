// SPDX-License-Identifier: Apache-2.0

use amplify_derive::Display;
use simdutf8::compat;
use thiserror::Error;
use crate::buffer::Buffer;
use crate::error::{Error, Result};
use super::{AnyCursor, Encoding, StrSpan};

/// A decode failure inside encoded text.
#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
#[error("{kind} sequence from byte {valid_up_to}")]
pub struct DecodeError {
	/// The length of the valid prefix before the error.
	pub valid_up_to: usize,
	/// The error kind.
	pub kind: DecodeErrorKind,
}

#[derive(Copy, Clone, Debug, Display, Eq, PartialEq)]
pub enum DecodeErrorKind {
	/// An invalid code unit sequence.
	#[display("invalid")]
	InvalidSequence,
	/// A code unit sequence cut short by the end of the text.
	#[display("incomplete")]
	IncompleteChar,
}

impl DecodeError {
	fn invalid(valid_up_to: usize) -> Self {
		Self { valid_up_to, kind: DecodeErrorKind::InvalidSequence }
	}

	fn incomplete(valid_up_to: usize) -> Self {
		Self { valid_up_to, kind: DecodeErrorKind::IncompleteChar }
	}
}

impl From<compat::Utf8Error> for DecodeError {
	fn from(value: compat::Utf8Error) -> Self {
		if value.error_len().is_some() {
			Self::invalid(value.valid_up_to())
		} else {
			Self::incomplete(value.valid_up_to())
		}
	}
}

impl From<DecodeError> for Error {
	fn from(_: DecodeError) -> Self {
		Error::decode()
	}
}

/// Checks that `span` is well-formed for its encoding, reporting the offset
/// of the first offending sequence.
pub fn validate_encoding(span: StrSpan<'_>) -> Result<(), DecodeError> {
	match span.encoding() {
		Encoding::Ascii => {
			match span.bytes().iter().position(|&byte| byte >= 0x80) {
				Some(pos) => Err(DecodeError::invalid(pos)),
				None => Ok(()),
			}
		}
		Encoding::Utf8 => {
			compat::from_utf8(span.bytes()).map_err(DecodeError::from)?;
			Ok(())
		}
		Encoding::Utf16 => {
			if span.size_in_bytes() % 2 != 0 {
				return Err(DecodeError::incomplete(span.size_in_bytes() - 1))
			}

			let mut cursor = span.cursor();
			while !cursor.is_at_end() {
				if !cursor.step_forward() {
					return Err(DecodeError::invalid(cursor.position()))
				}
			}
			Ok(())
		}
	}
}

fn encode_into(c: char, target: Encoding, out: &mut Buffer) -> Result {
	match target {
		Encoding::Ascii => {
			if c as u32 > 0x7F {
				return Err(Error::unrepresentable())
			}

			out.push_back(c as u8)
		}
		Encoding::Utf8 => {
			let mut scratch = [0u8; 4];
			out.append(c.encode_utf8(&mut scratch).as_bytes())
		}
		Encoding::Utf16 => {
			let mut scratch = [0u16; 2];
			for unit in c.encode_utf16(&mut scratch).iter() {
				out.append(&unit.to_le_bytes())?;
			}
			Ok(())
		}
	}
}

fn transcode(source: StrSpan<'_>, target: Encoding, out: &mut Buffer) -> Result {
	// ASCII is a byte-identical subset of UTF-8, so three of the nine
	// encoding pairs append bytes directly once the source is validated.
	let direct = source.encoding() == target ||
		(source.encoding() == Encoding::Ascii && target == Encoding::Utf8);
	if direct {
		validate_encoding(source)?;
		return out.append(source.bytes())
	}

	let mut cursor = source.cursor();
	while let Some(c) = next_code_point(&mut cursor)? {
		encode_into(c, target, out)?;
	}
	Ok(())
}

fn next_code_point(cursor: &mut AnyCursor<'_>) -> Result<Option<char>> {
	match cursor.advance_read() {
		Some(c) => Ok(Some(c)),
		None if cursor.is_at_end() => Ok(None),
		None => Err(Error::decode()),
	}
}

/// Appends `source` to `out` transcoded into `target`. On any failure
/// (invalid input, a code point the target cannot represent, allocation)
/// the buffer is rolled back to its length on entry.
pub fn transcode_append(source: StrSpan<'_>, target: Encoding, out: &mut Buffer) -> Result {
	let entry_size = out.size();
	let result = transcode(source, target, out);
	if result.is_err() {
		out.truncate(entry_size);
	}
	result
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use quickcheck_macros::quickcheck;
	use crate::buffer::Buffer;
	use crate::string::{Encoding, StrSpan};
	use super::{transcode_append, validate_encoding, DecodeErrorKind};

	#[test]
	fn utf8_to_utf16_bit_exact() {
		let source = StrSpan::new(
			&[0xE6, 0x97, 0xA5, 0xE6, 0x9C, 0xAC, 0xE8, 0xAA, 0x9E],
			Encoding::Utf8,
			false,
		);
		let mut out = Buffer::new();
		transcode_append(source, Encoding::Utf16, &mut out).unwrap();
		assert_eq!(out.as_slice(), &[0xE5, 0x65, 0x2C, 0x67, 0x9E, 0x8A]);
	}

	#[test]
	fn surrogate_pairs_survive_both_directions() {
		let text = "a𝄞b";
		let mut wide = Buffer::new();
		transcode_append(StrSpan::utf8(text), Encoding::Utf16, &mut wide).unwrap();

		let mut narrow = Buffer::new();
		let view = StrSpan::new(wide.as_slice(), Encoding::Utf16, false);
		transcode_append(view, Encoding::Utf8, &mut narrow).unwrap();
		assert_eq!(narrow.as_slice(), text.as_bytes());
	}

	#[test]
	fn ascii_target_rejects_high_code_points() {
		let mut out = Buffer::new();
		out.append(b"kept").unwrap();
		let result = transcode_append(StrSpan::utf8("héllo"), Encoding::Ascii, &mut out);
		assert!(result.is_err());
		assert_eq!(out.as_slice(), b"kept", "failure rolls the buffer back");
	}

	#[test]
	fn ascii_source_appends_directly_into_utf8() {
		let mut out = Buffer::new();
		transcode_append(StrSpan::ascii("plain"), Encoding::Utf8, &mut out).unwrap();
		assert_eq!(out.as_slice(), b"plain");
	}

	#[test]
	fn invalid_utf8_fails_without_partial_output() {
		let source = StrSpan::new(&[b'o', b'k', 0xE6, 0x97], Encoding::Utf8, false);
		let mut out = Buffer::new();
		assert!(transcode_append(source, Encoding::Utf16, &mut out).is_err());
		assert!(out.is_empty());
	}

	#[test]
	fn validate_reports_the_failure_offset() {
		let err = validate_encoding(StrSpan::new(&[b'a', 0xFF], Encoding::Utf8, false)).unwrap_err();
		assert_eq!(err.valid_up_to, 1);
		assert_eq!(err.kind, DecodeErrorKind::InvalidSequence);

		let err = validate_encoding(StrSpan::new(&[0xE6, 0x97], Encoding::Utf8, false)).unwrap_err();
		assert_eq!(err.kind, DecodeErrorKind::IncompleteChar);

		let err = validate_encoding(StrSpan::new(&[b'a', 0x80], Encoding::Ascii, false)).unwrap_err();
		assert_eq!(err.valid_up_to, 1);

		assert!(validate_encoding(StrSpan::utf8("日本語")).is_ok());
	}

	#[quickcheck]
	fn utf8_utf16_round_trip(text: String) {
		let mut wide = Buffer::new();
		transcode_append(StrSpan::utf8(&text), Encoding::Utf16, &mut wide).unwrap();

		let mut narrow = Buffer::new();
		let view = StrSpan::new(wide.as_slice(), Encoding::Utf16, false);
		transcode_append(view, Encoding::Utf8, &mut narrow).unwrap();
		assert_eq!(narrow.as_slice(), text.as_bytes());
	}
}
