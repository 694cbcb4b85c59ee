// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt::Write as _;
use arrayvec::ArrayString;
use crate::buffer::{Buffer, GrowableBuffer, SmallBuffer};
use crate::error::{Error, Result};
use crate::string::{byte_comparable, validate_encoding, Encoding, StrBuf, StrSpan};

/// Casing of hex digits produced by [`StrBuilder::append_hex`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HexCase {
	Lower,
	Upper,
}

/// Replacement passes [`StrBuilder::append_replace_multiple`] gives up
/// after, bounding pathological pair sets.
pub const MAX_REPLACE_PASSES: usize = 10;

/// One value formattable by [`StrBuilder::format`]. Usually built through
/// the [`fmt_args!`][crate::fmt_args] macro rather than by hand.
#[derive(Copy, Clone, Debug)]
pub enum FormatArg<'a> {
	Signed(i64),
	Unsigned(u64),
	Float(f64),
	Bool(bool),
	Char(char),
	Str(StrSpan<'a>),
}

macro_rules! format_arg_from {
	($variant:ident: $($type:ty)+) => {$(
		impl From<$type> for FormatArg<'_> {
			fn from(value: $type) -> Self { Self::$variant(value as _) }
		}
	)+};
}

format_arg_from! { Signed: i8 i16 i32 i64 isize }
format_arg_from! { Unsigned: u8 u16 u32 u64 usize }
format_arg_from! { Float: f32 f64 }

impl From<bool> for FormatArg<'_> {
	fn from(value: bool) -> Self { Self::Bool(value) }
}

impl From<char> for FormatArg<'_> {
	fn from(value: char) -> Self { Self::Char(value) }
}

impl<'a> From<&'a str> for FormatArg<'a> {
	fn from(value: &'a str) -> Self { Self::Str(StrSpan::utf8(value)) }
}

impl<'a> From<StrSpan<'a>> for FormatArg<'a> {
	fn from(value: StrSpan<'a>) -> Self { Self::Str(value) }
}

impl<'a> From<&'a StrBuf> for FormatArg<'a> {
	fn from(value: &'a StrBuf) -> Self { Self::Str(value.view()) }
}

/// Collects values into a `&[FormatArg]` for [`StrBuilder::format`].
#[macro_export]
macro_rules! fmt_args {
	($($arg:expr),* $(,)?) => {
		&[$($crate::FormatArg::from($arg)),*][..]
	};
}

/// Builds text into any growable byte target: an owned string, a plain byte
/// buffer, or anything else implementing [`GrowableBuffer`]. Appended views
/// are transcoded into the target encoding; any failing operation rolls the
/// target back to its length on entry to that operation.
pub struct StrBuilder<'a> {
	out: &'a mut dyn GrowableBuffer,
	encoding: Encoding,
}

impl<'a> StrBuilder<'a> {
	/// Builds into `out` with an explicit target encoding.
	pub fn new(out: &'a mut dyn GrowableBuffer, encoding: Encoding) -> Self {
		Self { out, encoding }
	}

	/// Builds onto the end of a string, in the string's encoding.
	pub fn for_string(string: &'a mut StrBuf) -> Self {
		let encoding = string.encoding();
		Self { out: string, encoding }
	}

	/// Builds UTF-8 onto the end of a byte buffer.
	pub fn for_buffer(buffer: &'a mut Buffer) -> Self {
		Self { out: buffer, encoding: Encoding::Utf8 }
	}

	/// Restores the target's invariants and releases the borrow.
	pub fn finalize(self) -> Result {
		self.out.finalize()
	}

	fn write_bytes(&mut self, bytes: &[u8]) -> Result {
		let size = self.out.size();
		self.out.resize_uninitialized(size + bytes.len())?;
		self.out.data_mut()[size..].copy_from_slice(bytes);
		Ok(())
	}

	/// Appends `view` transcoded into the target encoding.
	pub fn append(&mut self, view: StrSpan<'_>) -> Result {
		if byte_comparable(view.encoding(), self.encoding) &&
			!(view.encoding() == Encoding::Utf8 && self.encoding == Encoding::Ascii)
		{
			validate_encoding(view)?;
			return self.write_bytes(view.bytes())
		}

		let mut scratch = SmallBuffer::<64>::new();
		crate::string::transcode_append(view, self.encoding, &mut scratch)?;
		self.write_bytes(scratch.as_slice())
	}

	/// Appends `source` with every occurrence of `needle` replaced by
	/// `with`. The needle must share the source's byte encoding; the
	/// replacement may be shorter or longer than the needle.
	pub fn append_replace_all(
		&mut self,
		source: StrSpan<'_>,
		needle: StrSpan<'_>,
		with: StrSpan<'_>,
	) -> Result {
		let entry = self.out.size();
		let result = self.replace_all_inner(source, needle, with);
		if result.is_err() {
			let _ = self.out.resize_uninitialized(entry);
		}
		result
	}

	fn replace_all_inner(
		&mut self,
		source: StrSpan<'_>,
		needle: StrSpan<'_>,
		with: StrSpan<'_>,
	) -> Result {
		if !byte_comparable(source.encoding(), needle.encoding()) {
			return Err(Error::encoding_mismatch())
		}
		if needle.is_empty() {
			return self.append(source)
		}

		let bytes = source.bytes();
		let pattern = needle.bytes();
		let mut rest = 0;
		let mut pos = 0;
		while pos + pattern.len() <= bytes.len() {
			if &bytes[pos..pos + pattern.len()] == pattern {
				let chunk = StrSpan::new(&bytes[rest..pos], source.encoding(), false);
				self.append(chunk)?;
				self.append(with)?;
				pos += pattern.len();
				rest = pos;
			} else {
				pos += 1;
			}
		}
		self.append(StrSpan::new(&bytes[rest..], source.encoding(), false))
	}

	/// Appends `source` with every `(needle, replacement)` pair applied
	/// repeatedly until a full pass changes nothing, or
	/// [`MAX_REPLACE_PASSES`] is reached. All views must share the source's
	/// byte encoding.
	pub fn append_replace_multiple(
		&mut self,
		source: StrSpan<'_>,
		pairs: &[(StrSpan<'_>, StrSpan<'_>)],
	) -> Result {
		for (needle, with) in pairs {
			if !byte_comparable(source.encoding(), needle.encoding()) ||
				!byte_comparable(source.encoding(), with.encoding())
			{
				return Err(Error::encoding_mismatch())
			}
		}

		let mut current = Buffer::from_slice(source.bytes())?;
		let mut scratch = Buffer::new();
		for _ in 0..MAX_REPLACE_PASSES {
			let mut changed = false;
			for (needle, with) in pairs {
				if needle.is_empty() {
					continue
				}

				scratch.clear();
				changed |=
					replace_bytes(current.as_slice(), needle.bytes(), with.bytes(), &mut scratch)?;
				// Copied back rather than swapped; buffer headers must not
				// move while a position-independent scope is active.
				current.clear();
				current.append(scratch.as_slice())?;
			}

			if !changed {
				break
			}
		}

		self.append(StrSpan::new(current.as_slice(), source.encoding(), false))
	}

	/// Appends `bytes` encoded as hexadecimal ASCII digits, two per byte.
	pub fn append_hex(&mut self, bytes: &[u8], case: HexCase) -> Result {
		let mut scratch = SmallBuffer::<64>::new();
		scratch.resize_uninitialized(bytes.len() * 2)?;
		let encoded = match case {
			HexCase::Lower => base16ct::lower::encode(bytes, scratch.as_mut_slice()),
			HexCase::Upper => base16ct::upper::encode(bytes, scratch.as_mut_slice()),
		};
		debug_assert!(encoded.is_ok());
		let hex = StrSpan::new(scratch.as_slice(), Encoding::Ascii, false);
		self.append(hex)
	}

	/// Appends `fmt` with `{}` placeholders replaced by `args`.
	///
	/// Placeholders are positional: `{}` consumes the next argument, `{1}`
	/// picks one explicitly, and both accept a specifier after `:`. `{{` and
	/// `}}` escape literal braces. The specifier grammar is deliberately
	/// small: an optional zero-padded width and `x`/`X` hex for integers, a
	/// `.digits` precision for floats, nothing for everything else. Any
	/// unrecognized specifier or argument index fails the whole call and
	/// rolls the target back; nothing is silently ignored.
	///
	/// An ASCII or UTF-8 format string works for any target encoding, since
	/// braces are unambiguous bytes in UTF-8.
	pub fn format(&mut self, fmt: StrSpan<'_>, args: &[FormatArg<'_>]) -> Result {
		let entry = self.out.size();
		let result = self.format_inner(fmt, args);
		if result.is_err() {
			let _ = self.out.resize_uninitialized(entry);
		}
		result
	}

	fn format_inner(&mut self, fmt: StrSpan<'_>, args: &[FormatArg<'_>]) -> Result {
		if fmt.encoding() == Encoding::Utf16 {
			return Err(Error::encoding_mismatch())
		}

		let bytes = fmt.bytes();
		let mut literal_start = 0;
		let mut pos = 0;
		let mut next_auto = 0;
		while pos < bytes.len() {
			match bytes[pos] {
				b'{' if bytes.get(pos + 1) == Some(&b'{') => {
					self.append_literal(fmt, literal_start, pos + 1)?;
					pos += 2;
					literal_start = pos;
				}
				b'}' if bytes.get(pos + 1) == Some(&b'}') => {
					self.append_literal(fmt, literal_start, pos + 1)?;
					pos += 2;
					literal_start = pos;
				}
				b'}' => return Err(Error::format_string()),
				b'{' => {
					self.append_literal(fmt, literal_start, pos)?;
					let close = bytes[pos..]
						.iter()
						.position(|&byte| byte == b'}')
						.ok_or(Error::format_string())?;
					let inner = &bytes[pos + 1..pos + close];
					self.format_placeholder(inner, args, &mut next_auto)?;
					pos += close + 1;
					literal_start = pos;
				}
				_ => pos += 1,
			}
		}
		self.append_literal(fmt, literal_start, bytes.len())
	}

	fn append_literal(&mut self, fmt: StrSpan<'_>, start: usize, end: usize) -> Result {
		if start == end {
			return Ok(())
		}

		let chunk = StrSpan::new(&fmt.bytes()[start..end], fmt.encoding(), false);
		self.append(chunk)
	}

	fn format_placeholder(
		&mut self,
		inner: &[u8],
		args: &[FormatArg<'_>],
		next_auto: &mut usize,
	) -> Result {
		let (index_part, spec) = match inner.iter().position(|&byte| byte == b':') {
			Some(colon) => (&inner[..colon], &inner[colon + 1..]),
			None => (inner, &[][..]),
		};

		let index = if index_part.is_empty() {
			let index = *next_auto;
			*next_auto += 1;
			index
		} else {
			parse_index(index_part).ok_or(Error::format_string())?
		};

		let arg = args.get(index).ok_or(Error::format_index())?;
		self.format_arg(arg, spec)
	}

	fn format_arg(&mut self, arg: &FormatArg<'_>, spec: &[u8]) -> Result {
		let mut scratch = ArrayString::<64>::new();
		match *arg {
			FormatArg::Signed(value) => {
				let spec = IntSpec::parse(spec)?;
				spec.write(&mut scratch, value)?;
			}
			FormatArg::Unsigned(value) => {
				let spec = IntSpec::parse(spec)?;
				spec.write(&mut scratch, value)?;
			}
			FormatArg::Float(value) => {
				let written = match FloatSpec::parse(spec)? {
					FloatSpec::Default => write!(scratch, "{value}"),
					FloatSpec::Precision(digits) => write!(scratch, "{value:.digits$}"),
				};
				written.map_err(|_| Error::format_spec())?;
			}
			FormatArg::Bool(value) => {
				require_empty_spec(spec)?;
				scratch.push_str(if value { "true" } else { "false" });
			}
			FormatArg::Char(value) => {
				require_empty_spec(spec)?;
				let mut encoded = [0u8; 4];
				return self.append(StrSpan::utf8(value.encode_utf8(&mut encoded)))
			}
			FormatArg::Str(view) => {
				require_empty_spec(spec)?;
				return self.append(view)
			}
		}
		self.append(StrSpan::ascii(&scratch))
	}
}

fn require_empty_spec(spec: &[u8]) -> Result {
	if spec.is_empty() { Ok(()) } else { Err(Error::format_spec()) }
}

fn parse_index(digits: &[u8]) -> Option<usize> {
	if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
		return None
	}

	std::str::from_utf8(digits).ok()?.parse().ok()
}

/// The integer specifier grammar: `[0][width][x|X]`.
struct IntSpec {
	zero_pad: bool,
	width: usize,
	radix: IntRadix,
}

enum IntRadix {
	Decimal,
	HexLower,
	HexUpper,
}

impl IntSpec {
	fn parse(spec: &[u8]) -> Result<Self> {
		let (digits, radix) = match spec.last() {
			Some(b'x') => (&spec[..spec.len() - 1], IntRadix::HexLower),
			Some(b'X') => (&spec[..spec.len() - 1], IntRadix::HexUpper),
			_ => (spec, IntRadix::Decimal),
		};

		if !digits.iter().all(u8::is_ascii_digit) {
			return Err(Error::format_spec())
		}

		let zero_pad = digits.first() == Some(&b'0');
		let width = if digits.is_empty() {
			0
		} else {
			parse_index(digits).ok_or(Error::format_spec())?
		};
		Ok(Self { zero_pad, width, radix })
	}

	fn write<T: std::fmt::Display + std::fmt::LowerHex + std::fmt::UpperHex>(
		&self,
		out: &mut ArrayString<64>,
		value: T,
	) -> Result {
		let width = self.width;
		let written = match (&self.radix, self.zero_pad) {
			(IntRadix::Decimal, false) => write!(out, "{value:width$}"),
			(IntRadix::Decimal, true) => write!(out, "{value:0width$}"),
			(IntRadix::HexLower, false) => write!(out, "{value:width$x}"),
			(IntRadix::HexLower, true) => write!(out, "{value:0width$x}"),
			(IntRadix::HexUpper, false) => write!(out, "{value:width$X}"),
			(IntRadix::HexUpper, true) => write!(out, "{value:0width$X}"),
		};
		written.map_err(|_| Error::format_spec())
	}
}

enum FloatSpec {
	Default,
	Precision(usize),
}

impl FloatSpec {
	fn parse(spec: &[u8]) -> Result<Self> {
		match spec {
			[] => Ok(Self::Default),
			[b'.', digits @ ..] if !digits.is_empty() => {
				let digits = parse_index(digits).ok_or(Error::format_spec())?;
				Ok(Self::Precision(digits))
			}
			_ => Err(Error::format_spec()),
		}
	}
}

fn replace_bytes(
	source: &[u8],
	needle: &[u8],
	with: &[u8],
	out: &mut Buffer,
) -> Result<bool> {
	let mut changed = false;
	let mut rest = 0;
	let mut pos = 0;
	while pos + needle.len() <= source.len() {
		if &source[pos..pos + needle.len()] == needle {
			out.append(&source[rest..pos])?;
			out.append(with)?;
			pos += needle.len();
			rest = pos;
			changed = true;
		} else {
			pos += 1;
		}
	}
	out.append(&source[rest..])?;
	Ok(changed)
}

#[cfg(test)]
mod test {
	use pretty_assertions::assert_eq;
	use crate::buffer::{Buffer, GrowableBuffer};
	use crate::fmt_args;
	use crate::string::{Encoding, StrBuf};
	use super::{HexCase, StrBuilder};

	fn built(f: impl FnOnce(&mut StrBuilder<'_>)) -> StrBuf {
		let mut string = StrBuf::new();
		let mut builder = StrBuilder::for_string(&mut string);
		f(&mut builder);
		builder.finalize().unwrap();
		string
	}

	#[test]
	fn format_positional_and_auto() {
		let out = built(|b| {
			b.format("{} + {} = {2}".into(), fmt_args![1, 2, 3]).unwrap();
		});
		assert_eq!(out, "1 + 2 = 3");
	}

	#[test]
	fn format_escaped_braces() {
		let out = built(|b| {
			b.format("{{{}}}".into(), fmt_args![7]).unwrap();
		});
		assert_eq!(out, "{7}");
	}

	#[test]
	fn format_specs() {
		let out = built(|b| {
			b.format("{:x} {:X} {:04} {:.2} {} {}".into(),
				fmt_args![255u32, 255u32, 7, 1.5f64, true, 'z']).unwrap();
		});
		assert_eq!(out, "ff FF 0007 1.50 true z");
	}

	#[test]
	fn format_strings_and_views() {
		let name = StrBuf::from("world");
		let out = built(|b| {
			b.format("hello {}".into(), fmt_args![&name]).unwrap();
		});
		assert_eq!(out, "hello world");
	}

	#[test]
	fn unknown_spec_fails_and_rolls_back() {
		let mut string = StrBuf::from("kept");
		let mut builder = StrBuilder::for_string(&mut string);
		assert!(builder.format("{:q}".into(), fmt_args![1]).is_err());
		assert!(builder.format("{9}".into(), fmt_args![1]).is_err());
		assert!(builder.format("{".into(), fmt_args![1]).is_err());
		assert!(builder.format("}".into(), fmt_args![1]).is_err());
		builder.finalize().unwrap();
		assert_eq!(string, "kept");
	}

	#[test]
	fn append_transcodes_into_target() {
		let mut wide = StrBuf::with_encoding(Encoding::Utf16);
		let mut builder = StrBuilder::for_string(&mut wide);
		builder.format("n = {}".into(), fmt_args![5]).unwrap();
		builder.finalize().unwrap();
		assert_eq!(wide, "n = 5");
		assert_eq!(wide.view().bytes(), &[b'n', 0, b' ', 0, b'=', 0, b' ', 0, b'5', 0]);
	}

	#[test]
	fn append_hex_cases() {
		let bytes = [0x09, 0x8F, 0x6B, 0xCD];
		let upper = built(|b| b.append_hex(&bytes, HexCase::Upper).unwrap());
		assert_eq!(upper, "098F6BCD");

		let lower = built(|b| b.append_hex(&bytes, HexCase::Lower).unwrap());
		assert_eq!(lower, "098f6bcd");
	}

	#[test]
	fn replace_all_grows_and_shrinks() {
		let out = built(|b| {
			b.append_replace_all("a_b_c".into(), "_".into(), "--".into()).unwrap();
		});
		assert_eq!(out, "a--b--c");

		let out = built(|b| {
			b.append_replace_all("aXXbXX".into(), "XX".into(), "".into()).unwrap();
		});
		assert_eq!(out, "ab");

		let out = built(|b| {
			b.append_replace_all("no match".into(), "q".into(), "!".into()).unwrap();
		});
		assert_eq!(out, "no match");
	}

	#[test]
	fn replace_multiple_runs_until_stable() {
		let out = built(|b| {
			b.append_replace_multiple("aaaaaaaa".into(), &[("aa".into(), "a".into())])
				.unwrap();
		});
		assert_eq!(out, "a");

		let out = built(|b| {
			b.append_replace_multiple(
				"1 and 2".into(),
				&[("1".into(), "one".into()), ("2".into(), "two".into())],
			)
			.unwrap();
		});
		assert_eq!(out, "one and two");
	}

	#[test]
	fn builds_into_plain_buffers() {
		let mut buffer = Buffer::new();
		let mut builder = StrBuilder::for_buffer(&mut buffer);
		builder.format("id={0:04}".into(), fmt_args![42]).unwrap();
		builder.finalize().unwrap();
		assert_eq!(buffer.data(), b"id=0042");
	}
}
