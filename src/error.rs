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

use std::error;
use amplify_derive::Display;

/// Failure categories for fallible core operations. A failed operation leaves
/// its target in the state it had before the call.
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq)]
pub enum ErrorKind {
	#[display("allocation failed")]
	Alloc,
	#[display("bounded segment capacity exceeded")]
	BoundedCapacity,
	#[display("virtual memory operation failed")]
	VirtualMemory,
	#[display("index out of range")]
	OutOfRange,
	#[display("byte sequence is invalid for its encoding")]
	Decode,
	#[display("code point is not representable in the target encoding")]
	Unrepresentable,
	#[display("encodings of source and target do not match")]
	EncodingMismatch,
	#[display("malformed format string")]
	FormatString,
	#[display("unknown format specifier")]
	FormatSpec,
	#[display("format argument index out of range")]
	FormatIndex,
}

#[derive(Copy, Clone, Debug, Display, Eq, PartialEq)]
#[display("{kind}")]
pub struct Error {
	kind: ErrorKind,
}

impl error::Error for Error { }

impl Error {
	pub(crate) const fn new(kind: ErrorKind) -> Self {
		Self { kind }
	}

	/// Returns the failure category.
	pub fn kind(&self) -> ErrorKind { self.kind }

	pub(crate) const fn alloc() -> Self { Self::new(ErrorKind::Alloc) }

	pub(crate) const fn bounded() -> Self { Self::new(ErrorKind::BoundedCapacity) }

	pub(crate) const fn virtual_memory() -> Self { Self::new(ErrorKind::VirtualMemory) }

	pub(crate) const fn out_of_range() -> Self { Self::new(ErrorKind::OutOfRange) }

	pub(crate) const fn decode() -> Self { Self::new(ErrorKind::Decode) }

	pub(crate) const fn unrepresentable() -> Self { Self::new(ErrorKind::Unrepresentable) }

	pub(crate) const fn encoding_mismatch() -> Self { Self::new(ErrorKind::EncodingMismatch) }

	pub(crate) const fn format_string() -> Self { Self::new(ErrorKind::FormatString) }

	pub(crate) const fn format_spec() -> Self { Self::new(ErrorKind::FormatSpec) }

	pub(crate) const fn format_index() -> Self { Self::new(ErrorKind::FormatIndex) }
}

pub type Result<T = (), E = Error> = std::result::Result<T, E>;
