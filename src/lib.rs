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

//! ## How it works
//!
//! All contiguous storage in this crate sits on one uniform representation,
//! the *segment*: a small header carrying size, capacity, an allocator tag
//! and a payload reference. The payload can live in an inline buffer right
//! after the header, in a heap block, or inside a virtual-memory arena
//! referenced by a self-relative offset. Containers are thin wrappers over a
//! segment: [`Vector`] grows on the heap, [`SmallVector`] starts inline and
//! spills, [`Array`] is bounded and never allocates, and all three pass
//! anywhere a `&mut Segment<T>` is accepted. [`VectorMap`], [`VectorSet`],
//! [`Arena`] and the string types compose on top of the same machinery.
//!
//! ### Allocators
//!
//! Segments do not hold an allocator; they hold a tag naming one of two
//! registry stacks, process-wide and per-thread, and consult the top of
//! their stack at the moment an allocation is needed. A scope guard
//! ([`AllocatorScope`]) pushes an allocator for the duration of a scope:
//! the system forwarders by default, a [`FixedAllocator`] bumping through a
//! caller-supplied span, or a [`VirtualAllocator`] committing pages of a
//! [`VirtualMemory`] reservation on demand.
//!
//! ### Memory dumps
//!
//! Building a graph inside a [`dump::DumpArena`] makes every segment
//! allocate from one contiguous virtual-memory block and store its payload
//! reference as an offset from its own header. The arena's live bytes are
//! then a complete, address-independent image of the graph: copy them into
//! any buffer, persist them, and reinterpret them later with
//! [`dump::view`]. No fixups, no framing, no versioning.
//!
//! ### Strings
//!
//! [`StrBuf`] owns encoded text (ASCII, UTF-8 or UTF-16) over a byte
//! segment, null-terminated in its encoding whenever non-empty.
//! [`StrSpan`] is the borrowed view, with per-encoding cursors that step by
//! whole code points. [`StrBuilder`] formats, transcodes, replaces and
//! hex-encodes into anything implementing [`GrowableBuffer`].

mod arena;
mod buffer;
mod builder;
mod error;
mod id;
mod map;
mod segment;
mod stable;
mod string;
mod vector;
mod vmem;

pub mod alloc;
pub mod dump;

pub use alloc::{
	Allocator, AllocatorKind, AllocatorScope, FixedAllocator, GlobalAllocator,
	ThreadLocalAllocator, VirtualAllocator,
};
pub use arena::{Arena, Handle};
pub use buffer::*;
pub use builder::*;
pub use dump::DumpArena;
pub use error::*;
pub use id::*;
pub use map::*;
pub use segment::{InlineStorage, Segment, SegmentTag, MIN_CAPACITY};
pub use stable::StableArray;
pub use string::*;
pub use vector::*;
pub use vmem::VirtualMemory;
