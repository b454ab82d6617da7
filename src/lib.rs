//! Parsing of protobuf schema files into merged descriptor trees, for use by protocol dissectors.
//!
//! Schema files are registered with a [`DescriptorPool`], queued for parsing, and then processed
//! one at a time by [`DescriptorPool::run`]. Each file is parsed into a tree of [`ProtoNode`]s rooted
//! at a [`NodeKind::Package`] node, which is merged into the single tree the pool keeps for that
//! package. Imports found while parsing are queued in turn.
//!
//! The resulting trees keep only what a wire-format decoder needs: the message/enum/service
//! topology, field numbers, types and labels, enum values, map key and value types, oneof
//! grouping and RPC method signatures. Options other than field options, reserved ranges and
//! extension ranges are recognized but not retained.
//!
//! # Examples
//!
//! ```
//! use protoschema::{DescriptorPool, ErrorRecord, NodeKind};
//!
//! let mut pool = DescriptorPool::new();
//! pool.add_source("a.proto", "package p; import 'b.proto'; message A { int32 x = 1; }");
//! pool.add_source("b.proto", "package p; message B { repeated string y = 1; }");
//! pool.enqueue("a.proto");
//!
//! let mut errors: Vec<ErrorRecord> = Vec::new();
//! pool.run(&mut errors).unwrap();
//! assert!(errors.is_empty());
//!
//! let package = pool.package("p").unwrap();
//! assert_eq!(package.children().len(), 2);
//!
//! let b = pool.lookup_message(".p.B").unwrap();
//! assert_eq!(b.kind(), NodeKind::Message);
//! assert_eq!(b.find_child_by_number(1).unwrap().type_ref(), Some("string"));
//! ```
//!
//! ### Error messages
//!
//! Every failure is reported once to the [`ErrorSink`] passed to [`DescriptorPool::run`], and also
//! returned as an [`Error`]. Errors implement [`miette::Diagnostic`], so parse errors render with
//! the offending source line when printed through a `miette` report handler.
#![warn(missing_debug_implementations, missing_docs)]
#![deny(unsafe_code)]

pub mod file;

mod case;
mod error;
mod lines;
mod node;
mod parse;
mod pool;
mod sink;

pub use self::error::Error;
pub use self::file::{FileDescriptor, FileState, Syntax};
pub use self::node::{Label, NodeBuilder, NodeFlags, NodeKind, ProtoNode};
pub use self::parse::{parse, ParseError, ParsedFile};
pub use self::pool::DescriptorPool;
pub use self::sink::{ErrorRecord, ErrorSink, StderrSink};

/// The largest field number that can be encoded in a wire-format tag.
pub const MAX_MESSAGE_FIELD_NUMBER: i32 = 536_870_911;

/// The default limit on how deeply messages and groups may be nested.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

const MAX_FILE_LEN: u64 = i32::MAX as u64;

fn index_to_u32(index: usize) -> u32 {
    // Files longer than i32::MAX bytes are rejected before scanning, so line numbers always fit.
    index.try_into().unwrap_or(u32::MAX)
}
