//! log-lines
//!
//! The line-parsing front end for log template mining: compiles `<Name>`
//! log-format specs into header-capturing patterns, rewrites parameter
//! shapes into masking sentinels, splits content on whitespace plus
//! configured delimiters, and streams files into a column-oriented
//! [`LogFrame`].

pub mod errors;
mod format;
mod frame;
mod masking;
mod reader;
mod tokenize;

pub use self::format::{LogFormat, CONTENT_FIELD};
pub use self::frame::LogFrame;
pub use self::masking::{is_sentinel, MaskRule, MaskSet, WrappedRegex, BUILTIN_MASKING, WILDCARD};
pub use self::reader::read_log;
pub use self::tokenize::Tokenizer;
