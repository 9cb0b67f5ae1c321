// kestrel-parser - Scanner and tokens for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # kestrel-parser
//!
//! Lexer for the Kestrel programming language.
//! Produces a flat stream of `Token`s that the bytecode compiler in
//! `kestrel-vm` consumes with a Pratt parser.

pub mod lexer;
pub mod token;

pub use lexer::{Lexer, tokenize};
pub use token::{Token, TokenKind, unescape};
