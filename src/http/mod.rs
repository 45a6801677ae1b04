//! HTTP/1.0 wire codec.
//!
//! One request and one response per connection, no chunked encoding,
//! `Content-Length` as the only body length signal.
//!
//! # Architecture
//!
//! - **`line_reader`**: buffered, growable scanner yielding LF / CRLF lines
//! - **`parser`**: request line, status line and header line parsing
//! - **`writer`**: buffered writer for request and status heads
//! - **`headers`**: ordered multi-value header list
//! - **`body`**: length-bounded and prefix-replaying body streams
//! - **`request`** / **`response`**: message types and builders
//! - **`connection`**: the per-connection server exchange
//!
//! # Wire format
//!
//! ```text
//! METHOD SP target SP HTTP/1.0 LF        HTTP/1.0 SP ddd SP reason LF
//! Name: v1, v2 LF                        Name: v1, v2 LF
//! LF                                     LF
//! body                                   body
//! ```
//!
//! Input accepts LF and CRLF line endings; output always uses LF.

pub mod body;
pub mod connection;
pub mod headers;
pub mod line_reader;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;

/// The only protocol token spoken on the wire.
pub const HTTP_10: &str = "HTTP/1.0";
