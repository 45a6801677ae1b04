//! httpipe - HTTP/1.0 over named pipes
//!
//! Lets two local processes exchange HTTP/1.0 requests and responses over a
//! named pipe, one exchange per connection.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod once;
pub mod server;
pub mod transport;

pub use client::{Client, ClientResponse};
pub use config::Config;
pub use error::{Error, Result};
pub use http::request::{Method, Request};
pub use http::response::{Response, StatusCode};
pub use server::{Handler, IncomingRequest, Server};
pub use transport::{PipeDialer, PipeListener};
