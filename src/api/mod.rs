//! Backend wire protocol: the response envelope, its decoder, and the HTTP
//! transport that feeds it.

pub mod client;
pub mod envelope;
pub mod error;

pub use client::*;
pub use envelope::*;
pub use error::*;
