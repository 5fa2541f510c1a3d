//! CardDAV contact source and CalDAV event sink.
//!
//! Both are built on libdav over a hyper client with basic auth (falling back
//! to digest) and redirect following. Every request is bounded by [`client::REQUEST_TIMEOUT`].

pub mod auth;
pub mod caldav;
pub mod carddav;
pub mod client;
pub mod discovery;
pub mod requests;

pub use caldav::CalDavSink;
pub use carddav::CardDavSource;
