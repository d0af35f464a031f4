//! Data-fetch memoization layer.
//!
//! The cache records (query, variables) → result pairs and remembers
//! which keys were populated, so a render can report its data
//! dependencies as preload hints. It never performs network I/O itself;
//! population happens through [`client::DataClient`] or whatever invokes
//! the remote fetch.

mod cache;
mod client;

pub use cache::{DataFetchCache, FetchKey};
pub use client::{DataClient, Transport};
