//! vl3-core — shared types, configuration and address helpers.
//! All other vl3mesh crates depend on this one.

pub mod config;
pub mod connection;
pub mod ipam;
pub mod prefixes;
pub mod registry;

pub use connection::{
    Connection, ConnectionContext, IpContext, NetworkServiceRequest, Route, LABEL_NSE_SOURCE,
};
pub use registry::{FindNetworkServiceRequest, FindNetworkServiceResponse, NetworkServiceEndpoint};
