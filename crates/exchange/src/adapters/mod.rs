//! Built-in demand-source adapters.
//!
//! Most adapters live out of tree with their owners; the exchange ships only
//! the generic OpenRTB adapter, which covers any source that speaks plain
//! OpenRTB 2.x and needs nothing beyond an endpoint.

pub mod openrtb;

pub use openrtb::{OpenRtbAdapter, OpenRtbAdapterConfig};
