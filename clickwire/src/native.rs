//! Native protocol implementation: packet ids and revision gating, block and
//! column codecs, and the value model rows decode into.
pub mod block;
pub mod block_info;
pub mod protocol;
pub mod types;
pub mod values;
