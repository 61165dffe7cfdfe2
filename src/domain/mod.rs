//! Domain types and the ports the billing session is written against.

pub mod billing;
pub mod ports;
pub mod product;
pub mod purchase;
