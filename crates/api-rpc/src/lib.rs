//! JSON-RPC API Layer
//!
//! Control surface for the Gantry agent: inspect the queue, edit priorities,
//! retry failed jobs.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
