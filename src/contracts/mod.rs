//! Contract bindings and ABI handling.
//!
//! # Data Flow
//! ```text
//! [[contracts]] catalog (alias, address env, ABI signatures)
//!     → registry.rs (one binding per alias with an address)
//!     → abi.rs (method/event resolution, encode, decode)
//!     → transactions/ and events/ (writes, subscriptions)
//! ```

pub mod abi;
pub mod registry;

pub use abi::{format_args, parse_abi, sol_value_to_json, ContractHandle};
pub use registry::{ContractBinding, ContractRegistry};
