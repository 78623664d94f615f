//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the flow engine:
//! frame identity, channel/sensor identifiers, control vocabulary, payload
//! types, timing reports, configuration and errors.
//! Business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Frames are numbered by `FrameId`, restarted at 0 on arm
//! - A ring of depth P bounds the frames in flight; slot = `frame % P`

mod control;
mod engine_config;
mod error;
mod frame;
mod ident;
mod payload;
mod timing;

pub use control::*;
pub use engine_config::*;
pub use error::*;
pub use frame::*;
pub use ident::*;
pub use payload::*;
pub use timing::*;
