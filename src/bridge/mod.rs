//! Duplex bridge between the native scheduling layer and the application layer.
//!
//! Two independent request/response channels, never a shared object:
//! [`inbound`] carries app→native scheduling controls (plus host harness
//! events), [`outbound`] carries native→app calls with late binding and a
//! bounded wait. [`stdio`] puts both on one line-delimited JSON stream.

pub mod contract;
pub mod inbound;
pub mod outbound;
pub mod stdio;

pub use contract::{ChannelName, MethodCall, MethodName, MethodResponse};
pub use inbound::{HostEvent, HostEvents, SchedulingControls};
pub use outbound::{AppBinding, AppCaller, AppEndpoint, AppLayer, app_channel};
