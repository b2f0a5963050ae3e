//! Network Module
//!
//! Connection, request dispatch and link supervision.
//!
//! ## Architecture
//! - One dispatch loop thread per connection, sole reader and writer of
//!   the socket
//! - Callers interact through a cloneable [`QueryHandle`]
//! - Requests go out strictly one at a time, in submission order

mod connection;
mod dispatcher;
mod dump;
mod handle;
mod monitor;

pub use connection::{CloseCallback, Connection, Greeting};
pub use dispatcher::{Callback, Dispatcher, PendingRequest, Reply};
pub use dump::{Direction, NetDump};
pub use handle::QueryHandle;
pub use monitor::{LinkAction, LinkMonitor};
