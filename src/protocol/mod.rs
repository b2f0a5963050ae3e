//! Protocol Module
//!
//! Defines the ServerQuery wire protocol.
//!
//! ## Format
//!
//! Line oriented text; every line ends with LF, CR bytes are ignored.
//!
//! ```text
//! use 1\n                                   request, options only
//! clientkick clid=5|clid=6 reasonid=5\n     request with two chains
//! error id=0 msg=ok\n                       response terminator
//! notifytextmessage targetmode=2 msg=hi\n   notification
//! ```
//!
//! ### Chains
//! Objects (and bulk request targets) are separated by `|`; within an
//! object, `key=value` tokens are separated by spaces.
//!
//! ### Escaping
//! Keys and values are escaped, see [`escape`].

pub mod escape;
mod properties;
mod request;
mod message;
mod codec;
mod classifier;

pub use properties::Properties;
pub use request::{Request, RequestBuilder};
pub use message::{ErrorDescriptor, QueryMessage};
pub use codec::{
    decode_line, decode_objects, decode_request, encode_request, Line, CHAIN_SEPARATOR,
    ERROR_TOKEN, LINE_TERMINATOR, NOTIFY_PREFIX,
};
pub use classifier::{Disposition, MessageClassifier};
