//! Protocol Tests
//!
//! Escaping, request/line codec and message classification.
