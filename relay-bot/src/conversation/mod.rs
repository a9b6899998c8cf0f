//! The conversation state machine.
//!
//! ```text
//! (none) --/start--> AwaitingBackendChoice --"S3"|"Google Drive"--> AwaitingFile
//!                                                                    |  ^
//!                                                                    +--+ document / video / photo / other
//! any --/cancel--> Terminated (session removed)
//! ```

mod controller;
mod fetch;

pub use controller::{Controller, replies};
pub use fetch::{AttachmentFetcher, LocalFileFetcher};
