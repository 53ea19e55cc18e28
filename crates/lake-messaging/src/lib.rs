//! Change notification for Lake.
//!
//! Every successful write produces one [`ChangeEvent`] per affected
//! resource. A [`Messenger`] renders each event with the formatter of every
//! active route and hands the payload to that route's [`MessageHandler`].
//! Handlers are looked up by name in an explicit [`HandlerRegistry`] built
//! at startup.
//!
//! Delivery is best-effort: a failed send is logged and never fails the
//! write that produced the event.

pub mod error;
pub mod event;
pub mod formatter;
pub mod handler;
pub mod messenger;

pub use error::{MessagingError, MessagingResult};
pub use event::{ChangeEvent, ChangeKind};
pub use formatter::EventFormatter;
pub use handler::{FileHandler, HandlerRegistry, LogHandler, MemoryHandler, MessageHandler};
pub use messenger::{EventSink, Messenger, RouteConfig};
