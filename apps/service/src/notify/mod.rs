/// Notification module - turns events into delivered messages
///
/// - `event`: what the result processor emits
/// - `schedule`: per (check, notifier, axis) repeat bookkeeping
/// - `dispatcher`: renders templates and drives the backends
/// - `mail`, `chat`, `command`: the backends themselves
pub mod chat;
pub mod command;
pub mod dispatcher;
pub mod event;
pub mod mail;
pub mod notifier;
pub mod schedule;

pub use dispatcher::{Delivery, Dispatcher};
pub use event::{EventKind, NotificationEvent, Phase, Snapshot};
pub use notifier::{Message, Notifier, NotifierKind, NotifyError, build_notifier};
pub use schedule::RepeatState;
