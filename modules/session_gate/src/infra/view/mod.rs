pub mod state;

pub use state::{Message, MessageKind, ViewSnapshot, ViewState};
