pub mod dispatcher;

pub use dispatcher::{ConnectionState, Dispatch, Relay, RelayContext};
