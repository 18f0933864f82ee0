pub mod frame;
pub mod messages;

pub use frame::{DecodedFrame, FrameDecoder, FIELD_SEPARATOR, GROUP_SEPARATOR};
pub use messages::{
    ControlMessage, ErrorNotice, InboundMessage, ServerMessage, WirePoint, OBSERVER_CLIENT,
};
