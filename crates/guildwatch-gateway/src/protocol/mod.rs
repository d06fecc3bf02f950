//! Gateway protocol definitions
//!
//! Op codes, close codes, the `{op, d, s, t}` envelope and the typed payloads
//! exchanged with the gateway.

mod close_codes;
mod frames;
mod intents;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{is_fatal, CloseCode, ABNORMAL_CLOSURE, NORMAL_CLOSURE, NO_STATUS_RECEIVED};
pub use frames::{DispatchEvent, GatewayFrame, READY, RESUMED};
pub use intents::Intents;
pub use messages::GatewayPayload;
pub use opcodes::OpCode;
pub use payloads::{
    HelloPayload, IdentifyPayload, IdentifyProperties, PresenceUpdatePayload, ReadyPayload,
    RequestGuildMembersPayload, ResumePayload,
};
