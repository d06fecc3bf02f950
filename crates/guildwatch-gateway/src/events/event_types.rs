//! Dispatch event names
//!
//! The dispatch names this client knows by type, each mapped to the intent
//! that makes the gateway send it. Anything not listed is still forwarded
//! with its raw name.

use crate::protocol::Intents;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Known dispatch events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayEventType {
    Ready,
    Resumed,
    GuildCreate,
    GuildUpdate,
    GuildDelete,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    GuildMemberAdd,
    GuildMemberUpdate,
    GuildMemberRemove,
    GuildMembersChunk,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    VoiceStateUpdate,
    PresenceUpdate,
}

impl GatewayEventType {
    const ALL: [Self; 17] = [
        Self::Ready,
        Self::Resumed,
        Self::GuildCreate,
        Self::GuildUpdate,
        Self::GuildDelete,
        Self::ChannelCreate,
        Self::ChannelUpdate,
        Self::ChannelDelete,
        Self::GuildMemberAdd,
        Self::GuildMemberUpdate,
        Self::GuildMemberRemove,
        Self::GuildMembersChunk,
        Self::MessageCreate,
        Self::MessageUpdate,
        Self::MessageDelete,
        Self::VoiceStateUpdate,
        Self::PresenceUpdate,
    ];

    /// Wire name as sent in `t`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildUpdate => "GUILD_UPDATE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::ChannelCreate => "CHANNEL_CREATE",
            Self::ChannelUpdate => "CHANNEL_UPDATE",
            Self::ChannelDelete => "CHANNEL_DELETE",
            Self::GuildMemberAdd => "GUILD_MEMBER_ADD",
            Self::GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
            Self::GuildMemberRemove => "GUILD_MEMBER_REMOVE",
            Self::GuildMembersChunk => "GUILD_MEMBERS_CHUNK",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::MessageUpdate => "MESSAGE_UPDATE",
            Self::MessageDelete => "MESSAGE_DELETE",
            Self::VoiceStateUpdate => "VOICE_STATE_UPDATE",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
        }
    }

    /// Look up a wire name; exact, case-sensitive match
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == s)
    }

    /// Intent the gateway requires before it sends this event
    ///
    /// Session events need none. `GUILD_MEMBERS_CHUNK` arrives for any
    /// explicit member request and also needs none.
    #[must_use]
    pub const fn required_intent(self) -> Intents {
        match self {
            Self::Ready | Self::Resumed | Self::GuildMembersChunk => Intents::empty(),
            Self::GuildCreate
            | Self::GuildUpdate
            | Self::GuildDelete
            | Self::ChannelCreate
            | Self::ChannelUpdate
            | Self::ChannelDelete => Intents::GUILDS,
            Self::GuildMemberAdd | Self::GuildMemberUpdate | Self::GuildMemberRemove => {
                Intents::GUILD_MEMBERS
            }
            Self::MessageCreate | Self::MessageUpdate | Self::MessageDelete => {
                Intents::GUILD_MESSAGES.union(Intents::DIRECT_MESSAGES)
            }
            Self::VoiceStateUpdate => Intents::GUILD_VOICE_STATES,
            Self::PresenceUpdate => Intents::GUILD_PRESENCES,
        }
    }

    /// Whether a session identified with `intents` can receive this event
    #[must_use]
    pub const fn is_enabled_by(self, intents: Intents) -> bool {
        let required = self.required_intent();
        required.is_empty() || intents.intersects(required)
    }
}

impl fmt::Display for GatewayEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
