//! Gateway client configuration

use crate::protocol::{IdentifyProperties, Intents};
use guildwatch_common::DiscordConfig;

/// Gateway URL used when none is configured
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Query string every gateway URL must carry
pub const GATEWAY_QUERY: &str = "v=10&encoding=json";

/// Reconnects allowed after the initial connection before giving up
pub const DEFAULT_MAX_RECONNECTS: u32 = 5;

/// Settings for one gateway client
#[derive(Clone)]
pub struct GatewayConfig {
    /// Bot token sent with IDENTIFY and RESUME
    pub token: String,
    pub intents: Intents,
    pub max_reconnects: u32,
    pub gateway_url: String,
    pub properties: IdentifyProperties,
}

impl GatewayConfig {
    /// Configuration with defaults for everything but the token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            intents: Intents::default(),
            max_reconnects: DEFAULT_MAX_RECONNECTS,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            properties: IdentifyProperties::default(),
        }
    }

    #[must_use]
    pub fn with_intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    #[must_use]
    pub fn with_max_reconnects(mut self, max_reconnects: u32) -> Self {
        self.max_reconnects = max_reconnects;
        self
    }

    #[must_use]
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: IdentifyProperties) -> Self {
        self.properties = properties;
        self
    }
}

/// Connect URL for a `resume_gateway_url` from READY
///
/// Discord hands out resume URLs without a query string; the version and
/// encoding parameters are appended in that case.
#[must_use]
pub fn resume_connect_url(resume_url: &str) -> String {
    if resume_url.contains('?') {
        resume_url.to_string()
    } else {
        format!("{}/?{GATEWAY_QUERY}", resume_url.trim_end_matches('/'))
    }
}

impl From<&DiscordConfig> for GatewayConfig {
    fn from(discord: &DiscordConfig) -> Self {
        let mut config = Self::new(discord.token.clone());
        if let Some(url) = &discord.gateway_url {
            config.gateway_url.clone_from(url);
        }
        if let Some(bits) = discord.intents {
            config.intents = Intents::from_bits_retain(u64::from(bits));
        }
        if let Some(max) = discord.max_reconnects {
            config.max_reconnects = max;
        }
        config
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token", &"<redacted>")
            .field("intents", &self.intents.bits())
            .field("max_reconnects", &self.max_reconnects)
            .field("gateway_url", &self.gateway_url)
            .field("properties", &self.properties)
            .finish()
    }
}
