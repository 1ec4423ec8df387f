//! Command channel output
//!
//! The focuser accepts commands over several links at once. Inbound bytes are
//! pushed into the core by the board glue; replies go back out through this
//! trait.

/// Identifies the link a command arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ChannelId {
    /// Local USB/UART serial port
    Serial = 0,
    /// HTTP requests from the built-in web server
    Http = 1,
    /// Raw TCP socket
    Tcp = 2,
}

impl ChannelId {
    /// All channels, in broadcast order
    pub const ALL: [ChannelId; 3] = [ChannelId::Serial, ChannelId::Http, ChannelId::Tcp];

    /// Get the channel as an index (for per-channel tables)
    pub fn index(self) -> usize {
        self as usize
    }

    /// Create a channel from an index
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ChannelId::Serial),
            1 => Some(ChannelId::Http),
            2 => Some(ChannelId::Tcp),
            _ => None,
        }
    }
}

/// Outbound side of the command channels
///
/// `send` must not block the control loop; implementations queue or drop.
pub trait Transport {
    /// Whether the channel currently has a peer to talk to
    fn is_active(&self, channel: ChannelId) -> bool;

    /// Send one complete response on a channel
    fn send(&mut self, channel: ChannelId, text: &str);
}
