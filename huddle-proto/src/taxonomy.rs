//! Message-type taxonomy: the closed catalogue of routing tags.
//!
//! Each inbound `type` tag belongs to exactly one [`Category`], and each
//! category owns one listener slot in the dispatch registry. The mapping is
//! static configuration expressed as a compile-time `match`, not runtime
//! string comparisons scattered across call sites.

use std::fmt;

/// A disjoint group of routing tags sharing one listener slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Shared "gist" room events: room lifecycle, membership, room media.
    SharedRoom,
    /// Private one-to-one chat screen events.
    PrivateChat,
    /// Topic chat room events.
    ChatRoom,
    /// Direct-message thread events.
    DirectMessage,
    /// Join-request inbox events.
    JoinRequest,
}

/// Tags owned by [`Category::SharedRoom`].
pub const SHARED_ROOM_TAGS: &[&str] = &[
    "gistCreated",
    "gistCreationError",
    "gistMessageAck",
    "gistRefreshUpdate",
    "exitGist",
    "kText",
    "kImage",
    "kAudio",
    "kVideo",
    "membersList",
    "memberJoined",
    "memberLeft",
    "olderMessages",
    "previousMessages",
    "roleUpdate",
    "spectatorUpdate",
    "subscriberRoleUpdate",
    "contactOnline",
    "contactOffline",
    "onlineContacts",
];

/// Tags owned by [`Category::PrivateChat`].
pub const PRIVATE_CHAT_TAGS: &[&str] = &[
    "pText",
    "pImage",
    "pVideo",
    "pAudio",
    "pDelivery",
    "undeliveredMessages",
];

/// Tags owned by [`Category::ChatRoom`].
pub const CHAT_ROOM_TAGS: &[&str] = &[
    "chatRoomMessages",
    "cText",
    "cImage",
    "chatRoomAck",
    "chatRoomError",
];

/// Tags owned by [`Category::DirectMessage`].
pub const DIRECT_MESSAGE_TAGS: &[&str] = &[
    "dText",
    "dImage",
    "dGistCreation",
    "dmDelivery",
    "dmError",
    "previousDmMessages",
    "additionalDmMessages",
];

/// Tags owned by [`Category::JoinRequest`].
pub const JOIN_REQUEST_TAGS: &[&str] = &["joinRequests", "joinRequestDeclined"];

impl Category {
    /// Look up the category that owns a routing tag.
    ///
    /// Returns `None` for tags outside the catalogue — the registry treats
    /// those envelopes as a silent no-op.
    #[must_use]
    pub fn of(tag: &str) -> Option<Self> {
        match tag {
            "gistCreated" | "gistCreationError" | "gistMessageAck" | "gistRefreshUpdate"
            | "exitGist" | "kText" | "kImage" | "kAudio" | "kVideo" | "membersList"
            | "memberJoined" | "memberLeft" | "olderMessages" | "previousMessages"
            | "roleUpdate" | "spectatorUpdate" | "subscriberRoleUpdate" | "contactOnline"
            | "contactOffline" | "onlineContacts" => Some(Self::SharedRoom),

            "pText" | "pImage" | "pVideo" | "pAudio" | "pDelivery" | "undeliveredMessages" => {
                Some(Self::PrivateChat)
            }

            "chatRoomMessages" | "cText" | "cImage" | "chatRoomAck" | "chatRoomError" => {
                Some(Self::ChatRoom)
            }

            "dText" | "dImage" | "dGistCreation" | "dmDelivery" | "dmError"
            | "previousDmMessages" | "additionalDmMessages" => Some(Self::DirectMessage),

            "joinRequests" | "joinRequestDeclined" => Some(Self::JoinRequest),

            _ => None,
        }
    }

    /// All tags owned by this category.
    #[must_use]
    pub const fn tags(self) -> &'static [&'static str] {
        match self {
            Self::SharedRoom => SHARED_ROOM_TAGS,
            Self::PrivateChat => PRIVATE_CHAT_TAGS,
            Self::ChatRoom => CHAT_ROOM_TAGS,
            Self::DirectMessage => DIRECT_MESSAGE_TAGS,
            Self::JoinRequest => JOIN_REQUEST_TAGS,
        }
    }

    /// All categories, in a fixed order.
    pub const ALL: [Self; 5] = [
        Self::SharedRoom,
        Self::PrivateChat,
        Self::ChatRoom,
        Self::DirectMessage,
        Self::JoinRequest,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SharedRoom => "shared-room",
            Self::PrivateChat => "private-chat",
            Self::ChatRoom => "chat-room",
            Self::DirectMessage => "direct-message",
            Self::JoinRequest => "join-request",
        };
        write!(f, "{name}")
    }
}
