//! Notification types and values

use crate::protocol::Properties;

/// Wire identifier of text message notifications
pub const TEXT_MESSAGE_NAME: &str = "notifytextmessage";

/// Target of a text message (`targetmode` on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextKind {
    Private = 1,
    Channel = 2,
    Server = 3,
}

impl TextKind {
    pub fn from_target_mode(mode: u8) -> Option<Self> {
        match mode {
            1 => Some(TextKind::Private),
            2 => Some(TextKind::Channel),
            3 => Some(TextKind::Server),
            _ => None,
        }
    }

    pub fn target_mode(self) -> u8 {
        self as u8
    }
}

/// A category of asynchronous event the server can push
///
/// `mod_bit` is the subscription bit tracked per connection. Types with a
/// bit of 0 are subscribed per channel and always delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationType {
    ClientEnter,
    ClientLeave,
    ClientMoved,
    ServerEdited,
    ChannelCreated,
    ChannelEdited,
    ChannelDeleted,
    ChannelMoved,
    ChannelDescriptionChanged,
    TextPrivate,
    TextChannel,
    TextServer,
    TokenUsed,
}

impl NotificationType {
    pub const ALL: [NotificationType; 13] = [
        NotificationType::ClientEnter,
        NotificationType::ClientLeave,
        NotificationType::ClientMoved,
        NotificationType::ServerEdited,
        NotificationType::ChannelCreated,
        NotificationType::ChannelEdited,
        NotificationType::ChannelDeleted,
        NotificationType::ChannelMoved,
        NotificationType::ChannelDescriptionChanged,
        NotificationType::TextPrivate,
        NotificationType::TextChannel,
        NotificationType::TextServer,
        NotificationType::TokenUsed,
    ];

    /// Name used in `servernotifyregister event=<name>`
    pub fn query_id(self) -> &'static str {
        use NotificationType::*;
        match self {
            ClientEnter | ClientLeave | ServerEdited => "server",
            ClientMoved | ChannelCreated | ChannelEdited | ChannelDeleted | ChannelMoved
            | ChannelDescriptionChanged => "channel",
            TextPrivate => "textprivate",
            TextChannel => "textchannel",
            TextServer => "textserver",
            TokenUsed => "tokenused",
        }
    }

    /// Subscription bit; 0 = always delivered
    pub fn mod_bit(self) -> u32 {
        use NotificationType::*;
        match self {
            ClientEnter | ClientLeave | ServerEdited => 1,
            ClientMoved | ChannelCreated | ChannelEdited | ChannelDeleted | ChannelMoved
            | ChannelDescriptionChanged => 0,
            TextServer => 2,
            TextChannel => 4,
            TextPrivate => 8,
            TokenUsed => 16,
        }
    }

    /// Identifier the server tags the notification line with
    pub fn wire_name(self) -> &'static str {
        use NotificationType::*;
        match self {
            ClientEnter => "notifycliententerview",
            ClientLeave => "notifyclientleftview",
            ClientMoved => "notifyclientmoved",
            ServerEdited => "notifyserveredited",
            ChannelCreated => "notifychannelcreated",
            ChannelEdited => "notifychanneledited",
            ChannelDeleted => "notifychanneldeleted",
            ChannelMoved => "notifychannelmoved",
            ChannelDescriptionChanged => "notifychanneldescriptionchanged",
            TextPrivate | TextChannel | TextServer => TEXT_MESSAGE_NAME,
            TokenUsed => "notifytokenused",
        }
    }

    pub fn text_kind(self) -> Option<TextKind> {
        match self {
            NotificationType::TextPrivate => Some(TextKind::Private),
            NotificationType::TextChannel => Some(TextKind::Channel),
            NotificationType::TextServer => Some(TextKind::Server),
            _ => None,
        }
    }

    pub fn from_text_kind(kind: TextKind) -> Self {
        match kind {
            TextKind::Private => NotificationType::TextPrivate,
            TextKind::Channel => NotificationType::TextChannel,
            TextKind::Server => NotificationType::TextServer,
        }
    }

    pub fn is_text(self) -> bool {
        self.text_kind().is_some()
    }

    /// Resolve a notification line to its type
    ///
    /// Text messages are told apart by the `targetmode` of their first object.
    pub fn resolve(name: &str, objects: &[Properties]) -> Option<Self> {
        if name == TEXT_MESSAGE_NAME {
            return objects
                .first()
                .and_then(|o| o.get_parsed::<u8>("targetmode"))
                .and_then(TextKind::from_target_mode)
                .map(Self::from_text_kind);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|t| !t.is_text() && t.wire_name() == name)
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.wire_name())
    }
}

/// An accepted notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    kind: NotificationType,
    objects: Vec<Properties>,
}

impl Notification {
    pub fn new(kind: NotificationType, objects: Vec<Properties>) -> Self {
        Self { kind, objects }
    }

    pub fn kind(&self) -> NotificationType {
        self.kind
    }

    pub fn objects(&self) -> &[Properties] {
        &self.objects
    }

    pub fn first(&self) -> Option<&Properties> {
        self.objects.first()
    }

    /// View of a text message notification
    pub fn text_message(&self) -> Option<TextMessage<'_>> {
        let kind = self.kind.text_kind()?;
        let props = self.objects.first()?;
        Some(TextMessage { kind, props })
    }
}

/// Borrowed view of a `notifytextmessage` payload
#[derive(Debug, Clone, Copy)]
pub struct TextMessage<'a> {
    kind: TextKind,
    props: &'a Properties,
}

impl<'a> TextMessage<'a> {
    pub fn kind(&self) -> TextKind {
        self.kind
    }

    pub fn message(&self) -> &'a str {
        self.props.get("msg").unwrap_or_default()
    }

    pub fn invoker_id(&self) -> Option<u32> {
        self.props.get_parsed("invokerid")
    }

    pub fn invoker_name(&self) -> Option<&'a str> {
        self.props.get("invokername")
    }

    pub fn invoker_uid(&self) -> Option<&'a str> {
        self.props.get("invokeruid")
    }

    /// Target client id, present on private messages
    pub fn target(&self) -> Option<u32> {
        self.props.get_parsed("target")
    }
}
