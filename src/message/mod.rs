pub mod memory_store;
pub mod message_dto;
pub mod message_handlers;
pub mod message_models;
pub mod message_repository;
pub mod message_service;
pub mod message_store;

pub use memory_store::InMemoryMessageStore;
pub use message_dto::{
    ConversationQuery, MessageCursor, MessageQuery, Page, SendMessageRequest,
    StartConversationRequest, UnreadCountResponse,
};
pub use message_handlers::{
    get_messages, list_conversations, mark_message_read, send_message, start_conversation,
    unread_count,
};
pub use message_models::{
    Conversation, ConversationDetails, ConversationSummary, LastMessage, Message,
    MessageResponse, ParticipantProfile, ProductSnippet, ThreadResponse,
};
pub use message_repository::MessageRepository;
pub use message_service::MessageService;
pub use message_store::MessageStore;
