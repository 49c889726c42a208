pub mod character;
pub mod chat_message;
pub mod comment;
pub mod user;
