pub mod admin;
pub mod character;
pub mod chat;
pub mod comment;
pub mod user;
