pub mod admin;
pub mod agent;
pub mod chat;
pub mod code_assist;
pub mod health;
pub mod library;
pub mod memories;
pub mod metrics;
pub mod personas;
pub mod research;
pub mod verify;
pub mod voice;
