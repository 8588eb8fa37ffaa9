pub mod ack;
pub mod events;
pub mod fanout;
pub mod handler;
pub mod history;
pub mod pipeline;
pub mod rooms;
pub mod server;
pub mod session;
