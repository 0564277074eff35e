pub mod character;
pub mod server;
pub mod session;
