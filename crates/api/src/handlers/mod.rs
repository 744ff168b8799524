pub mod health;
pub mod lobbies;
pub mod rooms;
pub mod users;
pub mod websocket;
