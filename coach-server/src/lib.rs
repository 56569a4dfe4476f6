pub mod http;
pub mod subsystems;
