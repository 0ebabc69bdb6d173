pub mod entity;
pub mod port;
