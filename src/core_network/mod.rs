pub mod control;
pub mod error;
pub mod pasv;
pub mod transport;
