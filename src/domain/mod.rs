pub mod filter;
pub mod notification;
