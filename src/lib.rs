pub mod client;
pub mod clock;
pub mod config;
pub mod data;
pub mod order;
pub mod strategy;

pub type Symbol = bytestring::ByteString;
/// Unix 时间戳的毫秒数
pub type Timestamp = i64;
