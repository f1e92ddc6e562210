mod health;
mod ip;

pub use health::health_check;
pub use ip::{IpResponse, json_ip, plain_ip};
