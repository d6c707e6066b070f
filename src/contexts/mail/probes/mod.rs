mod pop3s;

pub use pop3s::{Pop3sTest, DEFAULT_PORT};
