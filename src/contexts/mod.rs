#[cfg(feature = "mail")]
pub mod mail;
