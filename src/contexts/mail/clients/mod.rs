mod pop3;

pub(crate) use pop3::Pop3Session;
