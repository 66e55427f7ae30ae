use std::borrow::Cow;

#[vanish_derive::vanish_error]
pub enum MailError {
    #[error("Invalid mail address{}: {source}", format_context(.context))]
    Address { source: lettre::address::AddressError, context: Option<Cow<'static, str>> },

    #[error("Building mail failed{}: {source}", format_context(.context))]
    Message { source: lettre::error::Error, context: Option<Cow<'static, str>> },

    #[error("SMTP delivery failed{}: {source}", format_context(.context))]
    Transport { source: lettre::transport::smtp::Error, context: Option<Cow<'static, str>> },
}
