use std::borrow::Cow;

/// Rejections raised while building domain values from untrusted input.
#[vanish_derive::vanish_error]
pub enum DomainError {
    #[error("Invalid expire value{}: {message}", format_context(.context))]
    InvalidExpire { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid API context{}: {message}", format_context(.context))]
    InvalidContext { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Invalid timestamp{}: {message}", format_context(.context))]
    InvalidTimestamp { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
