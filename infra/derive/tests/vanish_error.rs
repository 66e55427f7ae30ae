use std::borrow::Cow;
use std::io;

use vanish_derive::{api_model, vanish_error};

#[vanish_error]
pub enum SampleError {
    #[error("IO failure{}: {source}", format_context(.context))]
    Io { source: io::Error, context: Option<Cow<'static, str>> },

    #[error("Validation failed{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal fault{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn failing_io() -> Result<()> {
    Err::<(), _>(io::Error::new(io::ErrorKind::NotFound, "gone")).context("Opening artifact")?;
    Ok(())
}

#[test]
fn source_errors_convert_with_context() {
    let err = failing_io().unwrap_err();
    assert!(matches!(err, SampleError::Io { .. }));
    assert_eq!(err.context_note(), Some("Opening artifact"));
    assert_eq!(err.to_string(), "IO failure (Opening artifact): gone");
}

#[test]
fn question_mark_converts_without_context() {
    fn inner() -> Result<()> {
        Err::<(), _>(io::Error::other("disk"))?;
        Ok(())
    }
    let err = inner().unwrap_err();
    assert_eq!(err.context_note(), None);
    assert_eq!(err.to_string(), "IO failure: disk");
}

#[test]
fn own_results_accept_context() {
    let res: Result<()> =
        Err(SampleError::Validation { message: "bad expire".into(), context: None });
    let err = res.context("Parsing request").unwrap_err();
    assert_eq!(err.to_string(), "Validation failed (Parsing request): bad expire");
}

#[test]
fn strings_become_internal_errors() {
    let from_static: SampleError = "boom".into();
    let from_owned: SampleError = String::from("bang").into();
    assert!(matches!(from_static, SampleError::Internal { .. }));
    assert_eq!(from_owned.to_string(), "Internal fault: bang");
}

#[api_model]
pub struct ListQuery {
    pub api_context: String,
    pub query: Option<String>,
}

#[test]
fn api_model_applies_camel_case_and_strict_fields() {
    let parsed: ListQuery =
        serde_json::from_str(r#"{"apiContext":"team","query":null}"#).unwrap();
    assert_eq!(parsed.api_context, "team");

    let unknown = serde_json::from_str::<ListQuery>(r#"{"apiContext":"t","extra":1}"#);
    assert!(unknown.is_err());
}
