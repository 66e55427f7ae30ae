pub(crate) mod forms;
pub(crate) mod health;
pub(crate) mod uploads;

use vanish_derive::api_model;

/// Query string of the list endpoints.
#[api_model]
#[derive(Default)]
pub(crate) struct ListQuery {
    /// Substring of the contexts to include. Empty lists every context.
    #[serde(default)]
    pub(crate) apicontext: Option<String>,
    /// Substring of description or file name.
    #[serde(default)]
    pub(crate) query: Option<String>,
}
