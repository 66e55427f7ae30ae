use vanish_derive::api_model;

#[api_model(deny_unknown_fields = false)]
pub struct Envelope {
    pub success: bool,
    pub error_code: u16,
    #[serde(default)]
    pub message: Option<String>,
}

fn main() {
    let _ = format!("{:?}", Envelope { success: true, error_code: 200, message: None });
}
