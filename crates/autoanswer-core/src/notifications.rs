//! Operator-facing notifications.
//!
//! The gate registers one template at startup and shows it whenever a probe
//! fails, with the failure interpolated into `{{error}}`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Id of the template this crate registers.
pub const INPUT_DEVICE_ERROR: &str = "inputDeviceError";

/// Id of the host's own "no input device" notification, raised by the voice
/// client when a call cannot open the microphone.
pub const HOST_NO_INPUT_DEVICE: &str = "NoInputDevice";

pub const INPUT_DEVICE_ERROR_STRING: &str =
    "There is a problem with your microphone. Please resolve before changing to Available. [{{error}}]";

pub type NotificationParams = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSeverity {
    Information,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub id: String,
    /// Body with `{{name}}` placeholders.
    pub content: String,
    pub severity: NotificationSeverity,
    /// Auto-dismiss after this many ms; 0 keeps it until closed.
    pub timeout_ms: u64,
    pub close_button: bool,
}

impl NotificationTemplate {
    pub fn is_persistent(&self) -> bool {
        self.timeout_ms == 0
    }

    pub fn render(&self, params: &NotificationParams) -> String {
        render(&self.content, params)
    }
}

/// Persistent, dismissable error shown while the microphone is broken.
pub fn input_device_error_template() -> NotificationTemplate {
    NotificationTemplate {
        id: INPUT_DEVICE_ERROR.to_string(),
        content: INPUT_DEVICE_ERROR_STRING.to_string(),
        severity: NotificationSeverity::Error,
        timeout_ms: 0,
        close_button: true,
    }
}

pub fn error_params(error: &impl std::fmt::Display) -> NotificationParams {
    let mut params = NotificationParams::new();
    params.insert("error".to_string(), error.to_string());
    params
}

/// Replace `{{key}}` with the matching parameter. Unknown placeholders are left as-is.
pub fn render(template: &str, params: &NotificationParams) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match params.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_error_placeholder() {
        let t = input_device_error_template();
        let text = t.render(&error_params(&"No microphone found"));
        assert_eq!(
            text,
            "There is a problem with your microphone. Please resolve before changing to Available. [No microphone found]"
        );
        assert!(t.is_persistent());
        assert!(t.close_button);
    }

    #[test]
    fn leaves_unknown_and_unterminated_placeholders() {
        let params = error_params(&"x");
        assert_eq!(render("{{ error }} {{other}}", &params), "x {{other}}");
        assert_eq!(render("tail {{error", &params), "tail {{error");
    }
}
