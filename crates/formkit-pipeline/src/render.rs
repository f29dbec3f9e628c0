//! Render contract
//!
//! A host view renders a [`FormView`]: one bound control per field in
//! configuration order, the first violation of each field as inline text,
//! and a submit control that is disabled while a submission is in flight.

use crate::preview::PreviewHandle;
use formkit_schema::{FieldKind, FormConfiguration, SelectOption, ValidationErrors};
use serde::Serialize;

/// Rows shown by multi-line text controls
pub const TEXT_AREA_ROWS: u8 = 4;

/// Accept filter used when a file field allows any image
pub const DEFAULT_ACCEPT: &str = "image/*";

/// Input control bound to one field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Control {
    /// One-line text input
    TextInput { placeholder: Option<String> },
    /// Multi-line text area
    TextArea { placeholder: Option<String>, rows: u8 },
    /// File picker with previews of the current selection
    FilePicker {
        accept: String,
        multiple: bool,
        previews: Vec<PreviewHandle>,
    },
    /// Drop-down; the first option is the empty "no selection" entry
    Select {
        placeholder: Option<String>,
        options: Vec<SelectOption>,
    },
}

/// One field as rendered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlView {
    /// Field name, used as the control id
    pub name: String,
    /// Label text
    pub label: String,
    /// Whether the field is required
    pub required: bool,
    /// Bound control
    pub control: Control,
    /// Inline error text
    pub error: Option<String>,
    /// Styled as invalid; set exactly when `error` is
    pub invalid: bool,
}

/// Submit action state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitControl {
    /// Disabled while a submission is in flight
    pub disabled: bool,
    /// Button text
    pub label: &'static str,
}

/// Whole form as rendered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormView {
    /// Controls in configuration order
    pub controls: Vec<ControlView>,
    /// Submit action
    pub submit: SubmitControl,
}

impl FormView {
    /// Control of a field
    #[must_use]
    pub fn control(&self, name: &str) -> Option<&ControlView> {
        self.controls.iter().find(|c| c.name == name)
    }
}

/// Build the view of a form
pub fn render<P>(
    config: &FormConfiguration,
    errors: Option<&ValidationErrors>,
    previews: P,
    submitting: bool,
) -> FormView
where
    P: Fn(&str) -> Vec<PreviewHandle>,
{
    let controls = config
        .fields()
        .iter()
        .map(|field| {
            let placeholder = field.placeholder_text().map(str::to_owned);
            let control = match field.kind() {
                FieldKind::SingleLine(_) => Control::TextInput { placeholder },
                FieldKind::MultiLine(_) => Control::TextArea {
                    placeholder,
                    rows: TEXT_AREA_ROWS,
                },
                FieldKind::ImageSet(c) => Control::FilePicker {
                    accept: if c.accepted_mime_types.is_empty() {
                        DEFAULT_ACCEPT.to_owned()
                    } else {
                        c.accepted_mime_types
                            .iter()
                            .map(String::as_str)
                            .collect::<Vec<_>>()
                            .join(",")
                    },
                    multiple: c.max_count != Some(1),
                    previews: previews(field.name()),
                },
                FieldKind::Select(c) => {
                    let mut options = Vec::with_capacity(c.options.len() + 1);
                    options.push(SelectOption::new("", placeholder.clone().unwrap_or_default()));
                    options.extend(c.options.iter().cloned());
                    Control::Select { placeholder, options }
                }
            };

            let error = errors
                .and_then(|e| e.message(field.name()))
                .map(str::to_owned);

            ControlView {
                name: field.name().to_owned(),
                label: field.label().to_owned(),
                required: field.is_required(),
                control,
                invalid: error.is_some(),
                error,
            }
        })
        .collect();

    FormView {
        controls,
        submit: SubmitControl {
            disabled: submitting,
            label: if submitting { "Submitting..." } else { "Submit" },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formkit_schema::{FieldDescriptor, FormInput};
    use pretty_assertions::assert_eq;

    fn config() -> FormConfiguration {
        FormConfiguration::builder()
            .field(FieldDescriptor::text("title", "Title").required().min_length(3).placeholder("Title"))
            .field(FieldDescriptor::multi_line("body", "Body"))
            .field(FieldDescriptor::image_set("photos", "Photos").accept(["image/jpeg", "image/png"]))
            .field(FieldDescriptor::image_set("avatar", "Avatar").max_count(1))
            .field(
                FieldDescriptor::select("topic", "Topic", [SelectOption::new("tech", "Tech")])
                    .placeholder("Pick one"),
            )
            .blob_storage_path("uploads")
            .build()
            .unwrap()
    }

    #[test]
    fn renders_controls_in_order() {
        let view = render(&config(), None, |_| Vec::new(), false);

        let names: Vec<_> = view.controls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["title", "body", "photos", "avatar", "topic"]);
        assert_eq!(
            view.control("body").unwrap().control,
            Control::TextArea { placeholder: None, rows: 4 }
        );
        assert_eq!(
            view.control("photos").unwrap().control,
            Control::FilePicker {
                accept: "image/jpeg,image/png".into(),
                multiple: true,
                previews: vec![],
            }
        );
        assert_eq!(
            view.control("avatar").unwrap().control,
            Control::FilePicker {
                accept: "image/*".into(),
                multiple: false,
                previews: vec![],
            }
        );
        assert_eq!(view.submit, SubmitControl { disabled: false, label: "Submit" });
    }

    #[test]
    fn select_leads_with_placeholder_option() {
        let view = render(&config(), None, |_| Vec::new(), false);
        match &view.control("topic").unwrap().control {
            Control::Select { placeholder, options } => {
                assert_eq!(placeholder.as_deref(), Some("Pick one"));
                assert_eq!(options[0], SelectOption::new("", "Pick one"));
                assert_eq!(options[1].value, "tech");
            }
            other => panic!("expected select, got {other:?}"),
        }
    }

    #[test]
    fn shows_first_error_and_disables_submit() {
        let config = config();
        let errors = config
            .schema()
            .validate(&FormInput::new().with("title", "Hi"))
            .unwrap_err();

        let view = render(&config, Some(&errors), |_| Vec::new(), true);
        let title = view.control("title").unwrap();
        assert!(title.invalid);
        assert_eq!(title.error.as_deref(), Some("Title must be at least 3 characters"));
        assert!(!view.control("body").unwrap().invalid);
        assert_eq!(view.submit, SubmitControl { disabled: true, label: "Submitting..." });
    }

    #[test]
    fn file_pickers_show_current_previews() {
        let view = render(
            &config(),
            None,
            |name| {
                if name == "photos" {
                    vec![PreviewHandle::new("blob:1")]
                } else {
                    Vec::new()
                }
            },
            false,
        );
        match &view.control("photos").unwrap().control {
            Control::FilePicker { previews, .. } => assert_eq!(previews, &[PreviewHandle::new("blob:1")]),
            other => panic!("expected file picker, got {other:?}"),
        }
    }

    #[test]
    fn serializes_with_type_tag() {
        let view = render(&config(), None, |_| Vec::new(), false);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["controls"][0]["control"]["type"], "text_input");
        assert_eq!(json["submit"]["label"], "Submit");
    }
}
