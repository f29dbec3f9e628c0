//! Property tests for the generated field rules.
//!
//! Each test pins one rule family against arbitrary inputs:
//! - text length bounds are inclusive and reported as too short / too long
//! - image count bounds reject exactly the sets that exceed them
//! - MIME filtering rejects foreign types whatever the size or count
//! - select values outside the option domain never pass

use formkit_schema::{
    FieldDescriptor, FieldValue, FileHandle, FormConfiguration, FormInput, FormSchema, SelectOption,
    ViolationKind,
};
use proptest::prelude::*;

fn single_field(field: FieldDescriptor) -> FormSchema {
    FormConfiguration::builder()
        .field(field)
        .blob_storage_path("uploads")
        .build()
        .expect("valid configuration")
        .schema()
}

fn file(mime: &str, size: usize) -> FileHandle {
    FileHandle::new("upload.bin", mime, vec![0u8; size])
}

proptest! {
    /// Required text with bounds 3..=5: short and long inputs fail with the
    /// matching class, everything in range passes.
    #[test]
    fn text_length_bounds_are_inclusive(text in "[a-z]{0,10}") {
        let schema = single_field(
            FieldDescriptor::text("title", "Title").required().min_length(3).max_length(5),
        );
        let result = schema.validate(&FormInput::new().with("title", text.clone()));

        match text.len() {
            0..=2 => {
                let errors = result.unwrap_err();
                prop_assert!(errors.has("title", ViolationKind::TooShort));
                prop_assert!(!errors.has("title", ViolationKind::TooLong));
            }
            3..=5 => prop_assert!(result.is_ok()),
            _ => {
                let errors = result.unwrap_err();
                prop_assert!(errors.has("title", ViolationKind::TooLong));
                prop_assert_eq!(
                    errors.message("title"),
                    Some("Title must be at most 5 characters")
                );
            }
        }
    }

    /// Surrounding whitespace never counts towards the length.
    #[test]
    fn text_padding_is_ignored(text in "[a-z]{3,5}", pad in 0usize..4) {
        let schema = single_field(
            FieldDescriptor::text("title", "Title").required().min_length(3).max_length(5),
        );
        let padded = format!("{}{text}{}", " ".repeat(pad), " ".repeat(pad));
        prop_assert!(schema.validate(&FormInput::new().with("title", padded)).is_ok());
    }

    /// max_count = 3 rejects four or more files with a count violation only.
    #[test]
    fn image_count_bound(count in 0usize..8) {
        let schema = single_field(FieldDescriptor::image_set("photos", "Photos").max_count(3));
        let files: Vec<_> = (0..count).map(|_| file("image/jpeg", 16)).collect();
        let result = schema.validate(&FormInput::new().with("photos", files));

        if count <= 3 {
            prop_assert!(result.is_ok());
        } else {
            let errors = result.unwrap_err();
            prop_assert_eq!(errors.get("photos").len(), 1);
            prop_assert!(errors.has("photos", ViolationKind::TooManyFiles));
        }
    }

    /// A GIF is rejected by a jpeg/png field regardless of size and count.
    #[test]
    fn foreign_mime_type_always_fails(size in 0usize..4096, others in 0usize..3) {
        let schema = single_field(
            FieldDescriptor::image_set("photos", "Photos").accept(["image/jpeg", "image/png"]),
        );
        let mut files: Vec<_> = (0..others).map(|_| file("image/png", 8)).collect();
        files.push(file("image/gif", size));

        let errors = schema
            .validate(&FormInput::new().with("photos", files))
            .unwrap_err();
        prop_assert!(errors.has("photos", ViolationKind::UnsupportedType));
        prop_assert_eq!(
            errors.message("photos"),
            Some("Photos must be of type: image/jpeg, image/png")
        );
    }

    /// Required select: only configured values pass.
    #[test]
    fn select_domain_is_closed(value in "[a-z]{0,8}") {
        let schema = single_field(
            FieldDescriptor::select(
                "category",
                "Category",
                [SelectOption::new("tech", "Tech"), SelectOption::new("health", "Health")],
            )
            .required(),
        );
        let result = schema.validate(&FormInput::new().with("category", value.clone()));
        let in_domain = value == "tech" || value == "health";
        prop_assert_eq!(result.is_ok(), in_domain);
    }
}

#[test]
fn select_examples() {
    let schema = single_field(
        FieldDescriptor::select(
            "category",
            "Category",
            [SelectOption::new("tech", "Tech"), SelectOption::new("health", "Health")],
        )
        .required(),
    );

    assert!(schema.validate(&FormInput::new().with("category", "")).is_err());
    assert!(schema.validate(&FormInput::new().with("category", "tech")).is_ok());
    assert!(schema.validate(&FormInput::new().with("category", "sports")).is_err());
}

#[test]
fn first_error_is_deterministic() {
    let schema = single_field(
        FieldDescriptor::image_set("photos", "Photos")
            .max_count(1)
            .accept(["image/png"]),
    );
    let input = FormInput::new().with(
        "photos",
        FieldValue::Files(vec![file("image/gif", 1), file("image/gif", 1)]),
    );

    let first = schema.validate(&input).unwrap_err();
    for _ in 0..10 {
        let again = schema.validate(&input).unwrap_err();
        assert_eq!(again.first("photos"), first.first("photos"));
    }
    assert_eq!(first.first("photos").unwrap().kind, ViolationKind::TooManyFiles);
}
