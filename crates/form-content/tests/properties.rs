use proptest::prelude::*;
use serde_json::{Value, json};

use form_content::{
    ContentDocument, Translation, apply_translation_list_change, decode_custom_columns,
    encode_custom_columns, namespace_media_columns, restore_media_columns,
};

const LANGUAGES: [&str; 5] = ["English", "French", "Spanish", "Swahili", "Arabic"];

/// Document with `count` translations and a few rows of labels and hints.
fn translated_document(count: usize, rows: usize) -> ContentDocument {
    let translations = LANGUAGES[..count].to_vec();
    let survey = (0..rows)
        .map(|row| {
            let labels = translations
                .iter()
                .map(|language| format!("{language} label {row}"))
                .collect::<Vec<_>>();
            let mut value = json!({"type": "text", "name": format!("q{row}"), "label": labels});
            if row % 2 == 0 {
                let hints = translations
                    .iter()
                    .map(|language| format!("{language} hint {row}"))
                    .collect::<Vec<_>>();
                value["hint"] = json!(hints);
            }
            value
        })
        .collect::<Vec<_>>();
    let choice_labels = translations
        .iter()
        .map(|language| format!("yes-{language}"))
        .collect::<Vec<_>>();
    ContentDocument::normalize(json!({
        "survey": survey,
        "choices": [{"list_name": "yn", "name": "yes", "label": choice_labels}],
        "translations": translations,
        "translated": ["label", "hint"]
    }))
    .expect("normalize")
}

fn flag_value() -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        Just(Some(json!(true))),
        Just(Some(json!(false))),
        Just(Some(json!(null))),
        Just(Some(json!(1))),
        "[a-z+_]{0,12}".prop_map(|text| Some(json!(text))),
        "[a-z]{0,4}".prop_map(|text| Some(json!(format!("{text}+custom_col_append_string")))),
    ]
}

proptest! {
    #[test]
    fn custom_column_codec_is_identity(
        required in flag_value(),
        readonly in flag_value(),
        media in proptest::option::of("[a-z]{1,6}\\.png"),
        audio in proptest::option::of(proptest::collection::vec("[a-z]{1,6}\\.mp3", 2)),
        reserved in proptest::sample::subsequence(
            vec!["oc_readonly", "oc_oc_readonly", "oc_image", "oc_imagery", "oc_oc_image", "oc_audio"],
            0..=6,
        ),
        choice_media in proptest::option::of("[a-z]{1,6}\\.jpg"),
    ) {
        let mut row = json!({"type": "text", "name": "q"});
        if let Some(value) = required {
            row["required"] = value;
        }
        if let Some(value) = readonly {
            row["readonly"] = value;
        }
        if let Some(file) = media {
            row["image"] = json!(file);
        }
        if let Some(files) = audio {
            row["audio"] = json!(files);
        }
        for (index, column) in reserved.into_iter().enumerate() {
            row[column] = json!(format!("authored {index}"));
        }
        let mut choice = json!({"list_name": "yn", "name": "yes"});
        if let Some(file) = choice_media {
            choice["image"] = json!(file);
            choice["audio"] = json!(["yes.mp3", "oui.mp3"]);
        }
        let original = ContentDocument::normalize(json!({
            "survey": [row],
            "choices": [choice],
            "translations": ["English", "French"],
            "translated": ["audio"]
        }))
        .expect("normalize");
        let mut document = original.clone();
        encode_custom_columns(&mut document);
        namespace_media_columns(&mut document);
        restore_media_columns(&mut document);
        decode_custom_columns(&mut document);
        prop_assert_eq!(&document.translated, &original.translated);
        prop_assert_eq!(document.to_value(), original.to_value());
    }

    #[test]
    fn every_transition_keeps_arrays_aligned(
        count in 1usize..=4,
        rows in 0usize..5,
        permutation in Just((0..4usize).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let mut document = translated_document(count, rows);
        let target = permutation
            .into_iter()
            .filter(|index| *index < count)
            .map(|index| document.translations[index].clone())
            .collect::<Vec<_>>();
        apply_translation_list_change(&mut document, &target).expect("reorder");
        prop_assert!(document.check_alignment().is_ok());

        let mut added = vec![Translation::named("Zulu")];
        added.extend(document.translations.iter().cloned());
        apply_translation_list_change(&mut document, &added).expect("add");
        prop_assert!(document.check_alignment().is_ok());

        let mut deleted = document.translations.clone();
        deleted.pop();
        apply_translation_list_change(&mut document, &deleted).expect("delete");
        prop_assert!(document.check_alignment().is_ok());
    }

    #[test]
    fn reorder_round_trip_is_identity(count in 1usize..=5, rows in 0usize..4, rotate in 0usize..5) {
        let original = translated_document(count, rows);
        let mut document = original.clone();
        let mut rotated = original.translations.clone();
        rotated.rotate_left(rotate % count);
        apply_translation_list_change(&mut document, &rotated).expect("rotate");
        apply_translation_list_change(&mut document, &original.translations).expect("restore");
        prop_assert_eq!(document, original);
    }

    #[test]
    fn add_then_delete_restores_document(count in 1usize..=4, rows in 0usize..4) {
        let original = translated_document(count, rows);
        let mut document = original.clone();
        let added = Translation::named("Zulu");

        let mut with_new = vec![added.clone()];
        with_new.extend(original.translations.iter().cloned());
        apply_translation_list_change(&mut document, &with_new).expect("add");

        // Additions are prepended and only the last translation can go, so
        // the new one is moved to the end before it is deleted.
        let mut new_last = original.translations.clone();
        new_last.push(added);
        apply_translation_list_change(&mut document, &new_last).expect("move to end");
        apply_translation_list_change(&mut document, &original.translations).expect("delete");
        prop_assert_eq!(document, original);
    }
}

#[test]
fn add_then_delete_on_empty_list_is_identity() {
    let original = ContentDocument::normalize(json!({
        "survey": [{"type": "text", "label": []}],
        "translations": [],
        "translated": ["label"]
    }))
    .expect("normalize");
    let mut document = original.clone();
    apply_translation_list_change(&mut document, &[Translation::named("English")]).expect("add");
    assert_eq!(document.survey[0].get("label").map(|cell| cell.to_value()), Some(json!([""])));
    apply_translation_list_change(&mut document, &[]).expect("delete");
    assert_eq!(document, original);
}
