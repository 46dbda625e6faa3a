use serde::Serialize;

/// One input field of the asset entry form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<&'static [&'static str]>,
}

const ASSET_TYPES: &[&str] = &["equipment", "vehicle", "property", "other"];

const fn field(name: &'static str, kind: &'static str, required: bool) -> FormField {
    FormField {
        name,
        kind,
        required,
        options: None,
    }
}

/// Static descriptor of the asset entry form.
pub fn asset_form_fields() -> Vec<FormField> {
    vec![
        field("name", "text", true),
        field("description", "textarea", false),
        FormField {
            options: Some(ASSET_TYPES),
            ..field("type", "select", true)
        },
        field("value", "number", true),
        field("residualValue", "number", false),
        field("purchaseDate", "date", false),
        field("location", "text", false),
        field("serialNumber", "text", false),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_field_lists_selectable_options() {
        let fields = asset_form_fields();
        let ty = fields.iter().find(|f| f.name == "type").unwrap();
        assert_eq!(ty.options.unwrap().len(), 4);
        assert!(fields.iter().filter(|f| f.required).count() >= 3);
    }
}
