//! Disease class label interpretation
//!
//! Class labels are compound identifiers of the form `<crop>___<condition>`;
//! datasets are inconsistent about separator width, so `__` and `_` also
//! occur. Pure string handling: no I/O, no model access.

use crate::models::Diagnosis;

/// Parse a raw class label into a structured diagnosis.
///
/// The widest separator present wins, so `Pepper__bell___Bacterial_spot`
/// splits on `___` into crop `Pepper bell` and condition `Bacterial spot`.
/// Underscores remaining inside either segment read as spaces. A label that
/// does not yield two non-empty segments maps to the `Unknown` fallback with
/// the raw label as the condition.
pub fn parse_class_label(label: &str) -> Diagnosis {
    for separator in ["___", "__", "_"] {
        if let Some((crop, condition)) = label.split_once(separator) {
            let crop = crop.replace('_', " ").trim().to_string();
            let condition = condition.replace('_', " ").trim().to_string();
            if crop.is_empty() || condition.is_empty() {
                continue;
            }

            let is_healthy = condition.to_lowercase().contains("healthy");
            return Diagnosis {
                crop,
                condition: if is_healthy {
                    "Healthy".to_string()
                } else {
                    condition
                },
                is_healthy,
            };
        }
    }

    Diagnosis {
        crop: "Unknown".to_string(),
        condition: label.to_string(),
        is_healthy: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triple_underscore_separator() {
        let d = parse_class_label("Tomato___Late_blight");
        assert_eq!(d.crop, "Tomato");
        assert_eq!(d.condition, "Late blight");
        assert!(!d.is_healthy);
    }

    #[test]
    fn test_double_underscore_separator() {
        let d = parse_class_label("Tomato__Leaf_Mold");
        assert_eq!(d.crop, "Tomato");
        assert_eq!(d.condition, "Leaf Mold");
    }

    #[test]
    fn test_single_underscore_separator() {
        let d = parse_class_label("Potato_blight");
        assert_eq!(d.crop, "Potato");
        assert_eq!(d.condition, "blight");
    }

    #[test]
    fn test_widest_separator_wins() {
        let d = parse_class_label("Pepper__bell___Bacterial_spot");
        assert_eq!(d.crop, "Pepper bell");
        assert_eq!(d.condition, "Bacterial spot");
    }

    #[test]
    fn test_healthy_condition_normalized() {
        let d = parse_class_label("Tomato___healthy");
        assert_eq!(d.crop, "Tomato");
        assert_eq!(d.condition, "Healthy");
        assert!(d.is_healthy);
    }

    #[test]
    fn test_healthy_detection_is_case_insensitive() {
        let d = parse_class_label("Pepper__bell___HEALTHY");
        assert!(d.is_healthy);
        assert_eq!(d.condition, "Healthy");
    }

    #[test]
    fn test_no_separator_falls_back_to_unknown() {
        let d = parse_class_label("XYZ");
        assert_eq!(d.crop, "Unknown");
        assert_eq!(d.condition, "XYZ");
        assert!(!d.is_healthy);
    }

    #[test]
    fn test_empty_segment_falls_back_to_unknown() {
        let d = parse_class_label("_blight");
        assert_eq!(d.crop, "Unknown");
        assert_eq!(d.condition, "_blight");

        let d = parse_class_label("Tomato___");
        assert_eq!(d.crop, "Unknown");
        assert_eq!(d.condition, "Tomato___");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = parse_class_label("Tomato___Early_blight");
        let second = parse_class_label("Tomato___Early_blight");
        assert_eq!(first, second);
    }
}
