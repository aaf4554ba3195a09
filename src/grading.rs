use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::models::{ComponentMap, MarksAggregate};

/// Map a total score to a grade point on the fixed 0-10 scale.
///
/// Totals outside [0, 100] are not clamped; they fall through the same
/// thresholds.
pub fn grade_point(total_marks: f64) -> i32 {
    if total_marks >= 91.0 {
        10
    } else if total_marks >= 81.0 {
        9
    } else if total_marks >= 71.0 {
        8
    } else if total_marks >= 61.0 {
        7
    } else if total_marks >= 51.0 {
        6
    } else if total_marks >= 41.0 {
        5
    } else if total_marks >= 35.0 {
        4
    } else {
        0
    }
}

/// A component contributes its numeric value; anything non-numeric
/// contributes zero.
pub fn component_score(value: &Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

/// Aggregate one student's raw marks for one course. An absent marks row is
/// "ungraded": zero total, no grade point, never an error.
pub fn aggregate_marks(marks: Option<&ComponentMap>) -> MarksAggregate {
    match marks {
        None => MarksAggregate {
            total_marks: 0.0,
            grade_point: None,
        },
        Some(map) => {
            let total: f64 = map.values().map(component_score).sum();
            MarksAggregate {
                total_marks: total,
                grade_point: Some(grade_point(total)),
            }
        }
    }
}

/// Weightage is optional at course definition time; when present it must be
/// an object of numeric weights summing to exactly 100. No tolerance band.
pub fn validate_weightage(weightage: Option<&Value>) -> EngineResult<()> {
    let Some(value) = weightage else {
        return Ok(());
    };
    let Some(map) = value.as_object() else {
        return Err(EngineError::validation("weightage must sum to 100"));
    };

    let mut sum = 0.0;
    for weight in map.values() {
        match weight.as_f64() {
            Some(w) => sum += w,
            None => return Err(EngineError::validation("weightage must sum to 100")),
        }
    }

    if sum != 100.0 {
        return Err(EngineError::validation("weightage must sum to 100"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component_map(value: Value) -> ComponentMap {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn grade_points_follow_threshold_table() {
        assert_eq!(grade_point(91.0), 10);
        assert_eq!(grade_point(90.0), 9);
        assert_eq!(grade_point(81.0), 9);
        assert_eq!(grade_point(71.0), 8);
        assert_eq!(grade_point(61.0), 7);
        assert_eq!(grade_point(51.0), 6);
        assert_eq!(grade_point(41.0), 5);
        assert_eq!(grade_point(35.0), 4);
        assert_eq!(grade_point(34.0), 0);
        assert_eq!(grade_point(0.0), 0);
    }

    #[test]
    fn out_of_range_totals_pass_through_unclamped() {
        assert_eq!(grade_point(130.0), 10);
        assert_eq!(grade_point(-5.0), 0);
    }

    #[test]
    fn aggregates_marks_map_through_scale() {
        let marks = component_map(json!({"mid": 40, "final": 45}));
        let aggregate = aggregate_marks(Some(&marks));
        assert_eq!(aggregate.total_marks, 85.0);
        assert_eq!(aggregate.grade_point, Some(9));
    }

    #[test]
    fn absent_marks_row_yields_nulls() {
        let aggregate = aggregate_marks(None);
        assert_eq!(aggregate.total_marks, 0.0);
        assert_eq!(aggregate.grade_point, None);
    }

    #[test]
    fn empty_marks_map_grades_as_zero() {
        let marks = component_map(json!({}));
        let aggregate = aggregate_marks(Some(&marks));
        assert_eq!(aggregate.total_marks, 0.0);
        assert_eq!(aggregate.grade_point, Some(0));
    }

    #[test]
    fn non_numeric_components_count_as_zero() {
        let marks = component_map(json!({"mid": 40, "final": "absent"}));
        let aggregate = aggregate_marks(Some(&marks));
        assert_eq!(aggregate.total_marks, 40.0);
        assert_eq!(aggregate.grade_point, Some(4));
    }

    #[test]
    fn accepts_weightage_summing_to_hundred() {
        let weightage = json!({"internal": 30, "mid_term": 20, "end_term": 50});
        assert!(validate_weightage(Some(&weightage)).is_ok());
        assert!(validate_weightage(None).is_ok());
    }

    #[test]
    fn accepts_fractional_weights_summing_to_hundred() {
        let weightage = json!({"a": 62.5, "b": 37.5});
        assert!(validate_weightage(Some(&weightage)).is_ok());
    }

    #[test]
    fn rejects_weightage_not_summing_to_hundred() {
        let weightage = json!({"a": 60, "b": 30});
        let err = validate_weightage(Some(&weightage)).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(err.to_string(), "validation failed: weightage must sum to 100");
    }

    #[test]
    fn rejects_malformed_weightage() {
        let not_an_object = json!([60, 40]);
        assert!(validate_weightage(Some(&not_an_object)).is_err());

        let non_numeric_weight = json!({"a": 60, "b": "forty"});
        assert!(validate_weightage(Some(&non_numeric_weight)).is_err());
    }
}
