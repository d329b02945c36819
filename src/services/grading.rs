use crate::db::types::Grade;

/// Lower bounds, checked top-down; the first band the percentage reaches wins.
const GRADE_BANDS: [(f64, Grade); 6] = [
    (90.0, Grade::APlus),
    (80.0, Grade::A),
    (70.0, Grade::BPlus),
    (60.0, Grade::B),
    (50.0, Grade::C),
    (40.0, Grade::D),
];

/// `marks_obtained / total_marks * 100`, rounded to two decimals.
pub(crate) fn percentage(marks_obtained: f64, total_marks: f64) -> f64 {
    round2(marks_obtained / total_marks * 100.0)
}

pub(crate) fn grade_for(percentage: f64) -> Grade {
    GRADE_BANDS
        .iter()
        .find(|(lower, _)| percentage >= *lower)
        .map(|(_, grade)| *grade)
        .unwrap_or(Grade::F)
}

/// Rounds half to even on the exact binary value, so `3.125` becomes `3.12`.
fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    // The product's rounding error, computed exactly.
    let error = value.mul_add(100.0, -scaled);
    let rounded = if scaled - scaled.floor() == 0.5 && error != 0.0 {
        if error > 0.0 {
            scaled.ceil()
        } else {
            scaled.floor()
        }
    } else {
        scaled.round_ties_even()
    };
    rounded / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges_are_inclusive() {
        assert_eq!(grade_for(100.0), Grade::APlus);
        assert_eq!(grade_for(90.0), Grade::APlus);
        assert_eq!(grade_for(89.99), Grade::A);
        assert_eq!(grade_for(80.0), Grade::A);
        assert_eq!(grade_for(70.0), Grade::BPlus);
        assert_eq!(grade_for(69.99), Grade::B);
        assert_eq!(grade_for(50.0), Grade::C);
        assert_eq!(grade_for(40.0), Grade::D);
        assert_eq!(grade_for(39.99), Grade::F);
        assert_eq!(grade_for(0.0), Grade::F);
    }

    #[test]
    fn grades_never_improve_as_percentage_drops() {
        let mut previous = Grade::APlus;
        for step in (0..=10_000).rev() {
            let grade = grade_for(step as f64 / 100.0);
            assert!(grade >= previous, "grade went up at {}", step as f64 / 100.0);
            previous = grade;
        }
    }

    #[test]
    fn percentage_rounds_to_two_places() {
        assert_eq!(percentage(85.0, 100.0), 85.0);
        assert_eq!(percentage(1.0, 3.0), 33.33);
        assert_eq!(percentage(2.0, 3.0), 66.67);
        assert_eq!(percentage(45.5, 50.0), 91.0);
        assert_eq!(percentage(0.0, 40.0), 0.0);
    }

    #[test]
    fn exact_ties_round_to_even() {
        assert_eq!(percentage(1.0, 32.0), 3.12);
        assert_eq!(percentage(2.5, 16.0), 15.62);
        assert_eq!(percentage(3.0, 32.0), 9.38);
        assert_eq!(percentage(1.0, 8.0), 12.5);
    }

    #[test]
    fn near_ties_follow_the_exact_value() {
        // 1.005 is stored just below the tie.
        assert_eq!(round2(1.005), 1.0);
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
    }
}
