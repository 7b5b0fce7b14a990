//! Property tests for the relative-error guarantee and wire round-tripping.

use pp_sketch::{DDSketch, DDSketchConfig, SketchTuning};
use proptest::prelude::*;

fn cfg(gamma: f64) -> DDSketchConfig {
    DDSketchConfig {
        relative_accuracy: gamma,
        v_min: 1e-3,
        v_max: 1e9,
        tuning: SketchTuning::default(),
    }
}

proptest! {
    #[test]
    fn value_at_one_recovers_the_max_within_gamma(
        values in prop::collection::vec(1.0f64..1_000_000.0, 1..500)
    ) {
        let gamma = 0.01;
        let mut s = DDSketch::new(cfg(gamma)).unwrap();
        for v in &values {
            s.add(*v, 1).unwrap();
        }
        let true_max = values.iter().cloned().fold(f64::MIN, f64::max);
        let reported = s.value_at(1.0).unwrap();
        let rel_err = (reported - true_max).abs() / true_max;
        prop_assert!(rel_err <= gamma + 1e-6, "rel_err={} reported={} true_max={}", rel_err, reported, true_max);
    }

    #[test]
    fn merge_total_count_equals_sum_of_parts(
        a in prop::collection::vec(1.0f64..10_000.0, 0..200),
        b in prop::collection::vec(1.0f64..10_000.0, 0..200),
    ) {
        let mut sa = DDSketch::new(cfg(0.02)).unwrap();
        let mut sb = DDSketch::new(cfg(0.02)).unwrap();
        for v in &a { sa.add(*v, 1).unwrap(); }
        for v in &b { sb.add(*v, 1).unwrap(); }
        sa.merge(&sb).unwrap();
        prop_assert_eq!(sa.count(), (a.len() + b.len()) as u64);
    }

    #[test]
    fn wire_round_trip_is_lossless_for_any_gamma(
        gamma in 0.001f64..0.2,
        values in prop::collection::vec(1.0f64..1_000_000.0, 0..300),
    ) {
        let mut s = DDSketch::new(cfg(gamma)).unwrap();
        for v in &values {
            s.add(*v, 1).unwrap();
        }
        let bytes = s.to_bytes();
        let back = DDSketch::from_bytes(&bytes).unwrap();
        prop_assert!(s.wire_equivalent(&back));
    }
}
