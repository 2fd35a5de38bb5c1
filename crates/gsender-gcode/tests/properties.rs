use gsender_gcode::{GcodeBlock, Modal, ModalTracker};
use proptest::prelude::*;

fn word() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(vec![
            "G0", "G1", "G2", "G3", "G17", "G18", "G19", "G20", "G21", "G54", "G55", "G90", "G91",
            "G93", "G94", "G38.2", "G38.5", "G40", "G41", "G43.1", "G49", "M0", "M2", "M3",
            "M4", "M5", "M7", "M8", "M9", "M30",
        ])
        .prop_map(str::to_string),
        (prop::sample::select(vec!['X', 'Y', 'Z', 'F', 'S', 'T']), -500.0f64..500.0)
            .prop_map(|(letter, value)| format!("{}{:.3}", letter, value)),
    ]
}

fn line() -> impl Strategy<Value = String> {
    prop::collection::vec(word(), 0..6).prop_map(|words| words.join(" "))
}

proptest! {
    #[test]
    fn parsing_is_deterministic(line in line()) {
        let first = GcodeBlock::parse(&line);
        let second = GcodeBlock::parse(&line);
        prop_assert_eq!(first.pairs(), second.pairs());
        prop_assert_eq!(first.flat_pairs(), second.flat_pairs());
    }

    #[test]
    fn blocks_without_modal_words_do_not_change_state(
        lines in prop::collection::vec(line(), 1..10),
        filler in prop::collection::vec(
            (prop::sample::select(vec!['X', 'Y', 'Z', 'F', 'S']), -100.0f64..100.0)
                .prop_map(|(l, v)| format!("{}{:.2}", l, v)),
            0..5,
        ),
    ) {
        let mut tracker = ModalTracker::new();
        for line in &lines {
            tracker.apply(&GcodeBlock::parse(line));
        }
        let before: Modal = tracker.snapshot();
        tracker.apply(&GcodeBlock::parse(&filler.join(" ")));
        prop_assert_eq!(before, tracker.snapshot());
    }

    #[test]
    fn each_field_comes_from_its_last_setter(lines in prop::collection::vec(line(), 1..10)) {
        let mut tracker = ModalTracker::new();
        let mut expected = Modal::default();
        for line in &lines {
            let block = GcodeBlock::parse(line);
            tracker.apply(&block);

            // What this block sets on its own, merged field by field
            let mut alone = ModalTracker::new();
            alone.apply(&block);
            let set = alone.snapshot();
            expected.motion = set.motion.or(expected.motion);
            expected.wcs = set.wcs.or(expected.wcs);
            expected.plane = set.plane.or(expected.plane);
            expected.units = set.units.or(expected.units);
            expected.distance = set.distance.or(expected.distance);
            expected.feedrate = set.feedrate.or(expected.feedrate);
            expected.cutter = set.cutter.or(expected.cutter);
            expected.tlo = set.tlo.or(expected.tlo);
            expected.program = set.program.or(expected.program);
            expected.spindle = set.spindle.or(expected.spindle);
            expected.coolant = set.coolant.or(expected.coolant);
            expected.tool = set.tool.or(expected.tool);
        }
        prop_assert_eq!(expected, tracker.snapshot());
    }
}
