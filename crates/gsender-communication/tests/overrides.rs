use gsender_communication::{encode_override, OverrideKind, RealtimeCommand};
use gsender_core::StepOrderSetting;
use proptest::prelude::*;

fn count(commands: &[RealtimeCommand], wanted: RealtimeCommand) -> usize {
    commands.iter().filter(|c| **c == wanted).count()
}

#[test]
fn test_feed_plus_23() {
    let commands = encode_override(23, OverrideKind::Feed, StepOrderSetting::CoarseFirst);
    let bytes: Vec<u8> = commands.iter().map(|c| c.byte()).collect();
    assert_eq!(bytes, vec![0x91, 0x91, 0x93, 0x93, 0x93]);

    let commands = encode_override(23, OverrideKind::Feed, StepOrderSetting::FineFirst);
    let bytes: Vec<u8> = commands.iter().map(|c| c.byte()).collect();
    assert_eq!(bytes, vec![0x93, 0x93, 0x93, 0x91, 0x91]);
}

#[test]
fn test_spindle_reset() {
    let commands = encode_override(0, OverrideKind::Spindle, StepOrderSetting::default());
    assert_eq!(commands.iter().map(|c| c.byte()).collect::<Vec<_>>(), vec![0x99]);
}

fn kind() -> impl Strategy<Value = OverrideKind> {
    prop_oneof![Just(OverrideKind::Feed), Just(OverrideKind::Spindle)]
}

fn order() -> impl Strategy<Value = StepOrderSetting> {
    prop_oneof![
        Just(StepOrderSetting::FineFirst),
        Just(StepOrderSetting::CoarseFirst)
    ]
}

proptest! {
    #[test]
    fn step_counts_match_decomposition(delta in -100i32..=100, kind in kind(), order in order()) {
        let commands = encode_override(delta, kind, order);
        if delta == 0 {
            let reset = match kind {
                OverrideKind::Feed => RealtimeCommand::FeedOverrideReset,
                OverrideKind::Spindle => RealtimeCommand::SpindleOverrideReset,
            };
            prop_assert_eq!(commands, vec![reset]);
        } else {
            let magnitude = delta.unsigned_abs() as usize;
            let (coarse, fine) = match (kind, delta > 0) {
                (OverrideKind::Feed, true) => (RealtimeCommand::FeedOverridePlusTen, RealtimeCommand::FeedOverridePlusOne),
                (OverrideKind::Feed, false) => (RealtimeCommand::FeedOverrideMinusTen, RealtimeCommand::FeedOverrideMinusOne),
                (OverrideKind::Spindle, true) => (RealtimeCommand::SpindleOverridePlusTen, RealtimeCommand::SpindleOverridePlusOne),
                (OverrideKind::Spindle, false) => (RealtimeCommand::SpindleOverrideMinusTen, RealtimeCommand::SpindleOverrideMinusOne),
            };
            prop_assert_eq!(count(&commands, coarse), magnitude / 10);
            prop_assert_eq!(count(&commands, fine), magnitude % 10);
            prop_assert_eq!(commands.len(), magnitude / 10 + magnitude % 10);
        }
    }

    #[test]
    fn fine_first_puts_every_fine_step_before_coarse(delta in 1i32..=100) {
        let commands = encode_override(delta, OverrideKind::Feed, StepOrderSetting::FineFirst);
        let first_coarse = commands
            .iter()
            .position(|c| *c == RealtimeCommand::FeedOverridePlusTen)
            .unwrap_or(commands.len());
        prop_assert!(commands[first_coarse..]
            .iter()
            .all(|c| *c == RealtimeCommand::FeedOverridePlusTen));
    }
}
