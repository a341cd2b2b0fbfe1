//! Standard Green-GO variable catalog
//!
//! Keys follow the canonical form produced by the address parser, so
//! `/ggo/state/channel/talk [v, 3]` lands on `state_talk_ch3`.

use super::store::{VariableDefinition, SENTINEL_LEVEL, SENTINEL_UNKNOWN};
use crate::osc::is_high_frequency;

/// Key of the connectivity variable driven by the liveness monitor
pub const HEARTBEAT_KEY: &str = "state_heartbeat";

/// Per-channel variables: (key stem, display label)
const CHANNEL_VARIABLES: &[(&str, &str)] = &[
    ("talk", "Talk"),
    ("call", "Call"),
    ("cue", "Cue"),
    ("listen", "Listen"),
    ("listen_mode", "Listen Mode"),
    ("output", "Output"),
    ("level", "Level"),
    ("input_vox", "Input Vox"),
    ("input_call", "Input Call"),
];

/// Device-wide variables: (key, display label)
const GLOBAL_VARIABLES: &[(&str, &str)] = &[
    ("state_audio_gain", "Audio Gain"),
    ("state_audio_source", "Audio Source"),
    ("state_mode_isolate", "Mode Isolate"),
    ("state_level_main", "Level Main"),
    ("state_level_pgm", "Level Program"),
    ("state_level_direct", "Level Direct"),
    (HEARTBEAT_KEY, "Heartbeat"),
];

/// Level and gain variables start at the level sentinel
fn initial_value(key: &str) -> i32 {
    if is_high_frequency(key) {
        SENTINEL_LEVEL
    } else {
        SENTINEL_UNKNOWN
    }
}

/// Every variable a device with `channels` channels can report
pub fn standard_definitions(channels: u8) -> Vec<VariableDefinition> {
    let mut definitions = Vec::new();

    for (stem, label) in CHANNEL_VARIABLES {
        for ch in 1..=channels {
            let key = format!("state_{}_ch{}", stem, ch);
            let initial = initial_value(&key);
            definitions.push(VariableDefinition::new(
                key,
                format!("CH{}: {}", ch, label),
                initial,
            ));
        }
    }

    for (key, label) in GLOBAL_VARIABLES {
        definitions.push(VariableDefinition::new(*key, *label, initial_value(key)));
    }

    definitions
}
