use serde::{Deserialize, Serialize};
use shakmaty::Color;

/// A single game normalized out of a remote source.
///
/// Both adapters produce this shape regardless of how the upstream API
/// delivers games; everything downstream (aggregation, tactic scanning)
/// only ever sees `SourceGame`s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceGame {
    /// Move tokens in played order (SAN as recorded by the source).
    pub moves: Vec<String>,
    pub white: Option<String>,
    pub black: Option<String>,
    /// Remaining clock per ply in centiseconds, when the source provides it.
    pub clocks_centis: Option<Vec<u32>>,
}

impl SourceGame {
    /// Which side the identifier played, matched case-insensitively.
    /// Returns `None` when the identifier is not a participant.
    pub fn color_of(&self, identifier: &str) -> Option<Color> {
        let is = |name: &Option<String>| {
            name.as_deref()
                .map_or(false, |n| n.eq_ignore_ascii_case(identifier))
        };
        if is(&self.white) {
            Some(Color::White)
        } else if is(&self.black) {
            Some(Color::Black)
        } else {
            None
        }
    }

    /// Remaining time in whole seconds at a given ply, if clocks were recorded.
    pub fn time_remaining_secs(&self, ply: usize) -> Option<u32> {
        self.clocks_centis
            .as_ref()
            .and_then(|clocks| clocks.get(ply))
            .map(|centis| centis / 100)
    }
}
