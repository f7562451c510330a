//! Gesture recognizer labels → reaction emoji.

/// Emoji for a recognized hand gesture, `None` for anything else
/// (including the recognizer's own "None" label).
pub fn emoji_for(label: &str) -> Option<&'static str> {
    match label {
        "Thumb_Up" => Some("\u{1F44D}"),
        "Thumb_Down" => Some("\u{1F44E}"),
        "Pointing_Up" => Some("\u{261D}\u{FE0F}"),
        "Open_Palm" => Some("\u{270B}"),
        "Closed_Fist" => Some("\u{270A}"),
        "Victory" => Some("\u{270C}\u{FE0F}"),
        "ILoveYou" => Some("\u{1F91F}"),
        _ => None,
    }
}
