//! Event classification
//!
//! Maps a raw layer name to its category, subtype and display group using
//! case-insensitive substring tests. Every function here is total: names that
//! match no pattern are plain touches in the `OTHER` display group.

use crate::types::{Category, Classification, DisplayGroup, HwkKind, Subtype, SwipeDirection};

const HWK_PATTERN: &str = "hwk";
const SWIPE_PATTERN: &str = "swipe";
const AREA_PATTERN: &str = "area";
const BTN_PATTERNS: [&str; 2] = ["btn", "button"];

/// HWK subtypes in priority order
const HWK_KINDS: [(&str, HwkKind); 3] = [
    ("boost", HwkKind::Boost),
    ("magma", HwkKind::Magma),
    ("drive", HwkKind::Drive),
];

/// Swipe directions in priority order
const SWIPE_DIRECTIONS: [(&str, SwipeDirection); 4] = [
    ("swipe_up", SwipeDirection::Up),
    ("swipe_down", SwipeDirection::Down),
    ("swipe_left", SwipeDirection::Left),
    ("swipe_right", SwipeDirection::Right),
];

/// Top-level category of a layer name
pub fn classify(name: &str) -> Category {
    classify_lowered(&name.to_ascii_lowercase())
}

/// Display group of a layer name (HWK → SWIPE → AREA → BTN → OTHER)
pub fn classify_display(name: &str) -> DisplayGroup {
    display_lowered(&name.to_ascii_lowercase())
}

/// Category, subtype and display group in one pass
pub fn classify_full(name: &str) -> Classification {
    let lowered = name.to_ascii_lowercase();
    let category = classify_lowered(&lowered);
    let subtype = match category {
        Category::Touch => Subtype::Plain,
        Category::Hwk => Subtype::Hwk(hwk_kind_lowered(&lowered)),
        Category::Swipe => Subtype::Swipe(swipe_direction_lowered(&lowered)),
    };
    Classification {
        category,
        subtype,
        display_group: display_lowered(&lowered),
    }
}

/// HWK subtype of a layer name (meaningful only for HWK records)
pub fn hwk_kind(name: &str) -> HwkKind {
    hwk_kind_lowered(&name.to_ascii_lowercase())
}

/// Swipe direction of a layer name (meaningful only for SWIPE records)
pub fn swipe_direction(name: &str) -> SwipeDirection {
    swipe_direction_lowered(&name.to_ascii_lowercase())
}

pub fn is_swipe(name: &str) -> bool {
    classify(name) == Category::Swipe
}

pub fn is_hwk(name: &str) -> bool {
    classify(name) == Category::Hwk
}

fn classify_lowered(lowered: &str) -> Category {
    if lowered.contains(HWK_PATTERN) {
        Category::Hwk
    } else if lowered.contains(SWIPE_PATTERN) {
        Category::Swipe
    } else {
        Category::Touch
    }
}

fn display_lowered(lowered: &str) -> DisplayGroup {
    if lowered.contains(HWK_PATTERN) {
        DisplayGroup::Hwk
    } else if lowered.contains(SWIPE_PATTERN) {
        DisplayGroup::Swipe
    } else if lowered.contains(AREA_PATTERN) {
        DisplayGroup::Area
    } else if BTN_PATTERNS.iter().any(|p| lowered.contains(p)) {
        DisplayGroup::Btn
    } else {
        DisplayGroup::Other
    }
}

fn hwk_kind_lowered(lowered: &str) -> HwkKind {
    HWK_KINDS
        .iter()
        .find(|(pattern, _)| lowered.contains(pattern))
        .map(|(_, kind)| *kind)
        .unwrap_or(HwkKind::Unknown)
}

fn swipe_direction_lowered(lowered: &str) -> SwipeDirection {
    SWIPE_DIRECTIONS
        .iter()
        .find(|(pattern, _)| lowered.contains(pattern))
        .map(|(_, direction)| *direction)
        .unwrap_or(SwipeDirection::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_categories() {
        assert_eq!(classify("btn_a"), Category::Touch);
        assert_eq!(classify("HWK_boost"), Category::Hwk);
        assert_eq!(classify("swipe_up"), Category::Swipe);
        assert_eq!(classify(""), Category::Touch);
    }

    #[test]
    fn test_hwk_takes_priority_over_swipe() {
        let c = classify_full("hwk_swipe_left");
        assert_eq!(c.category, Category::Hwk);
        assert_eq!(c.display_group, DisplayGroup::Hwk);
        assert_eq!(c.subtype, Subtype::Hwk(HwkKind::Unknown));
    }

    #[test]
    fn test_hwk_subtype_priority() {
        assert_eq!(hwk_kind("HWK_boost"), HwkKind::Boost);
        assert_eq!(hwk_kind("HWK_Magma_2"), HwkKind::Magma);
        assert_eq!(hwk_kind("hwk_drive"), HwkKind::Drive);
        // boost is checked before drive
        assert_eq!(hwk_kind("hwk_drive_boost"), HwkKind::Boost);
        assert_eq!(hwk_kind("hwk_other"), HwkKind::Unknown);
    }

    #[test]
    fn test_swipe_directions() {
        assert_eq!(swipe_direction("SWIPE_UP"), SwipeDirection::Up);
        assert_eq!(swipe_direction("map_swipe_down"), SwipeDirection::Down);
        assert_eq!(swipe_direction("Swipe_Left"), SwipeDirection::Left);
        assert_eq!(swipe_direction("swipe_right_2"), SwipeDirection::Right);
        // Requires the underscore form
        assert_eq!(swipe_direction("swipeup"), SwipeDirection::Unknown);
    }

    #[test]
    fn test_display_groups() {
        assert_eq!(classify_display("map_area_3"), DisplayGroup::Area);
        assert_eq!(classify_display("BTN_ok"), DisplayGroup::Btn);
        assert_eq!(classify_display("start_button"), DisplayGroup::Btn);
        assert_eq!(classify_display("label"), DisplayGroup::Other);
        // AREA beats BTN
        assert_eq!(classify_display("area_btn"), DisplayGroup::Area);
        // SWIPE beats AREA
        assert_eq!(classify_display("area_swipe_up"), DisplayGroup::Swipe);
    }

    #[test]
    fn test_case_invariance() {
        let names = [
            "btn_a",
            "HWK_boost",
            "Swipe_Right",
            "mixed_Area_BUTTON",
            "ünïcode_swipe",
            "",
            "hWk",
        ];
        for name in names {
            let upper = name.to_ascii_uppercase();
            let lower = name.to_ascii_lowercase();
            assert_eq!(classify_full(name), classify_full(&upper), "{}", name);
            assert_eq!(classify_full(name), classify_full(&lower), "{}", name);
        }
    }

    #[test]
    fn test_touch_subtype_is_plain() {
        let c = classify_full("btn_a");
        assert_eq!(c.subtype, Subtype::Plain);
        assert_eq!(c.display_group, DisplayGroup::Btn);
        assert!(!is_swipe("btn_a"));
        assert!(!is_hwk("btn_a"));
    }
}
