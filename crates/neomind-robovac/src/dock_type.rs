//! Dock type -> capabilities implied by the attached dock.

use crate::features::Feature;

const AUTO_EMPTY: &[Feature] = &[Feature::AutoEmptyDock, Feature::DockingStationStatus];
const EMPTY_WASH: &[Feature] = &[
    Feature::AutoEmptyDock,
    Feature::MopWash,
    Feature::DockingStationStatus,
];
const AUTO_EMPTY_PURE: &[Feature] = &[Feature::AutoEmptyDock];
const WASH_DRY: &[Feature] = &[
    Feature::MopWash,
    Feature::MopDry,
    Feature::DockingStationStatus,
];
const EMPTY_WASH_DRY: &[Feature] = &[
    Feature::AutoEmptyDock,
    Feature::MopWash,
    Feature::MopDry,
    Feature::DockingStationStatus,
];

/// Capabilities to enable, in order, for a reported dock type.
///
/// Unknown codes (including 0, no dock) imply nothing.
pub fn capabilities_for(dock_type: i64) -> &'static [Feature] {
    match dock_type {
        1 => AUTO_EMPTY,
        2 => EMPTY_WASH,
        3 => AUTO_EMPTY_PURE,
        5 => WASH_DRY,
        7 | 17 => EMPTY_WASH_DRY,
        _ => &[],
    }
}
