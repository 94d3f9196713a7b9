//! Docking-station status word.
//!
//! The dock reports the condition of its tanks and consumables as one packed
//! integer (`dss`): six 2-bit fields starting at bit 0.
//!
//! ```text
//! bits  11-10        9-8              7-6              5-4        3-2               1-0
//!       water_ready  clear_water_box  dirty_water_box  dust_bag   water_box_filter  clean_fluid
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::config::folders;
use crate::error::Result;
use crate::profile::{table, ValueTable};
use crate::store::{StateDeclaration, StatePaths, StateStore};
use crate::value::StateValue;

const FIELD_MASK: u64 = 0b11;
const WORD_MASK: u64 = 0xFFF;

/// Field names in bit order (offset = index * 2).
pub const FIELD_NAMES: [&str; 6] = [
    "clean_fluid_status",
    "water_box_filter_status",
    "dust_bag_status",
    "dirty_water_box_status",
    "clear_water_box_status",
    "water_ready_status",
];

/// Condition of one dock component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DockComponentStatus {
    Unknown,
    Error,
    Ok,
    /// Value 3, unused by the protocol
    Reserved,
}

impl DockComponentStatus {
    fn from_bits(bits: u64) -> Self {
        match bits & FIELD_MASK {
            0 => Self::Unknown,
            1 => Self::Error,
            2 => Self::Ok,
            _ => Self::Reserved,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Error => 1,
            Self::Ok => 2,
            Self::Reserved => 3,
        }
    }
}

/// Allowed values declared for every sub-status state.
pub fn component_states() -> ValueTable {
    table(&[(0, "UNKNOWN"), (1, "ERROR"), (2, "OK")])
}

/// Decoded docking-station status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DockingStationStatus {
    pub clean_fluid: DockComponentStatus,
    pub water_box_filter: DockComponentStatus,
    pub dust_bag: DockComponentStatus,
    pub dirty_water_box: DockComponentStatus,
    pub clear_water_box: DockComponentStatus,
    pub water_ready: DockComponentStatus,
}

impl DockingStationStatus {
    /// Decode a packed word.
    pub fn from_word(word: u64) -> Self {
        let field = |index: u64| DockComponentStatus::from_bits(word >> (index * 2));
        Self {
            clean_fluid: field(0),
            water_box_filter: field(1),
            dust_bag: field(2),
            dirty_water_box: field(3),
            clear_water_box: field(4),
            water_ready: field(5),
        }
    }

    /// Decode a raw payload value.
    ///
    /// Returns `None` for non-numbers and non-finite floats; malformed words
    /// are tolerated, not reported. Negative words decode from their
    /// two's-complement bits.
    pub fn decode(value: &Value) -> Option<Self> {
        let Value::Number(number) = value else {
            return None;
        };
        let word = number
            .as_i64()
            .map(|i| i as u64)
            .or_else(|| number.as_u64())
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f as i64 as u64)
            })?;
        Some(Self::from_word(word & WORD_MASK))
    }

    /// Fields in bit order, paired with their state names.
    pub fn fields(&self) -> [(&'static str, DockComponentStatus); 6] {
        [
            (FIELD_NAMES[0], self.clean_fluid),
            (FIELD_NAMES[1], self.water_box_filter),
            (FIELD_NAMES[2], self.dust_bag),
            (FIELD_NAMES[3], self.dirty_water_box),
            (FIELD_NAMES[4], self.clear_water_box),
            (FIELD_NAMES[5], self.water_ready),
        ]
    }

    /// Persist every sub-status as an acknowledged state.
    pub async fn persist(&self, store: &dyn StateStore, paths: &StatePaths) -> Result<()> {
        for (name, status) in self.fields() {
            let id = paths.state(folders::DOCKING_STATION, name);
            let declaration = StateDeclaration::number(name).with_states(component_states());
            store.ensure(&id, &declaration).await?;
            store
                .set_acknowledged(&id, StateValue::Integer(status.code()))
                .await?;
        }
        Ok(())
    }
}

/// Decode `value` and persist the result. Non-numeric input writes nothing.
///
/// Returns the decoded status when something was written.
pub async fn apply_docking_status(
    value: &Value,
    store: &dyn StateStore,
    paths: &StatePaths,
) -> Result<Option<DockingStationStatus>> {
    let Some(status) = DockingStationStatus::decode(value) else {
        tracing::debug!(value = %value, "Ignoring non-numeric docking station status");
        return Ok(None);
    };
    status.persist(store, paths).await?;
    Ok(Some(status))
}
