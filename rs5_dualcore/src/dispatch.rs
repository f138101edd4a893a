//! Route decoded records to the owning domain of a replica.

use rs5_common::record::{
    ApplyError, ArrayIdent, DataRecord, Frame, Record, SystemChange, decode,
};
use tracing::trace;

use crate::domain::{DeviceState, DomainApplier, RuntimeApplier};

/// What a successfully applied record touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A DataExchange record written to this table.
    Data(ArrayIdent),
    /// A SystemChange record. Boot changes are left to the caller's
    /// sequencer; run-mode and debug changes are already applied.
    Change(SystemChange),
}

/// Apply one DataExchange record under the owning domain's lock.
pub fn apply_data(data: &DataRecord, device: &DeviceState) -> Result<(), ApplyError> {
    let DataRecord { address, value } = data;
    match address.array {
        ArrayIdent::SystemState | ArrayIdent::ModeDebug => device.system.apply(*address, value),
        ArrayIdent::ServoRuntime => RuntimeApplier {
            runtime: &device.servo_runtime,
            config: &device.servo_config,
        }
        .apply(*address, value),
        ArrayIdent::ServoConfig => device.servo_config.apply(*address, value),
        ArrayIdent::EyeOverlay => device.eye_overlay.apply(*address, value),
        ArrayIdent::EyeProfile => device.eye_profiles.apply(*address, value),
    }
}

/// Apply one decoded record to `device`.
pub fn apply_record(record: &Record, device: &DeviceState) -> Result<Applied, ApplyError> {
    match record {
        Record::Data(data) => {
            apply_data(data, device)?;
            trace!(array = ?data.address.array, element = data.address.element, row = data.address.row, "record applied");
            Ok(Applied::Data(data.address.array))
        }
        Record::System(change) => {
            match change {
                SystemChange::Boot(_) => {}
                SystemChange::Run(_) | SystemChange::Debug(_) => {
                    device.system.apply_change(*change);
                }
            }
            Ok(Applied::Change(*change))
        }
    }
}

/// Decode then apply. Framing failures surface as [`ApplyError::Framing`].
pub fn apply_frame(frame: &Frame, device: &DeviceState) -> Result<Applied, ApplyError> {
    let record = decode(frame)?;
    apply_record(&record, device)
}
