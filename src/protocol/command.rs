use crate::prelude::*;

use super::codec::PartialEncode;
use super::hardware_enums::*;
use super::machine_enum::MachineEnum;
use super::packet::{stringify, EcamFrame};
use super::tlv::{canonical_entries, TlvParams};
use crate::util::decode_b64_lenient;

/// Beverage ID used by the universal stop command.
pub const STOP_BEVERAGE: u8 = 0x10;

/// A beverage dispensing request: `[0x83, 0xf0, beverage, trigger, TLV...]`.
///
/// No validation of the beverage or parameter ranges happens here; out-of-range input yields a
/// well-formed frame the machine will reject or ignore.
#[derive(Clone, Debug, PartialEq)]
pub struct BrewCommand {
    pub beverage: u8,
    pub trigger: MachineEnum<EcamOperationTrigger>,
    pub params: TlvParams,
}

impl BrewCommand {
    pub fn new(beverage: u8, params: TlvParams, trigger: EcamOperationTrigger) -> Self {
        BrewCommand {
            beverage,
            trigger: trigger.into(),
            params,
        }
    }

    /// The stop command: fixed water and taste parameters with the stop trigger.
    pub fn stop(beverage: u8) -> Self {
        Self::new(
            beverage,
            [(0x0f, 250), (0x1b, 1)].into_iter().collect(),
            EcamOperationTrigger::Stop,
        )
    }

    pub fn to_frame(&self) -> EcamFrame {
        EcamFrame::packetize(&self.encode())
    }
}

impl PartialEncode for BrewCommand {
    fn partial_encode(&self, out: &mut Vec<u8>) {
        out.push(EcamRequestId::BeverageDispensingMode.into());
        out.push(ANSWER_REQUIRED);
        out.push(self.beverage);
        self.trigger.partial_encode(out);
        canonical_entries(&self.params).partial_encode(out);
    }
}

/// Builds a complete brew frame as a lowercase hex string.
pub fn build_brew_command(
    beverage: u8,
    params: &TlvParams,
    trigger: MachineEnum<EcamOperationTrigger>,
) -> String {
    let command = BrewCommand {
        beverage,
        trigger,
        params: params.clone(),
    };
    let frame = command.to_frame();
    trace_packet!("brew command {:?}", frame);
    frame.stringify()
}

/// Builds the universal stop frame for `beverage` (usually [`STOP_BEVERAGE`]).
pub fn build_stop_command(beverage: u8) -> String {
    BrewCommand::stop(beverage).to_frame().stringify()
}

/// Recovers a command frame from a base64 datapoint value, dropping anything past the
/// declared length.
pub fn command_b64_to_hex(b64: &str) -> Option<String> {
    let raw = decode_b64_lenient(b64)?;
    let length = *raw.get(1)? as usize;
    let end = (length + 1).min(raw.len());
    Some(stringify(&raw[..end]))
}
