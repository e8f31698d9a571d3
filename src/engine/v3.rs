//! V3 bootloader programmer: framed binary push protocol driven by the
//! device's data requests.

use super::{Engine, Event, RunOutcome, StateId};
use crate::codec;
use crate::platform::Platform;

const SYNC_DELAY_MS: u64 = 50;
const UPDATE_REQUEST_TIMEOUT_MS: u64 = 1_000;
const DATA_GRACE_TIMEOUT_MS: u64 = 5_000;

const MAGIC: u8 = 0x81;
const OP_FW_UPDATE_REQUEST: u8 = 0x03;
const OP_FW_UPDATE_RESPONSE: u8 = 0x83;
const OP_FW_DATA_REQUEST: u8 = 0x04;
const OP_FW_DATA_RESPONSE: u8 = 0x84;

/// Sent unvalidated by the bootloader at this stage; see DESIGN.md.
const PLACEHOLDER_CRC: [u8; 4] = [0xAA, 0xAA, 0xAA, 0xAA];

/// Largest payload this implementation will place in a single
/// `FW_DATA_RESPONSE`.
const MAX_RESPONSE_PAYLOAD: u16 = 512;

pub fn handle<P: Platform>(engine: &mut Engine<P>, event: Event) {
    match engine.state {
        StateId::V3ProgramSyncDelay => handle_sync_delay(engine, event),
        StateId::V3ProgramSync => handle_sync(engine, event),
        StateId::V3ProgramUpload => handle_upload(engine, event),
        _ => {}
    }
}

/// The original protocol blocks for 50ms here; this implementation arms a
/// timer and re-enters on `Timeout` instead, preserving the cooperative,
/// non-blocking event model.
fn handle_sync_delay<P: Platform>(engine: &mut Engine<P>, event: Event) {
    match event {
        Event::Action => engine.platform().set_timeout(SYNC_DELAY_MS),
        Event::Timeout => {
            engine.state = StateId::V3ProgramSync;
            engine.handle_event(Event::Action);
        }
        _ => {}
    }
}

fn handle_sync<P: Platform>(engine: &mut Engine<P>, event: Event) {
    match event {
        Event::Action => {
            let frame = {
                let file = engine.file();
                let mut packet = Vec::with_capacity(15);
                packet.push(MAGIC);
                packet.push(OP_FW_UPDATE_REQUEST);
                packet.extend_from_slice(&file.payload_size().to_le_bytes());
                packet.extend_from_slice(&file.target_address().to_le_bytes());
                packet.push(file.file_type());
                packet.extend_from_slice(&PLACEHOLDER_CRC);
                codec::encode(&packet)
            };
            engine.platform().write(&frame);
            engine.platform().set_timeout(UPDATE_REQUEST_TIMEOUT_MS);
        }
        Event::RxBtlPacket(packet) => {
            if packet.len() >= 3 && packet[1] == OP_FW_UPDATE_RESPONSE && packet[2] == 0 {
                engine.state = StateId::V3ProgramUpload;
                engine.platform().set_timeout(DATA_GRACE_TIMEOUT_MS);
            } else {
                engine.retry();
            }
        }
        Event::Timeout => engine.retry(),
        _ => {}
    }
}

fn handle_upload<P: Platform>(engine: &mut Engine<P>, event: Event) {
    match event {
        Event::RxBtlPacket(packet) => {
            if packet.len() < 8 || packet[1] != OP_FW_DATA_REQUEST {
                engine.retry();
                return;
            }
            let offset = u32::from_le_bytes([packet[2], packet[3], packet[4], packet[5]]);
            let length = u16::from_le_bytes([packet[6], packet[7]]);

            let response = build_data_response(engine, offset, length);
            engine.platform().write(&codec::encode(&response));
            engine.platform().set_timeout(DATA_GRACE_TIMEOUT_MS);
        }
        // No further request arrived within the grace window after the last
        // response: treat this as completion (see DESIGN.md open question).
        Event::Timeout => engine.finish(RunOutcome::Completed),
        Event::Disconnected => engine.finish(RunOutcome::Completed),
        _ => {}
    }
}

fn build_data_response<P: Platform>(engine: &mut Engine<P>, offset: u32, length: u16) -> Vec<u8> {
    let payload_size = engine.file().payload_size();

    let out_of_range = offset
        .checked_add(length as u32)
        .is_none_or(|end| end > payload_size);

    let (status, sent_len, bytes) = if out_of_range {
        (1u8, 0u16, Vec::new())
    } else if length == 0 {
        (3u8, 0u16, Vec::new())
    } else if length > MAX_RESPONSE_PAYLOAD {
        (2u8, 0u16, Vec::new())
    } else {
        let slice = engine.file().payload_slice(offset, length).unwrap_or(&[]);
        (0u8, slice.len() as u16, slice.to_vec())
    };

    let mut response = Vec::with_capacity(8 + bytes.len());
    response.push(MAGIC);
    response.push(OP_FW_DATA_RESPONSE);
    response.push(status);
    response.extend_from_slice(&offset.to_le_bytes());
    response.extend_from_slice(&sent_len.to_le_bytes());
    response.extend_from_slice(&bytes);
    response
}
