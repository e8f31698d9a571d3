//! Bootloader dialect detection: after reset, repeatedly try to reopen the
//! port, then classify the responding bootloader as V1 (ASCII, prompted) or
//! V3 (framed binary, unsolicited ID response).

use super::{ascii_contains, Engine, Event, StateId};
use crate::platform::Platform;

const RECONNECT_INTERVAL_MS: u64 = 500;
const QUERY_TIMEOUT_MS: u64 = 200;
const MAX_QUERY_TIMEOUTS: u32 = 3;
const V1_MIN_BANNER_LEN: usize = 53;

const ID_RESPONSE_OPCODE: u8 = 0x82;

pub fn handle<P: Platform>(engine: &mut Engine<P>, event: Event) {
    match engine.state {
        StateId::BootloaderConnect => handle_connect(engine, event),
        StateId::BootloaderQuery => handle_query(engine, event),
        _ => {}
    }
}

fn handle_connect<P: Platform>(engine: &mut Engine<P>, event: Event) {
    match event {
        Event::Action | Event::Timeout => {
            let device_path = engine.device_path().to_owned();
            match engine.platform().connect(&device_path) {
                Ok(()) => {
                    engine.state = StateId::BootloaderQuery;
                    engine.clear_ascii();
                    engine.set_retry_count(0);
                    engine.platform().set_timeout(QUERY_TIMEOUT_MS);
                }
                Err(_) => engine.platform().set_timeout(RECONNECT_INTERVAL_MS),
            }
        }
        _ => {}
    }
}

fn handle_query<P: Platform>(engine: &mut Engine<P>, event: Event) {
    match event {
        Event::Timeout => {
            let count = engine.retry_count() + 1;
            engine.set_retry_count(count);
            if count > MAX_QUERY_TIMEOUTS {
                engine.retry();
                return;
            }
            // The V1 bootloader is silent until prompted; poke it.
            engine.platform().write(b"ID");
            engine.platform().set_timeout(QUERY_TIMEOUT_MS);
        }
        Event::RxAscii => {
            let buf = engine.ascii_buf();
            if buf.len() >= V1_MIN_BANNER_LEN
                && buf.last() == Some(&b'\n')
                && ascii_contains(buf, b"Bootloader")
            {
                engine.platform().clear_timeout();
                engine.clear_ascii();
                engine.state = StateId::V1ProgramSync;
                engine.handle_event(Event::Action);
            }
        }
        Event::RxBtlPacket(packet) => {
            if packet.len() >= 10 && packet.first() == Some(&0x81) && packet.get(1) == Some(&ID_RESPONSE_OPCODE) {
                engine.platform().clear_timeout();
                engine.state = StateId::V3ProgramSyncDelay;
                engine.handle_event(Event::Action);
            }
        }
        Event::Disconnected => engine.retry(),
        _ => {}
    }
}
