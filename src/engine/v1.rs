//! V1 bootloader programmer: ASCII-shouldered, page-pulled by the device.

use super::{ascii_contains, Engine, Event, RunOutcome, StateId, V1_SYNC_MAX_EXTENSIONS};
use crate::platform::Platform;

const SYNC: [u8; 4] = [0x1A, 0x1C, 0xA9, 0xAE];
const SYNC_TIMEOUT_MS: u64 = 500;
const SYNC_EXTENSION_MS: u64 = 10;
const HEADER_TIMEOUT_MS: u64 = 1_000;
const PAGE_REQUEST_LEN: usize = 6;
const PAGE_TIMEOUT_MS: u64 = 2_000;
const VALIDATE_TIMEOUT_MS: u64 = 25_600;
const VALIDATE_EXTENSION_MS: u64 = 1_000;
const PROGRESS_LOG_INTERVAL: u16 = 20;

pub fn handle<P: Platform>(engine: &mut Engine<P>, event: Event) {
    match engine.state {
        StateId::V1ProgramSync => handle_sync(engine, event),
        StateId::V1ProgramWriteHeader => handle_write_header(engine, event),
        StateId::V1ProgramUpload => handle_upload(engine, event),
        StateId::V1ProgramValidate => handle_validate(engine, event),
        _ => {}
    }
}

fn handle_sync<P: Platform>(engine: &mut Engine<P>, event: Event) {
    match event {
        Event::Action => {
            engine.clear_ascii();
            engine.set_v1_sync_extensions(0);
            engine.platform().write(&SYNC);
            engine.platform().set_timeout(SYNC_TIMEOUT_MS);
        }
        Event::RxAscii => {
            if ascii_contains(engine.ascii_buf(), b"READY") {
                engine.platform().clear_timeout();
                engine.clear_ascii();
                engine.state = StateId::V1ProgramWriteHeader;
                engine.handle_event(Event::Action);
                return;
            }
            let extensions = engine.v1_sync_extensions() + 1;
            engine.set_v1_sync_extensions(extensions);
            if extensions > V1_SYNC_MAX_EXTENSIONS {
                engine.retry();
                return;
            }
            engine.platform().set_timeout(SYNC_EXTENSION_MS);
        }
        Event::Timeout => engine.retry(),
        _ => {}
    }
}

fn handle_write_header<P: Platform>(engine: &mut Engine<P>, event: Event) {
    if let Event::Action = event {
        let file = engine.file();
        let mut header = Vec::with_capacity(10);
        header.extend_from_slice(&file.payload_size().to_le_bytes());
        header.extend_from_slice(&file.target_address().to_le_bytes());
        header.push(file.file_type());
        header.push(file.crc());
        engine.platform().write(&header);
        engine.clear_ascii();
        engine.state = StateId::V1ProgramUpload;
        engine.platform().set_timeout(HEADER_TIMEOUT_MS);
    }
}

fn handle_upload<P: Platform>(engine: &mut Engine<P>, event: Event) {
    match event {
        Event::RxAscii => {
            let buf = engine.ascii_buf();
            if buf.len() < PAGE_REQUEST_LEN {
                return;
            }
            let tail = &buf[buf.len() - PAGE_REQUEST_LEN..];
            if &tail[0..3] != b"GET" || tail[5] != b';' {
                return;
            }
            let page = u16::from_le_bytes([tail[3], tail[4]]);
            engine.clear_ascii();

            let (page_bytes, page_count) = {
                let file = engine.file();
                (file.v1_page(page).map(|s| s.to_vec()), file.v1_page_count())
            };
            let Some(page_bytes) = page_bytes else {
                engine.retry();
                return;
            };
            engine.platform().write(&page_bytes);

            if page % PROGRESS_LOG_INTERVAL == 0 || page + 1 == page_count {
                log::info!("v1 upload: page {}/{}", page + 1, page_count);
            }

            if page + 1 == page_count {
                engine.state = StateId::V1ProgramValidate;
                engine.platform().set_timeout(VALIDATE_TIMEOUT_MS);
            } else {
                engine.platform().set_timeout(PAGE_TIMEOUT_MS);
            }
        }
        Event::Timeout => engine.retry(),
        _ => {}
    }
}

fn handle_validate<P: Platform>(engine: &mut Engine<P>, event: Event) {
    match event {
        Event::RxAscii => {
            let buf = engine.ascii_buf();
            if buf.len() >= 7 && ascii_contains(buf, b"#VALID CRC") {
                log::info!("firmware successful written");
                engine.finish(RunOutcome::Completed);
            } else {
                engine.platform().set_timeout(VALIDATE_EXTENSION_MS);
            }
        }
        Event::Timeout => engine.retry(),
        _ => {}
    }
}
