//! A mock `Handler` for tests: flat sparse maps stand in for physical
//! memory, I/O ports, and PCI configuration space, and port writes are
//! logged so tests can assert on the exact transactions a field access
//! produced.

use crate::Handler;
use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};
use std::sync::Mutex;

#[derive(Default)]
struct TestHandlerState {
    memory: BTreeMap<usize, u8>,
    ports: BTreeMap<u16, u8>,
    pci: BTreeMap<(u8, u8, u8, u16), u32>,
    port_writes: Vec<(u16, u8)>,
    /// When set, reads from ports in this inclusive range return the last
    /// byte written to any port in the range, modelling a device that echoes
    /// its register file.
    echo_range: Option<(u16, u16)>,
    last_echo_write: u8,
}

/// The handler clones share state, so a test can keep one clone to inspect
/// after the context has consumed another.
#[derive(Clone)]
pub(crate) struct TestHandler {
    state: Arc<Mutex<TestHandlerState>>,
}

impl TestHandler {
    pub(crate) fn new() -> TestHandler {
        TestHandler { state: Arc::new(Mutex::new(TestHandlerState::default())) }
    }

    /// A handler whose ports in `lo..=hi` echo the last byte written to them.
    pub(crate) fn echoing(lo: u16, hi: u16) -> TestHandler {
        let handler = TestHandler::new();
        handler.state.lock().unwrap().echo_range = Some((lo, hi));
        handler
    }

    pub(crate) fn write_memory_u8(&self, address: usize, value: u8) {
        self.state.lock().unwrap().memory.insert(address, value);
    }

    pub(crate) fn read_memory_u8(&self, address: usize) -> u8 {
        *self.state.lock().unwrap().memory.get(&address).unwrap_or(&0)
    }

    pub(crate) fn write_pci(&self, bus: u8, device: u8, function: u8, offset: u16, value: u32) {
        self.state.lock().unwrap().pci.insert((bus, device, function, offset), value);
    }

    pub(crate) fn port_writes(&self) -> Vec<(u16, u8)> {
        self.state.lock().unwrap().port_writes.clone()
    }
}

impl Handler for TestHandler {
    fn read_u8(&self, address: usize) -> u8 {
        self.read_memory_u8(address)
    }

    fn read_u16(&self, address: usize) -> u16 {
        u16::from_le_bytes([self.read_u8(address), self.read_u8(address + 1)])
    }

    fn read_u32(&self, address: usize) -> u32 {
        u32::from(self.read_u16(address)) | (u32::from(self.read_u16(address + 2)) << 16)
    }

    fn read_u64(&self, address: usize) -> u64 {
        u64::from(self.read_u32(address)) | (u64::from(self.read_u32(address + 4)) << 32)
    }

    fn write_u8(&mut self, address: usize, value: u8) {
        self.write_memory_u8(address, value);
    }

    fn write_u16(&mut self, address: usize, value: u16) {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_memory_u8(address + i, byte);
        }
    }

    fn write_u32(&mut self, address: usize, value: u32) {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_memory_u8(address + i, byte);
        }
    }

    fn write_u64(&mut self, address: usize, value: u64) {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_memory_u8(address + i, byte);
        }
    }

    fn read_io_u8(&self, port: u16) -> u8 {
        let state = self.state.lock().unwrap();
        match state.echo_range {
            Some((lo, hi)) if (lo..=hi).contains(&port) => state.last_echo_write,
            _ => *state.ports.get(&port).unwrap_or(&0),
        }
    }

    fn read_io_u16(&self, port: u16) -> u16 {
        u16::from_le_bytes([self.read_io_u8(port), self.read_io_u8(port + 1)])
    }

    fn read_io_u32(&self, port: u16) -> u32 {
        u32::from(self.read_io_u16(port)) | (u32::from(self.read_io_u16(port + 2)) << 16)
    }

    fn write_io_u8(&mut self, port: u16, value: u8) {
        let mut state = self.state.lock().unwrap();
        state.ports.insert(port, value);
        state.port_writes.push((port, value));
        if let Some((lo, hi)) = state.echo_range {
            if (lo..=hi).contains(&port) {
                state.last_echo_write = value;
            }
        }
    }

    fn write_io_u16(&mut self, port: u16, value: u16) {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_io_u8(port + i as u16, byte);
        }
    }

    fn write_io_u32(&mut self, port: u16, value: u32) {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_io_u8(port + i as u16, byte);
        }
    }

    fn read_pci_u32(&self, _segment: u16, bus: u8, device: u8, function: u8, offset: u16) -> u32 {
        *self.state.lock().unwrap().pci.get(&(bus, device, function, offset)).unwrap_or(&0)
    }

    fn write_pci_u32(&mut self, _segment: u16, bus: u8, device: u8, function: u8, offset: u16, value: u32) {
        self.write_pci(bus, device, function, offset, value);
    }

    fn stall(&self, _microseconds: u64) {}

    fn sleep(&self, _milliseconds: u64) {}
}
