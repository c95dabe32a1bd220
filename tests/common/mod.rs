use spectrum_z80_core::bus::{Bus, InterruptLines};

/// Minimal bus for testing: flat 64KB read/write memory, no peripherals.
pub struct TestBus {
    pub memory: [u8; 0x10000],
    pub ports: [u8; 0x10000],
    pub nmi: bool,
    pub irq: bool,
    pub irq_vector: u8,
}

impl TestBus {
    pub fn new() -> Self {
        Self {
            memory: [0; 0x10000],
            ports: [0; 0x10000],
            nmi: false,
            irq: false,
            irq_vector: 0xFF,
        }
    }

    pub fn load(&mut self, addr: u16, data: &[u8]) {
        let start = addr as usize;
        self.memory[start..start + data.len()].copy_from_slice(data);
    }
}

impl Default for TestBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for TestBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory[address as usize]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory[address as usize] = value;
    }

    fn io_read(&mut self, port: u16) -> u8 {
        self.ports[port as usize]
    }

    fn io_write(&mut self, port: u16, value: u8) {
        self.ports[port as usize] = value;
    }

    fn check_interrupts(&self) -> InterruptLines {
        InterruptLines {
            nmi: self.nmi,
            irq: self.irq,
            irq_vector: self.irq_vector,
        }
    }
}
