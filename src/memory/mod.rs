use crate::bus::BusHandler;

/// The console's 2 KiB of internal RAM, mirrored four times across $0000-$1FFF.
pub struct WorkRam {
    pub(crate) ram: [u8; 0x800],
}

impl WorkRam {
    pub const START: u16 = 0x0000;
    pub const END: u16 = 0x1FFF;

    pub fn new() -> Self {
        WorkRam { ram: [0; 0x800] }
    }
}

impl Default for WorkRam {
    fn default() -> Self {
        Self::new()
    }
}

impl BusHandler for WorkRam {
    fn read(&mut self, addr: u16) -> Option<u8> {
        Some(self.ram[(addr & 0x7FF) as usize])
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.ram[(addr & 0x7FF) as usize] = data;
    }
}
