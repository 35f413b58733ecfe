use crate::error::Result;

/// One VCP feature read: the maximum and current fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureValue {
    pub max: u32,
    pub current: u32,
}

impl FeatureValue {
    pub fn new(max: u32, current: u32) -> Self {
        Self { max, current }
    }

    pub fn max_hi(&self) -> u8 {
        hi(self.max)
    }

    pub fn max_lo(&self) -> u8 {
        lo(self.max)
    }

    pub fn current_hi(&self) -> u8 {
        hi(self.current)
    }

    pub fn current_lo(&self) -> u8 {
        lo(self.current)
    }
}

/// High byte of the low 16 bits.
pub fn hi(field: u32) -> u8 {
    (field >> 8) as u8
}

/// Low byte.
pub fn lo(field: u32) -> u8 {
    field as u8
}

/// Blocking access to a monitor's VCP feature registers.
///
/// Implementations know nothing about what an address means and never
/// retry.
pub trait RegisterTransport {
    fn read_feature(&mut self, address: u8) -> Result<FeatureValue>;

    fn write_feature(&mut self, address: u8, value: u32) -> Result<()>;
}

impl<T: RegisterTransport + ?Sized> RegisterTransport for &mut T {
    fn read_feature(&mut self, address: u8) -> Result<FeatureValue> {
        (**self).read_feature(address)
    }

    fn write_feature(&mut self, address: u8, value: u32) -> Result<()> {
        (**self).write_feature(address, value)
    }
}

impl<T: RegisterTransport + ?Sized> RegisterTransport for Box<T> {
    fn read_feature(&mut self, address: u8) -> Result<FeatureValue> {
        (**self).read_feature(address)
    }

    fn write_feature(&mut self, address: u8, value: u32) -> Result<()> {
        (**self).write_feature(address, value)
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryRegisters;
    use super::*;

    #[test]
    fn hi_lo_use_low_sixteen_bits() {
        let value = FeatureValue::new(0xABCD_1122, 0x0000_3344);
        assert_eq!((value.max_hi(), value.max_lo()), (0x11, 0x22));
        assert_eq!((value.current_hi(), value.current_lo()), (0x33, 0x44));
    }

    #[test]
    fn forwarding_impls_reach_the_inner_transport() {
        let registers = MemoryRegisters::default().with(0xE3, 0x0102, 0);
        let mut boxed: Box<dyn RegisterTransport> = Box::new(registers.clone());
        assert_eq!(boxed.read_feature(0xE3).unwrap(), FeatureValue::new(0x0102, 0));

        fn write_through<T: RegisterTransport>(mut t: T) {
            t.write_feature(0xE4, 1920).unwrap();
        }
        let mut inner = registers.clone();
        write_through(&mut inner);
        assert_eq!(registers.file().writes, vec![(0xE4, 1920)]);
    }
}
