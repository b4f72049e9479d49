//! Serial bus controller

use serde::{Deserialize, Serialize};

use super::QemuDevice;
use crate::vmm::args::{ExtraFiles, Props};

/// A serial bus controller such as `virtio-serial-pci`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialDevice {
    pub driver: String,
    pub id: String,
}

impl SerialDevice {
    pub fn new(driver: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            id: id.into(),
        }
    }
}

impl QemuDevice for SerialDevice {
    fn valid(&self) -> bool {
        !self.driver.is_empty() && !self.id.is_empty()
    }

    fn qemu_params<'a>(&'a self, _files: &mut ExtraFiles<'a>) -> Vec<String> {
        let mut device = Props::new(&self.driver);
        device.push("id", &self.id);

        vec!["-device".into(), device.into_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_validation() {
        assert!(!SerialDevice::default().valid());
        assert!(!SerialDevice::new("virtio-serial-pci", "").valid());
        assert!(!SerialDevice::new("", "serial0").valid());
        assert!(SerialDevice::new("virtio-serial-pci", "serial0").valid());
    }
}
