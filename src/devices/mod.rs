//! Device descriptions for QEMU guests
//!
//! Each device kind knows how to check its own fields and how to render
//! itself as `-device` plus a backend group (`-drive`, `-netdev`,
//! `-chardev`, `-object`, `-fsdev`):
//! - Block devices (virtio-blk over a `-drive`)
//! - Network devices (tap / macvtap `-netdev`, optional pre-opened fds)
//! - Character devices (console, serial ports, sockets)
//! - Serial bus controllers
//! - Memory backend objects (NVDIMM)
//! - 9p filesystem shares

pub mod block;
pub mod chardev;
pub mod fsdev;
pub mod net;
pub mod object;
pub mod serial;

use serde::{Deserialize, Serialize};

pub use block::{BlockDevice, BlockDeviceAio, BlockDeviceFormat, BlockDeviceInterface};
pub use chardev::{CharDevice, CharDeviceBackend};
pub use fsdev::{FsDevice, FsDriver, SecurityModel};
pub use net::{NetDevice, NetDeviceType};
pub use object::{Object, ObjectType};
pub use serial::SerialDevice;

use crate::vmm::args::ExtraFiles;

/// Well-known QEMU device driver names.
pub mod driver {
    /// Non Volatile DIMM.
    pub const NVDIMM: &str = "nvdimm";
    /// 9pfs over PCI.
    pub const VIRTIO_9P: &str = "virtio-9p-pci";
    /// virtio networking.
    pub const VIRTIO_NET: &str = "virtio-net";
    /// virtio networking over PCI.
    pub const VIRTIO_NET_PCI: &str = "virtio-net-pci";
    /// virtio serial bus controller.
    pub const VIRTIO_SERIAL: &str = "virtio-serial-pci";
    /// virtio block.
    pub const VIRTIO_BLOCK: &str = "virtio-blk";
    /// Console port on a virtio serial bus.
    pub const CONSOLE: &str = "virtconsole";
    /// Generic port on a virtio serial bus.
    pub const VIRTIO_SERIAL_PORT: &str = "virtserialport";
}

/// What every device kind must provide.
pub trait QemuDevice {
    /// True when every field the argument rendering depends on is set.
    fn valid(&self) -> bool;

    /// Render the device as flag/value pairs.
    ///
    /// Only meaningful for valid devices. Devices that carry file
    /// descriptors register them with `files` and reference the numbers
    /// the child process will see.
    fn qemu_params<'a>(&'a self, files: &mut ExtraFiles<'a>) -> Vec<String>;
}

/// A device attached to the machine.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Device {
    Block(BlockDevice),
    Net(NetDevice),
    Chardev(CharDevice),
    Serial(SerialDevice),
    Object(Object),
    Fsdev(FsDevice),
}

impl Device {
    /// Short name of the device kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Device::Block(_) => "block",
            Device::Net(_) => "net",
            Device::Chardev(_) => "chardev",
            Device::Serial(_) => "serial",
            Device::Object(_) => "object",
            Device::Fsdev(_) => "fsdev",
        }
    }

    fn inner(&self) -> &dyn QemuDevice {
        match self {
            Device::Block(d) => d,
            Device::Net(d) => d,
            Device::Chardev(d) => d,
            Device::Serial(d) => d,
            Device::Object(d) => d,
            Device::Fsdev(d) => d,
        }
    }
}

impl QemuDevice for Device {
    fn valid(&self) -> bool {
        self.inner().valid()
    }

    fn qemu_params<'a>(&'a self, files: &mut ExtraFiles<'a>) -> Vec<String> {
        match self {
            Device::Block(d) => d.qemu_params(files),
            Device::Net(d) => d.qemu_params(files),
            Device::Chardev(d) => d.qemu_params(files),
            Device::Serial(d) => d.qemu_params(files),
            Device::Object(d) => d.qemu_params(files),
            Device::Fsdev(d) => d.qemu_params(files),
        }
    }
}

macro_rules! impl_from_device {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Device {
                fn from(dev: $ty) -> Self {
                    Device::$variant(dev)
                }
            }
        )*
    };
}

impl_from_device! {
    Block => BlockDevice,
    Net => NetDevice,
    Chardev => CharDevice,
    Serial => SerialDevice,
    Object => Object,
    Fsdev => FsDevice,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_kind_from_yaml_tag() {
        let yaml = "kind: serial\ndriver: virtio-serial-pci\nid: serial0\n";
        let dev: Device = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(dev.kind(), "serial");
        assert!(dev.valid());
    }

    #[test]
    fn test_enum_dispatch_matches_inner() {
        let dev: Device = SerialDevice::new(driver::VIRTIO_SERIAL, "serial0").into();
        let mut files = ExtraFiles::new();
        assert_eq!(
            dev.qemu_params(&mut files),
            vec!["-device", "virtio-serial-pci,id=serial0"]
        );
        assert!(files.is_empty());
    }
}
