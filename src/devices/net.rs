//! Guest network device backed by a tap or macvtap `-netdev`

use std::os::fd::OwnedFd;

use serde::{Deserialize, Serialize};

use super::{driver, QemuDevice};
use crate::vmm::args::{ExtraFiles, Props};

/// Host side of the network device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetDeviceType {
    Tap,
    Macvtap,
}

impl NetDeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetDeviceType::Tap => "tap",
            NetDeviceType::Macvtap => "macvtap",
        }
    }
}

/// A guest network device.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetDevice {
    /// Netdev type; unset makes the device invalid
    #[serde(rename = "type")]
    pub net_type: Option<NetDeviceType>,
    /// QEMU device driver (e.g. `virtio-net-pci`)
    pub driver: String,
    /// Netdev identifier
    pub id: String,
    /// Host interface name
    pub ifname: String,
    /// PCI bus path (virtio-net-pci only)
    pub bus: String,
    /// PCI slot, decimal (virtio-net-pci only)
    pub addr: String,
    pub script: String,
    pub down_script: String,
    /// Already opened tap queues, handed to QEMU as `fds=`
    #[serde(skip)]
    pub fds: Vec<OwnedFd>,
    /// In-kernel virtio emulation
    pub vhost: bool,
    pub mac_address: String,
}

impl NetDevice {
    pub fn new(
        net_type: NetDeviceType,
        driver: impl Into<String>,
        id: impl Into<String>,
        ifname: impl Into<String>,
    ) -> Self {
        Self {
            net_type: Some(net_type),
            driver: driver.into(),
            id: id.into(),
            ifname: ifname.into(),
            ..Default::default()
        }
    }

    pub fn mac_address(mut self, mac: impl Into<String>) -> Self {
        self.mac_address = mac.into();
        self
    }

    pub fn vhost(mut self, enable: bool) -> Self {
        self.vhost = enable;
        self
    }

    /// Hand an already opened descriptor (e.g. a tap queue) to QEMU.
    pub fn fd(mut self, fd: impl Into<OwnedFd>) -> Self {
        self.fds.push(fd.into());
        self
    }

    /// PCI slot rendered as lowercase hex, or None if unset or unparsable.
    fn pci_addr(&self) -> Option<String> {
        self.addr.trim().parse::<u32>().ok().map(|a| format!("{a:x}"))
    }
}

impl QemuDevice for NetDevice {
    fn valid(&self) -> bool {
        !self.driver.is_empty()
            && !self.id.is_empty()
            && !self.ifname.is_empty()
            && self.net_type.is_some()
    }

    fn qemu_params<'a>(&'a self, files: &mut ExtraFiles<'a>) -> Vec<String> {
        let mut device = Props::new(&self.driver);
        device.push("netdev", &self.id);
        device.push_nonempty("mac", &self.mac_address);

        if self.driver == driver::VIRTIO_NET_PCI {
            device.push_nonempty("bus", &self.bus);
            if let Some(addr) = self.pci_addr() {
                device.push("addr", addr);
            }
        }

        let net_type = self.net_type.map(|t| t.as_str()).unwrap_or_default();
        let mut netdev = Props::new(net_type);
        netdev.push("id", &self.id);
        netdev.push("ifname", &self.ifname);
        netdev.push_nonempty("downscript", &self.down_script);
        netdev.push_nonempty("script", &self.script);

        if !self.fds.is_empty() {
            let numbers = files.append(&self.fds);
            let joined = numbers
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(":");
            netdev.push("fds", joined);
        }

        if self.vhost {
            netdev.push("vhost", "on");
        }

        vec![
            "-device".into(),
            device.into_string(),
            "-netdev".into(),
            netdev.into_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn tap() -> NetDevice {
        NetDevice::new(NetDeviceType::Tap, driver::VIRTIO_NET, "net0", "tap0")
    }

    #[test]
    fn test_tap_params() {
        let dev = tap().mac_address("01:02:de:ad:be:ef").vhost(true);
        assert!(dev.valid());

        let mut files = ExtraFiles::new();
        assert_eq!(
            dev.qemu_params(&mut files),
            vec![
                "-device",
                "virtio-net,netdev=net0,mac=01:02:de:ad:be:ef",
                "-netdev",
                "tap,id=net0,ifname=tap0,vhost=on",
            ]
        );
    }

    #[test]
    fn test_pci_bus_and_hex_addr() {
        let mut dev = NetDevice::new(NetDeviceType::Tap, driver::VIRTIO_NET_PCI, "net0", "tap0");
        dev.bus = "pci.0".into();
        dev.addr = "255".into();
        dev.script = "/etc/qemu-ifup".into();
        dev.down_script = "/etc/qemu-ifdown".into();

        let mut files = ExtraFiles::new();
        assert_eq!(
            dev.qemu_params(&mut files),
            vec![
                "-device",
                "virtio-net-pci,netdev=net0,bus=pci.0,addr=ff",
                "-netdev",
                "tap,id=net0,ifname=tap0,downscript=/etc/qemu-ifdown,script=/etc/qemu-ifup",
            ]
        );
    }

    #[test]
    fn test_bus_ignored_for_non_pci_driver() {
        let mut dev = tap();
        dev.bus = "pci.0".into();
        dev.addr = "not-a-number".into();

        let mut files = ExtraFiles::new();
        let params = dev.qemu_params(&mut files);
        assert_eq!(params[1], "virtio-net,netdev=net0");
    }

    #[test]
    fn test_fds_registered_in_order() {
        let dev = tap()
            .fd(File::open("/dev/null").unwrap())
            .fd(File::open("/dev/null").unwrap());

        let mut files = ExtraFiles::new();
        let params = dev.qemu_params(&mut files);
        assert_eq!(params[3], "tap,id=net0,ifname=tap0,fds=3:4");
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_validation() {
        assert!(!NetDevice::default().valid());
        assert!(!NetDevice::new(NetDeviceType::Macvtap, driver::VIRTIO_NET, "", "tap0").valid());
        assert!(!NetDevice::new(NetDeviceType::Macvtap, driver::VIRTIO_NET, "net0", "").valid());

        let mut untyped = tap();
        untyped.net_type = None;
        assert!(!untyped.valid());

        assert!(NetDevice::new(NetDeviceType::Macvtap, driver::VIRTIO_NET, "net0", "mv0").valid());
    }
}
