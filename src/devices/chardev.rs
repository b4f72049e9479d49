//! Character devices (consoles, serial ports, sockets)

use serde::{Deserialize, Serialize};

use super::QemuDevice;
use crate::vmm::args::{ExtraFiles, Props};

/// Host side of a character device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharDeviceBackend {
    /// Two way connection to the guest
    Pipe,
    /// Stream socket (TCP or unix)
    Socket,
    /// Guest traffic to QEMU's standard output
    Console,
    /// Host serial device
    Serial,
    /// Alias for `Serial`
    Tty,
    /// New pseudo-terminal on the host
    Pty,
}

impl CharDeviceBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CharDeviceBackend::Pipe => "pipe",
            CharDeviceBackend::Socket => "socket",
            CharDeviceBackend::Console => "console",
            CharDeviceBackend::Serial => "serial",
            CharDeviceBackend::Tty => "tty",
            CharDeviceBackend::Pty => "pty",
        }
    }
}

/// A character device attached to a serial bus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharDevice {
    pub backend: Option<CharDeviceBackend>,
    /// QEMU device driver (e.g. `virtconsole`)
    pub driver: String,
    /// Serial bus the port sits on
    pub bus: String,
    /// Identifier of the `-device` half
    pub device_id: String,
    /// Identifier of the `-chardev` half
    pub id: String,
    pub path: String,
    /// Port name visible to the guest
    pub name: String,
}

impl CharDevice {
    pub fn new(
        backend: CharDeviceBackend,
        driver: impl Into<String>,
        id: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            backend: Some(backend),
            driver: driver.into(),
            id: id.into(),
            path: path.into(),
            ..Default::default()
        }
    }
}

impl QemuDevice for CharDevice {
    fn valid(&self) -> bool {
        self.backend.is_some()
            && !self.driver.is_empty()
            && !self.id.is_empty()
            && !self.path.is_empty()
    }

    fn qemu_params<'a>(&'a self, _files: &mut ExtraFiles<'a>) -> Vec<String> {
        let mut device = Props::new(&self.driver);
        device.push_nonempty("bus", &self.bus);
        device.push("chardev", &self.id);
        device.push_nonempty("id", &self.device_id);
        device.push_nonempty("name", &self.name);

        let backend = self.backend.map(|b| b.as_str()).unwrap_or_default();
        let mut chardev = Props::new(backend);
        chardev.push("id", &self.id);
        chardev.push("path", &self.path);
        if self.backend == Some(CharDeviceBackend::Socket) {
            chardev.flag("server");
            chardev.flag("nowait");
        }

        vec![
            "-device".into(),
            device.into_string(),
            "-chardev".into(),
            chardev.into_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::driver;

    #[test]
    fn test_console_params() {
        let mut dev = CharDevice::new(
            CharDeviceBackend::Serial,
            driver::CONSOLE,
            "char0",
            "/tmp/char.log",
        );
        dev.bus = "serial0.0".into();
        dev.device_id = "console0".into();

        let mut files = ExtraFiles::new();
        assert_eq!(
            dev.qemu_params(&mut files),
            vec![
                "-device",
                "virtconsole,bus=serial0.0,chardev=char0,id=console0",
                "-chardev",
                "serial,id=char0,path=/tmp/char.log",
            ]
        );
    }

    #[test]
    fn test_socket_is_server_nowait() {
        let mut dev = CharDevice::new(
            CharDeviceBackend::Socket,
            driver::VIRTIO_SERIAL_PORT,
            "charch0",
            "/tmp/agent.sock",
        );
        dev.device_id = "channel0".into();
        dev.name = "org.example.agent.0".into();

        let mut files = ExtraFiles::new();
        assert_eq!(
            dev.qemu_params(&mut files),
            vec![
                "-device",
                "virtserialport,chardev=charch0,id=channel0,name=org.example.agent.0",
                "-chardev",
                "socket,id=charch0,path=/tmp/agent.sock,server,nowait",
            ]
        );
    }

    #[test]
    fn test_validation() {
        assert!(!CharDevice::default().valid());
        assert!(!CharDevice::new(CharDeviceBackend::Pty, driver::CONSOLE, "", "/dev/pts/3").valid());
        assert!(!CharDevice::new(CharDeviceBackend::Pty, driver::CONSOLE, "char0", "").valid());
        assert!(CharDevice::new(CharDeviceBackend::Pty, driver::CONSOLE, "char0", "/dev/pts/3").valid());
    }
}
