//! virtio block device backed by a `-drive`

use serde::{Deserialize, Serialize};

use super::QemuDevice;
use crate::vmm::args::{ExtraFiles, Props};

/// Interface the drive is connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockDeviceInterface {
    /// No interface; the drive is attached through `-device`.
    None,
    Scsi,
}

impl BlockDeviceInterface {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockDeviceInterface::None => "none",
            BlockDeviceInterface::Scsi => "scsi",
        }
    }
}

/// Asynchronous I/O implementation used by the drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockDeviceAio {
    /// pthread based
    Threads,
    /// Linux native AIO
    Native,
}

impl BlockDeviceAio {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockDeviceAio::Threads => "threads",
            BlockDeviceAio::Native => "native",
        }
    }
}

/// Image format of the backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockDeviceFormat {
    Qcow2,
    Raw,
}

impl BlockDeviceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockDeviceFormat::Qcow2 => "qcow2",
            BlockDeviceFormat::Raw => "raw",
        }
    }
}

/// A block device and its backing drive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockDevice {
    /// QEMU device driver (e.g. `virtio-blk`)
    pub driver: String,
    /// Drive identifier
    pub id: String,
    /// Backing file path on the host
    pub file: String,
    pub interface: Option<BlockDeviceInterface>,
    pub aio: Option<BlockDeviceAio>,
    pub format: Option<BlockDeviceFormat>,
    /// Leave SCSI passthrough enabled (emits `scsi=off` when false)
    pub scsi: bool,
    /// Leave the write cache enable bit configurable (emits `config-wce=off` when false)
    pub wce: bool,
}

impl BlockDevice {
    pub fn new(
        driver: impl Into<String>,
        id: impl Into<String>,
        file: impl Into<String>,
    ) -> Self {
        Self {
            driver: driver.into(),
            id: id.into(),
            file: file.into(),
            ..Default::default()
        }
    }

    pub fn interface(mut self, interface: BlockDeviceInterface) -> Self {
        self.interface = Some(interface);
        self
    }

    pub fn aio(mut self, aio: BlockDeviceAio) -> Self {
        self.aio = Some(aio);
        self
    }

    pub fn format(mut self, format: BlockDeviceFormat) -> Self {
        self.format = Some(format);
        self
    }
}

impl QemuDevice for BlockDevice {
    fn valid(&self) -> bool {
        !self.driver.is_empty() && !self.id.is_empty() && !self.file.is_empty()
    }

    fn qemu_params<'a>(&'a self, _files: &mut ExtraFiles<'a>) -> Vec<String> {
        let mut device = Props::new(&self.driver);
        device.push("drive", &self.id);
        if !self.scsi {
            device.push("scsi", "off");
        }
        if !self.wce {
            device.push("config-wce", "off");
        }

        let mut drive = Props::default();
        drive.push("id", &self.id);
        drive.push("file", &self.file);
        if let Some(aio) = self.aio {
            drive.push("aio", aio.as_str());
        }
        if let Some(format) = self.format {
            drive.push("format", format.as_str());
        }
        if let Some(interface) = self.interface {
            drive.push("if", interface.as_str());
        }

        vec![
            "-device".into(),
            device.into_string(),
            "-drive".into(),
            drive.into_string(),
        ]
    }
}
