//! 9p filesystem share (`-fsdev`)

use serde::{Deserialize, Serialize};

use super::QemuDevice;
use crate::vmm::args::{ExtraFiles, Props};

/// Filesystem driver backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsDriver {
    #[default]
    Local,
    Handle,
    Proxy,
}

impl FsDriver {
    pub fn as_str(&self) -> &'static str {
        match self {
            FsDriver::Local => "local",
            FsDriver::Handle => "handle",
            FsDriver::Proxy => "proxy",
        }
    }
}

/// How guest file attributes map onto the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityModel {
    /// Like passthrough, without failure reports
    None,
    /// Same credentials on host and guest
    Passthrough,
    /// Attributes stored as extended attributes
    MappedXattr,
    /// Attributes stored in a `.virtfs` directory
    MappedFile,
}

impl SecurityModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityModel::None => "none",
            SecurityModel::Passthrough => "passthrough",
            SecurityModel::MappedXattr => "mapped-xattr",
            SecurityModel::MappedFile => "mapped-file",
        }
    }
}

/// A host directory shared with the guest over 9p.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsDevice {
    /// QEMU device driver (e.g. `virtio-9p-pci`)
    pub driver: String,
    pub fs_driver: FsDriver,
    pub id: String,
    /// Host root of the share
    pub path: String,
    pub mount_tag: String,
    pub security_model: Option<SecurityModel>,
}

impl FsDevice {
    pub fn new(
        driver: impl Into<String>,
        id: impl Into<String>,
        path: impl Into<String>,
        mount_tag: impl Into<String>,
    ) -> Self {
        Self {
            driver: driver.into(),
            id: id.into(),
            path: path.into(),
            mount_tag: mount_tag.into(),
            ..Default::default()
        }
    }

    pub fn security_model(mut self, model: SecurityModel) -> Self {
        self.security_model = Some(model);
        self
    }
}

impl QemuDevice for FsDevice {
    fn valid(&self) -> bool {
        !self.driver.is_empty()
            && !self.id.is_empty()
            && !self.path.is_empty()
            && !self.mount_tag.is_empty()
    }

    fn qemu_params<'a>(&'a self, _files: &mut ExtraFiles<'a>) -> Vec<String> {
        let mut device = Props::new(&self.driver);
        device.push("fsdev", &self.id);
        device.push("mount_tag", &self.mount_tag);

        let mut fsdev = Props::new(self.fs_driver.as_str());
        fsdev.push("id", &self.id);
        fsdev.push("path", &self.path);
        if let Some(model) = self.security_model {
            fsdev.push("security_model", model.as_str());
        }

        vec![
            "-device".into(),
            device.into_string(),
            "-fsdev".into(),
            fsdev.into_string(),
        ]
    }
}
