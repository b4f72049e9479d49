//! Memory backend objects (`-object`) and the device that consumes them

use serde::{Deserialize, Serialize};

use super::QemuDevice;
use crate::vmm::args::{ExtraFiles, Props};

/// QEMU object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectType {
    /// Guest memory mapped from a host file
    MemoryBackendFile,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::MemoryBackendFile => "memory-backend-file",
        }
    }
}

/// A memory backed object plus the device exposing it (e.g. an NVDIMM).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Object {
    pub driver: String,
    #[serde(rename = "type")]
    pub object_type: Option<ObjectType>,
    /// Object identifier, referenced by the device as `memdev`
    pub id: String,
    pub device_id: String,
    pub mem_path: String,
    /// Size in bytes
    pub size: u64,
}

impl Object {
    pub fn memory_backend_file(
        driver: impl Into<String>,
        id: impl Into<String>,
        device_id: impl Into<String>,
        mem_path: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            driver: driver.into(),
            object_type: Some(ObjectType::MemoryBackendFile),
            id: id.into(),
            device_id: device_id.into(),
            mem_path: mem_path.into(),
            size,
        }
    }
}

impl QemuDevice for Object {
    fn valid(&self) -> bool {
        match self.object_type {
            Some(ObjectType::MemoryBackendFile) => {
                !self.driver.is_empty()
                    && !self.id.is_empty()
                    && !self.mem_path.is_empty()
                    && self.size > 0
            }
            None => false,
        }
    }

    fn qemu_params<'a>(&'a self, _files: &mut ExtraFiles<'a>) -> Vec<String> {
        let mut device = Props::new(&self.driver);
        device.push_nonempty("id", &self.device_id);

        let object = match self.object_type {
            Some(ObjectType::MemoryBackendFile) => {
                let mut object = Props::new(ObjectType::MemoryBackendFile.as_str());
                object.push("id", &self.id);
                object.push("mem-path", &self.mem_path);
                object.push("size", self.size);

                device.push("memdev", &self.id);
                object
            }
            None => Props::default(),
        };

        vec![
            "-device".into(),
            device.into_string(),
            "-object".into(),
            object.into_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::driver;

    #[test]
    fn test_nvdimm_params() {
        let obj = Object::memory_backend_file(
            driver::NVDIMM,
            "mem0",
            "nv0",
            "/root/image.img",
            1 << 30,
        );
        assert!(obj.valid());

        let mut files = ExtraFiles::new();
        assert_eq!(
            obj.qemu_params(&mut files),
            vec![
                "-device",
                "nvdimm,id=nv0,memdev=mem0",
                "-object",
                "memory-backend-file,id=mem0,mem-path=/root/image.img,size=1073741824",
            ]
        );
    }

    #[test]
    fn test_object_validation() {
        assert!(!Object::default().valid());

        let zero = Object::memory_backend_file(driver::NVDIMM, "mem0", "nv0", "/img", 0);
        assert!(!zero.valid());

        let mut untyped = Object::memory_backend_file(driver::NVDIMM, "mem0", "nv0", "/img", 4096);
        untyped.object_type = None;
        assert!(!untyped.valid());

        let no_path = Object::memory_backend_file(driver::NVDIMM, "mem0", "nv0", "", 4096);
        assert!(!no_path.valid());
    }
}
