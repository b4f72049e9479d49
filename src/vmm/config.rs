//! Machine description compiled into a QEMU command line

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::devices::{Device, QemuDevice};
use crate::{Error, Result};

/// Machine type and accelerators, rendered as `-machine TYPE,accel=ACCEL`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Machine {
    #[serde(rename = "type")]
    pub machine_type: String,
    pub acceleration: String,
}

impl Machine {
    pub fn new(machine_type: impl Into<String>, acceleration: impl Into<String>) -> Self {
        Self {
            machine_type: machine_type.into(),
            acceleration: acceleration.into(),
        }
    }
}

/// Transport of a QMP control socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QmpSocketType {
    Unix,
}

impl QmpSocketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QmpSocketType::Unix => "unix",
        }
    }
}

/// A QMP control socket exposed by the hypervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QmpSocket {
    #[serde(rename = "type")]
    pub socket_type: Option<QmpSocketType>,
    pub name: String,
    /// Listen instead of connecting
    pub server: bool,
    /// Do not block startup waiting for a client (only with `server`)
    pub no_wait: bool,
}

impl QmpSocket {
    /// Unix domain socket at `name`.
    pub fn unix(name: impl Into<String>, server: bool, no_wait: bool) -> Self {
        Self {
            socket_type: Some(QmpSocketType::Unix),
            name: name.into(),
            server,
            no_wait,
        }
    }

    pub fn valid(&self) -> bool {
        self.socket_type.is_some() && !self.name.is_empty()
    }
}

/// Real time clock settings.
///
/// Fields are free-form so a description can be loaded as-is; `clock` and
/// `drift_fix` are checked against the values QEMU accepts and an
/// unknown value drops the whole `-rtc` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rtc {
    pub base: String,
    pub clock: String,
    pub drift_fix: String,
}

impl Rtc {
    pub const BASE_UTC: &'static str = "utc";
    pub const BASE_LOCALTIME: &'static str = "localtime";

    pub const CLOCK_HOST: &'static str = "host";
    pub const CLOCK_VM: &'static str = "vm";

    pub const DRIFT_FIX_SLEW: &'static str = "slew";
    pub const DRIFT_FIX_NONE: &'static str = "none";

    pub fn valid(&self) -> bool {
        let clock_ok = self.clock.is_empty()
            || self.clock == Self::CLOCK_HOST
            || self.clock == Self::CLOCK_VM;
        let drift_ok = self.drift_fix.is_empty()
            || self.drift_fix == Self::DRIFT_FIX_SLEW
            || self.drift_fix == Self::DRIFT_FIX_NONE;
        clock_ok && drift_ok
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.clock.is_empty() && self.drift_fix.is_empty()
    }
}

/// Guest memory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Memory {
    /// Amount of memory, suffixed with M or G (e.g. `2G`)
    pub size: String,
    /// Hotplug slots
    pub slots: u8,
    /// Upper bound reachable through hotplug
    pub max_mem: String,
}

/// Guest CPU topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Smp {
    pub cpus: u32,
    pub cores: u32,
    pub threads: u32,
    pub sockets: u32,
}

/// Direct kernel boot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Kernel {
    /// Kernel image on the host
    pub path: String,
    /// Kernel command line
    pub params: String,
}

impl Kernel {
    pub fn new(path: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: params.into(),
        }
    }
}

/// Boolean QEMU switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Knobs {
    /// `-no-user-config`
    pub no_user_config: bool,
    /// `-nodefaults`
    pub no_defaults: bool,
    /// `-nographic`
    pub no_graphic: bool,
    /// `-daemonize`
    pub daemonize: bool,
}

/// Everything needed to start one QEMU guest.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// QEMU binary; `None` means [`DEFAULT_QEMU_BINARY`](super::launch::DEFAULT_QEMU_BINARY) from `PATH`
    pub path: Option<PathBuf>,
    pub name: String,
    pub uuid: Option<Uuid>,
    pub cpu_model: String,
    pub machine: Machine,
    pub qmp_sockets: Vec<QmpSocket>,
    /// Devices, compiled in list order
    pub devices: Vec<Device>,
    pub rtc: Rtc,
    pub vga: String,
    pub kernel: Kernel,
    pub memory: Memory,
    pub smp: Smp,
    /// Value of a single `-global` option
    pub global_param: String,
    pub knobs: Knobs,
}

impl Config {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the QEMU binary path
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the guest name
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn cpu_model<S: Into<String>>(mut self, model: S) -> Self {
        self.cpu_model = model.into();
        self
    }

    pub fn machine(mut self, machine: Machine) -> Self {
        self.machine = machine;
        self
    }

    /// Append a QMP socket
    pub fn qmp_socket(mut self, socket: QmpSocket) -> Self {
        self.qmp_sockets.push(socket);
        self
    }

    /// Append a device
    pub fn device<D: Into<Device>>(mut self, device: D) -> Self {
        self.devices.push(device.into());
        self
    }

    pub fn rtc(mut self, rtc: Rtc) -> Self {
        self.rtc = rtc;
        self
    }

    pub fn vga<S: Into<String>>(mut self, vga: S) -> Self {
        self.vga = vga.into();
        self
    }

    pub fn kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn memory(mut self, memory: Memory) -> Self {
        self.memory = memory;
        self
    }

    pub fn smp(mut self, smp: Smp) -> Self {
        self.smp = smp;
        self
    }

    pub fn global_param<S: Into<String>>(mut self, param: S) -> Self {
        self.global_param = param.into();
        self
    }

    pub fn knobs(mut self, knobs: Knobs) -> Self {
        self.knobs = knobs;
        self
    }

    /// Strict pre-flight check.
    ///
    /// Reports every invalid QMP socket, device and RTC setting at once.
    /// [`Config::compile`] is unaffected and keeps skipping them.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        for (i, socket) in self.qmp_sockets.iter().enumerate() {
            if !socket.valid() {
                problems.push(format!("qmp socket #{} ({:?}) is incomplete", i, socket.name));
            }
        }

        for (i, device) in self.devices.iter().enumerate() {
            if !device.valid() {
                problems.push(format!(
                    "{} device #{} is missing required fields",
                    device.kind(),
                    i
                ));
            }
        }

        if !self.rtc.valid() {
            problems.push(format!(
                "rtc clock {:?} / driftfix {:?} not supported",
                self.rtc.clock, self.rtc.drift_fix
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfig(problems))
        }
    }
}

/// Load a machine description from a JSON or YAML file.
///
/// `.yaml` / `.yml` files are parsed as YAML, everything else as JSON.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    let config: Config = if is_yaml {
        serde_yaml::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid YAML config {}: {}", path.display(), e)))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid JSON config {}: {}", path.display(), e)))?
    };

    Ok(config)
}
