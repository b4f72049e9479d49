//! Compile a [`Config`] into a QEMU argument vector
//!
//! Sections are emitted in a fixed order: name, UUID, machine, CPU model,
//! QMP sockets, memory, SMP, devices, RTC, `-global`, VGA, knobs, kernel.
//! Every section is a no-op when its fields are unset, and invalid
//! sockets/devices are skipped rather than failing the compilation.

use std::fmt::Display;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};

use tracing::debug;

use super::config::{Config, Rtc};
use crate::devices::QemuDevice;

/// First descriptor number the child sees for extra files.
///
/// 0, 1 and 2 belong to the standard streams.
pub const EXTRA_FD_BASE: RawFd = 3;

/// Comma separated property list, rendered as `head,key=value,...`.
///
/// With an empty head the first pair is emitted without a leading comma.
#[derive(Debug, Default, Clone)]
pub(crate) struct Props(String);

impl Props {
    pub(crate) fn new(head: impl Into<String>) -> Self {
        Self(head.into())
    }

    fn sep(&mut self) {
        if !self.0.is_empty() {
            self.0.push(',');
        }
    }

    pub(crate) fn push(&mut self, key: &str, value: impl Display) -> &mut Self {
        self.sep();
        self.0.push_str(key);
        self.0.push('=');
        self.0.push_str(&value.to_string());
        self
    }

    /// Like `push`, but omits the property entirely when `value` is empty.
    pub(crate) fn push_nonempty(&mut self, key: &str, value: &str) -> &mut Self {
        if !value.is_empty() {
            self.push(key, value);
        }
        self
    }

    /// Bare word such as `server`.
    pub(crate) fn flag(&mut self, word: &str) -> &mut Self {
        self.sep();
        self.0.push_str(word);
        self
    }

    pub(crate) fn into_string(self) -> String {
        self.0
    }
}

/// Descriptors to hand to the hypervisor, in registration order.
///
/// Entry `i` becomes descriptor `EXTRA_FD_BASE + i` in the child.
#[derive(Debug, Default)]
pub struct ExtraFiles<'a> {
    fds: Vec<BorrowedFd<'a>>,
}

impl<'a> ExtraFiles<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `fds` and return the numbers the child process will see.
    pub fn append(&mut self, fds: &'a [OwnedFd]) -> Vec<RawFd> {
        let base = EXTRA_FD_BASE + self.fds.len() as RawFd;
        self.fds.extend(fds.iter().map(|fd| fd.as_fd()));
        (0..fds.len() as RawFd).map(|i| base + i).collect()
    }

    pub fn len(&self) -> usize {
        self.fds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    pub fn as_slice(&self) -> &[BorrowedFd<'a>] {
        &self.fds
    }

    /// Descriptor numbers in this process, in registration order.
    pub fn raw_fds(&self) -> Vec<RawFd> {
        self.fds.iter().map(|fd| fd.as_raw_fd()).collect()
    }
}

/// A compiled invocation: arguments plus the files they reference.
#[derive(Debug)]
pub struct QemuCommand<'a> {
    pub args: Vec<String>,
    pub files: ExtraFiles<'a>,
}

impl Config {
    /// Compile this configuration into QEMU arguments.
    ///
    /// The configuration is not modified, so compiling twice yields the
    /// same arguments and the same descriptor numbering.
    pub fn compile(&self) -> QemuCommand<'_> {
        let mut params = Vec::new();
        let mut files = ExtraFiles::new();

        self.append_name(&mut params);
        self.append_uuid(&mut params);
        self.append_machine(&mut params);
        self.append_cpu_model(&mut params);
        self.append_qmp_sockets(&mut params);
        self.append_memory(&mut params);
        self.append_cpus(&mut params);
        self.append_devices(&mut params, &mut files);
        self.append_rtc(&mut params);
        self.append_global_param(&mut params);
        self.append_vga(&mut params);
        self.append_knobs(&mut params);
        self.append_kernel(&mut params);

        QemuCommand {
            args: params,
            files,
        }
    }

    fn append_name(&self, params: &mut Vec<String>) {
        if !self.name.is_empty() {
            params.push("-name".into());
            params.push(self.name.clone());
        }
    }

    fn append_uuid(&self, params: &mut Vec<String>) {
        if let Some(uuid) = self.uuid {
            params.push("-uuid".into());
            params.push(uuid.hyphenated().to_string());
        }
    }

    fn append_machine(&self, params: &mut Vec<String>) {
        if self.machine.machine_type.is_empty() {
            return;
        }

        let mut machine = Props::new(&self.machine.machine_type);
        machine.push_nonempty("accel", &self.machine.acceleration);

        params.push("-machine".into());
        params.push(machine.into_string());
    }

    fn append_cpu_model(&self, params: &mut Vec<String>) {
        if !self.cpu_model.is_empty() {
            params.push("-cpu".into());
            params.push(self.cpu_model.clone());
        }
    }

    fn append_qmp_sockets(&self, params: &mut Vec<String>) {
        for (i, socket) in self.qmp_sockets.iter().enumerate() {
            let Some(socket_type) = socket.socket_type.filter(|_| socket.valid()) else {
                debug!("skipping invalid QMP socket #{}", i);
                continue;
            };

            let mut qmp = Props::new(format!("{}:{}", socket_type.as_str(), socket.name));
            if socket.server {
                qmp.flag("server");
                if socket.no_wait {
                    qmp.flag("nowait");
                }
            }

            params.push("-qmp".into());
            params.push(qmp.into_string());
        }
    }

    fn append_memory(&self, params: &mut Vec<String>) {
        if self.memory.size.is_empty() {
            return;
        }

        let mut memory = Props::new(&self.memory.size);
        if self.memory.slots > 0 {
            memory.push("slots", self.memory.slots);
        }
        memory.push_nonempty("maxmem", &self.memory.max_mem);

        params.push("-m".into());
        params.push(memory.into_string());
    }

    fn append_cpus(&self, params: &mut Vec<String>) {
        if self.smp.cpus == 0 {
            return;
        }

        let mut smp = Props::new(self.smp.cpus.to_string());
        if self.smp.cores > 0 {
            smp.push("cores", self.smp.cores);
        }
        if self.smp.threads > 0 {
            smp.push("threads", self.smp.threads);
        }
        if self.smp.sockets > 0 {
            smp.push("sockets", self.smp.sockets);
        }

        params.push("-smp".into());
        params.push(smp.into_string());
    }

    fn append_devices<'a>(&'a self, params: &mut Vec<String>, files: &mut ExtraFiles<'a>) {
        for (i, device) in self.devices.iter().enumerate() {
            if !device.valid() {
                debug!("skipping invalid {} device #{}", device.kind(), i);
                continue;
            }
            params.extend(device.qemu_params(files));
        }
    }

    fn append_rtc(&self, params: &mut Vec<String>) {
        if !self.rtc.valid() || self.rtc.is_empty() {
            return;
        }

        // base always leads the group; QEMU's own default is utc
        let base = match self.rtc.base.as_str() {
            "" => Rtc::BASE_UTC,
            base => base,
        };

        let mut rtc = Props::default();
        rtc.push("base", base);
        rtc.push_nonempty("driftfix", &self.rtc.drift_fix);
        rtc.push_nonempty("clock", &self.rtc.clock);

        params.push("-rtc".into());
        params.push(rtc.into_string());
    }

    fn append_global_param(&self, params: &mut Vec<String>) {
        if !self.global_param.is_empty() {
            params.push("-global".into());
            params.push(self.global_param.clone());
        }
    }

    fn append_vga(&self, params: &mut Vec<String>) {
        if !self.vga.is_empty() {
            params.push("-vga".into());
            params.push(self.vga.clone());
        }
    }

    fn append_knobs(&self, params: &mut Vec<String>) {
        if self.knobs.no_user_config {
            params.push("-no-user-config".into());
        }
        if self.knobs.no_defaults {
            params.push("-nodefaults".into());
        }
        if self.knobs.no_graphic {
            params.push("-nographic".into());
        }
        if self.knobs.daemonize {
            params.push("-daemonize".into());
        }
    }

    fn append_kernel(&self, params: &mut Vec<String>) {
        if self.kernel.path.is_empty() {
            return;
        }

        params.push("-kernel".into());
        params.push(self.kernel.path.clone());

        if !self.kernel.params.is_empty() {
            params.push("-append".into());
            params.push(self.kernel.params.clone());
        }
    }
}
