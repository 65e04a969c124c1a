/// Host container
///
/// Reference [`Container`] on the local host. The jail is a directory; a jail
/// location maps to the same path under that directory and processes address
/// files by their host paths. Isolation is limited to rlimits, a dedicated
/// process group and an optional identity switch. A polling supervisor
/// enforces the wall clock, peak RSS and process count limits.
use crate::config::loader::JudgeConfig;
use crate::config::types::{
    AccessMode, JudgeError, OwnerId, ResourceLimits, Result,
};
use crate::core::container::{jail_path, Container, JailFilesystem, ProcessGroup};
use crate::core::types::{
    LimitViolations, ProcessGroupResult, ProcessId, ProcessResult, ProcessSpec, ResourceUsage,
    StreamTarget,
};
use crate::sandbox::rlimits;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{chown, getegid, geteuid, Gid, Pid, Uid};
use std::fs::{File, OpenOptions, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct HostContainer {
    root: PathBuf,
    strict_mode: bool,
    privileged: bool,
}

impl HostContainer {
    pub fn new(root: impl Into<PathBuf>, strict_mode: bool) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| JudgeError::file_io(&root, e))?;
        let privileged = geteuid().is_root();
        if !privileged {
            log::warn!(
                "Host container at {} runs without root: owner changes and identity switches are unavailable",
                root.display()
            );
        }
        Ok(Self {
            root,
            strict_mode,
            privileged,
        })
    }

    pub fn from_config(config: &JudgeConfig) -> Result<Self> {
        Self::new(config.session_root(), config.strict_mode)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host mode for a requested mode.
    ///
    /// Directories get the search bit wherever they get the read bit. Without
    /// root the judge and the solution share one identity, which then keeps
    /// full access to directories and read/write access to files.
    fn host_mode(&self, mode: u32, is_dir: bool) -> u32 {
        let mut mode = mode;
        if is_dir {
            mode |= (mode & 0o444) >> 2;
        }
        if !self.privileged {
            mode |= if is_dir { 0o700 } else { 0o600 };
        }
        mode
    }

    fn degrade(&self, message: String) -> Result<()> {
        if self.strict_mode {
            Err(JudgeError::Sandbox(message))
        } else {
            log::warn!("{} (permissive mode)", message);
            Ok(())
        }
    }
}

impl JailFilesystem for HostContainer {
    fn keep_in_root(&self, location: &Path) -> PathBuf {
        jail_path(&self.root, location)
    }

    fn process_path(&self, location: &Path) -> PathBuf {
        self.keep_in_root(location)
    }

    fn set_owner_id(&self, location: &Path, owner_id: OwnerId) -> Result<()> {
        let path = self.keep_in_root(location);
        if !self.privileged && is_current_identity(owner_id) {
            return Ok(());
        }
        match chown(
            &path,
            Some(Uid::from_raw(owner_id.uid)),
            Some(Gid::from_raw(owner_id.gid)),
        ) {
            Ok(()) => Ok(()),
            Err(e) => self.degrade(format!(
                "Failed to chown {} to {}: {}",
                path.display(),
                owner_id,
                e
            )),
        }
    }

    fn set_mode(&self, location: &Path, mode: u32) -> Result<()> {
        let path = self.keep_in_root(location);
        let metadata = std::fs::metadata(&path).map_err(|e| JudgeError::file_io(&path, e))?;
        let mode = self.host_mode(mode, metadata.is_dir());
        std::fs::set_permissions(&path, Permissions::from_mode(mode))
            .map_err(|e| JudgeError::file_io(&path, e))
    }
}

impl Container for HostContainer {
    fn create_process_group(&mut self) -> Result<Box<dyn ProcessGroup>> {
        Ok(Box::new(HostProcessGroup {
            root: self.root.clone(),
            strict_mode: self.strict_mode,
            privileged: self.privileged,
            real_time_limit: None,
            specs: Vec::new(),
            results: None,
        }))
    }

    fn filesystem(&self) -> &dyn JailFilesystem {
        self
    }
}

fn is_current_identity(owner_id: OwnerId) -> bool {
    geteuid().as_raw() == owner_id.uid && getegid().as_raw() == owner_id.gid
}

/// Processes spawned into one POSIX process group
pub struct HostProcessGroup {
    root: PathBuf,
    strict_mode: bool,
    privileged: bool,
    real_time_limit: Option<Duration>,
    specs: Vec<ProcessSpec>,
    results: Option<Vec<ProcessResult>>,
}

impl HostProcessGroup {
    fn stdio(&self, target: &StreamTarget) -> Result<Stdio> {
        let StreamTarget::File { location, mode } = target else {
            return Ok(Stdio::null());
        };
        let path = jail_path(&self.root, location);
        let file = match mode {
            AccessMode::ReadOnly => File::open(&path),
            AccessMode::WriteOnly => OpenOptions::new().write(true).truncate(true).open(&path),
        }
        .map_err(|e| JudgeError::file_io(&path, e))?;
        Ok(Stdio::from(file))
    }

    /// Identity to switch to in the child, if any
    fn identity_for(&self, owner_id: Option<OwnerId>) -> Result<Option<OwnerId>> {
        let Some(owner_id) = owner_id else {
            return Ok(None);
        };
        if self.privileged {
            return Ok(Some(owner_id));
        }
        if !is_current_identity(owner_id) {
            let message = format!("Cannot run as {} without root", owner_id);
            if self.strict_mode {
                return Err(JudgeError::Sandbox(message));
            }
            log::warn!("{}; running as the current user (permissive mode)", message);
        }
        Ok(None)
    }

    fn command(&self, spec: &ProcessSpec, group: Option<Pid>) -> Result<Command> {
        let mut command = Command::new(&spec.executable);
        command
            .args(&spec.arguments)
            .current_dir(jail_path(&self.root, &spec.current_path))
            .env_clear()
            .env("PATH", DEFAULT_PATH)
            .envs(spec.environment.iter().map(|(k, v)| (k, v)))
            .stdin(self.stdio(&spec.streams[0])?)
            .stdout(self.stdio(&spec.streams[1])?)
            .stderr(self.stdio(&spec.streams[2])?)
            .process_group(group.map_or(0, Pid::as_raw));

        let limits = spec.resource_limits.clone();
        let identity = self.identity_for(spec.owner_id)?;
        let strict_mode = self.strict_mode;
        unsafe {
            command.pre_exec(move || {
                if let Err(e) = rlimits::apply(&limits, identity.is_some()) {
                    if strict_mode {
                        return Err(e);
                    }
                }
                if let Some(owner_id) = identity {
                    rlimits::switch_identity(owner_id)?;
                }
                Ok(())
            });
        }
        Ok(command)
    }

    /// Poll until every process has terminated, killing the group on a breach.
    ///
    /// Terminated processes are left unreaped, so `group` stays allocated.
    fn supervise(&self, group: Pid, pids: &[Pid], started: Instant) -> Result<Breaches> {
        let mut breaches = Breaches {
            memory: vec![false; pids.len()],
            processes: vec![false; pids.len()],
            ..Default::default()
        };
        let mut exited = vec![false; pids.len()];
        let counts_processes = self
            .specs
            .iter()
            .any(|spec| spec.resource_limits.number_of_processes.is_some());

        loop {
            for (done, pid) in exited.iter_mut().zip(pids) {
                if !*done {
                    *done = has_exited(*pid)?;
                }
            }
            if exited.iter().all(|done| *done) {
                return Ok(breaches);
            }

            let mut kill = false;
            if let Some(limit) = self.real_time_limit {
                if !breaches.real_time && started.elapsed() >= limit {
                    log::debug!("Real time limit {:?} reached, killing group {}", limit, group);
                    breaches.real_time = true;
                    kill = true;
                }
            }

            let members = counts_processes.then(|| group_size(group));
            for (i, (pid, spec)) in pids.iter().zip(&self.specs).enumerate() {
                if exited[i] {
                    continue;
                }
                let limits = &spec.resource_limits;
                if let Some(limit) = limits.memory_limit_bytes {
                    if let Some(peak) = peak_rss_bytes(*pid).filter(|peak| *peak > limit) {
                        log::debug!("Process {} peaked at {} bytes over {}", pid, peak, limit);
                        breaches.memory[i] = true;
                        kill = true;
                    }
                }
                if let (Some(limit), Some(members)) = (limits.number_of_processes, members) {
                    if members as u64 > limit {
                        log::debug!("Group {} holds {} processes over {}", group, members, limit);
                        breaches.processes[i] = true;
                        kill = true;
                    }
                }
            }

            if kill {
                let _ = killpg(group, Signal::SIGKILL);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Limits the supervisor saw breached while the group ran
#[derive(Debug, Default)]
struct Breaches {
    real_time: bool,
    memory: Vec<bool>,
    processes: Vec<bool>,
}

impl ProcessGroup for HostProcessGroup {
    fn set_real_time_limit(&mut self, limit: Option<Duration>) {
        self.real_time_limit = limit;
    }

    fn add_process(&mut self, spec: ProcessSpec) -> Result<ProcessId> {
        if self.results.is_some() {
            return Err(JudgeError::Sandbox(
                "process group has already run".to_string(),
            ));
        }
        self.specs.push(spec);
        Ok(ProcessId(self.specs.len() - 1))
    }

    fn synchronized_call(&mut self) -> Result<ProcessGroupResult> {
        if self.results.is_some() {
            return Err(JudgeError::Sandbox(
                "process group has already run".to_string(),
            ));
        }

        let started = Instant::now();
        let mut group: Option<Pid> = None;
        let mut pids = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let spawned = self
                .command(spec, group)
                .and_then(|mut command| {
                    command.spawn().map_err(|e| {
                        JudgeError::Process(format!(
                            "Failed to start {}: {}",
                            spec.executable.display(),
                            e
                        ))
                    })
                });
            let child = match spawned {
                Ok(child) => child,
                Err(e) => {
                    if let Some(group) = group {
                        let _ = killpg(group, Signal::SIGKILL);
                        for pid in &pids {
                            let _ = wait_process(*pid);
                        }
                    }
                    return Err(e);
                }
            };
            let pid = Pid::from_raw(child.id() as i32);
            group.get_or_insert(pid);
            pids.push(pid);
        }

        let Some(group) = group else {
            self.results = Some(Vec::new());
            return Ok(ProcessGroupResult::default());
        };
        let supervised = self.supervise(group, &pids, started);
        let real_time_millis = started.elapsed().as_millis() as u64;
        // No member has been reaped yet, so `group` still names this group
        let _ = killpg(group, Signal::SIGKILL);

        let mut results = Vec::with_capacity(pids.len());
        let mut wait_error = None;
        for (pid, spec) in pids.iter().zip(&self.specs) {
            match wait_process(*pid) {
                Ok((status, usage)) => {
                    results.push(raw_result(status, &usage, &spec.resource_limits))
                }
                Err(e) => {
                    wait_error.get_or_insert(e);
                    results.push(ProcessResult::default());
                }
            }
        }

        let breaches = supervised?;
        if let Some(e) = wait_error {
            return Err(e);
        }
        for (i, result) in results.iter_mut().enumerate() {
            result.violations.memory |= breaches.memory[i];
            result.violations.processes |= breaches.processes[i];
        }
        self.results = Some(results);
        Ok(ProcessGroupResult {
            real_time_limit_exceeded: breaches.real_time,
            real_time_millis,
        })
    }

    fn process_result(&self, id: ProcessId) -> Result<ProcessResult> {
        self.results
            .as_ref()
            .and_then(|results| results.get(id.0))
            .cloned()
            .ok_or_else(|| {
                JudgeError::Sandbox(format!("no result for process {}", id.0))
            })
    }
}

fn wait_process(pid: Pid) -> Result<(libc::c_int, libc::rusage)> {
    let mut status: libc::c_int = 0;
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    loop {
        let rc = unsafe { libc::wait4(pid.as_raw(), &mut status, 0, &mut usage) };
        if rc == pid.as_raw() {
            return Ok((status, usage));
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(JudgeError::Process(format!("wait4({}) failed: {}", pid, err)));
        }
    }
}

/// Whether `pid` has terminated, without reaping it
fn has_exited(pid: Pid) -> Result<bool> {
    let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
    loop {
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid.as_raw() as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(unsafe { info.si_pid() } == pid.as_raw());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(JudgeError::Process(format!("waitid({}) failed: {}", pid, err)));
        }
    }
}

/// VmHWM of a live process; `None` once it is gone or a zombie
fn peak_rss_bytes(pid: Pid) -> Option<u64> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    parse_kib_field(&status, "VmHWM:")
}

fn parse_kib_field(status: &str, field: &str) -> Option<u64> {
    let value = status.lines().find_map(|line| line.strip_prefix(field))?;
    let kib = value.trim().strip_suffix("kB")?.trim().parse::<u64>().ok()?;
    Some(kib * 1024)
}

/// Live (non-zombie) members of process group `group`
fn group_size(group: Pid) -> usize {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.bytes().all(|b| b.is_ascii_digit()))
        })
        .filter_map(|entry| std::fs::read_to_string(entry.path().join("stat")).ok())
        .filter(|stat| live_process_group(stat) == Some(group.as_raw()))
        .count()
}

/// Process group of a `/proc/<pid>/stat` line, unless the process is dead
fn live_process_group(stat: &str) -> Option<i32> {
    let mut fields = stat[stat.rfind(')')? + 1..].split_whitespace();
    let state = fields.next()?;
    if state == "Z" || state == "X" {
        return None;
    }
    let _ppid = fields.next()?;
    fields.next()?.parse().ok()
}

fn timeval_millis(tv: &libc::timeval) -> u64 {
    tv.tv_sec as u64 * 1000 + tv.tv_usec as u64 / 1000
}

/// Raw result from a wait status and its rusage
fn raw_result(status: libc::c_int, usage: &libc::rusage, limits: &ResourceLimits) -> ProcessResult {
    let exit_code = libc::WIFEXITED(status).then(|| libc::WEXITSTATUS(status));
    let term_signal = libc::WIFSIGNALED(status).then(|| libc::WTERMSIG(status));

    let cpu_time_millis = timeval_millis(&usage.ru_utime) + timeval_millis(&usage.ru_stime);
    let memory_peak_bytes = usage.ru_maxrss.max(0) as u64 * 1024;

    let violations = LimitViolations {
        time: term_signal == Some(libc::SIGXCPU)
            || limits
                .time_limit_millis
                .is_some_and(|limit| cpu_time_millis > limit),
        memory: limits
            .memory_limit_bytes
            .is_some_and(|limit| memory_peak_bytes > limit),
        output: term_signal == Some(libc::SIGXFSZ),
        // The supervisor counts group members
        processes: false,
    };

    ProcessResult {
        exit_code,
        term_signal,
        violations,
        usage: ResourceUsage {
            cpu_time_millis,
            memory_peak_bytes,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::Stream;
    use tempfile::TempDir;

    fn container() -> (TempDir, HostContainer) {
        let dir = tempfile::tempdir().unwrap();
        let container = HostContainer::new(dir.path().join("jail"), false).unwrap();
        (dir, container)
    }

    fn shell(script: &str) -> ProcessSpec {
        ProcessSpec::new("/bin/sh").with_arguments(["-c", script])
    }

    fn zero_usage() -> libc::rusage {
        unsafe { std::mem::zeroed() }
    }

    #[test]
    fn test_raw_result_exit_and_signal() {
        let limits = ResourceLimits::default();
        let exited = raw_result(3 << 8, &zero_usage(), &limits);
        assert_eq!(exited.exit_code, Some(3));
        assert_eq!(exited.term_signal, None);

        let signaled = raw_result(libc::SIGXFSZ, &zero_usage(), &limits);
        assert_eq!(signaled.exit_code, None);
        assert_eq!(signaled.term_signal, Some(libc::SIGXFSZ));
        assert!(signaled.violations.output);
        assert!(raw_result(libc::SIGXCPU, &zero_usage(), &limits).violations.time);
    }

    #[test]
    fn test_raw_result_usage_limits() {
        let mut usage = zero_usage();
        usage.ru_utime.tv_sec = 1;
        usage.ru_stime.tv_usec = 500_000;
        usage.ru_maxrss = 2048;
        let limits = ResourceLimits {
            time_limit_millis: Some(1000),
            memory_limit_bytes: Some(1024 * 1024),
            ..Default::default()
        };
        let result = raw_result(0, &usage, &limits);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.usage.cpu_time_millis, 1500);
        assert_eq!(result.usage.memory_peak_bytes, 2048 * 1024);
        assert!(result.violations.time);
        assert!(result.violations.memory);
    }

    #[test]
    fn test_raw_result_memory_at_limit_is_not_violation() {
        let mut usage = zero_usage();
        usage.ru_maxrss = 1024;
        let limits = ResourceLimits {
            memory_limit_bytes: Some(1024 * 1024),
            ..Default::default()
        };
        assert!(!raw_result(0, &usage, &limits).violations.memory);
    }

    #[test]
    fn test_proc_parsing() {
        let status = "Name:\tdd\nVmPeak:\t  270000 kB\nVmHWM:\t  262400 kB\n";
        assert_eq!(parse_kib_field(status, "VmHWM:"), Some(262400 * 1024));
        assert_eq!(parse_kib_field("Name:\tzombie\n", "VmHWM:"), None);

        assert_eq!(live_process_group("812 (sh) S 1 812 812 0 -1"), Some(812));
        assert_eq!(live_process_group("813 (a) b) R 812 812 812 0"), Some(812));
        assert_eq!(live_process_group("814 (sleep) Z 812 812 812 0"), None);
    }

    #[test]
    fn test_memory_limit_breach_is_reported() {
        let (_dir, mut container) = container();
        let mut spec = shell("exec dd if=/dev/zero of=/dev/null bs=256M count=1 2>/dev/null");
        spec.resource_limits.memory_limit_bytes = Some(64 << 20);

        let mut group = container.create_process_group().unwrap();
        let id = group.add_process(spec).unwrap();
        group.synchronized_call().unwrap();
        let result = group.process_result(id).unwrap();
        assert!(result.violations.memory);
        assert!(!result.violations.processes);
    }

    #[test]
    fn test_memory_under_limit_is_not_reported() {
        let (_dir, mut container) = container();
        let mut spec = shell("exit 0");
        spec.resource_limits.memory_limit_bytes = Some(256 << 20);

        let mut group = container.create_process_group().unwrap();
        let id = group.add_process(spec).unwrap();
        group.synchronized_call().unwrap();
        let result = group.process_result(id).unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert!(!result.violations.any());
    }

    #[test]
    fn test_process_count_breach_is_reported() {
        let (_dir, mut container) = container();
        let mut spec = shell("sleep 3 & sleep 3 & sleep 3 & wait");
        spec.resource_limits.number_of_processes = Some(2);

        let mut group = container.create_process_group().unwrap();
        let id = group.add_process(spec).unwrap();
        let group_result = group.synchronized_call().unwrap();
        let result = group.process_result(id).unwrap();
        assert!(result.violations.processes);
        assert_eq!(result.term_signal, Some(libc::SIGKILL));
        assert!(group_result.real_time_millis < 3000);
    }

    #[test]
    fn test_descendants_killed_after_leader_exits() {
        let (dir, mut container) = container();
        let pid_file = dir.path().join("background.pid");
        let script = format!("sleep 30 & echo $! > {}", pid_file.display());

        let mut group = container.create_process_group().unwrap();
        let id = group.add_process(shell(&script)).unwrap();
        let group_result = group.synchronized_call().unwrap();
        assert_eq!(group.process_result(id).unwrap().exit_code, Some(0));
        assert!(group_result.real_time_millis < 30_000);

        let background = std::fs::read_to_string(&pid_file).unwrap();
        let stat_path = format!("/proc/{}/stat", background.trim());
        let gone = (0..100).any(|_| {
            let alive = std::fs::read_to_string(&stat_path)
                .ok()
                .and_then(|stat| live_process_group(&stat))
                .is_some();
            if alive {
                std::thread::sleep(Duration::from_millis(10));
            }
            !alive
        });
        assert!(gone);
    }

    #[test]
    fn test_keep_in_root_cannot_escape() {
        let (_dir, container) = container();
        let path = container.keep_in_root(Path::new("/../../etc/passwd"));
        assert!(path.starts_with(container.root()));
    }

    #[test]
    fn test_directory_modes() {
        let (_dir, container) = container();
        let privileged = HostContainer {
            privileged: true,
            ..container.clone()
        };
        assert_eq!(privileged.host_mode(0o400, true), 0o500);
        assert_eq!(privileged.host_mode(0o640, false), 0o640);

        let unprivileged = HostContainer {
            privileged: false,
            ..container
        };
        assert_eq!(unprivileged.host_mode(0o400, true), 0o700);
        assert_eq!(unprivileged.host_mode(0o200, false), 0o600);
    }

    #[test]
    fn test_exit_code_and_redirection() {
        let (_dir, mut container) = container();
        let output = PathBuf::from("/out.txt");
        std::fs::write(container.keep_in_root(&output), "").unwrap();

        let mut spec = shell("echo hello; exit 3");
        spec.set_stream(
            Stream::Stdout,
            StreamTarget::File {
                location: output.clone(),
                mode: AccessMode::WriteOnly,
            },
        );

        let mut group = container.create_process_group().unwrap();
        let id = group.add_process(spec).unwrap();
        let group_result = group.synchronized_call().unwrap();
        let result = group.process_result(id).unwrap();

        assert!(!group_result.real_time_limit_exceeded);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(
            std::fs::read_to_string(container.keep_in_root(&output)).unwrap(),
            "hello\n"
        );
    }

    #[test]
    fn test_real_time_limit_kills_group() {
        let (_dir, mut container) = container();
        let mut group = container.create_process_group().unwrap();
        group.set_real_time_limit(Some(Duration::from_millis(200)));
        let id = group.add_process(shell("sleep 5")).unwrap();

        let group_result = group.synchronized_call().unwrap();
        let result = group.process_result(id).unwrap();
        assert!(group_result.real_time_limit_exceeded);
        assert!(group_result.real_time_millis < 5000);
        assert_eq!(result.term_signal, Some(libc::SIGKILL));
    }

    #[test]
    fn test_group_runs_once() {
        let (_dir, mut container) = container();
        let mut group = container.create_process_group().unwrap();
        let id = group.add_process(shell("true")).unwrap();
        assert!(group.process_result(id).is_err());
        group.synchronized_call().unwrap();
        assert!(group.synchronized_call().is_err());
        assert!(group.add_process(shell("true")).is_err());
    }

    #[test]
    fn test_missing_executable_is_error() {
        let (_dir, mut container) = container();
        let mut group = container.create_process_group().unwrap();
        group
            .add_process(ProcessSpec::new("/nonexistent/solution"))
            .unwrap();
        assert!(matches!(
            group.synchronized_call(),
            Err(JudgeError::Process(_))
        ));
    }
}
