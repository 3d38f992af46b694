use crate::command::ExitCode;
use crate::env::{Environment, SearchPath};
use crate::errors::{ShellError, ShellResult};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

/// Filesystem capability used to resolve commands and to discover completion candidates.
///
/// The interpreter and the candidate index only ever look at the filesystem through this
/// trait, so tests can substitute [`MemLookup`].
pub trait ExecutableLookup {
    /// Names of executable regular files located directly in `dir`.
    fn executables_in(&self, dir: &Path) -> Vec<String>;

    /// Whether `path` names an executable regular file.
    fn is_executable(&self, path: &Path) -> bool;
}

/// [`ExecutableLookup`] backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLookup;

impl ExecutableLookup for FsLookup {
    fn executables_in(&self, dir: &Path) -> Vec<String> {
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter(|entry| is_executable_file(&entry.path()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect()
    }

    fn is_executable(&self, path: &Path) -> bool {
        is_executable_file(path)
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    fs::metadata(path).map(|meta| meta.is_file()).unwrap_or(false)
}

/// In-memory directory listing implementing [`ExecutableLookup`].
#[derive(Debug, Clone, Default)]
pub struct MemLookup {
    dirs: BTreeMap<PathBuf, BTreeSet<String>>,
}

impl MemLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register executables named `names` inside `dir`.
    pub fn with_executables(mut self, dir: impl Into<PathBuf>, names: &[&str]) -> Self {
        self.dirs
            .entry(dir.into())
            .or_default()
            .extend(names.iter().map(|name| name.to_string()));
        self
    }
}

impl ExecutableLookup for MemLookup {
    fn executables_in(&self, dir: &Path) -> Vec<String> {
        self.dirs
            .get(dir)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn is_executable(&self, path: &Path) -> bool {
        let (Some(dir), Some(name)) = (path.parent(), path.file_name().and_then(|n| n.to_str()))
        else {
            return false;
        };
        self.dirs.get(dir).is_some_and(|names| names.contains(name))
    }
}

/// Resolve a command name to an executable the way a typical shell would.
///
/// Behavior:
/// - Empty name: returns `None`.
/// - Name containing a `/`: used as a path directly, returned if it is executable.
/// - Otherwise: each directory of `search_path` is tried in order and the first executable
///   regular file with that name is returned. Later directories never shadow an earlier match.
pub fn find_command_path(
    lookup: &dyn ExecutableLookup,
    search_path: &SearchPath,
    name: &str,
) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    if name.contains('/') {
        let path = Path::new(name);
        return lookup.is_executable(path).then(|| path.to_path_buf());
    }

    search_path
        .dirs()
        .map(|dir| dir.join(name))
        .find(|candidate| lookup.is_executable(candidate))
}

/// Command that is not a builtin, resolved to an executable on disk.
pub struct ExternalCommand {
    name: String,
    path: PathBuf,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(name: String, path: PathBuf, args: Vec<String>) -> Self {
        Self { name, path, args }
    }

    /// Spawns the process and waits for it.
    ///
    /// The child sees `name` (not the resolved path) as `argv[0]`, inherits standard input,
    /// and runs in the interpreter's working directory with its variables.
    pub fn execute(self, stdout: Stdio, stderr: Stdio, env: &Environment) -> ShellResult<ExitCode> {
        let mut cmd = std::process::Command::new(&self.path);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.arg0(&self.name);
        }
        cmd.args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(stdout)
            .stderr(stderr)
            .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&env.current_dir);

        let mut child = cmd.spawn().map_err(|source| ShellError::Spawn {
            name: self.name.clone(),
            source,
        })?;
        let exit_status = child.wait()?;
        debug!("{} exited with {}", self.path.display(), exit_status);
        match exit_status.code() {
            Some(x) => Ok(x),
            None => Ok(terminated_by_signal(exit_status)),
        }
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs::File;

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        File::create(path).expect("create file");
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    #[test]
    fn first_directory_wins() {
        let lookup = MemLookup::new()
            .with_executables("/first", &["tool"])
            .with_executables("/second", &["tool", "other"]);
        let path = SearchPath::parse("/first:/second");

        assert_eq!(
            find_command_path(&lookup, &path, "tool"),
            Some(PathBuf::from("/first/tool"))
        );
        assert_eq!(
            find_command_path(&lookup, &path, "other"),
            Some(PathBuf::from("/second/other"))
        );
    }

    #[test]
    fn not_found_anywhere() {
        let lookup = MemLookup::new().with_executables("/bin", &["ls"]);
        let path = SearchPath::parse("/bin");
        assert_eq!(find_command_path(&lookup, &path, "nonexisting"), None);
    }

    #[test]
    fn empty_name_is_none() {
        let lookup = MemLookup::new().with_executables("/bin", &["ls"]);
        assert_eq!(find_command_path(&lookup, &SearchPath::parse("/bin"), ""), None);
    }

    #[test]
    fn name_with_slash_skips_search_path() {
        let lookup = MemLookup::new().with_executables("/opt/x", &["run"]);
        let path = SearchPath::parse("/bin");
        assert_eq!(
            find_command_path(&lookup, &path, "/opt/x/run"),
            Some(PathBuf::from("/opt/x/run"))
        );
        assert_eq!(find_command_path(&lookup, &path, "run"), None);
    }

    #[test]
    #[cfg(unix)]
    fn fs_lookup_skips_directories_and_non_executables() {
        let dir = tempfile::tempdir().expect("tempdir");
        make_executable(&dir.path().join("runme"));
        File::create(dir.path().join("plain")).expect("create plain");
        fs::create_dir(dir.path().join("subdir")).expect("mkdir");

        let mut names = FsLookup.executables_in(dir.path());
        names.sort();
        assert_eq!(names, vec!["runme".to_string()]);
        assert!(FsLookup.is_executable(&dir.path().join("runme")));
        assert!(!FsLookup.is_executable(&dir.path().join("plain")));
        assert!(!FsLookup.is_executable(&dir.path().join("subdir")));
    }

    #[test]
    fn fs_lookup_missing_directory_is_empty() {
        assert!(FsLookup
            .executables_in(Path::new("/definitely/not/a/dir/12345"))
            .is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn fs_lookup_resolves_through_search_path() {
        let first = tempfile::tempdir().expect("tempdir");
        let second = tempfile::tempdir().expect("tempdir");
        make_executable(&second.path().join("hello"));
        let path = SearchPath::parse(&format!(
            "{}:{}",
            first.path().display(),
            second.path().display()
        ));

        assert_eq!(
            find_command_path(&FsLookup, &path, "hello"),
            Some(second.path().join("hello"))
        );
    }

    #[test]
    #[cfg(unix)]
    fn external_command_reports_exit_code_and_argv0() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out_path = dir.path().join("out.txt");
        let out = File::create(&out_path).expect("create out");

        let mut vars = HashMap::new();
        vars.insert("PATH".to_string(), "/bin:/usr/bin".to_string());
        let env = Environment::with_vars(vars, dir.path());

        let cmd = ExternalCommand::new(
            "custom-name".to_string(),
            PathBuf::from("/bin/sh"),
            vec!["-c".to_string(), "echo \"$0\"; exit 3".to_string()],
        );
        let code = cmd
            .execute(Stdio::from(out), Stdio::null(), &env)
            .expect("spawn /bin/sh");

        assert_eq!(code, 3);
        assert_eq!(fs::read_to_string(out_path).unwrap(), "custom-name\n");
    }

    #[test]
    fn spawn_failure_is_reported() {
        let env = Environment::with_vars(HashMap::new(), "/");
        let cmd = ExternalCommand::new(
            "ghost".to_string(),
            PathBuf::from("/definitely/not/here/ghost"),
            Vec::new(),
        );
        let err = cmd
            .execute(Stdio::null(), Stdio::null(), &env)
            .unwrap_err();
        assert!(matches!(err, ShellError::Spawn { ref name, .. } if name == "ghost"));
    }
}
