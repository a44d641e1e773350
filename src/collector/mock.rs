//! In-memory mock filesystem for testing collectors without a real `/proc`.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use crate::collector::traits::FileSystem;

/// In-memory filesystem for tests.
///
/// Stores files and directories in maps, so collector tests can simulate
/// arbitrary `/proc` and cgroup states and run in CI without Linux.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories (for read_dir and inode support).
    directories: HashSet<PathBuf>,
    /// Explicit inode assignments; paths without one get a hash-derived
    /// stable value.
    inodes: HashMap<PathBuf, u64>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content. Parent directories are created
    /// automatically.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    /// Adds an empty directory.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    /// Pins the inode of a path. Tests use this to simulate a recreated
    /// cgroup directory keeping its name but changing identity.
    pub fn set_inode(&mut self, path: impl AsRef<Path>, inode: u64) {
        self.inodes.insert(path.as_ref().to_path_buf(), inode);
    }

    /// Adds `/proc/[pid]/stat` and (optionally) `/proc/[pid]/io` for one
    /// process.
    pub fn add_process(&mut self, pid: u32, stat: &str, io: &str) {
        let base = PathBuf::from(format!("/proc/{}", pid));
        self.add_dir(&base);
        self.add_file(base.join("stat"), stat);
        if !io.is_empty() {
            self.add_file(base.join("io"), io);
        }
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("mock file not found: {}", path.display()),
            )
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.directories.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("mock directory not found: {}", path.display()),
            ));
        }
        let mut entries: Vec<PathBuf> = self
            .files
            .keys()
            .chain(self.directories.iter())
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        entries.sort();
        entries.dedup();
        Ok(entries)
    }

    fn inode(&self, path: &Path) -> io::Result<u64> {
        if let Some(ino) = self.inodes.get(path) {
            return Ok(*ino);
        }
        if !self.exists(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("mock path not found: {}", path.display()),
            ));
        }
        // Stable fallback derived from the path bytes.
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        path.hash(&mut hasher);
        Ok(hasher.finish() | 1)
    }
}

/// A small but complete `/proc` + cgroup fixture: two CPUs, one disk, one
/// interface, two processes, and a two-level cgroup tree.
pub fn typical_system() -> MockFs {
    let mut fs = MockFs::new();

    fs.add_file(
        "/proc/stat",
        "cpu  1000 50 500 8000 100 10 20 0 0 0\n\
         cpu0 500 25 250 4000 50 5 10 0 0 0\n\
         cpu1 500 25 250 4000 50 5 10 0 0 0\n\
         intr 123456\n\
         ctxt 987654\n\
         btime 1700000000\n\
         processes 4321\n\
         procs_running 2\n\
         procs_blocked 0\n",
    );
    fs.add_file(
        "/proc/meminfo",
        "MemTotal:       16384000 kB\n\
         MemFree:         8192000 kB\n\
         MemAvailable:   12288000 kB\n\
         Buffers:          512000 kB\n\
         Cached:          2048000 kB\n\
         SwapTotal:       4096000 kB\n\
         SwapFree:        4096000 kB\n",
    );
    fs.add_file("/proc/loadavg", "0.50 0.75 1.00 2/345 6789\n");
    fs.add_file(
        "/proc/vmstat",
        "pswpin 100\npswpout 200\npgfault 300000\npgmajfault 400\n",
    );
    fs.add_file(
        "/proc/diskstats",
        "   8       0 sda 5000 100 400000 3000 2000 50 160000 1500 0 4000 4500 0 0 0 0 0 0\n\
            8       1 sda1 4900 100 399000 2900 1900 50 159000 1400 0 3900 4300 0 0 0 0 0 0\n",
    );
    fs.add_file(
        "/proc/net/dev",
        "Inter-|   Receive                                                |  Transmit\n\
         \x20face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n\
         \x20   lo:  100000     500    0    0    0     0          0         0   100000     500    0    0    0     0       0          0\n\
         \x20 eth0: 5000000   40000    2    0    0     0          0         0  3000000   30000    1    0    0     0       0          0\n",
    );

    fs.add_process(
        1,
        "1 (systemd) S 0 1 1 0 -1 4194560 10000 0 100 0 150 350 0 0 20 0 1 0 30 \
         10485760 1500 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0\n",
        "rchar: 1000\nwchar: 2000\nsyscr: 10\nsyscw: 20\nread_bytes: 4096\nwrite_bytes: 8192\n\
         cancelled_write_bytes: 0\n",
    );
    fs.add_process(
        42,
        "42 (worker thread) R 1 42 42 0 -1 4194304 500 0 5 0 1000 2000 0 0 20 0 4 0 777 \
         20971520 3000 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0\n",
        "rchar: 0\nwchar: 0\nsyscr: 0\nsyscw: 0\nread_bytes: 1048576\nwrite_bytes: 2097152\n\
         cancelled_write_bytes: 0\n",
    );

    let root = PathBuf::from("/sys/fs/cgroup");
    fs.add_dir(&root);
    fs.set_inode(&root, 1);
    fs.add_file(
        root.join("cpu.stat"),
        "usage_usec 9000000\nuser_usec 6000000\nsystem_usec 3000000\nnr_periods 0\n\
         nr_throttled 0\nthrottled_usec 0\n",
    );
    fs.add_file(root.join("memory.current"), "1073741824\n");
    fs.add_file(root.join("memory.stat"), "anon 536870912\nfile 268435456\n");
    fs.add_file(root.join("memory.events"), "low 0\nhigh 0\nmax 0\noom 0\noom_kill 0\n");
    fs.add_file(root.join("io.stat"), "8:0 rbytes=123456 wbytes=654321 rios=100 wios=200\n");
    fs.add_file(root.join("pids.current"), "150\n");

    let slice = root.join("system.slice");
    fs.add_dir(&slice);
    fs.set_inode(&slice, 2);
    fs.add_file(
        slice.join("cpu.stat"),
        "usage_usec 4000000\nuser_usec 2500000\nsystem_usec 1500000\nnr_periods 10\n\
         nr_throttled 1\nthrottled_usec 5000\n",
    );
    fs.add_file(slice.join("memory.current"), "268435456\n");
    fs.add_file(slice.join("pids.current"), "40\n");

    fs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_dir_lists_direct_children_only() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/1/stat", "x");
        fs.add_file("/proc/2/stat", "x");
        fs.add_file("/proc/stat", "x");
        let entries = fs.read_dir(Path::new("/proc")).unwrap();
        assert_eq!(
            entries,
            vec![
                PathBuf::from("/proc/1"),
                PathBuf::from("/proc/2"),
                PathBuf::from("/proc/stat"),
            ]
        );
    }

    #[test]
    fn pinned_inode_wins() {
        let mut fs = MockFs::new();
        fs.add_dir("/sys/fs/cgroup/a");
        fs.set_inode("/sys/fs/cgroup/a", 99);
        assert_eq!(fs.inode(Path::new("/sys/fs/cgroup/a")).unwrap(), 99);
    }

    #[test]
    fn missing_file_is_not_found() {
        let fs = MockFs::new();
        let err = fs.read_to_string(Path::new("/proc/stat")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn typical_system_fixture_is_complete() {
        let fs = typical_system();
        assert!(fs.exists(Path::new("/proc/stat")));
        assert!(fs.exists(Path::new("/proc/42/io")));
        assert!(fs.exists(Path::new("/sys/fs/cgroup/system.slice/cpu.stat")));
    }
}
