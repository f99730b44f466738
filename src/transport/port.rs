//! Port-contention recovery (spec.md §4.1): "If the configured port is
//! already in use and the operator has not disabled the behavior, the
//! server locates the owning process, terminates it, waits briefly, and
//! retries the bind once before surfacing failure." Linux-only process
//! discovery via `/proc`; other platforms just retry the bind without the
//! kill step, since there is no portable non-root way to map a TCP port to
//! a pid without a new dependency.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

/// Binds `addr`, recovering once from `EADDRINUSE` by killing whatever
/// owns the port (unless `recover` is false, e.g. `--no-port-recovery`).
pub async fn bind_with_recovery(addr: SocketAddr, recover: bool) -> std::io::Result<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse && recover => {
            tracing::warn!(%addr, "port in use, attempting to reclaim it");
            if let Some(pid) = find_owning_pid(addr.port()) {
                tracing::warn!(pid, port = addr.port(), "terminating process holding configured port");
                terminate(pid);
                tokio::time::sleep(Duration::from_millis(300)).await;
            } else {
                tracing::warn!(port = addr.port(), "could not identify the process holding the port");
            }
            TcpListener::bind(addr).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(target_os = "linux")]
fn find_owning_pid(port: u16) -> Option<u32> {
    let inode = find_socket_inode(port)?;
    find_pid_for_inode(inode)
}

#[cfg(target_os = "linux")]
fn find_socket_inode(port: u16) -> Option<u64> {
    for path in ["/proc/net/tcp", "/proc/net/tcp6"] {
        let contents = std::fs::read_to_string(path).ok()?;
        for line in contents.lines().skip(1) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let Some(local) = fields.first() else { continue };
            let Some((_, hex_port)) = local.split_once(':') else { continue };
            let Ok(line_port) = u16::from_str_radix(hex_port, 16) else { continue };
            if line_port != port {
                continue;
            }
            if let Some(inode_str) = fields.get(9) {
                if let Ok(inode) = inode_str.parse() {
                    return Some(inode);
                }
            }
        }
    }
    None
}

#[cfg(target_os = "linux")]
fn find_pid_for_inode(inode: u64) -> Option<u32> {
    let needle = format!("socket:[{inode}]");
    let proc = std::fs::read_dir("/proc").ok()?;
    for entry in proc.flatten() {
        let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() else { continue };
        let fd_dir = entry.path().join("fd");
        let Ok(fds) = std::fs::read_dir(&fd_dir) else { continue };
        for fd in fds.flatten() {
            if let Ok(link) = std::fs::read_link(fd.path()) {
                if link.to_string_lossy() == needle {
                    return Some(pid);
                }
            }
        }
    }
    None
}

#[cfg(target_os = "linux")]
fn terminate(pid: u32) {
    // SAFETY: kill() with a pid we just read from /proc and SIGTERM is a
    // plain syscall wrapper; no pointers involved.
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(not(target_os = "linux"))]
fn find_owning_pid(_port: u16) -> Option<u32> {
    None
}

#[cfg(not(target_os = "linux"))]
fn terminate(_pid: u32) {}
