//! Syscall name to number mapping for the build architecture

/// Syscall number for `name` on the build architecture
pub fn get_syscall_number_from_name(name: &str) -> Option<i64> {
    let nr = match name {
        // Data path
        "read" => libc::SYS_read,
        "write" => libc::SYS_write,
        "readv" => libc::SYS_readv,
        "writev" => libc::SYS_writev,
        "lseek" => libc::SYS_lseek,
        "close" => libc::SYS_close,
        "fcntl" => libc::SYS_fcntl,
        "ioctl" => libc::SYS_ioctl,
        // Sockets
        "socket" => libc::SYS_socket,
        "bind" => libc::SYS_bind,
        "connect" => libc::SYS_connect,
        "listen" => libc::SYS_listen,
        "accept" => libc::SYS_accept,
        "accept4" => libc::SYS_accept4,
        "shutdown" => libc::SYS_shutdown,
        "getsockopt" => libc::SYS_getsockopt,
        "setsockopt" => libc::SYS_setsockopt,
        "getsockname" => libc::SYS_getsockname,
        "recvfrom" => libc::SYS_recvfrom,
        "sendto" => libc::SYS_sendto,
        "recvmsg" => libc::SYS_recvmsg,
        "sendmsg" => libc::SYS_sendmsg,
        "recvmmsg" => libc::SYS_recvmmsg,
        "sendmmsg" => libc::SYS_sendmmsg,
        // Event loop
        "epoll_ctl" => libc::SYS_epoll_ctl,
        #[cfg(target_arch = "x86_64")]
        "epoll_wait" => libc::SYS_epoll_wait,
        "epoll_pwait" => libc::SYS_epoll_pwait,
        "clock_gettime" => libc::SYS_clock_gettime,
        "timerfd_create" => libc::SYS_timerfd_create,
        "timerfd_settime" => libc::SYS_timerfd_settime,
        "timerfd_gettime" => libc::SYS_timerfd_gettime,
        // Memory
        "mmap" => libc::SYS_mmap,
        "munmap" => libc::SYS_munmap,
        // Process
        "exit" => libc::SYS_exit,
        "exit_group" => libc::SYS_exit_group,
        "rt_sigreturn" => libc::SYS_rt_sigreturn,
        "restart_syscall" => libc::SYS_restart_syscall,
        _ => return None,
    };
    Some(nr as i64)
}

/// A syscall that covers `name` on architectures lacking it.
///
/// Newer architectures only provide the generic variant, which libc uses
/// in place of the legacy one.
pub fn equivalent_syscall(name: &str) -> Option<&'static str> {
    match name {
        "epoll_wait" => Some("epoll_pwait"),
        _ => None,
    }
}
