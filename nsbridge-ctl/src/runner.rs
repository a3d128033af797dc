use crate::cli::IsolateArgs;
use console::style;
use log::{debug, info};
use nix::unistd::{ForkResult, Pid, fork, geteuid, getgid, getuid, setsid};
use nsbridge_core::{IsolationError, Result};
use nsbridge_isolation::{
    Isolation, IsolationConfig, LinuxKernel, OrDie, SimulatedKernel, Stage, die,
};

/// Configuration file, if any, with command line flags on top
pub fn build_config(args: &IsolateArgs) -> Result<IsolationConfig> {
    let mut config = match &args.config {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            IsolationConfig::from_json_file(path)?
        }
        None => IsolationConfig::default(),
    };

    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(uid) = args.uid {
        config.uid = Some(uid);
    }
    if let Some(gid) = args.gid {
        config.gid = Some(gid);
    }
    if let Some(userns) = &args.userns {
        config.userns = Some(userns.clone());
    }
    if let Some(scratch) = &args.scratch {
        config.scratch_dir = scratch.clone();
    }
    if let Some(fd) = args.fd {
        config.fd = Some(fd);
    }
    if args.use_userns {
        config.use_userns = Some(true);
    } else if args.no_userns {
        config.use_userns = Some(false);
    }
    config.netns_only |= args.netns_only;
    config.foreground |= args.foreground;

    config.validate()?;
    Ok(config)
}

pub fn run_isolate(args: &IsolateArgs) -> Result<()> {
    let config = build_config(args)?;
    info!("Isolating in {} mode", config.operating_mode());

    if args.dry_run {
        return dry_run(&config);
    }

    let mut isolation = Isolation::new(LinuxKernel::new());
    isolation.initial(&config.startup_args()).or_die();
    isolation
        .user(&config.user_target(getuid().as_raw(), getgid().as_raw()))
        .or_die();

    let ctx = config.context();
    if let Err(e) = isolation.prefork(&ctx) {
        // Nothing of ours to clean up yet: descriptors were closed at startup
        die(&e);
    }

    if !ctx.foreground {
        // SAFETY: single threaded at this point, the child only runs the
        // remaining stage and exits.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                println!("isolated child: {}", child);
                return Ok(());
            }
            Ok(ForkResult::Child) => {
                new_session().or_die();
            }
            Err(e) => die(&IsolationError::syscall("Failed to fork", e)),
        }
    }

    // Styling queries the terminal, which the filter no longer allows
    let done = style("[ok]").green().to_string();
    isolation.postfork(&ctx).or_die();
    report(&done, isolation.stage());

    // Returning from main tears down the signal stack with syscalls the
    // filter kills on; exit_group is allowed.
    unsafe { libc::_exit(0) }
}

/// Detach the daemonized child from the controlling terminal
fn new_session() -> Result<Pid> {
    setsid().map_err(|e| IsolationError::syscall("Couldn't start a new session", e))
}

/// Runs under the syscall filter: only writes to stderr
fn report(label: &str, stage: Stage) {
    eprintln!("{} isolation complete, stage {}", label, stage);
}

fn dry_run(config: &IsolationConfig) -> Result<()> {
    let uid = getuid().as_raw();
    let gid = getgid().as_raw();
    let kernel = if geteuid().is_root() {
        SimulatedKernel::root()
    } else {
        SimulatedKernel::unprivileged(uid, gid)
    };

    let ctx = config.context();
    let mut isolation = Isolation::new(kernel);

    isolation.initial(&config.startup_args())?;
    print_stage(&mut isolation);
    isolation.user(&config.user_target(uid, gid))?;
    print_stage(&mut isolation);
    isolation.prefork(&ctx)?;
    print_stage(&mut isolation);
    if !ctx.foreground {
        println!("  {}", style("fork()").dim());
    }
    isolation.postfork(&ctx)?;
    print_stage(&mut isolation);

    let state = isolation.state();
    println!("\nRetained capabilities: {}", state.retained());
    println!("Filesystem visible:    {}", state.filesystem_visible());
    println!("Core dumps:            {}", state.dumpable());
    Ok(())
}

/// Print the stage reached and the calls made to get there
fn print_stage(isolation: &mut Isolation<SimulatedKernel>) {
    println!("{} {}", style("stage").bold(), style(isolation.stage()).cyan());
    for call in isolation.kernel_mut().take_journal() {
        println!("  {}", call);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsbridge_core::Mode;
    use std::io::Write;

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"mode": "passt", "uid": 1000, "fd": 4}}"#).unwrap();

        let args = IsolateArgs {
            config: Some(file.path().to_path_buf()),
            mode: Some(Mode::Pasta),
            foreground: true,
            ..IsolateArgs::default()
        };
        let config = build_config(&args).unwrap();
        assert_eq!(config.mode, Mode::Pasta);
        assert_eq!(config.uid, Some(1000));
        assert_eq!(config.fd, Some(4));
        assert!(config.foreground);
    }

    #[test]
    fn userns_defaults_on_and_can_be_turned_off() {
        let config = build_config(&IsolateArgs::default()).unwrap();
        assert!(config.use_userns());

        let args = IsolateArgs {
            no_userns: true,
            ..IsolateArgs::default()
        };
        assert!(!build_config(&args).unwrap().use_userns());

        let args = IsolateArgs {
            mode: Some(Mode::Pasta),
            netns_only: true,
            ..IsolateArgs::default()
        };
        assert!(!build_config(&args).unwrap().use_userns());
    }

    #[test]
    fn invalid_combination_rejected() {
        let args = IsolateArgs {
            netns_only: true,
            ..IsolateArgs::default()
        };
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn second_session_in_child_is_refused() {
        unsafe {
            let pid = libc::fork();
            assert!(pid >= 0);

            if pid == 0 {
                // A freshly forked child is no group leader; once it leads
                // its own session, setsid() must fail with EPERM
                let code = match (new_session(), new_session()) {
                    (Ok(_), Err(e)) if e.errno() == Some(nix::errno::Errno::EPERM) => 0,
                    _ => 1,
                };
                libc::_exit(code);
            }

            let mut status: i32 = 0;
            libc::waitpid(pid, &mut status, 0);
            assert!(libc::WIFEXITED(status));
            assert_eq!(libc::WEXITSTATUS(status), 0);
        }
    }

    #[test]
    fn dry_run_completes_for_every_mode() {
        for mode in Mode::all() {
            let args = IsolateArgs {
                mode: Some(mode),
                use_userns: true,
                dry_run: true,
                ..IsolateArgs::default()
            };
            run_isolate(&args).unwrap();
        }
    }
}
