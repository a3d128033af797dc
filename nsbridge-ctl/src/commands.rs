use console::style;
use log::info;
use nsbridge_caps::sys;
use nsbridge_core::{Mode, SystemFeatures};
use nsbridge_inany::{Cidr, INANY_ADDRSTRLEN, InAnyAddr, WILDCARD, matches, ntop, pton};
use nsbridge_namespace::{NamespaceKind, namespace_inode};
use nsbridge_seccomp::{SeccompBpf, SeccompFilter, SeccompProfile};

/// Parse an address argument, `*` being the wildcard
fn parse_optional(text: &str) -> Result<Option<InAnyAddr>, String> {
    if text == WILDCARD {
        return Ok(None);
    }
    pton(text)
        .map(Some)
        .ok_or_else(|| format!("Not an IPv4 or IPv6 address: {}", text))
}

pub fn check_requirements() {
    info!("Checking isolation requirements");
    println!("Checking isolation requirements...\n");

    let features = SystemFeatures::detect();
    println!("{}", features.summary());

    println!("\nCapabilities:");
    match sys::capget() {
        Ok(sets) => {
            println!("  effective:   {}", sets.effective);
            println!("  permitted:   {}", sets.permitted);
            println!("  inheritable: {}", sets.inheritable);
        }
        Err(e) => println!("  {} capget() failed: {}", style("[--]").red(), e),
    }
    println!("  bounding:    {} capabilities", sys::bounding_set().iter().count());

    println!("\nNamespaces:");
    for kind in NamespaceKind::all() {
        match namespace_inode(kind, None) {
            Ok(inode) => println!("  {:5} {}", kind.proc_name(), inode),
            Err(_) => println!("  {:5} {}", kind.proc_name(), style("unavailable").dim()),
        }
    }

    println!("\nSystem info:");
    println!("  UID: {}", nix::unistd::getuid());
    println!("  GID: {}", nix::unistd::getgid());
}

pub fn show_addr(text: &str) -> Result<String, String> {
    let addr = parse_optional(text)?;
    let mut buf = [0u8; INANY_ADDRSTRLEN];
    let canonical = ntop(addr.as_ref(), &mut buf)
        .ok_or_else(|| format!("Couldn't format {}", text))?
        .to_string();

    Ok(match addr {
        Some(addr) => format!("{} ({})", canonical, addr.family()),
        None => format!("{} (any family)", canonical),
    })
}

pub fn show_cidr(text: &str) -> Result<String, String> {
    let cidr: Cidr = text
        .parse()
        .map_err(|_| format!("Not an address with a valid prefix length: {}", text))?;
    let len = cidr.len();

    Ok(format!(
        "address: {}\nfamily:  {}\nlength:  {} ({} unified)\nnetwork: {}",
        cidr.addr(),
        cidr.family(),
        len.for_family(cidr.family()),
        len.get(),
        cidr.network()
    ))
}

pub fn show_match(a: &str, b: &str) -> Result<bool, String> {
    let a = parse_optional(a)?;
    let b = parse_optional(b)?;
    Ok(matches(a.as_ref(), b.as_ref()))
}

pub fn list_seccomp(mode: Mode) {
    info!("Listing seccomp allow-list for {}", mode);
    let profile = SeccompProfile::for_mode(mode);
    let filter = SeccompFilter::from_profile(profile);

    println!("Runtime syscalls for {} ({}):\n", mode, profile.description());
    for name in filter.export() {
        println!("  {}", name);
    }

    match SeccompBpf::instruction_count(&filter) {
        Ok(count) => println!("\n{} syscalls, {} BPF instructions", filter.allowed_count(), count),
        Err(e) => println!("\n{} {}", style("error:").red().bold(), e),
    }
}
