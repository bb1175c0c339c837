/// Entry point of the cgroup sampler.
///
/// Samples the given host PIDs once and prints one JSON line per derived
/// sample. Run it periodically: rates are computed against the samples the
/// previous run stored.
///
/// # Errors
///
/// Returns an error if no PID is given, the environment holds an invalid
/// setting, or the pass itself fails (see [`cgroup_sampler::run`]).
///
/// # Examples
///
/// ```bash
/// ROOTFS_MOUNT_PATH=/rootfs RUST_LOG=debug cargo run -- 1234 5678
/// ```
fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let pids: Vec<String> = std::env::args().skip(1).collect();
    if pids.is_empty() {
        return Err("usage: cgroup-sampler <pid>...".into());
    }

    let config = cgroup_sampler::config::Config::from_env()?;
    cgroup_sampler::run(&config, &pids, std::io::stdout().lock())
}
