//! Dump every CPUID leaf/subleaf pair visible to this processor.
//!
//! Output format is one record per line, all fields 8-hex-digit
//! zero-padded:
//!
//! ```text
//! Native cpuid:
//!   00000000:ffffffff -> 00000016:756e6547:6c65746e:49656e69
//!   ...
//! ```
//!
//! Diagnostics go to stderr; pass `-v` to include ceiling discovery.

#[cfg(target_arch = "x86_64")]
mod dump {
    use std::io::Write;

    use leafwalk_lib::cpu::cpuid;
    use leafwalk_lib::{DlogLevel, LeafWalker, dlog_register_backend, dlog_set_level};

    fn stderr_backend(args: std::fmt::Arguments<'_>) {
        eprintln!("{args}");
    }

    pub fn main() {
        dlog_register_backend(stderr_backend);

        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "-v" | "--verbose" => dlog_set_level(DlogLevel::Debug),
                other => {
                    eprintln!("leafwalk: unknown argument: {other}");
                    std::process::exit(2);
                }
            }
        }

        leafwalk_lib::dlog_debug!(
            "max standard leaf {:#x}, max extended leaf {:#x}",
            cpuid::max_standard_leaf(),
            cpuid::max_extended_leaf()
        );

        let stdout = std::io::stdout();
        let mut out = stdout.lock();

        let _ = writeln!(out, "Native cpuid:");
        LeafWalker::new().run(cpuid::cpuid_count, |record| {
            let _ = writeln!(out, "  {record}");
        });
    }
}

#[cfg(target_arch = "x86_64")]
fn main() {
    dump::main();
}

#[cfg(not(target_arch = "x86_64"))]
fn main() {
    eprintln!("leafwalk: CPUID enumeration requires an x86_64 processor");
    std::process::exit(1);
}
