use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::Error;

/// What the symbolizer knows about one address. `None` means the symbolizer
/// answered, but did not know (`??`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLine {
    pub function: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

/// The services the resolver needs from the outside world.
///
/// [`ProcessBackend`] implements this by running binutils. Tests substitute
/// an in-memory implementation.
pub trait SymbolBackend {
    /// Whether the binary at `path` is a non-relocatable executable. Program
    /// counters inside such a binary are looked up unchanged, all others
    /// relative to the load address.
    fn is_static_executable(&mut self, path: &Path) -> Result<bool, Error>;

    /// Look up the function, file and line of `address` inside the binary at `path`.
    fn address_to_line(&mut self, path: &Path, address: u64) -> Result<SourceLine, Error>;

    /// Turn a mangled symbol name into its human readable form.
    fn demangle(&mut self, name: &str) -> Result<String, Error>;
}

impl<B: SymbolBackend + ?Sized> SymbolBackend for &mut B {
    fn is_static_executable(&mut self, path: &Path) -> Result<bool, Error> {
        (**self).is_static_executable(path)
    }

    fn address_to_line(&mut self, path: &Path, address: u64) -> Result<SourceLine, Error> {
        (**self).address_to_line(path, address)
    }

    fn demangle(&mut self, name: &str) -> Result<String, Error> {
        (**self).demangle(name)
    }
}

/// A [`SymbolBackend`] which runs `addr2line`, `c++filt` and `readelf`.
///
/// Tool names are prefixed with the `CROSS_COMPILE` environment variable, so
/// captures from other architectures can be resolved with a cross toolchain.
/// Every invocation is bounded by a timeout; a tool which does not finish in
/// time is killed and the call fails.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    tool_prefix: String,
    timeout: Duration,
}

impl Default for ProcessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessBackend {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        Self {
            tool_prefix: std::env::var("CROSS_COMPILE").unwrap_or_default(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_tool_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tool_prefix = prefix.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn run(&self, tool: &str, args: &[&OsStr]) -> Result<String, Error> {
        let program = format!("{}{}", self.tool_prefix, tool);
        let failed = |reason: String| Error::ExternalTool {
            tool: program.clone(),
            reason,
        };
        log::trace!("Running {program} {args:?}");

        let mut child = Command::new(&program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| failed(e.to_string()))?;

        // Drain stdout on a separate thread so a chatty tool can't block on a
        // full pipe while we wait for it to exit.
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| failed("no stdout".to_string()))?;
        let reader = std::thread::spawn(move || {
            let mut output = Vec::new();
            stdout.read_to_end(&mut output).map(|_| output)
        });

        let deadline = Instant::now() + self.timeout;
        let mut poll_interval = Duration::from_micros(50);
        let status = loop {
            if let Some(status) = child.try_wait().map_err(|e| failed(e.to_string()))? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(failed(format!("timed out after {:?}", self.timeout)));
            }
            std::thread::sleep(poll_interval);
            poll_interval = (poll_interval * 2).min(Duration::from_millis(10));
        };

        let output = reader
            .join()
            .map_err(|_| failed("output reader panicked".to_string()))?
            .map_err(|e| failed(e.to_string()))?;
        if !status.success() {
            return Err(failed(format!("exited with {status}")));
        }
        Ok(String::from_utf8_lossy(&output).into_owned())
    }
}

impl SymbolBackend for ProcessBackend {
    fn is_static_executable(&mut self, path: &Path) -> Result<bool, Error> {
        let output = self.run("readelf", &[OsStr::new("-h"), path.as_os_str()])?;
        Ok(parse_readelf_is_exec(&output))
    }

    fn address_to_line(&mut self, path: &Path, address: u64) -> Result<SourceLine, Error> {
        let address_arg = format!("{address:x}");
        let output = self
            .run(
                "addr2line",
                &[
                    OsStr::new("-f"),
                    OsStr::new("-s"),
                    OsStr::new("-e"),
                    path.as_os_str(),
                    OsStr::new("-a"),
                    OsStr::new(&address_arg),
                ],
            )
            .map_err(|e| Error::Resolution {
                path: path.to_owned(),
                address,
                reason: e.to_string(),
            })?;
        parse_addr2line_output(&output).ok_or_else(|| Error::Resolution {
            path: path.to_owned(),
            address,
            reason: format!("unexpected addr2line output {output:?}"),
        })
    }

    fn demangle(&mut self, name: &str) -> Result<String, Error> {
        let output = self.run("c++filt", &[OsStr::new("-i"), OsStr::new(name)])?;
        Ok(output.lines().next().unwrap_or(name).to_string())
    }
}

/// Parse the output of `addr2line -f -s -a`:
///
/// ```plaintext
/// 0x0000000000001139
/// main
/// main.c:7 (discriminator 1)
/// ```
///
/// Unknown functions and files are printed as `??`, unknown lines as `?` or `0`.
pub fn parse_addr2line_output(output: &str) -> Option<SourceLine> {
    let mut lines = output.lines();
    let _address = lines.next()?;
    let function = lines.next()?.trim();
    let (file, line) = lines.next()?.trim().rsplit_once(':')?;
    let line = line.split(' ').next()?;

    let function = (function != "??").then(|| function.to_string());
    let file = (file != "??").then(|| file.to_string());
    let line = match line {
        "?" | "0" => None,
        line => Some(line.parse().ok()?),
    };
    Some(SourceLine {
        function,
        file,
        line,
    })
}

/// Whether `readelf -h` describes an `EXEC` (as opposed to `DYN`) object.
pub fn parse_readelf_is_exec(output: &str) -> bool {
    output.lines().any(|line| {
        line.trim_start()
            .strip_prefix("Type:")
            .is_some_and(|ty| ty.trim_start().starts_with("EXEC"))
    })
}
