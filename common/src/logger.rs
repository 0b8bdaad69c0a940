use log::{Level, LevelFilter, Metadata, Record};
use std::fs::File;
use std::io::{stdout, BufWriter, Write};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Instant;

/// Environment variable overriding the max level, e.g. `LANEGRAPH_LOG=info`
pub const LEVEL_VAR: &str = "LANEGRAPH_LOG";

/// A logger that logs to stdout, and to a file in release builds
pub struct MyLog {
    start: Instant,
    log_file: Option<Mutex<BufWriter<File>>>,
}

impl MyLog {
    fn new() -> Self {
        let log_file;
        #[cfg(not(any(debug_assertions, test)))]
        {
            let _ = std::fs::create_dir("logs");
            use std::time::SystemTime;
            log_file = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .ok()
                .and_then(|d| File::create(format!("logs/lanegraph_{}.log", d.as_micros())).ok())
                .map(|f| Mutex::new(BufWriter::new(f)));
        }

        #[cfg(any(debug_assertions, test))]
        {
            log_file = None;
        }

        Self {
            start: Instant::now(),
            log_file,
        }
    }

    /// Installs the logger and the panic hook. Calling it again is a no-op.
    pub fn init() {
        static INIT: std::sync::Once = std::sync::Once::new();
        INIT.call_once(|| {
            let leaked = Box::leak(Box::new(MyLog::new()));
            if log::set_logger(leaked).is_err() {
                return;
            }
            log::set_max_level(max_level());
            log_panics::init();
        });
    }
}

fn max_level() -> LevelFilter {
    std::env::var(LEVEL_VAR)
        .ok()
        .and_then(|v| LevelFilter::from_str(v.trim()).ok())
        .unwrap_or(LevelFilter::Debug)
}

macro_rules! write_log_stdout {
    ($file:expr, $($arg:tt)*) => {
        println!($($arg)*);

        if let Some(ref m) = $file {
            if let Ok(mut bw) = m.lock() {
                let _ = writeln!(bw, $($arg)*);
                let _ = bw.flush();
            }
        }
    }
}

impl log::Log for MyLog {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        let l = metadata.level();
        match metadata.target() {
            "rayon_core" | "rayon_core::registry" => l <= Level::Warn,
            _ => true,
        }
    }

    fn log(&self, r: &Record<'_>) {
        if r.target() == "panic" {
            write_log_stdout!(self.log_file, "{}", r.args());
            self.flush();
            return;
        }

        if std::thread::panicking() {
            self.flush();
            return;
        }

        if !self.enabled(r.metadata()) {
            return;
        }

        let time = self.start.elapsed().as_micros();
        if r.level() > Level::Warn {
            let module_path = r.module_path_static().unwrap_or_else(|| r.target());
            write_log_stdout!(
                self.log_file,
                "[{:9} {:5} {:12}] {}",
                time,
                r.level(),
                module_path,
                r.args()
            );
        } else {
            write_log_stdout!(
                self.log_file,
                "[{:9} {:5} {}:{}] {}",
                time,
                r.level(),
                r.file().unwrap_or_default(),
                r.line().unwrap_or_default(),
                r.args()
            );
        }
    }

    fn flush(&self) {
        let _ = stdout().flush();
        if let Some(ref x) = self.log_file {
            if let Ok(mut x) = x.lock() {
                let _ = x.flush();
            }
        }
    }
}
